/// Lifecycle of the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationState {
    /// No configuration has been applied yet.
    #[default]
    Uninitialized,
    /// Switched off by the user or by an unusable configuration.
    Disabled,
    Idle,
    /// The hide animation is running.
    Hiding,
    /// Resolving or loading; an indicator may be on screen.
    Loading,
    Shown,
}

impl PresentationState {
    /// `Loading` or `Shown`: something is (or is about to be) on screen.
    pub fn is_active(self) -> bool {
        matches!(self, PresentationState::Loading | PresentationState::Shown)
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, PresentationState::Uninitialized | PresentationState::Disabled)
    }
}

/// The freeze gate.
///
/// `On` blocks hovering as configured by the trigger mode. `PendingRelease`
/// is set when a wheel scroll dismissed the popup: hovering stays blocked
/// until the pointer actually moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freeze {
    #[default]
    Off,
    On,
    PendingRelease,
}

impl Freeze {
    pub fn is_frozen(self) -> bool {
        self != Freeze::Off
    }

    pub fn from_bool(frozen: bool) -> Freeze {
        if frozen { Freeze::On } else { Freeze::Off }
    }
}

/// Full-zoom sub-mode, orthogonal to [`PresentationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullZoom {
    #[default]
    Off,
    /// The media is fitted to the viewport and follows the pointer when larger.
    Fit,
    /// The media keeps its size and is panned by dragging.
    Pan,
    /// A left-button drag is moving the media.
    Dragging,
}

impl FullZoom {
    pub fn is_on(self) -> bool {
        self != FullZoom::Off
    }
}

/// Small status box shown instead of media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Loading,
    Resolving,
    NoResult,
    LoadFailed,
    ScriptError,
}

impl Indicator {
    /// Terminal indicators report an outcome; they are shown without the
    /// loader delay and never followed by media.
    pub fn is_terminal(self) -> bool {
        matches!(self, Indicator::NoResult | Indicator::LoadFailed | Indicator::ScriptError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_indicators() {
        let cases = vec![
            (false, Indicator::Loading),
            (false, Indicator::Resolving),
            (true, Indicator::NoResult),
            (true, Indicator::LoadFailed),
            (true, Indicator::ScriptError),
        ];
        for (expected, indicator) in cases {
            assert_eq!(expected, indicator.is_terminal(), "{indicator:?}");
        }
    }

    #[test]
    fn enabled_states() {
        assert!(!PresentationState::Uninitialized.is_enabled());
        assert!(!PresentationState::Disabled.is_enabled());
        assert!(PresentationState::Hiding.is_enabled());
        assert!(PresentationState::Loading.is_active());
        assert!(!PresentationState::Hiding.is_active());
    }
}
