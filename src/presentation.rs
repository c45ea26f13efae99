//! The hover popup: from input events to what is on screen.
//!
//! [`PresentationStateMachine`] is single-threaded and synchronous. Nothing
//! blocks: fetches go out through a [`Fetcher`](crate::resolve::Fetcher) and
//! come back via `handle_fetch_reply`, media loads report back as
//! [`MediaEvent`]s, and timers are fired from `advance` on the host's clock.
//!
//! ```text
//!                 ┌──────────── toggle ────────────┐
//!                 v                                │
//!   Uninitialized ──config──> Idle <──────────── Disabled
//!                              │ ^
//!          hover delay / load  │ │ reset (Esc, wheel, click, AnimEnd)
//!                              v │
//!                           Loading ──media ready──> Shown
//!                              ^                      │
//!                              │ instant re-hover      │ leave target
//!                              └────── Hiding <────────┘
//!                                (hide animation)
//! ```
//!
//! Full zoom (`Fit`, `Pan`, `Dragging`) and the freeze gate are tracked
//! alongside the state rather than as states of their own.

#[path = "presentation/events.rs"]
mod events;
#[path = "presentation/host.rs"]
mod host;
#[path = "presentation/keys.rs"]
mod keys;
#[path = "presentation/layout.rs"]
mod layout;
#[path = "presentation/machine.rs"]
mod machine;
#[path = "presentation/state.rs"]
mod state;
#[path = "presentation/surface.rs"]
mod surface;

#[cfg(test)]
#[path = "presentation/testing.rs"]
mod testing;
#[cfg(test)]
#[path = "presentation/tests.rs"]
mod tests;

#[allow(unused_imports)]
pub use events::{
    Buttons, EventDisposition, HitTarget, InputEvent, KeyEvent, MediaEvent, Modifiers, MouseButton, PointerEvent,
};
#[allow(unused_imports)]
pub use host::{HostChannel, HostRequest};
#[allow(unused_imports)]
pub use keys::Key;
#[allow(unused_imports)]
pub use layout::{Frame, LOADER_SIZE, ZOOM_STEP, fit_frame, follow_position, loader_frame, popup_frame, zoom};
pub use machine::PresentationStateMachine;
#[allow(unused_imports)]
pub use state::{Freeze, FullZoom, Indicator, PresentationState};
#[allow(unused_imports)]
pub use surface::{Caption, Surface};
