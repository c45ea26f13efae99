use std::time::Duration;

use crate::page::{Point, Size};
use crate::url::MediaKind;

use super::layout::Frame;
use super::state::Indicator;

/// Caption line under the media.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Caption {
    /// Album position, `"3 / 12"`.
    pub counter: Option<String>,
    pub text: Option<String>,
    /// Natural size of the media, when it should be displayed.
    pub dimensions: Option<Size>,
}

impl Caption {
    pub fn is_empty(&self) -> bool {
        self.counter.is_none() && self.text.is_none() && self.dimensions.is_none()
    }
}

/// The box the popup is drawn in.
///
/// Loads are fire-and-forget: the surface reports progress back through
/// [`InputEvent::Media`](super::InputEvent::Media), and the state machine
/// also polls [`Surface::natural_size`] while waiting.
pub trait Surface {
    /// Replaces whatever is displayed with a status box near `at`.
    fn show_indicator(&mut self, indicator: Indicator, at: Point);

    /// Starts loading media. Anything previously loading is abandoned.
    fn load_media(&mut self, url: &str, kind: MediaKind);

    /// Natural size of the loaded media, once known.
    fn natural_size(&self) -> Option<Size>;

    /// Shows the media box at `frame`.
    fn place(&mut self, frame: Frame);

    fn set_caption(&mut self, caption: Option<&Caption>);

    fn set_caption_visible(&mut self, visible: bool);

    /// Starts the hide animation.
    fn fade_out(&mut self, duration: Duration);

    /// Hides everything immediately and drops the loaded media.
    fn hide(&mut self);

    /// Warms the cache for `url` without displaying it.
    fn preload(&mut self, url: &str);

    fn set_cursor_hidden(&mut self, hidden: bool);
}
