//! Recording host doubles for driving the state machine in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::page::{ElementBuilder, ElementId, Page, PageSnapshot, Point, Rect, Size};
use crate::resolve::{FetchRequest, Fetcher};
use crate::rules::{NativeScripts, RuleSet};
use crate::url::MediaKind;

use super::{
    Caption, Frame, HitTarget, HostChannel, HostRequest, Indicator, InputEvent, PointerEvent,
    PresentationStateMachine, Surface,
};

pub type TestMachine = PresentationStateMachine<PageSnapshot, RecordingSurface, RecordingFetcher, RecordingHost>;

#[derive(Debug, Default)]
pub struct RecordingSurface {
    /// Size reported for any media once it is ready.
    pub default_size: Option<Size>,
    pub sizes: HashMap<String, Size>,
    /// Loads become ready as soon as they start.
    pub instant: bool,
    pub ready: bool,
    pub loaded: Option<String>,
    pub loads: Vec<String>,
    pub indicators: Vec<Indicator>,
    pub placed: Vec<Frame>,
    pub caption: Option<Caption>,
    pub caption_visible: bool,
    pub fades: Vec<Duration>,
    pub hides: usize,
    pub preloads: Vec<String>,
    pub cursor_hidden: bool,
}

impl RecordingSurface {
    pub fn instant(size: Size) -> Self {
        RecordingSurface { default_size: Some(size), instant: true, ..Default::default() }
    }

    pub fn slow(size: Size) -> Self {
        RecordingSurface { default_size: Some(size), ..Default::default() }
    }
}

impl Surface for RecordingSurface {
    fn show_indicator(&mut self, indicator: Indicator, _at: Point) {
        self.indicators.push(indicator);
    }

    fn load_media(&mut self, url: &str, _kind: MediaKind) {
        self.loaded = Some(url.to_string());
        self.loads.push(url.to_string());
        self.ready = self.instant;
    }

    fn natural_size(&self) -> Option<Size> {
        if !self.ready {
            return None;
        }
        let url = self.loaded.as_ref()?;
        self.sizes.get(url).copied().or(self.default_size)
    }

    fn place(&mut self, frame: Frame) {
        self.placed.push(frame);
    }

    fn set_caption(&mut self, caption: Option<&Caption>) {
        self.caption = caption.cloned();
    }

    fn set_caption_visible(&mut self, visible: bool) {
        self.caption_visible = visible;
    }

    fn fade_out(&mut self, duration: Duration) {
        self.fades.push(duration);
    }

    fn hide(&mut self) {
        self.hides += 1;
        self.loaded = None;
        self.ready = false;
    }

    fn preload(&mut self, url: &str) {
        self.preloads.push(url.to_string());
    }

    fn set_cursor_hidden(&mut self, hidden: bool) {
        self.cursor_hidden = hidden;
    }
}

#[derive(Debug, Default)]
pub struct RecordingFetcher {
    pub requests: Vec<FetchRequest>,
}

impl Fetcher for RecordingFetcher {
    fn fetch(&mut self, request: &FetchRequest) {
        self.requests.push(request.clone());
    }
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub sent: Vec<HostRequest>,
}

impl HostChannel for RecordingHost {
    fn send(&mut self, request: HostRequest) {
        self.sent.push(request);
    }
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// A page with one link at (20, 20)-(220, 60).
pub fn link_page(href: &str) -> (PageSnapshot, ElementId) {
    let (mut page, body) =
        PageSnapshot::with_body(Url::parse("https://page.test/").unwrap(), Size::new(1280.0, 800.0));
    let link = page.add(
        Some(body),
        ElementBuilder::new("a").href(href).text("open").rect(Rect::new(20.0, 20.0, 200.0, 40.0)),
    );
    (page, link)
}

/// Two links stacked vertically: the first at (20, 20), the second at (20, 100).
pub fn two_link_page(first: &str, second: &str) -> (PageSnapshot, ElementId, ElementId) {
    let (mut page, link) = link_page(first);
    let body = page.element(link).and_then(|el| el.parent).unwrap();
    let other = page.add(
        Some(body),
        ElementBuilder::new("a").href(second).text("open").rect(Rect::new(20.0, 100.0, 200.0, 40.0)),
    );
    (page, link, other)
}

pub fn machine(config: Value, page: PageSnapshot, surface: RecordingSurface) -> TestMachine {
    let config: Config = serde_json::from_value(config).unwrap();
    let (rules, skipped) = RuleSet::compile(&config.sieve, &NativeScripts::new());
    assert!(skipped.is_empty(), "unexpected skips: {skipped:?}");
    PresentationStateMachine::new(
        Arc::new(config),
        Arc::new(rules),
        page,
        surface,
        RecordingFetcher::default(),
        RecordingHost::default(),
    )
}

pub fn over(id: ElementId) -> InputEvent {
    InputEvent::PointerOver(PointerEvent::new(Point::new(50.0, 40.0), HitTarget::Page(id)))
}

/// Moves the pointer off the page.
pub fn away() -> InputEvent {
    InputEvent::PointerMove(PointerEvent::new(Point::new(900.0, 700.0), HitTarget::Outside))
}
