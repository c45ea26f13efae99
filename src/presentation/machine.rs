use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::album::{AlbumItem, AlbumNav, AlbumStore};
use crate::annotations::{Annotations, Resolution, Thumbnail};
use crate::config::{Config, Trigger, TriggerMode};
use crate::engine::{Enlarge, EngineSettings, FindOutcome, PendingResolve, Probe, RuleEngine, TargetDetails, is_enlargeable};
use crate::error::{MediaLoadError, ResolveFetchError};
use crate::page::{ElementId, Page, Point, Rect, Size};
use crate::resolve::{Dispatch, FetchReply, Fetcher, Interpreted, Payload, RequestId, ResolveOrchestrator, ResolveRequest};
use crate::rules::RuleSet;
use crate::sanitize::plain_text;
use crate::timers::{TimerCoordinator, TimerKind};
use crate::url::{MediaKind, http_prepend, strip_hash};

use super::events::{
    Buttons, EventDisposition, HitTarget, InputEvent, KeyEvent, MediaEvent, Modifiers, MouseButton, PointerEvent,
};
use super::host::{HostChannel, HostRequest};
use super::keys::Key;
use super::layout::{self, Frame, ZOOM_STEP};
use super::state::{Freeze, FullZoom, Indicator, PresentationState};
use super::surface::{Caption, Surface};

/// A hover this soon after an unanimated hide skips the hover delay.
const INSTANT_WINDOW: Duration = Duration::from_millis(200);
/// Waiting for an `hz.delay` below this is pointless even with `waitHide`.
const INSTANT_DELAY_MS: u64 = 15;
const IMAGE_POLL: Duration = Duration::from_millis(100);
const VIDEO_POLL: Duration = Duration::from_millis(300);
const SVG_PROBE_PERIOD: Duration = Duration::from_millis(100);
const SVG_PROBE_ATTEMPTS: u32 = 300;
const CAPTION_FLASH_PERIOD: Duration = Duration::from_millis(150);
const MAX_CAPTION_FLASHES: u32 = 5;
/// `ldrDelay` values at or below this show the indicator at once.
const MIN_LOADER_DELAY_MS: u64 = 20;
const MIN_IDLE_CURSOR_MS: u64 = 50;
const MIN_SCROLL_DELAY_MS: u64 = 20;
/// Media this large on either axis may be swapped for its hi-res variant in full zoom.
const HI_RES_FZ_MIN_SIDE: f64 = 800.0;
/// Wheel events in this corner of the viewport page through albums even in full zoom.
const FZ_PILE_CORNER: f64 = 50.0;

/// What loading the current target will do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Urls(Vec<String>),
    Resolve(PendingResolve),
    /// A resolve for the target is already outstanding.
    InFlight,
    ScriptError,
}

/// The hover preview controller.
///
/// Owns every piece of per-page state: the rule engine, annotations,
/// pending resolves, albums and timers. The host feeds it [`InputEvent`]s,
/// fetch replies and the passage of time; it answers through the
/// [`Surface`], the [`Fetcher`] and the [`HostChannel`].
///
/// Every entry point takes the current time. Timers that fell due before it
/// fire first, in order, each seeing its own due time as "now".
pub struct PresentationStateMachine<P: Page, S: Surface, F: Fetcher, H: HostChannel> {
    config: Arc<Config>,
    engine: RuleEngine,
    page: P,
    surface: S,
    fetcher: F,
    host: H,
    annotations: Annotations,
    resolver: ResolveOrchestrator,
    albums: AlbumStore,
    timers: TimerCoordinator,

    state: PresentationState,
    freeze: Freeze,
    trigger_held: bool,
    full_zoom: FullZoom,
    /// A target is being tracked; leaving it hides the popup.
    fire_hide: bool,
    target: Option<ElementId>,
    watch: Option<ElementId>,
    source: Option<Source>,
    pointer: Point,
    now: Duration,
    hide_time: Option<Duration>,
    viewport: Size,

    /// Indicator waiting for the delayed loader.
    loader_pending: Option<Indicator>,
    indicator: Option<Indicator>,
    current: Option<String>,
    media_kind: MediaKind,
    frame: Option<Frame>,
    target_box: Option<Rect>,
    preloaded: HashSet<String>,

    svg_attempts: u32,
    caption_flashes: u32,
    caption_hidden: bool,
    last_scroll_target: Option<ElementId>,
    last_wheel: Option<Duration>,
    drag_moved: bool,
    suppress_context_menu: bool,
    node_to_reset: Option<ElementId>,
    hi_res_pref: bool,
    history_pref: bool,
    album_search: Option<String>,
}

impl<P: Page, S: Surface, F: Fetcher, H: HostChannel> PresentationStateMachine<P, S, F, H> {
    pub fn new(config: Arc<Config>, rules: Arc<RuleSet>, page: P, surface: S, fetcher: F, host: H) -> Self {
        let engine = RuleEngine::new(rules, EngineSettings::from(&config.hz));
        let viewport = page.viewport();
        let mut machine = PresentationStateMachine {
            config,
            engine,
            page,
            surface,
            fetcher,
            host,
            annotations: Annotations::new(),
            resolver: ResolveOrchestrator::new(),
            albums: AlbumStore::new(),
            timers: TimerCoordinator::new(),
            state: PresentationState::Uninitialized,
            freeze: Freeze::Off,
            trigger_held: false,
            full_zoom: FullZoom::Off,
            fire_hide: false,
            target: None,
            watch: None,
            source: None,
            pointer: Point::default(),
            now: Duration::ZERO,
            hide_time: None,
            viewport,
            loader_pending: None,
            indicator: None,
            current: None,
            media_kind: MediaKind::Image,
            frame: None,
            target_box: None,
            preloaded: HashSet::new(),
            svg_attempts: 0,
            caption_flashes: 0,
            caption_hidden: false,
            last_scroll_target: None,
            last_wheel: None,
            drag_moved: false,
            suppress_context_menu: false,
            node_to_reset: None,
            hi_res_pref: false,
            history_pref: false,
            album_search: None,
        };
        machine.apply_config();
        machine
    }

    // --- Accessors ---

    pub fn state(&self) -> PresentationState {
        self.state
    }

    pub fn freeze(&self) -> Freeze {
        self.freeze
    }

    pub fn full_zoom(&self) -> FullZoom {
        self.full_zoom
    }

    pub fn target(&self) -> Option<ElementId> {
        self.target
    }

    /// URL of the media being loaded or shown.
    pub fn current_media(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Indicator currently on screen.
    pub fn indicator(&self) -> Option<Indicator> {
        self.indicator
    }

    pub fn frame(&self) -> Option<Frame> {
        self.frame
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn albums(&self) -> &AlbumStore {
        &self.albums
    }

    pub fn timers(&self) -> &TimerCoordinator {
        &self.timers
    }

    /// When the host should call [`advance`](Self::advance) next.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_due()
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// The page may change under the machine; report edits through
    /// [`InputEvent::AttributeChanged`].
    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut F {
        &mut self.fetcher
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    // --- Entry points ---

    /// Fires every timer due at or before `at`.
    pub fn advance(&mut self, at: Duration) {
        while let Some((kind, due)) = self.timers.pop_due(at) {
            self.now = due;
            self.fire(kind);
        }
        self.now = self.now.max(at);
    }

    pub fn dispatch(&mut self, at: Duration, event: InputEvent) -> EventDisposition {
        self.advance(at);
        if !self.state.is_enabled() {
            if let InputEvent::KeyDown(key) = &event {
                if self.is_toggle_chord(key) {
                    self.toggle(at);
                    return EventDisposition::Consume;
                }
            }
            return EventDisposition::Pass;
        }
        match event {
            InputEvent::PointerOver(p) => self.on_pointer_over(p),
            InputEvent::PointerMove(p) => self.on_pointer_move(p),
            InputEvent::PointerLeave(p) => self.on_pointer_leave(p),
            InputEvent::PointerDown(p, button) => self.on_pointer_down(p, button),
            InputEvent::PointerUp(p, button) => self.on_pointer_up(p, button),
            InputEvent::ContextMenu(_) => {
                if std::mem::take(&mut self.suppress_context_menu) {
                    EventDisposition::Consume
                } else {
                    EventDisposition::Pass
                }
            }
            InputEvent::Wheel { pointer, delta_x, delta_y } => self.on_wheel(pointer, delta_x, delta_y),
            InputEvent::KeyDown(key) => self.on_key_down(key),
            InputEvent::KeyUp(key) => self.on_key_up(key),
            InputEvent::Resize(size) => {
                self.viewport = size;
                if self.state == PresentationState::Shown {
                    self.place();
                }
                EventDisposition::Pass
            }
            InputEvent::VisibilityChange { hidden } => {
                self.on_visibility(hidden);
                EventDisposition::Pass
            }
            InputEvent::AttributeChanged { element, name } => {
                self.on_attribute_changed(element, &name);
                EventDisposition::Pass
            }
            InputEvent::Media(MediaEvent::Ready) => {
                self.on_media_ready();
                EventDisposition::Pass
            }
            InputEvent::Media(MediaEvent::Failed(err)) => {
                self.on_media_error(err);
                EventDisposition::Pass
            }
        }
    }

    /// Delivers the reply to a [`FetchRequest`](crate::resolve::FetchRequest).
    ///
    /// Replies for requests that were superseded, or that arrive after the
    /// pointer moved on, never disturb what is displayed.
    pub fn handle_fetch_reply(&mut self, at: Duration, id: RequestId, reply: Result<FetchReply, ResolveFetchError>) {
        self.advance(at);
        self.apply_reply(id, reply);
    }

    /// Moves through the album of the current target.
    ///
    /// Returns `false` when no album is displayed.
    pub fn navigate_album(&mut self, at: Duration, nav: AlbumNav) -> bool {
        self.advance(at);
        if !self.state.is_active() {
            return false;
        }
        let Some(target) = self.target else { return false };
        if self.album_key(target).is_none() {
            return false;
        }
        if let AlbumNav::Search(pattern) = &nav {
            self.album_search = Some(pattern.clone());
        }
        self.show_album(Some(nav), true);
        true
    }

    /// Switches previews off or back on.
    pub fn toggle(&mut self, at: Duration) {
        self.advance(at);
        if self.state.is_enabled() {
            self.shut_down();
            self.state = PresentationState::Disabled;
            info!("previews disabled");
        } else {
            self.apply_config();
            info!(state = ?self.state, "previews enabled");
        }
    }

    /// Replaces the configuration and rule set. Cached page state is dropped.
    pub fn reconfigure(&mut self, at: Duration, config: Arc<Config>, rules: Arc<RuleSet>) {
        self.advance(at);
        self.shut_down();
        self.engine = RuleEngine::new(rules, EngineSettings::from(&config.hz));
        self.config = config;
        self.annotations.clear();
        self.albums.clear();
        self.preloaded.clear();
        // Replies to requests made under the old rules become no-ops.
        self.resolver = ResolveOrchestrator::new();
        self.apply_config();
    }

    fn apply_config(&mut self) {
        self.hi_res_pref = self.config.hz.hi_res;
        self.history_pref = self.config.hz.history;
        self.freeze = Freeze::from_bool(self.hold_to_show());
        self.trigger_held = false;
        match self.config.validate() {
            Ok(()) => self.state = PresentationState::Idle,
            Err(err) => {
                error!(%err, "configuration unusable, previews disabled");
                self.state = PresentationState::Disabled;
            }
        }
    }

    fn shut_down(&mut self) {
        if self.state.is_enabled() {
            self.reset(false);
        }
        self.timers.cancel_all();
        self.resolver.cancel_queued();
        self.fire_hide = false;
        self.target = None;
        self.watch = None;
        self.source = None;
        self.hide_time = None;
    }

    fn fire(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Preview => self.load(),
            TimerKind::Resolver => self.dispatch_resolve(),
            TimerKind::DelayedLoader => self.delayed_loader(),
            TimerKind::AnimEnd => {
                if self.state == PresentationState::Hiding {
                    self.reset(false);
                }
            }
            TimerKind::ContentReady => self.poll_content(),
            TimerKind::SvgProbe => self.probe_svg(),
            TimerKind::IdleCursor => self.surface.set_cursor_hidden(true),
            TimerKind::CaptionFlash => self.flash_caption(),
        }
    }

    // --- Trigger and freeze ---

    fn hold_to_show(&self) -> bool {
        self.config.hz.trigger_mode() == TriggerMode::HoldToShow
    }

    fn hold_to_suppress(&self) -> bool {
        self.config.hz.trigger_mode() == TriggerMode::HoldToSuppress
    }

    /// Whether the trigger was held during a pointer event.
    fn trigger_in(&self, modifiers: Modifiers, buttons: Buttons) -> bool {
        match self.config.hz.act_trigger {
            Trigger::None => false,
            Trigger::Ctrl => modifiers.contains(Modifiers::CTRL),
            Trigger::Shift => modifiers.contains(Modifiers::SHIFT),
            Trigger::Alt => modifiers.contains(Modifiers::ALT),
            Trigger::Meta => modifiers.contains(Modifiers::META),
            Trigger::RightButton => buttons.contains(Buttons::RIGHT),
        }
    }

    fn is_toggle_chord(&self, key: &KeyEvent) -> bool {
        key.modifiers.contains(Modifiers::ALT | Modifiers::SHIFT) && key.key.as_str() == self.config.keys.toggle
    }

    fn press_trigger(&mut self, repeat: bool) -> EventDisposition {
        if self.trigger_held || repeat || self.freeze == Freeze::PendingRelease {
            return EventDisposition::Pass;
        }
        if self.fire_hide && !self.state.is_active() {
            if self.hold_to_suppress() {
                self.leave_target();
                self.hide();
            } else {
                self.load();
            }
        }
        self.freeze = Freeze::from_bool(self.hold_to_suppress());
        self.trigger_held = true;
        EventDisposition::Pass
    }

    fn release_trigger(&mut self) {
        self.freeze = Freeze::from_bool(self.hold_to_show());
        self.trigger_held = false;
    }

    /// Suppresses hovering until the pointer moves.
    fn scroll_freeze(&mut self, pointer: Option<Point>) {
        if self.freeze.is_frozen() || self.trigger_held {
            return;
        }
        if let Some(at) = pointer {
            if self.fire_hide {
                self.leave_target();
                self.hide();
            }
            self.pointer = at;
        }
        self.freeze = Freeze::PendingRelease;
    }

    fn release_scroll_freeze(&mut self, p: PointerEvent) {
        self.freeze = Freeze::from_bool(self.hold_to_show());
        let rehover = match p.target {
            HitTarget::Page(id) => self.last_scroll_target != Some(id),
            _ => false,
        };
        self.last_scroll_target = None;
        if rehover {
            self.hide_time = None;
            self.on_pointer_over(p);
        }
    }

    // --- Pointer ---

    fn on_pointer_over(&mut self, p: PointerEvent) -> EventDisposition {
        let held = self.trigger_in(p.modifiers, p.buttons);
        if self.hold_to_suppress() && (self.freeze.is_frozen() || held) {
            return EventDisposition::Pass;
        }
        if self.fire_hide {
            match p.target {
                HitTarget::Popup => return EventDisposition::Pass,
                HitTarget::Page(id) if self.target == Some(id) => return EventDisposition::Pass,
                _ => {}
            }
            self.leave_target();
            if !matches!(p.target, HitTarget::Page(_)) {
                self.hide();
                return EventDisposition::Pass;
            }
        }
        let HitTarget::Page(id) = p.target else { return EventDisposition::Pass };
        self.hover(id, p, held);
        EventDisposition::Pass
    }

    fn hover(&mut self, id: ElementId, p: PointerEvent, held: bool) {
        if self.annotations.is_non_viable(id) {
            if self.fire_hide {
                self.hide();
            }
            return;
        }
        let source = match self.cached_source(id) {
            Some(source) => source,
            None => match self.find_source(id, p.at) {
                Some(source) => source,
                None => {
                    self.annotations.entry(id).non_viable = true;
                    if self.fire_hide {
                        self.hide();
                    }
                    return;
                }
            },
        };

        if let Source::Resolve(pending) = &source {
            self.arm_resolve(pending.clone());
        }
        self.target = Some(id);
        self.source = Some(source);
        self.pointer = p.at;

        let config = Arc::clone(&self.config);
        let hz = &config.hz;
        let frozen = self.hold_to_show() && self.freeze.is_frozen() && !held;
        if !frozen
            && (!hz.wait_hide || hz.delay < INSTANT_DELAY_MS)
            && ((self.fire_hide && self.state.is_active())
                || self.state == PresentationState::Hiding
                || self.recently_hidden())
        {
            self.hide_time = None;
            self.fire_hide = true;
            self.timers.cancel(TimerKind::AnimEnd);
            self.load();
            return;
        }
        if self.fire_hide && self.state.is_active() && (hz.wait_hide || self.hold_to_show()) {
            self.hide();
        }
        self.fire_hide = true;
        if frozen {
            self.timers.cancel(TimerKind::Resolver);
            self.resolver.cancel_queued();
            return;
        }
        let delay = if (self.state == PresentationState::Hiding || self.hide_time.is_some()) && hz.wait_hide {
            hz.anim.max_delay()
        } else {
            hz.delay()
        };
        if delay.is_zero() {
            self.load();
        } else {
            self.timers.schedule(TimerKind::Preview, self.now, delay);
        }
    }

    fn recently_hidden(&self) -> bool {
        self.hide_time.is_some_and(|t| self.now.saturating_sub(t) < INSTANT_WINDOW)
    }

    /// Stops tracking the current target.
    fn leave_target(&mut self) {
        for kind in [TimerKind::Preview, TimerKind::ContentReady, TimerKind::SvgProbe, TimerKind::Resolver] {
            self.timers.cancel(kind);
        }
        if let Some(pending) = self.resolver.cancel_queued() {
            debug!(url = %pending.url, "queued resolve dropped");
        }
        if let Some(id) = self.node_to_reset.take() {
            self.annotations.invalidate(id);
        }
        self.surface.set_caption_visible(false);
        self.target = None;
        self.watch = None;
        self.source = None;
    }

    fn cached_source(&self, id: ElementId) -> Option<Source> {
        match self.annotations.get(id)?.resolution.as_ref()? {
            Resolution::Urls(urls) => Some(Source::Urls(urls.clone())),
            Resolution::Awaiting(pending) => Some(Source::Resolve(pending.clone())),
            Resolution::InFlight(_) => Some(Source::InFlight),
        }
    }

    fn find_source(&mut self, id: ElementId, at: Point) -> Option<Source> {
        match self.engine.find(&self.page, &self.annotations, &Probe::Element(id), Some(at)) {
            FindOutcome::Resolved(found) => {
                self.record_details(id, found.details);
                self.annotations.entry(id).resolution = Some(Resolution::Urls(found.urls.clone()));
                if self.config.hz.preload == 2 {
                    self.preload_candidates(&found.urls);
                }
                Some(Source::Urls(found.urls))
            }
            FindOutcome::Pending(pending, details) => {
                self.record_details(id, details);
                Some(Source::Resolve(pending))
            }
            FindOutcome::NoMatch => None,
            FindOutcome::CompileError(err) => {
                debug!(%err, "rule failed while hovering");
                Some(Source::ScriptError)
            }
        }
    }

    fn record_details(&mut self, id: ElementId, details: TargetDetails) {
        self.watch = details.watch;
        let entry = self.annotations.entry(id);
        if details.caption.is_some() {
            entry.caption = details.caption;
        }
        entry.thumbnail = details.thumbnail;
        entry.fallback_zoom = details.fallback_zoom;
        entry.no_history = details.no_history;
        entry.overflow_parent = details.overflow_parent;
    }

    fn on_pointer_move(&mut self, p: PointerEvent) -> EventDisposition {
        if self.freeze == Freeze::PendingRelease {
            if p.at != self.pointer {
                self.release_scroll_freeze(p);
            }
            return EventDisposition::Pass;
        }
        if self.full_zoom.is_on() {
            self.full_zoom_move(p);
            return EventDisposition::Pass;
        }
        if p.at == self.pointer {
            return EventDisposition::Pass;
        }
        self.pointer = p.at;
        if self.hold_to_show() && self.freeze.is_frozen() && !self.trigger_in(p.modifiers, p.buttons) {
            return EventDisposition::Pass;
        }

        if !self.state.is_active() {
            if self.config.hz.delay_on_idle
                && self.fire_hide
                && self.state == PresentationState::Idle
                && self.timers.is_pending(TimerKind::Preview)
            {
                self.timers.cancel(TimerKind::Resolver);
                self.timers.schedule(TimerKind::Preview, self.now, self.config.hz.delay());
            }
            return EventDisposition::Pass;
        }

        let left = match p.target {
            HitTarget::Popup => self.target_box.is_some_and(|b| !b.contains(p.at)),
            HitTarget::Page(id) => self.target != Some(id),
            HitTarget::Outside => true,
        };
        if left {
            self.leave_target();
            self.hide();
            return EventDisposition::Pass;
        }
        if p.target == HitTarget::Popup && self.config.hz.hide_idle_cursor >= MIN_IDLE_CURSOR_MS {
            self.surface.set_cursor_hidden(false);
            self.timers.schedule(
                TimerKind::IdleCursor,
                self.now,
                Duration::from_millis(self.config.hz.hide_idle_cursor),
            );
        }
        if self.config.hz.follow_pointer {
            match self.state {
                PresentationState::Shown => self.place(),
                _ => {
                    if let Some(indicator) = self.indicator {
                        self.surface.show_indicator(indicator, self.pointer);
                    }
                }
            }
        }
        EventDisposition::Pass
    }

    fn full_zoom_move(&mut self, p: PointerEvent) {
        let (dx, dy) = (p.at.x - self.pointer.x, p.at.y - self.pointer.y);
        self.pointer = p.at;
        let Some(mut frame) = self.frame else { return };
        match self.full_zoom {
            FullZoom::Dragging => {
                frame.rect.left += dx;
                frame.rect.top += dy;
                self.drag_moved = true;
            }
            FullZoom::Fit => {
                let size = Size::new(frame.rect.width, frame.rect.height);
                let at = layout::follow_position(size, p.at, self.viewport);
                frame.rect.left = at.x;
                frame.rect.top = at.y;
            }
            FullZoom::Pan | FullZoom::Off => return,
        }
        self.frame = Some(frame);
        self.surface.place(frame);
    }

    fn on_pointer_leave(&mut self, p: PointerEvent) -> EventDisposition {
        if self.fire_hide && !self.full_zoom.is_on() {
            self.pointer = p.at;
            self.leave_target();
            self.hide();
        }
        EventDisposition::Pass
    }

    fn on_pointer_down(&mut self, p: PointerEvent, button: MouseButton) -> EventDisposition {
        match button {
            MouseButton::Left if self.full_zoom == FullZoom::Pan => {
                self.full_zoom = FullZoom::Dragging;
                self.drag_moved = false;
                self.pointer = p.at;
                EventDisposition::Consume
            }
            MouseButton::Right if self.config.hz.act_trigger == Trigger::RightButton => self.press_trigger(false),
            MouseButton::Right
                if self.config.hz.fz_on_press != 0
                    && self.state == PresentationState::Shown
                    && !self.full_zoom.is_on() =>
            {
                self.enter_full_zoom(p.modifiers.contains(Modifiers::SHIFT));
                self.suppress_context_menu = true;
                EventDisposition::Consume
            }
            _ => EventDisposition::Pass,
        }
    }

    fn on_pointer_up(&mut self, p: PointerEvent, button: MouseButton) -> EventDisposition {
        match button {
            MouseButton::Left if self.full_zoom.is_on() => {
                if self.full_zoom == FullZoom::Dragging {
                    self.full_zoom = FullZoom::Pan;
                    if self.drag_moved {
                        return EventDisposition::Consume;
                    }
                }
                if p.target == HitTarget::Popup {
                    self.reset(true);
                    return EventDisposition::Consume;
                }
                EventDisposition::Pass
            }
            MouseButton::Right if self.trigger_held && self.config.hz.act_trigger == Trigger::RightButton => {
                self.release_trigger();
                if self.state.is_active() {
                    self.suppress_context_menu = true;
                }
                EventDisposition::Pass
            }
            _ => EventDisposition::Pass,
        }
    }

    fn on_wheel(&mut self, p: PointerEvent, delta_x: f64, delta_y: f64) -> EventDisposition {
        if p.at.x >= self.viewport.width || p.at.y >= self.viewport.height {
            return EventDisposition::Pass;
        }
        let config = Arc::clone(&self.config);
        let hz = &config.hz;
        if self.state.is_active() {
            let throttled = hz.scroll_delay >= MIN_SCROLL_DELAY_MS
                && self.last_wheel.is_some_and(|t| self.now.saturating_sub(t) < Duration::from_millis(hz.scroll_delay));
            if !throttled {
                self.last_wheel = Some(self.now);
            }
            let album = self.target.and_then(|t| self.album_key(t)).is_some();
            let in_corner = p.at.x < FZ_PILE_CORNER && p.at.y < FZ_PILE_CORNER;
            if album && hz.pile_wheel != 0 && (!self.full_zoom.is_on() || in_corner) {
                let forward = if hz.pile_wheel == 2 {
                    if delta_x == 0.0 {
                        return EventDisposition::Pass;
                    }
                    delta_x > 0.0
                } else {
                    delta_y > 0.0
                };
                if !throttled {
                    self.show_album(Some(AlbumNav::Step(if forward { 1 } else { -1 })), true);
                }
                return EventDisposition::Consume;
            }
            if self.full_zoom.is_on() {
                let factor = if delta_y > 0.0 { 1.0 / ZOOM_STEP } else { ZOOM_STEP };
                let around = (self.full_zoom != FullZoom::Fit).then_some(p.at);
                self.zoom_by(factor, around);
                return EventDisposition::Consume;
            }
            self.last_scroll_target = self.target;
            self.reset(false);
        }
        if self.full_zoom.is_on() {
            return EventDisposition::Pass;
        }
        if let HitTarget::Page(id) = p.target {
            if self.last_scroll_target.is_none() {
                self.last_scroll_target = Some(id);
            }
        }
        self.scroll_freeze(Some(p.at));
        EventDisposition::Pass
    }

    fn on_visibility(&mut self, hidden: bool) {
        if hidden {
            if self.fire_hide && !self.full_zoom.is_on() {
                self.leave_target();
                self.hide();
            }
            return;
        }
        if self.trigger_held {
            self.release_trigger();
        } else if self.freeze == Freeze::PendingRelease {
            self.freeze = Freeze::from_bool(self.hold_to_show());
        }
    }

    fn on_attribute_changed(&mut self, element: ElementId, name: &str) {
        if !matches!(name, "href" | "src" | "srcset" | "style" | "alt" | "title") {
            return;
        }
        if self.target == Some(element) || (self.target.is_some() && self.watch == Some(element)) {
            self.node_to_reset = self.target;
        } else {
            self.annotations.invalidate(element);
        }
    }

    // --- Keyboard ---

    fn on_key_down(&mut self, k: KeyEvent) -> EventDisposition {
        let config = Arc::clone(&self.config);
        let keys = &config.keys;
        if k.key.is_modifier() {
            if config.hz.act_trigger.key_name() == Some(k.key.as_str()) {
                return self.press_trigger(k.repeat);
            }
            return EventDisposition::Pass;
        }
        if !k.repeat && self.trigger_held {
            self.release_trigger();
        }

        let key = k.key.as_str();
        let shift = k.shift();
        let alt = k.modifiers.contains(Modifiers::ALT);
        if !self.state.is_active() && self.fire_hide && key == Key::ESC {
            self.leave_target();
            self.hide();
        }
        if self.is_toggle_chord(&k) {
            self.toggle(self.now);
            return EventDisposition::Consume;
        }
        if alt || k.modifiers.contains(Modifiers::META) || !self.state.is_active() {
            return EventDisposition::Pass;
        }

        if (k.ctrl() && key == "S") || (!k.ctrl() && !shift && key == keys.save) {
            if !k.repeat {
                self.download();
            }
            return EventDisposition::Consume;
        }
        if k.ctrl() {
            if self.state == PresentationState::Shown && key == keys.open {
                return self.open_caption_links(shift);
            }
            return EventDisposition::Pass;
        }

        match key {
            "-" => self.zoom_by(1.0 / ZOOM_STEP, None),
            "+" | "=" => self.zoom_by(ZOOM_STEP, None),
            Key::TAB => {
                if shift {
                    self.hi_res_pref = !self.hi_res_pref;
                }
                self.toggle_hi_res();
            }
            Key::ESC => self.reset(true),
            _ if key == keys.full_zoom || key == Key::ENTER => self.full_zoom_key(shift),
            "Space" | "Left" | "Right" | "PgUp" | "PgDn" | "Home" | "End" => return self.album_key_nav(key, shift),
            _ if key == keys.history => {
                if shift {
                    self.history_pref = !self.history_pref;
                    info!(enabled = self.history_pref, "history recording toggled");
                } else {
                    self.record_history(true);
                }
            }
            _ if key == keys.caption => {
                self.caption_hidden = !self.caption_hidden;
                self.update_caption();
                self.surface.set_caption_visible(!self.caption_hidden);
            }
            _ if key == keys.open => self.open_media(shift),
            _ => return EventDisposition::Pass,
        }
        EventDisposition::Consume
    }

    fn on_key_up(&mut self, k: KeyEvent) -> EventDisposition {
        if self.trigger_held && self.config.hz.act_trigger.key_name() == Some(k.key.as_str()) {
            self.release_trigger();
        }
        EventDisposition::Pass
    }

    fn full_zoom_key(&mut self, shift: bool) {
        match self.full_zoom {
            FullZoom::Off => {
                if self.state == PresentationState::Shown {
                    self.enter_full_zoom(shift);
                }
            }
            _ if shift => {
                self.full_zoom = if self.full_zoom == FullZoom::Fit { FullZoom::Pan } else { FullZoom::Fit };
                self.place();
            }
            _ => self.reset(true),
        }
    }

    fn album_key_nav(&mut self, key: &str, shift: bool) -> EventDisposition {
        let Some(target) = self.target else { return EventDisposition::Pass };
        if self.album_key(target).is_none() {
            return EventDisposition::Pass;
        }
        let nav = match key {
            "End" if shift => match self.album_search.clone() {
                Some(pattern) => AlbumNav::Search(pattern),
                None => return EventDisposition::Consume,
            },
            "End" => AlbumNav::Last,
            "Home" => AlbumNav::First,
            _ => {
                let forward = matches!(key, "Right" | "PgDn") || (key == Key::SPACE && !shift);
                let stride = if shift && key != Key::SPACE { 5 } else { 1 };
                AlbumNav::Step(if forward { stride } else { -stride })
            }
        };
        self.show_album(Some(nav), true);
        EventDisposition::Consume
    }

    // --- Loading ---

    fn load(&mut self) {
        let Some(target) = self.target else { return };
        self.measure_target(target);
        if self.album_key(target).is_some() {
            self.show_album(None, false);
            return;
        }
        let Some(source) = self.source.take().or_else(|| self.cached_source(target)) else { return };
        match source {
            Source::ScriptError => self.show(Indicator::ScriptError),
            Source::InFlight => self.show(Indicator::Resolving),
            Source::Resolve(_) if self.resolve_armed(target) => self.show(Indicator::Resolving),
            Source::Resolve(pending) => self.request_resolve(pending),
            Source::Urls(urls) => self.set(urls),
        }
    }

    fn measure_target(&mut self, target: ElementId) {
        let boxed = self.annotations.get(target).and_then(|a| a.overflow_parent).unwrap_or(target);
        self.target_box = self.page.element(boxed).map(|el| el.rect);
    }

    fn request_resolve(&mut self, pending: PendingResolve) {
        if self.arm_resolve(pending) {
            self.show(Indicator::Resolving);
        } else {
            self.show_album(None, false);
        }
    }

    /// Queues `pending` and starts its debounce, which runs alongside the
    /// hover delay. Returns `false` when the album it points to is already
    /// cached and was attached to the target instead.
    fn arm_resolve(&mut self, pending: PendingResolve) -> bool {
        let key = strip_hash(&pending.url).to_string();
        if self.albums.contains(&key) {
            self.annotations.entry(pending.target).album = Some(key);
            return false;
        }
        let instant = !self.config.hz.wait_hide
            && (self.state.is_active() || self.state == PresentationState::Hiding || self.recently_hidden());
        if self.resolver.queue(pending, &mut self.annotations) {
            let delay = ResolveOrchestrator::debounce(self.config.hz.delay(), instant);
            self.timers.schedule(TimerKind::Resolver, self.now, delay);
        }
        true
    }

    fn resolve_armed(&self, target: ElementId) -> bool {
        self.timers.is_pending(TimerKind::Resolver) && self.resolver.queued().is_some_and(|q| q.target == target)
    }

    fn dispatch_resolve(&mut self) {
        if let Some(Dispatch::Local(id)) = self.resolver.dispatch(&mut self.annotations, &mut self.fetcher) {
            self.apply_reply(id, Ok(FetchReply::empty()));
        }
    }

    fn apply_reply(&mut self, id: RequestId, reply: Result<FetchReply, ResolveFetchError>) {
        let Some(request) = self.resolver.complete(id, &mut self.annotations) else {
            debug!(?id, "reply for a superseded request ignored");
            return;
        };
        if !self.state.is_enabled() {
            return;
        }
        let may_loop = !matches!(reply, Ok(FetchReply::Media { .. }));
        let interpreted = self.resolver.interpret(self.engine.rules(), &request, reply, &self.page);
        let trg = request.target;
        let current = self.fire_hide && self.target == Some(trg);
        if current && self.timers.cancel(TimerKind::Preview) {
            self.source = None;
            self.measure_target(trg);
        }
        match interpreted {
            Interpreted::Failed(_) => {
                if current && !self.try_fallback_zoom(trg) {
                    self.show(Indicator::LoadFailed);
                }
            }
            Interpreted::ScriptFailed(reason) => {
                debug!(url = %request.url, %reason, "resolve script failed");
                if current {
                    self.show(Indicator::ScriptError);
                }
            }
            Interpreted::Payload(Payload::Rejected) => {
                if current && self.try_fallback_zoom(trg) {
                    return;
                }
                if current {
                    self.leave_target();
                    self.hide();
                }
                let entry = self.annotations.entry(trg);
                entry.non_viable = true;
                entry.resolution = None;
            }
            Interpreted::Payload(Payload::NoResult) => {
                if current && !self.try_fallback_zoom(trg) {
                    self.show(Indicator::NoResult);
                }
            }
            Interpreted::Payload(Payload::Album { items, start }) => self.apply_album(&request, items, start, current),
            Interpreted::Payload(Payload::Media { urls, caption, force_loop }) => {
                self.apply_media(&request, urls, caption, may_loop, force_loop, current)
            }
        }
    }

    fn apply_album(&mut self, request: &ResolveRequest, items: Vec<AlbumItem>, start: usize, current: bool) {
        let key = strip_hash(&request.url).to_string();
        let first = match self.albums.open(&key, items, start) {
            Some(album) => album.current().url().map(str::to_string),
            None => {
                if current {
                    self.show(Indicator::NoResult);
                }
                return;
            }
        };
        self.annotations.entry(request.target).album = Some(key);
        if current {
            self.show_album(None, false);
        } else if self.config.hz.preload > 1 {
            if let Some(url) = first {
                self.preload(&url);
            }
        }
    }

    fn apply_media(
        &mut self,
        request: &ResolveRequest,
        mut urls: Vec<String>,
        caption: Option<String>,
        may_loop: bool,
        force_loop: bool,
        current: bool,
    ) {
        let trg = request.target;
        if let Some(caption) = caption.filter(|_| self.config.hz.cap_text) {
            self.annotations.entry(trg).caption = Some(plain_text(&caption));
        }
        let loops = force_loop || self.engine.rules().get(request.rule_id).is_some_and(|r| r.loops.has(request.loop_param));
        if may_loop && loops && urls.len() == 1 {
            let probe = Probe::Synthetic { href: urls[0].clone(), origin: trg, hops: 0 };
            match self.engine.find(&self.page, &self.annotations, &probe, None) {
                FindOutcome::Resolved(found) => urls = found.urls,
                FindOutcome::Pending(pending, _) => {
                    if current {
                        self.request_resolve(pending);
                    } else {
                        self.annotations.entry(trg).resolution = Some(Resolution::Awaiting(pending));
                    }
                    return;
                }
                FindOutcome::NoMatch => {}
                FindOutcome::CompileError(err) => {
                    debug!(%err, "rule failed on a resolved url");
                    if current {
                        self.show(Indicator::ScriptError);
                    }
                    return;
                }
            }
        }
        if current {
            self.set(urls);
        } else {
            if self.config.hz.preload > 1 {
                self.preload_candidates(&urls);
            }
            self.annotations.entry(trg).resolution = Some(Resolution::Urls(urls));
        }
    }

    fn try_fallback_zoom(&mut self, trg: ElementId) -> bool {
        let fallback = std::mem::take(&mut self.annotations.entry(trg).fallback_zoom);
        if fallback.is_empty() {
            return false;
        }
        self.set(fallback);
        true
    }

    fn prepare_url(&self, url: &str) -> String {
        let url = if url.starts_with("//") { http_prepend(url, None, &self.page.scheme()) } else { url.to_string() };
        url.replace("&amp;", "&")
    }

    /// Starts loading the first of `urls`; the rest are kept as fallbacks.
    ///
    /// Entries starting with `#` are hi-res variants: depending on the
    /// preference either they or the plain entries are loaded, the other
    /// group is stacked for the hi-res toggle.
    fn set(&mut self, urls: Vec<String>) {
        let Some(target) = self.target else { return };
        self.timers.cancel(TimerKind::ContentReady);
        self.timers.cancel(TimerKind::SvgProbe);

        let mut plain = Vec::new();
        let mut hi_res = Vec::new();
        for url in urls.iter().filter(|u| !u.is_empty()) {
            match url.strip_prefix('#') {
                Some(rest) => hi_res.push(self.prepare_url(rest)),
                None => plain.push(self.prepare_url(url)),
            }
        }
        let (list, stacked, hi_res_state) = match (plain.is_empty(), hi_res.is_empty()) {
            (true, _) => (hi_res, Vec::new(), None),
            (false, true) => (plain, Vec::new(), None),
            (false, false) if self.hi_res_pref => (hi_res, plain, Some(true)),
            (false, false) => (plain, hi_res, Some(false)),
        };
        let Some(first) = list.first().cloned() else {
            info!("no usable media url");
            self.show(Indicator::LoadFailed);
            return;
        };
        let kind = MediaKind::of(&first);
        {
            let entry = self.annotations.entry(target);
            if hi_res_state.is_some() {
                entry.hi_res = hi_res_state;
                entry.hi_res_stack = stacked;
            }
            entry.queue = list[1..].to_vec();
            entry.svg = kind == MediaKind::Svg;
            entry.resolution = Some(Resolution::Urls(list));
        }

        if self.current.as_deref() == Some(first.as_str()) {
            self.await_content(kind, false);
            return;
        }
        debug!(url = %first, ?kind, "loading media");
        self.current = Some(first.clone());
        self.media_kind = kind;
        self.surface.load_media(&first, kind);
        match kind {
            MediaKind::Svg => {
                self.svg_attempts = 0;
                self.show(Indicator::Loading);
                self.timers.schedule_every(TimerKind::SvgProbe, self.now, SVG_PROBE_PERIOD);
            }
            MediaKind::Video | MediaKind::Image => self.await_content(kind, true),
        }
    }

    fn await_content(&mut self, kind: MediaKind, show_loader: bool) {
        if self.content_ready() {
            self.assign_src();
            return;
        }
        if show_loader {
            self.show(Indicator::Loading);
        }
        let period = if kind == MediaKind::Video { VIDEO_POLL } else { IMAGE_POLL };
        self.timers.schedule_every(TimerKind::ContentReady, self.now, period);
    }

    fn content_ready(&self) -> bool {
        self.surface.natural_size().is_some_and(|s| !s.is_empty())
    }

    fn poll_content(&mut self) {
        if !self.fire_hide {
            self.timers.cancel(TimerKind::ContentReady);
            self.reset(false);
            return;
        }
        if self.content_ready() {
            self.timers.cancel(TimerKind::ContentReady);
            self.assign_src();
        }
    }

    fn probe_svg(&mut self) {
        self.svg_attempts += 1;
        if self.content_ready() {
            self.timers.cancel(TimerKind::SvgProbe);
            self.assign_src();
        } else if self.svg_attempts >= SVG_PROBE_ATTEMPTS {
            self.timers.cancel(TimerKind::SvgProbe);
            info!(url = self.current.as_deref().unwrap_or_default(), "svg never reported a size");
            self.show(Indicator::LoadFailed);
        }
    }

    fn on_media_ready(&mut self) {
        if self.current.is_none() || self.state == PresentationState::Shown {
            return;
        }
        self.timers.cancel(TimerKind::ContentReady);
        self.timers.cancel(TimerKind::SvgProbe);
        self.assign_src();
    }

    /// Falls back through the remaining candidates, the hi-res stack and the
    /// fallback zoom before giving up.
    fn on_media_error(&mut self, err: MediaLoadError) {
        let Some(target) = self.target else { return };
        if self.current.as_deref() != Some(err.url.as_str()) {
            debug!(url = %err.url, "error for media no longer displayed");
            return;
        }
        info!(%err, "media failed to load");
        self.timers.cancel(TimerKind::ContentReady);
        self.timers.cancel(TimerKind::SvgProbe);
        self.current = None;

        let entry = self.annotations.entry(target);
        entry.queue.retain(|u| *u != err.url);
        let next = if !entry.queue.is_empty() {
            std::mem::take(&mut entry.queue)
        } else if !entry.hi_res_stack.is_empty() {
            entry.hi_res = None;
            std::mem::take(&mut entry.hi_res_stack)
        } else {
            std::mem::take(&mut entry.fallback_zoom)
        };
        if next.is_empty() {
            entry.resolution = None;
            self.show(Indicator::LoadFailed);
        } else {
            self.set(next);
        }
    }

    fn assign_src(&mut self) {
        let Some(target) = self.target else { return };
        if self.switch_to_hi_res_in_full_zoom() {
            return;
        }
        let natural = self.surface.natural_size().unwrap_or_default();
        let album = self.album_key(target).is_some();
        if album {
            self.annotations.entry(target).thumbnail = None;
        } else if let Some(a) = self.annotations.get(target) {
            let untrusted_thumb = matches!(a.thumbnail, Some(Thumbnail { trusted: false, .. }));
            if !a.svg
                && untrusted_thumb
                && !is_enlargeable(&self.page, target, Enlarge::Candidate(natural), self.config.hz.zoomresized)
            {
                if !a.hi_res_stack.is_empty() && a.hi_res != Some(true) {
                    self.show(Indicator::Loading);
                    self.toggle_hi_res();
                    return;
                }
                if a.fallback_zoom.is_empty() {
                    self.not_enlargeable(target);
                    return;
                }
                self.annotations.entry(target).thumbnail = None;
            }
        }

        self.show_media();
        if self.history_pref {
            self.record_history(false);
        }
        let hz = &self.config.hz;
        if hz.hide_idle_cursor >= MIN_IDLE_CURSOR_MS {
            let delay = Duration::from_millis(hz.hide_idle_cursor);
            self.timers.schedule(TimerKind::IdleCursor, self.now, delay);
        }
        if album && hz.cap_flash_count > 0 && !self.caption_hidden {
            self.caption_flashes = 0;
            self.timers.schedule_every(TimerKind::CaptionFlash, self.now, CAPTION_FLASH_PERIOD);
        }
    }

    /// The media turned out no bigger than what the page shows.
    fn not_enlargeable(&mut self, target: ElementId) {
        debug!(element = target.0, "media is not larger than the element");
        self.annotations.invalidate(target);
        self.annotations.entry(target).non_viable = true;
        self.reset(false);
    }

    fn switch_to_hi_res_in_full_zoom(&mut self) -> bool {
        let threshold = self.config.hz.hi_res_on_fz;
        if !self.full_zoom.is_on() || threshold < 1.0 {
            return false;
        }
        let Some(target) = self.target else { return false };
        if self.annotations.get(target).and_then(|a| a.hi_res) != Some(false) {
            return false;
        }
        let Some(size) = self.surface.natural_size().filter(|s| !s.is_empty()) else { return false };
        if size.width < HI_RES_FZ_MIN_SIDE && size.height < HI_RES_FZ_MIN_SIDE {
            return false;
        }
        let ratio = size.width / size.height;
        let ratio = if ratio < 1.0 { 1.0 / ratio } else { ratio };
        if ratio < threshold {
            return false;
        }
        self.show(Indicator::Loading);
        self.toggle_hi_res();
        true
    }

    fn toggle_hi_res(&mut self) {
        let Some(target) = self.target else { return };
        let entry = self.annotations.entry(target);
        if entry.hi_res_stack.is_empty() {
            return;
        }
        let stacked = std::mem::take(&mut entry.hi_res_stack);
        let displayed = match entry.resolution.take() {
            Some(Resolution::Urls(urls)) => urls,
            other => {
                entry.resolution = other;
                self.current.iter().cloned().collect()
            }
        };
        let hi_res = !entry.hi_res.unwrap_or(false);
        self.surface.set_caption_visible(false);
        self.set(stacked);
        let entry = self.annotations.entry(target);
        entry.hi_res = Some(hi_res);
        entry.hi_res_stack = displayed;
    }

    fn preload(&mut self, url: &str) {
        if self.preloaded.insert(url.to_string()) {
            self.surface.preload(url);
        }
    }

    /// Preloads the candidate that [`set`](Self::set) would load first.
    fn preload_candidates(&mut self, urls: &[String]) {
        let wanted = urls.iter().find(|u| u.starts_with('#') == self.hi_res_pref).or_else(|| urls.first());
        if let Some(url) = wanted {
            let url = self.prepare_url(url.strip_prefix('#').unwrap_or(url));
            self.preload(&url);
        }
    }

    // --- Albums ---

    fn album_key(&self, target: ElementId) -> Option<String> {
        self.annotations.get(target)?.album.clone().filter(|key| self.albums.contains(key))
    }

    fn show_album(&mut self, nav: Option<AlbumNav>, manual: bool) {
        let Some(target) = self.target else { return };
        let Some(key) = self.album_key(target) else { return };
        let cyclic = self.config.hz.pile_cycle;
        let neighbour_count = if self.config.hz.preload < 3 { 1 } else { 3 };
        let shown = self.state == PresentationState::Shown;
        let Some(album) = self.albums.get_mut(&key) else { return };

        let previous = album.cursor();
        if let Some(nav) = &nav {
            let Some(next) = album.target(nav, cyclic) else { return };
            if next == previous && manual && shown {
                return;
            }
            album.navigate(nav, cyclic);
        }
        let item = album.current().clone();
        let neighbours: Vec<String> = album
            .neighbours(previous, neighbour_count)
            .into_iter()
            .filter_map(|i| album.item(i).and_then(|it| it.url()).map(str::to_string))
            .collect();
        debug!(album = %key, counter = %album.counter(), "album item");

        self.annotations.reset_load(target, true);
        if self.config.hz.cap_text {
            self.annotations.entry(target).caption = item.caption.as_deref().map(plain_text);
        }
        self.set(item.urls);
        for url in neighbours {
            let url = self.prepare_url(strip_hash_prefix(&url));
            self.preload(&url);
        }
    }

    fn flash_caption(&mut self) {
        self.caption_flashes += 1;
        let limit = self.config.hz.cap_flash_count.min(MAX_CAPTION_FLASHES) * 2;
        if self.caption_flashes >= limit {
            self.timers.cancel(TimerKind::CaptionFlash);
            self.surface.set_caption_visible(!self.caption_hidden);
            return;
        }
        self.surface.set_caption_visible(self.caption_flashes % 2 == 0);
    }

    // --- Display ---

    fn show(&mut self, indicator: Indicator) {
        self.timers.cancel(TimerKind::DelayedLoader);
        let ldr_delay = self.config.hz.ldr_delay;
        if ldr_delay > MIN_LOADER_DELAY_MS
            && !indicator.is_terminal()
            && self.state != PresentationState::Loading
            && !self.full_zoom.is_on()
        {
            self.state = PresentationState::Loading;
            self.loader_pending = Some(indicator);
            self.timers.schedule(TimerKind::DelayedLoader, self.now, Duration::from_millis(ldr_delay));
            return;
        }
        self.loader_pending = None;
        self.indicator = Some(indicator);
        self.state = PresentationState::Loading;
        self.frame = None;
        self.surface.show_indicator(indicator, self.pointer);
        debug!(?indicator, "indicator shown");
    }

    fn delayed_loader(&mut self) {
        if self.target.is_none() || self.state != PresentationState::Loading {
            return;
        }
        if let Some(indicator) = self.loader_pending.take() {
            self.indicator = Some(indicator);
            self.surface.show_indicator(indicator, self.pointer);
        }
    }

    fn show_media(&mut self) {
        self.timers.cancel(TimerKind::DelayedLoader);
        self.loader_pending = None;
        self.indicator = None;
        self.state = PresentationState::Shown;
        self.place();
        self.update_caption();
    }

    fn place(&mut self) {
        let natural = self.surface.natural_size().unwrap_or_default();
        let rect = if self.full_zoom.is_on() {
            let mut rect = layout::fit_frame(natural, self.viewport);
            if self.full_zoom == FullZoom::Fit {
                let at = layout::follow_position(Size::new(rect.width, rect.height), self.pointer, self.viewport);
                rect.left = at.x;
                rect.top = at.y;
            }
            rect
        } else {
            layout::popup_frame(natural, self.pointer, self.viewport, self.config.hz.min_popup_distance)
        };
        let frame = Frame { rect, full_zoom: self.full_zoom.is_on() };
        self.frame = Some(frame);
        self.surface.place(frame);
    }

    fn zoom_by(&mut self, factor: f64, around: Option<Point>) {
        let Some(mut frame) = self.frame else { return };
        frame.rect = layout::zoom(frame.rect, factor, around);
        if self.full_zoom == FullZoom::Fit {
            let at = layout::follow_position(Size::new(frame.rect.width, frame.rect.height), self.pointer, self.viewport);
            frame.rect.left = at.x;
            frame.rect.top = at.y;
        }
        self.frame = Some(frame);
        self.surface.place(frame);
    }

    fn enter_full_zoom(&mut self, shift: bool) {
        self.full_zoom = if (self.config.hz.fz_mode != 1) != !shift { FullZoom::Fit } else { FullZoom::Pan };
        debug!(mode = ?self.full_zoom, "full zoom");
        if self.switch_to_hi_res_in_full_zoom() {
            return;
        }
        self.place();
    }

    fn update_caption(&mut self) {
        let Some(target) = self.target else { return };
        let counter = self.album_key(target).and_then(|key| self.albums.get(&key).map(|a| a.counter()));
        let text = if self.config.hz.cap_text {
            self.annotations.caption(target).filter(|c| !c.is_empty()).map(str::to_string)
        } else {
            None
        };
        let dimensions = if self.config.hz.cap_wh { self.surface.natural_size() } else { None };
        let caption = Caption { counter, text, dimensions };
        if caption.is_empty() || self.caption_hidden {
            self.surface.set_caption(None);
        } else {
            self.surface.set_caption(Some(&caption));
            self.surface.set_caption_visible(true);
        }
    }

    /// Stops following the target, fading the popup out when animated.
    fn hide(&mut self) {
        self.fire_hide = false;
        self.surface.set_cursor_hidden(false);
        let anim = self.config.hz.anim.max_delay();
        match self.state {
            PresentationState::Shown if self.loader_pending.is_none() => {
                if anim.is_zero() || self.full_zoom.is_on() {
                    self.mark_hidden();
                    self.reset(false);
                    return;
                }
                self.state = PresentationState::Hiding;
                self.surface.set_caption_visible(false);
                self.surface.fade_out(anim);
                self.timers.schedule(TimerKind::AnimEnd, self.now, anim);
            }
            PresentationState::Loading if self.loader_pending.is_none() => {
                self.mark_hidden();
                self.reset(false);
            }
            PresentationState::Shown | PresentationState::Loading | PresentationState::Hiding => self.reset(false),
            _ => {}
        }
    }

    fn mark_hidden(&mut self) {
        if !self.config.hz.wait_hide {
            self.hide_time = Some(self.now);
        }
    }

    /// Takes the popup down at once.
    ///
    /// With `prevent_immediate_hover`, hovering stays suppressed until the
    /// pointer moves.
    fn reset(&mut self, prevent_immediate_hover: bool) {
        for kind in [
            TimerKind::DelayedLoader,
            TimerKind::ContentReady,
            TimerKind::SvgProbe,
            TimerKind::AnimEnd,
            TimerKind::IdleCursor,
            TimerKind::CaptionFlash,
        ] {
            self.timers.cancel(kind);
        }
        self.surface.hide();
        self.surface.set_cursor_hidden(false);
        self.current = None;
        self.indicator = None;
        self.loader_pending = None;
        self.frame = None;
        if self.full_zoom.is_on() {
            self.full_zoom = FullZoom::Off;
            self.hide_time = None;
        }
        self.state = PresentationState::Idle;
        if prevent_immediate_hover {
            self.last_scroll_target = self.target;
            self.scroll_freeze(None);
        }
    }

    // --- Host requests ---

    fn record_history(&mut self, manual: bool) {
        let Some(target) = self.target else { return };
        if !manual && self.annotations.get(target).is_some_and(|a| a.no_history) {
            return;
        }
        let url = match self.album_key(target) {
            Some(key) => {
                let Some(album) = self.albums.get_mut(&key) else { return };
                if album.in_history && !manual {
                    return;
                }
                album.in_history = true;
                key
            }
            None => match &self.current {
                Some(url) => url.clone(),
                None => return,
            },
        };
        debug!(%url, manual, "recording history");
        self.host.send(HostRequest::RecordHistory { url, manual });
    }

    fn download(&mut self) {
        let Some(current) = self.current.clone() else { return };
        let fallback = if self.media_kind == MediaKind::Video { "mp4" } else { "jpg" };
        let (url, ext) = match current.rsplit_once('#') {
            Some((url, ext)) if !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
                (url.to_string(), ext.to_string())
            }
            _ => (current, fallback.to_string()),
        };
        self.host.send(HostRequest::Download { url, ext });
    }

    fn open_caption_links(&mut self, shift: bool) -> EventDisposition {
        let Some(caption) = self.target.and_then(|t| self.annotations.caption(t)) else {
            return EventDisposition::Pass;
        };
        let urls: Vec<String> = regex!(r"\b((?:www\.[\w-]+(\.\S{2,7}){1,4}|https?://)\S+)")
            .find_iter(caption)
            .map(|m| {
                let link = m.as_str();
                if link.starts_with("www.") { format!("http://{link}") } else { link.to_string() }
            })
            .collect();
        if urls.is_empty() {
            return EventDisposition::Pass;
        }
        self.host.send(HostRequest::OpenTabs { urls, background: !shift });
        EventDisposition::Consume
    }

    fn open_media(&mut self, shift: bool) {
        let Some(target) = self.target else { return };
        let url = match self.album_key(target) {
            Some(key) => key,
            None => match &self.current {
                Some(url) => url.clone(),
                None => return,
            },
        };
        self.host.send(HostRequest::OpenTabs { urls: vec![url], background: shift });
    }
}

fn strip_hash_prefix(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}
