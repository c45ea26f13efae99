//! Hover previews for links and thumbnails.
//!
//! A sieve of rules turns a hovered element into media URLs ([`RuleEngine`]),
//! asynchronous rules are resolved through a host-supplied [`Fetcher`]
//! ([`ResolveOrchestrator`]), and [`PresentationStateMachine`] drives the
//! popup from input events on a caller-driven clock.

#[macro_use]
mod macros;
mod album;
mod annotations;
mod config;
mod engine;
mod error;
mod page;
mod presentation;
mod resolve;
mod rules;
mod sanitize;
mod timers;
mod url;

pub use album::{Album, AlbumItem, AlbumNav, AlbumStore};
pub use annotations::{Annotations, ElementAnnotation, Resolution, Thumbnail};
pub use config::{AnimDurations, Behavior, Config, KeyBindings, Trigger, TriggerMode};
pub use engine::{
    EngineSettings, Enlarge, FindOutcome, Found, MAX_LOOP_HOPS, PendingResolve, Probe, RuleEngine, TargetDetails,
    is_enlargeable,
};
pub use error::{ConfigError, MediaLoadError, ResolveFetchError, RuleCompileError, RuleField};
pub use page::{
    ComputedStyle, Display, Element, ElementBuilder, ElementId, Namespace, Page, PageSnapshot, Point, Position, Rect,
    Size,
};
pub use presentation::{
    Buttons, Caption, EventDisposition, Frame, Freeze, FullZoom, HitTarget, HostChannel, HostRequest, Indicator,
    InputEvent, Key, KeyEvent, MediaEvent, Modifiers, MouseButton, PointerEvent, PresentationState,
    PresentationStateMachine, Surface,
};
pub use resolve::{
    Dispatch, FetchReply, FetchRequest, Fetcher, Interpreted, Payload, RequestId, ResolveOrchestrator, ResolveRequest,
};
pub use rules::{CompiledRule, MatchKind, MatchKinds, NativeScripts, ResolveStrategy, RuleId, RuleSet, ScriptEngine};
pub use rules::{ScriptCall, ScriptFn, ScriptInput};
pub use sanitize::plain_text;
pub use timers::{TimerCoordinator, TimerKind};
pub use self::url::{MediaKind, http_prepend, normalize, strip_hash};
