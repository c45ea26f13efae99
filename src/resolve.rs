//! Asynchronous resolves: from a `PendingResolve` to a payload.
//!
//! The rule engine never fetches. When a rule needs the linked page, `find`
//! returns a [`PendingResolve`](crate::engine::PendingResolve) and this module
//! takes it from there:
//!
//! ```text
//! PendingResolve ──queue──> debounce timer ──dispatch──> Fetcher::fetch(FetchRequest)
//!                                                              │
//!                  (later, from the host event loop)           v
//! Interpreted <──interpret── complete(RequestId) <── FetchReply / ResolveFetchError
//! ```
//!
//! Requests are correlated through a [`SlotTable`]: ids of completed requests
//! are freed and their slots reused, and a reply carrying a freed id is a
//! silent no-op. Whether the reply still concerns the hovered element is the
//! state machine's call, not this module's.

#[path = "resolve/orchestrator.rs"]
mod orchestrator;
#[path = "resolve/payload.rs"]
mod payload;
#[path = "resolve/scrape.rs"]
mod scrape;
#[path = "resolve/slots.rs"]
mod slots;


#[allow(unused_imports)]
pub use orchestrator::{
    Dispatch, FetchRequest, Interpreted, MIN_DEBOUNCE, ResolveOrchestrator, ResolveRequest, split_post_data,
};
#[allow(unused_imports)]
pub use payload::{Payload, classify};
#[allow(unused_imports)]
pub use scrape::{FetchReply, Scraped, interpolate_groups, scrape};
#[allow(unused_imports)]
pub use slots::{RequestId, SlotTable};

/// The network collaborator.
///
/// `fetch` only starts the request. The host reports the outcome later,
/// tagged with `request.id`, through
/// [`PresentationStateMachine::handle_fetch_reply`](crate::presentation::PresentationStateMachine::handle_fetch_reply).
/// A host building replies from HTTP responses should use
/// [`FetchReply::from_http`] so media content types and `<base>` hints are
/// handled consistently.
pub trait Fetcher {
    fn fetch(&mut self, request: &FetchRequest);
}
