use std::time::Duration;

use serde_json::Value;

use crate::annotations::{Annotations, Resolution};
use crate::engine::PendingResolve;
use crate::error::ResolveFetchError;
use crate::page::{ElementId, Page};
use crate::rules::{MatchKind, ResolveStrategy, RuleId, RuleSet, ScriptCall, ScriptInput};

use super::payload::{Payload, classify};
use super::scrape::{FetchReply, scrape};
use super::slots::{RequestId, SlotTable};
use super::Fetcher;

/// Shortest debounce before a resolve is dispatched.
pub const MIN_DEBOUNCE: Duration = Duration::from_millis(50);

/// An outstanding resolve, as stored in the request table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub id: RequestId,
    pub url: String,
    pub rule_id: RuleId,
    pub groups: Vec<String>,
    pub loop_param: MatchKind,
    pub skip_resolve: bool,
    pub target: ElementId,
}

/// What the fetcher is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub url: String,
    /// Form-encoded body; the request is a POST when set.
    pub post_body: Option<String>,
    pub rule_id: RuleId,
}

impl FetchRequest {
    pub fn is_post(&self) -> bool {
        self.post_body.is_some()
    }
}

/// How a queued resolve left the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the fetcher; the reply arrives later.
    Fetch(RequestId),
    /// Nothing to fetch; complete it right away with [`FetchReply::empty`].
    Local(RequestId),
}

/// A resolve reply, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpreted {
    Payload(Payload),
    /// The fetch failed or the body could not be decoded.
    Failed(ResolveFetchError),
    /// The rule's `res` script failed at runtime.
    ScriptFailed(String),
}

/// Splits `"url :postdata"` into the address and the POST body.
pub fn split_post_data(url: &str) -> (&str, Option<&str>) {
    let trimmed = url.trim_start();
    let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let (address, rest) = trimmed.split_at(end);
    let post = rest.trim_start_matches(' ').strip_prefix(':').filter(|p| !p.is_empty());
    (address, post)
}

/// Strips the last path segment (and any query) from a base URI.
fn base_directory(base: &str) -> String {
    regex!(r"(/)[^/]*(?:[?#].*)?$").replace(base, "$1").into_owned()
}

/// Bridges pending resolves from the rule engine to the fetcher.
///
/// At most one resolve is queued (waiting out the debounce) at a time, and
/// at most one is outstanding per element: the element's annotation records
/// the queued or in-flight request.
#[derive(Debug, Default)]
pub struct ResolveOrchestrator {
    requests: SlotTable<ResolveRequest>,
    queued: Option<PendingResolve>,
}

impl ResolveOrchestrator {
    pub fn new() -> Self {
        ResolveOrchestrator::default()
    }

    /// Debounce before dispatching: the hover delay, at least
    /// [`MIN_DEBOUNCE`], or exactly that when the popup should feel instant.
    pub fn debounce(hover_delay: Duration, instant: bool) -> Duration {
        if instant { MIN_DEBOUNCE } else { hover_delay.max(MIN_DEBOUNCE) }
    }

    /// Queues a resolve for its target, replacing any other queued one.
    ///
    /// Returns `false` when the target already has a request in flight.
    pub fn queue(&mut self, pending: PendingResolve, annotations: &mut Annotations) -> bool {
        let entry = annotations.entry(pending.target);
        if let Some(Resolution::InFlight(id)) = &entry.resolution {
            tracing::debug!(element = pending.target.0, ?id, "resolve already in flight");
            return false;
        }
        entry.resolution = Some(Resolution::Awaiting(pending.clone()));
        if let Some(previous) = self.queued.replace(pending) {
            tracing::debug!(element = previous.target.0, "queued resolve superseded");
        }
        true
    }

    pub fn queued(&self) -> Option<&PendingResolve> {
        self.queued.as_ref()
    }

    /// Drops the queued resolve. Its target keeps the `Awaiting` annotation,
    /// so a later hover can queue it again.
    pub fn cancel_queued(&mut self) -> Option<PendingResolve> {
        self.queued.take()
    }

    /// Sends the queued resolve on its way once the debounce has elapsed.
    pub fn dispatch(&mut self, annotations: &mut Annotations, fetcher: &mut dyn Fetcher) -> Option<Dispatch> {
        let pending = self.queued.take()?;
        let target = pending.target;
        let skip = pending.skip_resolve;
        let id = self.requests.insert_with(|id| ResolveRequest {
            id,
            url: pending.url,
            rule_id: pending.rule_id,
            groups: pending.groups,
            loop_param: pending.loop_param,
            skip_resolve: pending.skip_resolve,
            target,
        });
        annotations.entry(target).resolution = Some(Resolution::InFlight(id));

        if skip {
            tracing::debug!(?id, "resolve runs without a fetch");
            return Some(Dispatch::Local(id));
        }
        let request = self.requests.get(id)?;
        let (url, post_body) = split_post_data(&request.url);
        let fetch = FetchRequest {
            id,
            url: url.to_string(),
            post_body: post_body.map(str::to_string),
            rule_id: request.rule_id,
        };
        tracing::debug!(?id, url = %fetch.url, post = fetch.is_post(), rule = fetch.rule_id, "resolve dispatched");
        fetcher.fetch(&fetch);
        Some(Dispatch::Fetch(id))
    }

    /// Claims the request a reply belongs to, freeing its slot.
    ///
    /// Unknown and already-completed ids yield `None` and are otherwise
    /// ignored.
    pub fn complete(&mut self, id: RequestId, annotations: &mut Annotations) -> Option<ResolveRequest> {
        let Some(request) = self.requests.remove(id) else {
            tracing::debug!(?id, "reply for unknown resolve request ignored");
            return None;
        };
        if let Some(entry) = annotations.get(request.target) {
            if entry.resolution == Some(Resolution::InFlight(id)) {
                annotations.entry(request.target).resolution = None;
            }
        }
        Some(request)
    }

    /// Number of requests awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.requests.len()
    }

    /// Runs the owning rule's `res` strategy on a reply.
    pub fn interpret(
        &self,
        rules: &RuleSet,
        request: &ResolveRequest,
        reply: Result<FetchReply, ResolveFetchError>,
        page: &dyn Page,
    ) -> Interpreted {
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(url = %request.url, %err, "resolve fetch failed");
                return Interpreted::Failed(err);
            }
        };
        let (url, body, base) = match reply {
            FetchReply::Media { url } => {
                return Interpreted::Payload(Payload::Media { urls: vec![url], caption: None, force_loop: false });
            }
            FetchReply::Document { url, body, base } => (url, body, base),
        };
        let Some(rule) = rules.get(request.rule_id) else {
            tracing::warn!(rule = request.rule_id, "resolve reply for a rule no longer configured");
            return Interpreted::Payload(Payload::NoResult);
        };

        match &rule.res {
            None => Interpreted::Payload(Payload::NoResult),
            Some(ResolveStrategy::Scrape { primary, caption }) => {
                let decode = rule.decode.has(request.loop_param);
                match scrape(primary, caption.as_deref(), &request.groups, &body, &base, decode) {
                    Some(found) => Interpreted::Payload(Payload::Media {
                        urls: vec![found.url],
                        caption: found.caption,
                        force_loop: false,
                    }),
                    None => {
                        tracing::info!(rule = %rule.name, "resolve pattern found nothing");
                        Interpreted::Payload(Payload::NoResult)
                    }
                }
            }
            Some(ResolveStrategy::Json) => match serde_json::from_str::<Value>(&body) {
                Ok(value) => Interpreted::Payload(classify(value)),
                Err(err) => {
                    let err = ResolveFetchError::Decode(err.to_string());
                    tracing::warn!(rule = %rule.name, %err, "resolve reply is not json");
                    Interpreted::Failed(err)
                }
            },
            Some(ResolveStrategy::Script(f)) => {
                let base = base_directory(&base);
                let call = ScriptCall {
                    rule: &rule.name,
                    input: ScriptInput::Response { url: &url, body: &body, base: &base, groups: &request.groups },
                    page,
                    element: Some(request.target),
                };
                match f(&call) {
                    Ok(value) => Interpreted::Payload(classify(value)),
                    Err(err) => {
                        tracing::error!(rule = %rule.name, %err, "resolve script failed");
                        Interpreted::ScriptFailed(err)
                    }
                }
            }
        }
    }
}
