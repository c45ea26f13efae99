use crate::annotations::Thumbnail;
use crate::error::RuleCompileError;
use crate::page::ElementId;
use crate::rules::{MatchKind, RuleId};

/// What `RuleEngine::find` is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// A real page element under the pointer.
    Element(ElementId),
    /// A URL produced by a looping rule, re-fed to the engine on behalf of
    /// `origin`.
    Synthetic { href: String, origin: ElementId, hops: u8 },
}

impl Probe {
    /// The page element results should be attached to.
    pub fn target(&self) -> ElementId {
        match self {
            Probe::Element(id) => *id,
            Probe::Synthetic { origin, .. } => *origin,
        }
    }
}

/// A resolve the orchestrator has to run before anything can be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResolve {
    /// Address to fetch. A `" :"` separator marks POST data.
    pub url: String,
    pub rule_id: RuleId,
    /// The full matched address followed by the pattern's capture groups.
    pub groups: Vec<String>,
    /// Which pattern matched; drives loop re-entry of the result.
    pub loop_param: MatchKind,
    /// The `url` template produced nothing: the strategy runs without a fetch.
    pub skip_resolve: bool,
    pub target: ElementId,
}

/// Side information gathered for the hovered element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetDetails {
    pub caption: Option<String>,
    pub thumbnail: Option<Thumbnail>,
    pub fallback_zoom: Vec<String>,
    pub no_history: bool,
    /// Element whose attribute changes invalidate the result.
    pub watch: Option<ElementId>,
    pub overflow_parent: Option<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Candidates, best first. `#`-prefixed entries are high-resolution alternates.
    pub urls: Vec<String>,
    pub details: TargetDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    Resolved(Found),
    Pending(PendingResolve, TargetDetails),
    NoMatch,
    /// A matching rule's script failed to compile. Reported once per rule.
    CompileError(RuleCompileError),
}

impl FindOutcome {
    pub fn urls(&self) -> Option<&[String]> {
        match self {
            FindOutcome::Resolved(found) => Some(&found.urls),
            _ => None,
        }
    }
}
