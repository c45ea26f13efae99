//! Error types.
//!
//! Every error here is absorbed locally by the component that produces it:
//! nothing propagates far enough to take the presentation state machine
//! down. The types exist so that the absorption points can log a structured
//! value and pick the right visual indicator.

use std::fmt;

/// Which field of a sieve rule an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    Link,
    Img,
    To,
    Url,
    Res,
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleField::Link => "link",
            RuleField::Img => "img",
            RuleField::To => "to",
            RuleField::Url => "url",
            RuleField::Res => "res",
        };
        f.write_str(name)
    }
}

/// A script body attached to a rule could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule `{rule}` ({field}): {reason}")]
pub struct RuleCompileError {
    pub rule: String,
    pub field: RuleField,
    pub reason: String,
}

/// Problems found while loading the configuration snapshot.
///
/// `MalformedRule` is never fatal: the offending rule is dropped and the rest
/// of the sieve compiles normally.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("rule `{rule}` skipped: {reason}")]
    MalformedRule { rule: String, reason: String },

    #[error("hold-to-show activation needs a trigger key or button")]
    ConflictingTrigger,
}

/// Network or parsing failure while resolving a page into a media URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveFetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("undecodable response: {0}")]
    Decode(String),
}

/// The resolved media itself failed to render.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load {url}: {reason}")]
pub struct MediaLoadError {
    pub url: String,
    pub reason: String,
}
