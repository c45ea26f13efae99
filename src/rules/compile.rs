//! Rule compilation and indexing.
//!
//! `RuleSet::compile` turns the raw sieve object into `CompiledRule`s, in
//! declaration order. Compilation is where configuration problems surface:
//!
//! - a rule without usable patterns, an `off` rule, or a pattern the regex
//!   engine rejects is skipped and reported as `ConfigError::MalformedRule`;
//! - a script body the `ScriptEngine` cannot compile keeps the rule in the
//!   set as *broken*, so the engine can surface the error the first time the
//!   rule matches.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleSet::rules` and equals `CompiledRule::id`.
//! - `RuleIndex::img` lists, in order, every rule with an `img` pattern.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::error::{ConfigError, RuleCompileError, RuleField};

use super::raw::{RES_JSON, RawRule};
use super::script::{ScriptEngine, ScriptFn, is_script};

// --- Rule compilation and indexing -------------------------------------------

/// Rule identifier (index into the rule set).
pub type RuleId = usize;

/// Which pattern of a rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Link,
    Img,
}

bitflags::bitflags! {
    /// Per-pattern switches (`ci`, `dc`, `loop`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MatchKinds: u8 {
        const LINK = 1 << 0;
        const IMG  = 1 << 1;
    }
}

impl MatchKinds {
    pub fn has(self, kind: MatchKind) -> bool {
        match kind {
            MatchKind::Link => self.contains(MatchKinds::LINK),
            MatchKind::Img => self.contains(MatchKinds::IMG),
        }
    }
}

/// One entry of a `to` list, or a `url` template.
#[derive(Clone)]
pub enum Template {
    Text(String),
    Script(ScriptFn),
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Template::Script(_) => f.write_str("Script(<function>)"),
        }
    }
}

/// How a fetched page is turned back into media.
#[derive(Clone)]
pub enum ResolveStrategy {
    /// One or two regex sources, kept uncompiled so `$n` references can be
    /// substituted with the request's captured groups first.
    Scrape { primary: String, caption: Option<String> },
    Script(ScriptFn),
    /// The response body is itself a JSON payload.
    Json,
}

impl fmt::Debug for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveStrategy::Scrape { primary, caption } => {
                f.debug_struct("Scrape").field("primary", primary).field("caption", caption).finish()
            }
            ResolveStrategy::Script(_) => f.write_str("Script(<function>)"),
            ResolveStrategy::Json => f.write_str("Json"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: RuleId,
    pub name: String,
    pub link: Option<Regex>,
    pub img: Option<Regex>,
    /// Empty means "the matched address itself".
    pub to: Vec<Template>,
    pub url: Option<Template>,
    pub res: Option<ResolveStrategy>,
    pub decode: MatchKinds,
    pub loops: MatchKinds,
    pub use_img: bool,
    /// Set when a script body failed to compile.
    pub broken: Option<RuleCompileError>,
}

impl CompiledRule {
    pub fn pattern(&self, kind: MatchKind) -> Option<&Regex> {
        match kind {
            MatchKind::Link => self.link.as_ref(),
            MatchKind::Img => self.img.as_ref(),
        }
    }

    pub fn is_async(&self) -> bool {
        self.res.is_some()
    }

    /// Matches `addr` against the link pattern, then the image pattern.
    pub fn match_address(&self, addr: &str) -> Option<MatchKind> {
        if self.link.as_ref().is_some_and(|re| re.is_match(addr)) {
            Some(MatchKind::Link)
        } else if self.img.as_ref().is_some_and(|re| re.is_match(addr)) {
            Some(MatchKind::Img)
        } else {
            None
        }
    }
}

/// Cheap lookup lists derived from the rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    pub link: Vec<RuleId>,
    pub img: Vec<RuleId>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    index: RuleIndex,
}

impl RuleSet {
    pub fn empty() -> Self {
        RuleSet::default()
    }

    /// Compiles a sieve object. Skipped rules are returned alongside the set.
    pub fn compile(sieve: &Map<String, Value>, scripts: &dyn ScriptEngine) -> (RuleSet, Vec<ConfigError>) {
        let mut rules = Vec::new();
        let mut skipped = Vec::new();

        for (name, value) in sieve {
            let raw: RawRule = match serde_json::from_value(value.clone()) {
                Ok(raw) => raw,
                Err(err) => {
                    skipped.push(malformed(name, err.to_string()));
                    continue;
                }
            };
            match compile_rule(rules.len(), name, &raw, scripts) {
                Ok(Some(rule)) => rules.push(rule),
                Ok(None) => {}
                Err(err) => skipped.push(err),
            }
        }

        for err in &skipped {
            tracing::warn!(%err, "sieve rule skipped");
        }

        let mut index = RuleIndex::default();
        for rule in &rules {
            if rule.link.is_some() {
                index.link.push(rule.id);
            }
            if rule.img.is_some() {
                index.img.push(rule.id);
            }
        }
        tracing::debug!(rules = rules.len(), skipped = skipped.len(), "sieve compiled");
        (RuleSet { rules, index }, skipped)
    }

    pub fn get(&self, id: RuleId) -> Option<&CompiledRule> {
        self.rules.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn index(&self) -> &RuleIndex {
        &self.index
    }
}

fn malformed(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::MalformedRule { rule: name.to_string(), reason: reason.into() }
}

fn build_regex(name: &str, field: RuleField, source: &str, ci: bool) -> Result<Regex, ConfigError> {
    RegexBuilder::new(source)
        .case_insensitive(ci)
        .build()
        .map_err(|err| malformed(name, format!("{field}: {err}")))
}

/// Compiles a single rule. `Ok(None)` means the rule is disabled.
fn compile_rule(
    id: RuleId,
    name: &str,
    raw: &RawRule,
    scripts: &dyn ScriptEngine,
) -> Result<Option<CompiledRule>, ConfigError> {
    let link_src = raw.link.as_deref().filter(|s| !s.is_empty());
    let img_src = raw.img.as_deref().filter(|s| !s.is_empty());
    let has_to = raw.to.as_deref().is_some_and(|s| !s.is_empty());

    if link_src.is_none() && img_src.is_none() {
        return Err(malformed(name, "no link or img pattern"));
    }
    if img_src.is_some() && !has_to && raw.res.is_none() {
        return Err(malformed(name, "img pattern without `to` or `res`"));
    }
    if raw.off {
        tracing::debug!(rule = name, "rule is off");
        return Ok(None);
    }

    let ci = MatchKinds::from_bits_truncate(raw.ci);
    let link = link_src.map(|s| build_regex(name, RuleField::Link, s, ci.has(MatchKind::Link))).transpose()?;
    let img = img_src.map(|s| build_regex(name, RuleField::Img, s, ci.has(MatchKind::Img))).transpose()?;

    let mut broken = None;
    let mut script = |field: RuleField, body: &str| -> Option<ScriptFn> {
        match scripts.compile(name, field, body) {
            Ok(f) => Some(f),
            Err(err) => {
                tracing::error!(%err, "rule script failed to compile");
                broken.get_or_insert(err);
                None
            }
        }
    };

    let mut to = Vec::new();
    if let Some(body) = raw.to.as_deref().filter(|s| !s.is_empty()) {
        if is_script(body) {
            to.extend(script(RuleField::To, body).map(Template::Script));
        } else if body.find('\n').is_some_and(|i| i > 0) {
            to.extend(body.split('\n').map(|t| Template::Text(t.to_string())));
        } else {
            to.push(Template::Text(body.to_string()));
        }
    }

    let url = match raw.url.as_deref() {
        Some(body) if is_script(body) => script(RuleField::Url, body).map(Template::Script),
        Some(body) => Some(Template::Text(body.to_string())),
        None => None,
    };

    let res = match raw.res.as_deref() {
        Some(RES_JSON) => Some(ResolveStrategy::Json),
        Some(body) if body.starts_with(":\n") => script(RuleField::Res, body).map(ResolveStrategy::Script),
        Some(body) => {
            let mut lines = body.split('\n').filter(|l| !l.is_empty());
            let primary = lines.next().unwrap_or_default().to_string();
            let caption = lines.next().map(str::to_string);
            build_regex(name, RuleField::Res, &primary, false)?;
            if let Some(c) = &caption {
                build_regex(name, RuleField::Res, c, false)?;
            }
            Some(ResolveStrategy::Scrape { primary, caption })
        }
        None => None,
    };

    Ok(Some(CompiledRule {
        id,
        name: name.to_string(),
        link,
        img,
        to,
        url,
        res,
        decode: MatchKinds::from_bits_truncate(raw.dc),
        loops: MatchKinds::from_bits_truncate(raw.loop_on),
        use_img: raw.useimg,
        broken,
    }))
}
