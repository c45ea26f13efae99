//! Rule engine: from a hovered element to media candidates.
//!
//! `RuleEngine::find` is a pure function of the page, the compiled rule set
//! and the annotation side-table. It never touches timers, the network or the
//! surface; asynchronous work is handed back as a [`FindOutcome::Pending`]
//! for the resolve orchestrator to pick up.
//!
//! ## How the parts work together
//!
//! ```text
//! Probe::Element(id) ──┐
//!                      │  anchor walk (find.rs)
//!                      │    - up to 5 ancestors, `a` only
//!                      │    - pointer probe for overlapping images (images.rs)
//!                      │    - first rule whose link/img pattern matches
//!                      v
//!              rewrite / request ──> Pending(PendingResolve)
//!                      │
//!                      │  image fallback: rules matched against the
//!                      │  element's src or background (images.rs)
//!                      │
//!                      │  loop re-entry with Probe::Synthetic (≤ 5 hops)
//!                      │
//!                      │  srcset / overflow fallback (srcset.rs)
//!                      v
//!              caption (caption.rs) ──> Resolved(Found)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `find.rs`: the anchor walk, rule selection, loop chaining and
//!   self-reference filtering.
//! - `images.rs`: which image an element stands for (`src`, background, or a
//!   nearby sibling) and the pointer probe.
//! - `srcset.rs`: the "enlargeable" heuristic, responsive-image candidates and
//!   the clipped-container walk.
//! - `caption.rs`: caption extraction.
//! - `outcome.rs`: result types.
//!
//! ## Debugging
//!
//! Set `HOVERLENS_DEBUG_RULES=1` to log every rule match at `debug` level.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Behavior;
use crate::rules::{RuleId, RuleSet};

#[path = "engine/caption.rs"]
mod caption;
#[path = "engine/find.rs"]
mod find;
#[path = "engine/images.rs"]
mod images;
#[path = "engine/outcome.rs"]
mod outcome;
#[path = "engine/srcset.rs"]
mod srcset;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

#[allow(unused_imports)]
pub use images::{Images, background_urls, get_images};
#[allow(unused_imports)]
pub use outcome::{FindOutcome, Found, PendingResolve, Probe, TargetDetails};
#[allow(unused_imports)]
pub use srcset::{Enlarge, is_enlargeable};

/// Longest chain of loop re-entries followed for one hover.
pub const MAX_LOOP_HOPS: u8 = 5;

/// Knobs of the behaviour block the engine depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub zoom_resized: u32,
    pub history: bool,
    pub cap_link_text: bool,
}

impl From<&Behavior> for EngineSettings {
    fn from(hz: &Behavior) -> Self {
        EngineSettings { zoom_resized: hz.zoomresized, history: hz.history, cap_link_text: hz.cap_link_text }
    }
}

#[derive(Debug)]
pub struct RuleEngine {
    rules: Arc<RuleSet>,
    settings: EngineSettings,
    /// Broken rules already surfaced once.
    reported: HashSet<RuleId>,
    debug_rules: bool,
}

impl RuleEngine {
    pub fn new(rules: Arc<RuleSet>, settings: EngineSettings) -> Self {
        RuleEngine {
            rules,
            settings,
            reported: HashSet::new(),
            debug_rules: std::env::var_os("HOVERLENS_DEBUG_RULES").is_some(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules_arc(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }
}
