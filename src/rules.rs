//! Sieve rules: raw configuration, compilation and rewriting.
//!
//! A sieve is an ordered JSON object of named rules. Each rule carries a
//! `link` and/or `img` regex and a way to turn a match into media URLs:
//!
//! ```text
//!  sieve json ──> RawRule (raw.rs)
//!                   │ RuleSet::compile (compile.rs)
//!                   │   - regexes built (ci flags)
//!                   │   - `to` split into templates
//!                   │   - `:` bodies compiled by a ScriptEngine (script.rs)
//!                   v
//!               CompiledRule ──rewrite──> Rewrite (template.rs)
//!                           └─request_url─> resolve request
//! ```
//!
//! Rule order is significant: the engine uses the first matching rule.
//! Rules that cannot compile are either dropped (malformed patterns) or kept
//! as broken (script bodies), so the engine can report them once.

#[path = "rules/compile.rs"]
mod compile;
#[path = "rules/raw.rs"]
mod raw;
#[path = "rules/script.rs"]
mod script;
#[path = "rules/template.rs"]
mod template;


#[allow(unused_imports)]
pub use compile::{CompiledRule, MatchKind, MatchKinds, ResolveStrategy, RuleId, RuleIndex, RuleSet, Template};
#[allow(unused_imports)]
pub use raw::RawRule;
#[allow(unused_imports)]
pub use script::{NativeScripts, ScriptCall, ScriptEngine, ScriptFn, ScriptInput};
#[allow(unused_imports)]
pub use template::{Rewrite, RewriteContext, replace_first};
pub(crate) use script::value_to_text;
pub(crate) use template::decode_twice;
