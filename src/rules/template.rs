//! Rewriting a matched address through a rule's templates.
//!
//! Templates follow `String.prototype.replace` conventions: only the first
//! match is replaced, and `$$`, `$&`, `` $` ``, `$'` and `$n` are expanded.
//! `$0` is accepted as an alias of `$&`.

use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};

use crate::page::{ElementId, Page};
use crate::url::http_prepend;

use super::compile::{CompiledRule, MatchKind, Template};
use super::script::{ScriptCall, ScriptInput, value_to_text};

/// Result of applying a rule's `to` templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// One or more candidate URLs, best first. `#`-prefixed entries are
    /// high-resolution alternates.
    Urls(Vec<String>),
    /// The rule produced an empty string: keep looking.
    Empty,
    /// The rule explicitly declined (`"null"`): stop looking.
    Null,
}

/// Everything a rewrite may consult besides the address.
#[derive(Clone, Copy)]
pub struct RewriteContext<'a> {
    pub page: &'a dyn Page,
    pub element: Option<ElementId>,
    /// Page scheme with colon, used for protocol-relative results.
    pub scheme: &'a str,
}

/// Replaces the first match of `re` in `haystack` with the expanded `template`.
pub fn replace_first(re: &Regex, haystack: &str, template: &str) -> String {
    let Some(caps) = re.captures(haystack) else {
        return haystack.to_string();
    };
    let Some(m) = caps.get(0) else {
        return haystack.to_string();
    };
    let mut out = String::with_capacity(haystack.len() + template.len());
    out.push_str(&haystack[..m.start()]);
    expand(&caps, haystack, template, &mut out);
    out.push_str(&haystack[m.end()..]);
    out
}

fn expand(caps: &Captures<'_>, haystack: &str, template: &str, out: &mut String) {
    let (start, end) = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let bytes = tail.as_bytes();
        let consumed = match bytes.first() {
            Some(b'$') => {
                out.push('$');
                1
            }
            Some(b'&') => {
                out.push_str(&haystack[start..end]);
                1
            }
            Some(b'`') => {
                out.push_str(&haystack[..start]);
                1
            }
            Some(b'\'') => {
                out.push_str(&haystack[end..]);
                1
            }
            Some(d) if d.is_ascii_digit() => {
                let one = usize::from(d - b'0');
                let two = bytes.get(1).filter(|b| b.is_ascii_digit()).map(|b| one * 10 + usize::from(b - b'0'));
                match two {
                    Some(n) if n > 0 && n < caps.len() => {
                        out.push_str(caps.get(n).map_or("", |m| m.as_str()));
                        2
                    }
                    _ if one < caps.len() => {
                        out.push_str(caps.get(one).map_or("", |m| m.as_str()));
                        1
                    }
                    _ => {
                        out.push('$');
                        0
                    }
                }
            }
            _ => {
                out.push('$');
                0
            }
        };
        rest = &tail[consumed..];
    }
    out.push_str(rest);
}

/// Percent-decodes twice, as URL-in-URL wrappers usually need.
pub(crate) fn decode_twice(s: &str) -> String {
    let once = percent_decode_str(s).decode_utf8_lossy().into_owned();
    percent_decode_str(&once).decode_utf8_lossy().into_owned()
}

/// Expands `#a b c#` word lists into one URL per word.
fn expand_word_list(r: String) -> Vec<String> {
    let Some(first) = r.get(1..).and_then(|s| s.find('#')).map(|i| i + 1) else {
        return vec![r];
    };
    let Some(second) = r[first + 1..].find('#').map(|i| i + first + 1) else {
        return vec![r];
    };
    if first <= 1 {
        return vec![r];
    }
    let group = &r[first..=second];
    let words: Vec<&str> = regex!(r" |%20").split(&group[1..group.len() - 1]).collect();
    let joined = r.split(group).collect::<Vec<_>>().join("#");
    let (prefix, body) = match joined.strip_prefix('#') {
        Some(body) => ("#", body.to_string()),
        None => ("", joined),
    };
    words.into_iter().map(|w| format!("{prefix}{}", body.replacen('#', w, 1))).collect()
}

fn captures_of<'h>(re: &Regex, addr: &'h str) -> Vec<Option<&'h str>> {
    re.captures(addr).map_or_else(Vec::new, |caps| caps.iter().map(|m| m.map(|m| m.as_str())).collect())
}

impl CompiledRule {
    /// Applies the `to` templates to `addr` (a scheme-less address matched by
    /// `kind`). `prefix` is the scheme part stripped from the full address.
    pub fn rewrite(
        &self,
        kind: MatchKind,
        addr: &str,
        prefix: &str,
        ctx: &RewriteContext<'_>,
    ) -> Result<Rewrite, String> {
        let Some(re) = self.pattern(kind) else {
            return Ok(Rewrite::Empty);
        };
        if self.to.is_empty() {
            return Ok(Rewrite::Urls(vec![http_prepend(addr, Some(prefix), ctx.scheme)]));
        }

        let mut urls = Vec::new();
        let mut declined = false;
        for template in &self.to {
            match self.rewrite_one(re, kind, addr, prefix, template, ctx)? {
                Rewrite::Urls(found) => urls.extend(found),
                Rewrite::Null => declined = true,
                Rewrite::Empty => {}
            }
        }
        Ok(match (urls.is_empty(), declined) {
            (false, _) => Rewrite::Urls(urls),
            (true, true) => Rewrite::Null,
            (true, false) => Rewrite::Empty,
        })
    }

    fn rewrite_one(
        &self,
        re: &Regex,
        kind: MatchKind,
        addr: &str,
        prefix: &str,
        template: &Template,
        ctx: &RewriteContext<'_>,
    ) -> Result<Rewrite, String> {
        let (replaced, hd) = match template {
            Template::Text(to) if to.is_empty() => (addr.to_string(), false),
            Template::Text(to) => (replace_first(re, addr, to), to.starts_with('#')),
            Template::Script(f) => {
                let out = self.call_on_match(f, re, addr, ctx)?;
                if out.is_empty() {
                    return Ok(Rewrite::Empty);
                }
                if out == "null" {
                    return Ok(Rewrite::Null);
                }
                if out.get(7..).is_some_and(|s| s.contains('\n')) {
                    return Ok(self.split_lines(re, kind, addr, prefix, &out, ctx));
                }
                (out, false)
            }
        };
        Ok(Rewrite::Urls(self.finish(kind, replaced, hd, prefix, ctx)))
    }

    /// Script output spanning several lines: each line becomes a candidate,
    /// carrying the unmatched prefix and suffix of the address.
    fn split_lines(
        &self,
        re: &Regex,
        kind: MatchKind,
        addr: &str,
        prefix: &str,
        out: &str,
        ctx: &RewriteContext<'_>,
    ) -> Rewrite {
        let (before, after) = match re.find(addr) {
            Some(m) => (&addr[..m.start()], &addr[m.end()..]),
            None => (addr, ""),
        };
        let lines: Vec<&str> = regex!(r"[\n\r]+").split(out.trim()).collect();
        let last = lines.len().saturating_sub(1);
        let mut urls = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let mut candidate = String::new();
            if i > 0 {
                candidate.push_str(before);
            }
            candidate.push_str(line);
            if i != last {
                candidate.push_str(after);
            }
            urls.extend(self.finish(kind, candidate, false, prefix, ctx));
        }
        Rewrite::Urls(urls)
    }

    fn finish(&self, kind: MatchKind, mut r: String, hd: bool, prefix: &str, ctx: &RewriteContext<'_>) -> Vec<String> {
        if self.decode.has(kind) {
            r = decode_twice(&r);
        }
        if hd && !r.starts_with('#') {
            r = format!("#{}", r.replacen('#', "", 1));
        }
        expand_word_list(http_prepend(&r, Some(prefix), ctx.scheme))
    }

    fn call_on_match(
        &self,
        f: &super::script::ScriptFn,
        re: &Regex,
        addr: &str,
        ctx: &RewriteContext<'_>,
    ) -> Result<String, String> {
        let Some(m) = re.find(addr) else {
            return Ok(addr.to_string());
        };
        let call = ScriptCall {
            rule: &self.name,
            input: ScriptInput::Rewrite { captures: captures_of(re, addr), input: addr },
            page: ctx.page,
            element: ctx.element,
        };
        let value = f(&call)?;
        Ok(format!("{}{}{}", &addr[..m.start()], value_to_text(&value), &addr[m.end()..]))
    }

    /// Builds the address handed to the resolver for an async rule.
    ///
    /// Without a `url` template the matched address is used as is. An empty
    /// result means the document must not be fetched.
    pub fn request_url(&self, kind: MatchKind, addr: &str, ctx: &RewriteContext<'_>) -> Result<String, String> {
        let Some(re) = self.pattern(kind) else {
            return Ok(addr.to_string());
        };
        match &self.url {
            None => Ok(addr.to_string()),
            Some(Template::Text(t)) => Ok(replace_first(re, addr, t)),
            Some(Template::Script(f)) => self.call_on_match(f, re, addr, ctx),
        }
    }

    /// `[full address, group 1, group 2, ..]` for the resolver.
    pub fn captured_groups(&self, kind: MatchKind, addr: &str, full: &str) -> Vec<String> {
        let mut groups = vec![full.to_string()];
        if let Some(re) = self.pattern(kind) {
            groups.extend(captures_of(re, addr).into_iter().skip(1).map(|g| g.unwrap_or_default().to_string()));
        }
        groups
    }
}
