use regex::Regex;

use crate::rules::decode_twice;
use crate::url::with_base_uri;

/// Bytes of a fetched document searched for a `<base href>` hint.
const BASE_SCAN_LIMIT: usize = 4096;

/// What the fetcher got back for a resolve request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReply {
    /// The address itself is media; it is used as is and never looped.
    Media { url: String },
    /// A document to run the rule's `res` strategy on.
    Document {
        url: String,
        body: String,
        /// Base URI for relative references in `body`.
        base: String,
    },
}

impl FetchReply {
    /// Builds a reply from an HTTP response.
    pub fn from_http(url: &str, content_type: Option<&str>, body: String) -> FetchReply {
        if content_type.is_some_and(|ct| regex!(r"(?i)^(?:image|video|audio)/").is_match(ct)) {
            tracing::warn!(url, "resolve target is a media file");
            return FetchReply::Media { url: url.to_string() };
        }
        let base = base_hint(&body)
            .map(|href| with_base_uri(url, &href.replace("&amp;", "&"), true))
            .unwrap_or_else(|| url.to_string());
        FetchReply::Document { url: url.to_string(), body, base }
    }

    /// The reply handed to strategies of requests that skip the fetch.
    pub fn empty() -> FetchReply {
        FetchReply::Document { url: String::new(), body: String::new(), base: String::new() }
    }
}

fn base_hint(body: &str) -> Option<&str> {
    let mut end = body.len().min(BASE_SCAN_LIMIT);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    let caps = regex!(r#"<base\s+href\s*=\s*(?:"([^"]+)"|'([^']+)')"#).captures(&body[..end])?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Substitutes `$n` in a pattern with the regex-escaped captured group `n`.
///
/// `\$n` is left alone, as are references past the last group.
pub fn interpolate_groups(pattern: &str, groups: &[String]) -> String {
    if !pattern.contains('$') {
        return pattern.to_string();
    }
    regex!(r"(\\?)\$(\d)")
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            let idx: usize = caps[2].parse().unwrap_or(usize::MAX);
            match groups.get(idx) {
                Some(group) if caps[1].is_empty() => regex::escape(group),
                _ => whole.to_string(),
            }
        })
        .into_owned()
}

/// Media URL and caption scraped from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scraped {
    pub url: String,
    pub caption: Option<String>,
}

/// Runs a regex `res` rule against a fetched document.
///
/// Group 1 of `primary` is the media URL. The caption is made of the other
/// groups of `primary`, or failing that the groups of `caption`.
pub fn scrape(
    primary: &str,
    caption: Option<&str>,
    groups: &[String],
    body: &str,
    base: &str,
    decode: bool,
) -> Option<Scraped> {
    let compile = |source: &str| match Regex::new(&interpolate_groups(source, groups)) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(%err, "resolve pattern rejected after group substitution");
            None
        }
    };

    let caps = compile(primary)?.captures(body)?;
    let mut found = caps.get(1).map_or("", |m| m.as_str()).to_string();
    if decode {
        found = decode_twice(&found);
    }
    let url = with_base_uri(base, &found.replace("&amp;", "&"), false);

    let join = |caps: &regex::Captures<'_>, from: usize| {
        let parts: Vec<&str> = caps.iter().skip(from).flatten().map(|m| m.as_str()).filter(|s| !s.is_empty()).collect();
        (!parts.is_empty()).then(|| parts.join(" - "))
    };
    let caption = if caps.get(2).is_some_and(|m| !m.as_str().is_empty()) {
        join(&caps, 2)
    } else {
        caption.and_then(compile).and_then(|re| re.captures(body).and_then(|c| join(&c, 1)))
    };
    Some(Scraped { url, caption })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_content_type_short_circuits() {
        let reply = FetchReply::from_http("https://x.test/a", Some("image/jpeg"), String::new());
        assert_eq!(FetchReply::Media { url: "https://x.test/a".into() }, reply);
    }

    #[test]
    fn base_hint_is_honoured() {
        let body = r#"<html><head><base href="/static/"></head>"#.to_string();
        let reply = FetchReply::from_http("https://x.test/p/1", Some("text/html"), body);
        let FetchReply::Document { base, .. } = reply else { panic!("expected document") };
        assert_eq!("https://x.test/static/", base);

        let reply = FetchReply::from_http("https://x.test/p/1", None, "<p>no base</p>".into());
        let FetchReply::Document { base, .. } = reply else { panic!("expected document") };
        assert_eq!("https://x.test/p/1", base);
    }

    #[test]
    fn groups_are_escaped_into_patterns() {
        let groups = vec!["https://x.test/p/1.2".to_string(), "1.2".to_string()];
        let cases = vec![
            (r#"id="1\.2" src="([^"]+)""#, r#"id="$1" src="([^"]+)""#),
            (r#"\$1"#, r#"\$1"#),
            (r"end$", r"end$"),
            (r"$7", r"$7"),
        ];
        for (expected, input) in cases {
            assert_eq!(expected, interpolate_groups(input, &groups), "pattern: {input}");
        }
    }

    #[test]
    fn scrapes_url_and_caption() {
        let body = r#"<img id="main" src="/i/big.jpg?a=1&amp;b=2" alt="A cat"><h1>Title</h1>"#;
        let base = "https://x.test/p/1";

        let found = scrape(r#"id="main" src="([^"]+)""#, None, &[], body, base, false).unwrap();
        assert_eq!("https://x.test/i/big.jpg?a=1&b=2", found.url);
        assert_eq!(None, found.caption);

        let found = scrape(r#"src="([^"]+)" alt="([^"]+)""#, None, &[], body, base, false).unwrap();
        assert_eq!(Some("A cat".to_string()), found.caption);

        let found = scrape(r#"src="([^"]+)""#, Some(r"<h1>([^<]+)</h1>"), &[], body, base, false).unwrap();
        assert_eq!(Some("Title".to_string()), found.caption);

        assert_eq!(None, scrape(r"nothing (here)", None, &[], body, base, false));
    }
}
