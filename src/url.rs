//! URL helpers shared by the rule engine, the resolve scraper and the
//! presentation layer.
//!
//! Most of these work on plain strings rather than [`url::Url`]: sieve rules
//! match against scheme-less URLs and templates may produce partial URLs that
//! only become absolute after [`http_prepend`].

use url::Url;

/// Strips a leading `http://`, `https://` and optional `www.`.
pub fn strip_scheme(url: &str) -> &str {
    regex!(r"^https?://(?:www\.)?").find(url).map_or(url, |m| &url[m.end()..])
}

/// Returns the length of the `https?://(www.)?` prefix of `url`, or 0.
pub fn scheme_prefix_len(url: &str) -> usize {
    url.len() - strip_scheme(url).len()
}

/// Removes the fragment from a URL.
///
/// Hash-bang style fragments (`#!x`, `#?x`) are part of the address on many
/// sites and are kept.
pub fn strip_hash(url: &str) -> &str {
    let bytes = url.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'#' {
            continue;
        }
        let hashbang = matches!(bytes.get(i + 1), Some(b'?' | b'!')) && bytes.len() > i + 2;
        if !hashbang {
            return &url[..i];
        }
    }
    url
}

/// Prefixes a relative result with `pre_domain` and completes
/// protocol-relative URLs with the page scheme (`"https:"`).
///
/// A leading `#` marks a high-resolution alternate and survives both steps.
pub fn http_prepend(url: &str, pre_domain: Option<&str>, page_scheme: &str) -> String {
    let mut out = url.to_string();
    if let Some(pre) = pre_domain.filter(|p| !p.is_empty()) {
        let rest = url.strip_prefix('#').unwrap_or(url);
        let absolute = rest.starts_with("http:")
            || rest.starts_with("https:")
            || rest.starts_with("//")
            || rest.starts_with("data:");
        if !url.is_empty() && !absolute {
            let hash = if url.starts_with('#') { "#" } else { "" };
            out = format!("{hash}{pre}{rest}");
        }
    }

    let b = out.as_bytes();
    if b.len() > 1 && b[1] == b'/' {
        if b[0] == b'/' {
            out = format!("{page_scheme}{out}");
        } else if b[0] == b'#' && b.get(2) == Some(&b'/') {
            out = format!("#{page_scheme}{}", &out[1..]);
        }
    }
    out
}

/// Makes `url` absolute against the page location.
///
/// Unparseable input is returned unchanged; the media loader reports it later.
pub fn normalize(url: &str, base: &Url) -> String {
    if url.starts_with("//") {
        return format!("{}:{url}", base.scheme());
    }
    match base.join(url) {
        Ok(joined) => joined.to_string(),
        Err(err) => {
            tracing::debug!(url, %err, "url normalization failed");
            url.to_string()
        }
    }
}

/// Resolves `relative` against a document `base` the way scraped pages need it.
///
/// `secure` completes protocol-relative references with the base scheme.
pub fn with_base_uri(base: &str, relative: &str, secure: bool) -> String {
    if relative.starts_with("//") {
        if secure {
            let scheme_end = base.find(':').map_or(0, |i| i + 1);
            return format!("{}{relative}", &base[..scheme_end]);
        }
        return relative.to_string();
    }
    if regex!(r"(?i)^[\w-]{2,20}:").is_match(relative) {
        return relative.to_string();
    }
    let trimmed = if relative.starts_with('/') {
        regex!(r"(//[^/]+)/.*").replace(base, "$1")
    } else {
        regex!(r"(/)[^/]*(?:[?#].*)?$").replace(base, "$1")
    };
    format!("{trimmed}{relative}")
}

/// Lower-case file extension of the URL path, if it has a short one.
pub fn extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Media types the surface needs to know about before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Svg,
    Video,
}

impl MediaKind {
    pub fn of(url: &str) -> MediaKind {
        if regex!(r"(?i)^[^?#]+\.(?:mp4|webm|ogv|mov|m4v)(?:$|[?#])").is_match(url) {
            MediaKind::Video
        } else if regex!(r"(?i)^[^?#]+\.svgz?(?:$|[?#])").is_match(url) || url.starts_with("data:image/svg") {
            MediaKind::Svg
        } else {
            MediaKind::Image
        }
    }
}
