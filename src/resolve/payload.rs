use serde_json::Value;

use crate::album::AlbumItem;

/// A resolve result, reclassified from the shape of the returned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Candidate URLs for a single item.
    Media {
        urls: Vec<String>,
        caption: Option<String>,
        /// The value came wrapped as `{"loop": url}`.
        force_loop: bool,
    },
    /// Two or more items. `start` is the 1-based item to show first.
    Album { items: Vec<AlbumItem>, start: usize },
    /// Nothing usable came back (`null`, `""`, `[]`).
    NoResult,
    /// The rule rejected the element outright (`false` and other scalars).
    Rejected,
}

/// Classifies a script or JSON resolve result.
///
/// Recognised shapes:
///
/// ```text
/// "url"                          single item
/// ["url", "caption"]             single item with caption
/// [["a", "c1"], ["b", "c2"]]     album
/// {"": value, "idx": n}          value, album starting at item n + 1
/// {"loop": "url"}                url, re-entered into the rule engine
/// ```
///
/// Only one level of `{"": ..}`/`{"loop": ..}` wrapping is unwrapped; a
/// wrapper inside a wrapper is rejected.
pub fn classify(value: Value) -> Payload {
    let mut start = 1;
    let mut force_loop = false;

    let value = match value {
        Value::Object(mut map) => {
            if let Some(inner) = map.remove("").filter(truthy) {
                if let Some(idx) = map.get("idx").and_then(Value::as_u64) {
                    start = idx as usize + 1;
                }
                inner
            } else if let Some(Value::String(url)) = map.remove("loop") {
                force_loop = true;
                Value::String(url)
            } else {
                return Payload::Rejected;
            }
        }
        other => other,
    };

    match value {
        Value::Null => Payload::NoResult,
        Value::String(url) if url.is_empty() => Payload::NoResult,
        Value::String(url) => Payload::Media { urls: vec![url], caption: None, force_loop },
        Value::Array(items) if items.is_empty() => Payload::NoResult,
        Value::Array(items) if items[0].is_array() => {
            let mut items: Vec<AlbumItem> = items.into_iter().filter_map(album_item).collect();
            match items.len() {
                0 => Payload::NoResult,
                1 => {
                    let AlbumItem { urls, caption } = items.remove(0);
                    Payload::Media { urls, caption, force_loop }
                }
                _ => Payload::Album { items, start },
            }
        }
        Value::Array(pair) => match album_item(Value::Array(pair)) {
            Some(AlbumItem { urls, caption }) => Payload::Media { urls, caption, force_loop },
            None => Payload::NoResult,
        },
        _ => Payload::Rejected,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `["url", caption?]` or `[["url", "#hires"], caption?]`.
fn album_item(value: Value) -> Option<AlbumItem> {
    let Value::Array(mut parts) = value else { return None };
    if parts.is_empty() {
        return None;
    }
    let caption = match parts.get(1) {
        Some(Value::String(c)) if !c.is_empty() => Some(c.clone()),
        _ => None,
    };
    let urls: Vec<String> = match parts.swap_remove(0) {
        Value::String(url) => vec![url],
        Value::Array(urls) => urls.into_iter().filter_map(|u| u.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };
    let urls: Vec<String> = urls.into_iter().filter(|u| !u.is_empty()).collect();
    (!urls.is_empty()).then_some(AlbumItem { urls, caption })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media(url: &str, caption: Option<&str>) -> Payload {
        Payload::Media { urls: vec![url.to_string()], caption: caption.map(str::to_string), force_loop: false }
    }

    #[test]
    fn classifies_value_shapes() {
        let cases = vec![
            (media("http://x/a.jpg", None), json!("http://x/a.jpg")),
            (media("http://x/a.jpg", Some("cap")), json!(["http://x/a.jpg", "cap"])),
            (media("http://x/a.jpg", None), json!(["http://x/a.jpg", null])),
            (media("http://x/a.jpg", Some("only")), json!([["http://x/a.jpg", "only"]])),
            (Payload::NoResult, json!(null)),
            (Payload::NoResult, json!("")),
            (Payload::NoResult, json!([])),
            (Payload::Rejected, json!(false)),
            (Payload::Rejected, json!(0)),
            (Payload::Rejected, json!({ "other": 1 })),
        ];
        for (expected, input) in cases {
            assert_eq!(expected, classify(input.clone()), "input: {input}");
        }
    }

    #[test]
    fn array_of_pairs_is_an_album() {
        let payload = classify(json!([["a.jpg", "cap1"], ["b.jpg", "cap2"]]));
        assert_eq!(
            Payload::Album {
                items: vec![AlbumItem::new("a.jpg", Some("cap1".into())), AlbumItem::new("b.jpg", Some("cap2".into()))],
                start: 1,
            },
            payload
        );
    }

    #[test]
    fn hi_res_lists_inside_items_are_kept() {
        let payload = classify(json!([[["a.jpg", "#a-big.jpg"], "cap"], [["b.jpg"], null]]));
        let Payload::Album { items, .. } = payload else { panic!("expected album") };
        assert_eq!(vec!["a.jpg", "#a-big.jpg"], items[0].urls);
        assert_eq!(vec!["b.jpg"], items[1].urls);
        assert_eq!(None, items[1].caption);
    }

    #[test]
    fn indexed_wrapper_sets_start() {
        let payload = classify(json!({ "": [["a.jpg"], ["b.jpg"], ["c.jpg"]], "idx": 1 }));
        let Payload::Album { start, items } = payload else { panic!("expected album") };
        assert_eq!(2, start);
        assert_eq!(3, items.len());
    }

    #[test]
    fn loop_wrapper_forces_re_entry() {
        assert_eq!(
            Payload::Media { urls: vec!["http://x/post/1".into()], caption: None, force_loop: true },
            classify(json!({ "loop": "http://x/post/1" }))
        );
    }

    #[test]
    fn nested_wrappers_are_not_unwrapped() {
        assert_eq!(Payload::Rejected, classify(json!({ "": { "loop": "http://x/1" } })));
        assert_eq!(Payload::Rejected, classify(json!({ "": { "": "http://x/1" } })));
    }
}
