use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;

use crate::annotations::{Annotations, Thumbnail};
use crate::page::{ElementBuilder, ElementId, PageSnapshot, Rect, Size};
use crate::rules::{MatchKind, NativeScripts, RuleSet};

use super::{EngineSettings, FindOutcome, Probe, RuleEngine};

fn engine(sieve: Value, scripts: &NativeScripts) -> RuleEngine {
    let Value::Object(map) = sieve else { panic!("sieve must be an object") };
    let (rules, skipped) = RuleSet::compile(&map, scripts);
    assert!(skipped.is_empty(), "unexpected skips: {skipped:?}");
    RuleEngine::new(Arc::new(rules), EngineSettings { zoom_resized: 25, history: false, cap_link_text: false })
}

fn page() -> (PageSnapshot, ElementId) {
    PageSnapshot::with_body(Url::parse("https://page.test/").unwrap(), Size::new(1280.0, 800.0))
}

fn find(engine: &mut RuleEngine, page: &PageSnapshot, id: ElementId) -> FindOutcome {
    engine.find(page, &Annotations::new(), &Probe::Element(id), None)
}

fn resolved(outcome: FindOutcome) -> super::Found {
    match outcome {
        FindOutcome::Resolved(found) => found,
        other => panic!("expected Resolved, got {other:?}"),
    }
}

#[test]
fn redirect_link_is_decoded() {
    let mut engine = engine(json!({ "redir": { "link": "^x/redir\\?u=(.+)", "to": "$1", "dc": 1 } }), &NativeScripts::new());
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("http://x/redir?u=http%3A%2F%2Fy%2Fimg.jpg").text("photo"));

    let found = resolved(find(&mut engine, &page, a));
    assert_eq!(vec!["http://y/img.jpg"], found.urls);
    assert_eq!(Some(a), found.details.watch);
    assert_eq!(None, found.details.caption);
}

#[test]
fn async_rule_hands_back_a_pending_resolve() {
    let mut engine = engine(json!({ "api": { "link": "^x\\.com/p/\\d+", "url": "$0/api", "res": 1 } }), &NativeScripts::new());
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("https://x.com/p/1"));

    match find(&mut engine, &page, a) {
        FindOutcome::Pending(pending, details) => {
            assert_eq!("https://x.com/p/1/api", pending.url);
            assert_eq!(0, pending.rule_id);
            assert_eq!(vec!["https://x.com/p/1"], pending.groups);
            assert_eq!(MatchKind::Link, pending.loop_param);
            assert!(!pending.skip_resolve);
            assert_eq!(a, pending.target);
            assert_eq!(Some(a), details.watch);
        }
        other => panic!("expected Pending, got {other:?}"),
    }
}

#[test]
fn async_rule_linking_to_the_page_itself_is_ignored() {
    let mut engine = engine(json!({ "self": { "link": "^page\\.test/", "res": 1 } }), &NativeScripts::new());
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("https://page.test/#top"));
    assert_eq!(FindOutcome::NoMatch, find(&mut engine, &page, a));
}

#[test]
fn looping_rule_re_enters_the_engine() {
    let mut engine = engine(
        json!({
            "short": { "link": "^short\\.test/(\\w+)", "to": "long.test/$1", "loop": 1 },
            "long":  { "link": "^long\\.test/(\\w+)", "to": "cdn.test/$1.jpg" }
        }),
        &NativeScripts::new(),
    );
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("http://short.test/abc"));

    let found = resolved(find(&mut engine, &page, a));
    assert_eq!(vec!["http://cdn.test/abc.jpg", "http://long.test/abc"], found.urls);
}

#[test]
fn loop_chain_stops_after_five_hops() {
    let mut engine =
        engine(json!({ "hop": { "link": "^hop\\.test/(\\w+)$", "to": "hop.test/$1a", "loop": 1 } }), &NativeScripts::new());
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("http://hop.test/s"));

    let found = resolved(find(&mut engine, &page, a));
    let expected: Vec<String> = (1..=5).rev().map(|n| format!("http://hop.test/s{}", "a".repeat(n))).collect();
    assert_eq!(expected, found.urls);
}

#[test]
fn image_rule_applies_to_displayed_source() {
    let mut engine = engine(
        json!({ "thumbs": { "img": "^cdn\\.test/thumbs/(\\d+)\\.jpg", "to": "cdn.test/full/$1.jpg" } }),
        &NativeScripts::new(),
    );
    let (mut page, body) = page();
    let img = page.add(
        Some(body),
        ElementBuilder::new("img")
            .src("https://cdn.test/thumbs/1.jpg")
            .natural(100.0, 100.0)
            .rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
    );

    let found = resolved(find(&mut engine, &page, img));
    assert_eq!(vec!["https://cdn.test/full/1.jpg"], found.urls);
    assert_eq!(
        Some(Thumbnail { url: Some("https://cdn.test/thumbs/1.jpg".to_string()), trusted: false }),
        found.details.thumbnail
    );
    assert_eq!(Some(img), found.details.watch);
}

#[test]
fn useimg_rule_prefers_the_wrapped_image() {
    let mut engine = engine(
        json!({
            "gallery": {
                "link": "^gallery\\.test/",
                "img": "^gallery\\.test/t/(\\w+)\\.jpg",
                "to": "gallery.test/f/$1.jpg",
                "useimg": 1
            }
        }),
        &NativeScripts::new(),
    );
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("https://gallery.test/view/9"));
    let img = page.add(
        Some(a),
        ElementBuilder::new("img")
            .src("https://gallery.test/t/9.jpg")
            .attr("alt", "Nine")
            .natural(150.0, 150.0)
            .rect(Rect::new(0.0, 0.0, 150.0, 150.0)),
    );

    let found = resolved(find(&mut engine, &page, img));
    assert_eq!(vec!["https://gallery.test/f/9.jpg"], found.urls);
    assert_eq!(Some("Nine".to_string()), found.details.caption);
}

#[test]
fn srcset_candidate_is_used_without_rules() {
    let mut engine = engine(json!({}), &NativeScripts::new());
    let (mut page, body) = page();
    let img = page.add(
        Some(body),
        ElementBuilder::new("img")
            .src("https://page.test/small.jpg")
            .attr("srcset", "small.jpg 300w, large.jpg 1200w")
            .natural(300.0, 200.0)
            .rect(Rect::new(0.0, 0.0, 300.0, 200.0)),
    );

    let found = resolved(find(&mut engine, &page, img));
    assert_eq!(vec!["https://page.test/large.jpg"], found.urls);
    assert_eq!(Some(img), found.details.watch);
}

#[test]
fn link_to_the_displayed_image_is_not_a_preview() {
    let mut engine = engine(json!({ "jpg": { "link": "\\.jpg$" } }), &NativeScripts::new());
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("https://a.test/p.jpg"));
    let img = page.add(
        Some(a),
        ElementBuilder::new("img").src("https://a.test/p.jpg").natural(100.0, 100.0).rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
    );

    assert_eq!(FindOutcome::NoMatch, find(&mut engine, &page, img));
    let found = resolved(find(&mut engine, &page, a));
    assert_eq!(vec!["https://a.test/p.jpg"], found.urls);
}

#[test]
fn declined_rewrite_stops_the_search() {
    let scripts = NativeScripts::new().register("decline", |_| Ok(Value::Null));
    let mut engine = engine(
        json!({
            "declines": { "link": "^x\\.test/.*$", "to": ":\ndecline" },
            "images":   { "img": "^x\\.test/i/.+", "to": "x.test/big.jpg" }
        }),
        &scripts,
    );
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("https://x.test/post"));
    let img = page.add(Some(a), ElementBuilder::new("img").src("https://x.test/i/1.jpg").natural(80.0, 80.0));

    assert_eq!(FindOutcome::NoMatch, find(&mut engine, &page, img));
}

#[test]
fn broken_rule_is_reported_once_then_skipped() {
    let mut engine = engine(json!({ "broken": { "link": "^x\\.test/", "to": ":\nmissing" } }), &NativeScripts::new());
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").href("https://x.test/1"));

    match find(&mut engine, &page, a) {
        FindOutcome::CompileError(err) => assert_eq!("broken", err.rule),
        other => panic!("expected CompileError, got {other:?}"),
    }
    assert_eq!(FindOutcome::NoMatch, find(&mut engine, &page, a));
}

#[test]
fn anchor_without_href_matches_nothing() {
    let mut engine = engine(json!({ "any": { "link": "." } }), &NativeScripts::new());
    let (mut page, body) = page();
    let a = page.add(Some(body), ElementBuilder::new("a").text("no link"));
    assert_eq!(FindOutcome::NoMatch, find(&mut engine, &page, a));
}

#[test]
fn caption_skips_values_that_repeat_an_address() {
    const HREF: &str = "https://x.test/p/1";
    const SRC: &str = "https://cdn.test/t.jpg";
    const FULL: &str = "https://cdn.test/full.jpg";
    // (img title, img alt, link text, representative, use link text, expected)
    let cases: Vec<(Option<&str>, Option<&str>, &str, Option<&str>, bool, Option<&str>)> = vec![
        (Some("Harbour"), Some("Sunset"), "Gallery", None, false, Some("Harbour")),
        (Some(SRC), Some("Sunset"), "Gallery", None, false, Some("Sunset")),
        (Some(HREF), None, "Gallery", None, false, None),
        (Some("Gallery"), None, "Gallery", None, false, None),
        (None, Some(SRC), "Gallery", None, false, None),
        (None, Some(FULL), "Gallery", Some(FULL), false, None),
        (None, Some(FULL), "Gallery", Some(FULL), true, Some("Gallery")),
        (None, None, HREF, None, true, None),
        (None, None, "Gallery", None, true, Some("Gallery")),
    ];
    for (title, alt, text, representative, use_link_text, expected) in cases {
        let (mut page, body) = page();
        let a = page.add(Some(body), ElementBuilder::new("a").href(HREF).text(text));
        let mut img = ElementBuilder::new("img").src(SRC);
        if let Some(title) = title {
            img = img.attr("title", title);
        }
        if let Some(alt) = alt {
            img = img.attr("alt", alt);
        }
        let img = page.add(Some(a), img);

        let caption = super::caption::extract(&page, &Annotations::new(), img, Some((a, HREF)), representative, use_link_text);
        assert_eq!(
            expected.map(str::to_string),
            caption,
            "title={title:?} alt={alt:?} text={text:?} representative={representative:?} link_text={use_link_text}"
        );
    }
}
