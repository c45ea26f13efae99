use serde_json::json;

use crate::album::AlbumNav;
use crate::annotations::Resolution;
use crate::error::MediaLoadError;
use crate::page::{Point, Size};
use crate::resolve::{FetchReply, RequestId};

use super::testing::{RecordingSurface, away, link_page, machine, ms, over, two_link_page};
use super::{
    Caption, EventDisposition, Freeze, FullZoom, HitTarget, HostRequest, Indicator, InputEvent, KeyEvent, MediaEvent,
    Modifiers, PointerEvent, PresentationState,
};

const MEDIA: Size = Size { width: 1600.0, height: 1200.0 };

fn direct_rule() -> serde_json::Value {
    json!({ "direct": { "link": "^x\\.test/(\\d+)$", "to": "cdn.test/$1.jpg" } })
}

fn api_rule() -> serde_json::Value {
    json!({ "api": { "link": "^x\\.test/p/\\d+", "url": "$0/api", "res": 1 } })
}

fn key(name: &str) -> InputEvent {
    InputEvent::KeyDown(KeyEvent::new(name))
}

#[test]
fn leaving_before_the_delay_shows_nothing() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    assert_eq!(PresentationState::Idle, m.state());
    assert_eq!(Some(ms(100)), m.next_deadline());

    m.dispatch(ms(60), InputEvent::PointerOver(PointerEvent::new(Point::new(900.0, 700.0), HitTarget::Outside)));
    m.advance(ms(1000));
    assert_eq!(PresentationState::Idle, m.state());
    assert_eq!(None, m.next_deadline());
    assert!(m.surface().loads.is_empty());
    assert!(m.surface().indicators.is_empty());
}

#[test]
fn hover_delay_then_shown() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(99));
    assert_eq!(PresentationState::Idle, m.state());

    m.advance(ms(100));
    assert_eq!(PresentationState::Shown, m.state());
    assert_eq!(Some(link), m.target());
    assert!(m.current_media().is_some_and(|url| url.ends_with("cdn.test/1.jpg")), "{:?}", m.current_media());
    assert_eq!(1, m.surface().loads.len());
    let frame = m.frame().unwrap();
    assert!(!frame.full_zoom);
    assert!(frame.rect.width > 0.0 && frame.rect.right() <= 1280.0);
}

#[test]
fn indicator_waits_for_the_loader_delay() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::slow(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    assert_eq!(PresentationState::Loading, m.state());
    assert_eq!(None, m.indicator());

    m.advance(ms(399));
    assert!(m.surface().indicators.is_empty());
    m.advance(ms(400));
    assert_eq!(vec![Indicator::Loading], m.surface().indicators);

    m.surface_mut().ready = true;
    m.dispatch(ms(450), InputEvent::Media(MediaEvent::Ready));
    assert_eq!(PresentationState::Shown, m.state());
    assert_eq!(None, m.indicator());
}

#[test]
fn animated_hide_passes_through_hiding() {
    let (page, link) = link_page("http://x.test/1");
    let config = json!({ "hz": { "anim": { "opacity": 200 } }, "sieve": direct_rule() });
    let mut m = machine(config, page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    m.dispatch(ms(150), away());
    assert_eq!(PresentationState::Hiding, m.state());
    assert_eq!(vec![ms(200)], m.surface().fades);

    m.advance(ms(349));
    assert_eq!(PresentationState::Hiding, m.state());
    m.advance(ms(350));
    assert_eq!(PresentationState::Idle, m.state());
    assert_eq!(None, m.current_media());
}

#[test]
fn quick_return_skips_the_hover_delay() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    m.dispatch(ms(150), away());
    assert_eq!(PresentationState::Idle, m.state());

    m.dispatch(ms(200), over(link));
    assert_eq!(PresentationState::Shown, m.state());

    m.dispatch(ms(250), away());
    m.dispatch(ms(700), over(link));
    assert_eq!(PresentationState::Idle, m.state());
    assert_eq!(Some(ms(800)), m.next_deadline());
}

#[test]
fn hold_to_show_waits_for_the_trigger() {
    let (page, link) = link_page("http://x.test/1");
    let config = json!({ "hz": { "deactivate": false }, "sieve": direct_rule() });
    let mut m = machine(config, page, RecordingSurface::instant(MEDIA));
    assert_eq!(Freeze::On, m.freeze());

    m.dispatch(ms(0), over(link));
    m.advance(ms(500));
    assert_eq!(PresentationState::Idle, m.state());
    assert!(m.surface().loads.is_empty());

    m.dispatch(ms(600), key("Control"));
    assert_eq!(PresentationState::Shown, m.state());
    assert_eq!(Freeze::Off, m.freeze());

    m.dispatch(ms(700), InputEvent::KeyUp(KeyEvent::new("Control")));
    assert_eq!(Freeze::On, m.freeze());
}

#[test]
fn conflicting_trigger_disables_previews() {
    let (page, link) = link_page("http://x.test/1");
    let config = json!({ "hz": { "deactivate": false, "actTrigger": "0" }, "sieve": direct_rule() });
    let mut m = machine(config, page, RecordingSurface::instant(MEDIA));
    assert_eq!(PresentationState::Disabled, m.state());

    m.dispatch(ms(0), over(link));
    assert_eq!(None, m.next_deadline());
}

#[test]
fn toggle_chord_switches_previews_off_and_on() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));
    let chord = || InputEvent::KeyDown(KeyEvent::new("t").with_modifiers(Modifiers::ALT | Modifiers::SHIFT));

    assert_eq!(EventDisposition::Consume, m.dispatch(ms(0), chord()));
    assert_eq!(PresentationState::Disabled, m.state());
    m.dispatch(ms(10), over(link));
    m.advance(ms(500));
    assert!(m.surface().loads.is_empty());

    m.dispatch(ms(600), chord());
    assert_eq!(PresentationState::Idle, m.state());
}

#[test]
fn resolve_reply_is_matched_by_request_id() {
    let (page, link) = link_page("https://x.test/p/1");
    let mut m = machine(json!({ "sieve": api_rule() }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    assert_eq!(PresentationState::Loading, m.state());
    assert_eq!(1, m.fetcher().requests.len());
    let due = ms(100);
    let request = m.fetcher().requests[0].clone();
    assert_eq!("https://x.test/p/1/api", request.url);

    let bogus = RequestId { slot: request.id.slot + 7, generation: 3 };
    let reply = FetchReply::from_http(&request.url, Some("application/json"), "\"https://cdn.test/x.jpg\"".into());
    m.handle_fetch_reply(due + ms(10), bogus, Ok(reply.clone()));
    assert_eq!(PresentationState::Loading, m.state());
    assert_eq!(None, m.current_media());

    m.handle_fetch_reply(due + ms(20), request.id, Ok(reply.clone()));
    assert_eq!(PresentationState::Shown, m.state());
    assert_eq!(Some("https://cdn.test/x.jpg"), m.current_media());

    m.handle_fetch_reply(due + ms(30), request.id, Ok(reply));
    assert_eq!(Some("https://cdn.test/x.jpg"), m.current_media());
}

#[test]
fn empty_resolve_shows_no_result() {
    let (page, link) = link_page("https://x.test/p/1");
    let mut m = machine(json!({ "sieve": api_rule() }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    let due = ms(100);
    m.advance(due);
    let request = m.fetcher().requests[0].clone();
    let reply = FetchReply::from_http(&request.url, Some("application/json"), "null".into());
    m.handle_fetch_reply(due, request.id, Ok(reply));
    assert_eq!(Some(Indicator::NoResult), m.indicator());
}

#[test]
fn album_navigation_clamps_without_cycling() {
    let (page, link) = link_page("https://x.test/p/1");
    let config = json!({ "hz": { "pileCycle": false }, "sieve": api_rule() });
    let mut m = machine(config, page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    let due = ms(100);
    m.advance(due);
    let request = m.fetcher().requests[0].clone();
    let body = r#"[["https://cdn.test/a.jpg","first"],["https://cdn.test/b.jpg","second"],["https://cdn.test/c.jpg","third"]]"#;
    let reply = FetchReply::from_http(&request.url, Some("application/json"), body.into());
    m.handle_fetch_reply(due, request.id, Ok(reply));

    assert_eq!(PresentationState::Shown, m.state());
    assert_eq!(Some("https://cdn.test/a.jpg"), m.current_media());
    assert_eq!(
        Some(Caption { counter: Some("1 / 3".into()), text: Some("first".into()), dimensions: None }),
        m.surface().caption
    );
    assert!(m.surface().preloads.contains(&"https://cdn.test/b.jpg".to_string()));

    assert!(m.navigate_album(due + ms(10), AlbumNav::Step(1)));
    assert_eq!(Some("https://cdn.test/b.jpg"), m.current_media());
    assert_eq!(Some("2 / 3".to_string()), m.surface().caption.as_ref().and_then(|c| c.counter.clone()));

    m.dispatch(due + ms(20), key("End"));
    assert_eq!(Some("https://cdn.test/c.jpg"), m.current_media());
    let loads = m.surface().loads.len();
    m.dispatch(due + ms(30), key("Right"));
    assert_eq!(Some("https://cdn.test/c.jpg"), m.current_media());
    assert_eq!(loads, m.surface().loads.len());

    assert!(m.navigate_album(due + ms(40), AlbumNav::Search("sec".into())));
    assert_eq!(Some("https://cdn.test/b.jpg"), m.current_media());
}

#[test]
fn failed_media_falls_back_through_candidates() {
    let sieve = json!({
        "short": { "link": "^short\\.test/(\\w+)", "to": "long.test/$1", "loop": 1 },
        "long":  { "link": "^long\\.test/(\\w+)", "to": "cdn.test/$1.jpg" }
    });
    let (page, link) = link_page("http://short.test/abc");
    let mut m = machine(json!({ "sieve": sieve }), page, RecordingSurface::slow(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    let first = m.current_media().unwrap().to_string();
    assert!(first.ends_with("cdn.test/abc.jpg"), "{first}");

    let fail = |url: &str| InputEvent::Media(MediaEvent::Failed(MediaLoadError { url: url.into(), reason: "404".into() }));
    m.dispatch(ms(150), fail("https://elsewhere.test/stale.jpg"));
    assert_eq!(Some(first.as_str()), m.current_media());

    m.dispatch(ms(160), fail(&first));
    let second = m.current_media().unwrap().to_string();
    assert!(second.ends_with("long.test/abc"), "{second}");

    m.dispatch(ms(170), fail(&second));
    assert_eq!(None, m.current_media());
    assert_eq!(Some(Indicator::LoadFailed), m.indicator());
    assert_eq!(Some(&Indicator::LoadFailed), m.surface().indicators.last());
}

#[test]
fn broken_rule_shows_script_error() {
    let (page, link) = link_page("https://x.test/1");
    let sieve = json!({ "broken": { "link": "^x\\.test/", "to": ":\nmissing" } });
    let mut m = machine(json!({ "sieve": sieve }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    assert_eq!(Some(Indicator::ScriptError), m.indicator());
    assert_eq!(vec![Indicator::ScriptError], m.surface().indicators);
}

#[test]
fn full_zoom_enters_and_leaves() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));
    m.dispatch(ms(0), over(link));
    m.advance(ms(100));

    assert!(m.dispatch(ms(200), key("Enter")).consumed());
    assert_eq!(FullZoom::Pan, m.full_zoom());
    let frame = m.frame().unwrap();
    assert!(frame.full_zoom);
    assert!(frame.rect.width <= 1280.0 && frame.rect.height <= 800.0);

    m.dispatch(ms(250), InputEvent::KeyDown(KeyEvent::new("Enter").with_modifiers(Modifiers::SHIFT)));
    assert_eq!(FullZoom::Fit, m.full_zoom());

    m.dispatch(ms(300), key("Enter"));
    assert_eq!(FullZoom::Off, m.full_zoom());
    assert_eq!(PresentationState::Idle, m.state());
}

#[test]
fn escape_suppresses_hover_until_the_pointer_moves() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));
    m.dispatch(ms(0), over(link));
    m.advance(ms(100));

    m.dispatch(ms(200), key("Escape"));
    assert_eq!(PresentationState::Idle, m.state());
    assert_eq!(Freeze::PendingRelease, m.freeze());

    m.dispatch(ms(300), InputEvent::PointerMove(PointerEvent::new(Point::new(50.0, 40.0), HitTarget::Page(link))));
    assert_eq!(Freeze::PendingRelease, m.freeze());
    m.dispatch(ms(310), InputEvent::PointerMove(PointerEvent::new(Point::new(60.0, 40.0), HitTarget::Page(link))));
    assert_eq!(Freeze::Off, m.freeze());
    assert_eq!(PresentationState::Idle, m.state());
}

#[test]
fn wheel_dismisses_and_freezes() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));
    m.dispatch(ms(0), over(link));
    m.advance(ms(100));

    let wheel = InputEvent::Wheel {
        pointer: PointerEvent::new(Point::new(50.0, 40.0), HitTarget::Page(link)),
        delta_x: 0.0,
        delta_y: 120.0,
    };
    m.dispatch(ms(200), wheel);
    assert_eq!(PresentationState::Idle, m.state());
    assert_eq!(Freeze::PendingRelease, m.freeze());

    m.dispatch(ms(250), over(link));
    assert_eq!(None, m.next_deadline());
}

#[test]
fn save_key_requests_a_download() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));
    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    let url = m.current_media().unwrap().to_string();

    assert!(m.dispatch(ms(200), key("s")).consumed());
    assert_eq!(vec![HostRequest::Download { url, ext: "jpg".into() }], m.host().sent);
}

#[test]
fn history_is_recorded_when_enabled() {
    let (page, link) = link_page("http://x.test/1");
    let config = json!({ "hz": { "history": true }, "sieve": direct_rule() });
    let mut m = machine(config, page, RecordingSurface::instant(MEDIA));
    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    let url = m.current_media().unwrap().to_string();
    assert_eq!(vec![HostRequest::RecordHistory { url, manual: false }], m.host().sent);
}

#[test]
fn unmatched_element_is_remembered_as_non_viable() {
    let (page, link) = link_page("http://other.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(link));
    assert!(m.annotations().is_non_viable(link));
    assert_eq!(None, m.next_deadline());
}

#[test]
fn attribute_change_forgets_cached_resolution() {
    let (page, link) = link_page("http://x.test/1");
    let mut m = machine(json!({ "sieve": direct_rule() }), page, RecordingSurface::instant(MEDIA));
    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    m.dispatch(ms(150), away());
    assert!(m.annotations().get(link).is_some());

    m.dispatch(ms(200), InputEvent::AttributeChanged { element: link, name: "href".into() });
    assert!(m.annotations().get(link).is_none());
}

#[test]
fn resolve_debounce_runs_alongside_the_hover_delay() {
    // (hover delay ms, fetch dispatched at ms)
    let cases = vec![(400, 400), (100, 100), (20, 50)];
    for (delay, dispatched) in cases {
        let (page, link) = link_page("https://x.test/p/1");
        let config = json!({ "hz": { "delay": delay }, "sieve": api_rule() });
        let mut m = machine(config, page, RecordingSurface::instant(MEDIA));

        m.dispatch(ms(0), over(link));
        m.advance(ms(dispatched - 1));
        assert!(m.fetcher().requests.is_empty(), "delay {delay}: fetched before {dispatched}ms");
        m.advance(ms(dispatched));
        assert_eq!(1, m.fetcher().requests.len(), "delay {delay}");
        assert_eq!(PresentationState::Loading, m.state(), "delay {delay}");
    }
}

#[test]
fn reply_for_a_target_left_behind_only_updates_its_annotation() {
    let (page, api_link, direct_link) = two_link_page("https://x.test/p/1", "http://x.test/2");
    let sieve = json!({
        "api": { "link": "^x\\.test/p/\\d+", "url": "$0/api", "res": 1 },
        "direct": { "link": "^x\\.test/(\\d+)$", "to": "cdn.test/$1.jpg" }
    });
    let mut m = machine(json!({ "sieve": sieve }), page, RecordingSurface::instant(MEDIA));

    m.dispatch(ms(0), over(api_link));
    m.advance(ms(100));
    let request = m.fetcher().requests[0].clone();

    m.dispatch(ms(150), InputEvent::PointerOver(PointerEvent::new(Point::new(50.0, 120.0), HitTarget::Page(direct_link))));
    assert_eq!(PresentationState::Shown, m.state());
    assert_eq!(Some(direct_link), m.target());
    let shown = m.current_media().unwrap().to_string();
    assert!(shown.ends_with("cdn.test/2.jpg"), "{shown}");
    let loads = m.surface().loads.len();

    let reply = FetchReply::from_http(&request.url, Some("application/json"), "\"https://cdn.test/x.jpg\"".into());
    m.handle_fetch_reply(ms(200), request.id, Ok(reply));
    assert_eq!(PresentationState::Shown, m.state());
    assert_eq!(Some(direct_link), m.target());
    assert_eq!(Some(shown.as_str()), m.current_media());
    assert_eq!(loads, m.surface().loads.len());
    assert_eq!(
        Some(&Resolution::Urls(vec!["https://cdn.test/x.jpg".to_string()])),
        m.annotations().get(api_link).and_then(|a| a.resolution.as_ref())
    );
}

#[test]
fn svg_without_a_size_gives_up_after_the_probe_limit() {
    let (page, link) = link_page("http://x.test/1");
    let sieve = json!({ "logo": { "link": "^x\\.test/(\\d+)$", "to": "cdn.test/$1.svg" } });
    let mut m = machine(json!({ "sieve": sieve }), page, RecordingSurface::slow(MEDIA));

    m.dispatch(ms(0), over(link));
    m.advance(ms(100));
    assert!(m.current_media().is_some_and(|url| url.ends_with(".svg")), "{:?}", m.current_media());

    // 300 attempts, one every 100ms from the load at 100ms.
    m.advance(ms(30_099));
    assert_ne!(Some(Indicator::LoadFailed), m.indicator());
    m.advance(ms(30_100));
    assert_eq!(Some(Indicator::LoadFailed), m.indicator());
    assert_eq!(Some(&Indicator::LoadFailed), m.surface().indicators.last());
}
