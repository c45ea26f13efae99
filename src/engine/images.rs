use crate::page::{Element, ElementId, Page, Point};
use crate::url::{normalize, strip_scheme};

/// The image an element stands for.
///
/// `src`/`bg` are scheme-less (for rule matching), `*_full` are absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Images {
    pub element: Option<ElementId>,
    pub src: Option<String>,
    pub src_full: Option<String>,
    pub bg: Option<String>,
    pub bg_full: Option<String>,
}

impl Images {
    pub fn is_empty(&self) -> bool {
        self.src.is_none() && self.bg.is_none()
    }

    /// `true` when `addr` is the image itself.
    pub fn is_address(&self, addr: &str) -> bool {
        self.src.as_deref() == Some(addr) || self.bg.as_deref() == Some(addr)
    }
}

/// Extracts `url(...)` references from a `background-image` value.
pub fn background_urls(value: &str) -> Vec<String> {
    regex!(r#"\burl\(\s*(?:"([^"]*)"|'([^']*)'|([^'"\)][^\)]*))\s*\)"#)
        .captures_iter(value)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

fn has_background(el: &Element) -> bool {
    el.style.background_image.as_deref().is_some_and(|b| b.starts_with("url("))
}

fn close(a: &Element, b: &Element, size_slack: f64) -> bool {
    a.offset_parent == b.offset_parent
        && (a.rect.left - b.rect.left).abs() <= 10.0
        && (a.rect.top - b.rect.top).abs() <= 10.0
        && (a.client.width - b.client.width).abs() <= size_slack
        && (a.client.height - b.client.height).abs() <= size_slack
}

/// Wrappers and transparent overlays usually stand for an image next to them.
fn representative(page: &dyn Page, id: ElementId) -> ElementId {
    let Some(el) = page.element(id) else { return id };
    if !el.is_html() {
        return id;
    }

    let count = el.children.len();
    if count > 0 && count < 3 {
        let mut inner = el.children[0];
        if let Some(first) = page.element(inner) {
            if !first.children.is_empty() && first.children.len() < 4 {
                let head = first.children[0];
                let tail = first.children[first.children.len() - 1];
                if page.element(head).is_some_and(|e| e.is("img")) {
                    inner = head;
                } else if page.element(tail).is_some_and(|e| e.is("img")) {
                    inner = tail;
                }
            }
        }
        if let Some(img) = page.element(inner) {
            if img.src().is_some()
                && el.text.trim().is_empty()
                && el.offset.width - img.offset.width < 25.0
                && el.offset.height - img.offset.height < 25.0
            {
                return inner;
            }
        }
        return id;
    }

    if count != 0 {
        return id;
    }
    let Some(parent) = el.parent.and_then(|p| page.element(p)) else { return id };
    let blank = if el.is("img") {
        el.src().is_some_and(|s| s.starts_with("data:"))
            || el.natural.width < 3.0
            || el.natural.height < 3.0
            || el.style.opacity_zero
    } else {
        el.text.trim().is_empty()
    };
    if parent.children.len() > 5 || !blank || has_background(el) {
        return id;
    }
    let Some(pos) = parent.children.iter().position(|c| *c == id) else { return id };
    let siblings = [
        pos.checked_sub(2).map(|i| parent.children[i]),
        pos.checked_sub(1).map(|i| parent.children[i]),
        parent.children.get(pos + 1).copied(),
    ];
    siblings
        .into_iter()
        .flatten()
        .find(|sib| page.element(*sib).is_some_and(|s| s.is("img") && close(s, el, 30.0)))
        .unwrap_or(id)
}

/// Works out which image `id` displays, following wrappers and overlays.
pub fn get_images(page: &dyn Page, id: ElementId) -> Option<Images> {
    let id = representative(page, id);
    let el = page.element(id)?;
    let base = page.location();

    let mut src_full =
        el.current_src.clone().or_else(|| el.attr("src").map(str::to_string)).or_else(|| el.attr("data").map(str::to_string));
    if src_full.is_none() && el.is("image") {
        src_full = el.attr("xlink:href").or_else(|| el.attr("href")).map(|h| normalize(h, base));
    }
    if let Some(s) = &src_full {
        if !el.is_html() {
            src_full = Some(normalize(s, base));
        } else {
            let tiny = |v: f64| v > 0.0 && v < 3.0;
            if tiny(el.natural.width) || tiny(el.natural.height) {
                src_full = None;
            }
        }
    }
    let src_full = src_full.filter(|s| !s.is_empty());
    let mut images = Images {
        element: Some(id),
        src: src_full.as_deref().map(|s| strip_scheme(s).to_string()),
        src_full,
        ..Images::default()
    };
    if !el.is_html() {
        return images.src.is_some().then_some(images);
    }

    let background = if has_background(el) {
        el.style.background_image.clone()
    } else {
        el.parent
            .and_then(|p| page.element(p))
            .filter(|p| has_background(p) && close(p, el, 30.0))
            .and_then(|p| p.style.background_image.clone())
    };
    let urls = background.as_deref().map(background_urls).unwrap_or_default();
    if let [only] = urls.as_slice() {
        let full = normalize(only, base);
        images.bg = Some(strip_scheme(&full).to_string());
        images.bg_full = Some(full);
    }
    (!images.is_empty()).then_some(images)
}

/// Looks for an image under the pointer that visually belongs to `target`,
/// e.g. a thumbnail layered over or under a link.
pub(crate) fn probe_point(page: &dyn Page, target: ElementId, at: Point) -> Option<Images> {
    let target_rect = page.element(target)?.rect.inflate(10.0);
    for id in page.elements_from_point(at).into_iter().take(5) {
        if page.is_body(id) {
            break;
        }
        let el = page.element(id)?;
        if el.current_src.is_none() && !has_background(el) {
            continue;
        }
        let r = el.rect;
        let inside = at.x >= r.left && at.x < r.right() && at.y >= r.top && at.y < r.bottom();
        let enclosed = target_rect.left <= r.left
            && target_rect.right() >= r.right()
            && target_rect.top <= r.top
            && target_rect.bottom() >= r.bottom();
        if inside && enclosed {
            return get_images(page, id);
        }
        break;
    }
    None
}
