use crate::page::{ElementId, Page, Size};
use crate::url::normalize;

/// What to compare an element's displayed size against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Enlarge {
    /// The element's own natural size.
    Itself,
    /// A candidate with a known size (e.g. a larger `srcset` entry).
    Candidate(Size),
    /// The element is a clipping container; `inner` is the image it clips.
    Overflow { inner: ElementId },
}

/// Would a preview show noticeably more than the page already does?
///
/// Tiny sources, retina doubles and merely distorted aspect ratios are not
/// worth a popup; otherwise the natural size must exceed the displayed size
/// by `zoom_resized` percent on some axis.
pub fn is_enlargeable(page: &dyn Page, id: ElementId, against: Enlarge, zoom_resized: u32) -> bool {
    let Some(el) = page.element(id) else { return false };
    let (w, h) = (el.client.width, el.client.height);
    let natural = match against {
        Enlarge::Itself => el.natural,
        Enlarge::Candidate(size) => size,
        Enlarge::Overflow { inner } => match page.element(inner) {
            Some(inner) => inner.natural,
            None => return false,
        },
    };
    let (ow, oh) = (natural.width, natural.height);
    let overflow = matches!(against, Enlarge::Overflow { .. });
    if (ow <= 64.0 && oh <= 64.0 && !overflow) || ow <= 1.0 || oh <= 1.0 {
        return false;
    }

    if let Enlarge::Overflow { inner } = against {
        let (Some(inner), outer) = (page.element(inner), el.rect) else { return false };
        let r = inner.rect;
        return r.right() - 10.0 > outer.right()
            || r.bottom() - 10.0 > outer.bottom()
            || r.left + 10.0 < outer.left
            || r.top + 10.0 < outer.top;
    }

    if against == Enlarge::Itself {
        let attr = |name: &str| el.attr(name).and_then(|v| v.parse::<f64>().ok()).filter(|v| *v > 0.0);
        let dw = attr("width").unwrap_or(w);
        let dh = attr("height").unwrap_or(h);
        if ow < 600.0 && oh < 600.0 && (ow / 2.0 - dw).abs() < 8.0 && (oh / 2.0 - dh).abs() < 8.0 {
            return false;
        }
    }

    if h > 0.0 && (w >= ow || h >= oh) && (ow / oh - w / h).abs() <= 0.2 {
        return false;
    }

    let viewport = page.viewport();
    let threshold = f64::from(zoom_resized);
    (w < viewport.width * 0.9 && 100.0 - (w * 100.0) / ow >= threshold)
        || (h < viewport.height * 0.9 && 100.0 - (h * 100.0) / oh >= threshold)
}

/// Picks the widest responsive-image candidate of an `img`, with its
/// estimated natural size. `None` unless it beats the current natural width.
pub(crate) fn best_srcset_candidate(page: &dyn Page, img: ElementId) -> Option<(String, Size)> {
    let el = page.element(img)?;
    let sources: Vec<ElementId> = match el.parent.and_then(|p| page.element(p)) {
        Some(parent) if parent.is("picture") => parent
            .children
            .iter()
            .copied()
            .filter(|c| page.element(*c).is_some_and(|e| e.attr("srcset").is_some()))
            .collect(),
        _ if el.attr("srcset").is_some() => vec![img],
        _ => Vec::new(),
    };

    let natural = el.natural;
    let mut best: Option<(String, f64)> = None;
    for source in sources {
        let Some(srcset) = page.element(source).and_then(|e| e.attr("srcset")) else { continue };
        for item in regex!(r",\s+").split(srcset.trim()).collect::<Vec<_>>().into_iter().rev() {
            let parts: Vec<&str> = item.split_whitespace().collect();
            let [url, descriptor] = parts.as_slice() else { continue };
            let width = if let Some(x) = descriptor.strip_suffix('x') {
                x.parse::<f64>().ok().map(|f| natural.width * f)
            } else if let Some(w) = descriptor.strip_suffix('w') {
                w.parse::<f64>().ok()
            } else {
                None
            };
            let Some(width) = width else { continue };
            let current = best.as_ref().map_or(natural.width, |(_, w)| *w);
            if width > current {
                best = Some((normalize(url, page.location()), width));
            }
        }
    }

    let (url, width) = best?;
    let height = if natural.width > 0.0 { natural.height * width / natural.width } else { 0.0 };
    Some((url, Size::new(width, height)))
}

/// Result of walking up from an image to the container that clips it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OverflowWalk {
    pub parent: Option<ElementId>,
    /// The clipping container hides enough of the image to be worth zooming.
    pub zoomable: bool,
}

/// Walks at most 5 boxes up from `img`, stopping at fixed positioning, and
/// reports the first clipping block container.
pub(crate) fn overflow_walk(page: &dyn Page, img: ElementId, zoom_resized: u32, have_candidate: bool) -> OverflowWalk {
    let mut node = Some(img);
    for i in 0..5 {
        let Some(id) = node else { break };
        if page.is_body(id) {
            break;
        }
        let Some(el) = page.element(id) else { break };
        node = el.parent;
        if el.style.position == crate::page::Position::Fixed {
            break;
        }
        if i == 0 || el.style.overflow_visible || !el.style.display.is_clipping_container() {
            continue;
        }
        if have_candidate {
            return OverflowWalk { parent: Some(id), zoomable: false };
        }
        if el.offset.width <= 32.0 || el.offset.height <= 32.0 {
            continue;
        }
        if !is_enlargeable(page, id, Enlarge::Overflow { inner: img }, zoom_resized) {
            continue;
        }
        return OverflowWalk { parent: Some(id), zoomable: true };
    }
    OverflowWalk::default()
}
