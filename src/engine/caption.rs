use crate::annotations::Annotations;
use crate::page::{ElementId, Page};
use crate::sanitize::plain_text;

/// Finds a caption for `target`.
///
/// Prefers an explicit caption already recorded on the element or an
/// ancestor, then a `title`, then `alt`, then (optionally) the link text.
/// Captions that merely repeat the link text or address are dropped.
pub(crate) fn extract(
    page: &dyn Page,
    annotations: &Annotations,
    target: ElementId,
    anchor: Option<(ElementId, &str)>,
    representative: Option<&str>,
    use_link_text: bool,
) -> Option<String> {
    let el = page.element(target)?;
    let own_src = el.attr("src").map(|_| el.src().unwrap_or_default());

    let link_text = anchor
        .and_then(|(id, href)| page.element(id).map(|a| (a.text.trim().to_string(), href)))
        .filter(|(text, href)| !text.is_empty() && text != href)
        .map(|(text, _)| text);

    let mut caption = None;
    let mut node = Some(target);
    for _ in 0..=5 {
        let Some(id) = node else { break };
        let Some(n) = page.element(id) else { break };
        if let Some(c) = annotations.caption(id) {
            caption = Some(c.to_string());
            break;
        }
        if let Some(title) = n.attr("title").filter(|t| !t.trim().is_empty() && Some(*t) != own_src) {
            caption = Some(title.to_string());
            break;
        }
        node = n.parent;
    }

    if caption.is_none() {
        let alt = el.attr("alt").filter(|a| !a.is_empty() && Some(*a) != el.src() && Some(*a) != representative);
        caption = match alt {
            Some(alt) => Some(alt.to_string()),
            None if use_link_text => link_text.clone(),
            None => None,
        };
    }

    let caption = caption?;
    let href = anchor.map(|(_, h)| h).or_else(|| el.href());
    if (!use_link_text && Some(&caption) == link_text.as_ref()) || Some(caption.as_str()) == href {
        return None;
    }
    let caption = plain_text(&caption);
    (!caption.is_empty()).then_some(caption)
}
