//! Per-element scratch data.
//!
//! Everything learned about a page element (its resolved URLs, whether a
//! resolve is in flight, captions, hi-res alternates, ...) lives in this
//! side-table keyed by [`ElementId`], never on the element itself. An
//! attribute mutation on a watched element invalidates its entry.

use std::collections::HashMap;

use crate::engine::PendingResolve;
use crate::page::ElementId;
use crate::resolve::RequestId;

/// What is known about an element's media.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Candidate URLs, best first.
    Urls(Vec<String>),
    /// A resolve is needed but not dispatched yet.
    Awaiting(PendingResolve),
    /// A resolve request is outstanding.
    InFlight(RequestId),
}

/// Thumbnail the element displays, used to judge whether a preview enlarges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// The representative image URL, when known.
    pub url: Option<String>,
    /// A background thumbnail has no reliable natural size, so it is always accepted.
    pub trusted: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementAnnotation {
    pub resolution: Option<Resolution>,
    /// No rule applies; hovering the element does nothing.
    pub non_viable: bool,
    pub thumbnail: Option<Thumbnail>,
    pub svg: bool,
    /// `Some(true)` while the high-resolution list is displayed.
    pub hi_res: Option<bool>,
    /// The list not currently displayed (hi-res or regular).
    pub hi_res_stack: Vec<String>,
    /// Candidates not tried yet for the current load.
    pub queue: Vec<String>,
    /// Key into the album store.
    pub album: Option<String>,
    pub fallback_zoom: Vec<String>,
    pub overflow_parent: Option<ElementId>,
    pub no_history: bool,
    pub caption: Option<String>,
}

impl ElementAnnotation {
    pub fn resolve_pending(&self) -> bool {
        matches!(self.resolution, Some(Resolution::Awaiting(_) | Resolution::InFlight(_)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Annotations {
    entries: HashMap<ElementId, ElementAnnotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Annotations::default()
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementAnnotation> {
        self.entries.get(&id)
    }

    pub fn entry(&mut self, id: ElementId) -> &mut ElementAnnotation {
        self.entries.entry(id).or_default()
    }

    pub fn is_non_viable(&self, id: ElementId) -> bool {
        self.get(id).is_some_and(|a| a.non_viable)
    }

    pub fn caption(&self, id: ElementId) -> Option<&str> {
        self.get(id).and_then(|a| a.caption.as_deref())
    }

    /// Forgets everything about `id`.
    pub fn invalidate(&mut self, id: ElementId) {
        if self.entries.remove(&id).is_some() {
            tracing::debug!(element = id.0, "annotation invalidated");
        }
    }

    /// Drops the per-load state of `id`, keeping the album link when asked.
    pub fn reset_load(&mut self, id: ElementId, keep_album: bool) {
        if let Some(a) = self.entries.get_mut(&id) {
            a.queue.clear();
            a.hi_res = None;
            a.hi_res_stack.clear();
            a.svg = false;
            if !keep_album {
                a.album = None;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_forgets_entry() {
        let mut annotations = Annotations::new();
        let id = ElementId(3);
        annotations.entry(id).caption = Some("cap".into());
        annotations.entry(id).non_viable = true;
        assert_eq!(Some("cap"), annotations.caption(id));
        assert!(annotations.is_non_viable(id));

        annotations.invalidate(id);
        assert!(annotations.get(id).is_none());
        assert!(!annotations.is_non_viable(id));
    }

    #[test]
    fn reset_load_keeps_album_when_asked() {
        let mut annotations = Annotations::new();
        let id = ElementId(1);
        {
            let a = annotations.entry(id);
            a.album = Some("x.com/album".into());
            a.queue = vec!["a".into()];
            a.hi_res = Some(true);
        }
        annotations.reset_load(id, true);
        let a = annotations.get(id).unwrap();
        assert!(a.queue.is_empty());
        assert_eq!(None, a.hi_res);
        assert_eq!(Some("x.com/album"), a.album.as_deref());

        annotations.reset_load(id, false);
        assert_eq!(None, annotations.get(id).unwrap().album);
    }
}
