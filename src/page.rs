//! Read-only view of the host page.
//!
//! The rule engine never talks to a live document. It walks a [`Page`]: an
//! arena of [`Element`]s addressed by [`ElementId`], with the geometry and
//! computed style the matching heuristics need. Hosts adapt their own DOM to
//! this trait; tests build a [`PageSnapshot`].

use std::collections::BTreeMap;

use url::Url;

#[path = "page/snapshot.rs"]
mod snapshot;

#[allow(unused_imports)]
pub use snapshot::{ElementBuilder, PageSnapshot};

/// Stable handle of a page element for the lifetime of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Viewport-relative box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Rect { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right() && p.y >= self.top && p.y <= self.bottom()
    }

    /// Grows the rect by `margin` on every side.
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect::new(self.left - margin, self.top - margin, self.width + 2.0 * margin, self.height + 2.0 * margin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Inline,
    Block,
    InlineBlock,
    Flex,
    InlineFlex,
    ListItem,
    TableCaption,
    Other,
    None,
}

impl Display {
    /// Box kinds that can clip an overflowing image.
    pub fn is_clipping_container(self) -> bool {
        matches!(
            self,
            Display::Block
                | Display::InlineBlock
                | Display::Flex
                | Display::InlineFlex
                | Display::ListItem
                | Display::TableCaption
        )
    }
}

/// Subset of the computed style the engine inspects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputedStyle {
    pub position: Position,
    pub display: Display,
    /// Both overflow axes are `visible`.
    pub overflow_visible: bool,
    /// Raw `background-image` value, e.g. `url("a.jpg")`.
    pub background_image: Option<String>,
    pub opacity_zero: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Lower-case local name.
    pub tag: String,
    pub namespace: Namespace,
    pub attrs: BTreeMap<String, String>,
    /// `currentSrc` of images and videos, already absolute.
    pub current_src: Option<String>,
    /// Text content.
    pub text: String,
    pub rect: Rect,
    /// Rendered size of the content box.
    pub client: Size,
    /// `offsetWidth` and `offsetHeight`.
    pub offset: Size,
    /// Intrinsic size of loaded media, zero when unknown.
    pub natural: Size,
    pub offset_parent: Option<ElementId>,
    pub style: ComputedStyle,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    pub fn is_html(&self) -> bool {
        self.namespace == Namespace::Html
    }

    /// Absolute `href` of an anchor, if any.
    pub fn href(&self) -> Option<&str> {
        self.attr("href")
    }

    /// The source the element currently displays.
    pub fn src(&self) -> Option<&str> {
        self.current_src.as_deref().or_else(|| self.attr("src"))
    }
}

/// The host page as seen by the rule engine and the state machine.
pub trait Page {
    /// Address of the page itself.
    fn location(&self) -> &Url;

    fn viewport(&self) -> Size;

    fn element(&self, id: ElementId) -> Option<&Element>;

    /// Elements under the point, topmost first.
    fn elements_from_point(&self, at: Point) -> Vec<ElementId>;

    /// Scheme with trailing colon, e.g. `"https:"`.
    fn scheme(&self) -> String {
        format!("{}:", self.location().scheme())
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.element(id).and_then(|e| e.parent)
    }

    /// `true` when `ancestor` is `id` or one of its ancestors.
    fn contains(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    fn is_body(&self, id: ElementId) -> bool {
        self.element(id).is_none_or(|e| e.is("body") || e.is("html"))
    }
}
