use std::collections::BTreeMap;

use url::Url;

use super::{ComputedStyle, Element, ElementId, Namespace, Page, Point, Rect, Size};

/// An owned, in-memory [`Page`].
///
/// Built top-down with [`PageSnapshot::add`]; the first element added under
/// no parent should be `body`. Hit testing walks elements in reverse insertion
/// order so later (deeper) elements are on top.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    location: Url,
    viewport: Size,
    elements: Vec<Element>,
}

impl PageSnapshot {
    pub fn new(location: Url, viewport: Size) -> Self {
        PageSnapshot { location, viewport, elements: Vec::new() }
    }

    /// Creates a snapshot holding only an empty `body`.
    pub fn with_body(location: Url, viewport: Size) -> (Self, ElementId) {
        let mut page = PageSnapshot::new(location, viewport);
        let body = page.add(None, ElementBuilder::new("body").rect(Rect::new(0.0, 0.0, viewport.width, viewport.height)));
        (page, body)
    }

    pub fn add(&mut self, parent: Option<ElementId>, builder: ElementBuilder) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        let mut element = builder.element;
        element.parent = parent;
        if let Some(p) = parent.and_then(|p| self.elements.get_mut(p.0 as usize)) {
            p.children.push(id);
        }
        self.elements.push(element);
        id
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0 as usize)
    }

    pub fn set_attr(&mut self, id: ElementId, name: &str, value: &str) {
        if let Some(e) = self.element_mut(id) {
            e.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }
}

impl Page for PageSnapshot {
    fn location(&self) -> &Url {
        &self.location
    }

    fn viewport(&self) -> Size {
        self.viewport
    }

    fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0 as usize)
    }

    fn elements_from_point(&self, at: Point) -> Vec<ElementId> {
        (0..self.elements.len())
            .rev()
            .map(|i| ElementId(i as u32))
            .filter(|id| self.elements[id.0 as usize].rect.contains(at))
            .collect()
    }
}

/// Fluent constructor for snapshot elements.
#[derive(Debug, Clone, Default)]
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    pub fn new(tag: &str) -> Self {
        let mut element = Element { tag: tag.to_ascii_lowercase(), ..Element::default() };
        element.style.display = match element.tag.as_str() {
            "a" | "span" | "img" | "b" | "i" | "em" | "strong" => super::Display::Inline,
            "li" => super::Display::ListItem,
            _ => super::Display::Block,
        };
        element.style.overflow_visible = true;
        ElementBuilder { element }
    }

    pub fn svg(mut self) -> Self {
        self.element.namespace = Namespace::Svg;
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.element.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn attrs(mut self, attrs: BTreeMap<String, String>) -> Self {
        self.element.attrs.extend(attrs);
        self
    }

    pub fn href(self, href: &str) -> Self {
        self.attr("href", href)
    }

    /// Sets both the `src` attribute and the current source.
    pub fn src(mut self, src: &str) -> Self {
        self.element.current_src = Some(src.to_string());
        self.attr("src", src)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.element.text = text.to_string();
        self
    }

    /// Sets the rect, and the client and offset sizes to match it.
    pub fn rect(mut self, rect: Rect) -> Self {
        self.element.rect = rect;
        self.element.client = Size::new(rect.width, rect.height);
        self.element.offset = Size::new(rect.width, rect.height);
        self
    }

    pub fn natural(mut self, width: f64, height: f64) -> Self {
        self.element.natural = Size::new(width, height);
        self
    }

    pub fn offset_parent(mut self, id: ElementId) -> Self {
        self.element.offset_parent = Some(id);
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.element.style = style;
        self
    }

    pub fn background(mut self, value: &str) -> Self {
        self.element.style.background_image = Some(value.to_string());
        self
    }

    pub fn display(mut self, display: super::Display) -> Self {
        self.element.style.display = display;
        self
    }

    pub fn clip(mut self) -> Self {
        self.element.style.overflow_visible = false;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.element.style.position = super::Position::Fixed;
        self
    }
}
