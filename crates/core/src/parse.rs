//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types used by the
//! metadata pass and the content scorer.
//!
//! # Example
//!
//! ```rust
//! use longreader_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <head><meta property="og:title" content="Shared Title"></head>
//!         <body>
//!             <h1>Title</h1>
//!             <p class="content">Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html);
//! assert_eq!(doc.meta_content("og:title"), Some("Shared Title".to_string()));
//! assert_eq!(doc.select("p.content").unwrap().len(), 1);
//! ```

use std::fmt::Debug;
use std::hash::Hash;

use scraper::{ElementRef, Html, Selector};

use crate::{LongreaderError, Result};

/// A parsed HTML document.
///
/// Parsing never fails: html5ever recovers from any malformed input the way
/// browsers do.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string as-is.
    ///
    /// Cleaning is the job of [`crate::preprocess::preprocess_html`], which the
    /// extractor runs before re-parsing.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html) }
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`LongreaderError::HtmlParseError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use longreader_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html);
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(Element::from).collect())
    }

    /// First element matching `selector`, if any.
    pub fn select_first(&'_ self, selector: &str) -> Result<Option<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).next().map(Element::from))
    }

    /// Gets the trimmed content of the `<title>` element.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Reads a `<meta>` tag by `property` or `name`, first non-empty wins.
    ///
    /// Open Graph tags use `property`, most others use `name`; sites mix the
    /// two freely so both are checked.
    pub fn meta_content(&self, key: &str) -> Option<String> {
        let selector = format!(r#"meta[property="{key}"], meta[name="{key}"]"#);
        let sel = Selector::parse(&selector).ok()?;
        self.html
            .select(&sel)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(str::to_string)
    }

    /// Gets all text content from the document.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }
}

/// A wrapper around scraper's `ElementRef`.
///
/// # Example
///
/// ```rust
/// use longreader_core::parse::Document;
///
/// let html = r#"<a href="https://example.com">Link text</a>"#;
/// let doc = Document::parse(html);
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> From<ElementRef<'a>> for Element<'a> {
    fn from(element: ElementRef<'a>) -> Self {
        Self { element }
    }
}

impl<'a> Element<'a> {
    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Concatenation of all text nodes within this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Lowercase tag name (e.g. "div", "a", "span").
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Identity of the underlying tree node, stable for the document's lifetime.
    pub fn node_id(&self) -> impl Copy + Eq + Hash + Debug + use<> {
        (*self.element).id()
    }

    /// Whether both wrappers point at the same node.
    pub fn same_node(&self, other: &Element<'_>) -> bool {
        self.node_id() == other.node_id()
    }

    /// The closest enclosing element.
    pub fn parent(&self) -> Option<Element<'a>> {
        self.element.parent().and_then(ElementRef::wrap).map(Element::from)
    }

    /// Enclosing elements, closest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Element<'a>> + use<'a> {
        self.element.ancestors().filter_map(ElementRef::wrap).map(Element::from)
    }

    /// Direct child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = Element<'a>> + use<'a> {
        self.element.children().filter_map(ElementRef::wrap).map(Element::from)
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`LongreaderError::HtmlParseError`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = parse_selector(selector)?;
        Ok(self.element.select(&sel).map(Element::from).collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| LongreaderError::HtmlParseError(format!("Invalid selector: {}", e)))
}
