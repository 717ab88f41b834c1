use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::parse::Element;
use crate::preprocess::convert_relative_urls;
use crate::scoring::link_density;

/// Configuration for HTML post-processing cleanup
#[derive(Debug, Clone)]
pub struct PostProcessConfig {
    /// Whether to remove empty nodes
    pub remove_empty_nodes: bool,
    /// Maximum passes for removing empty nodes
    pub max_empty_node_passes: usize,
    /// Whether to remove nodes with high link density
    pub remove_high_link_density: bool,
    /// Maximum link density threshold (0.0 to 1.0)
    pub max_link_density: f64,
    /// Whether to clean up nested DIVs with single children
    pub clean_nested_divs: bool,
    /// Whether to remove conditional comments
    pub remove_conditional_comments: bool,
    /// Whether to drop share/subscribe widgets identified by their text
    pub remove_chrome_text: bool,
    /// Keep `<img>`/`<picture>` elements
    pub include_images: bool,
    /// Keep `<a>` elements (otherwise unwrapped to their text)
    pub include_links: bool,
    /// Keep inline formatting tags (otherwise unwrapped to their text)
    pub include_formatting: bool,
    /// Keep `<table>` elements
    pub include_tables: bool,
    /// Whether to keep class attributes (default: false)
    pub keep_classes: bool,
    /// Base URL for converting relative URLs
    pub base_url: Option<Url>,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            remove_empty_nodes: true,
            max_empty_node_passes: 10,
            remove_high_link_density: true,
            max_link_density: 0.5,
            clean_nested_divs: true,
            remove_conditional_comments: true,
            remove_chrome_text: true,
            include_images: true,
            include_links: true,
            include_formatting: true,
            include_tables: true,
            keep_classes: false,
            base_url: None,
        }
    }
}

/// Whole-element texts that belong to sharing and subscription widgets.
static CHROME_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(share this post|share|copy link|link copied|more from .{1,80}|subscribe( now)?|subscribed|sign up|leave a comment|\d+\s+comments?|read more|print|email|tweet)$")
        .unwrap()
});

static CONDITIONAL_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!--\[if[^\]]*\]>.*?<!\[endif\]-->|<!--<!\[if[^\]]*\]>.*?<!\[endif\]-->"#).unwrap()
});

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\s+class=["'][^"']*["']"#).unwrap());

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static NESTED_DIV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<div(?:\s[^>]*)?>\s*<div(?:\s[^>]*)?>(.*?)</div\s*>\s*</div\s*>"#).unwrap());

/// Post-process extracted HTML by cleaning up remaining unwanted content
pub fn postprocess_html(html: &str, config: &PostProcessConfig) -> String {
    let mut processed = html.to_string();

    if config.remove_conditional_comments {
        processed = CONDITIONAL_COMMENT_RE.replace_all(&processed, "").into_owned();
    }

    processed = apply_include_flags(&processed, config);

    if !config.keep_classes {
        processed = strip_classes(&processed);
    }

    if config.remove_chrome_text {
        processed = remove_chrome_text_blocks(&processed);
    }

    if config.remove_empty_nodes {
        processed = remove_empty_nodes(&processed, config.max_empty_node_passes);
    }

    if config.remove_high_link_density {
        processed = remove_high_link_density_nodes(&processed, config.max_link_density);
    }

    if config.clean_nested_divs {
        processed = clean_nested_divs(&processed);
    }

    if let Some(base_url) = &config.base_url {
        processed = convert_relative_urls(&processed, base_url);
    }

    processed
}

/// Drop or unwrap elements the caller asked to leave out of the output.
fn apply_include_flags(html: &str, config: &PostProcessConfig) -> String {
    if config.include_images && config.include_links && config.include_formatting && config.include_tables {
        return html.to_string();
    }

    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                if config.include_images {
                    None
                } else {
                    Some(lol_html::element!("img, picture", |el| {
                        el.remove();
                        Ok(())
                    }))
                },
                if config.include_tables {
                    None
                } else {
                    Some(lol_html::element!("table", |el| {
                        el.remove();
                        Ok(())
                    }))
                },
                if config.include_links {
                    None
                } else {
                    Some(lol_html::element!("a", |el| {
                        el.remove_and_keep_content();
                        Ok(())
                    }))
                },
                if config.include_formatting {
                    None
                } else {
                    Some(lol_html::element!("b, strong, i, em, u, s, del, mark, small, sub, sup", |el| {
                        el.remove_and_keep_content();
                        Ok(())
                    }))
                },
            ]
            .into_iter()
            .flatten()
            .collect(),
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    if rewriter.write(html.as_bytes()).is_err() {
        return html.to_string();
    }
    if rewriter.end().is_err() {
        return html.to_string();
    }

    String::from_utf8_lossy(&output).into_owned()
}

/// Strip all class attributes from HTML
fn strip_classes(html: &str) -> String {
    CLASS_ATTR_RE.replace_all(html, "").into_owned()
}

/// Remove empty nodes from HTML
///
/// A node is considered empty if it has no text content or only whitespace
/// and line breaks. This iteratively removes empty nodes until none remain.
fn remove_empty_nodes(html: &str, max_passes: usize) -> String {
    let mut result = html.to_string();
    let tags = [
        "div", "p", "span", "section", "article", "aside", "nav", "header", "footer", "li", "ul", "ol",
    ];

    for _ in 0..max_passes {
        let prev_result = result.clone();

        for tag in tags {
            let empty_re = Regex::new(&format!(r#"<{}(?:\s[^>]*)?>\s*(?:<br\s*/?>\s*)*</{}>"#, tag, tag)).unwrap();
            result = empty_re.replace_all(&result, "").into_owned();
        }

        if result == prev_result {
            break;
        }
    }

    result
}

/// Text interleaved with inline tags only, so block matches stay innermost.
const INLINE_CONTENT: &str = r"(?:[^<]|</?(?:a|span|strong|em|b|i|u|small|svg|path|img|br)\b[^>]*>)*?";

/// Remove widget blocks (share buttons, "More from ..." rails) by their text.
fn remove_chrome_text_blocks(html: &str) -> String {
    let tags = ["div", "p", "span", "a", "li", "button"];
    let mut result = html.to_string();

    for tag in tags {
        let element_re = Regex::new(&format!(r#"<{}(?:\s[^>]*)?>({})</{}>"#, tag, INLINE_CONTENT, tag)).unwrap();
        result = element_re
            .replace_all(&result, |caps: &regex::Captures| {
                let inner_html = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let text = strip_tags(inner_html);
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if CHROME_TEXT_RE.is_match(&text) {
                    String::new()
                } else {
                    caps.get(0).map(|m| m.as_str()).unwrap_or("").to_string()
                }
            })
            .into_owned();
    }

    result
}

/// Blocks judged by link density; nested matches are judged on their own text.
const LINK_DENSITY_TAGS: &str = "div, p, section, aside, nav, ul, li";

/// Remove nodes with high link density
///
/// Link density is the ratio of link text to total text, measured on the
/// parsed fragment so nested blocks never borrow text from their neighbours.
/// Nodes above the threshold are removed as they're likely navigation/menus.
fn remove_high_link_density_nodes(html: &str, max_density: f64) -> String {
    let Ok(selector) = Selector::parse(LINK_DENSITY_TAGS) else {
        return html.to_string();
    };
    let mut fragment = Html::parse_fragment(html);

    let dense: Vec<_> = fragment
        .select(&selector)
        .filter(|el| link_density(&Element::from(*el)) > max_density)
        .map(|el| (*el).id())
        .collect();

    if dense.is_empty() {
        return html.to_string();
    }

    for id in dense {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
    }

    fragment.root_element().inner_html()
}

/// Clean up nested DIVs with single children
///
/// If a DIV contains only another DIV as its direct child,
/// unwrap the outer DIV to reduce nesting.
fn clean_nested_divs(html: &str) -> String {
    let mut result = html.to_string();

    for _ in 0..10 {
        let next = NESTED_DIV_RE.replace_all(&result, r#"<div>$1</div>"#).into_owned();
        if next == result {
            break;
        }
        result = next;
    }

    result
}

/// Strip HTML tags from a string, keeping only text content
fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}
