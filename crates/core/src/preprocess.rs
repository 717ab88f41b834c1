use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::scoring::POSITIVE_RE;

/// Configuration for HTML preprocessing
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Drop script, style, noscript, iframe, svg and canvas elements
    pub remove_unwanted: bool,
    /// Unwrap elements whose class/id look like page chrome
    pub remove_unlikely: bool,
    /// Keep unlikely-looking elements that also match a positive pattern
    pub keep_positive: bool,
    /// Drop elements hidden with inline styles or the `hidden` attribute
    pub remove_hidden: bool,
    /// Drop navigation, footers, asides, forms and buttons outright
    pub favor_precision: bool,
    /// Base URL for converting relative URLs
    pub base_url: Option<Url>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            remove_unwanted: true,
            remove_unlikely: true,
            keep_positive: true,
            remove_hidden: true,
            favor_precision: true,
            base_url: None,
        }
    }
}

static UNLIKELY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(banner|breadcrumbs?|combx|comment|community|disqus|extra|foot|header|menu|related|remark|rss|share|shoutbox|sidebar|skyscraper|social|sponsor|subscribe|ad-break|agegate|pagination|pager|popup|newsletter|promo)").unwrap()
});

static HIDDEN_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap());

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Elements never unwrapped even when their class looks unlikely.
const STRUCTURAL_TAGS: &[&str] = &["html", "body", "article", "main", "a"];

/// Clean raw HTML in a single streaming pass before scoring.
pub fn preprocess_html(html: &str, config: &PreprocessConfig) -> String {
    let keep_positive = config.keep_positive;
    let base_url = config.base_url.as_ref();

    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                if config.remove_unwanted {
                    Some(lol_html::element!("script, style, noscript, iframe, svg, canvas, template", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else {
                    None
                },
                if config.favor_precision {
                    Some(lol_html::element!(
                        r#"nav, footer, aside, form, button, [role="navigation"]"#,
                        |el| {
                            el.remove();
                            Ok(())
                        }
                    ))
                } else {
                    None
                },
                if config.remove_hidden {
                    Some(lol_html::element!("*", |el| {
                        let hidden_style =
                            el.get_attribute("style").is_some_and(|style| HIDDEN_STYLE_RE.is_match(&style));
                        if hidden_style || el.has_attribute("hidden") {
                            el.remove();
                        }
                        Ok(())
                    }))
                } else {
                    None
                },
                if config.remove_unlikely {
                    Some(lol_html::element!("*", move |el| {
                        if el.removed() || STRUCTURAL_TAGS.contains(&el.tag_name().as_str()) {
                            return Ok(());
                        }
                        let id = el.get_attribute("id").unwrap_or_default();
                        let class = el.get_attribute("class").unwrap_or_default();
                        if is_unlikely(&id, &class, keep_positive) {
                            el.remove_and_keep_content();
                        }
                        Ok(())
                    }))
                } else {
                    None
                },
                base_url.map(|base| {
                    lol_html::element!("a[href]", move |el| {
                        absolutize(el, "href", base);
                        Ok(())
                    })
                }),
                base_url.map(|base| {
                    lol_html::element!("img[src]", move |el| {
                        absolutize(el, "src", base);
                        Ok(())
                    })
                }),
            ]
            .into_iter()
            .flatten()
            .collect(),
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    if let Err(e) = rewriter.write(html.as_bytes()) {
        tracing::warn!("HTML rewriting failed, scoring the raw document: {}", e);
        return COMMENT_RE.replace_all(html, "").into_owned();
    }
    if let Err(e) = rewriter.end() {
        tracing::warn!("HTML rewriting failed, scoring the raw document: {}", e);
        return COMMENT_RE.replace_all(html, "").into_owned();
    }

    let rewritten = String::from_utf8_lossy(&output);
    COMMENT_RE.replace_all(&rewritten, "").into_owned()
}

fn is_unlikely(id: &str, class: &str, keep_positive: bool) -> bool {
    let matches_unlikely = |value: &str| UNLIKELY_RE.is_match(value) && (!keep_positive || !POSITIVE_RE.is_match(value));

    if !id.is_empty() && matches_unlikely(id) {
        return true;
    }
    class.split_whitespace().any(matches_unlikely)
}

fn absolutize(el: &mut lol_html::html_content::Element<'_, '_>, attr: &str, base: &Url) {
    if let Some(value) = el.get_attribute(attr)
        && let Ok(absolute) = base.join(value.trim())
    {
        el.set_attribute(attr, absolute.as_str()).ok();
    }
}

/// Resolve `href`/`src` attributes in an HTML fragment against `base_url`.
pub fn convert_relative_urls(html: &str, base_url: &Url) -> String {
    let config = PreprocessConfig {
        remove_unwanted: false,
        remove_unlikely: false,
        keep_positive: true,
        remove_hidden: false,
        favor_precision: false,
        base_url: Some(base_url.clone()),
    };
    preprocess_html(html, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_unwanted_tags() {
        let html = r#"
            <html>
                <head><script>alert('test');</script><style>body{color:red;}</style></head>
                <body>
                    <noscript>Enable JavaScript</noscript>
                    <iframe src="https://example.com"></iframe>
                    <svg><rect width="100" height="100"/></svg>
                    <canvas id="chart"></canvas>
                    <p>Content</p>
                </body>
            </html>
        "#;

        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(!result.contains("<script"));
        assert!(!result.contains("<style"));
        assert!(result.contains("<p>Content</p>"));

        assert!(!result.contains("alert"), "Script content should be removed");
        assert!(!result.contains("color:red"), "Style content should be removed");
        assert!(!result.contains("Enable JavaScript"), "Noscript content should be removed");
        assert!(!result.contains("example.com"), "Iframe src should be removed");
        assert!(!result.contains("rect"), "SVG content should be removed");
        assert!(!result.contains("chart"), "Canvas id should be removed");
    }

    #[test]
    fn test_remove_comments() {
        let html = "<html><body><!-- one\nspanning lines --><p>Visible content</p><!-- two --></body></html>";

        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(!result.contains("<!--"));
        assert!(!result.contains("spanning"));
        assert!(result.contains("Visible content"));
    }

    #[test]
    fn test_unwrap_unlikely_candidates() {
        let html = r#"
            <html>
                <body>
                    <div id="sidebar">Sidebar content</div>
                    <div id="main-content">Main content</div>
                    <div class="banner-ad">Ad</div>
                    <div class="article">Article content</div>
                </body>
            </html>
        "#;

        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(!result.contains("sidebar"));
        assert!(!result.contains("banner-ad"));
        assert!(result.contains("Sidebar content"), "unwrapping keeps the text");
        assert!(result.contains("main-content"));
        assert!(result.contains(r#"class="article""#));
    }

    #[test]
    fn test_body_is_never_unwrapped() {
        let html = r#"<html><body class="has-comments"><p>Text</p></body></html>"#;
        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(result.contains("has-comments"));
    }

    #[test]
    fn test_precision_drops_navigation() {
        let html = r#"
            <body>
                <nav><a href="/">Home</a></nav>
                <div role="navigation">Jump to</div>
                <p>Story</p>
                <aside>Related reading</aside>
                <form><button>Subscribe now</button></form>
                <footer>Copyright</footer>
            </body>
        "#;

        let precise = preprocess_html(html, &PreprocessConfig::default());
        for gone in ["Home", "Jump to", "Related reading", "Subscribe now", "Copyright"] {
            assert!(!precise.contains(gone), "{gone} should be dropped");
        }
        assert!(precise.contains("Story"));

        let recall = preprocess_html(html, &PreprocessConfig { favor_precision: false, ..Default::default() });
        assert!(recall.contains("Related reading"));
        assert!(recall.contains("Copyright"));
    }

    #[test]
    fn test_convert_relative_urls() {
        let base = Url::parse("https://example.com/blog/").unwrap();
        let html = r#"
            <html>
                <body>
                    <a href="/about">About</a>
                    <a href="post.html">Post</a>
                    <img src="image.jpg" />
                </body>
            </html>
        "#;

        let result = convert_relative_urls(html, &base);
        assert!(result.contains("href=\"https://example.com/about\""));
        assert!(result.contains("href=\"https://example.com/blog/post.html\""));
        assert!(result.contains("src=\"https://example.com/blog/image.jpg\""));
    }

    #[test]
    fn test_remove_hidden_elements() {
        let html = r#"
            <html>
                <body>
                    <div style="display:none">Hidden content</div>
                    <div style="visibility: hidden">Invisible content</div>
                    <div hidden>Attribute hidden</div>
                    <div>Visible content</div>
                </body>
            </html>
        "#;

        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(!result.contains("Hidden content"));
        assert!(!result.contains("Invisible content"));
        assert!(!result.contains("Attribute hidden"));
        assert!(result.contains("Visible content"));
    }

    #[test]
    fn test_preserves_preformatted_whitespace() {
        let html = "<body><pre>fn main() {\n    println!(\"hi\");\n}</pre></body>";
        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(result.contains("{\n    println!"));
    }

    #[test]
    fn test_preprocess_full_pipeline() {
        let html = r#"
            <!DOCTYPE html>
            <html>
            <head>
                <script>console.log('test');</script>
                <style>.hidden{display:none;}</style>
                <!-- Comment -->
            </head>
            <body>
                <div id="sidebar" class="menu">
                    <p>Sidebar</p>
                </div>
                <div id="main" class="article">
                    <a href="/post">Link</a>
                    <p style="display:none">Hidden</p>
                    <p>Content</p>
                </div>
            </body>
            </html>
        "#;

        let base = Url::parse("https://example.com").unwrap();
        let config = PreprocessConfig { base_url: Some(base), ..Default::default() };

        let result = preprocess_html(html, &config);

        assert!(!result.contains("<script"));
        assert!(!result.contains("<style"));
        assert!(!result.contains("<!--"));
        assert!(!result.contains("sidebar"));
        assert!(!result.contains("Hidden"));
        assert!(result.contains("main"));
        assert!(result.contains("href=\"https://example.com/post\""));
        assert!(result.contains("Content"));
    }
}
