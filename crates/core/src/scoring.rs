use std::sync::LazyLock;

use regex::Regex;

use crate::parse::Element;

/// Weights used by the content scorer.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Weight for positive class/ID patterns
    pub positive_weight: f64,
    /// Weight for negative class/ID patterns
    pub negative_weight: f64,
    /// Maximum points a paragraph earns from its length
    pub max_char_density_score: f64,
    /// Characters per length point
    pub chars_per_point: usize,
    /// Paragraphs shorter than this (in chars, trimmed) are not scored
    pub min_paragraph_length: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            positive_weight: 25.0,
            negative_weight: -25.0,
            max_char_density_score: 3.0,
            chars_per_point: 100,
            min_paragraph_length: 25,
        }
    }
}

/// Calculate the base score for an element based on its tag name
///
/// Scores are assigned based on how likely a tag is to contain main content:
/// - ARTICLE: +10 (primary content container)
/// - SECTION: +8 (content section)
/// - DIV: +5 (generic container)
/// - PRE, TD, BLOCKQUOTE: +3 (content elements)
/// - ADDRESS, OL, UL, DL, DD, DT, LI, FORM: -3 (list/metadata elements)
/// - H1-H6, TH, HEADER, FOOTER, NAV: -5 (header/navigation elements)
pub fn base_tag_score(element: &Element<'_>) -> f64 {
    match element.tag_name().as_str() {
        "article" => 10.0,
        "section" => 8.0,
        "div" | "main" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" | "header" | "footer" | "nav" => -5.0,
        _ => 0.0,
    }
}

/// Class/ID fragments that suggest an element contains main content
pub(crate) static POSITIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(article|body|content|entry|hentry|h-entry|main|page|post|text|blog|story|tweet)").unwrap()
});

/// Class/ID fragments that suggest an element is page chrome
pub(crate) static NEGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(banner|breadcrumbs?|combx|comment|community|disqus|extra|foot|header|menu|related|remark|rss|share|shoutbox|sidebar|skyscraper|social|sponsor|subscribe|ad-break|agegate|pagination|pager|popup|newsletter|promo)").unwrap()
});

/// Calculate the class/ID weight adjustment for an element
///
/// Returns `positive_weight` if the id or any class matches the positive
/// patterns, `negative_weight` if it matches only the negative ones.
pub fn class_id_weight(element: &Element<'_>, config: &ScoreConfig) -> f64 {
    if let Some(id) = element.attr("id") {
        if POSITIVE_RE.is_match(id) {
            return config.positive_weight;
        }
        if NEGATIVE_RE.is_match(id) {
            return config.negative_weight;
        }
    }

    if let Some(class) = element.attr("class") {
        for class_name in class.split_whitespace() {
            if POSITIVE_RE.is_match(class_name) {
                return config.positive_weight;
            }
            if NEGATIVE_RE.is_match(class_name) {
                return config.negative_weight;
            }
        }
    }

    0.0
}

/// Starting score of a container before paragraph points flow into it.
pub fn initial_score(element: &Element<'_>, config: &ScoreConfig) -> f64 {
    base_tag_score(element) + class_id_weight(element, config)
}

/// Points a paragraph-level element contributes to its ancestors.
///
/// One point for existing, one per comma, and one per `chars_per_point`
/// characters up to `max_char_density_score`. Returns `None` for text too
/// short to be meaningful.
pub fn paragraph_score(element: &Element<'_>, config: &ScoreConfig) -> Option<f64> {
    let text = element.text();
    let text = text.trim();
    let length = text.chars().count();
    if length < config.min_paragraph_length {
        return None;
    }

    let comma_score = text.matches(',').count() as f64;
    let char_score = ((length / config.chars_per_point) as f64).min(config.max_char_density_score);

    Some(1.0 + comma_score + char_score)
}

/// Calculate the link density of an element
///
/// Link density is the ratio of link text characters to total text characters.
/// Returns a value from 0.0 (no links) to 1.0 (all text is in links).
pub fn link_density(element: &Element<'_>) -> f64 {
    let text_length = element.text().chars().count();

    if text_length == 0 {
        return 0.0;
    }

    let link_text_length = element
        .select("a")
        .unwrap_or_default()
        .iter()
        .map(|link| link.text().chars().count())
        .sum::<usize>();

    link_text_length as f64 / text_length as f64
}
