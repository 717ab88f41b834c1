use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::article::UNTITLED;
use crate::markdown::html_to_markdown;
use crate::metadata::RawMetadata;
use crate::parse::{Document, Element};
use crate::postprocess::{PostProcessConfig, postprocess_html};
use crate::preprocess::{PreprocessConfig, preprocess_html};
use crate::scoring::{ScoreConfig, initial_score, link_density, paragraph_score};
use crate::{LongreaderError, Result};

/// Configuration for content extraction
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Drop navigation, footers, asides and high-link-density blocks
    pub favor_precision: bool,
    /// Keep inline formatting (bold, italic, code)
    pub include_formatting: bool,
    /// Keep images
    pub include_images: bool,
    /// Keep hyperlinks
    pub include_links: bool,
    /// Keep tables
    pub include_tables: bool,
    /// Wall-clock budget for scoring
    pub timeout: Duration,
    /// Minimum markdown length in characters
    pub min_output_size: usize,
    /// Minimum score for the top candidate before falling back to landmarks
    pub min_score: f64,
    /// Sibling score threshold (multiplier of top score)
    pub sibling_threshold: f64,
    /// Link density above which postprocessing drops a block
    pub max_link_density: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            favor_precision: true,
            include_formatting: true,
            include_images: true,
            include_links: true,
            include_tables: true,
            timeout: Duration::from_secs(30),
            min_output_size: 100,
            min_score: 20.0,
            sibling_threshold: 0.2,
            max_link_density: 0.5,
        }
    }
}

/// Extractor output: markdown content, resolved title and raw metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub content: String,
    pub title: String,
    pub metadata: RawMetadata,
}

/// Elements whose text is scored and flows up to their ancestors
const PARAGRAPH_TAGS: &str = "p, pre, td, blockquote, li";

/// Share of a paragraph's points received by the parent, grandparent and
/// great-grandparent
const ANCESTOR_DIVISORS: [f64; 3] = [1.0, 2.0, 6.0];

/// Landmarks tried in order when no candidate scores high enough
const FALLBACK_SELECTORS: &[&str] = &["article", "main", "[role=main]", "body"];

/// Siblings that are plain paragraphs are kept when they are at least this long
const SIBLING_PARAGRAPH_MIN_CHARS: usize = 80;
const SIBLING_PARAGRAPH_MAX_LINK_DENSITY: f64 = 0.25;

/// A scored container element
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    element: Element<'a>,
    score: f64,
}

/// Extract the main content and metadata of an HTML page.
///
/// The metadata pass runs on the raw document so that JSON-LD and social
/// tags survive; scoring runs on the preprocessed document. Relative links
/// in the output are resolved against `base_url` when given.
///
/// # Errors
///
/// Returns [`LongreaderError::UnprocessableContent`] when no container holds
/// meaningful content, the output is shorter than
/// [`ExtractConfig::min_output_size`], or scoring exceeds
/// [`ExtractConfig::timeout`].
pub fn extract(html: &str, base_url: Option<&Url>, config: &ExtractConfig) -> Result<Extraction> {
    let deadline = Instant::now() + config.timeout;

    let raw = Document::parse(html);
    let metadata = raw.extract_metadata();
    let title = raw
        .social_preview_title()
        .or_else(|| metadata.title.clone())
        .unwrap_or_else(|| UNTITLED.to_string());

    let cleaned = preprocess_html(html, &PreprocessConfig { favor_precision: config.favor_precision, ..Default::default() });
    let doc = Document::parse(&cleaned);

    let candidates = score_candidates(&doc, deadline)?;
    let selected = match top_candidate(&candidates) {
        Some(top) if top.score >= config.min_score => {
            tracing::debug!("Top candidate <{}> scored {:.1}", top.element.tag_name(), top.score);
            join_with_siblings(top, &candidates, config)
        }
        _ => fallback_container(&doc)?,
    };

    let content_html = postprocess_html(&selected, &postprocess_config(config, base_url));
    let content = html_to_markdown(&content_html).replace("![]()", "");
    let content = content.trim().to_string();

    let length = content.chars().count();
    if length < config.min_output_size {
        return Err(LongreaderError::UnprocessableContent(format!(
            "extracted {} characters, need at least {}",
            length, config.min_output_size
        )));
    }

    Ok(Extraction { content, title, metadata })
}

fn check_deadline(deadline: Instant) -> Result<()> {
    if Instant::now() >= deadline {
        return Err(LongreaderError::UnprocessableContent("content extraction timed out".to_string()));
    }
    Ok(())
}

/// Score every container that holds a paragraph-level element, in the order
/// containers are first reached.
fn score_candidates<'a>(doc: &'a Document, deadline: Instant) -> Result<Vec<Candidate<'a>>> {
    let score_config = ScoreConfig::default();
    let mut candidates: Vec<Candidate<'a>> = Vec::new();
    let mut positions = HashMap::new();

    for paragraph in doc.select(PARAGRAPH_TAGS)? {
        check_deadline(deadline)?;
        let Some(points) = paragraph_score(&paragraph, &score_config) else {
            continue;
        };

        let ancestors = paragraph.ancestors().filter(|a| a.tag_name() != "html");
        for (ancestor, divisor) in ancestors.zip(ANCESTOR_DIVISORS) {
            let position = *positions.entry(ancestor.node_id()).or_insert_with(|| {
                candidates.push(Candidate { element: ancestor, score: initial_score(&ancestor, &score_config) });
                candidates.len() - 1
            });
            candidates[position].score += points / divisor;
        }
    }

    for candidate in &mut candidates {
        check_deadline(deadline)?;
        candidate.score *= 1.0 - link_density(&candidate.element);
    }

    Ok(candidates)
}

/// Highest scorer; ties go to the container reached first.
fn top_candidate<'a, 'b>(candidates: &'b [Candidate<'a>]) -> Option<&'b Candidate<'a>> {
    let mut best: Option<&'b Candidate<'a>> = None;
    for candidate in candidates {
        if best.is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    best
}

/// Outer HTML of the top candidate and the siblings worth keeping, in
/// document order.
fn join_with_siblings(top: &Candidate<'_>, candidates: &[Candidate<'_>], config: &ExtractConfig) -> String {
    let Some(parent) = top.element.parent() else {
        return top.element.outer_html();
    };
    let threshold = top.score * config.sibling_threshold;

    parent
        .children()
        .filter(|sibling| {
            if sibling.same_node(&top.element) {
                return true;
            }
            let scored = candidates
                .iter()
                .find(|c| c.element.same_node(sibling))
                .is_some_and(|c| c.score >= threshold);
            scored || is_substantial_paragraph(sibling)
        })
        .map(|sibling| sibling.outer_html())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_substantial_paragraph(element: &Element<'_>) -> bool {
    element.tag_name() == "p"
        && element.text().trim().chars().count() > SIBLING_PARAGRAPH_MIN_CHARS
        && link_density(element) < SIBLING_PARAGRAPH_MAX_LINK_DENSITY
}

fn fallback_container(doc: &Document) -> Result<String> {
    for selector in FALLBACK_SELECTORS {
        if let Some(element) = doc.select_first(selector)?
            && !element.text().trim().is_empty()
        {
            tracing::debug!("No candidate reached the minimum score, using <{}>", element.tag_name());
            return Ok(element.outer_html());
        }
    }
    Err(LongreaderError::UnprocessableContent("no readable content found".to_string()))
}

fn postprocess_config(config: &ExtractConfig, base_url: Option<&Url>) -> PostProcessConfig {
    PostProcessConfig {
        remove_high_link_density: config.favor_precision,
        max_link_density: config.max_link_density,
        include_images: config.include_images,
        include_links: config.include_links,
        include_formatting: config.include_formatting,
        include_tables: config.include_tables,
        base_url: base_url.cloned(),
        ..Default::default()
    }
}
