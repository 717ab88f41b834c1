//! Markdown normalization.
//!
//! Pure functions applied to extractor output before assembly: paragraph
//! spacing, plain-text rendering for descriptions, and removal of text that
//! merely repeats the article title.

use std::sync::LazyLock;

use regex::Regex;

static EXCESS_NEWLINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static HEADING_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {0,3}#{1,6}(?:\s|$)").unwrap());
static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])\s+").unwrap());
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[ \t]+(.+?)[ \t#]*$").unwrap());

static FENCED_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)(?:```|~~~).*?(?:```|~~~|\z)").unwrap());
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static REF_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\[[^\]]*\]").unwrap());
static HEADING_MARK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]*").unwrap());
static RULE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*_][ \t]*){3,}$").unwrap());
static BOLD_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static BOLD_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([^_]+)__").unwrap());
static ITALIC_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static ITALIC_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b_([^_\n]+)_\b").unwrap());
static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~([^~]+)~~").unwrap());
static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").unwrap());
static BLOCKQUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*>[ \t]?").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[:\-–—|]?\s*").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Code,
    ListItem,
    Heading,
    TableRow,
    Text,
}

fn classify_lines(lines: &[&str]) -> Vec<LineKind> {
    let mut in_fence = false;
    lines
        .iter()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                return LineKind::Code;
            }
            if in_fence {
                return LineKind::Code;
            }
            if trimmed.is_empty() {
                LineKind::Blank
            } else if HEADING_LINE_RE.is_match(line) {
                LineKind::Heading
            } else if LIST_ITEM_RE.is_match(line) {
                LineKind::ListItem
            } else if trimmed.starts_with('|') {
                LineKind::TableRow
            } else {
                LineKind::Text
            }
        })
        .collect()
}

/// Ensure block-level paragraphs are separated by exactly one blank line.
///
/// Consecutive text lines become separate paragraphs, while fenced code,
/// list items, headings and table rows keep their single-newline layout.
/// Runs of blank lines collapse to one. Applying it twice changes nothing.
///
/// ```rust
/// use longreader_core::normalize::separate_paragraphs;
///
/// let text = "First line\nSecond line\n- a\n- b";
/// assert_eq!(separate_paragraphs(text), "First line\n\nSecond line\n- a\n- b");
/// ```
pub fn separate_paragraphs(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = text.split('\n').collect();
    let kinds = classify_lines(&lines);

    let mut output = String::with_capacity(text.len() + text.len() / 8);
    for (i, (line, kind)) in lines.iter().zip(&kinds).enumerate() {
        if i > 0 {
            let prev = kinds[i - 1];
            let single = prev == LineKind::Blank
                || *kind == LineKind::Blank
                || matches!(kind, LineKind::Code | LineKind::ListItem | LineKind::Heading)
                || (prev == LineKind::TableRow && *kind == LineKind::TableRow);
            output.push_str(if single { "\n" } else { "\n\n" });
        }
        if *kind == LineKind::Blank {
            continue;
        }
        output.push_str(line);
    }

    EXCESS_NEWLINES_RE.replace_all(&output, "\n\n").trim_matches('\n').to_string()
}

/// Render markdown as a single line of plain text.
///
/// Fenced code blocks and images disappear entirely, links keep their text,
/// and every other markup marker is dropped. Total over all inputs.
///
/// ```rust
/// use longreader_core::normalize::strip_markdown;
///
/// assert_eq!(strip_markdown(Some("# Hi\n\nSome **bold** [link](https://x.y)")), "Hi Some bold link");
/// assert_eq!(strip_markdown(None), "");
/// ```
pub fn strip_markdown(text: Option<&str>) -> String {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return String::new();
    };

    let text = FENCED_CODE_RE.replace_all(text, "");
    let text = IMAGE_RE.replace_all(&text, "");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = REF_LINK_RE.replace_all(&text, "$1");
    let text = HEADING_MARK_RE.replace_all(&text, "");
    let text = RULE_RE.replace_all(&text, "");
    let text = BOLD_STAR_RE.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORE_RE.replace_all(&text, "$1");
    let text = ITALIC_STAR_RE.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE_RE.replace_all(&text, "$1");
    let text = STRIKE_RE.replace_all(&text, "$1");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");
    let text = BLOCKQUOTE_RE.replace_all(&text, "");
    let text = HTML_TAG_RE.replace_all(&text, "");

    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Canonical form used for title comparisons.
///
/// Lowercase, drop anything that is neither a word character nor
/// whitespace, collapse whitespace, trim.
pub fn normalize_title(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split off a leading level-1 heading matching `title`.
///
/// Returns the text after the heading line, or `None` when the first
/// non-blank line is not such a heading.
fn strip_leading_title_heading<'a>(text: &'a str, title: &str) -> Option<&'a str> {
    let body = text.trim_start();
    let (first_line, rest) = match body.find('\n') {
        Some(idx) => (&body[..idx], &body[idx + 1..]),
        None => (body, ""),
    };

    let caps = H1_RE.captures(first_line.trim_end_matches('\r'))?;
    if normalize_title(&caps[1]) == normalize_title(title) {
        Some(rest.trim_start_matches(['\n', '\r']))
    } else {
        None
    }
}

/// Drop a leading `# heading` that repeats the title, plus the blank line
/// after it.
///
/// Headings further down and headings of other levels are untouched.
///
/// ```rust
/// use longreader_core::normalize::remove_duplicate_title;
///
/// let content = "# test article title\n\nBody.";
/// assert_eq!(remove_duplicate_title(content, "Test Article Title!"), "Body.");
/// ```
pub fn remove_duplicate_title(content: &str, title: &str) -> String {
    if normalize_title(title).is_empty() {
        return content.to_string();
    }
    match strip_leading_title_heading(content, title) {
        Some(rest) => rest.to_string(),
        None => content.to_string(),
    }
}

/// Drop a leading repetition of the title from a description.
///
/// Handles a leading `# heading`, or the title itself (compared in
/// normalized form) when it is followed by whitespace, a separator such as
/// `:` or `-`, or the end of the text. The result may be empty.
///
/// ```rust
/// use longreader_core::normalize::remove_duplicate_title_from_description;
///
/// let description = "Test  Article, Title - The actual summary.";
/// assert_eq!(
///     remove_duplicate_title_from_description(description, "Test Article Title"),
///     "The actual summary."
/// );
/// ```
pub fn remove_duplicate_title_from_description(description: &str, title: &str) -> String {
    let norm_title = normalize_title(title);
    if norm_title.is_empty() {
        return description.to_string();
    }

    if let Some(rest) = strip_leading_title_heading(description, title) {
        return rest.trim().to_string();
    }

    let body = description.trim_start();
    match matching_title_prefix(body, &norm_title) {
        Some(end) => SEPARATOR_RE.replace(&body[end..], "").trim().to_string(),
        None => description.to_string(),
    }
}

/// Byte length of the longest prefix of `text` that normalizes to
/// `norm_title` and is followed by whitespace, a separator or nothing.
fn matching_title_prefix(text: &str, norm_title: &str) -> Option<usize> {
    let budget = norm_title.chars().count() * 2 + 32;
    let mut best = None;

    let ends = text.char_indices().map(|(i, _)| i).skip(1).chain(std::iter::once(text.len()));
    for end in ends.take(budget) {
        let ends_at_boundary = text[end..].chars().next().is_none_or(is_title_boundary);
        if !ends_at_boundary {
            continue;
        }
        if normalize_title(&text[..end]) == norm_title {
            best = Some(end);
        }
    }

    best
}

fn is_title_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | '-' | '–' | '—' | '|')
}
