use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339};

use crate::Document;

/// Metadata read from the raw page before any cleaning.
///
/// Every field is optional; the assembler decides fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

impl Document {
    /// Title declared for link previews: `og:title`, then `twitter:title`.
    pub fn social_preview_title(&self) -> Option<String> {
        self.meta_content("og:title")
            .or_else(|| self.meta_content("twitter:title"))
    }

    /// Infer the title with priority fallback:
    /// 1. JSON-LD `headline`
    /// 2. Meta `title` / `DC.title`
    /// 3. `<title>` element
    /// 4. First `<h1>` element
    pub fn extract_title(&self) -> Option<String> {
        if let Some(headline) = self.json_ld_string("headline") {
            return Some(headline);
        }

        if let Some(title) = self.meta_content("title") {
            return Some(title);
        }
        if let Some(title) = self.meta_content("DC.title") {
            return Some(title);
        }

        if let Some(title) = self.title() {
            return Some(title);
        }

        first_text(self, "h1")
    }

    /// Extract author with priority fallback:
    /// 1. JSON-LD `author.name`
    /// 2. Meta `author` / `DC.creator`
    /// 3. `[rel="author"]` link text
    /// 4. `[itemprop="author"]` content
    /// 5. Class/ID containing "author", "byline"
    pub fn extract_author(&self) -> Option<String> {
        if let Some(name) = self.json_ld_objects().iter().find_map(|obj| obj.get("author").and_then(author_name)) {
            return Some(name);
        }

        if let Some(author) = self.meta_content("author") {
            return Some(author);
        }
        if let Some(author) = self.meta_content("DC.creator") {
            return Some(author);
        }

        if let Some(author) = first_text(self, "[rel=\"author\"]") {
            return Some(author);
        }
        if let Some(author) = first_text(self, "[itemprop=\"author\"]") {
            return Some(author);
        }

        let patterns = ["author", "byline", "by-author", "writer"];
        for pattern in &patterns {
            for selector in [format!("[class*=\"{}\"]", pattern), format!("[id*=\"{}\"]", pattern)] {
                if let Ok(elements) = self.select(&selector) {
                    for el in elements.iter().take(3) {
                        let text = el.text();
                        let text = text.trim();
                        if !text.is_empty() && text.len() < 100 {
                            return Some(collapse_whitespace(text));
                        }
                    }
                }
            }
        }

        None
    }

    /// Extract the page-declared description:
    /// 1. JSON-LD `description`
    /// 2. Open Graph `og:description`
    /// 3. Meta `description`
    /// 4. Twitter `twitter:description`
    pub fn extract_description(&self) -> Option<String> {
        self.json_ld_string("description")
            .or_else(|| self.meta_content("og:description"))
            .or_else(|| self.meta_content("description"))
            .or_else(|| self.meta_content("twitter:description"))
    }

    /// Extract date with priority fallback:
    /// 1. JSON-LD `datePublished`
    /// 2. Meta `article:published_time`
    /// 3. `<time datetime="">` element
    /// 4. Meta `date` / `DC.date`
    ///
    /// Timestamps carrying an offset are reduced to their `YYYY-MM-DD` date.
    pub fn extract_date(&self) -> Option<String> {
        let raw = self
            .json_ld_string("datePublished")
            .or_else(|| self.meta_content("article:published_time"))
            .or_else(|| {
                self.select_first("time[datetime]")
                    .ok()
                    .flatten()
                    .and_then(|el| el.attr("datetime"))
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
            })
            .or_else(|| self.meta_content("date"))
            .or_else(|| self.meta_content("DC.date"))?;

        Some(normalize_date(&raw))
    }

    /// Extract all metadata at once.
    pub fn extract_metadata(&self) -> RawMetadata {
        RawMetadata {
            title: self.extract_title(),
            author: self.extract_author(),
            description: self.extract_description(),
            date: self.extract_date(),
        }
    }

    /// Parse every JSON-LD block, flattening top-level arrays and `@graph`.
    fn json_ld_objects(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        let mut objects = Vec::new();
        let Ok(elements) = self.select("script[type=\"application/ld+json\"]") else {
            return objects;
        };

        for el in elements.iter() {
            let text = el.text();
            let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) else {
                continue;
            };
            let items = match value {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            };
            for item in items {
                if let serde_json::Value::Object(mut obj) = item {
                    if let Some(serde_json::Value::Array(graph)) = obj.remove("@graph") {
                        objects.extend(graph.into_iter().filter_map(|g| match g {
                            serde_json::Value::Object(o) => Some(o),
                            _ => None,
                        }));
                    }
                    objects.push(obj);
                }
            }
        }

        objects
    }

    fn json_ld_string(&self, key: &str) -> Option<String> {
        self.json_ld_objects().iter().find_map(|obj| {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }
}

/// Extract author name from JSON-LD author field.
/// Handles string, object and array formats.
fn author_name(author: &serde_json::Value) -> Option<String> {
    if let Some(name) = author.as_str() {
        return Some(name.trim().to_string()).filter(|n| !n.is_empty());
    }

    if let Some(obj) = author.as_object()
        && let Some(name) = obj.get("name")
        && let Some(name_str) = name.as_str()
    {
        return Some(name_str.trim().to_string()).filter(|n| !n.is_empty());
    }

    if let Some(arr) = author.as_array()
        && let Some(first) = arr.first()
    {
        return author_name(first);
    }

    None
}

fn first_text(doc: &Document, selector: &str) -> Option<String> {
    let el = doc.select_first(selector).ok()??;
    let text = collapse_whitespace(&el.text());
    if text.is_empty() { None } else { Some(text) }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(dt) => dt.date().to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Parse a raw date string into a UTC timestamp.
///
/// Accepted shapes, tried in order: `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS`. The whole string must match. Anything else,
/// including timestamps with an offset, yields `None`.
///
/// ```rust
/// use longreader_core::parse_publish_date;
///
/// let dt = parse_publish_date("2024-01-15").unwrap();
/// assert_eq!(dt.date().to_string(), "2024-01-15");
/// assert!(parse_publish_date("January 15, 2024").is_none());
/// ```
pub fn parse_publish_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();

    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        return Some(date.midnight().assume_utc());
    }

    if let Ok(dt) = PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]")) {
        return Some(dt.assume_utc());
    }

    if let Ok(dt) = PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")) {
        return Some(dt.assume_utc());
    }

    None
}
