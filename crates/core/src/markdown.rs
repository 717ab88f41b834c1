use crate::article::Article;

/// Convert an HTML fragment to markdown with `htmd`.
///
/// Conversion failures yield an empty string, which the extractor then
/// rejects as too short.
pub fn html_to_markdown(html: &str) -> String {
    match htmd::convert(html) {
        Ok(markdown) => markdown,
        Err(e) => {
            tracing::warn!("Markdown conversion failed: {}", e);
            String::new()
        }
    }
}

/// Render an article as markdown preceded by TOML frontmatter.
pub fn render_with_frontmatter(article: &Article) -> String {
    let mut output = generate_frontmatter(article);
    output.push('\n');
    output.push_str(&article.content);
    output
}

/// Generate TOML frontmatter from article fields
fn generate_frontmatter(article: &Article) -> String {
    let mut frontmatter = String::from("+++");
    frontmatter.push_str(&format!("\ntitle = {}", toml_escape_string(&article.title)));
    frontmatter.push_str(&format!("\ndescription = {}", toml_escape_string(&article.short_description)));
    frontmatter.push_str(&format!("\nsource_url = {}", toml_escape_string(&article.metadata.source_url)));

    if let Some(author) = &article.metadata.author {
        frontmatter.push_str(&format!("\nauthor = {}", toml_escape_string(author)));
    }

    if let Some(date) = article
        .metadata
        .publish_date
        .and_then(|d| d.format(&time::format_description::well_known::Rfc3339).ok())
    {
        frontmatter.push_str(&format!("\npublish_date = {}", date));
    }

    frontmatter.push_str(&format!("\nreading_time = {}", article.metadata.reading_time));
    frontmatter.push_str("\n+++\n");
    frontmatter
}

/// Escape a string for TOML format
fn toml_escape_string(s: &str) -> String {
    let needs_escape = s.contains('"') || s.contains('\\') || s.contains('\n');
    if needs_escape {
        format!(
            "\"{}\"",
            s.replace('\\', "\\\\").replace('\"', "\\\"").replace('\n', "\\n")
        )
    } else {
        format!("\"{}\"", s)
    }
}
