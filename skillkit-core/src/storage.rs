//! Confluence storage format (XHTML) to and from Markdown.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::convert::Toolchain;

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("static pattern"),
        replacement,
    }
}

/// Minimal Markdown to HTML rewriting used when pandoc is unavailable.
/// Order matters: bold must be rewritten before italics.
static FALLBACK_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(r"(?m)^### (.+)$", "<h3>$1</h3>"),
        rule(r"(?m)^## (.+)$", "<h2>$1</h2>"),
        rule(r"(?m)^# (.+)$", "<h1>$1</h1>"),
        rule(r"\*\*(.+?)\*\*", "<strong>$1</strong>"),
        rule(r"\*(.+?)\*", "<em>$1</em>"),
        rule(r"`(.+?)`", "<code>$1</code>"),
        rule(r"\[(.+?)\]\((.+?)\)", r#"<a href="$2">$1</a>"#),
    ]
});

static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("static pattern"));

/// Regex-only Markdown conversion: headings h1-h3, bold, italic, inline code and links.
pub fn basic_markdown_to_html(markdown: &str) -> String {
    FALLBACK_RULES
        .iter()
        .fold(markdown.to_string(), |text, rule| {
            rule.pattern.replace_all(&text, rule.replacement).into_owned()
        })
}

/// Converts Markdown to a storage-format body, preferring pandoc.
pub async fn markdown_to_storage(tools: &Toolchain, markdown: &str) -> String {
    match tools.markdown_to_html(markdown).await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "pandoc unavailable, using basic Markdown conversion");
            basic_markdown_to_html(markdown)
        }
    }
}

pub fn storage_to_markdown(storage: &str) -> String {
    html2md::parse_html(storage).trim().to_string()
}

/// Puts adjacent tags separated only by whitespace on their own lines.
pub fn spread_tags(html: &str) -> String {
    BETWEEN_TAGS.replace_all(html, ">\n<").into_owned()
}
