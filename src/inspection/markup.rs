//! Minimal, tolerant HTML helpers for inspection portal pages.
//!
//! Portal markup is loose and frequently malformed, so everything here works
//! on regex matches over the raw text and never fails: unmatched structure
//! simply produces fewer rows, cells or links.

use once_cell::sync::Lazy;
use regex::Regex;

static ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("row pattern"));
static CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td\s*>").expect("cell pattern"));
static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#).expect("link pattern")
});
static SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("script pattern")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));
static SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("space pattern"));
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|nbsp|lt|gt|quot|apos|amp);").expect("entity pattern")
});

/// An anchor found in a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    /// Visible text of the anchor, tags stripped
    pub text: String,
}

/// Visible text of an HTML fragment with whitespace collapsed.
pub fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_scripts, " ");
    let decoded = decode_entities(&without_tags);
    SPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Single pass, so decoded text is never decoded again ("&amp;#39;" stays "&#39;").
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| decode_entity(&caps[0], &caps[1]))
        .into_owned()
}

/// Invalid code points are left as written.
fn decode_entity(entity: &str, name: &str) -> String {
    let code = match name {
        "nbsp" => return " ".to_string(),
        "lt" => return "<".to_string(),
        "gt" => return ">".to_string(),
        "quot" => return "\"".to_string(),
        "apos" => return "'".to_string(),
        "amp" => return "&".to_string(),
        _ => &name[1..],
    };
    let value = match code.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => code.parse::<u32>().ok(),
    };
    match value.and_then(char::from_u32) {
        Some('\0') | None => entity.to_string(),
        Some(c) => c.to_string(),
    }
}

/// Inner markup of every table row, in document order. Script and style
/// blocks are skipped.
pub fn table_rows(html: &str) -> Vec<String> {
    let html = SCRIPT.replace_all(html, " ");
    ROW.captures_iter(&html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Text of each data cell in a row
pub fn row_cells(row: &str) -> Vec<String> {
    CELL.captures_iter(row)
        .filter_map(|c| c.get(1))
        .map(|m| strip_tags(m.as_str()))
        .collect()
}

pub fn links(html: &str) -> Vec<Link> {
    LINK.captures_iter(html)
        .filter_map(|c| {
            let href = c.get(1)?.as_str().trim();
            let text = c.get(2).map(|m| strip_tags(m.as_str())).unwrap_or_default();
            Some(Link {
                href: decode_entities(href),
                text,
            })
        })
        .collect()
}

/// Links whose href matches `pattern`
pub fn links_matching(html: &str, pattern: &Regex) -> Vec<Link> {
    links(html)
        .into_iter()
        .filter(|link| pattern.is_match(&link.href))
        .collect()
}

/// Resolve `href` against a portal base URL.
///
/// Absolute URLs pass through; root-relative paths keep only the base's
/// scheme and host; anything else is appended to the base.
pub fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    if href.starts_with('/') {
        if let Some(origin) = origin_of(base_url) {
            return format!("{}{}", origin, href);
        }
    }

    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")? + 3;
    let host_end = url[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i)
        .unwrap_or(url.len());
    Some(&url[..host_end])
}
