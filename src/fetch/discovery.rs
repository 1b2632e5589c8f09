//! Alternate-representation discovery from `Link` headers and HTML pages.

use scraper::{Html, Selector};
use url::Url;

/// Alternate link types that point at an activity document, in preference order.
pub const ALTERNATE_TYPES: &[&str] = &[
    "application/activity+json",
    "application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"",
];

/// One entry of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkValue {
    /// Target reference.
    pub href: String,
    /// Parameters, names lowercased, values unquoted.
    pub params: Vec<(String, String)>,
}

impl LinkValue {
    /// First value of parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `rel` lists `relation`.
    #[must_use]
    pub fn has_rel(&self, relation: &str) -> bool {
        self.param("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case(relation)))
    }
}

/// Split `input` on `separator` wherever it is outside `<...>` and `"..."`.
fn split_outside(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_angle = false;
    let mut in_quote = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' if !in_angle => in_quote = !in_quote,
            '<' if !in_quote => in_angle = true,
            '>' if !in_quote => in_angle = false,
            c if c == separator && !in_angle && !in_quote => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Parse a `Link` header. Malformed entries are skipped.
#[must_use]
pub fn parse_link_header(header: &str) -> Vec<LinkValue> {
    split_outside(header, ',')
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.trim();
            let rest = entry.strip_prefix('<')?;
            let end = rest.find('>')?;
            let href = rest[..end].trim().to_string();
            let params = split_outside(&rest[end + 1..], ';')
                .into_iter()
                .filter_map(|param| {
                    let (name, value) = param.split_once('=')?;
                    let value = value.trim();
                    let value = value
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .map_or_else(|| value.to_string(), |v| v.replace("\\\"", "\""));
                    Some((name.trim().to_ascii_lowercase(), value))
                })
                .collect();
            Some(LinkValue { href, params })
        })
        .collect()
}

/// Whether the header advertises any `rel=alternate` link.
#[must_use]
pub fn has_alternate(links: &[LinkValue]) -> bool {
    links.iter().any(|link| link.has_rel("alternate"))
}

/// Pick the activity-document alternate from parsed `Link` header entries.
#[must_use]
pub fn alternate_from_links(links: &[LinkValue], base: &str) -> Option<String> {
    ALTERNATE_TYPES.iter().find_map(|wanted| {
        links
            .iter()
            .find(|link| link.has_rel("alternate") && link.param("type") == Some(*wanted))
            .and_then(|link| resolve_href(base, &link.href))
    })
}

/// Find `<link rel="alternate">` pointing at an activity document in an HTML page.
#[must_use]
pub fn alternate_from_html(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("link[rel~=\"alternate\"]").ok()?;
    document
        .select(&selector)
        .find(|link| {
            link.value()
                .attr("type")
                .is_some_and(|t| ALTERNATE_TYPES.contains(&t.trim()))
        })
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| resolve_href(base, href))
}

/// Resolve a possibly relative reference against `base`.
fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(base) {
        Ok(base) => base.join(href).ok().map(String::from),
        Err(_) => Url::parse(href).ok().map(String::from),
    }
}
