//! Query derivation
//!
//! Neural and keyword engines want differently phrased queries. This module builds:
//! - the locale-hinted query sent to semantic providers on the fallback path
//! - the conceptual variant for the coordinator's semantic channel
//! - the literal variant for the coordinator's keyword channel

use crate::config::LocaleSettings;
use chrono::Datelike;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const SEMANTIC_DOMAIN_TERMS: &str = "insights analysis";
const SEMANTIC_TERMS: &str = "trends opportunities strategy";
const KEYWORD_DOMAIN_TERMS: &str = "data statistics";
const KEYWORD_TERMS: &str = "market growth";

fn year_pattern() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year pattern is valid"))
}

/// The current calendar year (UTC)
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// Whether the query already names a year
pub fn mentions_year(query: &str) -> bool {
    year_pattern().is_match(query)
}

/// Whether the query already names the configured country
pub fn mentions_country(query: &str, locale: &LocaleSettings) -> bool {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let country = locale.country.to_lowercase();
    std::iter::once(country.as_str())
        .chain(locale.country_aliases.iter().map(|a| a.as_str()))
        .filter(|alias| !alias.is_empty())
        .any(|alias| words.contains(&alias))
}

/// Append the country name and `year` unless the query already carries them.
///
/// Neural engines drift toward globally generic pages without these hints.
pub fn enhance_for_locale(query: &str, locale: &LocaleSettings, year: i32) -> String {
    let mut enhanced = query.trim().to_string();

    if !locale.country.is_empty() && !mentions_country(&enhanced, locale) {
        enhanced.push(' ');
        enhanced.push_str(&locale.country);
    }

    if !mentions_year(&enhanced) {
        enhanced.push(' ');
        enhanced.push_str(&year.to_string());
    }

    enhanced.trim().to_string()
}

/// Read the market domain / segment from a context map
pub fn domain_from_context(context: &Map<String, Value>, key: &str) -> Option<String> {
    match context.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Conceptual phrasing for the semantic channel
pub fn semantic_query(base: &str, domain: Option<&str>) -> String {
    let mut parts = vec![base.trim().to_string()];
    if let Some(domain) = domain {
        parts.push(format!("{} {}", domain, SEMANTIC_DOMAIN_TERMS));
    }
    parts.push(SEMANTIC_TERMS.to_string());
    parts.join(" ").trim().to_string()
}

/// Literal phrasing for the keyword channel
pub fn keyword_query(base: &str, domain: Option<&str>, locale: &LocaleSettings, year: i32) -> String {
    let mut parts = vec![base.trim().to_string()];
    if let Some(domain) = domain {
        parts.push(format!("{} {}", domain, KEYWORD_DOMAIN_TERMS));
    }
    if !locale.country.is_empty() {
        parts.push(locale.country.clone());
    }
    parts.push(year.to_string());
    parts.push(KEYWORD_TERMS.to_string());
    parts.join(" ").trim().to_string()
}
