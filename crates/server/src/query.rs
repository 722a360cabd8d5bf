//! Saved search queries: validation, normalization and topic labels.
//!
//! A query is free text mixed with `Key: "value"` filters, e.g.
//! `carbon tax MP: "pierre-poilievre" Type: "debate"`. Subscriptions are keyed
//! on the normalized form so that whitespace variants collapse to one row.

use thiserror::Error;

pub const MAX_QUERY_LENGTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuery {
    #[error("Query is empty")]
    Empty,
    #[error("Query has an unterminated quoted phrase")]
    UnbalancedQuotes,
    #[error("Query is longer than {MAX_QUERY_LENGTH} characters")]
    TooLong,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub text: String,
    pub filters: Vec<(String, String)>,
}

/// The query that follows every debate statement by one politician.
pub fn politician_query(identifier: &str) -> String {
    format!("MP: \"{identifier}\" Type: \"debate\"")
}

pub fn normalize(query: &str) -> Result<String, InvalidQuery> {
    let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(InvalidQuery::Empty);
    }
    if normalized.chars().count() > MAX_QUERY_LENGTH {
        return Err(InvalidQuery::TooLong);
    }
    if normalized.matches('"').count() % 2 != 0 {
        return Err(InvalidQuery::UnbalancedQuotes);
    }
    Ok(normalized)
}

/// Reads one token starting at `start`: a quoted phrase (quotes kept) or a
/// run of non-whitespace characters. Returns the token and the next offset.
fn next_token(query: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &query[start..];
    let skipped = rest.len() - rest.trim_start().len();
    let begin = start + skipped;
    if begin >= query.len() {
        return None;
    }
    let tail = &query[begin..];
    let len = if let Some(after_quote) = tail.strip_prefix('"') {
        match after_quote.find('"') {
            Some(close) => close + 2,
            None => tail.len(),
        }
    } else {
        tail.find(char::is_whitespace).unwrap_or(tail.len())
    };
    Some((&query[begin..begin + len], begin + len))
}

fn is_filter_key(token: &str) -> Option<&str> {
    let key = token.strip_suffix(':')?;
    (!key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_')).then_some(key)
}

pub fn parse(query: &str) -> Result<ParsedQuery, InvalidQuery> {
    let normalized = normalize(query)?;
    let mut parsed = ParsedQuery::default();
    let mut terms: Vec<&str> = Vec::new();
    let mut pos = 0;

    while let Some((token, next)) = next_token(&normalized, pos) {
        pos = next;
        if let Some(key) = is_filter_key(token) {
            if let Some((value, after)) = next_token(&normalized, pos) {
                pos = after;
                parsed
                    .filters
                    .push((key.to_string(), value.trim_matches('"').to_string()));
                continue;
            }
        }
        terms.push(token);
    }

    parsed.text = terms.join(" ");
    Ok(parsed)
}

/// Human-readable label stored alongside a subscription.
pub fn topic_label(query: &str) -> Result<String, InvalidQuery> {
    let parsed = parse(query)?;
    let filters = parsed
        .filters
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(match (parsed.text.is_empty(), filters.is_empty()) {
        (false, true) => parsed.text,
        (false, false) => format!("{} ({})", parsed.text, filters),
        _ => filters,
    })
}
