//! `Accept` header parsing and the negotiation algorithm.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::errors::DispatchError;

use super::core::{MediaRegistry, ProvidedFormats};

/// Splits a media range from its quality parameter.
static QUALITY_SPLIT: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r";\s*q=").unwrap()
});

/// The universal wildcard media range.
const WILDCARD: &str = "*/*";

/// One parsed `Accept` header segment.
///
/// Quality is an integer 0–100. A bare `*/*` with no explicit `q` parses at
/// quality 0 so an unweighted wildcard ranks below every specific range;
/// every other range defaults to 100. Downstream ordering depends on this
/// asymmetry, so it is preserved deliberately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptEntry {
    /// The media range as sent, e.g. `application/xml`.
    pub media_range: String,
    /// Quality 0–100, higher is preferred.
    pub quality: u16,
    /// Position in the original header, for stable tie-breaking.
    pub index: usize,
}

impl AcceptEntry {
    fn parse_segment(segment: &str, index: usize) -> Option<Self> {
        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }
        let mut parts = QUALITY_SPLIT.splitn(segment, 2);
        let media_range = parts.next()?.trim().to_string();
        if media_range.is_empty() {
            return None;
        }
        let quality = match parts.next() {
            Some(q) => (q.trim().parse::<f32>().ok().unwrap_or(1.0) * 100.0) as u16,
            None if media_range == WILDCARD => 0,
            None => 100,
        };
        Some(AcceptEntry {
            media_range,
            quality: quality.min(100),
            index,
        })
    }

    /// Whether this entry is the universal wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.media_range == WILDCARD
    }
}

/// The representative media type of an entry's synonym group, or the raw
/// range when the registry does not know it.
fn super_range<'a>(entry: &'a AcceptEntry, registry: &'a MediaRegistry) -> &'a str {
    registry
        .canonical_format(&entry.media_range)
        .and_then(|key| registry.content_type_for(key))
        .unwrap_or(&entry.media_range)
}

/// Parse an `Accept` header into entries ordered best-to-worst.
///
/// Ordering is quality descending with the original header order breaking
/// ties (stable). Entries that canonicalize into the same format are
/// deduplicated, keeping the best-ranked one.
///
/// Some browsers send `application/xml` ranked above richer `+xml` subtypes
/// (notably `application/xhtml+xml`); when both appear, the `+xml` entries
/// are reordered ahead of the bare `application/xml` entry.
#[must_use]
pub fn parse_accept(header: &str, registry: &MediaRegistry) -> Vec<AcceptEntry> {
    let mut entries: Vec<AcceptEntry> = header
        .split(',')
        .enumerate()
        .filter_map(|(i, segment)| AcceptEntry::parse_segment(segment, i))
        .collect();

    entries.sort_by(|a, b| b.quality.cmp(&a.quality).then(a.index.cmp(&b.index)));

    let mut seen: HashSet<String> = HashSet::new();
    entries.retain(|entry| {
        let group = registry
            .canonical_format(&entry.media_range)
            .unwrap_or(&entry.media_range)
            .to_string();
        seen.insert(group)
    });

    if let Some(bare_xml) = entries
        .iter()
        .position(|e| super_range(e, registry) == "application/xml")
    {
        let mut promoted = Vec::new();
        let mut i = entries.len();
        while i > bare_xml + 1 {
            i -= 1;
            if entries[i].media_range.contains("+xml") {
                promoted.push(entries.remove(i));
            }
        }
        for entry in promoted {
            entries.insert(bare_xml, entry);
        }
    }

    entries
}

/// Pick the response format for a request.
///
/// 1. An explicit format param wins if provided, otherwise the request is
///    not acceptable regardless of the `Accept` header.
/// 2. Otherwise parse the `Accept` header.
/// 3. A top-ranked universal wildcard selects the first provided format
///    (the controller's declared priority order).
/// 4. Otherwise walk entries best-to-worst and return the first whose
///    canonical format is provided; a wildcard encountered during the walk
///    also selects the first provided format.
/// 5. Nothing matched: not acceptable.
pub fn negotiate(
    accept_header: &str,
    explicit_format: Option<&str>,
    provided: &ProvidedFormats,
    registry: &MediaRegistry,
) -> Result<String, DispatchError> {
    let first_provided = provided
        .first()
        .ok_or_else(|| DispatchError::NotAcceptable("no formats are provided".to_string()))?;

    if let Some(fmt) = explicit_format {
        if provided.contains(fmt) {
            return Ok(fmt.to_string());
        }
        return Err(DispatchError::NotAcceptable(format!(
            "format `{fmt}` is not provided"
        )));
    }

    let entries = parse_accept(accept_header, registry);
    if let Some(top) = entries.first() {
        if top.is_wildcard() {
            return Ok(first_provided.to_string());
        }
    }
    for entry in &entries {
        if entry.is_wildcard() {
            return Ok(first_provided.to_string());
        }
        if let Some(key) = registry.canonical_format(&entry.media_range) {
            if provided.contains(key) {
                return Ok(key.to_string());
            }
        }
    }

    Err(DispatchError::NotAcceptable(format!(
        "no provided format satisfies `{accept_header}`"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MediaRegistry {
        MediaRegistry::with_defaults()
    }

    #[test]
    fn test_bare_wildcard_parses_at_quality_zero() {
        let entries = parse_accept("text/html, */*", &registry());
        assert_eq!(entries[0].media_range, "text/html");
        assert_eq!(entries[0].quality, 100);
        assert_eq!(entries[1].media_range, "*/*");
        assert_eq!(entries[1].quality, 0);
    }

    #[test]
    fn test_weighted_wildcard_keeps_its_quality() {
        let entries = parse_accept("*/*;q=0.9, text/plain;q=0.4", &registry());
        assert_eq!(entries[0].media_range, "*/*");
        assert_eq!(entries[0].quality, 90);
    }

    #[test]
    fn test_quality_orders_entries_with_stable_ties() {
        let entries = parse_accept(
            "text/plain;q=0.5, application/xml;q=0.9, application/json;q=0.9",
            &registry(),
        );
        let ranges: Vec<&str> = entries.iter().map(|e| e.media_range.as_str()).collect();
        assert_eq!(
            ranges,
            vec!["application/xml", "application/json", "text/plain"]
        );
    }

    #[test]
    fn test_synonym_duplicates_collapse() {
        let entries = parse_accept("application/xml, text/xml", &registry());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].media_range, "application/xml");
    }

    #[test]
    fn test_plus_xml_preferred_over_bare_xml() {
        // Broken browser header: bare XML ranked above xhtml+xml.
        let entries = parse_accept(
            "application/xml;q=0.9, application/xhtml+xml;q=0.8",
            &registry(),
        );
        assert_eq!(entries[0].media_range, "application/xhtml+xml");
        assert_eq!(entries[1].media_range, "application/xml");
    }
}
