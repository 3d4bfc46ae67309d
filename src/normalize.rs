//! Feed text parsing and domain validation.
//!
//! Accepts hosts-format (`0.0.0.0 example.com`) and bare-domain records,
//! applies the conservative FQDN grammar, and rejects banned TLDs,
//! keywords, IP literals and Punycode per the configured policy.

use std::collections::{HashMap, HashSet};

use crate::config::FilterConfig;

/// First tokens that mark a hosts-format record.
const HOSTS_SINKS: &[&str] = &["0.0.0.0", "127.0.0.1", "::1", "255.255.255.255"];

/// Maximum FQDN length per RFC 1035.
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum label length per RFC 1035.
const MAX_LABEL_LEN: usize = 63;

/// Rejection counters for one parsed feed source.
///
/// Rejections are expected and never logged individually; the counters are
/// the observability deliverable handed to the persisted run state.
#[derive(Debug, Clone, Default)]
pub struct RejectStats {
    /// Non-blank, non-comment lines seen
    pub raw_lines: usize,
    /// Domains surviving all checks
    pub accepted: usize,
    /// Failed the FQDN grammar (includes IP literals and wildcards)
    pub invalid: usize,
    /// Rejected as Punycode (policy, not syntax)
    pub punycode: usize,
    /// Rejections keyed by banned TLD
    pub by_tld: HashMap<String, usize>,
    /// Rejections keyed by banned keyword
    pub by_keyword: HashMap<String, usize>,
}

impl RejectStats {
    /// Fold another source's counters into this one.
    pub fn merge(&mut self, other: &RejectStats) {
        self.raw_lines += other.raw_lines;
        self.accepted += other.accepted;
        self.invalid += other.invalid;
        self.punycode += other.punycode;
        for (tld, n) in &other.by_tld {
            *self.by_tld.entry(tld.clone()).or_default() += n;
        }
        for (kw, n) in &other.by_keyword {
            *self.by_keyword.entry(kw.clone()).or_default() += n;
        }
    }

    pub fn total_rejected(&self) -> usize {
        self.invalid
            + self.punycode
            + self.by_tld.values().sum::<usize>()
            + self.by_keyword.values().sum::<usize>()
    }
}

/// Parse one feed body into its candidate set.
///
/// Exact duplicates within the feed collapse for free via the set.
pub fn parse_feed(text: &str, filter: &FilterConfig) -> (HashSet<String>, RejectStats) {
    let mut domains = HashSet::new();
    let mut stats = RejectStats::default();

    for line in text.lines() {
        let Some(token) = extract_token(line) else {
            continue;
        };
        stats.raw_lines += 1;

        let domain = token.to_ascii_lowercase();

        if !is_valid_syntax(&domain) {
            stats.invalid += 1;
            continue;
        }

        // Punycode is a policy rejection, kept separate from syntax.
        if domain.split('.').any(|l| l.starts_with("xn--")) {
            stats.punycode += 1;
            continue;
        }

        let tld = domain.rsplit('.').next().unwrap_or_default();
        if let Some(banned) = filter.banned_tlds.iter().find(|t| t.as_str() == tld) {
            *stats.by_tld.entry(banned.clone()).or_default() += 1;
            continue;
        }

        // Linear substring scan; the keyword set is small and fixed.
        if let Some(kw) = filter
            .banned_keywords
            .iter()
            .find(|kw| domain.contains(kw.as_str()))
        {
            *stats.by_keyword.entry(kw.clone()).or_default() += 1;
            continue;
        }

        if domains.insert(domain) {
            stats.accepted += 1;
        }
    }

    (domains, stats)
}

/// Extract the domain token from one raw line, or None for blank and
/// comment lines.
///
/// Hosts-format lines (first token is a known sink address) yield the last
/// token; everything else yields the first token.
fn extract_token(line: &str) -> Option<&str> {
    // Strip inline comments before tokenizing.
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() || line.starts_with('!') || line.starts_with("//") {
        return None;
    }

    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;

    if HOSTS_SINKS.contains(&first) {
        tokens.last()
    } else {
        Some(first)
    }
}

/// Conservative FQDN grammar check.
///
/// Labels of `[a-z0-9-]` with no edge hyphens, at least one dot, RFC 1035
/// length limits, and not an IPv4 literal. Wildcards, IPv6 and whitespace
/// all fail the character class.
pub fn is_valid_syntax(domain: &str) -> bool {
    if domain.len() > MAX_DOMAIN_LEN || !domain.contains('.') {
        return false;
    }

    // All-numeric dotted strings are IPv4 literals, not domains.
    if domain.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return false;
    }

    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    })
}
