//! Output formatting helpers shared by log lines and status output.

/// Compact rendering for domain counts.
///
/// Block-sets here run from hundreds to hundreds of thousands of entries,
/// so one decimal of K/M precision reads better in a log line than a full
/// digit string.
///
/// # Examples
/// ```
/// use gatewarden::utils::domain_count;
/// assert_eq!(domain_count(740), "740");
/// assert_eq!(domain_count(75_200), "75.2K");
/// assert_eq!(domain_count(1_500_000), "1.5M");
/// ```
pub fn domain_count(n: usize) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => format!("{:.1}K", n as f64 / 1_000.0),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}

/// Trim an oversized error body down to one log line.
///
/// Cuts on a char boundary so a multi-byte payload cannot panic the
/// error-reporting path itself.
pub fn elide(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len.saturating_sub(3);
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}
