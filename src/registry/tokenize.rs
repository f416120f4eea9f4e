//! Free-text list splitting.
//!
//! Registry and request fields hold lists typed by hand with whatever
//! separator the author liked. These helpers turn them into clean,
//! order-preserving, case-insensitively deduplicated lists.

/// Split `raw` on any of `delimiters`, trim each part, drop blanks and
/// drop case-insensitive duplicates (first spelling wins).
pub fn split_dedup(raw: &str, delimiters: &[char]) -> Vec<String> {
    dedup_ci(
        raw.split(|c: char| delimiters.contains(&c))
            .map(str::trim)
            .filter(|part| !part.is_empty()),
    )
}

/// Trim, drop blanks and case-insensitive duplicates, keeping order
pub fn dedup_ci<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();

    for value in values {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        let key = value.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(value.to_string());
    }

    out
}
