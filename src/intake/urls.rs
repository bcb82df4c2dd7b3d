//! URL detection and normalization for message intake.

use std::sync::LazyLock;

static URL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"https?://[^\s<>"')\]]+|www\.[^\s<>"')\]]+"#).expect("url regex is valid")
});

/// Find URLs in free-form message text.
///
/// Matches are normalized (trailing sentence punctuation stripped, bare
/// `www.` hosts given an `https://` scheme), deduplicated preserving
/// first-seen order, and capped at `max_urls`.
pub fn extract_urls(text: &str, max_urls: usize) -> Vec<String> {
    let mut urls = Vec::new();
    for m in URL_RE.find_iter(text) {
        let cleaned = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
        if cleaned.is_empty() {
            continue;
        }
        let normalized = if cleaned.starts_with("www.") {
            format!("https://{}", cleaned)
        } else {
            cleaned.to_string()
        };
        if !urls.contains(&normalized) {
            urls.push(normalized);
        }
        if urls.len() >= max_urls {
            break;
        }
    }
    urls
}
