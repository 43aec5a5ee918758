//! URL normalization for watched pages

use url::Url;

/// Normalize user input into the URL the engine watches.
///
/// Input without an `http://` or `https://` scheme is treated as a bare host
/// and gets `http://` prepended. The result is the parsed URL re-serialized,
/// so `Example.com` and `http://example.com/` normalize to the same string.
///
/// # Returns
///
/// The normalized URL, or a description of why the input is not a web URL
pub fn normalize_url(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("URL is empty".to_string());
    }

    let lowered = trimmed.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(format!("unsupported scheme in '{}'", trimmed));
    } else {
        format!("http://{}", trimmed)
    };

    let parsed = Url::parse(&candidate).map_err(|e| format!("'{}': {}", trimmed, e))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed.to_string()),
        _ => Err(format!("'{}' has no host", trimmed)),
    }
}
