//! Visible text extraction for fetched pages

use std::collections::HashSet;

use scraper::{Html, Node, Selector};
use tracing::warn;

use crate::fetch::error::FetchError;

/// Extract the visible text of an HTML document
///
/// # Arguments
///
/// * `html` - The HTML to extract from
/// * `exclude_selectors` - CSS selectors for elements whose text is dropped
///
/// # Returns
///
/// The text of `<body>`, whitespace collapsed to single spaces, lower-cased
pub fn visible_text(html: &str, exclude_selectors: &[String]) -> Result<String, FetchError> {
    let document = Html::parse_document(html);

    let body_selector = Selector::parse("body")
        .map_err(|e| FetchError::Extraction(format!("Failed to parse body selector: {}", e)))?;
    let Some(body) = document.select(&body_selector).next() else {
        return Ok(String::new());
    };

    let mut excluded = HashSet::new();
    for selector_str in exclude_selectors {
        match Selector::parse(selector_str) {
            Ok(selector) => excluded.extend(document.select(&selector).map(|el| el.id())),
            Err(e) => warn!("Failed to parse selector '{}': {}", selector_str, e),
        }
    }

    let mut words = Vec::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        if node.ancestors().any(|ancestor| excluded.contains(&ancestor.id())) {
            continue;
        }
        words.extend(text.split_whitespace());
    }

    Ok(words.join(" ").to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        crate::fetch::FetcherConfig::default().exclude_selectors
    }

    #[test]
    fn test_extracts_body_text_lowercased() {
        let html = r#"<html><head><title>Ignored Title</title></head>
            <body><h1>Big   News</h1><p>Alpha <b>Beta</b></p></body></html>"#;
        let text = visible_text(html, &defaults()).unwrap();
        assert_eq!(text, "big news alpha beta");
    }

    #[test]
    fn test_skips_scripts_and_excluded_elements() {
        let html = r#"<body><script>var alpha = 1;</script><nav>menu alpha</nav>
            <main>content</main><style>p { color: red }</style></body>"#;
        let mut exclude = defaults();
        exclude.push("nav".to_string());
        assert_eq!(visible_text(html, &exclude).unwrap(), "content");
    }

    #[test]
    fn test_invalid_selector_is_ignored() {
        let html = "<body><p>Still Here</p></body>";
        let exclude = vec!["[[invalid".to_string()];
        assert_eq!(visible_text(html, &exclude).unwrap(), "still here");
    }
}
