use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::WebhookUrl;

/// One way a webhook URL shows up in text.
pub struct Matcher {
    pub name: &'static str,
    regex: Regex,
    /// Capture group holding the candidate URL (0 = whole match).
    group: usize,
}

impl Matcher {
    fn new(name: &'static str, pattern: &str, group: usize) -> Option<Self> {
        match Regex::new(pattern) {
            Ok(regex) => Some(Self { name, regex, group }),
            Err(e) => {
                tracing::warn!("Invalid webhook matcher {}: {}", name, e);
                None
            }
        }
    }

    fn candidates<'c>(&'c self, content: &'c str) -> impl Iterator<Item = (usize, &'c str)> + 'c {
        self.regex
            .captures_iter(content)
            .filter_map(move |caps| caps.get(self.group))
            .map(|m| (m.start(), m.as_str()))
    }
}

/// Matchers evaluated independently against the same content.
pub static MATCHERS: Lazy<Vec<Matcher>> = Lazy::new(|| {
    [
        (
            "url",
            r"(?i)https?://(?:(?:ptb|canary)\.)?discord(?:app)?\.com/api/webhooks/\d+/[\w-]+",
            0,
        ),
        (
            "quoted_key",
            r#"(?i)["']webhook[_\s-]*(?:url)?["']\]?\s*[:=]\s*["']([^"']+)["']"#,
            1,
        ),
        ("webhook_key", r#"(?i)\bwebhook\s*[:=]\s*["']([^"']+)["']"#, 1),
        ("webhook_url_key", r#"(?i)\bwebhook_?url\s*[:=]\s*["']([^"']+)["']"#, 1),
        ("suffix_key", r#"(?i)webhook["']?\s*[:=]\s*["']([^"']+)["']"#, 1),
        (
            "url_key",
            r#"(?i)["']url["']\s*[:=]\s*["'](https?://(?:\w+\.)?discord[^"']+)["']"#,
            1,
        ),
    ]
    .into_iter()
    .filter_map(|(name, pattern, group)| Matcher::new(name, pattern, group))
    .collect()
});

/// A validated URL and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    pub offset: usize,
    pub url: WebhookUrl,
}

#[derive(Debug, Default)]
pub struct ExtractionResult {
    /// Ordered by offset, at most one per offset.
    pub matches: Vec<UrlMatch>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Distinct URLs in first-seen order.
    pub fn distinct_urls(&self) -> Vec<&WebhookUrl> {
        let mut seen = Vec::new();
        for m in &self.matches {
            if !seen.contains(&&m.url) {
                seen.push(&m.url);
            }
        }
        seen
    }
}

pub struct WebhookExtractor {
    matchers: &'static [Matcher],
}

impl WebhookExtractor {
    pub fn new() -> Self {
        Self {
            matchers: MATCHERS.as_slice(),
        }
    }

    /// Run every matcher, validate each candidate and keep one URL per position.
    pub fn extract(&self, content: &str) -> ExtractionResult {
        let mut by_offset: BTreeMap<usize, WebhookUrl> = BTreeMap::new();

        for matcher in self.matchers {
            for (offset, candidate) in matcher.candidates(content) {
                if by_offset.contains_key(&offset) {
                    continue;
                }
                if let Some(url) = WebhookUrl::parse(candidate) {
                    by_offset.insert(offset, url);
                }
            }
        }

        ExtractionResult {
            matches: by_offset
                .into_iter()
                .map(|(offset, url)| UrlMatch { offset, url })
                .collect(),
        }
    }

    /// Decode bytes permissively and extract.
    pub fn extract_bytes(&self, bytes: &[u8]) -> ExtractionResult {
        self.extract(&String::from_utf8_lossy(bytes))
    }
}

impl Default for WebhookExtractor {
    fn default() -> Self {
        Self::new()
    }
}
