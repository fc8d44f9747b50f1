//! Channel and endpoint names the platform will accept.

/// Discord's channel name limit.
pub const MAX_CHANNEL_NAME: usize = 100;
/// Discord's webhook name limit.
pub const MAX_ENDPOINT_NAME: usize = 80;

const FALLBACK_CHANNEL: &str = "resource-logs";
const FALLBACK_ENDPOINT: &str = "webhook";

/// Words the platform refuses in names, with their replacements.
const RESERVED: &[(&str, &str)] = &[("discord", "disc"), ("clyde", "assistant")];

/// Channel name for a resource: slug of `"{resource}-logs"`.
pub fn channel_name(resource: &str) -> String {
    slugify(&format!("{}-logs", resource))
}

/// Lowercase, hyphenate, strip, de-reserve and truncate.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.to_lowercase().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_hyphen = true;
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        }
    }

    let mut slug = replace_reserved(&slug);
    slug.truncate(MAX_CHANNEL_NAME);
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        FALLBACK_CHANNEL.to_string()
    } else {
        slug.to_string()
    }
}

/// Endpoint name: the resource alone when it owns a single URL, otherwise
/// the resource with a 1-based index.
pub fn endpoint_name(resource: &str, index: usize, total: usize) -> String {
    let raw = if total == 1 {
        resource.to_string()
    } else {
        format!("{}-{}", resource, index)
    };

    let cleaned = replace_reserved_ignore_case(raw.trim());
    let truncated: String = cleaned.chars().take(MAX_ENDPOINT_NAME).collect();
    let truncated = truncated.trim();

    if truncated.is_empty() {
        FALLBACK_ENDPOINT.to_string()
    } else {
        truncated.to_string()
    }
}

fn replace_reserved(lowercase: &str) -> String {
    RESERVED
        .iter()
        .fold(lowercase.to_string(), |acc, (word, replacement)| acc.replace(word, replacement))
}

fn replace_reserved_ignore_case(input: &str) -> String {
    let mut out = input.to_string();
    for (word, replacement) in RESERVED {
        let mut result = String::with_capacity(out.len());
        let mut rest = out.as_str();
        while let Some(pos) = find_ignore_ascii_case(rest, word) {
            result.push_str(&rest[..pos]);
            result.push_str(replacement);
            rest = &rest[pos + word.len()..];
        }
        result.push_str(rest);
        out = result;
    }
    out
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_basic() {
        assert_eq!(channel_name("shop"), "shop-logs");
        assert_eq!(channel_name("qb-bank"), "qb-bank-logs");
    }

    #[test]
    fn test_channel_name_normalizes() {
        assert_eq!(channel_name("My Cool_Resource"), "my-cool-resource-logs");
        assert_eq!(channel_name("  weird!!name  "), "weirdname-logs");
        assert_eq!(channel_name("a__--  b"), "a-b-logs");
        assert_eq!(channel_name("-lead"), "lead-logs");
    }

    #[test]
    fn test_channel_name_reserved_words() {
        assert_eq!(channel_name("discord-bot"), "disc-bot-logs");
        assert_eq!(channel_name("Clyde"), "assistant-logs");
        assert_eq!(channel_name("mydiscordlogger"), "mydisclogger-logs");
    }

    #[test]
    fn test_channel_name_truncates() {
        let long = "x".repeat(150);
        let name = channel_name(&long);
        assert_eq!(name.len(), MAX_CHANNEL_NAME);
        assert!(name.chars().all(|c| c == 'x'));
    }

    #[test]
    fn test_truncation_does_not_leave_trailing_hyphen() {
        let resource = format!("{}_tail", "y".repeat(99));
        let name = channel_name(&resource);
        assert!(!name.ends_with('-'));
        assert_eq!(name.len(), 99);
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify("!!!"), "resource-logs");
        assert_eq!(slugify("ÄÖÜ"), "resource-logs");
    }

    #[test]
    fn test_endpoint_name() {
        assert_eq!(endpoint_name("shop", 1, 1), "shop");
        assert_eq!(endpoint_name("shop", 2, 3), "shop-2");
    }

    #[test]
    fn test_endpoint_name_reserved_and_length() {
        assert_eq!(endpoint_name("Discord-Logger", 1, 1), "disc-Logger");
        assert_eq!(endpoint_name("CLYDE", 1, 2), "assistant-1");
        assert_eq!(endpoint_name(&"z".repeat(120), 1, 1).chars().count(), MAX_ENDPOINT_NAME);
        assert_eq!(endpoint_name("  ", 1, 1), "webhook");
    }
}
