//! Data model shared by the scan, provision and rewrite stages.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Resource name used when no directory signal identifies the owner of a file.
pub const UNKNOWN_RESOURCE: &str = "unknown";

const MIN_URL_LEN: usize = 50;
const MIN_ID_LEN: usize = 17;
const MIN_TOKEN_LEN: usize = 50;
const SCHEMES: &[&str] = &["https://", "http://"];
const SUBDOMAINS: &[&str] = &["ptb.", "canary."];
const HOSTS: &[&str] = &["discord.com/api/webhooks/", "discordapp.com/api/webhooks/"];

/// A Discord webhook URL that passed strict validation.
///
/// The only way to obtain one is [`WebhookUrl::parse`], so every value flowing
/// through provisioning and rewriting is well formed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WebhookUrl(String);

impl WebhookUrl {
    /// Validate a candidate. Returns `None` for anything malformed.
    ///
    /// The whole candidate must be the URL: scheme, optional `ptb.`/`canary.`,
    /// host and path, then exactly `{id}/{token}` with nothing around it.
    pub fn parse(candidate: &str) -> Option<Self> {
        if candidate.len() < MIN_URL_LEN {
            return None;
        }

        let lower = candidate.to_ascii_lowercase();
        let rest = strip_any(&lower, SCHEMES)?;
        let rest = strip_any(rest, SUBDOMAINS).unwrap_or(rest);
        let tail_len = strip_any(rest, HOSTS)?.len();
        // Case-folding ASCII keeps byte offsets, so the tail maps back onto the original.
        let tail = &candidate[candidate.len() - tail_len..];

        let (id, token) = tail.split_once('/')?;

        if id.len() < MIN_ID_LEN || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        if token.len() < MIN_TOKEN_LEN
            || !token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return None;
        }

        Some(Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric webhook id (second-to-last path segment).
    pub fn id(&self) -> &str {
        self.0.rsplit('/').nth(1).unwrap_or_default()
    }

    /// The URL with all but the first few token characters masked.
    pub fn redacted(&self) -> String {
        let (prefix, token) = self.0.rsplit_once('/').unwrap_or((self.0.as_str(), ""));
        let visible: String = token.chars().take(6).collect();
        format!("{}/{}***", prefix, visible)
    }
}

fn strip_any<'s>(value: &'s str, prefixes: &[&str]) -> Option<&'s str> {
    prefixes.iter().find_map(|p| value.strip_prefix(p))
}

impl fmt::Display for WebhookUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WebhookUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WebhookUrl {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a valid webhook url: {}", value))
    }
}

impl From<WebhookUrl> for String {
    fn from(url: WebhookUrl) -> Self {
        url.0
    }
}

/// One file in which a URL was found, with the resource the file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub path: PathBuf,
    pub resource: String,
}

/// Resource name -> distinct URLs discovered under it.
pub type ResourceUrlIndex = BTreeMap<String, BTreeSet<WebhookUrl>>;

/// URL -> every file where it was found, in scan order.
pub type OccurrenceIndex = BTreeMap<WebhookUrl, Vec<Occurrence>>;

/// Old URL -> newly provisioned URL, keyed per resource.
///
/// A URL shared by two resources gets a separate endpoint for each, and a file
/// is rewritten with the endpoint of the resource it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointMapping {
    by_resource: BTreeMap<String, BTreeMap<WebhookUrl, WebhookUrl>>,
}

impl EndpointMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: &str, old: WebhookUrl, new: WebhookUrl) {
        self.by_resource
            .entry(resource.to_string())
            .or_default()
            .insert(old, new);
    }

    /// Merge another mapping into this one; entries of `other` win.
    pub fn extend(&mut self, other: EndpointMapping) {
        for (resource, pairs) in other.by_resource {
            self.by_resource.entry(resource).or_default().extend(pairs);
        }
    }

    pub fn get(&self, resource: &str, old: &WebhookUrl) -> Option<&WebhookUrl> {
        self.by_resource.get(resource).and_then(|pairs| pairs.get(old))
    }

    pub fn for_resource(&self, resource: &str) -> Option<&BTreeMap<WebhookUrl, WebhookUrl>> {
        self.by_resource.get(resource)
    }

    /// Iterate `(resource, old, new)` in resource then URL order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WebhookUrl, &WebhookUrl)> {
        self.by_resource.iter().flat_map(|(resource, pairs)| {
            pairs
                .iter()
                .map(move |(old, new)| (resource.as_str(), old, new))
        })
    }

    pub fn len(&self) -> usize {
        self.by_resource.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<MappingEntry> {
        self.iter()
            .map(|(resource, old, new)| MappingEntry {
                resource: resource.to_string(),
                old_url: old.clone(),
                new_url: new.clone(),
            })
            .collect()
    }
}

/// Flattened mapping row used by the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub resource: String,
    pub old_url: WebhookUrl,
    pub new_url: WebhookUrl,
}

/// Channel created or reused for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedChannel {
    pub resource: String,
    pub channel_id: String,
    pub channel_name: String,
    pub url_count: usize,
    pub reused: bool,
}

/// Resource abandoned because a remote call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub resource: String,
    pub reason: String,
}

/// File that was skipped by the scanner or the rewriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub files_scanned: usize,
    pub files_with_matches: usize,
    pub webhooks_found: usize,
    pub resources_found: usize,
    pub files_skipped: usize,
    pub channels_created: usize,
    pub channels_reused: usize,
    pub endpoints_created: usize,
    pub already_migrated: usize,
    pub files_updated: usize,
    pub replacements: usize,
    pub files_backed_up: usize,
}
