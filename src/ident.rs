//! Stable identities: canonical URLs, content hashes and slugs.
//!
//! Everything here is pure. The same input produces the same output on every
//! machine and every run, which is what makes re-ingestion idempotent.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
static TRAILING_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m) +$").unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Normalize a source URL into its identity form.
///
/// Lower-cases the host, strips a leading `www.`, drops query and fragment,
/// and removes trailing slashes from any non-root path. Input that cannot be
/// parsed even with an implied `https://` comes back trimmed.
pub fn canonicalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let parsed = Url::parse(raw).or_else(|err| {
        if raw.contains("://") {
            Err(err)
        } else {
            Url::parse(&format!("https://{raw}"))
        }
    });
    let Ok(mut url) = parsed else {
        return raw.to_string();
    };

    if let Some(host) = url.host_str().map(str::to_string) {
        let lowered = host.to_ascii_lowercase();
        let mut bare = lowered.as_str();
        while let Some(rest) = bare.strip_prefix("www.") {
            bare = rest;
        }
        if !bare.is_empty() && bare != host && url.set_host(Some(bare)).is_err() {
            return raw.to_string();
        }
    }

    url.set_query(None);
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    url.to_string()
}

/// Whitespace normalization applied before hashing.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HSPACE_RE.replace_all(&unified, " ");
    let stripped = TRAILING_SPACE_RE.replace_all(&collapsed, "");
    BLANK_RUN_RE
        .replace_all(&stripped, "\n\n")
        .trim()
        .to_string()
}

/// SHA-256 hex digest of the normalized text.
pub fn stable_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

pub fn doc_id(canonical_url: &str) -> String {
    stable_hash(canonical_url)
}

pub fn content_hash(body: &str) -> String {
    stable_hash(body)
}

/// Lower-case ASCII slug used for section keys. Never empty.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let slug = NON_SLUG_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}
