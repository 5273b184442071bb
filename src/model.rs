use serde::{Deserialize, Serialize};

use crate::error::PageError;
use crate::ident::canonicalize_url;
use crate::parser::frontmatter::{self, CANONICAL_URL, SECTION, SITE, TITLE};
use crate::parser::sections;

/// One input page after its header has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub canonical_url: String,
    pub title: String,
    pub section_label: String,
    pub site: String,
    pub raw_body: String,
}

impl SourceDocument {
    /// Resolve the header fields of a page.
    ///
    /// Title falls back to the first heading of the body, then to
    /// `fallback_title` (the file stem).
    pub fn parse(text: &str, fallback_title: &str) -> Result<Self, PageError> {
        let fm = frontmatter::parse(text);
        let canonical_url = canonicalize_url(fm.require(&CANONICAL_URL)?);
        let title = match fm.lookup(&TITLE) {
            Some(title) => title.to_string(),
            None => first_heading(fm.body).unwrap_or_else(|| fallback_title.to_string()),
        };

        Ok(Self {
            canonical_url,
            title,
            section_label: fm.lookup(&SECTION).unwrap_or_default().to_string(),
            site: fm.lookup(&SITE).unwrap_or_default().to_string(),
            raw_body: fm.body.to_string(),
        })
    }
}

fn first_heading(body: &str) -> Option<String> {
    sections::segment(body)
        .find(|s| s.level > 0 && !s.chunk_title.is_empty())
        .map(|s| s.chunk_title)
}

/// Header written at the top of every unit file and copied into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAttributes {
    pub kb_slug: String,
    pub doc_id: String,
    pub canonical_url: String,
    pub title: String,
    pub section: String,
    pub site: String,
    pub uni: String,
    pub corpus: String,
    pub year: i32,
    pub section_key: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub attributes: UnitAttributes,
    pub body: String,
}
