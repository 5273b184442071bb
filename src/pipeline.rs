//! Per-page transformation: file text in, hashed units out.
//!
//! Nothing here touches shared state, so pages can be processed on any
//! thread and in any order; the driver restores input order afterwards.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::chunk::{plan_units, ChunkingParams, Strategy, TokenEstimator};
use crate::classify::ClassifierRules;
use crate::error::PageError;
use crate::ident::{content_hash, doc_id};
use crate::model::{SourceDocument, Unit, UnitAttributes};

/// Run-wide inputs shared by every page.
pub struct PageContext<'a> {
    pub kb_slug: &'a str,
    pub year: i32,
    pub params: ChunkingParams,
    pub estimator: &'a dyn TokenEstimator,
    pub rules: &'a ClassifierRules,
}

#[derive(Debug, Clone)]
pub struct PageOutput {
    pub source_path: PathBuf,
    pub doc_id: String,
    pub strategy: Strategy,
    pub flat_estimate: usize,
    pub units: Vec<Unit>,
}

pub fn process_page(path: &Path, ctx: &PageContext) -> Result<PageOutput, PageError> {
    let text = std::fs::read_to_string(path).map_err(|e| PageError::io(path, e))?;
    process_text(path, &text, ctx)
}

pub fn process_text(path: &Path, text: &str, ctx: &PageContext) -> Result<PageOutput, PageError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let doc = SourceDocument::parse(text, &stem)?;
    if doc.raw_body.trim().is_empty() {
        return Err(PageError::EmptyBody);
    }

    let doc_id = doc_id(&doc.canonical_url);
    let plan = plan_units(&doc.raw_body, &ctx.params, ctx.estimator);
    let class = ctx.rules.classify(&doc.site, &doc.canonical_url, ctx.kb_slug);
    debug!(
        path = %path.display(),
        strategy = ?plan.strategy,
        flat_estimate = plan.flat_estimate,
        units = plan.units.len(),
        "planned page"
    );

    let units = plan
        .units
        .into_iter()
        .map(|draft| Unit {
            attributes: UnitAttributes {
                kb_slug: ctx.kb_slug.to_string(),
                doc_id: doc_id.clone(),
                canonical_url: doc.canonical_url.clone(),
                title: doc.title.clone(),
                section: doc.section_label.clone(),
                site: doc.site.clone(),
                uni: class.uni.clone(),
                corpus: class.corpus.clone(),
                year: ctx.year,
                section_key: draft.section_key,
                content_hash: content_hash(&draft.body),
            },
            body: draft.body,
        })
        .collect();

    Ok(PageOutput {
        source_path: path.to_path_buf(),
        doc_id,
        strategy: plan.strategy,
        flat_estimate: plan.flat_estimate,
        units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::strategy::FULL_PAGE_KEY;
    use crate::chunk::CharEstimator;
    use crate::ident::stable_hash;

    const EST: CharEstimator = CharEstimator { chars_per_token: 4 };

    fn ctx<'a>(rules: &'a ClassifierRules, params: ChunkingParams) -> PageContext<'a> {
        PageContext {
            kb_slug: "oxford-ug",
            year: 2025,
            params,
            estimator: &EST,
            rules,
        }
    }

    fn defaults() -> ChunkingParams {
        ChunkingParams {
            chunk_max_tokens: 800,
            large_chunk_threshold: 8,
            section_max_tokens: 3000,
            overlap_tokens: 100,
        }
    }

    #[test]
    fn scenario_single_unit() {
        let rules = ClassifierRules::default();
        let text = "---\ncanonical_url: https://example.edu/a/\n---\n# Title\n\nIntro.\n\n## Fees\n\nDetails...";
        let out = process_text(Path::new("in/a.md"), text, &ctx(&rules, defaults())).unwrap();

        assert_eq!(out.strategy, Strategy::WholePage);
        assert_eq!(out.units.len(), 1);
        let attrs = &out.units[0].attributes;
        assert_eq!(attrs.section_key, FULL_PAGE_KEY);
        assert_eq!(attrs.doc_id, stable_hash("https://example.edu/a"));
        assert_eq!(attrs.canonical_url, "https://example.edu/a");
        assert_eq!(attrs.content_hash, content_hash(&out.units[0].body));
        assert_eq!(attrs.uni, "oxford");
        assert_eq!(attrs.year, 2025);
    }

    #[test]
    fn same_url_spelled_differently_shares_doc_id() {
        let rules = ClassifierRules::default();
        let c = ctx(&rules, defaults());
        let a = process_text(Path::new("a.md"), "---\nurl: https://www.example.edu/a/?x=1\n---\nBody", &c).unwrap();
        let b = process_text(Path::new("b.md"), "---\nurl: https://example.edu/a\n---\nOther", &c).unwrap();
        assert_eq!(a.doc_id, b.doc_id);
    }

    #[test]
    fn empty_body_rejected() {
        let rules = ClassifierRules::default();
        let err = process_text(Path::new("e.md"), "---\nurl: https://example.edu\n---\n\n  \n", &ctx(&rules, defaults()))
            .unwrap_err();
        assert!(matches!(err, PageError::EmptyBody));
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let rules = ClassifierRules::default();
        let err = process_page(Path::new("does/not/exist.md"), &ctx(&rules, defaults())).unwrap_err();
        assert!(matches!(err, PageError::Io { .. }));
    }

    #[test]
    fn grouped_units_share_doc_id_with_distinct_keys() {
        let rules = ClassifierRules::default();
        let params = ChunkingParams {
            chunk_max_tokens: 8,
            large_chunk_threshold: 1,
            section_max_tokens: 20,
            overlap_tokens: 0,
        };
        let text = "---\nurl: https://example.edu/b\n---\n# Guide\n\nWelcome text.\n\n## Fees\n\nTuition details.\n\n## Contact\n\nEmail the office.";
        let out = process_text(Path::new("b.md"), text, &ctx(&rules, params)).unwrap();
        assert_eq!(out.strategy, Strategy::Grouped);
        let keys: Vec<&str> = out.units.iter().map(|u| u.attributes.section_key.as_str()).collect();
        assert_eq!(keys, vec!["__intro__", "fees", "contact"]);
        assert!(out.units.iter().all(|u| u.attributes.doc_id == out.doc_id));
    }
}
