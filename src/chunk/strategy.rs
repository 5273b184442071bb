//! Whole-page versus grouped-by-section routing.
//!
//! Routing happens in two steps. `estimate_flat_chunks` dry-runs the packer
//! over every section and counts chunks. `plan_units` then builds units for
//! whichever strategy that count selects.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::packer::Packer;
use super::tokens::TokenEstimator;
use crate::ident::slugify;
use crate::parser::{split_blocks, split_sections, Section};

/// Section key of a unit that holds an entire page.
pub const FULL_PAGE_KEY: &str = "__full__";
/// Group for sections that sit outside any top-level sub-heading.
pub const INTRO_GROUP: &str = "__intro__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    /// Budget for the flat dry run.
    pub chunk_max_tokens: usize,
    /// Pages estimating more flat chunks than this are grouped.
    pub large_chunk_threshold: usize,
    pub section_max_tokens: usize,
    pub overlap_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    WholePage,
    Grouped,
    /// Grouping produced nothing and the page fell back to a single unit.
    GroupedFallback,
}

impl Strategy {
    pub fn is_large(self) -> bool {
        !matches!(self, Strategy::WholePage)
    }
}

/// A unit body and its key, before page attributes are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDraft {
    pub section_key: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct PagePlan {
    pub strategy: Strategy,
    pub flat_estimate: usize,
    pub units: Vec<UnitDraft>,
}

/// Number of chunks the page would produce if every section were packed
/// separately at `chunk_max_tokens` with no overlap.
pub fn estimate_flat_chunks(
    sections: &[Section],
    params: &ChunkingParams,
    estimator: &dyn TokenEstimator,
) -> usize {
    let packer = Packer::new(estimator, params.chunk_max_tokens, 0);
    sections
        .iter()
        .map(|s| packer.pack(&split_blocks(&s.content)).len())
        .sum()
}

/// Which builder a page is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    WholePage,
    Grouped,
}

pub fn choose_strategy(flat_estimate: usize, params: &ChunkingParams) -> Route {
    if flat_estimate <= params.large_chunk_threshold {
        Route::WholePage
    } else {
        Route::Grouped
    }
}

pub fn whole_page(body: &str) -> UnitDraft {
    UnitDraft {
        section_key: FULL_PAGE_KEY.to_string(),
        body: body.trim().to_string(),
    }
}

struct Group<'s> {
    title: Option<&'s str>,
    members: Vec<&'s str>,
}

/// Group sections by top-level sub-heading and pack each group.
pub fn build_grouped(
    sections: &[Section],
    params: &ChunkingParams,
    estimator: &dyn TokenEstimator,
) -> Vec<UnitDraft> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<Option<&str>, usize> = HashMap::new();
    for section in sections {
        let title = section.group_title();
        let slot = *index.entry(title).or_insert_with(|| {
            groups.push(Group {
                title,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(&section.content);
    }

    let packer = Packer::new(estimator, params.section_max_tokens, params.overlap_tokens);
    let mut used = HashSet::new();
    let mut units = Vec::new();
    for group in &groups {
        let slug = match group.title {
            None => INTRO_GROUP.to_string(),
            Some(title) => unique_slug(&slugify(title), &mut used),
        };
        let joined = group
            .members
            .iter()
            .map(|m| m.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = packer.pack(&split_blocks(&joined));
        let multi = chunks.len() > 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let section_key = if multi {
                format!("{slug}__part_{}", i + 1)
            } else {
                slug.clone()
            };
            units.push(UnitDraft {
                section_key,
                body: chunk.body,
            });
        }
    }
    units
}

fn unique_slug(base: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    candidate
}

/// Estimate, choose and build the units for one page body.
pub fn plan_units(body: &str, params: &ChunkingParams, estimator: &dyn TokenEstimator) -> PagePlan {
    let sections = split_sections(body);
    let flat_estimate = estimate_flat_chunks(&sections, params, estimator);

    match choose_strategy(flat_estimate, params) {
        Route::WholePage => PagePlan {
            strategy: Strategy::WholePage,
            flat_estimate,
            units: vec![whole_page(body)],
        },
        Route::Grouped => {
            let units = build_grouped(&sections, params, estimator);
            grouped_or_fallback(body, flat_estimate, units)
        }
    }
}

/// Keep grouped units, or fall back to one whole-page unit when grouping
/// produced none, so a large page is never dropped.
pub fn grouped_or_fallback(body: &str, flat_estimate: usize, units: Vec<UnitDraft>) -> PagePlan {
    if units.is_empty() {
        warn!(flat_estimate, "grouped strategy produced no units, emitting whole page");
        return PagePlan {
            strategy: Strategy::GroupedFallback,
            flat_estimate,
            units: vec![whole_page(body)],
        };
    }
    PagePlan {
        strategy: Strategy::Grouped,
        flat_estimate,
        units,
    }
}

// ── Tests ──
