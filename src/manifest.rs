//! The run manifest: one entry per unit written, saved once at the end.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::UnitAttributes;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source_page_path: String,
    pub output_unit_path: String,
    pub attributes: UnitAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub kb_slug: String,
    pub year: i32,
    pub pages_ok: usize,
    pub pages_failed: usize,
    pub unit_count: usize,
    pub entries: Vec<ManifestEntry>,
}

/// Collects entries in the order units are written.
pub struct ManifestBuilder {
    kb_slug: String,
    year: i32,
    entries: Vec<ManifestEntry>,
}

impl ManifestBuilder {
    pub fn new(kb_slug: &str, year: i32) -> Self {
        Self {
            kb_slug: kb_slug.to_string(),
            year,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, source: &Path, output: &Path, attributes: UnitAttributes) {
        self.entries.push(ManifestEntry {
            source_page_path: source.to_string_lossy().into_owned(),
            output_unit_path: output.to_string_lossy().into_owned(),
            attributes,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn finish(self, pages_ok: usize, pages_failed: usize) -> Manifest {
        Manifest {
            kb_slug: self.kb_slug,
            year: self.year,
            pages_ok,
            pages_failed,
            unit_count: self.entries.len(),
            entries: self.entries,
        }
    }
}

impl Manifest {
    /// Write `manifest.json` into `dir` via a temp file and rename, so a
    /// reader never sees a half-written manifest.
    pub fn write_atomic(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        let mut json = serde_json::to_vec_pretty(self).context("serialize manifest")?;
        json.push(b'\n');
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("rename to {}", path.display()))?;
        Ok(path)
    }
}
