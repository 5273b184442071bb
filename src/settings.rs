use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::Deserialize;

use crate::chunk::ChunkingParams;
use crate::classify::ClassifierRules;
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "kb_chunker.toml";
const ENV_PREFIX: &str = "KB_CHUNKER";

/// Tunables loaded from defaults, an optional TOML file and `KB_CHUNKER_*`
/// environment variables, in that order of precedence (lowest first).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunk_max_tokens: usize,
    pub large_chunk_threshold: usize,
    pub section_max_tokens: usize,
    pub overlap_tokens: usize,
    pub year: i32,
    pub batch_size: usize,
    pub classifier: ClassifierRules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_max_tokens: 800,
            large_chunk_threshold: 8,
            section_max_tokens: 3000,
            overlap_tokens: 100,
            year: chrono::Local::now().year(),
            batch_size: 500,
            classifier: ClassifierRules::default(),
        }
    }
}

/// Positional CLI values; any that are set win over file and environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub chunk_max_tokens: Option<usize>,
    pub large_chunk_threshold: Option<usize>,
    pub section_max_tokens: Option<usize>,
    pub overlap_tokens: Option<usize>,
    pub year: Option<i32>,
}

impl Settings {
    /// Load settings. An explicitly named file must exist; the default file
    /// is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (file, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        let settings = config::Config::builder()
            .add_source(config::File::from(file).required(required))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn with_overrides(mut self, o: Overrides) -> Self {
        if let Some(v) = o.chunk_max_tokens {
            self.chunk_max_tokens = v;
        }
        if let Some(v) = o.large_chunk_threshold {
            self.large_chunk_threshold = v;
        }
        if let Some(v) = o.section_max_tokens {
            self.section_max_tokens = v;
        }
        if let Some(v) = o.overlap_tokens {
            self.overlap_tokens = v;
        }
        if let Some(v) = o.year {
            self.year = v;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_max_tokens == 0 {
            return Err(ConfigError::invalid("chunk_max_tokens", "must be greater than 0"));
        }
        if self.section_max_tokens == 0 {
            return Err(ConfigError::invalid("section_max_tokens", "must be greater than 0"));
        }
        if self.overlap_tokens >= self.section_max_tokens {
            return Err(ConfigError::invalid(
                "overlap_tokens",
                format!(
                    "{} must be smaller than section_max_tokens ({})",
                    self.overlap_tokens, self.section_max_tokens
                ),
            ));
        }
        if !(1900..=2100).contains(&self.year) {
            return Err(ConfigError::invalid("year", format!("{} is outside 1900..=2100", self.year)));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be greater than 0"));
        }
        Ok(())
    }

    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            chunk_max_tokens: self.chunk_max_tokens,
            large_chunk_threshold: self.large_chunk_threshold,
            section_max_tokens: self.section_max_tokens,
            overlap_tokens: self.overlap_tokens,
        }
    }
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub kb_slug: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub settings: Settings,
}

impl RunConfig {
    pub fn resolve(
        kb_slug: &str,
        input_dir: &Path,
        output_dir: &Path,
        settings: Settings,
    ) -> Result<Self, ConfigError> {
        let kb_slug = kb_slug.trim();
        if kb_slug.is_empty() {
            return Err(ConfigError::invalid("kb_slug", "must not be empty"));
        }
        settings.validate()?;

        if !input_dir.is_dir() {
            return Err(ConfigError::InputDirMissing(input_dir.to_path_buf()));
        }
        let input_abs = input_dir
            .canonicalize()
            .map_err(|_| ConfigError::InputDirMissing(input_dir.to_path_buf()))?;
        let output_abs = absolute(output_dir)?;
        if input_abs.starts_with(&output_abs) {
            return Err(ConfigError::OutputOverlapsInput {
                input: input_dir.to_path_buf(),
                output: output_dir.to_path_buf(),
            });
        }

        Ok(Self {
            kb_slug: kb_slug.to_string(),
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            settings,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(real) = path.canonicalize() {
        return Ok(real);
    }
    std::path::absolute(path).map_err(|e| ConfigError::invalid("output_dir", e.to_string()))
}
