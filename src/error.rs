use std::path::PathBuf;

use thiserror::Error;

/// Fatal pre-flight errors. Nothing is written to the output directory when
/// one of these is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("input directory not found: {0}")]
    InputDirMissing(PathBuf),

    #[error("no input files found under {0}")]
    NoInputFiles(PathBuf),

    #[error("output directory {output} overlaps input directory {input}")]
    OutputOverlapsInput { input: PathBuf, output: PathBuf },

    #[error("settings: {0}")]
    Settings(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Per-page failures. The driver logs these and moves on to the next page.
#[derive(Error, Debug)]
pub enum PageError {
    #[error("missing required field `{field}` (accepted keys: {})", aliases.join(", "))]
    MissingField {
        field: &'static str,
        aliases: &'static [&'static str],
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("page body is empty")]
    EmptyBody,

    #[error("doc_id {doc_id} already produced by {}", first.display())]
    DuplicateDocument { doc_id: String, first: PathBuf },

    #[error("two units of the page map to the same file {file}")]
    UnitFileCollision { file: String },
}

impl PageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_lists_aliases() {
        let err = PageError::MissingField {
            field: "canonical_url",
            aliases: &["canonical_url", "url"],
        };
        assert_eq!(
            err.to_string(),
            "missing required field `canonical_url` (accepted keys: canonical_url, url)"
        );
    }

    #[test]
    fn io_error_names_path() {
        let err = PageError::io(
            "pages/a.md",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().starts_with("pages/a.md"));
    }
}
