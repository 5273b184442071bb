//! Unit files on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PageError;
use crate::ident::stable_hash;
use crate::model::{Unit, UnitAttributes};

static UNSAFE_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

const MAX_COMPONENT_CHARS: usize = 80;
const HASH_TAG_CHARS: usize = 12;
const PART_MARKER: &str = "__part_";

/// Empty `dir` (creating it if needed). Running it twice leaves the same
/// empty directory.
pub fn prepare_output(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn sanitize(component: &str) -> String {
    let cleaned = UNSAFE_CHARS_RE.replace_all(component.trim(), "_");
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        shorten(&cleaned)
    }
}

/// Over-long text keeps a readable prefix and ends in a hash of the whole
/// text, so two inputs that share a prefix still get distinct names.
fn shorten(text: &str) -> String {
    if text.chars().count() <= MAX_COMPONENT_CHARS {
        return text.to_string();
    }
    let prefix: String = text.chars().take(MAX_COMPONENT_CHARS - HASH_TAG_CHARS - 1).collect();
    format!("{prefix}-{}", &stable_hash(text)[..HASH_TAG_CHARS])
}

/// Like `sanitize`, but a trailing `__part_N` survives shortening.
fn sanitize_section_key(key: &str) -> String {
    match key.rsplit_once(PART_MARKER) {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{}{PART_MARKER}{n}", sanitize(base))
        }
        _ => sanitize(key),
    }
}

/// `{kb_slug}__{doc_id}__{section_key}.md`, each part filesystem-safe.
pub fn unit_file_name(attrs: &UnitAttributes) -> String {
    format!(
        "{}__{}__{}.md",
        sanitize(&attrs.kb_slug),
        sanitize(&attrs.doc_id),
        sanitize_section_key(&attrs.section_key)
    )
}

fn quoted(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Header block followed by the body.
pub fn render_unit(unit: &Unit) -> String {
    let a = &unit.attributes;
    let fields = [
        ("kb_slug", quoted(&a.kb_slug)),
        ("doc_id", quoted(&a.doc_id)),
        ("canonical_url", quoted(&a.canonical_url)),
        ("title", quoted(&a.title)),
        ("section", quoted(&a.section)),
        ("site", quoted(&a.site)),
        ("uni", quoted(&a.uni)),
        ("corpus", quoted(&a.corpus)),
        ("year", a.year.to_string()),
        ("section_key", quoted(&a.section_key)),
        ("content_hash", quoted(&a.content_hash)),
    ];

    let mut out = String::from("---\n");
    for (key, value) in fields {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&value);
        out.push('\n');
    }
    out.push_str("---\n\n");
    out.push_str(&unit.body);
    out.push('\n');
    out
}

pub fn write_unit(dir: &Path, unit: &Unit) -> Result<PathBuf, PageError> {
    let path = dir.join(unit_file_name(&unit.attributes));
    fs::write(&path, render_unit(unit)).map_err(|e| PageError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::slugify;
    use crate::parser::frontmatter;
    use std::collections::HashSet;
    use pretty_assertions::assert_eq;

    fn unit(section_key: &str) -> Unit {
        Unit {
            attributes: UnitAttributes {
                kb_slug: "oxford ug/2025".into(),
                doc_id: "abc123".into(),
                canonical_url: "https://example.edu/a".into(),
                title: "Fees \"2025\"".into(),
                section: "ug".into(),
                site: "ox".into(),
                uni: "oxford".into(),
                corpus: "official".into(),
                year: 2025,
                section_key: section_key.into(),
                content_hash: "def456".into(),
            },
            body: "## Fees\n\nDetails.".into(),
        }
    }

    #[test]
    fn file_names_are_safe_and_stable() {
        assert_eq!(unit_file_name(&unit("__full__").attributes), "oxford_ug_2025__abc123____full__.md");
        assert_eq!(
            unit_file_name(&unit("fees__part_2").attributes),
            "oxford_ug_2025__abc123__fees__part_2.md"
        );
        assert!(!unit_file_name(&unit("../../etc").attributes).contains('/'));
    }

    #[test]
    fn long_section_keys_stay_distinct() {
        let slug = slugify(
            "Frequently asked questions about undergraduate tuition fees and funding options for new students",
        );
        assert!(slug.len() > MAX_COMPONENT_CHARS);

        let names: Vec<String> = (1..=6)
            .map(|i| unit_file_name(&unit(&format!("{slug}__part_{i}")).attributes))
            .collect();
        let distinct: HashSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), 6, "{names:?}");
        for (i, name) in names.iter().enumerate() {
            assert!(name.ends_with(&format!("__part_{}.md", i + 1)), "{name}");
        }

        let a = unit_file_name(&unit(&format!("{slug}-alpha")).attributes);
        let b = unit_file_name(&unit(&format!("{slug}-beta")).attributes);
        assert_ne!(a, b);
        assert_eq!(a, unit_file_name(&unit(&format!("{slug}-alpha")).attributes));
    }

    #[test]
    fn short_components_are_not_hashed() {
        assert_eq!(sanitize("fees"), "fees");
        assert_eq!(sanitize(&"x".repeat(MAX_COMPONENT_CHARS)), "x".repeat(MAX_COMPONENT_CHARS));
        assert_eq!(sanitize(&"x".repeat(MAX_COMPONENT_CHARS + 1)).chars().count(), MAX_COMPONENT_CHARS);
    }

    #[test]
    fn rendered_header_reads_back() {
        let text = render_unit(&unit("fees"));
        assert!(text.starts_with("---\nkb_slug: \"oxford ug/2025\"\n"));
        assert!(text.ends_with("---\n\n## Fees\n\nDetails.\n"));

        let fm = frontmatter::parse(&text);
        assert_eq!(fm.fields["section_key"], "fees");
        assert_eq!(fm.fields["year"], "2025");
        assert_eq!(fm.fields["canonical_url"], "https://example.edu/a");
        assert_eq!(fm.body, "\n## Fees\n\nDetails.\n");
    }

    #[test]
    fn write_then_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_unit(dir.path(), &unit("fees")).unwrap();
        let second = write_unit(dir.path(), &unit("fees")).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(fs::read_to_string(first).unwrap(), render_unit(&unit("fees")));
    }

    #[test]
    fn prepare_output_clears_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        prepare_output(&out).unwrap();
        assert!(out.is_dir());

        fs::write(out.join("stale.md"), "old").unwrap();
        fs::create_dir_all(out.join("nested/deeper")).unwrap();
        fs::write(out.join("nested/deeper/x.md"), "old").unwrap();

        prepare_output(&out).unwrap();
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
        prepare_output(&out).unwrap();
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }
}
