//! Paragraph-level splitting of section content.
//!
//! A block boundary is any run of blank lines (lines holding only spaces or
//! tabs count as blank). Single newlines stay inside the block untouched, so
//! soft-wrapped prose, lists and short code fences survive as one unit. This
//! is an approximation of markdown structure rather than a parser: a fenced
//! code block that itself contains blank lines is split like prose.

use std::sync::LazyLock;

use regex::Regex;

static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").unwrap());

/// Split content into trimmed, non-empty blocks in document order.
pub fn split_blocks(content: &str) -> Vec<&str> {
    BLANK_LINES_RE
        .split(content)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs() {
        let blocks = split_blocks("## Fees\n\nTuition is set yearly.\n\n\nLoans are available.");
        assert_eq!(blocks, vec!["## Fees", "Tuition is set yearly.", "Loans are available."]);
    }

    #[test]
    fn whitespace_only_lines_separate() {
        let blocks = split_blocks("one\n   \ntwo\n\t\n\nthree");
        assert_eq!(blocks, vec!["one", "two", "three"]);
    }

    #[test]
    fn single_newlines_preserved() {
        let content = "- item one\n- item two\n  continued";
        assert_eq!(split_blocks(content), vec![content]);
    }

    #[test]
    fn fenced_code_kept_verbatim() {
        let content = "Run:\n\n```sh\ncargo build\n  --release\n```\n\nDone.";
        let blocks = split_blocks(content);
        assert_eq!(blocks[1], "```sh\ncargo build\n  --release\n```");
        assert_eq!(blocks.len(), 3);
    }

    #[test]
    fn crlf_boundaries() {
        assert_eq!(split_blocks("a\r\n\r\nb"), vec!["a", "b"]);
    }

    #[test]
    fn empty_content() {
        assert!(split_blocks("").is_empty());
        assert!(split_blocks("\n\n\n").is_empty());
    }

    #[test]
    fn no_boundary_is_one_block() {
        assert_eq!(split_blocks("  lone paragraph \n"), vec!["lone paragraph"]);
    }
}
