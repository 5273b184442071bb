use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.*)$").unwrap());

const FENCES: &[&str] = &["```", "~~~"];

/// A heading-delimited span of a page.
///
/// `content` is the raw text of the span, starting with the heading line that
/// opened it, so each section reads on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Ancestor heading titles, outermost first. Skipped levels hold `""`.
    pub heading_path: Vec<String>,
    pub chunk_title: String,
    /// Heading level that opened the section, 0 for the preamble.
    pub level: usize,
    pub content: String,
}

impl Section {
    /// Title of the top-level sub-heading (second path element), if any.
    pub fn group_title(&self) -> Option<&str> {
        self.heading_path
            .get(1)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// Single forward pass over a page body, yielding sections in order.
pub struct Segmenter<'a> {
    lines: std::str::SplitInclusive<'a, char>,
    path: Vec<String>,
    level: usize,
    buffer: String,
    fence: Option<&'static str>,
    finished: bool,
}

pub fn segment(body: &str) -> Segmenter<'_> {
    Segmenter {
        lines: body.split_inclusive('\n'),
        path: Vec::new(),
        level: 0,
        buffer: String::new(),
        fence: None,
        finished: false,
    }
}

impl Segmenter<'_> {
    fn flush(&mut self) -> Option<Section> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return None;
        }
        Some(Section {
            heading_path: self.path.clone(),
            chunk_title: self.path.last().cloned().unwrap_or_default(),
            level: self.level,
            content: std::mem::take(&mut self.buffer),
        })
    }

    fn enter_heading(&mut self, level: usize, title: String) {
        self.path.resize(level - 1, String::new());
        self.path.push(title);
        self.level = level;
    }

    /// Track fenced code so `# comment` lines inside it are not headings.
    fn in_fence_after(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self.fence {
            Some(open) => {
                if trimmed.starts_with(open) {
                    self.fence = None;
                }
                true
            }
            None => match FENCES.iter().find(|f| trimmed.starts_with(**f)) {
                Some(open) => {
                    self.fence = Some(*open);
                    true
                }
                None => false,
            },
        }
    }
}

impl Iterator for Segmenter<'_> {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        if self.finished {
            return None;
        }
        loop {
            let Some(line) = self.lines.next() else {
                self.finished = true;
                return self.flush();
            };

            if !self.in_fence_after(line) {
                if let Some((level, title)) = parse_heading(line) {
                    let done = self.flush();
                    self.enter_heading(level, title);
                    self.buffer.push_str(line);
                    if done.is_some() {
                        return done;
                    }
                    continue;
                }
            }
            self.buffer.push_str(line);
        }
    }
}

/// Parse an ATX heading line into (level, title).
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let caps = HEADING_RE.captures(line.trim())?;
    let level = caps[1].len();
    let raw = caps[2].trim();
    // Closing `#` run only counts when separated from the title by a space.
    let without_closing = raw.trim_end_matches('#');
    let title = if without_closing.is_empty() || without_closing.ends_with([' ', '\t']) {
        without_closing.trim_end()
    } else {
        raw
    };
    Some((level, title.to_string()))
}

/// Collect all sections of a body.
pub fn split_sections(body: &str) -> Vec<Section> {
    segment(body).collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(md: &str) -> Vec<Vec<String>> {
        split_sections(md).into_iter().map(|s| s.heading_path).collect()
    }

    #[test]
    fn nested_paths() {
        let md = "# Guide\nintro\n## Fees\nmoney\n### Loans\nborrow\n## Contact\nmail";
        assert_eq!(
            paths(md),
            vec![
                vec!["Guide"],
                vec!["Guide", "Fees"],
                vec!["Guide", "Fees", "Loans"],
                vec!["Guide", "Contact"],
            ]
        );
    }

    #[test]
    fn content_includes_own_heading() {
        let sections = split_sections("# Guide\n\nIntro.\n\n## Fees\n\nDetails...");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].content, "# Guide\n\nIntro.\n\n");
        assert_eq!(sections[1].content, "## Fees\n\nDetails...");
        assert_eq!(sections[1].chunk_title, "Fees");
        assert_eq!(sections[1].level, 2);
    }

    #[test]
    fn path_length_matches_level_after_skips() {
        let md = "# A\nx\n### C\ny\n## B\nz\n#### D\nw";
        let sections = split_sections(md);
        for s in &sections {
            assert_eq!(s.heading_path.len(), s.level);
            assert_eq!(s.heading_path.last().unwrap(), &s.chunk_title);
        }
        assert_eq!(sections[1].heading_path, vec!["A", "", "C"]);
        assert_eq!(sections[3].heading_path, vec!["A", "B", "", "D"]);
    }

    #[test]
    fn skipped_level_has_no_group() {
        let sections = split_sections("# A\n### C\ntext");
        assert_eq!(sections[1].group_title(), None);
        let sections = split_sections("## Only H2\ntext");
        assert_eq!(sections[0].heading_path, vec!["", "Only H2"]);
        assert_eq!(sections[0].group_title(), Some("Only H2"));
    }

    #[test]
    fn preamble_has_empty_path() {
        let sections = split_sections("Lead text.\n\n# Title\nbody");
        assert_eq!(sections[0].heading_path, Vec::<String>::new());
        assert_eq!(sections[0].level, 0);
        assert_eq!(sections[0].chunk_title, "");
        assert_eq!(sections[1].heading_path, vec!["Title"]);
    }

    #[test]
    fn no_headings_single_section() {
        let body = "Just text.\n\nMore text.";
        let sections = split_sections(body);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].heading_path.is_empty());
        assert_eq!(sections[0].content, body);
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert!(split_sections("").is_empty());
        assert!(split_sections("\n\n  \n").is_empty());
    }

    #[test]
    fn heading_only_sections_are_kept() {
        let sections = split_sections("# A\n## B\n## C\n");
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].content, "## B\n");
    }

    #[test]
    fn fenced_hash_lines_are_not_headings() {
        let md = "# Setup\n```bash\n# install deps\npip install x\n```\n## Next\nok";
        let sections = split_sections(md);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].content.contains("# install deps"));
        assert_eq!(sections[1].chunk_title, "Next");
    }

    #[test]
    fn heading_parsing() {
        assert_eq!(parse_heading("## Fees ##"), Some((2, "Fees".to_string())));
        assert_eq!(parse_heading("# C#"), Some((1, "C#".to_string())));
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("####### seven"), None);
        assert_eq!(parse_heading("### Loans\r\n"), Some((3, "Loans".to_string())));
    }
}
