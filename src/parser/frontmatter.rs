use std::collections::BTreeMap;

use crate::error::PageError;

const DELIMITER: &str = "---";

/// Ordered alias table for one logical frontmatter field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

pub const CANONICAL_URL: FieldSpec = FieldSpec {
    name: "canonical_url",
    aliases: &["canonical_url", "url"],
};
pub const TITLE: FieldSpec = FieldSpec {
    name: "title",
    aliases: &["title", "page_title", "name"],
};
pub const SECTION: FieldSpec = FieldSpec {
    name: "section",
    aliases: &["section", "category", "site_section"],
};
pub const SITE: FieldSpec = FieldSpec {
    name: "site",
    aliases: &["site", "source_site", "kb_site"],
};

/// Parsed header fields plus the text that follows the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter<'a> {
    pub fields: BTreeMap<String, String>,
    pub body: &'a str,
}

impl<'a> Frontmatter<'a> {
    /// First non-empty value among the field's aliases.
    pub fn lookup(&self, spec: &FieldSpec) -> Option<&str> {
        spec.aliases
            .iter()
            .filter_map(|alias| self.fields.get(*alias))
            .map(|v| v.as_str())
            .find(|v| !v.is_empty())
    }

    pub fn require(&self, spec: &FieldSpec) -> Result<&str, PageError> {
        self.lookup(spec).ok_or(PageError::MissingField {
            field: spec.name,
            aliases: spec.aliases,
        })
    }
}

/// Split an optional `---` delimited `key: value` header off the document.
///
/// A header without a closing delimiter is not a header; the whole text is
/// then returned as body with no fields.
pub fn parse(text: &str) -> Frontmatter<'_> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let no_header = Frontmatter {
        fields: BTreeMap::new(),
        body: text,
    };

    let mut lines = LineCursor::new(text);
    match lines.next() {
        Some(first) if first.trim_end() == DELIMITER => {}
        _ => return no_header,
    }

    let mut builder = FieldBuilder::default();
    while let Some(line) = lines.next() {
        if line.trim_end() == DELIMITER {
            return Frontmatter {
                fields: builder.finish(),
                body: lines.rest(),
            };
        }
        builder.push_line(line);
    }

    no_header
}

#[derive(Default)]
struct FieldBuilder {
    fields: BTreeMap<String, String>,
}

impl FieldBuilder {
    fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let Some((key, value)) = line.split_once(':') else {
            return;
        };
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        self.fields.insert(key, unquote(value.trim()).to_string());
    }

    fn finish(self) -> BTreeMap<String, String> {
        self.fields
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Line iterator that remembers the byte offset of the unread remainder.
struct LineCursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        if rest.is_empty() {
            return None;
        }
        let (line, advance) = match rest.find('\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        Some(line.strip_suffix('\r').unwrap_or(line))
    }
}
