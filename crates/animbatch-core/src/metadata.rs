//! Per-file metadata from a CSV sheet.
//!
//! ```text
//! file,group,loop,tags
//! A_Walk_F.fbx,Locomotion,true,ground;cycle
//! "A_Attack_*",Combat,,
//! ```

use std::path::Path;

use glob::Pattern;
use log::debug;

use crate::discovery::AnimFileEntry;
use crate::error::{RetargetError, RetargetResult};

/// One data row of the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    pub key: String,
    pub group: Option<String>,
    pub loop_override: Option<bool>,
    pub tags: Vec<String>,
    pattern: Option<Pattern>,
}

impl MetadataRow {
    /// Plain keys match the file name or stem; keys with `*`, `?` or `[` are
    /// glob patterns. Both are case-insensitive.
    pub fn matches(&self, entry: &AnimFileEntry) -> bool {
        let file_name = entry.file_name();
        match self.pattern {
            Some(ref pattern) => {
                let options = glob::MatchOptions {
                    case_sensitive: false,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                };
                pattern.matches_with(&file_name, options)
                    || pattern.matches_with(&entry.base_name, options)
            }
            None => {
                self.key.eq_ignore_ascii_case(&file_name)
                    || self.key.eq_ignore_ascii_case(&entry.base_name)
            }
        }
    }
}

/// A parsed metadata sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    rows: Vec<MetadataRow>,
}

/// A discovered file joined with its metadata row, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimFileEntryMetadata {
    pub entry: AnimFileEntry,
    pub group: Option<String>,
    pub loop_override: Option<bool>,
    pub tags: Vec<String>,
}

impl AnimFileEntryMetadata {
    pub fn bare(entry: AnimFileEntry) -> Self {
        Self {
            entry,
            group: None,
            loop_override: None,
            tags: Vec::new(),
        }
    }
}

impl MetadataTable {
    pub fn from_file(path: &Path) -> RetargetResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::parse(&content)?;
        debug!("loaded {} metadata row(s) from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn parse(content: &str) -> RetargetResult<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
            .filter(|(_, l)| !l.trim().is_empty());

        let Some((header_line, header)) = lines.next() else {
            return Ok(Self::default());
        };
        let header: Vec<String> = split_row(header, header_line)?
            .into_iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let column = |names: &[&str]| header.iter().position(|h| names.contains(&h.as_str()));
        let Some(file_col) = column(&["file", "filename"]) else {
            return Err(RetargetError::Metadata {
                line: header_line,
                message: "header has no 'file' column".to_string(),
            });
        };
        let group_col = column(&["group"]);
        let loop_col = column(&["loop"]);
        let tags_col = column(&["tags"]);

        let mut rows = Vec::new();
        for (line, text) in lines {
            if text.trim_start().starts_with('#') {
                continue;
            }
            let fields = split_row(text, line)?;
            let field = |col: Option<usize>| {
                col.and_then(|c| fields.get(c))
                    .map(|f| f.trim())
                    .filter(|f| !f.is_empty())
            };

            let Some(key) = field(Some(file_col)) else {
                return Err(RetargetError::Metadata {
                    line,
                    message: "empty file key".to_string(),
                });
            };
            let loop_override = match field(loop_col) {
                Some(value) => Some(parse_bool(value).ok_or_else(|| RetargetError::Metadata {
                    line,
                    message: format!("invalid loop value '{}'", value),
                })?),
                None => None,
            };
            let tags = field(tags_col)
                .map(|t| {
                    t.split([';', '|'])
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let pattern = if key.contains(['*', '?', '[']) {
                Some(Pattern::new(key).map_err(|e| RetargetError::Metadata {
                    line,
                    message: format!("invalid pattern '{}': {}", key, e),
                })?)
            } else {
                None
            };

            rows.push(MetadataRow {
                key: key.to_string(),
                group: field(group_col).map(str::to_string),
                loop_override,
                tags,
                pattern,
            });
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[MetadataRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row matching the entry.
    pub fn lookup(&self, entry: &AnimFileEntry) -> Option<&MetadataRow> {
        self.rows.iter().find(|r| r.matches(entry))
    }

    /// Joins entries with their metadata.
    pub fn annotate(&self, entries: Vec<AnimFileEntry>) -> Vec<AnimFileEntryMetadata> {
        entries
            .into_iter()
            .map(|entry| match self.lookup(&entry) {
                Some(row) => AnimFileEntryMetadata {
                    group: row.group.clone(),
                    loop_override: row.loop_override,
                    tags: row.tags.clone(),
                    entry,
                },
                None => AnimFileEntryMetadata::bare(entry),
            })
            .collect()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Splits one CSV line. Quoted fields may contain commas and `""` escapes.
fn split_row(line: &str, line_no: usize) -> RetargetResult<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                quoted = true;
            }
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if quoted {
        return Err(RetargetError::Metadata {
            line: line_no,
            message: "unterminated quoted field".to_string(),
        });
    }
    fields.push(current);
    Ok(fields)
}
