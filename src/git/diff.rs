//! Unified diff parsing.
//!
//! Turns `git diff` text into one [`FileDiff`] per file header. Parsing is a
//! small state machine over lines (seeking a file header, seeking a hunk
//! header, inside a hunk) so that `--- a/...` metadata is never confused
//! with a removed line that happens to start with `--`.

/// Type of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineType {
    Hunk(HunkHeader),
    Context,
    Remove,
    Add,
}

/// Starting positions and spans parsed from `@@ -a,b +c,d @@`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
}

/// A single line in a file's diff, with its prefix stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
}

/// Every line following one file header, up to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path in the new revision (or the old one for deletions).
    pub path: String,
    /// Path in the old revision; `None` when the file was added.
    pub old_path: Option<String>,
    pub lines: Vec<DiffLine>,
}

impl FileDiff {
    /// Path to look up history under: the pre-change path when known.
    pub fn blame_path(&self) -> &str {
        self.old_path.as_deref().unwrap_or(&self.path)
    }

    pub fn hunk_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.line_type, DiffLineType::Hunk(_)))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingFileHeader,
    SeekingHunkHeader,
    /// Lines still expected on each side before the hunk is complete.
    InHunk { old_left: u32, new_left: u32 },
}

impl State {
    fn enter(header: HunkHeader) -> Self {
        State::InHunk {
            old_left: header.old_lines,
            new_left: header.new_lines,
        }
        .settle()
    }

    /// A hunk with nothing left on either side is over.
    fn settle(self) -> Self {
        match self {
            State::InHunk {
                old_left: 0,
                new_left: 0,
            } => State::SeekingHunkHeader,
            other => other,
        }
    }
}

const FILE_HEADER: &str = "diff --git ";

/// Parse unified diff text. Files appear in the order of their headers.
///
/// Text without any file header yields an empty vector; unrecognised lines
/// are skipped.
pub fn parse_unified_diff(text: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut state = State::SeekingFileHeader;

    for raw in text.lines() {
        if let Some(rest) = raw.strip_prefix(FILE_HEADER) {
            let (old_path, path) = parse_file_header(rest);
            files.push(FileDiff {
                path: path.unwrap_or_default(),
                old_path,
                lines: Vec::new(),
            });
            state = State::SeekingHunkHeader;
            continue;
        }

        let Some(file) = files.last_mut() else {
            continue;
        };

        match state {
            State::SeekingFileHeader => {}
            State::SeekingHunkHeader => {
                if raw.starts_with("@@") {
                    if let Some(header) = push_hunk(file, raw) {
                        state = State::enter(header);
                    }
                } else if let Some(old) = raw.strip_prefix("--- ") {
                    file.old_path = strip_side(old, "a/");
                } else if let Some(new) = raw.strip_prefix("+++ ") {
                    if let Some(new) = strip_side(new, "b/") {
                        file.path = new;
                    }
                } else if let Some(from) = raw.strip_prefix("rename from ") {
                    file.old_path = Some(unquote(from).to_string());
                } else if let Some(to) = raw.strip_prefix("rename to ") {
                    file.path = unquote(to).to_string();
                }
            }
            State::InHunk { old_left, new_left } => {
                let (line_type, content) = match raw.as_bytes().first() {
                    Some(b'@') if raw.starts_with("@@") => {
                        if let Some(header) = push_hunk(file, raw) {
                            state = State::enter(header);
                        }
                        continue;
                    }
                    Some(b' ') => (DiffLineType::Context, &raw[1..]),
                    Some(b'-') => (DiffLineType::Remove, &raw[1..]),
                    Some(b'+') => (DiffLineType::Add, &raw[1..]),
                    // Some producers strip the single space from blank context lines.
                    None => (DiffLineType::Context, ""),
                    // "\ No newline at end of file"
                    Some(b'\\') => continue,
                    Some(_) => {
                        tracing::debug!(path = %file.path, line = raw, "skipping unrecognised diff line");
                        continue;
                    }
                };

                let (old_used, new_used) = match line_type {
                    DiffLineType::Context => (1, 1),
                    DiffLineType::Remove => (1, 0),
                    _ => (0, 1),
                };
                state = State::InHunk {
                    old_left: old_left.saturating_sub(old_used),
                    new_left: new_left.saturating_sub(new_used),
                }
                .settle();

                file.lines.push(DiffLine {
                    line_type,
                    content: content.to_string(),
                });
            }
        }
    }

    // A path-less header cannot be attributed to anything.
    files.retain(|f| !f.path.is_empty());
    files
}

/// Appends a hunk header line if it parses.
fn push_hunk(file: &mut FileDiff, raw: &str) -> Option<HunkHeader> {
    let header = parse_hunk_header(raw);
    match header {
        Some(header) => file.lines.push(DiffLine {
            line_type: DiffLineType::Hunk(header),
            content: raw.to_string(),
        }),
        None => tracing::debug!(path = %file.path, line = raw, "skipping malformed hunk header"),
    }
    header
}

/// Parse `@@ -old_start[,old_lines] +new_start[,new_lines] @@ [section]`.
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let rest = line.strip_prefix("@@ ")?;
    let (ranges, _) = rest.split_once(" @@")?;
    let (old, new) = ranges.split_once(' ')?;
    let (old_start, old_lines) = parse_range(old.strip_prefix('-')?)?;
    let (new_start, new_lines) = parse_range(new.strip_prefix('+')?)?;
    Some(HunkHeader {
        old_start,
        old_lines,
        new_start,
        new_lines,
    })
}

/// A range whose end does not fit in a `u32` is rejected.
fn parse_range(range: &str) -> Option<(u32, u32)> {
    let (start, count): (u32, u32) = match range.split_once(',') {
        Some((start, count)) => (start.parse().ok()?, count.parse().ok()?),
        None => (range.parse().ok()?, 1),
    };
    start.checked_add(count)?;
    Some((start, count))
}

/// Splits the `a/<old> b/<new>` tail of a `diff --git` header.
fn parse_file_header(rest: &str) -> (Option<String>, Option<String>) {
    let rest = rest.trim();
    match rest.find(" b/").or_else(|| rest.find(" \"b/")) {
        Some(idx) => {
            let old = strip_side(&rest[..idx], "a/");
            let new = strip_side(&rest[idx + 1..], "b/");
            (old, new)
        }
        None => (None, None),
    }
}

/// Strips the `a/` or `b/` side marker; `/dev/null` means "no file".
fn strip_side(path: &str, side: &str) -> Option<String> {
    let path = unquote(path.trim_end_matches('\t').trim());
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix(side).unwrap_or(path).to_string())
}

fn unquote(path: &str) -> &str {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
}
