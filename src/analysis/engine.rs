//! Pairs removed lines with added lines and classifies every changed line.
//!
//! Within a hunk, removals wait in a FIFO queue. Each added line takes the
//! oldest waiting removal and the pair is classified by the age of the
//! removed line; an added line with nothing waiting is a new feature.
//! Removals still waiting when the hunk ends are pure deletions and are
//! classified by age on their own. Pairing is positional, not semantic:
//! unrelated adjacent edits can be paired with each other.

use super::classifier::{Bucket, Classifier};
use super::report::{ClassificationCounts, FileReport};
use crate::filter::PathFilter;
use crate::git::{parse_unified_diff, DiffLineType, FileDiff, ProvenanceResolver};
use std::collections::VecDeque;

/// One classified line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent<'a> {
    pub path: &'a str,
    /// Old-file line whose age decided the bucket, if any.
    pub old_line: Option<u32>,
    /// New-file line that was added, if any.
    pub new_line: Option<u32>,
    pub authored_at: Option<i64>,
    pub bucket: Bucket,
}

/// Receives every per-line decision the engine makes.
pub trait Observer {
    fn on_line(&mut self, event: &LineEvent<'_>);

    fn on_skipped_file(&mut self, _path: &str) {}
}

/// Emits each decision as a `debug` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_line(&mut self, event: &LineEvent<'_>) {
        tracing::debug!(
            file = event.path,
            old_line = ?event.old_line,
            new_line = ?event.new_line,
            authored_at = ?event.authored_at,
            bucket = event.bucket.as_str(),
            "classified line"
        );
    }

    fn on_skipped_file(&mut self, path: &str) {
        tracing::debug!(file = path, "ignored path");
    }
}

/// Result of analysing one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffAnalysis {
    pub counts: ClassificationCounts,
    pub files: Vec<FileReport>,
    pub files_skipped: usize,
}

/// What the diff structure alone says about a changed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    NewFeature { new_line: u32 },
    Replaced { old_line: u32, new_line: u32 },
    Deleted { old_line: u32 },
}

impl Decision {
    fn old_line(&self) -> Option<u32> {
        match *self {
            Decision::NewFeature { .. } => None,
            Decision::Replaced { old_line, .. } | Decision::Deleted { old_line } => Some(old_line),
        }
    }

    fn new_line(&self) -> Option<u32> {
        match *self {
            Decision::NewFeature { new_line } | Decision::Replaced { new_line, .. } => Some(new_line),
            Decision::Deleted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    old: u32,
    new: u32,
}

impl Cursor {
    fn advance(self, old: u32, new: u32) -> Option<Self> {
        Some(Self {
            old: self.old.checked_add(old)?,
            new: self.new.checked_add(new)?,
        })
    }
}

/// Walks one file's lines and decides pairing without any history lookups.
fn pair_lines(file: &FileDiff) -> Vec<Decision> {
    let mut decisions = Vec::new();
    let mut cursor: Option<Cursor> = None;
    let mut pending: VecDeque<u32> = VecDeque::new();

    let flush = |pending: &mut VecDeque<u32>, decisions: &mut Vec<Decision>| {
        decisions.extend(pending.drain(..).map(|old_line| Decision::Deleted { old_line }));
    };

    for line in &file.lines {
        if let DiffLineType::Hunk(header) = line.line_type {
            flush(&mut pending, &mut decisions);
            cursor = Some(Cursor {
                old: header.old_start,
                new: header.new_start,
            });
            continue;
        }

        let Some(at) = cursor else {
            continue;
        };

        let (old_step, new_step) = match line.line_type {
            DiffLineType::Context => (1, 1),
            DiffLineType::Remove => {
                pending.push_back(at.old);
                (1, 0)
            }
            DiffLineType::Add => {
                let decision = match pending.pop_front() {
                    Some(old_line) => Decision::Replaced {
                        old_line,
                        new_line: at.new,
                    },
                    None => Decision::NewFeature { new_line: at.new },
                };
                decisions.push(decision);
                (0, 1)
            }
            DiffLineType::Hunk(_) => (0, 0),
        };

        cursor = at.advance(old_step, new_step);
        if cursor.is_none() {
            tracing::debug!(
                path = %file.path,
                "hunk runs past the last line number, ignoring its remainder"
            );
        }
    }

    flush(&mut pending, &mut decisions);
    decisions
}

/// Drives parsing, pairing, provenance lookup and classification.
pub struct Engine<'a, R: ProvenanceResolver + ?Sized> {
    resolver: &'a R,
    classifier: Classifier,
    filter: &'a PathFilter,
}

impl<'a, R: ProvenanceResolver + ?Sized> Engine<'a, R> {
    pub fn new(resolver: &'a R, classifier: Classifier, filter: &'a PathFilter) -> Self {
        Self {
            resolver,
            classifier,
            filter,
        }
    }

    /// Classify every changed line of `diff_text`.
    ///
    /// `commit_time` is the analysed commit's timestamp; `parent` is the
    /// revision that removed lines are looked up at. Without a parent (a
    /// root commit) any removal is left unresolved.
    pub fn analyze_diff(
        &self,
        diff_text: &str,
        commit_time: i64,
        parent: Option<&str>,
        observer: &mut dyn Observer,
    ) -> DiffAnalysis {
        let mut analysis = DiffAnalysis::default();

        for file in parse_unified_diff(diff_text) {
            if self.filter.is_ignored(&file.path) {
                analysis.files_skipped += 1;
                observer.on_skipped_file(&file.path);
                continue;
            }

            let counts = self.analyze_file(&file, commit_time, parent, observer);
            analysis.counts += counts;
            analysis.files.push(FileReport {
                path: file.path,
                counts,
            });
        }

        analysis
    }

    fn analyze_file(
        &self,
        file: &FileDiff,
        commit_time: i64,
        parent: Option<&str>,
        observer: &mut dyn Observer,
    ) -> ClassificationCounts {
        let decisions = pair_lines(file);

        let old_lines: Vec<u32> = decisions.iter().filter_map(Decision::old_line).collect();
        let authored = match parent {
            Some(revision) if !old_lines.is_empty() => {
                self.resolver
                    .resolve_many(file.blame_path(), &old_lines, revision)
            }
            _ => Default::default(),
        };

        let mut counts = ClassificationCounts::default();
        for decision in &decisions {
            let authored_at = decision.old_line().and_then(|l| authored.get(&l).copied());
            let bucket = match decision {
                Decision::NewFeature { .. } => Bucket::NewFeature,
                Decision::Replaced { .. } | Decision::Deleted { .. } => {
                    self.classifier.classify_resolved(commit_time, authored_at)
                }
            };

            counts.record(bucket);
            if matches!(decision, Decision::Deleted { .. }) {
                counts.removed_only += 1;
            }

            observer.on_line(&LineEvent {
                path: &file.path,
                old_line: decision.old_line(),
                new_line: decision.new_line(),
                authored_at,
                bucket,
            });
        }

        tracing::debug!(
            path = %file.path,
            hunks = file.hunk_count(),
            lookups = old_lines.len(),
            "file analyzed"
        );
        counts
    }
}
