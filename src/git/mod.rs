mod blame;
mod diff;
mod repository;

pub use blame::{BlameResolver, ProvenanceResolver};
pub use diff::{parse_unified_diff, DiffLineType, FileDiff};
pub use repository::Repository;

#[cfg(test)]
pub(crate) use repository::test_support;
