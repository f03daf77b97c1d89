mod classifier;
mod engine;
mod report;

pub use classifier::Classifier;
pub use engine::{Engine, TracingObserver};
pub use report::{aggregate, ClassificationCounts, CommitReport, PushReport};

#[cfg(test)]
pub(crate) use report::sample_commit;
