/// Where a changed line ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// An added line with no removal to pair against.
    NewFeature,
    /// Replaced or deleted code that was itself recent.
    Rewrite,
    /// Replaced or deleted code older than the threshold.
    Refactor,
    /// Replaced or deleted code whose authorship could not be looked up.
    Unresolved,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::NewFeature => "new_feature",
            Bucket::Rewrite => "rewrite",
            Bucket::Refactor => "refactor",
            Bucket::Unresolved => "unresolved",
        }
    }
}

/// Applies the age rule to replaced lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    threshold_secs: i64,
}

impl Classifier {
    pub fn new(threshold_secs: u64) -> Self {
        Self {
            threshold_secs: i64::try_from(threshold_secs).unwrap_or(i64::MAX),
        }
    }

    /// `Rewrite` when the line is at most `threshold` old at commit time
    /// (inclusive), `Refactor` otherwise. Both timestamps are epoch seconds.
    pub fn classify(&self, commit_time: i64, authored_at: i64) -> Bucket {
        let age = commit_time.saturating_sub(authored_at);
        if age <= self.threshold_secs {
            Bucket::Rewrite
        } else {
            Bucket::Refactor
        }
    }

    /// Like [`classify`](Self::classify) but tolerating a failed lookup.
    pub fn classify_resolved(&self, commit_time: i64, authored_at: Option<i64>) -> Bucket {
        match authored_at {
            Some(authored_at) => self.classify(commit_time, authored_at),
            None => Bucket::Unresolved,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_THRESHOLD_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 60 * 60;
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_thirty_days_is_inclusive() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(NOW, NOW - 30 * DAY), Bucket::Rewrite);
        assert_eq!(classifier.classify(NOW, NOW - 30 * DAY - 1), Bucket::Refactor);
    }

    #[test]
    fn test_recent_and_old_lines() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(NOW, NOW - 5 * DAY), Bucket::Rewrite);
        assert_eq!(classifier.classify(NOW, NOW - 400 * DAY), Bucket::Refactor);
    }

    #[test]
    fn test_line_authored_after_commit_counts_as_recent() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(NOW, NOW + 60), Bucket::Rewrite);
    }

    #[test]
    fn test_short_threshold() {
        let classifier = Classifier::new(200);
        assert_eq!(classifier.classify(NOW, NOW - 200), Bucket::Rewrite);
        assert_eq!(classifier.classify(NOW, NOW - 201), Bucket::Refactor);
    }

    #[test]
    fn test_unresolved_provenance() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify_resolved(NOW, None), Bucket::Unresolved);
        assert_eq!(
            classifier.classify_resolved(NOW, Some(NOW - DAY)),
            Bucket::Rewrite
        );
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let classifier = Classifier::new(u64::MAX);
        assert_eq!(classifier.classify(i64::MAX, i64::MIN), Bucket::Rewrite);
        assert_eq!(Classifier::new(0).classify(i64::MAX, i64::MIN), Bucket::Refactor);
    }
}
