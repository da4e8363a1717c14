use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::accuracy::AccuracySnapshot;

/// Historical per-topic accuracy for one student, the "previous results" baseline.
///
/// Values are clamped into `[0, 1]`; non-finite values are stored as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicStatistics {
    accuracies: HashMap<String, f64>,
}

impl TopicStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, topic: impl Into<String>, accuracy: f64) {
        self.accuracies.insert(topic.into(), sanitize(accuracy));
    }

    #[must_use]
    pub fn get(&self, topic: &str) -> Option<f64> {
        self.accuracies.get(topic).copied().map(sanitize)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accuracies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accuracies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.accuracies.iter().map(|(k, v)| (k.as_str(), sanitize(*v)))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for TopicStatistics {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut stats = Self::new();
        for (topic, accuracy) in iter {
            stats.insert(topic, accuracy);
        }
        stats
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Paired previous/new accuracy for exactly the topics of the latest session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciledAccuracy {
    pub previous: IndexMap<String, f64>,
    pub new: IndexMap<String, f64>,
}

impl ReconciledAccuracy {
    /// `(topic, previous, new)` in the new snapshot's order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.new.iter().map(|(topic, new)| {
            let previous = self.previous.get(topic).copied().unwrap_or(0.0);
            (topic.as_str(), previous, *new)
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
    }
}

/// Pair each topic of `latest` with its historical accuracy.
///
/// Topics without history get a previous accuracy of `0.0`. Topics that only
/// exist in history are left out: the comparison covers what was just exercised.
#[must_use]
pub fn reconcile(latest: &AccuracySnapshot, history: &TopicStatistics) -> ReconciledAccuracy {
    let mut reconciled = ReconciledAccuracy::default();
    for tally in latest {
        let topic = tally.topic().to_owned();
        let previous = history.get(&topic).unwrap_or(0.0);
        reconciled.previous.insert(topic.clone(), previous);
        reconciled.new.insert(topic, tally.accuracy());
    }
    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accuracy::TopicTally;

    fn snapshot(entries: &[(&str, u32, u32)]) -> AccuracySnapshot {
        let mut snapshot = AccuracySnapshot::new();
        for (topic, correct, total) in entries {
            snapshot.insert(TopicTally::from_counts(*topic, *correct, *total));
        }
        snapshot
    }

    #[test]
    fn missing_history_defaults_to_zero() {
        let latest = snapshot(&[("Algebra", 3, 5)]);
        let reconciled = reconcile(&latest, &TopicStatistics::new());

        assert_eq!(reconciled.previous["Algebra"], 0.0);
        assert!((reconciled.new["Algebra"] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn history_only_topics_are_excluded() {
        let latest = snapshot(&[("Algebra", 1, 2)]);
        let history: TopicStatistics = [("Algebra", 0.25), ("Geometry", 0.9)].into_iter().collect();

        let reconciled = reconcile(&latest, &history);
        assert_eq!(reconciled.previous.len(), 1);
        assert_eq!(reconciled.new.len(), 1);
        assert!(!reconciled.previous.contains_key("Geometry"));
        assert!((reconciled.previous["Algebra"] - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn pairs_follow_latest_order() {
        let latest = snapshot(&[("Physics", 1, 1), ("Algebra", 0, 1)]);
        let history: TopicStatistics = [("Algebra", 0.5)].into_iter().collect();
        let reconciled = reconcile(&latest, &history);

        let pairs: Vec<_> = reconciled.pairs().collect();
        assert_eq!(pairs, vec![("Physics", 0.0, 1.0), ("Algebra", 0.5, 0.0)]);
    }

    #[test]
    fn statistics_are_sanitized() {
        let stats: TopicStatistics = [("a", 1.5), ("b", -0.2), ("c", f64::NAN)]
            .into_iter()
            .collect();
        assert_eq!(stats.get("a"), Some(1.0));
        assert_eq!(stats.get("b"), Some(0.0));
        assert_eq!(stats.get("c"), Some(0.0));
    }

    #[test]
    fn empty_snapshot_reconciles_to_empty() {
        let history: TopicStatistics = [("Algebra", 0.4)].into_iter().collect();
        assert!(reconcile(&AccuracySnapshot::new(), &history).is_empty());
    }

    #[test]
    fn deserializes_plain_topic_map() {
        let stats: TopicStatistics = serde_json::from_str(r#"{"Algebra":0.7}"#).unwrap();
        assert_eq!(stats.get("Algebra"), Some(0.7));
    }
}
