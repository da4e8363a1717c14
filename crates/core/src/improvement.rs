use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ResultId;
use crate::reconcile::ReconciledAccuracy;

/// Accuracy (percent) at or above which a topic counts as mastered.
pub const MASTERED_THRESHOLD: f64 = 80.0;

/// Accuracy (percent) a positive delta must reach to count as clear progress.
pub const PROGRESS_THRESHOLD: f64 = 50.0;

/// Overall gain (percentage points) above which the UI celebrates.
pub const BREAKTHROUGH_THRESHOLD: f64 = 20.0;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Closed set of per-topic improvement bands.
///
/// Serialized with the labels the analysis backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImprovementStatus {
    #[serde(rename = "Đã vững")]
    Mastered,
    #[serde(rename = "Tiến bộ rõ rệt")]
    ClearProgress,
    #[serde(rename = "Chưa tiến bộ")]
    NoProgress,
    #[serde(rename = "Cần cải thiện")]
    NeedsImprovement,
}

impl ImprovementStatus {
    /// Classify a topic from its new accuracy and delta, both in percent.
    ///
    /// Bands are checked in order: mastered, clear progress, no progress,
    /// needs improvement.
    #[must_use]
    pub fn classify(new_percentage: f64, improvement: f64) -> Self {
        if new_percentage >= MASTERED_THRESHOLD {
            Self::Mastered
        } else if improvement > 0.0 && new_percentage >= PROGRESS_THRESHOLD {
            Self::ClearProgress
        } else if improvement <= 0.0 {
            Self::NoProgress
        } else {
            Self::NeedsImprovement
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Mastered => "Đã vững",
            Self::ClearProgress => "Tiến bộ rõ rệt",
            Self::NoProgress => "Chưa tiến bộ",
            Self::NeedsImprovement => "Cần cải thiện",
        }
    }
}

impl fmt::Display for ImprovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sign of the overall delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Improving,
    Declining,
    Flat,
}

impl Direction {
    #[must_use]
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Self::Improving
        } else if delta < 0.0 {
            Self::Declining
        } else {
            Self::Flat
        }
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Before/after for one topic. Accuracies are percentages (0–100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicImprovement {
    pub topic: String,
    pub previous_accuracy: f64,
    pub new_accuracy: f64,
    pub improvement: f64,
    pub status: ImprovementStatus,
}

impl TopicImprovement {
    /// Build from accuracies in `[0, 1]`.
    ///
    /// The status is classified on exact values; only the stored percentages
    /// are rounded.
    #[must_use]
    pub fn from_accuracies(topic: impl Into<String>, previous: f64, new: f64) -> Self {
        let (previous, new) = (unit(previous), unit(new));
        let exact_new = new * 100.0;
        let exact_delta = (new - previous) * 100.0;
        Self {
            topic: topic.into(),
            previous_accuracy: round2(previous * 100.0),
            new_accuracy: round2(exact_new),
            improvement: round2(exact_delta),
            status: ImprovementStatus::classify(exact_new, exact_delta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallImprovement {
    pub previous_average: f64,
    pub new_average: f64,
    pub improvement: f64,
    pub direction: Direction,
}

impl OverallImprovement {
    #[must_use]
    pub fn from_topics(topics: &[TopicImprovement]) -> Self {
        let previous_average = round2(mean(topics.iter().map(|t| t.previous_accuracy)));
        let new_average = round2(mean(topics.iter().map(|t| t.new_accuracy)));
        let improvement = round2(new_average - previous_average);
        Self {
            previous_average,
            new_average,
            improvement,
            direction: Direction::from_delta(improvement),
        }
    }
}

/// Where an improvement record was computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    #[default]
    Remote,
    Local,
}

/// Result of one improvement evaluation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementRecord {
    pub result_id: ResultId,
    pub subject: String,
    pub topics: Vec<TopicImprovement>,
    pub overall_improvement: OverallImprovement,
    #[serde(default)]
    pub next_action: Option<String>,
    #[serde(default)]
    pub source: RecordSource,
}

impl ImprovementRecord {
    /// True when the overall gain should trigger the motivational message.
    #[must_use]
    pub fn is_breakthrough(&self) -> bool {
        self.overall_improvement.improvement > BREAKTHROUGH_THRESHOLD
    }

    #[must_use]
    pub fn topic(&self, name: &str) -> Option<&TopicImprovement> {
        self.topics.iter().find(|t| t.topic == name)
    }

    /// Topics that are not yet mastered, weakest first.
    #[must_use]
    pub fn topics_needing_work(&self) -> Vec<&TopicImprovement> {
        let mut pending: Vec<_> = self
            .topics
            .iter()
            .filter(|t| t.status != ImprovementStatus::Mastered)
            .collect();
        pending.sort_by(|a, b| a.new_accuracy.total_cmp(&b.new_accuracy));
        pending
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }
}

//
// ─── EVALUATION ────────────────────────────────────────────────────────────────
//

/// Compare previous and new accuracies (both in `[0, 1]`) topic by topic.
///
/// The topic set is driven by `new`; a topic missing from `previous` is
/// compared against `0.0`. The record is tagged as locally computed.
#[must_use]
pub fn evaluate(previous: &IndexMap<String, f64>, new: &IndexMap<String, f64>) -> ImprovementRecord {
    let topics: Vec<_> = new
        .iter()
        .map(|(topic, new)| {
            let prev = previous.get(topic).copied().unwrap_or(0.0);
            TopicImprovement::from_accuracies(topic.clone(), prev, *new)
        })
        .collect();
    let overall_improvement = OverallImprovement::from_topics(&topics);

    let mut record = ImprovementRecord {
        result_id: ResultId::generate(),
        subject: String::new(),
        topics,
        overall_improvement,
        next_action: None,
        source: RecordSource::Local,
    };
    record.next_action = Some(suggest_next_action(&record));
    record
}

#[must_use]
pub fn evaluate_reconciled(reconciled: &ReconciledAccuracy) -> ImprovementRecord {
    evaluate(&reconciled.previous, &reconciled.new)
}

fn suggest_next_action(record: &ImprovementRecord) -> String {
    if record.topics.is_empty() {
        return "Complete a quiz to start tracking progress".to_owned();
    }
    let pending = record.topics_needing_work();
    if pending.is_empty() {
        return "All topics mastered: move on to the next roadmap phase".to_owned();
    }
    let names: Vec<_> = pending.iter().take(3).map(|t| t.topic.as_str()).collect();
    format!("Review and practice: {}", names.join(", "))
}

fn unit(accuracy: f64) -> f64 {
    if accuracy.is_finite() {
        accuracy.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
