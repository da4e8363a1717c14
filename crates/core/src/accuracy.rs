use indexmap::IndexMap;
use serde::Serialize;

use crate::model::Answer;

//
// ─── TALLY ─────────────────────────────────────────────────────────────────────
//

/// Correct/total counts for one topic or difficulty bucket.
///
/// `accuracy` is kept in sync with the counts and is `0.0` for an empty bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicTally {
    topic: String,
    correct_count: u32,
    total_count: u32,
    accuracy: f64,
}

impl TopicTally {
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            correct_count: 0,
            total_count: 0,
            accuracy: 0.0,
        }
    }

    /// Rehydrate from stored counts. `correct` is capped at `total`.
    #[must_use]
    pub fn from_counts(topic: impl Into<String>, correct: u32, total: u32) -> Self {
        let mut tally = Self::new(topic);
        tally.total_count = total;
        tally.correct_count = correct.min(total);
        tally.refresh();
        tally
    }

    pub fn record(&mut self, correct: bool) {
        self.total_count = self.total_count.saturating_add(1);
        if correct {
            self.correct_count = self.correct_count.saturating_add(1);
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        self.accuracy = ratio(self.correct_count, self.total_count);
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Accuracy in `[0, 1]`.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Accuracy on the 0–100 scale.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.accuracy * 100.0
    }
}

/// `correct / total`, or `0.0` when `total` is zero.
#[must_use]
pub fn ratio(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(total)
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Tallies keyed by bucket name, iterated in first-seen order.
///
/// Keys are case-sensitive: `"algebra"` and `"Algebra"` are different buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AccuracySnapshot {
    tallies: IndexMap<String, TopicTally>,
}

impl AccuracySnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, bucket: &str, correct: bool) {
        self.tallies
            .entry(bucket.to_owned())
            .or_insert_with(|| TopicTally::new(bucket))
            .record(correct);
    }

    pub fn insert(&mut self, tally: TopicTally) {
        self.tallies.insert(tally.topic.clone(), tally);
    }

    #[must_use]
    pub fn get(&self, bucket: &str) -> Option<&TopicTally> {
        self.tallies.get(bucket)
    }

    /// Accuracy for `bucket`, `0.0` when absent.
    #[must_use]
    pub fn accuracy_of(&self, bucket: &str) -> f64 {
        self.get(bucket).map_or(0.0, TopicTally::accuracy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicTally> {
        self.tallies.values()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.tallies.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Bucket name to accuracy, preserving first-seen order.
    #[must_use]
    pub fn accuracies(&self) -> IndexMap<String, f64> {
        self.tallies
            .iter()
            .map(|(k, t)| (k.clone(), t.accuracy()))
            .collect()
    }

    #[must_use]
    pub fn total_correct(&self) -> u32 {
        self.iter().map(TopicTally::correct_count).sum()
    }

    #[must_use]
    pub fn total_answered(&self) -> u32 {
        self.iter().map(TopicTally::total_count).sum()
    }
}

impl<'a> IntoIterator for &'a AccuracySnapshot {
    type Item = &'a TopicTally;
    type IntoIter = indexmap::map::Values<'a, String, TopicTally>;

    fn into_iter(self) -> Self::IntoIter {
        self.tallies.values()
    }
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

/// Per-topic accuracy for a list of answers.
///
/// Duplicate question ids are counted twice; callers dedupe if they need to.
#[must_use]
pub fn aggregate(answers: &[Answer]) -> AccuracySnapshot {
    aggregate_by(answers, Answer::topic)
}

/// Per-difficulty accuracy for a list of answers.
#[must_use]
pub fn aggregate_by_difficulty(answers: &[Answer]) -> AccuracySnapshot {
    aggregate_by(answers, Answer::difficulty)
}

fn aggregate_by<F>(answers: &[Answer], bucket: F) -> AccuracySnapshot
where
    F: Fn(&Answer) -> &str,
{
    let mut snapshot = AccuracySnapshot::new();
    for answer in answers {
        snapshot.record(bucket(answer), answer.is_correct());
    }
    snapshot
}

/// Both breakdowns of a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyReport {
    pub by_topic: AccuracySnapshot,
    pub by_difficulty: AccuracySnapshot,
}

impl AccuracyReport {
    #[must_use]
    pub fn from_answers(answers: &[Answer]) -> Self {
        Self {
            by_topic: aggregate(answers),
            by_difficulty: aggregate_by_difficulty(answers),
        }
    }

    /// Overall accuracy across every answer.
    #[must_use]
    pub fn overall_accuracy(&self) -> f64 {
        ratio(self.by_topic.total_correct(), self.by_topic.total_answered())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(topic: Option<&str>, correct: bool) -> Answer {
        let chosen = if correct { "a" } else { "b" };
        Answer::new("q", topic, chosen, "a")
    }

    #[test]
    fn aggregates_per_topic() {
        let answers = vec![
            answer(Some("Algebra"), true),
            answer(Some("Algebra"), false),
            answer(Some("Geometry"), true),
        ];

        let snapshot = aggregate(&answers);

        let algebra = snapshot.get("Algebra").unwrap();
        assert_eq!(algebra.total_count(), 2);
        assert_eq!(algebra.correct_count(), 1);
        assert!((algebra.accuracy() - 0.5).abs() < f64::EPSILON);

        let geometry = snapshot.get("Geometry").unwrap();
        assert_eq!(geometry.total_count(), 1);
        assert_eq!(geometry.correct_count(), 1);
        assert!((geometry.accuracy() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_input_yields_empty_snapshot() {
        let snapshot = aggregate(&[]);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.accuracy_of("Algebra"), 0.0);
    }

    #[test]
    fn blank_answers_count_as_incorrect() {
        let snapshot = aggregate(&[
            Answer::unanswered("1", Some("Geometry"), "a"),
            Answer::unanswered("2", Some("Geometry"), "a"),
        ]);
        let geometry = snapshot.get("Geometry").unwrap();
        assert_eq!(geometry.total_count(), 2);
        assert_eq!(geometry.accuracy(), 0.0);
    }

    #[test]
    fn unattributed_answers_land_in_unknown_bucket() {
        let snapshot = aggregate(&[answer(None, true), answer(Some(""), false)]);
        let unknown = snapshot.get(crate::model::UNKNOWN_TOPIC).unwrap();
        assert_eq!(unknown.total_count(), 2);
        assert_eq!(unknown.correct_count(), 1);
    }

    #[test]
    fn keys_are_case_sensitive_and_first_seen_ordered() {
        let answers = vec![
            answer(Some("geometry"), true),
            answer(Some("Algebra"), true),
            answer(Some("Geometry"), false),
            answer(Some("Algebra"), false),
        ];
        let snapshot = aggregate(&answers);
        let topics: Vec<_> = snapshot.topics().collect();
        assert_eq!(topics, vec!["geometry", "Algebra", "Geometry"]);
    }

    #[test]
    fn bucket_values_are_order_independent() {
        let mut answers = vec![
            answer(Some("Algebra"), true),
            answer(Some("Geometry"), false),
            answer(Some("Algebra"), false),
            answer(Some("Algebra"), true),
        ];
        let forward = aggregate(&answers);
        answers.reverse();
        let backward = aggregate(&answers);

        for tally in &forward {
            let other = backward.get(tally.topic()).unwrap();
            assert_eq!(tally.correct_count(), other.correct_count());
            assert_eq!(tally.total_count(), other.total_count());
        }
    }

    #[test]
    fn duplicate_questions_are_double_counted() {
        let snapshot = aggregate(&[answer(Some("Algebra"), true), answer(Some("Algebra"), true)]);
        assert_eq!(snapshot.get("Algebra").unwrap().total_count(), 2);
    }

    #[test]
    fn accuracy_stays_within_bounds() {
        let answers: Vec<_> = (0..50)
            .map(|i| answer(Some(["A", "B", "C"][i % 3]), i % 4 == 0))
            .collect();
        let snapshot = aggregate(&answers);
        for tally in &snapshot {
            assert!((0.0..=1.0).contains(&tally.accuracy()));
        }
        assert_eq!(TopicTally::new("empty").accuracy(), 0.0);
        assert_eq!(TopicTally::from_counts("x", 5, 0).accuracy(), 0.0);
    }

    #[test]
    fn report_includes_difficulty_breakdown() {
        let answers = vec![
            answer(Some("Algebra"), true).with_difficulty("easy"),
            answer(Some("Algebra"), false).with_difficulty("hard"),
            answer(Some("Geometry"), true).with_difficulty("easy"),
            answer(Some("Geometry"), true),
        ];
        let report = AccuracyReport::from_answers(&answers);

        assert_eq!(report.by_difficulty.get("easy").unwrap().correct_count(), 2);
        assert_eq!(report.by_difficulty.get("hard").unwrap().correct_count(), 0);
        assert_eq!(report.by_difficulty.get("Unknown").unwrap().total_count(), 1);
        assert!((report.overall_accuracy() - 0.75).abs() < f64::EPSILON);
    }
}
