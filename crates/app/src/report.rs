//! JSON views printed by the CLI.

use serde::Serialize;

use assess_core::accuracy::AccuracyReport;
use assess_core::analysis::{FeedbackAnalysis, RecommendationAnalysis, TopicBreakdown};
use assess_core::grading::GradedQuestion;
use assess_core::improvement::ImprovementRecord;
use assess_core::model::TaskId;
use assess_core::reconcile::ReconciledAccuracy;
use assess_core::roadmap::RoadmapProgress;
use services::{ImprovementOutcome, StageOutcome, StatisticsSource, SubmissionRun, TaskToggle};

#[derive(Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum StageView<'a, T> {
    Pending,
    Completed(&'a T),
    Degraded(&'a str),
    Skipped,
}

impl<'a, T> From<&'a StageOutcome<T>> for StageView<'a, T> {
    fn from(outcome: &'a StageOutcome<T>) -> Self {
        match outcome {
            StageOutcome::Pending => Self::Pending,
            StageOutcome::Completed(value) => Self::Completed(value),
            StageOutcome::Degraded(reason) => Self::Degraded(reason),
            StageOutcome::Skipped => Self::Skipped,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView<'a> {
    pub submission_id: &'a str,
    pub started_at: String,
    pub state: String,
    pub correct_count: usize,
    pub total_questions: usize,
    pub accuracy_percentage: f64,
    pub questions: &'a [GradedQuestion],
    pub accuracy: &'a AccuracyReport,
    pub topic_breakdown: Option<Vec<TopicBreakdown>>,
    pub feedback: StageView<'a, FeedbackAnalysis>,
    pub recommendation: StageView<'a, RecommendationAnalysis>,
}

impl<'a> RunView<'a> {
    pub fn new(run: &'a SubmissionRun) -> Self {
        let grading = run.grading();
        Self {
            submission_id: run.submission().id.as_str(),
            started_at: run.started_at().to_rfc3339(),
            state: run.state().to_string(),
            correct_count: grading.correct_count(),
            total_questions: grading.questions.len(),
            accuracy_percentage: grading.accuracy() * 100.0,
            questions: &grading.questions,
            accuracy: &grading.report,
            topic_breakdown: run.feedback().completed().and_then(FeedbackAnalysis::topic_breakdown),
            feedback: run.feedback().into(),
            recommendation: run.recommendation().into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationView<'a> {
    pub record: &'a ImprovementRecord,
    pub reconciled: &'a ReconciledAccuracy,
    pub statistics_source: &'static str,
    pub marked_evaluated: bool,
    pub breakthrough: bool,
}

impl<'a> EvaluationView<'a> {
    pub fn new(outcome: &'a ImprovementOutcome) -> Self {
        Self {
            record: &outcome.record,
            reconciled: &outcome.reconciled,
            statistics_source: match outcome.statistics_source {
                StatisticsSource::Remote => "remote",
                StatisticsSource::Cache => "cache",
                StatisticsSource::Empty => "empty",
            },
            marked_evaluated: outcome.marked_evaluated,
            breakthrough: outcome.record.is_breakthrough(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseView<'a> {
    pub title: &'a str,
    pub completed: usize,
    pub total: usize,
    pub complete: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapView<'a> {
    pub completion_percentage: f64,
    pub completed_tasks: Vec<&'a TaskId>,
    pub phases: Vec<PhaseView<'a>>,
    pub toggles: &'a [TaskToggleView],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskToggleView {
    pub task_id: String,
    pub completed: bool,
    pub synced: bool,
}

impl From<TaskToggle> for TaskToggleView {
    fn from(toggle: TaskToggle) -> Self {
        Self {
            task_id: toggle.task_id.to_string(),
            completed: toggle.completed,
            synced: toggle.synced,
        }
    }
}

impl<'a> RoadmapView<'a> {
    pub fn new(progress: &'a RoadmapProgress, toggles: &'a [TaskToggleView]) -> Self {
        let phases = progress
            .roadmap()
            .phases
            .iter()
            .enumerate()
            .map(|(index, phase)| {
                let counts = progress.phase_progress(index);
                PhaseView {
                    title: &phase.title,
                    completed: counts.map_or(0, |c| c.completed),
                    total: counts.map_or(0, |c| c.total),
                    complete: progress.is_phase_complete(index),
                }
            })
            .collect();
        Self {
            completion_percentage: progress.completion_percentage(),
            completed_tasks: progress.completed_ids().collect(),
            phases,
            toggles,
        }
    }
}
