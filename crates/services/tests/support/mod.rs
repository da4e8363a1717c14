#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use assess_core::analysis::{
    FeedbackAnalysis, FeedbackItem, PracticeQuestion, PracticeSet, RecommendationAnalysis,
    StudyRecommendation, WeakTopic,
};
use assess_core::improvement::ImprovementRecord;
use assess_core::model::{
    AnswerOption, Choice, Question, ResultId, StudentId, Submission, SubmissionId, TaskId,
};
use assess_core::practice::PracticeRequest;
use assess_core::reconcile::TopicStatistics;
use assess_core::roadmap::{Day, Phase, Roadmap, Task};
use services::gateway::{FeedbackRequest, ImprovementRequest, RecommendationRequest};
use services::{AnalysisGateway, GatewayError, ProgressGateway};

/// Scripted reply for one fake endpoint.
pub enum Reply<T> {
    Fail,
    Ok(T),
    /// Succeed after sleeping; pairs with paused tokio time.
    After(Duration, T),
}

impl<T> Default for Reply<T> {
    fn default() -> Self {
        Self::Fail
    }
}

impl<T: Clone> Reply<T> {
    async fn resolve(&self) -> Result<T, GatewayError> {
        match self {
            Self::Fail => Err(GatewayError::Unsuccessful("scripted failure".into())),
            Self::Ok(value) => Ok(value.clone()),
            Self::After(delay, value) => {
                tokio::time::sleep(*delay).await;
                Ok(value.clone())
            }
        }
    }
}

/// In-process stand-in for the analysis backend.
#[derive(Default)]
pub struct FakeGateway {
    pub feedback: Reply<FeedbackAnalysis>,
    pub recommendation: Reply<RecommendationAnalysis>,
    pub practice: Reply<PracticeSet>,
    pub improvement: Reply<ImprovementRecord>,
    pub statistics: Reply<TopicStatistics>,
    pub roadmap: Reply<Roadmap>,
    pub fail_mark_evaluated: bool,
    pub fail_task_updates: bool,
    pub calls: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<String>>,
}

impl FakeGateway {
    /// Endpoints called, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Endpoints whose reply was produced, in completion order.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn called(&self, endpoint: &str) -> bool {
        self.calls().iter().any(|c| c == endpoint)
    }

    async fn track<T: Clone>(&self, endpoint: &str, reply: &Reply<T>) -> Result<T, GatewayError> {
        self.calls.lock().unwrap().push(endpoint.to_owned());
        let result = reply.resolve().await;
        self.finished.lock().unwrap().push(endpoint.to_owned());
        result
    }
}

#[async_trait]
impl AnalysisGateway for FakeGateway {
    async fn request_feedback(&self, _request: &FeedbackRequest) -> Result<FeedbackAnalysis, GatewayError> {
        self.track("feedback", &self.feedback).await
    }

    async fn request_recommendation(
        &self,
        _request: &RecommendationRequest,
    ) -> Result<RecommendationAnalysis, GatewayError> {
        self.track("recommendation", &self.recommendation).await
    }

    async fn generate_practice(&self, _request: &PracticeRequest) -> Result<PracticeSet, GatewayError> {
        self.track("practice", &self.practice).await
    }

    async fn evaluate_improvement(
        &self,
        _request: &ImprovementRequest,
    ) -> Result<ImprovementRecord, GatewayError> {
        self.track("improvement", &self.improvement).await
    }
}

#[async_trait]
impl ProgressGateway for FakeGateway {
    async fn topic_statistics(&self, _student_id: &StudentId) -> Result<TopicStatistics, GatewayError> {
        self.track("statistics", &self.statistics).await
    }

    async fn mark_submission_evaluated(&self, submission_id: &SubmissionId) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(format!("evaluated:{submission_id}"));
        if self.fail_mark_evaluated {
            return Err(GatewayError::Unsuccessful("cannot mark".into()));
        }
        Ok(())
    }

    async fn fetch_roadmap(&self, _student_id: &StudentId) -> Result<Roadmap, GatewayError> {
        self.track("roadmap", &self.roadmap).await
    }

    async fn update_task_completion(
        &self,
        _student_id: &StudentId,
        task_id: &TaskId,
        completed: bool,
    ) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(format!("task:{task_id}={completed}"));
        if self.fail_task_updates {
            return Err(GatewayError::Unsuccessful("offline".into()));
        }
        Ok(())
    }
}

//
// ─── FIXTURES ──────────────────────────────────────────────────────────────────
//

fn question(id: &str, topic: &str) -> Question {
    Question {
        id: id.into(),
        text: format!("Question {id}"),
        topic: Some(topic.into()),
        difficulty_level: Some("medium".into()),
        options: vec![
            AnswerOption { id: "a".into(), text: "Right".into() },
            AnswerOption { id: "b".into(), text: "Wrong".into() },
        ],
        correct_option_id: "a".into(),
    }
}

/// `(question id, topic, answered correctly)` rows; every row is answered.
pub fn submission(rows: &[(&str, &str, bool)]) -> Submission {
    Submission {
        id: "sub-1".into(),
        assessment_id: "quiz-1".into(),
        student_id: "student-1".into(),
        student_name: "Minh".into(),
        subject: "Math".into(),
        questions: rows.iter().map(|(id, topic, _)| question(id, topic)).collect(),
        choices: rows
            .iter()
            .map(|(id, _, correct)| Choice {
                question_id: (*id).into(),
                chosen_option_id: if *correct { "a".into() } else { "b".into() },
            })
            .collect(),
    }
}

pub fn feedback_for(submission: &Submission) -> FeedbackAnalysis {
    FeedbackAnalysis {
        result_id: ResultId::new("fb-1"),
        subject: submission.subject.clone(),
        feedback: submission
            .questions
            .iter()
            .map(|q| FeedbackItem {
                question_id: Some(q.id.clone()),
                question: Some(q.text.clone()),
                is_correct: false,
                explanation: format!("Remote explanation for {}", q.id),
                topic: q.topic.clone(),
                difficulty_level: None,
            })
            .collect(),
        summary: None,
    }
}

pub fn recommendation(topics: &[&str]) -> RecommendationAnalysis {
    RecommendationAnalysis {
        result_id: ResultId::new("rec-1"),
        subject: "Math".into(),
        overall_advice: "Focus on fundamentals".into(),
        weak_topics: topics
            .iter()
            .map(|t| WeakTopic {
                topic: (*t).into(),
                percentage: 25.0,
                recommendation: StudyRecommendation::default(),
            })
            .collect(),
    }
}

pub fn practice_set() -> PracticeSet {
    PracticeSet {
        result_id: ResultId::new("pr-1"),
        subject: "Math".into(),
        assignment_id: "asg-1".into(),
        questions: vec![PracticeQuestion {
            question: "Factor x^2-1".into(),
            options: vec!["(x-1)(x+1)".into(), "x(x-1)".into()],
            correct_answer: Some(1),
            topic: Some("Algebra".into()),
            explanation: None,
        }],
    }
}

pub fn roadmap() -> Roadmap {
    Roadmap {
        phases: vec![
            Phase {
                title: "Week 1".into(),
                daily_tasks: vec![Day {
                    day: 1,
                    tasks: vec![Task::new("t1", "Read"), Task::new("t2", "Practice")],
                }],
            },
            Phase {
                title: "Week 2".into(),
                daily_tasks: vec![Day {
                    day: 1,
                    tasks: vec![Task::new("t3", "Quiz"), Task::new("t4", "Review")],
                }],
            },
        ],
    }
}
