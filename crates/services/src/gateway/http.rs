use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use assess_core::analysis::{FeedbackAnalysis, PracticeSet, RecommendationAnalysis};
use assess_core::improvement::ImprovementRecord;
use assess_core::model::{StudentId, SubmissionId, TaskId};
use assess_core::practice::PracticeRequest;
use assess_core::reconcile::TopicStatistics;
use assess_core::roadmap::Roadmap;

use super::wire::{
    self, FeedbackRequest, FeedbackResponse, ImprovementRequest, ImprovementResponse,
    PracticeResponse, RecommendationRequest, RecommendationResponse, RoadmapResponse,
    StatisticsBody, TaskCompletionUpdate,
};
use super::{AnalysisGateway, ProgressGateway};
use crate::config::GatewayConfig;
use crate::error::{AppServicesError, GatewayError};

/// `reqwest`-backed gateway. Disabled (every call fails fast) without config.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: Option<GatewayConfig>,
}

impl HttpGateway {
    /// # Errors
    ///
    /// Returns `AppServicesError` if configuration is malformed or the HTTP
    /// client cannot be built.
    pub fn from_env() -> Result<Self, AppServicesError> {
        Self::new(GatewayConfig::from_env()?)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError::Http` if the HTTP client cannot be built.
    pub fn new(config: Option<GatewayConfig>) -> Result<Self, AppServicesError> {
        let mut builder = Client::builder();
        if let Some(config) = &config {
            builder = builder.timeout(config.request_timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&GatewayConfig, GatewayError> {
        self.config.as_ref().ok_or(GatewayError::Disabled)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.as_ref().and_then(|c| c.api_token.as_deref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = self.authorize(request).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.config()?.endpoint(path);
        tracing::debug!(%url, "POST");
        let value = self.send(self.client.post(url).json(body)).await?;
        wire::decode(value)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.config()?.endpoint(path);
        tracing::debug!(%url, "GET");
        let value = self.send(self.client.get(url)).await?;
        wire::decode(value)
    }
}

#[async_trait]
impl AnalysisGateway for HttpGateway {
    async fn request_feedback(&self, request: &FeedbackRequest) -> Result<FeedbackAnalysis, GatewayError> {
        let response: FeedbackResponse = self.post("analysis/feedback", request).await?;
        response.into_analysis(&request.subject)
    }

    async fn request_recommendation(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationAnalysis, GatewayError> {
        let response: RecommendationResponse = self.post("analysis/recommendation", request).await?;
        response.into_analysis(&request.subject)
    }

    async fn generate_practice(&self, request: &PracticeRequest) -> Result<PracticeSet, GatewayError> {
        let response: PracticeResponse = self.post("analysis/practice", request).await?;
        response.into_set(&request.subject, &request.assignment_id)
    }

    async fn evaluate_improvement(
        &self,
        request: &ImprovementRequest,
    ) -> Result<ImprovementRecord, GatewayError> {
        let response: ImprovementResponse = self.post("analysis/improvement", request).await?;
        response.into_record(&request.subject)
    }
}

#[async_trait]
impl ProgressGateway for HttpGateway {
    async fn topic_statistics(&self, student_id: &StudentId) -> Result<TopicStatistics, GatewayError> {
        let body: StatisticsBody = self
            .get(&format!("students/{student_id}/topic-statistics"))
            .await?;
        TopicStatistics::try_from(body)
    }

    async fn mark_submission_evaluated(&self, submission_id: &SubmissionId) -> Result<(), GatewayError> {
        let url = self.config()?.endpoint(&format!("submissions/{submission_id}/evaluated"));
        let value = self.send(self.client.post(url)).await?;
        wire::unwrap_envelope(value).map(|_| ())
    }

    async fn fetch_roadmap(&self, student_id: &StudentId) -> Result<Roadmap, GatewayError> {
        let response: RoadmapResponse = self.get(&format!("students/{student_id}/roadmap")).await?;
        let phases = response.phases.ok_or(GatewayError::MissingField("phases"))?;
        Ok(Roadmap { phases })
    }

    async fn update_task_completion(
        &self,
        student_id: &StudentId,
        task_id: &TaskId,
        completed: bool,
    ) -> Result<(), GatewayError> {
        let url = self
            .config()?
            .endpoint(&format!("students/{student_id}/roadmap/tasks/{task_id}"));
        let body = TaskCompletionUpdate {
            task_id: task_id.clone(),
            completed,
        };
        let value = self.send(self.client.patch(url).json(&body)).await?;
        wire::unwrap_envelope(value).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::SubmissionId;

    #[tokio::test]
    async fn disabled_gateway_fails_fast() {
        let gateway = HttpGateway::new(None).unwrap();
        assert!(!gateway.enabled());

        let err = gateway
            .mark_submission_evaluated(&SubmissionId::new("s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Disabled));

        let err = gateway
            .topic_statistics(&StudentId::new("st"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Disabled));
    }
}
