// Job Store clients
//
// HttpJobStore talks to the content backend's REST API. Every request carries
// the `TaskToken` header. DryRunJobStore stands in for it in debug mode: it
// lists nothing, accepts every write and never reaches the network.

use std::time::Duration;

use async_trait::async_trait;
use inventio_core::{
    Job, JobKind, JobState, JobStore, ModelEntry, ModelStatusReport, StoreError,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

const TOKEN_HEADER: &str = "TaskToken";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Job Store backed by the content backend's REST API.
pub struct HttpJobStore {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpJobStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl JobStore for HttpJobStore {
    async fn list_jobs(&self, kind: JobKind, state: JobState) -> Result<Vec<Job>, StoreError> {
        let request = self
            .client
            .get(self.url("jobs/"))
            .query(&[("kind", kind.as_str()), ("state", state.as_str())]);
        self.fetch(request).await
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        debug!(job_key = %job.key(), state = %job.state.as_str(), "Writing job state");
        self.send(self.client.put(self.url("jobs/")).json(job))
            .await
            .map(|_| ())
    }

    async fn list_active_models(&self) -> Result<Vec<ModelEntry>, StoreError> {
        let request = self
            .client
            .get(self.url("llm_models/"))
            .query(&[("active", "true")]);
        self.fetch(request).await
    }

    async fn report_model_status(&self, report: &ModelStatusReport) -> Result<(), StoreError> {
        self.send(self.client.put(self.url("llm_models/")).json(report))
            .await
            .map(|_| ())
    }
}

/// Store used in debug mode.
#[derive(Debug, Default, Clone)]
pub struct DryRunJobStore;

#[async_trait]
impl JobStore for DryRunJobStore {
    async fn list_jobs(&self, _kind: JobKind, _state: JobState) -> Result<Vec<Job>, StoreError> {
        Ok(Vec::new())
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        debug!(job_key = %job.key(), state = %job.state.as_str(), "Dry run: job write skipped");
        Ok(())
    }

    /// Always unavailable so the model bootstrap uses its fallback list.
    async fn list_active_models(&self) -> Result<Vec<ModelEntry>, StoreError> {
        Err(StoreError::Unavailable("debug mode".to_string()))
    }

    async fn report_model_status(&self, report: &ModelStatusReport) -> Result<(), StoreError> {
        debug!(
            model = %format!("{}:{}", report.provider_name, report.model_name),
            active = report.active,
            "Dry run: model status skipped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventio_core::ModelRef;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job_json(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "kind": "generation",
            "state": "pending",
            "model_ref": "openai:gpt-4o",
            "payload": {"brief": "spring sale"}
        })
    }

    #[tokio::test]
    async fn test_list_jobs_sends_filters_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jobs/"))
            .and(query_param("kind", "generation"))
            .and(query_param("state", "pending"))
            .and(header("TaskToken", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([job_json(42)])))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpJobStore::new(format!("{}/api/", server.uri()), "secret").unwrap();
        let jobs = store
            .list_jobs(JobKind::Generation, JobState::Pending)
            .await
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, 42);
        assert_eq!(jobs[0].state, JobState::Pending);
    }

    #[tokio::test]
    async fn test_update_job_puts_full_record() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/jobs/"))
            .and(body_partial_json(json!({"id": 7, "state": "failed"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpJobStore::new(server.uri(), "secret").unwrap();
        let mut job = Job::generation(7, ModelRef::default_model(), json!({}));
        job.transition(JobState::Failed, "boom", chrono::Utc::now());

        store.update_job(&job).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/llm_models/"))
            .and(query_param("active", "true"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let store = HttpJobStore::new(server.uri(), "secret").unwrap();
        match store.list_active_models().await {
            Err(StoreError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let store = HttpJobStore::new(server.uri(), "secret").unwrap();
        let result = store.list_jobs(JobKind::Translation, JobState::Sent).await;
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let store = HttpJobStore::new("http://127.0.0.1:1", "secret").unwrap();
        let result = store.list_jobs(JobKind::Generation, JobState::Sent).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_model_report_payload() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/llm_models/"))
            .and(body_partial_json(json!({
                "provider_name": "anthropic",
                "model_name": "claude-sonnet-4-20250514",
                "active": false
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpJobStore::new(server.uri(), "secret").unwrap();
        let model = ModelRef::new("anthropic", "claude-sonnet-4-20250514");
        store
            .report_model_status(&ModelStatusReport::new(&model, false, "no key"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_store() {
        let store = DryRunJobStore;
        assert!(store
            .list_jobs(JobKind::Generation, JobState::Sent)
            .await
            .unwrap()
            .is_empty());
        assert!(store.list_active_models().await.is_err());
        let job = Job::generation(1, ModelRef::default_model(), json!({}));
        assert!(store.update_job(&job).await.is_ok());
    }
}
