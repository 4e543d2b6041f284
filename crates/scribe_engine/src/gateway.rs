use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, Url};
use scribe_logging::scribe_debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    ApiError, ApiErrorKind, ArticleFailure, ArticleResult, ImageAttachment, JobId, JobState,
    RetryAck, StatusSnapshot,
};

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// API root, e.g. `http://127.0.0.1:5000/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The backend job API the reconciler drives.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    /// Whether the document converter the backend needs is configured.
    async fn check_tools(&self) -> Result<bool, ApiError>;

    async fn submit(
        &self,
        topics: &[String],
        images: &BTreeMap<String, ImageAttachment>,
    ) -> Result<JobId, ApiError>;

    async fn status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError>;

    async fn retry(&self, job_id: &str, topics: &[String]) -> Result<RetryAck, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestJobApi {
    base: Url,
    client: reqwest::Client,
}

impl ReqwestJobApi {
    pub fn new(settings: GatewaySettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(ApiErrorKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                ApiErrorKind::InvalidUrl,
                format!("{} cannot be used as an API root", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(ApiErrorKind::Network, err.to_string()))?;
        Ok(Self { base, client })
    }

    /// Public download location for a generated document.
    pub fn download_url(&self, filename: &str) -> Url {
        self.endpoint(&["download", filename])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.error.or(body.message))
                .unwrap_or_else(|| status.to_string());
            let kind = if status == StatusCode::NOT_FOUND {
                ApiErrorKind::NotFound
            } else {
                ApiErrorKind::HttpStatus(status.as_u16())
            };
            return Err(ApiError::new(kind, message));
        }

        serde_json::from_str(&body).map_err(|err| ApiError::new(ApiErrorKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl JobApi for ReqwestJobApi {
    async fn check_tools(&self) -> Result<bool, ApiError> {
        let url = self.endpoint(&["check-pandoc"]);
        let body: ToolCheckBody = self.send(self.client.get(url)).await?;
        Ok(body.pandoc_configured)
    }

    async fn submit(
        &self,
        topics: &[String],
        images: &BTreeMap<String, ImageAttachment>,
    ) -> Result<JobId, ApiError> {
        let request = SubmitBody {
            topics,
            topic_images: images
                .iter()
                .map(|(topic, image)| (topic.as_str(), WireImage::from(image)))
                .collect(),
        };
        let url = self.endpoint(&["generate"]);
        let body: JobIdBody = self.send(self.client.post(url).json(&request)).await?;
        scribe_debug!("Submitted {} topic(s) as job {}", topics.len(), body.task_id);
        Ok(body.task_id)
    }

    async fn status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        let url = self.endpoint(&["generate", "status", job_id]);
        let body: StatusBody = self.send(self.client.get(url)).await?;
        body.into_snapshot()
    }

    async fn retry(&self, job_id: &str, topics: &[String]) -> Result<RetryAck, ApiError> {
        let url = self.endpoint(&["generate", "retry"]);
        let request = RetryBody {
            task_id: job_id,
            topics,
        };
        let body: RetryAckBody = self.send(self.client.post(url).json(&request)).await?;
        Ok(RetryAck {
            job_id: body.task_id,
            superseded: body.new_task,
            message: body.message,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ApiErrorKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(ApiErrorKind::Decode, err.to_string());
    }
    ApiError::new(ApiErrorKind::Network, err.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolCheckBody {
    #[serde(default)]
    pandoc_configured: bool,
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    topics: &'a [String],
    topic_images: BTreeMap<&'a str, WireImage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireImage<'a> {
    Url { url: &'a str },
    Uploaded { path: &'a str },
}

impl<'a> From<&'a ImageAttachment> for WireImage<'a> {
    fn from(image: &'a ImageAttachment) -> Self {
        match image {
            ImageAttachment::Url(url) => WireImage::Url { url },
            ImageAttachment::Uploaded(path) => WireImage::Uploaded { path },
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobIdBody {
    task_id: String,
}

#[derive(Debug, Serialize)]
struct RetryBody<'a> {
    task_id: &'a str,
    topics: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RetryAckBody {
    task_id: String,
    #[serde(default)]
    new_task: bool,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    total: usize,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    results: Vec<ResultBody>,
    #[serde(default)]
    errors: Vec<FailureBody>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    topic: String,
    #[serde(default)]
    article_title: String,
    #[serde(default)]
    filename: String,
}

#[derive(Debug, Deserialize)]
struct FailureBody {
    topic: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    retry_count: u32,
}

impl StatusBody {
    fn into_snapshot(self) -> Result<StatusSnapshot, ApiError> {
        let state = match self.status.as_str() {
            "running" => JobState::Running,
            "completed" => JobState::Completed,
            other => {
                return Err(ApiError::new(
                    ApiErrorKind::Decode,
                    format!("unknown job status {other:?}"),
                ))
            }
        };
        Ok(StatusSnapshot {
            state,
            total: self.total,
            progress: self.progress,
            succeeded: self
                .results
                .into_iter()
                .map(|result| ArticleResult {
                    title: if result.article_title.is_empty() {
                        result.topic.clone()
                    } else {
                        result.article_title
                    },
                    topic: result.topic,
                    filename: result.filename,
                })
                .collect(),
            failed: self
                .errors
                .into_iter()
                .map(|failure| ArticleFailure {
                    topic: failure.topic,
                    error: failure.error,
                    retry_count: failure.retry_count,
                })
                .collect(),
        })
    }
}
