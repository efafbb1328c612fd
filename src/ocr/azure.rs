use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use super::{ImageUpload, JobHandle, OcrFuture, OcrService, Page, PollStatus, StatusReport};
use crate::error::{OcrError, Stage};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";
const ANALYZE_PATH: &str = "/vision/v3.2/read/analyze";

#[derive(Debug, Clone, Default)]
pub struct VisionConfig {
    pub endpoint: String,
    pub key: Option<String>,
    pub language: Option<String>,
}

/// Computer Vision Read API client.
#[derive(Debug, Clone)]
pub struct AzureVision {
    client: reqwest::Client,
    config: VisionConfig,
}

impl AzureVision {
    pub fn new(client: reqwest::Client, config: VisionConfig) -> Self {
        Self { client, config }
    }

    fn key(&self) -> Result<&str, OcrError> {
        self.config
            .key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| OcrError::UpstreamProtocol("AZURE_VISION_KEY is not configured".into()))
    }

    fn analyze_url(&self) -> Result<String, OcrError> {
        let endpoint = self.config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(OcrError::UpstreamProtocol(
                "OCR endpoint is not configured".into(),
            ));
        }
        Ok(format!("{}{}", endpoint, ANALYZE_PATH))
    }

    async fn submit_image(&self, image: &ImageUpload) -> Result<JobHandle, OcrError> {
        let key = self.key()?;
        let url = self.analyze_url()?;
        let mut request = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(CONTENT_TYPE, image.mime())
            .body(image.bytes().to_vec());
        if let Some(language) = self.config.language.as_deref() {
            request = request.query(&[("language", language)]);
        }
        let response = request
            .send()
            .await
            .map_err(|err| OcrError::transport(Stage::Submit, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::status(Stage::Submit, status.as_u16(), &body));
        }
        let handle = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                OcrError::UpstreamProtocol(format!(
                    "submission returned {} without an Operation-Location header",
                    status
                ))
            })?;
        debug!("OCR job accepted ({} bytes, {})", image.bytes().len(), image.mime());
        Ok(JobHandle::new(handle))
    }

    async fn poll_job(&self, handle: &JobHandle) -> Result<StatusReport, OcrError> {
        let key = self.key()?;
        let response = self
            .client
            .get(handle.as_str())
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .send()
            .await
            .map_err(|err| OcrError::transport(Stage::Poll, err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| OcrError::transport(Stage::Poll, err))?;
        if !status.is_success() {
            return Err(OcrError::status(Stage::Poll, status.as_u16(), &body));
        }
        parse_read_operation(&body)
    }
}

impl OcrService for AzureVision {
    fn submit<'a>(&'a self, image: &'a ImageUpload) -> OcrFuture<'a, JobHandle> {
        Box::pin(self.submit_image(image))
    }

    fn poll<'a>(&'a self, handle: &'a JobHandle) -> OcrFuture<'a, StatusReport> {
        Box::pin(self.poll_job(handle))
    }
}

pub(crate) fn parse_read_operation(body: &str) -> Result<StatusReport, OcrError> {
    let payload: ReadOperation = serde_json::from_str(body)
        .map_err(|err| OcrError::UpstreamProtocol(format!("malformed poll response: {}", err)))?;
    let status = payload
        .status
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| OcrError::UpstreamProtocol("poll response has no status".into()))?;
    let pages = payload.analyze_result.map(|result| {
        result
            .read_results
            .into_iter()
            .map(|page| Page {
                lines: page.lines.into_iter().map(|line| line.text).collect(),
            })
            .collect()
    });
    Ok(StatusReport {
        status: PollStatus::parse(&status),
        pages,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperation {
    status: Option<String>,
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    #[serde(default)]
    text: String,
}
