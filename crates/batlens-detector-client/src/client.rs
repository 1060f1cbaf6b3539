//! Detection service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use batlens_models::{AnalysisResult, AnalyzeResponse, HealthResponse};

use crate::error::{DetectorError, DetectorResult};
use crate::service::DetectionService;
use crate::types::AnalyzeUpload;

/// Configuration for the detector client.
#[derive(Debug, Clone)]
pub struct DetectorClientConfig {
    /// Base URL of detection service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries on transport errors
    pub max_retries: u32,
}

impl Default for DetectorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(300), // whole-video analysis can be slow
            max_retries: 2,
        }
    }
}

impl DetectorClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DETECTOR_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            timeout: Duration::from_secs(
                std::env::var("DETECTOR_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_retries: std::env::var("DETECTOR_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }

    fn endpoint(&self, path: &str) -> DetectorResult<Url> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| DetectorError::Config(format!("{}: {}", self.base_url, e)))?;
        base.join(path)
            .map_err(|e| DetectorError::Config(format!("{}: {}", path, e)))
    }
}

/// Client for the detection service.
pub struct DetectorClient {
    http: Client,
    config: DetectorClientConfig,
}

impl DetectorClient {
    /// Create a new detector client.
    pub fn new(config: DetectorClientConfig) -> DetectorResult<Self> {
        // Fail early on a malformed base URL rather than on first use.
        config.endpoint("/")?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectorError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectorResult<Self> {
        Self::new(DetectorClientConfig::from_env())
    }

    pub fn config(&self) -> &DetectorClientConfig {
        &self.config
    }

    /// Check if the detection service is healthy.
    pub async fn health_check(&self) -> bool {
        match self.health().await {
            Ok(health) => health.is_healthy(),
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                false
            }
        }
    }

    async fn fetch_health(&self) -> DetectorResult<HealthResponse> {
        let url = self.config.endpoint("/health")?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        // A 503 still carries a health document describing what is down.
        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        match serde_json::from_str::<HealthResponse>(&body) {
            Ok(health) => Ok(health),
            Err(_) if !status.is_success() => Err(DetectorError::ServiceUnavailable(format!(
                "health probe returned {}",
                status
            ))),
            Err(e) => Err(DetectorError::Json(e)),
        }
    }

    async fn submit(&self, upload: &AnalyzeUpload) -> DetectorResult<AnalysisResult> {
        let url = self.config.endpoint("/analyze")?;
        let video = tokio::fs::read(&upload.video_path).await?;

        debug!(
            "Uploading {} ({} bytes, {:.2}s..{:?}) to {}",
            upload.file_name,
            video.len(),
            upload.start_time,
            upload.end_time,
            url
        );

        let response = self
            .with_retry(|| {
                let form = build_form(upload, video.clone());
                let request = self.http.post(url.clone());
                async move {
                    request
                        .multipart(form?)
                        .send()
                        .await
                        .map_err(|e| self.classify(e))
                }
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::ServiceUnavailable(format!(
                "detection service returned {}: {}",
                status, body
            )));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let envelope: AnalyzeResponse = serde_json::from_str(&body)
            .map_err(|e| DetectorError::InvalidResponse(format!("undecodable analysis document: {}", e)))?;
        into_result(envelope)
    }

    fn classify(&self, err: reqwest::Error) -> DetectorError {
        if err.is_timeout() {
            DetectorError::Timeout(self.config.timeout.as_secs())
        } else {
            DetectorError::Network(err)
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> DetectorResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DetectorResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Detection request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DetectorError::ServiceUnavailable("no attempts made".to_string())))
    }
}

#[async_trait]
impl DetectionService for DetectorClient {
    async fn health(&self) -> DetectorResult<HealthResponse> {
        self.fetch_health().await
    }

    async fn analyze(&self, upload: &AnalyzeUpload) -> DetectorResult<AnalysisResult> {
        let result = self.submit(upload).await?;
        info!(
            "Detection service analyzed {} frames, {} detections",
            result.total_frames, result.detection_count
        );
        Ok(result)
    }
}

fn build_form(upload: &AnalyzeUpload, video: Vec<u8>) -> DetectorResult<Form> {
    let part = Part::bytes(video)
        .file_name(upload.file_name.clone())
        .mime_str(upload.content_type())
        .map_err(DetectorError::Network)?;

    let mut form = Form::new()
        .part("file", part)
        .text("start_time", upload.start_time.to_string())
        .text("upload_sensitivity", upload.upload_sensitivity.to_string());

    if let Some(end) = upload.end_time {
        form = form.text("end_time", end.to_string());
    }

    Ok(form)
}

fn into_result(envelope: AnalyzeResponse) -> DetectorResult<AnalysisResult> {
    if !envelope.success {
        return Err(DetectorError::Application {
            message: envelope.message,
            errors: envelope.errors.unwrap_or_default(),
        });
    }

    if let Some(errors) = envelope.errors.as_ref().filter(|e| !e.is_empty()) {
        warn!("Analysis completed with {} warnings", errors.len());
    }

    let data = envelope
        .data
        .ok_or_else(|| DetectorError::InvalidResponse("success response without data".to_string()))?;

    if !data.is_frame_ordered() {
        return Err(DetectorError::InvalidResponse(
            "positions or movements are not ordered by frame".to_string(),
        ));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result_json(detections: u64) -> serde_json::Value {
        json!({
            "totalFrames": 90,
            "batDetected": detections > 0,
            "detectionCount": detections,
            "startPoint": {"x": 1, "y": 2},
            "endPoint": {"x": 3, "y": 4},
            "analysisTime": "00:01",
            "fps": 30.0,
            "videoDuration": 3.0,
            "positions": [],
            "movementsPerFrame": []
        })
    }

    fn client_for(server: &MockServer) -> DetectorClient {
        DetectorClient::new(DetectorClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap()
    }

    fn video_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        file.write_all(b"not really a video").unwrap();
        file
    }

    #[test]
    fn test_config_defaults() {
        let config = DetectorClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_rejects_malformed_base_url() {
        let config = DetectorClientConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(DetectorClient::new(config), Err(DetectorError::Config(_))));
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_string_contains("upload_sensitivity"))
            .and(body_string_contains("end_time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Analysis completed successfully",
                "data": result_json(42)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let video = video_file();
        let upload = AnalyzeUpload::new(video.path())
            .with_range(0.0, Some(3.0))
            .with_sensitivity(0.5);

        let result = client_for(&server).analyze(&upload).await.unwrap();
        assert_eq!(result.detection_count, 42);
    }

    #[tokio::test]
    async fn test_analyze_application_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Video analysis failed",
                "errors": ["could not open video"]
            })))
            .mount(&server)
            .await;

        let video = video_file();
        let err = client_for(&server)
            .analyze(&AnalyzeUpload::new(video.path()))
            .await
            .unwrap_err();

        assert!(err.is_application());
        if let DetectorError::Application { errors, .. } = err {
            assert_eq!(errors, vec!["could not open video".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_analyze_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let video = video_file();
        let err = client_for(&server)
            .analyze(&AnalyzeUpload::new(video.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, DetectorError::ServiceUnavailable(_)));
        assert!(!err.is_application());
    }

    #[tokio::test]
    async fn test_analyze_fractional_positions() {
        let server = MockServer::start().await;
        let mut data = result_json(2);
        data["startPoint"] = json!({"x": 101.5, "y": 48.0});
        data["endPoint"] = json!({"x": 109.5, "y": 45.5});
        data["positions"] = json!([
            {"frame": 30, "x": 101.5, "y": 48.0, "width": 20.0, "height": 13.0, "timestamp": "00:00:01"},
            {"frame": 31, "x": 109.5, "y": 45.5, "width": 18.0, "height": 12.0, "timestamp": "00:00:01"}
        ]);
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Analysis completed successfully",
                "data": data
            })))
            .mount(&server)
            .await;

        let video = video_file();
        let result = client_for(&server)
            .analyze(&AnalyzeUpload::new(video.path()))
            .await
            .unwrap();

        assert_eq!(result.positions.len(), 2);
        assert_eq!(result.positions[0].x, 101.5);
        assert_eq!(result.positions[1].width, 18.0);
        assert_eq!(result.end_point.map(|p| p.y), Some(45.5));
    }

    #[tokio::test]
    async fn test_unordered_positions_are_invalid() {
        let server = MockServer::start().await;
        let mut data = result_json(2);
        data["positions"] = json!([
            {"frame": 9, "x": 1.0, "y": 1.0, "width": 4.0, "height": 4.0, "timestamp": "00:00:00"},
            {"frame": 2, "x": 2.0, "y": 2.0, "width": 4.0, "height": 4.0, "timestamp": "00:00:00"}
        ]);
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "ok",
                "data": data
            })))
            .mount(&server)
            .await;

        let video = video_file();
        let err = client_for(&server)
            .analyze(&AnalyzeUpload::new(video.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_undecodable_document_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "ok",
                "data": {"totalFrames": "many"}
            })))
            .mount(&server)
            .await;

        let video = video_file();
        let err = client_for(&server)
            .analyze(&AnalyzeUpload::new(video.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_success_without_data_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "message": "ok"})),
            )
            .mount(&server)
            .await;

        let video = video_file();
        let err = client_for(&server)
            .analyze(&AnalyzeUpload::new(video.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_video_is_io_error() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .analyze(&AnalyzeUpload::new("/definitely/missing.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::Io(_)));
    }

    #[tokio::test]
    async fn test_health_degraded_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "status": "unhealthy",
                "error": "detector missing",
                "timestamp": 1.0
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let health = client.health().await.unwrap();
        assert_eq!(health.status(), "unhealthy");
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_health_unreachable() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        drop(server);

        assert!(!client.health_check().await);
    }
}
