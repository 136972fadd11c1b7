// Gemini caption adapter - Vision-language captioning over the Generative Language REST API

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::ports::*;

/// Public endpoint of the Generative Language API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Connection settings for the Gemini adapter
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Timeout for image requests and file operations
    pub request_timeout: Duration,
    /// Timeout for sending a video to the File API
    pub upload_timeout: Duration,
}

/// Gemini-backed captioning adapter
pub struct GeminiCaptionAdapter {
    settings: Arc<GeminiSettings>,
    agent: ureq::Agent,
}

impl GeminiCaptionAdapter {
    pub fn new(settings: GeminiSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.request_timeout)
            .build();
        Self {
            settings: Arc::new(settings),
            agent,
        }
    }

    /// Run a blocking HTTP exchange off the async executor
    async fn blocking<T, F>(&self, call: F) -> Result<T, CaptionFailure>
    where
        T: Send + 'static,
        F: FnOnce(&ureq::Agent, &GeminiSettings, &str) -> Result<T, CaptionFailure> + Send + 'static,
    {
        let key = self
            .settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CaptionFailure::Permanent("Gemini API key is missing".to_string()))?;
        let agent = self.agent.clone();
        let settings = Arc::clone(&self.settings);

        tokio::task::spawn_blocking(move || call(&agent, &*settings, key.as_str()))
            .await
            .map_err(|e| CaptionFailure::Permanent(format!("Caption worker failed: {}", e)))?
    }
}

#[async_trait]
impl CaptionPort for GeminiCaptionAdapter {
    async fn generate_from_image(
        &self,
        path: &Path,
        prompt: &str,
    ) -> Result<String, CaptionFailure> {
        let path = path.to_path_buf();
        let prompt = prompt.to_string();
        self.blocking(move |agent, settings, key| {
            let bytes = std::fs::read(&path).map_err(|e| {
                CaptionFailure::Permanent(format!("Cannot read {}: {}", path.display(), e))
            })?;
            let body = json!({
                "contents": [{
                    "parts": [
                        { "text": prompt },
                        { "inline_data": { "mime_type": mime_type_for(&path), "data": STANDARD.encode(bytes) } }
                    ]
                }]
            });
            debug!(path = %path.display(), model = %settings.model, "Requesting image caption");
            let request = authorized(agent.post(&generate_url(settings)), key);
            generate(request, body)
        })
        .await
    }

    async fn upload_video(&self, path: &Path) -> Result<UploadHandle, CaptionFailure> {
        let path: PathBuf = path.to_path_buf();
        self.blocking(move |agent, settings, key| {
            let bytes = std::fs::read(&path).map_err(|e| {
                CaptionFailure::Permanent(format!("Cannot read {}: {}", path.display(), e))
            })?;
            let mime_type = mime_type_for(&path);
            let url = format!("{}/upload/v1beta/files?uploadType=media", settings.base_url);
            info!(path = %path.display(), bytes = bytes.len(), "Uploading video for captioning");
            let response = authorized(agent.post(&url), key)
                .timeout(settings.upload_timeout)
                .set("Content-Type", mime_type)
                .send_bytes(&bytes)
                .map_err(classify)?;
            let created: CreateFileResponse = read_json(response)?;
            Ok(UploadHandle {
                name: created.file.name,
                uri: created.file.uri,
                mime_type: created.file.mime_type.unwrap_or_else(|| mime_type.to_string()),
            })
        })
        .await
    }

    async fn poll_status(&self, handle: &UploadHandle) -> Result<UploadState, CaptionFailure> {
        let name = handle.name.clone();
        self.blocking(move |agent, settings, key| {
            let url = format!("{}/v1beta/{}", settings.base_url, name);
            let response = authorized(agent.get(&url), key).call().map_err(classify)?;
            let file: FileResource = read_json(response)?;
            let state = match file.state.as_deref() {
                Some("ACTIVE") => UploadState::Active,
                Some("FAILED") => UploadState::Failed,
                _ => UploadState::Processing,
            };
            debug!(file = %name, ?state, "Upload status");
            Ok(state)
        })
        .await
    }

    async fn generate_from_video(
        &self,
        handle: &UploadHandle,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, CaptionFailure> {
        let handle = handle.clone();
        let prompt = prompt.to_string();
        self.blocking(move |agent, settings, key| {
            let body = json!({
                "contents": [{
                    "parts": [
                        { "text": prompt },
                        { "file_data": { "mime_type": handle.mime_type, "file_uri": handle.uri } }
                    ]
                }]
            });
            let request = authorized(agent.post(&generate_url(settings)), key).timeout(timeout);
            generate(request, body)
        })
        .await
    }

    async fn delete_upload(&self, handle: &UploadHandle) -> Result<(), CaptionFailure> {
        let name = handle.name.clone();
        self.blocking(move |agent, settings, key| {
            let url = format!("{}/v1beta/{}", settings.base_url, name);
            authorized(agent.delete(&url), key).call().map_err(classify)?;
            Ok(())
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct CreateFileResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    mime_type: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn generate_url(settings: &GeminiSettings) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        settings.base_url, settings.model
    )
}

/// Credentials travel in a header so request URLs stay safe to log
fn authorized(request: ureq::Request, key: &str) -> ureq::Request {
    request.set("x-goog-api-key", key)
}

fn generate(request: ureq::Request, body: serde_json::Value) -> Result<String, CaptionFailure> {
    let response = request
        .set("Content-Type", "application/json")
        .send_string(&body.to_string())
        .map_err(classify)?;
    let parsed: GenerateResponse = read_json(response)?;
    extract_text(parsed)
        .ok_or_else(|| CaptionFailure::Permanent("Model response contained no text".to_string()))
}

fn extract_text(response: GenerateResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, CaptionFailure> {
    let body = response
        .into_string()
        .map_err(|e| CaptionFailure::Transient(format!("Failed to read response: {}", e)))?;
    serde_json::from_str(&body)
        .map_err(|e| CaptionFailure::Permanent(format!("Unexpected response: {}", e)))
}

/// Rate limits, timeouts and server errors are worth retrying; other statuses are not
fn classify(error: ureq::Error) -> CaptionFailure {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = format!("HTTP {}: {}", code, body.trim());
            if code == 408 || code == 429 || code >= 500 {
                warn!("Transient caption service error: {}", message);
                CaptionFailure::Transient(message)
            } else {
                CaptionFailure::Permanent(message)
            }
        }
        ureq::Error::Transport(transport) => CaptionFailure::Transient(transport.to_string()),
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        _ => "video/mp4",
    }
}
