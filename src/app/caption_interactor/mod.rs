// Caption interactor - AI captioning of exported artifacts with bounded retries

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::rules::CaptionRule;
use crate::ports::*;

/// Retry, backoff and polling budget for captioning calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles on each further failure
    pub backoff_base: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub video_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 120,
            video_timeout: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt + 1` (zero-based `attempt`)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.min(16))
    }
}

/// Kind of artifact being captioned, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Video,
}

impl ArtifactKind {
    pub fn of(path: &Path) -> Self {
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("png") | Some("jpg") | Some("jpeg") | Some("webp") => ArtifactKind::Image,
            _ => ArtifactKind::Video,
        }
    }
}

/// Builds the structured captioning prompts
pub struct CaptionPrompts;

impl CaptionPrompts {
    fn subject_clause(subject: Option<&str>) -> String {
        match subject.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => format!(
                " The main subject is named {}. Describe {}, including their",
                name, name
            ),
            None => " Describe the main subject(s), including".to_string(),
        }
    }

    pub fn image(subject: Option<&str>) -> String {
        format!(
            "Analyze this image and provide a detailed description suitable for a video caption, \
             covering the following aspects in approximately 80-100 words:\n\
             1.  **Subject:**{} appearance, expression, clothing, and posture.\n\
             2.  **Scene:** Describe the environment, background, and setting.\n\
             3.  **Visual Style:** Describe the overall visual style (e.g., realistic, illustration, photographic style, specific art style if applicable).\n\
             4.  **Atmosphere:** Describe the mood or feeling conveyed (e.g., mysterious, joyful, tense, solemn, vibrant).\n\
             Output only the description.",
            Self::subject_clause(subject)
        )
    }

    pub fn video(subject: Option<&str>) -> String {
        let actor = subject
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("the subject(s)");
        format!(
            "Analyze this video clip and provide a detailed description covering the following aspects \
             in approximately 80-100 words:\n\
             1.  **Subject:**{} appearance, expression, clothing, and posture.\n\
             2.  **Scene:** Describe the environment, background, and setting.\n\
             3.  **Action/Motion:** Describe the key actions or movements performed by {} and any significant camera movement (e.g., push in, pull out, pan, follow, orbit). Use simple, direct verbs.\n\
             4.  **Visual Style:** Describe the overall visual style (e.g., realistic, animated, cinematic, film grain, specific art style if applicable).\n\
             5.  **Atmosphere:** Describe the mood or feeling conveyed (e.g., mysterious, joyful, tense, solemn, vibrant).\n\
             Output only the description.",
            Self::subject_clause(subject),
            actor
        )
    }
}

/// Captions exported artifacts through the remote model
pub struct CaptionService {
    caption_port: Arc<dyn CaptionPort>,
    policy: RetryPolicy,
    subject: Option<String>,
}

impl CaptionService {
    /// Create new caption service with injected port
    pub fn new(caption_port: Arc<dyn CaptionPort>, policy: RetryPolicy, subject: Option<String>) -> Self {
        Self {
            caption_port,
            policy,
            subject,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Caption one artifact; `None` once retries are exhausted or on a permanent error
    pub async fn caption(&self, artifact: &Path) -> Option<String> {
        let result = match ArtifactKind::of(artifact) {
            ArtifactKind::Image => self.caption_image(artifact).await,
            ArtifactKind::Video => self.caption_video(artifact).await,
        };

        match result {
            Ok(raw) => {
                let cleaned = CaptionRule::clean_generated(&raw);
                if cleaned.is_none() {
                    warn!(artifact = %artifact.display(), "Model returned an empty caption");
                }
                cleaned
            }
            Err(failure) => {
                warn!(artifact = %artifact.display(), "Captioning failed: {}", failure);
                None
            }
        }
    }

    async fn caption_image(&self, path: &Path) -> Result<String, CaptionFailure> {
        info!(artifact = %path.display(), "Generating image caption");
        let prompt = CaptionPrompts::image(self.subject.as_deref());
        self.with_retries("image caption", || {
            self.caption_port.generate_from_image(path, &prompt)
        })
        .await
    }

    async fn caption_video(&self, path: &Path) -> Result<String, CaptionFailure> {
        info!(artifact = %path.display(), "Uploading video for description");
        let handle = self
            .with_retries("video upload", || self.caption_port.upload_video(path))
            .await?;

        let outcome = self.describe_upload(&handle).await;

        if let Err(e) = self.caption_port.delete_upload(&handle).await {
            warn!(file = %handle.name, "Failed to delete uploaded file: {}", e);
        } else {
            debug!(file = %handle.name, "Deleted uploaded file");
        }
        outcome
    }

    async fn describe_upload(&self, handle: &UploadHandle) -> Result<String, CaptionFailure> {
        self.wait_until_active(handle).await?;
        let prompt = CaptionPrompts::video(self.subject.as_deref());
        self.with_retries("video description", || {
            self.caption_port
                .generate_from_video(handle, &prompt, self.policy.video_timeout)
        })
        .await
    }

    async fn wait_until_active(&self, handle: &UploadHandle) -> Result<(), CaptionFailure> {
        for poll in 0..self.policy.max_poll_attempts.max(1) {
            let state = self
                .with_retries("upload status", || self.caption_port.poll_status(handle))
                .await?;
            match state {
                UploadState::Active => return Ok(()),
                UploadState::Failed => {
                    return Err(CaptionFailure::Permanent(format!(
                        "Video processing failed for {}",
                        handle.name
                    )))
                }
                UploadState::Processing => {
                    debug!(file = %handle.name, poll, "Waiting for video processing");
                    tokio::time::sleep(self.policy.poll_interval).await;
                }
            }
        }
        Err(CaptionFailure::Transient(format!(
            "Video {} still processing after {} polls",
            handle.name, self.policy.max_poll_attempts
        )))
    }

    /// Run `call` until it succeeds, fails permanently, or the attempt budget runs out
    async fn with_retries<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, CaptionFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CaptionFailure>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.is_transient() && attempt + 1 < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "{} attempt failed: {}",
                        what,
                        failure
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}
