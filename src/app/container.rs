use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{
    AppConfig, FFmpegAdapter, FfmpegVideoOpener, GeminiCaptionAdapter, GeminiSettings,
    JsonSessionAdapter,
};
use crate::app::{
    caption_interactor::{CaptionService, RetryPolicy},
    convert_interactor::ConvertInteractor,
    edit_interactor::EditInteractor,
    export_interactor::ExportOrchestrator,
    inspect_interactor::InspectInteractor,
};
use crate::domain::errors::DomainError;
use crate::ports::{CaptionPort, SessionPort, TranscodePort, VideoOpener};

pub trait AppContainer: Send + Sync {
    fn config(&self) -> &AppConfig;
    fn video_opener(&self) -> Arc<dyn VideoOpener>;
    fn session_port(&self) -> Arc<dyn SessionPort>;
    fn edit_interactor(&self) -> Arc<EditInteractor>;
    fn export_orchestrator(&self) -> Arc<ExportOrchestrator>;
    fn caption_service(&self) -> Arc<CaptionService>;
    fn inspect_interactor(&self) -> Arc<InspectInteractor>;
    fn convert_interactor(&self) -> Arc<ConvertInteractor>;
}

pub struct DefaultAppContainer {
    config: AppConfig,
    video_opener: Arc<dyn VideoOpener>,
    session_port: Arc<dyn SessionPort>,
    edit_interactor: Arc<EditInteractor>,
    export_orchestrator: Arc<ExportOrchestrator>,
    caption_service: Arc<CaptionService>,
    inspect_interactor: Arc<InspectInteractor>,
    convert_interactor: Arc<ConvertInteractor>,
}

impl DefaultAppContainer {
    /// Wire the production adapters described by `config`
    pub fn new(config: AppConfig) -> Result<Self, DomainError> {
        let video_opener = Arc::new(FfmpegVideoOpener::new()?);
        let transcode_port = Arc::new(FFmpegAdapter::new(config.export.ffmpeg.clone()));
        let caption_port = Arc::new(GeminiCaptionAdapter::new(GeminiSettings {
            api_key: config.caption.api_key.clone(),
            model: config.caption.model.clone(),
            base_url: config.caption.base_url.clone(),
            request_timeout: config.caption.request_timeout(),
            upload_timeout: config.caption.video_timeout(),
        }));
        let session_port = Arc::new(JsonSessionAdapter::new(config.session.file.clone()));

        Ok(Self::with_ports(
            config,
            video_opener as Arc<dyn VideoOpener>,
            transcode_port as Arc<dyn TranscodePort>,
            caption_port as Arc<dyn CaptionPort>,
            session_port as Arc<dyn SessionPort>,
        ))
    }

    /// Wire interactors around arbitrary port implementations
    pub fn with_ports(
        config: AppConfig,
        video_opener: Arc<dyn VideoOpener>,
        transcode_port: Arc<dyn TranscodePort>,
        caption_port: Arc<dyn CaptionPort>,
        session_port: Arc<dyn SessionPort>,
    ) -> Self {
        let policy = RetryPolicy {
            max_attempts: config.caption.max_retries,
            backoff_base: Duration::from_secs_f64(config.caption.backoff_base_secs),
            poll_interval: Duration::from_secs_f64(config.caption.poll_interval_secs),
            max_poll_attempts: config.caption.max_poll_attempts,
            video_timeout: config.caption.video_timeout(),
        };
        let caption_service = Arc::new(CaptionService::new(
            Arc::clone(&caption_port),
            policy,
            config.caption.subject.clone(),
        ));

        let edit_interactor = Arc::new(EditInteractor::new(
            Arc::clone(&session_port),
            Arc::clone(&video_opener),
            config.session.default_range_duration,
        ));

        let export_orchestrator = Arc::new(ExportOrchestrator::new(
            Arc::clone(&video_opener),
            Arc::clone(&transcode_port),
            Some(Arc::clone(&caption_service)),
        ));

        let inspect_interactor = Arc::new(InspectInteractor::new(Arc::clone(&video_opener)));
        let convert_interactor = Arc::new(ConvertInteractor::new(Arc::clone(&transcode_port)));

        Self {
            config,
            video_opener,
            session_port,
            edit_interactor,
            export_orchestrator,
            caption_service,
            inspect_interactor,
            convert_interactor,
        }
    }
}

impl AppContainer for DefaultAppContainer {
    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn video_opener(&self) -> Arc<dyn VideoOpener> {
        Arc::clone(&self.video_opener)
    }

    fn session_port(&self) -> Arc<dyn SessionPort> {
        Arc::clone(&self.session_port)
    }

    fn edit_interactor(&self) -> Arc<EditInteractor> {
        Arc::clone(&self.edit_interactor)
    }

    fn export_orchestrator(&self) -> Arc<ExportOrchestrator> {
        Arc::clone(&self.export_orchestrator)
    }

    fn caption_service(&self) -> Arc<CaptionService> {
        Arc::clone(&self.caption_service)
    }

    fn inspect_interactor(&self) -> Arc<InspectInteractor> {
        Arc::clone(&self.inspect_interactor)
    }

    fn convert_interactor(&self) -> Arc<ConvertInteractor> {
        Arc::clone(&self.convert_interactor)
    }
}
