// Application layer - Use case interactors

pub mod caption_interactor;
pub mod container;
pub mod convert_interactor;
pub mod edit_interactor;
pub mod export_interactor;
pub mod inspect_interactor;
pub mod playback_interactor;

// Re-export interactors
pub use caption_interactor::{CaptionService, RetryPolicy};
pub use container::{AppContainer, DefaultAppContainer};
pub use convert_interactor::ConvertInteractor;
pub use edit_interactor::EditInteractor;
pub use export_interactor::ExportOrchestrator;
pub use inspect_interactor::InspectInteractor;
pub use playback_interactor::PlaybackController;
