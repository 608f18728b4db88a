pub mod controller;
pub mod download_coordinator;
pub mod progress_stream;

pub use controller::{Effect, FileSave, JobController, Msg};
pub use download_coordinator::DownloadCoordinator;
pub use progress_stream::{progress_events, StreamHandle, SubscriptionSlot};
