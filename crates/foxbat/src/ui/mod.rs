//! UI-side logic that sits between the view layer and the channel
//!
//! Nothing here renders; it holds the state a view needs and talks to the
//! backend through [`SystemService`].

mod file_card;
mod presenter;
mod service;

pub use file_card::{FileCard, PreviewState};
pub use presenter::{DEFAULT_PREVIEW_DEADLINE, PLACEHOLDER_IMAGE, Preview, PreviewPresenter};
pub use service::SystemService;
