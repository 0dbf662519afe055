mod audio;
mod edit_segment;
mod engines;
mod error;
mod export;
mod health;
mod retranscribe;
mod system;
mod tasks;
mod upload;

pub use audio::audio_handler;
pub use edit_segment::edit_segment_handler;
pub use engines::engines_handler;
pub use error::ErrorResponse;
pub use export::export_handler;
pub use health::health_handler;
pub use retranscribe::retranscribe_handler;
pub use system::system_handler;
pub use tasks::{delete_task_handler, get_task_handler, list_tasks_handler};
pub use upload::upload_handler;
