mod history_loader;
mod local_task_store;
mod task_record;

pub use history_loader::{
    HistoryLoadError, INTERRUPTED_ERROR, MISSING_RESULT_ERROR, load_history, load_task_dir,
};
pub use local_task_store::LocalTaskStore;
pub use task_record::{META_FILE, RESULT_FILE, TaskLayout, TaskMeta, WAV_FILE};
