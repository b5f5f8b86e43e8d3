mod app_dirs;
mod received_files;

pub use app_dirs::{config_dir, data_dir, default_shared_dir, APP_DIR_NAME};
pub use received_files::FsReceivedFileStore;
