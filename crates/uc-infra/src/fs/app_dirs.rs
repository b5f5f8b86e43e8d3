use anyhow::{Context, Result};
use std::path::PathBuf;

pub const APP_DIR_NAME: &str = "uniclipboard-share";

/// Platform config directory for the app, e.g. `~/.config/uniclipboard-share`.
///
/// Directories are not created here; callers create them when they write.
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Failed to get platform config directory")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Platform data directory for the app. Holds logs.
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().context("Failed to get platform data directory")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Where received files land when no shared folder is configured.
pub fn default_shared_dir() -> Result<PathBuf> {
    let base = dirs::download_dir()
        .or_else(dirs::home_dir)
        .context("Failed to get download or home directory")?;
    Ok(base.join("UniClipboard Share"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirs_end_with_app_name() {
        if let Ok(dir) = config_dir() {
            assert!(dir.ends_with(APP_DIR_NAME));
        }
        if let Ok(dir) = data_dir() {
            assert!(dir.ends_with(APP_DIR_NAME));
        }
    }
}
