//! Home-directory and history paths.

use std::path::PathBuf;

use directories::BaseDirs;

/// Name of the history file kept in the user's home directory.
pub const HISTORY_FILE_NAME: &str = ".ash_history.txt";

/// The user's home directory.
///
/// Resolved through the platform's base directories, falling back to `/` when
/// no home can be determined (e.g. a service account without `$HOME`).
pub fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Path of the persisted command history.
pub fn history_file() -> PathBuf {
    home_dir().join(HISTORY_FILE_NAME)
}
