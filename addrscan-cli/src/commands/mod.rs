//! CLI command implementations

pub mod exchanges;
pub mod scan;

use std::path::PathBuf;

/// Addrscan directory when neither `--dir` nor ADDRSCAN_DIR is given
pub fn default_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".addrscan")
}
