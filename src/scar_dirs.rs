//! Centralized application directory paths for SCAR.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/scar/` | `~/.local/share/scar/` |
//! | Config | `~/Library/Application Support/scar/` | `~/.config/scar/` |
//!
//! # Environment Overrides
//!
//! - `SCAR_DATA_DIR` overrides [`data_dir`]
//! - `SCAR_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the locally persisted collections and, for the server binary, the
/// remote sync document.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SCAR_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("scar"))
        .unwrap_or_else(|| PathBuf::from("/tmp/scar-data"))
}

/// Application config directory (holds `config.toml`).
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SCAR_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("scar"))
        .unwrap_or_else(|| PathBuf::from("/tmp/scar-config"))
}

/// Client-side collection directory (`data_dir()/local/`).
#[must_use]
pub fn local_store_dir() -> PathBuf {
    data_dir().join("local")
}

/// Server-side sync document (`data_dir()/userdata.json`).
#[must_use]
pub fn remote_data_file() -> PathBuf {
    data_dir().join("userdata.json")
}
