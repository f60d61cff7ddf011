//! Dotenv loading.
//!
//! If a dotenv file exists at the resolved path, its pairs are injected
//! into the process environment before configuration resolution.
//! Existing variables are never overridden. A synthetic `HERE` variable
//! holding the dotenv file's directory is available while the file is
//! evaluated (`${HERE}` substitutions), then removed again unless the
//! file itself assigned it.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Load the dotenv file, returning the path actually read, if any.
///
/// `explicit` comes from `CJUNCT_ENV_FILE`; without it `./.env` is used.
#[allow(unsafe_code)]
pub fn load_dotenv(explicit: Option<&Path>) -> Option<PathBuf> {
    let path = explicit.map_or_else(|| PathBuf::from(".env"), Path::to_path_buf);
    if !path.is_file() {
        return None;
    }
    let directory = path
        .canonicalize()
        .ok()
        .and_then(|resolved| resolved.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    // SAFETY: environment mutation happens during single-threaded process
    // startup, before the async runtime and any worker threads exist.
    unsafe {
        std::env::set_var("HERE", &directory);
    }
    let mut here_from_file = false;
    match dotenvy::from_path_iter(&path) {
        Ok(items) => {
            for item in items {
                let Ok((key, value)) = item else {
                    warn!(file = %path.display(), "skipping malformed dotenv entry");
                    continue;
                };
                if key == "HERE" {
                    here_from_file = true;
                }
                if std::env::var_os(&key).is_some() && key != "HERE" {
                    continue;
                }
                // SAFETY: as above, startup only.
                unsafe {
                    std::env::set_var(&key, &value);
                }
            }
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to read dotenv file");
            return None;
        }
    }
    if !here_from_file {
        // SAFETY: as above, startup only.
        unsafe {
            std::env::remove_var("HERE");
        }
    }
    debug!(file = %path.display(), "dotenv loaded");
    Some(path)
}
