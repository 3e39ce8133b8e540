//! Cross-platform filesystem conventions (§4.7): resolving the default downloads directory and
//! a scratch root for chunk backing files.

use std::path::PathBuf;

/// Errors resolving a platform-specific directory.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("could not resolve the user's downloads directory")]
    NoDownloadsDir,
    #[error("could not resolve a cache directory for temporary files")]
    NoCacheDir,
}

/// The directory completed downloads are written under, absent an explicit override.
///
/// Falls back to `~/Downloads` (via the OS-appropriate `dirs::download_dir`), and finally to the
/// current directory if the platform can't report one at all.
pub fn default_downloads_dir() -> Result<PathBuf, PlatformError> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .ok_or(PlatformError::NoDownloadsDir)
}

/// The directory chunk backing files are created under, absent an explicit override.
pub fn default_temp_root() -> Result<PathBuf, PlatformError> {
    dirs::cache_dir()
        .map(|dir| dir.join("cascade").join("chunks"))
        .ok_or(PlatformError::NoCacheDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_downloads_dir_resolves_to_something() {
        // Environments running these tests always have a home directory, so this should never
        // fall through to the error case.
        assert!(default_downloads_dir().is_ok());
    }

    #[test]
    fn default_temp_root_is_scoped_under_a_cascade_subdirectory() {
        let path = default_temp_root().unwrap();
        assert!(path.ends_with("cascade/chunks") || path.ends_with("cascade\\chunks"));
    }
}
