//! Retrieval of raster bytes from local paths and HTTP URLs.

use std::fmt;
use std::path::PathBuf;

use flowmap_core::RasterError;

/// Where a raster is fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocation {
    /// Local filesystem path, given directly or as a `file://` URL.
    File(PathBuf),
    /// `http://` or `https://` URL.
    Http(String),
}

impl SourceLocation {
    /// Classifies a path or URL.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            SourceLocation::Http(location.to_owned())
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            SourceLocation::File(PathBuf::from(path))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::File(path) => write!(f, "{}", path.display()),
            SourceLocation::Http(url) => f.write_str(url),
        }
    }
}

/// Fetches the complete raster file.
pub async fn fetch(location: &SourceLocation) -> Result<Vec<u8>, RasterError> {
    let unavailable = |reason: String| RasterError::SourceUnavailable {
        location: location.to_string(),
        reason,
    };

    match location {
        SourceLocation::File(path) => tokio::fs::read(path)
            .await
            .map_err(|error| unavailable(error.to_string())),
        SourceLocation::Http(url) => {
            let response = reqwest::get(url)
                .await
                .map_err(|error| unavailable(error.to_string()))?;
            if !response.status().is_success() {
                return Err(unavailable(format!(
                    "request failed with status: {}",
                    response.status()
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|error| unavailable(error.to_string()))?;
            Ok(bytes.to_vec())
        }
    }
}
