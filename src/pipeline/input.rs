//! Input resolution: normalise user-supplied screenshot paths and URLs.
//!
//! Local screenshots are checked for existence, read permission and a
//! decodable image header up front, so a typo fails the run before any
//! inference money is spent. URLs are downloaded into one `TempDir` per run;
//! [`ResolvedScreenshots`] keeps it alive until the run finishes.

use crate::error::ComposeError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// Local paths for every screenshot of a run, in input order.
pub struct ResolvedScreenshots {
    paths: Vec<PathBuf>,
    _temp_dir: Option<TempDir>,
}

impl ResolvedScreenshots {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve every screenshot to a readable local image file.
pub async fn resolve_screenshots(
    inputs: &[String],
    timeout_secs: u64,
) -> Result<ResolvedScreenshots, ComposeError> {
    let temp_dir = if inputs.iter().any(|i| is_url(i)) {
        Some(TempDir::new().map_err(|e| ComposeError::Internal(e.to_string()))?)
    } else {
        None
    };
    let mut paths = Vec::with_capacity(inputs.len());

    for (i, input) in inputs.iter().enumerate() {
        let path = match &temp_dir {
            Some(dir) if is_url(input) => {
                download_screenshot(input, i, dir.path(), timeout_secs).await?
            }
            _ => PathBuf::from(input),
        };
        validate_image(&path)?;
        paths.push(path);
    }

    Ok(ResolvedScreenshots {
        paths,
        _temp_dir: temp_dir,
    })
}

/// Validate that `path` exists, is readable, and has a PNG/JPEG header.
pub fn validate_image(path: &Path) -> Result<(), ComposeError> {
    if !path.exists() {
        return Err(ComposeError::ScreenshotNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut header = [0u8; 16];
    let read = std::fs::File::open(path).and_then(|mut f| f.read(&mut header));
    let n = match read {
        Ok(n) => n,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ComposeError::ScreenshotNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(ComposeError::NotAnImage {
                path: path.to_path_buf(),
                detail: e.to_string(),
            });
        }
    };

    match image::guess_format(&header[..n]) {
        Ok(image::ImageFormat::Png) | Ok(image::ImageFormat::Jpeg) => {
            debug!("Resolved screenshot: {}", path.display());
            Ok(())
        }
        Ok(other) => Err(ComposeError::NotAnImage {
            path: path.to_path_buf(),
            detail: format!("unsupported format {other:?}"),
        }),
        Err(e) => Err(ComposeError::NotAnImage {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }),
    }
}

async fn download_screenshot(
    url: &str,
    position: usize,
    dir: &Path,
    timeout_secs: u64,
) -> Result<PathBuf, ComposeError> {
    info!("Downloading screenshot from: {}", url);

    let failed = |reason: String| ComposeError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    // Prefix with the input position so two URLs ending in the same file
    // name cannot overwrite each other.
    let file_path = dir.join(format!("{position:02}_{}", file_name_from_url(url)));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ComposeError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded to: {}", file_path.display());
    Ok(file_path)
}

/// Last path segment of `url` when it looks like a file name.
fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "screenshot.png".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.png"));
        assert!(is_url("http://example.com/a.png"));
        assert!(!is_url("/tmp/a.png"));
        assert!(!is_url("a.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn file_name_falls_back() {
        assert_eq!(file_name_from_url("https://x.io/shots/home.png"), "home.png");
        assert_eq!(file_name_from_url("https://x.io/shots/"), "screenshot.png");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_screenshots(&["/definitely/not/here.png".to_string()], 5)
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, ComposeError::ScreenshotNotFound { .. }));
    }

    #[tokio::test]
    async fn text_file_is_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.png");
        std::fs::write(&p, "just text").unwrap();
        let err = resolve_screenshots(&[p.to_string_lossy().into_owned()], 5)
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, ComposeError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn local_png_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("shot.png");
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])).save(&p).unwrap();
        let resolved = resolve_screenshots(&[p.to_string_lossy().into_owned()], 5)
            .await
            .unwrap();
        assert_eq!(resolved.paths(), &[p]);
    }
}
