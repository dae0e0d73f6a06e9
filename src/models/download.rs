//! Model download and installation management.
//!
//! Handles downloading Whisper models from HuggingFace, verifying their
//! integrity, and storing them in the user's cache directory. Download
//! progress is reported both as an optional terminal progress bar and as a
//! numeric callback the transcription pipeline feeds into its progress blend.

use crate::error::{Result, ScrivError};
use crate::models::catalog::{ModelInfo, get_model};
use std::fs;
use std::path::PathBuf;

#[cfg(feature = "model-download")]
use futures_util::StreamExt;
#[cfg(feature = "model-download")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "model-download")]
use sha1::{Digest, Sha1};
#[cfg(feature = "model-download")]
use std::io::Write;
#[cfg(feature = "model-download")]
use std::path::Path;

/// Numeric download-progress callback in [0, 1].
pub type DownloadProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Get the directory where models are stored.
///
/// Uses `~/.cache/scriv/models/` on Linux/Unix.
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("scriv")
        .join("models")
}

/// Get the full path for a model file.
///
/// Always returns a path regardless of whether the model is in the catalog.
/// The file may or may not exist on disk.
pub fn model_path(name: &str) -> PathBuf {
    let resolved = crate::models::catalog::resolve_name(name);
    let filename = format!("ggml-{resolved}.bin");
    models_dir().join(filename)
}

/// Check if a model is installed.
pub fn is_model_installed(name: &str) -> bool {
    model_path(name).exists()
}

/// Makes a model resident, downloading it if necessary.
///
/// On a cache hit the callback immediately receives 1.0. Otherwise the model
/// is streamed from HuggingFace with incremental progress, verified against
/// its catalog checksum, and installed into the cache.
///
/// # Errors
///
/// Returns `ScrivError::ModelUnavailable` if the model is unknown, the
/// download fails, or the checksum does not match.
pub async fn ensure_model(
    name: &str,
    on_progress: Option<DownloadProgress<'_>>,
    show_bar: bool,
) -> Result<PathBuf> {
    let path = model_path(name);
    if path.exists() {
        if let Some(progress) = on_progress {
            progress(1.0);
        }
        return Ok(path);
    }

    let info = get_model(name).ok_or_else(|| ScrivError::ModelUnavailable {
        message: format!(
            "Model '{name}' is not in the catalog.\n\
             Run 'scriv models list' to see available models."
        ),
    })?;

    fetch_model(info, &path, on_progress, show_bar).await?;
    if let Some(progress) = on_progress {
        progress(1.0);
    }
    Ok(path)
}

#[cfg(feature = "model-download")]
async fn fetch_model(
    info: &ModelInfo,
    output_path: &Path,
    on_progress: Option<DownloadProgress<'_>>,
    show_bar: bool,
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ScrivError::ModelUnavailable {
            message: format!("Failed to create models directory: {e}"),
        })?;
    }

    if show_bar {
        eprintln!("Downloading {} ({} MB)...", info.name, info.size_mb);
    }

    let client = reqwest::Client::new();
    let response = client
        .get(info.url())
        .send()
        .await
        .map_err(|e| ScrivError::ModelUnavailable {
            message: format!("Failed to start download: {e}"),
        })?;

    if !response.status().is_success() {
        return Err(ScrivError::ModelUnavailable {
            message: format!("Download failed with status: {}", response.status()),
        });
    }

    let total_size = response.content_length().unwrap_or(0);

    let bar = if show_bar {
        let bar = ProgressBar::new(total_size);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Some(bar)
    } else {
        None
    };

    // Stream to disk, hashing as we go.
    let mut hasher = Sha1::new();
    let mut stream = response.bytes_stream();
    let mut file = fs::File::create(output_path).map_err(|e| ScrivError::ModelUnavailable {
        message: format!("Failed to create output file: {e}"),
    })?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ScrivError::ModelUnavailable {
            message: format!("Failed to read download chunk: {e}"),
        })?;

        file.write_all(&chunk)
            .map_err(|e| ScrivError::ModelUnavailable {
                message: format!("Failed to write to file: {e}"),
            })?;

        hasher.update(&chunk);
        downloaded += chunk.len() as u64;

        if let Some(ref bar) = bar {
            bar.inc(chunk.len() as u64);
        }
        if let (Some(progress), true) = (on_progress, total_size > 0) {
            progress(downloaded as f64 / total_size as f64);
        }
    }

    if let Some(bar) = bar {
        bar.finish_with_message("Downloaded");
    }

    // Verify SHA-1 checksum
    if !info.sha1.is_empty() {
        let calculated = format!("{:x}", hasher.finalize());
        if calculated != info.sha1 {
            if let Err(e) = fs::remove_file(output_path) {
                eprintln!("scriv: failed to remove corrupted download: {e}");
            }
            return Err(ScrivError::ModelUnavailable {
                message: format!(
                    "SHA-1 checksum mismatch. Expected: {}, got: {calculated}",
                    info.sha1
                ),
            });
        }
        if show_bar {
            eprintln!("Checksum verified");
        }
    }

    if show_bar {
        eprintln!("Model installed to: {}", output_path.display());
    }

    Ok(())
}

#[cfg(not(feature = "model-download"))]
async fn fetch_model(
    info: &ModelInfo,
    _output_path: &std::path::Path,
    _on_progress: Option<DownloadProgress<'_>>,
    _show_bar: bool,
) -> Result<()> {
    Err(ScrivError::ModelUnavailable {
        message: format!(
            "Model '{}' is not installed and this build cannot download it.\n\
             Rebuild with the model-download feature or place the file at {}.",
            info.name,
            model_path(info.name).display()
        ),
    })
}

/// Removes an installed model file. Returns true if a file was deleted.
pub fn remove_model(name: &str) -> Result<bool> {
    let path = model_path(name);
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)?;
    Ok(true)
}

/// List all installed model names by scanning the models directory.
///
/// Discovers every `ggml-*.bin` file, not just catalog models.
/// Returns model names (with the `ggml-` prefix and `.bin` suffix stripped).
pub fn list_installed_models() -> Vec<String> {
    let dir = models_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let name = name.to_str()?;
            let model = name.strip_prefix("ggml-")?.strip_suffix(".bin")?;
            if entry.path().is_file() {
                Some(model.to_string())
            } else {
                None
            }
        })
        .collect();

    names.sort();
    names
}

/// Format model information for display.
pub fn format_model_info(model: &ModelInfo) -> String {
    let status = if is_model_installed(model.name) {
        "[installed]"
    } else {
        "[not installed]"
    };
    format!("{:16} {:5} MB   {}", model.name, model.size_mb, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_dir_is_valid_path() {
        let dir = models_dir();
        assert!(dir.to_string_lossy().contains("scriv"));
        assert!(dir.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_model_path_for_valid_model() {
        let path = model_path("tiny.en");
        assert!(path.to_string_lossy().contains("ggml-tiny.en.bin"));
    }

    #[test]
    fn test_model_path_resolves_alias() {
        let path = model_path("large");
        assert!(
            path.to_string_lossy().contains("large-v3-turbo"),
            "model_path(\"large\") should resolve to large-v3-turbo, got: {}",
            path.display()
        );
    }

    #[test]
    fn test_is_model_installed_returns_false_for_invalid_model() {
        assert!(!is_model_installed("nonexistent_model_xyz"));
    }

    #[tokio::test]
    async fn test_ensure_model_unknown_name_fails() {
        let result = ensure_model("nonexistent_model_xyz", None, false).await;
        assert!(matches!(result, Err(ScrivError::ModelUnavailable { .. })));
    }

    #[test]
    fn test_format_model_info_shows_name_and_size() {
        let model = get_model("tiny.en").unwrap();
        let formatted = format_model_info(model);
        assert!(formatted.contains("tiny.en"));
        assert!(formatted.contains("75"));
        assert!(formatted.contains("MB"));
        assert!(formatted.contains("installed"));
    }

    #[test]
    fn test_remove_model_missing_returns_false() {
        assert!(!remove_model("nonexistent_model_xyz").unwrap());
    }

    #[test]
    fn test_list_installed_models_returns_sorted_names() {
        let installed = list_installed_models();
        let mut sorted = installed.clone();
        sorted.sort();
        assert_eq!(installed, sorted);
        for name in &installed {
            assert!(!name.starts_with("ggml-"));
            assert!(!name.ends_with(".bin"));
        }
    }
}
