use crate::error::{LoadError, SaveError};
use crate::filters::{FilterParams, Pipeline, StepTiming};
use crate::source::ImageSource;
use image::{ImageFormat, RgbImage};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// What the presentation layer has to redraw after a session action
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Refresh {
    /// Nothing changed
    Nothing,
    /// Only the strength labels changed
    Labels,
    /// Both preview panes and the labels changed
    Panes,
}

/// Timing of the most recent recompute
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

struct LoadedImage {
    original: RgbImage,
    processed: RgbImage,
    source: String,
}

/// The one editing session: the loaded image, its filtered copy and the
/// strengths that produced it
///
/// `processed` is always recomputed from `original`, never from a previous
/// `processed`.
#[derive(Default)]
pub struct Session {
    image: Option<LoadedImage>,
    params: FilterParams,
    last_run: Option<RunStats>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    pub fn original(&self) -> Option<&RgbImage> {
        self.image.as_ref().map(|loaded| &loaded.original)
    }

    pub fn processed(&self) -> Option<&RgbImage> {
        self.image.as_ref().map(|loaded| &loaded.processed)
    }

    /// Description of where the current image came from
    pub fn source(&self) -> Option<&str> {
        self.image.as_ref().map(|loaded| loaded.source.as_str())
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }

    pub fn last_run(&self) -> Option<&RunStats> {
        self.last_run.as_ref()
    }

    /// Load a new original image and filter it with the current strengths
    ///
    /// On failure the session keeps whatever it had before.
    pub fn load(&mut self, source: &ImageSource, max_bytes: u64) -> Result<Refresh, LoadError> {
        let original = source.load(max_bytes)?;
        tracing::info!(
            "Loaded {} ({}x{})",
            source,
            original.width(),
            original.height()
        );

        self.image = Some(LoadedImage {
            processed: original.clone(),
            original,
            source: source.to_string(),
        });
        Ok(self.recompute())
    }

    pub fn set_denoise_strength(&mut self, value: f32) -> Refresh {
        self.params.set_denoise(value);
        tracing::debug!("Denoise strength: {}", self.params.denoise_label());
        self.recompute()
    }

    pub fn set_sharpen_strength(&mut self, value: f32) -> Refresh {
        self.params.set_sharpen(value);
        tracing::debug!("Sharpen strength: {}", self.params.sharpen_label());
        self.recompute()
    }

    /// Reset both strengths and restore the original; no-op when empty
    pub fn revert(&mut self) -> Refresh {
        let Some(loaded) = self.image.as_mut() else {
            return Refresh::Nothing;
        };

        self.params = FilterParams::default();
        loaded.processed = loaded.original.clone();
        self.last_run = Some(RunStats::default());
        tracing::info!("Reverted to original");
        Refresh::Panes
    }

    /// Write the processed image to `destination`
    ///
    /// A path without extension gets `.png`. The file is written next to the
    /// destination first and renamed into place. Returns the final path.
    pub fn save_processed(&self, destination: &Path) -> Result<PathBuf, SaveError> {
        let loaded = self.image.as_ref().ok_or(SaveError::NoImage)?;

        let path = if destination.extension().is_none() {
            destination.with_extension("png")
        } else {
            destination.to_path_buf()
        };
        let format = output_format(&path)?;

        let write_err = |source| SaveError::Write {
            path: path.clone(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp_file = tempfile::Builder::new()
            .prefix(".imgtune-")
            .tempfile_in(dir)
            .map_err(write_err)?;

        let mut writer = BufWriter::new(temp_file.as_file_mut());
        loaded
            .processed
            .write_to(&mut writer, format)
            .map_err(|source| SaveError::Encode {
                path: path.clone(),
                source,
            })?;
        writer.flush().map_err(write_err)?;
        drop(writer);

        temp_file.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::info!("Image saved to {}", path.display());
        Ok(path)
    }

    fn recompute(&mut self) -> Refresh {
        let Some(loaded) = self.image.as_mut() else {
            return Refresh::Labels;
        };

        let result = Pipeline::new(self.params).process(&loaded.original);
        tracing::info!(
            "Filtered with denoise {} and sharpen {} in {}ms",
            self.params.denoise_label(),
            self.params.sharpen_label(),
            result.total_time_ms
        );

        loaded.processed = result.image;
        self.last_run = Some(RunStats {
            total_time_ms: result.total_time_ms,
            steps: result.steps,
        });
        Refresh::Panes
    }
}

fn output_format(path: &Path) -> Result<ImageFormat, SaveError> {
    let unsupported = || {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        SaveError::UnsupportedFormat(ext)
    };

    match ImageFormat::from_path(path).map_err(|_| unsupported())? {
        format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp) => Ok(format),
        _ => Err(unsupported()),
    }
}
