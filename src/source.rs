use crate::error::LoadError;
use image::{ImageFormat, RgbImage};
use std::fmt;
use std::path::PathBuf;

/// Where an image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Local file
    Path(PathBuf),
    /// HTTP(S) resource, fetched with a single GET
    Url(String),
    /// Bytes already in memory (browser uploads)
    Bytes { name: String, data: Vec<u8> },
}

impl ImageSource {
    /// Read the raw bytes, refusing anything over `max_bytes`
    pub fn read(&self, max_bytes: u64) -> Result<Vec<u8>, LoadError> {
        match self {
            Self::Path(path) => {
                let read_err = |source| LoadError::Read {
                    path: path.clone(),
                    source,
                };
                let size = std::fs::metadata(path).map_err(read_err)?.len();
                check_size(size, max_bytes)?;
                std::fs::read(path).map_err(read_err)
            }
            Self::Url(url) => fetch(url, max_bytes),
            Self::Bytes { data, .. } => {
                check_size(data.len() as u64, max_bytes)?;
                Ok(data.clone())
            }
        }
    }

    /// Read and decode to RGB
    pub fn load(&self, max_bytes: u64) -> Result<RgbImage, LoadError> {
        let bytes = self.read(max_bytes)?;
        decode(&bytes)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
            Self::Bytes { name, .. } => f.write_str(name),
        }
    }
}

fn is_http_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn check_size(size: u64, max: u64) -> Result<(), LoadError> {
    if size > max {
        return Err(LoadError::TooLarge { size, max });
    }
    Ok(())
}

/// Single blocking GET, no retries
fn fetch(url: &str, max_bytes: u64) -> Result<Vec<u8>, LoadError> {
    if !is_http_url(url) {
        return Err(LoadError::InvalidUrl(url.to_string()));
    }

    tracing::info!("Fetching image from {}", url);
    let fetch_err = |source| LoadError::Fetch {
        url: url.to_string(),
        source,
    };

    let response = ureq::get(url).call().map_err(fetch_err)?;
    let mut body = response.into_body();
    let data = body
        .with_config()
        .limit(max_bytes)
        .read_to_vec()
        .map_err(|e| match e {
            ureq::Error::BodyExceedsLimit(_) => LoadError::TooLarge {
                size: max_bytes + 1,
                max: max_bytes,
            },
            other => fetch_err(other),
        })?;

    tracing::debug!("Fetched {} bytes from {}", data.len(), url);
    Ok(data)
}

/// Decode JPEG, PNG or BMP bytes into an RGB image
pub fn decode(bytes: &[u8]) -> Result<RgbImage, LoadError> {
    let format = image::guess_format(bytes)
        .map_err(|_| LoadError::UnsupportedFormat("unrecognized data".to_string()))?;

    match format {
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp => {}
        other => {
            return Err(LoadError::UnsupportedFormat(format!("{:?}", other)));
        }
    }

    let image = image::load_from_memory_with_format(bytes, format).map_err(LoadError::Decode)?;
    Ok(image.into_rgb8())
}
