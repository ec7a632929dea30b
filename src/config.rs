use crate::Args;
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub frame_width: u32,
    pub frame_height: u32,
    pub max_file_size: usize,
    pub output_dir: PathBuf,
}

impl Config {
    /// Relative save paths land in the output directory
    pub fn resolve_output(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.output_dir.join(path)
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let output_dir = args
            .output_dir
            .or_else(dirs::picture_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            host: args.host,
            port: args.port,
            frame_width: args.frame_width,
            frame_height: args.frame_height,
            max_file_size: args.max_file_size,
            output_dir,
        }
    }
}
