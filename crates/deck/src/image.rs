//! Image preparation for display uploads
//!
//! An [`ImageProcessor`] turns a source image into a temporary file in the
//! geometry and encoding a deck expects. The returned [`ProcessedImage`]
//! removes that file when disposed or dropped.

use image::imageops::FilterType;
use protocol::ImageFormat;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Produces upload-ready image files
pub trait ImageProcessor: Send + Sync {
    /// Convert `source` to `format`
    ///
    /// Returns `None` if the source is missing or processing fails.
    fn process(&self, source: &Path, format: &ImageFormat) -> Option<ProcessedImage>;
}

/// A temporary processed image file
#[derive(Debug)]
pub struct ProcessedImage {
    path: PathBuf,
    disposed: bool,
}

impl ProcessedImage {
    /// Wrap an existing file that should be deleted on disposal
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            disposed: false,
        }
    }

    /// Location of the processed file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now
    pub fn dispose(mut self) {
        self.remove_file();
    }

    fn remove_file(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for ProcessedImage {
    fn drop(&mut self) {
        self.remove_file();
    }
}

/// [`ImageProcessor`] built on the `image` crate
///
/// Resizes to cover the target size, rotates clockwise, mirrors, and writes
/// a JPEG named `rotated_image_<n>.jpg` into the output directory.
#[derive(Debug, Clone)]
pub struct ImageRsProcessor {
    output_dir: PathBuf,
}

impl ImageRsProcessor {
    /// Processor writing into the system temp directory
    pub fn new() -> Self {
        Self::with_output_dir(std::env::temp_dir())
    }

    /// Processor writing into `output_dir`
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn output_path(&self, format: &ImageFormat) -> PathBuf {
        let n: u32 = rand::rng().random_range(9999..999_999);
        self.output_dir.join(format!("rotated_image_{}.{}", n, format.extension()))
    }

    fn render(&self, source: &Path, format: &ImageFormat) -> image::ImageResult<PathBuf> {
        let (width, height) = format.size;
        let mut img = image::open(source)?.resize_to_fill(width, height, FilterType::Lanczos3);

        img = match format.rotation % 360 {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        };
        if format.flip.0 {
            img = img.flipv();
        }
        if format.flip.1 {
            img = img.fliph();
        }

        let out = self.output_path(format);
        img.to_rgb8().save_with_format(&out, image::ImageFormat::Jpeg)?;
        Ok(out)
    }
}

impl Default for ImageRsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor for ImageRsProcessor {
    fn process(&self, source: &Path, format: &ImageFormat) -> Option<ProcessedImage> {
        if !source.exists() {
            warn!("Image source does not exist: {}", source.display());
            return None;
        }

        match self.render(source, format) {
            Ok(path) => {
                debug!("Processed {} -> {}", source.display(), path.display());
                Some(ProcessedImage::new(path))
            }
            Err(e) => {
                warn!("Failed to process {}: {}", source.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_source(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("source.png");
        let mut img = RgbImage::new(width, height);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_source_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let processor = ImageRsProcessor::with_output_dir(dir.path());
        let format = ImageFormat::jpeg((64, 64), 90);
        assert!(processor.process(&dir.path().join("nope.png"), &format).is_none());
    }

    #[test]
    fn test_rotated_output_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), 400, 300);
        let processor = ImageRsProcessor::with_output_dir(dir.path());

        let processed = processor
            .process(&source, &ImageFormat::jpeg((320, 240), 90))
            .unwrap();
        let name = processed.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("rotated_image_"));
        assert!(name.ends_with(".jpg"));

        let out = image::open(processed.path()).unwrap();
        assert_eq!((out.width(), out.height()), (240, 320));
    }

    #[test]
    fn test_dispose_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), 64, 64);
        let processor = ImageRsProcessor::with_output_dir(dir.path());

        let processed = processor
            .process(&source, &ImageFormat::jpeg((64, 64), 0))
            .unwrap();
        let path = processed.path().to_path_buf();
        assert!(path.exists());
        processed.dispose();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.jpg");
        std::fs::write(&path, b"x").unwrap();
        {
            let _image = ProcessedImage::new(&path);
        }
        assert!(!path.exists());
    }
}
