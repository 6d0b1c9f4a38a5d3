//! Visual regression testing with real image comparison.
//!
//! Screenshots are compared pixel by pixel against a stored baseline. A pixel
//! differs when the sum of its RGB channel deltas exceeds the color threshold;
//! the comparison passes while the ratio of differing pixels stays at or below
//! `max_diff_pixel_ratio`.

use crate::config::ScreenshotConfig;
use crate::result::{CheckError, CheckResult};
use image::{DynamicImage, GenericImageView, ImageEncoder, Rgba};
use std::path::{Path, PathBuf};

/// Result of comparing two images
#[derive(Debug, Clone)]
pub struct ImageDiffResult {
    /// Whether images match within the tolerance
    pub matches: bool,
    /// Whether both images have the same size
    pub same_dimensions: bool,
    /// Number of pixels that differ
    pub diff_pixel_count: usize,
    /// Total number of pixels compared
    pub total_pixels: usize,
    /// Ratio of differing pixels (0.0-1.0)
    pub diff_ratio: f64,
    /// Maximum color difference found
    pub max_color_diff: u32,
    /// Average color difference for differing pixels
    pub avg_color_diff: f64,
    /// Diff image data (PNG encoded, differences in red)
    pub diff_image: Option<Vec<u8>>,
}

impl ImageDiffResult {
    /// Check if images are identical (no differences)
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.same_dimensions && self.diff_pixel_count == 0
    }
}

/// Visual regression tester
#[derive(Debug, Clone)]
pub struct VisualRegressionTester {
    max_diff_pixel_ratio: f64,
    color_threshold: u8,
}

impl Default for VisualRegressionTester {
    fn default() -> Self {
        Self::from_config(&ScreenshotConfig::default())
    }
}

impl VisualRegressionTester {
    /// Create a tester with explicit tolerances
    #[must_use]
    pub const fn new(max_diff_pixel_ratio: f64, color_threshold: u8) -> Self {
        Self {
            max_diff_pixel_ratio,
            color_threshold,
        }
    }

    /// Create a tester from screenshot settings
    #[must_use]
    pub const fn from_config(config: &ScreenshotConfig) -> Self {
        Self::new(config.max_diff_pixel_ratio, config.color_threshold)
    }

    /// Maximum ratio of differing pixels
    #[must_use]
    pub const fn max_diff_pixel_ratio(&self) -> f64 {
        self.max_diff_pixel_ratio
    }

    /// Compare two images from byte arrays (PNG format)
    ///
    /// # Errors
    ///
    /// Returns error if images cannot be decoded
    pub fn compare_images(&self, actual: &[u8], expected: &[u8]) -> CheckResult<ImageDiffResult> {
        let actual_img =
            image::load_from_memory(actual).map_err(|e| CheckError::ImageComparison {
                message: format!("Failed to decode actual image: {e}"),
            })?;

        let expected_img =
            image::load_from_memory(expected).map_err(|e| CheckError::ImageComparison {
                message: format!("Failed to decode expected image: {e}"),
            })?;

        self.compare_dynamic_images(&actual_img, &expected_img)
    }

    /// Compare two `DynamicImage` instances.
    ///
    /// Images of different sizes never match; every pixel counts as different.
    ///
    /// # Errors
    ///
    /// Returns error if the diff image cannot be encoded
    pub fn compare_dynamic_images(
        &self,
        actual: &DynamicImage,
        expected: &DynamicImage,
    ) -> CheckResult<ImageDiffResult> {
        let (width, height) = actual.dimensions();
        let (exp_width, exp_height) = expected.dimensions();

        if width != exp_width || height != exp_height {
            tracing::debug!(
                actual = %format!("{width}x{height}"),
                expected = %format!("{exp_width}x{exp_height}"),
                "screenshot size differs from baseline"
            );
            let total_pixels = (width * height).max(exp_width * exp_height) as usize;
            let diff_img = self.size_mismatch_diff(&actual.to_rgba8(), &expected.to_rgba8());
            return Ok(ImageDiffResult {
                matches: false,
                same_dimensions: false,
                diff_pixel_count: total_pixels,
                total_pixels,
                diff_ratio: 1.0,
                max_color_diff: 0,
                avg_color_diff: 0.0,
                diff_image: Some(encode_png(&diff_img)?),
            });
        }

        let total_pixels = (width * height) as usize;
        let mut diff_pixel_count = 0usize;
        let mut max_color_diff: u32 = 0;
        let mut total_color_diff: u64 = 0;

        let mut diff_img = image::RgbaImage::new(width, height);

        let actual_rgba = actual.to_rgba8();
        let expected_rgba = expected.to_rgba8();

        for y in 0..height {
            for x in 0..width {
                let actual_pixel = actual_rgba.get_pixel(x, y);
                let expected_pixel = expected_rgba.get_pixel(x, y);

                let color_diff = pixel_diff(*actual_pixel, *expected_pixel);

                if color_diff > u32::from(self.color_threshold) {
                    diff_pixel_count += 1;
                    total_color_diff += u64::from(color_diff);
                    max_color_diff = max_color_diff.max(color_diff);
                    diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                } else {
                    // Faded copy of the unchanged pixel
                    let Rgba([r, g, b, _]) = *actual_pixel;
                    diff_img.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128]));
                }
            }
        }

        let diff_ratio = if total_pixels > 0 {
            diff_pixel_count as f64 / total_pixels as f64
        } else {
            0.0
        };

        let avg_color_diff = if diff_pixel_count > 0 {
            total_color_diff as f64 / diff_pixel_count as f64
        } else {
            0.0
        };

        let matches = diff_ratio <= self.max_diff_pixel_ratio;

        let diff_image = if matches {
            None
        } else {
            Some(encode_png(&diff_img)?)
        };

        Ok(ImageDiffResult {
            matches,
            same_dimensions: true,
            diff_pixel_count,
            total_pixels,
            diff_ratio,
            max_color_diff,
            avg_color_diff,
            diff_image,
        })
    }

    /// Diff canvas spanning both images. The overlap is compared pixel by
    /// pixel; area covered by only one image is marked red.
    fn size_mismatch_diff(
        &self,
        actual: &image::RgbaImage,
        expected: &image::RgbaImage,
    ) -> image::RgbaImage {
        let width = actual.width().max(expected.width());
        let height = actual.height().max(expected.height());
        let mut diff_img = image::RgbaImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let pixel = match (
                    actual.get_pixel_checked(x, y),
                    expected.get_pixel_checked(x, y),
                ) {
                    (Some(a), Some(e))
                        if pixel_diff(*a, *e) <= u32::from(self.color_threshold) =>
                    {
                        let Rgba([r, g, b, _]) = *a;
                        Rgba([r / 2, g / 2, b / 2, 128])
                    }
                    _ => Rgba([255, 0, 0, 255]),
                };
                diff_img.put_pixel(x, y, pixel);
            }
        }
        diff_img
    }
}

/// Calculate pixel difference (sum of RGB channel differences)
fn pixel_diff(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    let Rgba([r1, g1, b1, _]) = a;
    let Rgba([r2, g2, b2, _]) = b;

    let dr = i32::from(r1) - i32::from(r2);
    let dg = i32::from(g1) - i32::from(g2);
    let db = i32::from(b1) - i32::from(b2);

    dr.unsigned_abs() + dg.unsigned_abs() + db.unsigned_abs()
}

fn encode_png(img: &image::RgbaImage) -> CheckResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| CheckError::ImageComparison {
            message: format!("Failed to encode diff image: {e}"),
        })?;
    Ok(buffer)
}

/// Baseline storage following a path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    dir: PathBuf,
    template: String,
}

impl SnapshotStore {
    /// Create a store from screenshot settings
    #[must_use]
    pub fn from_config(config: &ScreenshotConfig) -> Self {
        Self {
            dir: config.snapshot_dir.clone(),
            template: config.path_template.clone(),
        }
    }

    /// Baseline path for a snapshot name path such as `["Index.png"]`.
    ///
    /// `{arg}` is the joined name without extension, `{ext}` the extension of
    /// the last segment (`.png` when absent).
    #[must_use]
    pub fn path_for(&self, name_path: &[&str]) -> PathBuf {
        let (arg, ext) = split_name_path(name_path);
        PathBuf::from(
            self.template
                .replace("{snapshot_dir}", &self.dir.to_string_lossy())
                .replace("{arg}", &arg)
                .replace("{ext}", &ext),
        )
    }

    /// Read a baseline, `None` if it does not exist
    pub fn read(&self, path: &Path) -> CheckResult<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a baseline, creating parent directories
    pub fn write(&self, path: &Path, png: &[u8]) -> CheckResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, png)?;
        tracing::info!(path = %path.display(), "wrote screenshot baseline");
        Ok(())
    }
}

/// File stem used for failure artifacts, e.g. `Index` for `["Index.png"]`
#[must_use]
pub fn snapshot_stem(name_path: &[&str]) -> String {
    split_name_path(name_path).0.replace('/', "-")
}

fn split_name_path(name_path: &[&str]) -> (String, String) {
    let joined = name_path.join("/");
    let last = name_path.last().copied().unwrap_or_default();
    match last.rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &last[dot..];
            (joined[..joined.len() - ext.len()].to_string(), ext.to_string())
        }
        _ => (joined, ".png".to_string()),
    }
}

/// Write `<stem>-actual.png`, `<stem>-expected.png` and `<stem>-diff.png`.
///
/// Returns the diff path when a diff image was written.
pub fn write_failure_artifacts(
    dir: &Path,
    stem: &str,
    actual: &[u8],
    expected: Option<&[u8]>,
    diff: Option<&[u8]>,
) -> CheckResult<Option<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(format!("{stem}-actual.png")), actual)?;
    if let Some(expected) = expected {
        std::fs::write(dir.join(format!("{stem}-expected.png")), expected)?;
    }
    let Some(diff) = diff else {
        return Ok(None);
    };
    let diff_path = dir.join(format!("{stem}-diff.png"));
    std::fs::write(&diff_path, diff)?;
    Ok(Some(diff_path))
}
