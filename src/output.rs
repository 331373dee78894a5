//! File naming and image saving.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::GenError;

/// Longest prompt fragment kept in a filename, in characters.
pub const MAX_PROMPT_CHARS: usize = 50;

/// Timestamp prefix format, second granularity.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A saved image on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    /// Full path of the written file.
    pub filepath: PathBuf,
    /// Time the filename was derived from.
    pub created_at: DateTime<Local>,
}

/// Sanitize a prompt for use in a filename.
///
/// Keeps alphanumeric characters and underscores, turns every whitespace
/// character into one underscore (runs are not collapsed), drops everything
/// else, and keeps at most [`MAX_PROMPT_CHARS`] characters.
#[must_use]
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .chars()
        .filter_map(|ch| {
            if ch.is_alphanumeric() || ch == '_' {
                Some(ch)
            } else if ch.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .take(MAX_PROMPT_CHARS)
        .collect()
}

/// Build `{timestamp}_{sanitized_prompt}.png` for the given time.
#[must_use]
pub fn timestamped_filename(prompt: &str, now: &DateTime<Local>) -> String {
    format!("{}_{}.png", now.format(TIMESTAMP_FORMAT), sanitize_prompt(prompt))
}

/// Save `image` as a PNG under `output_dir`, named from the current time and
/// the prompt.
///
/// Two saves of the same prompt within one second write the same path; the
/// later one wins.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be
/// written.
pub fn save_image_with_timestamp(
    image: &DynamicImage,
    prompt: &str,
    output_dir: &Path,
) -> Result<SavedArtifact, GenError> {
    save_image_at(image, prompt, output_dir, Local::now())
}

/// [`save_image_with_timestamp`] with an explicit creation time.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be
/// written.
pub fn save_image_at(
    image: &DynamicImage,
    prompt: &str,
    output_dir: &Path,
    now: DateTime<Local>,
) -> Result<SavedArtifact, GenError> {
    std::fs::create_dir_all(output_dir)?;

    let filepath = output_dir.join(timestamped_filename(prompt, &now));
    image.save_with_format(&filepath, ImageFormat::Png).map_err(|e| match e {
        image::ImageError::IoError(io) => GenError::Io(io),
        other => GenError::Decode(format!("Failed to encode PNG: {other}")),
    })?;
    debug!(path = %filepath.display(), "image written");

    Ok(SavedArtifact { filepath, created_at: now })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn sanitize_basic() {
        assert_eq!(sanitize_prompt("a red fox in snow"), "a_red_fox_in_snow");
    }

    #[test]
    fn sanitize_strips_punctuation() {
        assert_eq!(sanitize_prompt("A cat!! sitting, on a mat..."), "A_cat_sitting_on_a_mat");
    }

    #[test]
    fn sanitize_keeps_each_space() {
        assert_eq!(sanitize_prompt("a  b\tc\nd"), "a__b_c_d");
    }

    #[test]
    fn sanitize_keeps_unicode_letters() {
        assert_eq!(sanitize_prompt("café über"), "café_über");
    }

    #[test]
    fn sanitize_empty() {
        assert_eq!(sanitize_prompt(""), "");
        assert_eq!(sanitize_prompt("!!!"), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let long = "ab, ".repeat(40);
        for prompt in ["a red fox in snow", "  lead & trail  ", "x_y z", long.as_str()] {
            let once = sanitize_prompt(prompt);
            assert_eq!(sanitize_prompt(&once), once, "prompt: {prompt:?}");
        }
    }

    #[test]
    fn sanitize_bounds_long_mixed_input() {
        let prompt = "Hello, world! #1 (test) ~ ".repeat(20);
        assert!(prompt.chars().count() >= 500);
        let out = sanitize_prompt(&prompt);
        assert_eq!(out.chars().count(), MAX_PROMPT_CHARS);
        assert!(out.chars().all(|c| c.is_alphanumeric() || c == '_'));
    }

    #[test]
    fn filename_format() {
        assert_eq!(
            timestamped_filename("a red fox in snow", &noon()),
            "20240101_120000_a_red_fox_in_snow.png"
        );
    }

    #[test]
    fn save_round_trips_pixels() {
        let dir = test_dir("sdgen_output_round_trip");
        let mut rgb = image::RgbImage::new(16, 8);
        rgb.put_pixel(3, 5, image::Rgb([200, 10, 99]));
        let img = DynamicImage::ImageRgb8(rgb.clone());

        let artifact = save_image_at(&img, "a red fox in snow", &dir, noon()).unwrap();
        assert_eq!(artifact.filepath, dir.join("20240101_120000_a_red_fox_in_snow.png"));
        assert_eq!(artifact.created_at, noon());

        let read_back = image::open(&artifact.filepath).unwrap();
        assert_eq!(read_back.to_rgb8(), rgb);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn same_second_same_prompt_overwrites() {
        let dir = test_dir("sdgen_output_overwrite");
        let first = DynamicImage::new_rgb8(4, 4);
        let second = DynamicImage::new_rgb8(8, 8);

        let a = save_image_at(&first, "cat", &dir, noon()).unwrap();
        let b = save_image_at(&second, "cat", &dir, noon()).unwrap();
        assert_eq!(a.filepath, b.filepath);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
        assert_eq!(image::open(&b.filepath).unwrap().width(), 8);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_creates_nested_directory() {
        let dir = test_dir("sdgen_output_nested");
        let nested = dir.join("a").join("b");
        let artifact =
            save_image_with_timestamp(&DynamicImage::new_rgb8(2, 2), "x", &nested).unwrap();
        assert!(artifact.filepath.starts_with(&nested));
        assert!(artifact.filepath.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
