//! Directory-level driver: list images, run the detector, write outputs.

use std::cmp::Ordering;
use std::fs::OpenOptions;
use std::io::Write;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::time::{Duration, Instant};

use image::ImageReader;
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::detection::TextDetector;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
pub const TIMING_LOG: &str = "ExecutionTime.csv";

#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch stops at the first image that cannot be decoded
    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot read input directory {}: {source}", .path.display())]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Compare two names the way a person would: digit runs by value,
/// everything else case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => match (ca.is_ascii_digit(), cb.is_ascii_digit()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (true, true) => {
                    let ord = compare_numbers(&take_digits(&mut a), &take_digits(&mut b));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                (false, false) => {
                    a.next();
                    b.next();
                    if ca != cb {
                        let ord = ca.to_ascii_uppercase().cmp(&cb.to_ascii_uppercase());
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                }
            },
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, in natural order
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let entries = std::fs::read_dir(dir).map_err(|source| BatchError::InputDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_image_path(&entry.path()) {
            images.push(entry.path());
        }
    }
    images.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(images)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<stem>_masked.<ext>` and `<stem>_rects.<ext>` inside `output_dir`
pub fn output_paths(input: &Path, output_dir: &Path) -> (PathBuf, PathBuf) {
    let stem = image_stem(input);
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "png".to_string());
    (
        output_dir.join(format!("{stem}_masked.{ext}")),
        output_dir.join(format!("{stem}_rects.{ext}")),
    )
}

fn image_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Appends stage durations to a semicolon separated log
pub struct ExecutionLog {
    path: PathBuf,
}

impl ExecutionLog {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join(TIMING_LOG),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<timestamp>;<stage>;<millis>;ms;<description>`
    pub fn record(&self, stage: &str, elapsed: Duration, description: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(
            file,
            "{};{};{};ms;{}",
            timestamp(),
            stage,
            elapsed.as_millis(),
            description
        )
    }
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description!("[year][month][day]T[hour][minute][second].[subsecond digits:6]");
    now.format(&format).unwrap_or_default()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub regions: usize,
}

/// Process every image in `input_dir`, writing annotated copies to `output_dir`.
///
/// Stops at the first image that cannot be decoded. Other per-image errors
/// are logged and the batch moves on.
pub fn run_batch(
    detector: &TextDetector,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<BatchSummary, BatchError> {
    std::fs::create_dir_all(output_dir)?;
    let log = ExecutionLog::new(output_dir);
    let images = list_images(input_dir)?;
    info!(count = images.len(), dir = %input_dir.display(), "Found images");

    let mut summary = BatchSummary::default();
    for path in images {
        let started = Instant::now();
        let img = ImageReader::open(&path)?
            .with_guessed_format()?
            .decode()
            .map_err(|source| BatchError::Decode {
                path: path.clone(),
                source,
            })?;
        // Debug dumps are keyed by the full file name
        let name = file_name(&path);
        record(&log, "imread", started.elapsed(), &name);

        let started = Instant::now();
        let detection = match detector.detect(&name, &img) {
            Ok(d) => d,
            Err(e) => {
                error!(image = %path.display(), "Detection failed: {e:#}");
                summary.failed += 1;
                continue;
            }
        };
        record(&log, "detect", started.elapsed(), &name);
        for timing in &detection.timings {
            record(&log, &timing.step, timing.elapsed, &name);
        }

        let (masked_path, rects_path) = output_paths(&path, output_dir);
        let saved = detection
            .masked
            .save(&masked_path)
            .and_then(|_| detection.outlined.save(&rects_path));
        if let Err(e) = saved {
            error!(image = %path.display(), "Failed to write outputs: {e}");
            summary.failed += 1;
            continue;
        }

        info!(
            image = %name,
            regions = detection.regions.len(),
            "Wrote {} and {}",
            masked_path.display(),
            rects_path.display()
        );
        summary.processed += 1;
        summary.regions += detection.regions.len();
    }

    Ok(summary)
}

fn record(log: &ExecutionLog, stage: &str, elapsed: Duration, description: &str) {
    if let Err(e) = log.record(stage, elapsed, description) {
        warn!(path = %log.path().display(), "Cannot append timing: {e}");
    }
}
