use image::{DynamicImage, GrayImage};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What the OCR engine made of one sub-image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    Recognized {
        text: String,
        word_count: usize,
        line_count: usize,
    },
    Failed {
        reason: String,
    },
}

impl OcrOutcome {
    pub fn word_count(&self) -> usize {
        match self {
            OcrOutcome::Recognized { word_count, .. } => *word_count,
            OcrOutcome::Failed { .. } => 0,
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            OcrOutcome::Recognized { line_count, .. } => *line_count,
            OcrOutcome::Failed { .. } => 0,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            OcrOutcome::Recognized { text, .. } => text,
            OcrOutcome::Failed { .. } => "",
        }
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error(
        "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
         Expected locations:\n  - {}\n  - {}",
        .detection.display(),
        .recognition.display()
    )]
    ModelsMissing {
        detection: PathBuf,
        recognition: PathBuf,
    },
    #[error("cannot locate home directory for the model cache")]
    NoHome,
    #[error("failed to load model {}: {message}", .path.display())]
    ModelLoad { path: PathBuf, message: String },
    #[error("failed to create OCR engine: {0}")]
    Engine(String),
    #[error("image rejected by OCR engine: {0}")]
    Image(String),
    #[error("recognition failed: {0}")]
    Recognition(String),
}

/// OCR collaborator. Implementations are called from one thread at a time.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> OcrOutcome;
}

/// [`TextRecognizer`] backed by the `ocrs` engine
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    pub const DETECTION_MODEL: &'static str = "text-detection.rten";
    pub const RECOGNITION_MODEL: &'static str = "text-recognition.rten";

    /// Standard cache location used by `ocrs-cli`
    pub fn default_models_dir() -> Result<PathBuf, OcrError> {
        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| OcrError::NoHome)?;
        Ok(Path::new(&home_dir).join(".cache/ocrs"))
    }

    /// Load both models from `models_dir` and build the engine
    pub fn from_dir(models_dir: &Path) -> Result<Self, OcrError> {
        let detection_model_path = models_dir.join(Self::DETECTION_MODEL);
        let recognition_model_path = models_dir.join(Self::RECOGNITION_MODEL);

        if !detection_model_path.exists() || !recognition_model_path.exists() {
            return Err(OcrError::ModelsMissing {
                detection: detection_model_path,
                recognition: recognition_model_path,
            });
        }

        let detection_model = load_model(&detection_model_path)?;
        let recognition_model = load_model(&recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| OcrError::Engine(e.to_string()))?;

        Ok(Self { engine })
    }

    fn run(&self, image: &GrayImage) -> Result<OcrOutcome, OcrError> {
        let img = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|e| OcrError::Image(e.to_string()))?;
        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| OcrError::Image(e.to_string()))?;

        // Counts come from the layout analysis, not from the recognized text
        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| OcrError::Recognition(e.to_string()))?;
        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);
        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        let text = line_texts
            .iter()
            .flatten()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(OcrOutcome::Recognized {
            text,
            word_count: word_rects.len(),
            line_count: line_rects.len(),
        })
    }
}

impl TextRecognizer for OcrsRecognizer {
    fn recognize(&self, image: &GrayImage) -> OcrOutcome {
        guarded(|| self.run(image))
    }
}

/// Turn errors and panics raised while recognizing into [`OcrOutcome::Failed`]
fn guarded<F>(recognize: F) -> OcrOutcome
where
    F: FnOnce() -> Result<OcrOutcome, OcrError>,
{
    match panic::catch_unwind(AssertUnwindSafe(recognize)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => OcrOutcome::Failed {
            reason: e.to_string(),
        },
        Err(payload) => OcrOutcome::Failed {
            reason: format!("OCR engine panicked: {}", panic_message(payload.as_ref())),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn load_model(path: &Path) -> Result<Model, OcrError> {
    Model::load_file(path).map_err(|e| OcrError::ModelLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_carries_no_evidence() {
        let failed = OcrOutcome::Failed {
            reason: "boom".into(),
        };
        assert_eq!(failed.word_count(), 0);
        assert_eq!(failed.line_count(), 0);
        assert_eq!(failed.text(), "");
    }

    #[test]
    fn engine_errors_become_failed_outcomes() {
        let outcome = guarded(|| Err(OcrError::Recognition("bad line".into())));
        assert_eq!(
            outcome,
            OcrOutcome::Failed {
                reason: "recognition failed: bad line".into()
            }
        );
    }

    #[test]
    fn engine_panics_become_failed_outcomes() {
        let outcome = guarded(|| panic!("tensor shape mismatch"));
        match outcome {
            OcrOutcome::Failed { reason } => assert!(reason.contains("tensor shape mismatch")),
            other => panic!("expected failure, got {other:?}"),
        }

        let owned = guarded(|| panic!("{} words", 3));
        assert_eq!(owned.word_count(), 0);
        assert!(owned.text().is_empty());
    }

    #[test]
    fn missing_models_are_reported_with_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = match OcrsRecognizer::from_dir(dir.path()) {
            Err(e) => e,
            Ok(_) => panic!("engine built without models"),
        };
        assert!(matches!(err, OcrError::ModelsMissing { .. }));
        assert!(err.to_string().contains(OcrsRecognizer::DETECTION_MODEL));
    }
}
