pub mod batch;
pub mod detection;
pub mod models;
pub mod pipeline;

pub use models::{Component, Rect, TextRegion};
pub use detection::{Detection, DetectorConfig, TextDetector};
pub use detection::ocr::{OcrOutcome, OcrsRecognizer, TextRecognizer};
pub use pipeline::{DebugConfig, Frame, Pipeline, PipelineContext, PipelineStep, StepTiming};
pub use batch::{run_batch, BatchError, BatchSummary};
