use image::{DynamicImage, GrayImage, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::Result;
use tracing::debug;

use crate::models::{Rect, TextRegion};

/// Wall-clock duration of one pipeline step
#[derive(Debug, Clone)]
pub struct StepTiming {
    pub step: String,
    pub elapsed: Duration,
}

/// Per-image working state that flows through the pipeline
///
/// Each mask role is a separate owned buffer. A step that consumes a mask
/// takes it out of its slot; a step that only reads one borrows it.
pub struct Frame {
    /// Image name used for debug output directories
    pub name: String,

    /// Working color image (resized by the first step)
    pub color: RgbImage,

    /// Grayscale version of `color`
    pub gray: GrayImage,

    /// Closed binary edge mask
    pub edges: Option<GrayImage>,

    /// Filled candidate rectangles
    pub candidate_mask: Option<GrayImage>,

    /// Filled accepted contours, used for ink-density queries
    pub final_mask: Option<GrayImage>,

    /// Filled super boxes produced by the rule engine
    pub super_mask: Option<GrayImage>,

    /// Pixels of regions accepted by the OCR gate
    pub accepted_mask: Option<GrayImage>,

    /// Current box hypotheses
    pub candidates: Vec<Rect>,

    /// Validated multi-line blocks
    pub super_boxes: Vec<Rect>,

    /// Regions accepted as text
    pub regions: Vec<TextRegion>,

    pub timings: Vec<StepTiming>,
}

impl Frame {
    /// Create a frame for a full input image
    pub fn from_image(name: impl Into<String>, image: &DynamicImage) -> Self {
        let color = image.to_rgb8();
        let gray = image.to_luma8();
        Self {
            name: name.into(),
            color,
            gray,
            edges: None,
            candidate_mask: None,
            final_mask: None,
            super_mask: None,
            accepted_mask: None,
            candidates: Vec::new(),
            super_boxes: Vec::new(),
            regions: Vec::new(),
            timings: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }

    /// An all-zero mask the size of the working image
    pub fn blank_mask(&self) -> GrayImage {
        let (width, height) = self.dimensions();
        GrayImage::new(width, height)
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Consume the frame and return it transformed
    fn process(&self, frame: Frame, context: &PipelineContext) -> Result<Frame>;

    /// Human-readable name for this step (used in logs and debug directories)
    fn name(&self) -> &str;

    /// Mask worth saving in debug mode after this step ran
    fn debug_mask<'a>(&self, _frame: &'a Frame) -> Option<&'a GrayImage> {
        None
    }
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on the frame in order
    pub fn run(&self, frame: Frame) -> Result<Frame> {
        self.run_partial(frame, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, mut frame: Frame, num_steps: usize) -> Result<Frame> {
        let debug_dir = self.debug_dir(&frame);
        if let Some(dir) = &debug_dir {
            save_debug_image(dir, "00_input", &DynamicImage::ImageRgb8(frame.color.clone()))?;
        }

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!(
                step = step.name(),
                candidates = frame.candidates.len(),
                "Running step {}",
                step_idx + 1
            );

            let started = Instant::now();
            frame = step.process(frame, &self.context)?;
            let elapsed = started.elapsed();
            frame.timings.push(StepTiming {
                step: step.name().to_string(),
                elapsed,
            });

            if let (Some(dir), Some(mask)) = (&debug_dir, step.debug_mask(&frame)) {
                let step_dir_name = format!(
                    "{:02}_{}",
                    step_idx + 1,
                    step.name().to_lowercase().replace(' ', "_")
                );
                save_debug_image(dir, &step_dir_name, &DynamicImage::ImageLuma8(mask.clone()))?;
            }

            debug!(
                step = step.name(),
                candidates = frame.candidates.len(),
                super_boxes = frame.super_boxes.len(),
                regions = frame.regions.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "  → step finished"
            );
        }

        Ok(frame)
    }

    fn debug_dir(&self, frame: &Frame) -> Option<PathBuf> {
        self.context
            .debug
            .as_ref()
            .filter(|d| d.enabled)
            .map(|d| d.output_dir.join(&frame.name))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn save_debug_image(root: &Path, step_dir_name: &str, image: &DynamicImage) -> Result<()> {
    let step_dir = root.join(step_dir_name);
    std::fs::create_dir_all(&step_dir)?;
    let output_path = step_dir.join("01.png");
    image
        .save(&output_path)
        .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
    debug!("Debug: saved {}/01.png", step_dir_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingStep;

    impl PipelineStep for CountingStep {
        fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
            let next = frame.candidates.len() as i32;
            frame.candidates.extend(Rect::new(next, 0, 1, 1));
            Ok(frame)
        }

        fn name(&self) -> &str {
            "Counting"
        }
    }

    fn frame() -> Frame {
        Frame::from_image("t", &DynamicImage::new_rgb8(4, 4))
    }

    #[test]
    fn runs_steps_in_order_and_records_timings() {
        let pipeline = Pipeline::new()
            .add_step(Arc::new(CountingStep))
            .add_step_boxed(Box::new(CountingStep));
        let out = pipeline.run(frame()).unwrap();
        assert_eq!(out.candidates.len(), 2);
        assert_eq!(out.candidates[1].x, 1);
        assert_eq!(out.timings.len(), 2);
        assert_eq!(pipeline.step_names(), vec!["Counting", "Counting"]);
    }

    #[test]
    fn partial_run_stops_early() {
        let pipeline = Pipeline::new()
            .add_step(Arc::new(CountingStep))
            .add_step(Arc::new(CountingStep));
        let out = pipeline.run_partial(frame(), 1).unwrap();
        assert_eq!(out.candidates.len(), 1);
    }

    #[test]
    fn debug_dir_must_be_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("x"), b"x").unwrap();
        assert!(Pipeline::new().with_debug(dir.path().to_path_buf()).is_err());
    }
}
