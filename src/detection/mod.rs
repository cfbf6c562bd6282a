pub mod preprocessing;
pub mod components;
pub mod contours;
pub mod histogram;
pub mod rules;
pub mod ocr;
pub mod acceptance;
pub mod steps;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use std::path::PathBuf;
use std::sync::Arc;

use crate::models::{Rect, TextRegion};
use crate::pipeline::{Frame, Pipeline, StepTiming};
use self::acceptance::GateConfig;
use self::components::ComponentBounds;
use self::contours::ContourFilterConfig;
use self::histogram::SplitterConfig;
use self::ocr::TextRecognizer;
use self::rules::RuleConfig;
use self::steps::*;

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const HIGHLIGHT: [u8; 3] = [0, 255, 0];

/// Every tunable of the detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Images are resized to this width before processing
    pub target_width: u32,
    /// Directional closing of the edge mask
    pub close_kernel: (u32, u32),
    pub contours: ContourFilterConfig,
    /// Bounds used to consolidate the candidate mask
    pub consolidation: ComponentBounds,
    pub splitter: SplitterConfig,
    pub rules: RuleConfig,
    pub gate: GateConfig,
    /// Square grown around accepted pixels in the masked output
    pub highlight_kernel: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            target_width: 1400,
            close_kernel: (7, 2),
            contours: ContourFilterConfig::STRICT,
            consolidation: ComponentBounds::CANDIDATES,
            splitter: SplitterConfig::default(),
            rules: RuleConfig::default(),
            gate: GateConfig::default(),
            highlight_kernel: 23,
        }
    }
}

/// Build the standard detection pipeline
pub fn build_standard_pipeline(
    config: &DetectorConfig,
    recognizer: Option<Arc<dyn TextRecognizer>>,
) -> Pipeline {
    Pipeline::new()
        .add_step(Arc::new(ResizeStep {
            target_width: config.target_width,
        }))
        .add_step(Arc::new(EdgeMaskStep {
            close_width: config.close_kernel.0,
            close_height: config.close_kernel.1,
        }))
        .add_step(Arc::new(ContourFilterStep {
            config: config.contours,
        }))
        .add_step(Arc::new(ComponentStep {
            bounds: config.consolidation,
        }))
        .add_step(Arc::new(HistogramSplitStep {
            config: config.splitter,
        }))
        .add_step(Arc::new(RuleStep {
            config: config.rules,
        }))
        .add_step(Arc::new(OcrGateStep::new(config.gate, recognizer)))
}

/// Result of running the detector on one image
pub struct Detection {
    pub regions: Vec<TextRegion>,
    /// Working image with accepted regions highlighted
    pub masked: RgbImage,
    /// Working image with accepted regions outlined
    pub outlined: RgbImage,
    pub timings: Vec<StepTiming>,
}

/// Main detection orchestrator
pub struct TextDetector {
    config: DetectorConfig,
    pipeline: Pipeline,
}

impl TextDetector {
    pub fn new(config: DetectorConfig, recognizer: Option<Arc<dyn TextRecognizer>>) -> Self {
        let pipeline = build_standard_pipeline(&config, recognizer);
        Self { config, pipeline }
    }

    /// Save intermediate masks below `output_dir`
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.pipeline = self.pipeline.with_debug(output_dir)?;
        Ok(self)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the full detection pipeline on an image
    pub fn detect(&self, name: &str, img: &DynamicImage) -> anyhow::Result<Detection> {
        let frame = self.pipeline.run(Frame::from_image(name, img))?;
        Ok(self.annotate(frame))
    }

    /// Run only the first `num_steps` steps (for debugging)
    pub fn detect_partial(&self, name: &str, img: &DynamicImage, num_steps: usize) -> anyhow::Result<Frame> {
        self.pipeline.run_partial(Frame::from_image(name, img), num_steps)
    }

    fn annotate(&self, frame: Frame) -> Detection {
        let Frame {
            color,
            accepted_mask,
            regions,
            timings,
            ..
        } = frame;

        let mut outlined = color.clone();
        for region in &regions {
            draw_outline(&mut outlined, &region.rect);
        }

        let mut masked = color;
        if let Some(accepted) = accepted_mask {
            let (width, height) = accepted.dimensions();
            let mut region_boxes = image::GrayImage::new(width, height);
            for region in &regions {
                draw_filled_rect_mut(&mut region_boxes, region.rect.to_imageproc(), image::Luma([255]));
            }
            let grown = preprocessing::dilate_rect(
                &accepted,
                self.config.highlight_kernel,
                self.config.highlight_kernel,
            );
            let highlight = preprocessing::mask_and(&grown, &region_boxes);
            preprocessing::overlay_mask(&mut masked, &highlight, HIGHLIGHT);
        }

        Detection {
            regions,
            masked,
            outlined,
            timings,
        }
    }
}

/// Two pixel wide rectangle outline
fn draw_outline(image: &mut RgbImage, rect: &Rect) {
    draw_hollow_rect_mut(image, rect.to_imageproc(), OUTLINE);
    if let Some(inner) = Rect::new(rect.x + 1, rect.y + 1, rect.width - 2, rect.height - 2) {
        draw_hollow_rect_mut(image, inner.to_imageproc(), OUTLINE);
    }
}
