use crate::pipeline::{Frame, PipelineStep, PipelineContext};
use crate::detection::{acceptance, components, contours, histogram, preprocessing, rules};
use crate::detection::ocr::TextRecognizer;
use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use std::sync::Arc;
use tracing::{debug, info};

/// Resize the working image to a fixed width
pub struct ResizeStep {
    pub target_width: u32,
}

impl PipelineStep for ResizeStep {
    fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
        let color = DynamicImage::ImageRgb8(std::mem::take(&mut frame.color));
        let resized = preprocessing::resize_to_width(&color, self.target_width);
        frame.gray = preprocessing::to_grayscale(&resized);
        frame.color = resized.to_rgb8();
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Resize"
    }

    fn debug_mask<'a>(&self, frame: &'a Frame) -> Option<&'a GrayImage> {
        Some(&frame.gray)
    }
}

/// Gradient, Otsu threshold and directional closing
pub struct EdgeMaskStep {
    pub close_width: u32,
    pub close_height: u32,
}

impl PipelineStep for EdgeMaskStep {
    fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
        let gradient = preprocessing::morphological_gradient(&frame.gray);
        let binary = preprocessing::binarize_otsu(&gradient);
        frame.edges = Some(preprocessing::close_rect(&binary, self.close_width, self.close_height));
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Edge Mask"
    }

    fn debug_mask<'a>(&self, frame: &'a Frame) -> Option<&'a GrayImage> {
        frame.edges.as_ref()
    }
}

/// Keep contour boxes that look like text blobs
pub struct ContourFilterStep {
    pub config: contours::ContourFilterConfig,
}

impl PipelineStep for ContourFilterStep {
    fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
        let edges = frame.edges.take().context("contour filter needs the edge mask")?;
        let found = contours::filter_contours(&edges, &self.config);
        debug!(candidates = found.rects.len(), "Contour candidates");
        frame.candidates = found.rects;
        frame.candidate_mask = Some(found.candidate_mask);
        frame.final_mask = Some(found.final_mask);
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Contour Filtering"
    }

    fn debug_mask<'a>(&self, frame: &'a Frame) -> Option<&'a GrayImage> {
        frame.final_mask.as_ref()
    }
}

/// Consolidate overlapping candidate boxes into connected components
pub struct ComponentStep {
    pub bounds: components::ComponentBounds,
}

impl PipelineStep for ComponentStep {
    fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
        let mut mask = frame
            .candidate_mask
            .take()
            .context("component extraction needs the candidate mask")?;
        let set = components::extract_components(&mut mask, &self.bounds);
        debug!(
            before = frame.candidates.len(),
            after = set.components.len(),
            "Candidate components"
        );
        frame.candidates = set.rects();
        frame.candidate_mask = Some(set.mask);
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Component Extraction"
    }

    fn debug_mask<'a>(&self, frame: &'a Frame) -> Option<&'a GrayImage> {
        frame.candidate_mask.as_ref()
    }
}

/// Split boxes holding several stacked lines
pub struct HistogramSplitStep {
    pub config: histogram::SplitterConfig,
}

impl PipelineStep for HistogramSplitStep {
    fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
        let final_mask = frame
            .final_mask
            .as_ref()
            .context("histogram splitting needs the final mask")?;
        let candidates = std::mem::take(&mut frame.candidates);
        frame.candidates = histogram::split_stacked_lines(candidates, final_mask, &self.config);
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Histogram Split"
    }
}

/// Merge, validate and reject boxes geometrically
pub struct RuleStep {
    pub config: rules::RuleConfig,
}

impl PipelineStep for RuleStep {
    fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
        let outcome = rules::apply_rules(std::mem::take(&mut frame.candidates), &self.config);

        let mut super_mask = frame.blank_mask();
        for rect in &outcome.super_boxes {
            draw_filled_rect_mut(&mut super_mask, rect.to_imageproc(), Luma([255]));
        }

        frame.candidates = outcome.candidates;
        frame.super_boxes = outcome.super_boxes;
        frame.super_mask = Some(super_mask);
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Bounding Box Rules"
    }

    fn debug_mask<'a>(&self, frame: &'a Frame) -> Option<&'a GrayImage> {
        frame.super_mask.as_ref()
    }
}

/// Accept super-box regions the OCR engine reads as text
pub struct OcrGateStep {
    pub config: acceptance::GateConfig,
    /// Shared engine, created once per run. `None` accepts every region.
    pub recognizer: Option<Arc<dyn TextRecognizer>>,
}

impl OcrGateStep {
    pub fn new(config: acceptance::GateConfig, recognizer: Option<Arc<dyn TextRecognizer>>) -> Self {
        Self { config, recognizer }
    }
}

impl PipelineStep for OcrGateStep {
    fn process(&self, mut frame: Frame, _context: &PipelineContext) -> Result<Frame> {
        let super_mask = frame
            .super_mask
            .take()
            .context("OCR gate needs the super-box mask")?;
        let result = acceptance::ocr_gate(
            &super_mask,
            &frame.gray,
            self.recognizer.as_deref(),
            &self.config,
        );
        info!(
            image = %frame.name,
            accepted = result.regions.len(),
            rejected = result.rejected,
            "OCR gate finished"
        );
        frame.regions = result.regions;
        frame.accepted_mask = Some(result.accepted_mask);
        frame.super_mask = Some(super_mask);
        Ok(frame)
    }

    fn name(&self) -> &str {
        "OCR Gate"
    }

    fn debug_mask<'a>(&self, frame: &'a Frame) -> Option<&'a GrayImage> {
        frame.accepted_mask.as_ref()
    }
}
