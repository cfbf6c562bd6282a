use image::GrayImage;
use tracing::debug;

use crate::detection::components::{extract_components, ComponentBounds};
use crate::detection::ocr::{OcrOutcome, TextRecognizer};
use crate::detection::preprocessing;
use crate::models::{Component, TextRegion};

/// Keep/discard rule applied to OCR statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceRule {
    /// More words than this is accepted outright
    pub many_words: usize,
    /// Otherwise more words than this ...
    pub min_words: usize,
    /// ... on more lines than this ...
    pub min_lines: usize,
    /// ... with at least this many words per line ...
    pub words_per_line: usize,
    /// ... and more alphanumerics than this
    pub min_alphanumeric: usize,
}

impl Default for AcceptanceRule {
    fn default() -> Self {
        Self {
            many_words: 6,
            min_words: 3,
            min_lines: 1,
            words_per_line: 2,
            min_alphanumeric: 8,
        }
    }
}

impl AcceptanceRule {
    pub fn accepts(&self, outcome: &OcrOutcome) -> bool {
        let words = outcome.word_count();
        let lines = outcome.line_count();
        if words > self.many_words {
            return true;
        }
        words > self.min_words
            && lines > self.min_lines
            && words >= self.words_per_line * lines
            && alphanumeric_only(outcome.text()).len() > self.min_alphanumeric
    }
}

/// Strip everything except ASCII letters and digits
pub fn alphanumeric_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Side of the square used to bridge gaps between super boxes
    pub dilation: u32,
    pub bounds: ComponentBounds,
    pub rule: AcceptanceRule,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dilation: 5,
            bounds: ComponentBounds::SUPER_BOXES,
            rule: AcceptanceRule::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateResult {
    pub accepted_mask: GrayImage,
    pub regions: Vec<TextRegion>,
    pub rejected: usize,
}

/// Grayscale pixels of `component`, everything else black, cropped to its box
pub fn component_image(gray: &GrayImage, component: &Component) -> GrayImage {
    let rect = component.rect;
    let mut sub = GrayImage::new(rect.width as u32, rect.height as u32);
    for &(x, y) in &component.pixels {
        if x < gray.width() && y < gray.height() {
            sub.put_pixel(x - rect.x as u32, y - rect.y as u32, *gray.get_pixel(x, y));
        }
    }
    sub
}

/// Re-segment the super-box mask and keep the regions OCR believes are text.
///
/// Without a recognizer every component is accepted.
pub fn ocr_gate(
    super_mask: &GrayImage,
    gray: &GrayImage,
    recognizer: Option<&dyn TextRecognizer>,
    config: &GateConfig,
) -> GateResult {
    let mut bridged = preprocessing::dilate_rect(super_mask, config.dilation, config.dilation);
    let set = extract_components(&mut bridged, &config.bounds);
    let mut accepted_mask = set.mask;
    let mut regions = Vec::new();
    let mut rejected = 0;

    for (i, component) in set.components.into_iter().enumerate() {
        let outcome = match recognizer {
            Some(recognizer) => recognizer.recognize(&component_image(gray, &component)),
            None => OcrOutcome::Recognized {
                text: String::new(),
                word_count: 0,
                line_count: 0,
            },
        };

        if let OcrOutcome::Failed { reason } = &outcome {
            debug!(region = i, %reason, "OCR failed, treating region as empty");
        }

        if recognizer.is_none() || config.rule.accepts(&outcome) {
            debug!(
                region = i,
                words = outcome.word_count(),
                lines = outcome.line_count(),
                "Region accepted"
            );
            regions.push(TextRegion {
                rect: component.rect,
                text: outcome.text().to_string(),
                word_count: outcome.word_count(),
                line_count: outcome.line_count(),
            });
        } else {
            debug!(
                region = i,
                words = outcome.word_count(),
                lines = outcome.line_count(),
                "Region rejected"
            );
            component.paint(&mut accepted_mask, 0);
            rejected += 1;
        }
    }

    GateResult {
        accepted_mask,
        regions,
        rejected,
    }
}
