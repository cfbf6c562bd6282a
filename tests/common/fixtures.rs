use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use textspot::{OcrOutcome, TextRecognizer};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Left edge of the first word in [`paragraph_image`]
pub const PARAGRAPH_LEFT: u32 = 100;
/// Top of the first line in [`paragraph_image`]
pub const PARAGRAPH_TOP: u32 = 200;
/// Exclusive right edge of the last word
pub const PARAGRAPH_RIGHT: u32 = 560;
/// Exclusive bottom edge of the second line
pub const PARAGRAPH_BOTTOM: u32 = 256;

/// 1400x600 white page with two lines of six solid black "words" each.
///
/// Words are 60x24 with 20px spacing, lines start 32px apart.
pub fn paragraph_image() -> RgbImage {
    let mut img = ImageBuffer::from_pixel(1400, 600, WHITE);
    for line in 0..2 {
        let top = PARAGRAPH_TOP + line * 32;
        for word in 0..6 {
            let left = PARAGRAPH_LEFT + word * 80;
            fill(&mut img, left, top, 60, 24, BLACK);
        }
    }
    img
}

pub fn fill(img: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            img.put_pixel(x, y, color);
        }
    }
}

/// Plain white image saved as `name` inside `dir`
pub fn write_blank_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img: RgbImage = ImageBuffer::from_pixel(width, height, WHITE);
    img.save(&path).expect("Failed to save test image");
    path
}

pub fn recognized(text: &str, word_count: usize, line_count: usize) -> OcrOutcome {
    OcrOutcome::Recognized {
        text: text.to_string(),
        word_count,
        line_count,
    }
}

/// Recognizer returning the same outcome for every region, counting calls
pub struct FixedRecognizer {
    outcome: OcrOutcome,
    calls: AtomicUsize,
    sizes: Mutex<Vec<(u32, u32)>>,
}

impl FixedRecognizer {
    pub fn new(outcome: OcrOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(recognized("OPEN DAILY\nFRESH BREAD", 9, 2))
    }

    pub fn failing() -> Self {
        Self::new(OcrOutcome::Failed {
            reason: "engine unavailable".to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Dimensions of every image passed in, in call order
    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.sizes.lock().unwrap().clone()
    }
}

impl TextRecognizer for FixedRecognizer {
    fn recognize(&self, image: &GrayImage) -> OcrOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().unwrap().push(image.dimensions());
        self.outcome.clone()
    }
}
