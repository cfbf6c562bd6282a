use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

const MAX_MASK_SIDE: u32 = 511;

/// Resize to a fixed width keeping the aspect ratio (nearest neighbour)
pub fn resize_to_width(img: &DynamicImage, target_width: u32) -> DynamicImage {
    if img.width() == 0 || img.height() == 0 || img.width() == target_width {
        return img.clone();
    }
    let scale = target_width as f64 / img.width() as f64;
    let target_height = ((img.height() as f64 * scale) as u32).max(1);
    img.resize_exact(target_width, target_height, FilterType::Nearest)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Morphological gradient (dilation minus erosion) over a 3x3 cross
pub fn morphological_gradient(img: &GrayImage) -> GrayImage {
    let cross = Mask::diamond(1);
    let mut out = grayscale_dilate(img, &cross);
    let eroded = grayscale_erode(img, &cross);
    for (hi, lo) in out.pixels_mut().zip(eroded.pixels()) {
        hi[0] = hi[0].saturating_sub(lo[0]);
    }
    out
}

/// Binarize at the Otsu level: pixels above it become 255
pub fn binarize_otsu(img: &GrayImage) -> GrayImage {
    let level = otsu_level(img);
    threshold(img, level, ThresholdType::Binary)
}

/// Dilate with a `kernel_w` x `kernel_h` rectangle anchored at its centre
pub fn dilate_rect(mask: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    let (row, column) = rect_masks(kernel_w, kernel_h);
    grayscale_dilate(&grayscale_dilate(mask, &row), &column)
}

/// Erode with a `kernel_w` x `kernel_h` rectangle anchored at its centre
pub fn erode_rect(mask: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    let (row, column) = rect_masks(kernel_w, kernel_h);
    grayscale_erode(&grayscale_erode(mask, &row), &column)
}

/// Morphological closing (dilate then erode) with a rectangle
pub fn close_rect(mask: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    erode_rect(&dilate_rect(mask, kernel_w, kernel_h), kernel_w, kernel_h)
}

/// Pixel-wise AND of two same-sized masks
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let (width, height) = a.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if x < b.width() && y < b.height() {
            Luma([a.get_pixel(x, y)[0] & b.get_pixel(x, y)[0]])
        } else {
            Luma([0])
        }
    })
}

/// Row and column masks whose composition is the rectangle.
///
/// The anchor sits at `len / 2`, so dilating with an even length grows a
/// mask one pixel further forward than back. Lengths are capped at the 511 pixels a mask can span.
fn rect_masks(kernel_w: u32, kernel_h: u32) -> (Mask, Mask) {
    (line_mask(kernel_w, true), line_mask(kernel_h, false))
}

fn line_mask(len: u32, horizontal: bool) -> Mask {
    let len = len.clamp(1, MAX_MASK_SIDE);
    let anchor = (len / 2) as u8;
    if horizontal {
        Mask::from_image(&GrayImage::from_pixel(len, 1, Luma([255])), anchor, 0)
    } else {
        Mask::from_image(&GrayImage::from_pixel(1, len, Luma([255])), 0, anchor)
    }
}

/// Blend `color` into every pixel of `target` where `mask` is set
pub fn overlay_mask(target: &mut image::RgbImage, mask: &GrayImage, color: [u8; 3]) {
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 || x >= target.width() || y >= target.height() {
            continue;
        }
        let px = target.get_pixel_mut(x, y);
        for c in 0..3 {
            px[c] = ((px[c] as u16 + color[c] as u16) / 2) as u8;
        }
    }
}
