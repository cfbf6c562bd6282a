use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::models::Rect;

/// Extra shape limits applied by the strict filter variants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeBounds {
    /// Exclusive ceiling on `(min/max side) * w * h`
    pub max_rara: f64,
    /// Exclusive ceiling on `(min/max side) * (w + h) / 2`
    pub max_rarav: f64,
    /// Exclusive ceiling on box height
    pub max_height: i32,
}

/// Limits for accepting a contour's bounding box as a text candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourFilterConfig {
    /// Exclusive floor on the filled fraction of the box
    pub min_fill_ratio: f64,
    /// Both sides must exceed this
    pub min_side: i32,
    /// Exclusive floor on box area
    pub min_area: i64,
    /// Exclusive ceiling on box area
    pub max_area: i64,
    pub shape: Option<ShapeBounds>,
}

impl ContourFilterConfig {
    pub const STRICT: Self = Self {
        min_fill_ratio: 0.3,
        min_side: 10,
        min_area: 200,
        max_area: 100_000,
        shape: Some(ShapeBounds {
            max_rara: 6000.0,
            max_rarav: 50.0,
            max_height: 75,
        }),
    };

    /// Strict limits with the lower weighted-area ceiling
    pub const TIGHT: Self = Self {
        shape: Some(ShapeBounds {
            max_rara: 5000.0,
            max_rarav: 50.0,
            max_height: 75,
        }),
        ..Self::STRICT
    };

    pub const LENIENT: Self = Self {
        min_fill_ratio: 0.3,
        min_side: 10,
        min_area: 200,
        max_area: 300_000,
        shape: None,
    };

    pub fn accepts(&self, rect: &Rect, fill_ratio: f64) -> bool {
        let area = rect.area();
        let basic = fill_ratio > self.min_fill_ratio
            && rect.width > self.min_side
            && rect.height > self.min_side
            && area > self.min_area
            && area < self.max_area;
        if !basic {
            return false;
        }
        match &self.shape {
            None => true,
            Some(shape) => {
                let metrics = ShapeMetrics::of(rect);
                metrics.rara < shape.max_rara
                    && metrics.rarav < shape.max_rarav
                    && rect.height < shape.max_height
            }
        }
    }
}

impl Default for ContourFilterConfig {
    fn default() -> Self {
        Self::STRICT
    }
}

/// Relative-aspect-ratio weighted size scores of a box
#[derive(Debug, Clone, Copy)]
pub struct ShapeMetrics {
    pub rara: f64,
    pub rarav: f64,
}

impl ShapeMetrics {
    pub fn of(rect: &Rect) -> Self {
        let w = rect.width as f64;
        let h = rect.height as f64;
        let relative = w.min(h) / w.max(h);
        Self {
            rara: relative * w * h,
            rarav: relative * (w + h) / 2.0,
        }
    }
}

/// Output of the contour filter
#[derive(Debug, Clone)]
pub struct ContourCandidates {
    pub rects: Vec<Rect>,
    /// Accepted rectangles, filled
    pub candidate_mask: GrayImage,
    /// Accepted contours, filled with their holes left open
    pub final_mask: GrayImage,
}

/// Keep the bounding boxes of outer borders that look like text blobs.
///
/// Every outer border is examined, including blobs nested inside another
/// blob's hole, so text framed by a sign border still reaches later stages.
pub fn filter_contours(mask: &GrayImage, config: &ContourFilterConfig) -> ContourCandidates {
    let (width, height) = mask.dimensions();
    let mut candidate_mask = GrayImage::new(width, height);
    let mut final_mask = GrayImage::new(width, height);
    let mut rects = Vec::new();

    let contours = find_contours::<i32>(mask);

    for (idx, contour) in contours.iter().enumerate() {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let Some(rect) = bounding_rect(&contour.points) else {
            continue;
        };

        if !config.accepts(&rect, fill_ratio(contour, &rect)) {
            continue;
        }

        draw_filled_rect_mut(&mut candidate_mask, rect.to_imageproc(), Luma([255]));
        fill_points(&mut final_mask, &contour.points, (0, 0), 255);
        for hole in contours
            .iter()
            .filter(|c| c.parent == Some(idx) && c.border_type == BorderType::Hole)
        {
            fill_points(&mut final_mask, &hole.points, (0, 0), 0);
            for p in &hole.points {
                put_clamped(&mut final_mask, p.x, p.y, 255);
            }
        }
        rects.push(rect);
    }

    ContourCandidates {
        rects,
        candidate_mask,
        final_mask,
    }
}

pub fn bounding_rect(points: &[Point<i32>]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Rect::from_corners(min_x, min_y, max_x, max_y)
}

/// Fraction of the bounding box covered by the filled contour
fn fill_ratio(contour: &Contour<i32>, rect: &Rect) -> f64 {
    let mut local = GrayImage::new(rect.width as u32, rect.height as u32);
    fill_points(&mut local, &contour.points, (rect.x, rect.y), 255);
    let filled = local.pixels().filter(|p| p[0] != 0).count();
    filled as f64 / rect.area() as f64
}

/// Fill the polygon traced by `points`, shifted by `-origin`
fn fill_points(canvas: &mut GrayImage, points: &[Point<i32>], origin: (i32, i32), value: u8) {
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for p in points {
        let local = Point::new(p.x - origin.0, p.y - origin.1);
        if poly.last() != Some(&local) {
            poly.push(local);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    match poly.len() {
        0 => {}
        1 => put_clamped(canvas, poly[0].x, poly[0].y, value),
        2 => draw_line_segment_mut(
            canvas,
            (poly[0].x as f32, poly[0].y as f32),
            (poly[1].x as f32, poly[1].y as f32),
            Luma([value]),
        ),
        _ => draw_polygon_mut(canvas, &poly, Luma([value])),
    }
}

fn put_clamped(canvas: &mut GrayImage, x: i32, y: i32, value: u8) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, Luma([value]));
    }
}
