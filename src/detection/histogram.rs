//! Splitting of boxes that hold several stacked text lines.

use image::GrayImage;

use crate::models::Rect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitterConfig {
    /// Only boxes wider than this are examined
    pub min_width: i32,
    /// The histogram varies enough when `min * contrast < max`
    pub contrast: u32,
    /// Ink runs must be longer than this many rows to count as a line
    pub min_run: u32,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            min_width: 100,
            contrast: 5,
            min_run: 8,
        }
    }
}

/// Non-zero pixel count of each row of `rect` in `mask`
pub fn row_histogram(mask: &GrayImage, rect: &Rect) -> Vec<u32> {
    let Some(rect) = rect.clamped(mask.width(), mask.height()) else {
        return Vec::new();
    };
    (rect.y..rect.bottom())
        .map(|y| {
            (rect.x..rect.right())
                .filter(|&x| mask.get_pixel(x as u32, y as u32)[0] != 0)
                .count() as u32
        })
        .collect()
}

/// Row offsets (relative to the box top) at which the box should be cut.
///
/// Always starts with 0 and ends with `histogram.len()`.
pub fn split_points(histogram: &[u32], config: &SplitterConfig) -> Vec<usize> {
    let len = histogram.len();
    let mut points = vec![0];
    let (Some(&min), Some(&max)) = (histogram.iter().min(), histogram.iter().max()) else {
        return points;
    };
    if min.saturating_mul(config.contrast) >= max {
        points.push(len);
        return points;
    }

    let level = max as f64 / config.contrast as f64;
    let mut run_len = 0u32;
    let mut run_start = 0usize;
    let mut counted_runs = 0usize;
    let mut previous_end: Option<usize> = None;

    for (row, &count) in histogram.iter().enumerate() {
        if count as f64 > level {
            if run_len == 0 {
                run_start = row;
            }
            run_len += 1;
            if run_len == config.min_run + 1 {
                if counted_runs > 0 {
                    if let Some(end) = previous_end {
                        points.push((end + run_start) / 2);
                    }
                }
                counted_runs += 1;
            }
        } else {
            if run_len > config.min_run {
                previous_end = Some(row - 1);
            }
            run_len = 0;
        }
    }

    points.push(len);
    points.dedup();
    points
}

/// Cut `rect` into horizontal bands. Returns `vec![rect]` when it holds one line.
pub fn split_rect(rect: &Rect, mask: &GrayImage, config: &SplitterConfig) -> Vec<Rect> {
    if rect.width <= config.min_width {
        return vec![*rect];
    }
    let histogram = row_histogram(mask, rect);
    let points = split_points(&histogram, config);
    if points.len() <= 2 {
        return vec![*rect];
    }
    points
        .windows(2)
        .filter_map(|w| Rect::new(rect.x, rect.y + w[0] as i32, rect.width, (w[1] - w[0]) as i32))
        .collect()
}

/// Apply [`split_rect`] to every box. Split boxes are replaced by their bands,
/// which are appended after the boxes that passed through unchanged.
pub fn split_stacked_lines(rects: Vec<Rect>, mask: &GrayImage, config: &SplitterConfig) -> Vec<Rect> {
    let mut kept = Vec::with_capacity(rects.len());
    let mut bands = Vec::new();
    for rect in rects {
        let mut parts = split_rect(&rect, mask, config);
        if parts.len() == 1 {
            kept.append(&mut parts);
        } else {
            bands.append(&mut parts);
        }
    }
    kept.extend(bands);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn banded(width: u32, height: u32, bands: &[(u32, u32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |_, y| {
            let ink = bands.iter().any(|&(a, b)| y >= a && y <= b);
            Luma([if ink { 255 } else { 0 }])
        })
    }

    #[test]
    fn two_bands_split_into_two_boxes() {
        let mask = banded(200, 40, &[(0, 10), (25, 35)]);
        let rect = Rect::new(0, 0, 200, 40).unwrap();

        let parts = split_rect(&rect, &mask, &SplitterConfig::default());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], Rect::new(0, 0, 200, 17).unwrap());
        assert_eq!(parts[1], Rect::new(0, 17, 200, 23).unwrap());

        let top = parts.iter().map(|r| r.y).min().unwrap();
        let bottom = parts.iter().map(|r| r.bottom()).max().unwrap();
        assert_eq!((top, bottom), (rect.y, rect.bottom()));
        assert!(parts.iter().all(|p| p.x == rect.x && p.width == rect.width));
    }

    #[test]
    fn uniform_histogram_is_untouched() {
        let mask = banded(200, 40, &[(0, 39)]);
        let rect = Rect::new(0, 0, 200, 40).unwrap();
        assert_eq!(split_rect(&rect, &mask, &SplitterConfig::default()), vec![rect]);
    }

    #[test]
    fn narrow_boxes_are_not_examined() {
        let mask = banded(200, 40, &[(0, 10), (25, 35)]);
        let rect = Rect::new(0, 0, 100, 40).unwrap();
        assert_eq!(split_rect(&rect, &mask, &SplitterConfig::default()), vec![rect]);
    }

    #[test]
    fn short_runs_do_not_create_lines() {
        let mask = banded(200, 40, &[(0, 10), (20, 24), (30, 39)]);
        let rect = Rect::new(0, 0, 200, 40).unwrap();
        let parts = split_rect(&rect, &mask, &SplitterConfig::default());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].height, 20);
    }

    #[test]
    fn single_run_with_contrast_stays_whole() {
        let mask = banded(200, 40, &[(5, 30)]);
        let rect = Rect::new(0, 0, 200, 40).unwrap();
        assert_eq!(split_rect(&rect, &mask, &SplitterConfig::default()), vec![rect]);
    }

    #[test]
    fn split_boxes_are_appended_after_pass_through() {
        let mut mask = banded(400, 40, &[(0, 10), (25, 35)]);
        for y in 0..40 {
            for x in 300..400 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let stacked = Rect::new(0, 0, 200, 40).unwrap();
        let solid = Rect::new(300, 0, 100, 40).unwrap();
        let out = split_stacked_lines(vec![stacked, solid], &mask, &SplitterConfig::default());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], solid);
        assert_eq!(out[1].y, 0);
        assert_eq!(out[2].y, 17);
    }
}
