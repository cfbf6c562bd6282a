//! Connected-component extraction by seeded flood fill.
//!
//! The input mask is scanned row-major. Each unvisited foreground pixel seeds
//! an 8-connected fill; the resulting region is kept or discarded by its
//! pixel area, elongation and rectangularity.

use image::{GrayImage, Luma};

use crate::models::{Component, Rect};

const FIRST_MARKER: u8 = 2;

/// Acceptance bounds for flood-filled components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentBounds {
    /// Smallest accepted pixel area (inclusive)
    pub area_min: u32,
    /// Largest accepted pixel area (inclusive)
    pub area_max: u32,
    /// Exclusive lower bound on width / height
    pub elongation_min: f64,
    /// Exclusive upper bound on width / height
    pub elongation_max: f64,
    /// Exclusive lower bound on area / (width * height)
    pub rectangularity_min: f64,
}

impl ComponentBounds {
    /// Bounds used to consolidate overlapping candidate rectangles
    pub const CANDIDATES: Self = Self {
        area_min: 200,
        area_max: 300_000,
        elongation_min: 0.025,
        elongation_max: 40.0,
        rectangularity_min: 0.3,
    };

    /// Relaxed bounds used to re-segment the dilated super-box mask
    pub const SUPER_BOXES: Self = Self {
        area_min: 2000,
        area_max: 1_000_000,
        elongation_min: 0.025,
        elongation_max: 40.0,
        rectangularity_min: 0.3,
    };

    fn accepts_shape(&self, component: &Component) -> bool {
        let elongation = component.elongation();
        component.rectangularity() > self.rectangularity_min
            && elongation > self.elongation_min
            && elongation < self.elongation_max
    }

    fn accepts_area(&self, area: u32) -> bool {
        area >= self.area_min && area <= self.area_max
    }
}

/// Result of a component extraction
#[derive(Debug, Clone)]
pub struct ComponentSet {
    /// 255 on every pixel of an accepted component
    pub mask: GrayImage,
    pub components: Vec<Component>,
}

impl ComponentSet {
    pub fn rects(&self) -> Vec<Rect> {
        self.components.iter().map(|c| c.rect).collect()
    }
}

/// Transient fill tag cycling through `2..=255`.
///
/// Two fills may share a tag; whether a pixel was already processed is
/// decided by the visited mask alone.
struct FillMarker(u8);

impl FillMarker {
    fn next(&mut self) -> u8 {
        self.0 = if self.0 == u8::MAX { FIRST_MARKER } else { self.0 + 1 };
        self.0
    }
}

/// Segment `foreground` into 8-connected components.
///
/// `foreground` is rewritten in place: pixels of components outside the area
/// bounds become 0, pixels of every other component become 1.
pub fn extract_components(foreground: &mut GrayImage, bounds: &ComponentBounds) -> ComponentSet {
    let (width, height) = foreground.dimensions();
    let mut visited = vec![false; width as usize * height as usize];
    let mut marker = FillMarker(FIRST_MARKER);
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            if visited[idx] || foreground.get_pixel(x, y)[0] == 0 {
                continue;
            }

            let tag = marker.next();
            let component = flood_fill(foreground, &mut visited, &mut stack, (x, y), tag);

            if !bounds.accepts_area(component.area) {
                component.paint(foreground, 0);
                continue;
            }
            component.paint(foreground, 1);

            if bounds.accepts_shape(&component) {
                components.push(component);
            }
        }
    }

    let mut mask = GrayImage::new(width, height);
    for component in &components {
        component.paint(&mut mask, 255);
    }

    ComponentSet { mask, components }
}

/// 8-connected fill from `seed`, tagging reached pixels with `tag`
fn flood_fill(
    foreground: &mut GrayImage,
    visited: &mut [bool],
    stack: &mut Vec<(u32, u32)>,
    seed: (u32, u32),
    tag: u8,
) -> Component {
    let (width, height) = foreground.dimensions();
    let mut pixels = Vec::new();
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (seed.0, seed.1, seed.0, seed.1);

    stack.clear();
    stack.push(seed);
    visited[(seed.1 * width + seed.0) as usize] = true;

    while let Some((x, y)) = stack.pop() {
        foreground.put_pixel(x, y, Luma([tag]));
        pixels.push((x, y));
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);

        let x_lo = x.saturating_sub(1);
        let y_lo = y.saturating_sub(1);
        let x_hi = (x + 1).min(width - 1);
        let y_hi = (y + 1).min(height - 1);
        for ny in y_lo..=y_hi {
            for nx in x_lo..=x_hi {
                let idx = (ny * width + nx) as usize;
                if !visited[idx] && foreground.get_pixel(nx, ny)[0] != 0 {
                    visited[idx] = true;
                    stack.push((nx, ny));
                }
            }
        }
    }

    pixels.sort_unstable_by_key(|&(x, y)| (y, x));
    let area = pixels.len() as u32;
    let rect = Rect {
        x: min_x as i32,
        y: min_y as i32,
        width: (max_x - min_x + 1) as i32,
        height: (max_y - min_y + 1) as i32,
    };
    Component { rect, area, pixels }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(mask: &mut GrayImage, x0: u32, y0: u32, size: u32) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    const SMALL: ComponentBounds = ComponentBounds {
        area_min: 50,
        area_max: 500,
        elongation_min: 0.5,
        elongation_max: 2.0,
        rectangularity_min: 0.5,
    };

    #[test]
    fn two_separated_squares_give_two_components() {
        let mut mask = GrayImage::new(100, 40);
        square(&mut mask, 5, 10, 12);
        square(&mut mask, 67, 10, 12);

        let set = extract_components(&mut mask, &SMALL);
        assert_eq!(set.components.len(), 2);
        for c in &set.components {
            assert_eq!(c.area, 144);
            assert_eq!((c.rect.width, c.rect.height), (12, 12));
        }
        assert_eq!(set.components[0].rect.x, 5);
        assert_eq!(set.components[1].rect.x, 67);
        assert_eq!(set.mask.pixels().filter(|p| p[0] == 255).count(), 288);
    }

    #[test]
    fn diagonal_neighbours_are_connected() {
        let mut mask = GrayImage::new(10, 10);
        for i in 0..8 {
            mask.put_pixel(i, i, Luma([255]));
        }
        let bounds = ComponentBounds {
            area_min: 1,
            area_max: 100,
            elongation_min: 0.0,
            elongation_max: 10.0,
            rectangularity_min: 0.0,
        };
        let set = extract_components(&mut mask, &bounds);
        assert_eq!(set.components.len(), 1);
        assert_eq!(set.components[0].area, 8);
    }

    #[test]
    fn area_rejects_are_cleared_from_input_and_output() {
        let mut mask = GrayImage::new(60, 60);
        square(&mut mask, 2, 2, 3);
        square(&mut mask, 20, 20, 12);

        let set = extract_components(&mut mask, &SMALL);
        assert_eq!(set.components.len(), 1);
        for y in 2..5 {
            for x in 2..5 {
                assert_eq!(mask.get_pixel(x, y)[0], 0);
                assert_eq!(set.mask.get_pixel(x, y)[0], 0);
            }
        }
        assert_eq!(mask.get_pixel(25, 25)[0], 1);
    }

    #[test]
    fn shape_rejects_leave_no_output_mark() {
        let mut mask = GrayImage::new(60, 20);
        // 40x3 bar: elongation 13.3
        for y in 5..8 {
            for x in 5..45 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let set = extract_components(&mut mask, &SMALL);
        assert!(set.components.is_empty());
        assert!(set.mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn rerunning_on_output_is_stable() {
        let mut mask = GrayImage::new(120, 60);
        square(&mut mask, 5, 5, 12);
        square(&mut mask, 40, 5, 15);
        square(&mut mask, 80, 30, 2);

        let first = extract_components(&mut mask, &SMALL);
        let mut again = first.mask.clone();
        let second = extract_components(&mut again, &SMALL);
        assert_eq!(first.rects(), second.rects());
        assert_eq!(first.mask, second.mask);
    }

    #[test]
    fn more_components_than_markers() {
        let mut mask = GrayImage::new(600, 3);
        for x in (0..600).step_by(2) {
            mask.put_pixel(x, 1, Luma([255]));
        }
        let bounds = ComponentBounds {
            area_min: 1,
            area_max: 1,
            elongation_min: 0.5,
            elongation_max: 2.0,
            rectangularity_min: 0.5,
        };
        let set = extract_components(&mut mask, &bounds);
        assert_eq!(set.components.len(), 300);
    }

    #[test]
    fn empty_mask_yields_nothing() {
        let mut mask = GrayImage::new(0, 0);
        assert!(extract_components(&mut mask, &SMALL).components.is_empty());
        let mut mask = GrayImage::new(10, 10);
        assert!(extract_components(&mut mask, &SMALL).components.is_empty());
    }
}
