use image::GrayImage;

/// Axis-aligned box in working-image pixel coordinates
///
/// Width and height are always positive; use [`Rect::new`] to build one from
/// untrusted sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self { x, y, width, height })
    }

    /// Build from inclusive corner coordinates
    pub fn from_corners(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Option<Self> {
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// width / height
    pub fn elongation(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// height / width
    pub fn flatness(&self) -> f64 {
        self.height as f64 / self.width as f64
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow by `border` on every side, clamped to a `width` x `height` image.
    pub fn padded(&self, border: i32, width: u32, height: u32) -> Option<Rect> {
        let x = (self.x - border).max(0);
        let y = (self.y - border).max(0);
        let right = (self.right() + border).min(width as i32);
        let bottom = (self.bottom() + border).min(height as i32);
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Intersection with the `width` x `height` image plane.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Rect> {
        self.padded(0, width, height)
    }

    pub fn to_imageproc(&self) -> imageproc::rect::Rect {
        imageproc::rect::Rect::at(self.x, self.y).of_size(self.width as u32, self.height as u32)
    }
}

/// One connected region found by the flood fill
#[derive(Debug, Clone)]
pub struct Component {
    pub rect: Rect,
    pub area: u32,
    pub pixels: Vec<(u32, u32)>,
}

impl Component {
    pub fn elongation(&self) -> f64 {
        self.rect.elongation()
    }

    pub fn rectangularity(&self) -> f64 {
        self.area as f64 / self.rect.area() as f64
    }

    /// Paint this component's pixels with `value`.
    pub fn paint(&self, mask: &mut GrayImage, value: u8) {
        for &(x, y) in &self.pixels {
            mask.put_pixel(x, y, image::Luma([value]));
        }
    }
}

/// A region that passed the OCR gate
#[derive(Debug, Clone)]
pub struct TextRegion {
    pub rect: Rect,
    pub text: String,
    pub word_count: usize,
    pub line_count: usize,
}
