use super::point::PointF32;

/// Axis-aligned box in pixel coordinates, corners as (left, top) and
/// (right, bottom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Box in normalized `[0, 1]` coordinates, (ymin, xmin, ymax, xmax) order
/// as detection models report them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub ymin: f32,
    pub xmin: f32,
    pub ymax: f32,
    pub xmax: f32,
}

impl PixelBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> PixelBox {
        PixelBox {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn centroid(&self) -> PointF32 {
        PointF32 {
            x: (self.left + self.right) / 2.,
            y: (self.top + self.bottom) / 2.,
        }
    }
}

impl NormalizedBox {
    /// Rescales to pixel space against the target image dimensions.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelBox {
        PixelBox {
            left: self.xmin * width as f32,
            top: self.ymin * height as f32,
            right: self.xmax * width as f32,
            bottom: self.ymax * height as f32,
        }
    }
}

impl Into<imageproc::rect::Rect> for PixelBox {
    fn into(self) -> imageproc::rect::Rect {
        imageproc::rect::Rect::at(self.left.round() as i32, self.top.round() as i32).of_size(
            (self.width().round() as i64).max(1) as u32,
            (self.height().round() as i64).max(1) as u32,
        )
    }
}

/// One entry of a track's box history: where the object was on a past
/// frame, tagged with the track it belongs to.
#[derive(Debug, Clone)]
pub struct TrackedBox {
    pub bounds: PixelBox,
    pub track_id: String,
}

impl TrackedBox {
    pub fn new(bounds: PixelBox, track_id: impl Into<String>) -> TrackedBox {
        TrackedBox {
            bounds,
            track_id: track_id.into(),
        }
    }
}

/// Accumulated box history for one tracked object, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Track {
    pub path: Vec<TrackedBox>,
}
