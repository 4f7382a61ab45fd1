#![warn(unused_extern_crates)]

//! Drawing helpers for overlaying object detections, regions of interest
//! and track trails on in-memory video frames.
//!
//! A frame is a caller-owned `(height, width, 3)` RGB array. Every drawing
//! routine converts it to an [`image::RgbImage`], rasterizes, and copies the
//! pixels back through the caller's `&mut` binding. The detection model
//! itself stays behind the [`Detector`] trait so nothing here depends on a
//! particular runtime.

pub mod annotate;
pub mod detect;
pub mod frame;
pub mod palette;
pub mod shapes;

pub use annotate::{
    default_font, draw_bounding_box_on_image, draw_boxes, draw_boxes_and_lines, draw_roi_on_frame,
    draw_tracking_lines,
};
pub use detect::{Detections, Detector, DetectorOutput, object_detect_image};
pub use frame::{Frame, load_frame, resize_frame};
pub use shapes::point::PointF32;
pub use shapes::rect::{NormalizedBox, PixelBox, Track, TrackedBox};
