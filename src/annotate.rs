use std::collections::HashMap;

use ab_glyph::{Font, FontRef, PxScale};
use anyhow::{Context, Result, bail};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use ndarray::ArrayView2;
use tracing::{debug, trace};

use crate::frame::{Frame, copy_into_frame, frame_to_image};
use crate::palette::color_for;
use crate::shapes::point::PointF32;
use crate::shapes::rect::{NormalizedBox, PixelBox, Track, TrackedBox};

const FONT_BYTES: &[u8] = include_bytes!("../fonts/DejaVuSans.ttf");

/// Outline width for detection and tracker boxes.
pub const BOX_THICKNESS: u32 = 4;

/// Pixel height of label text drawn with the embedded font.
pub const DEFAULT_LABEL_SCALE: f32 = 16.;

// Each display string gets this much breathing room above and below.
const LABEL_MARGIN_PCT: f32 = 0.05;

const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// The label font compiled into the crate.
pub fn default_font() -> Result<FontRef<'static>> {
    FontRef::try_from_slice(FONT_BYTES).context("parsing embedded label font")
}

/// Draws a closed polygon outline through `pts`, in order, connecting the
/// last point back to the first. A single point degenerates to a dot.
pub fn draw_roi_on_frame(
    frame: &mut Frame,
    pts: &[PointF32],
    thickness: u32,
    color: Rgb<u8>,
) -> Result<()> {
    let first = match pts.first() {
        Some(p) => *p,
        None => bail!("cannot draw a region of interest through zero points"),
    };

    let mut img = frame_to_image(frame)?;
    for pair in pts.windows(2) {
        draw_thick_segment(&mut img, pair[0], pair[1], thickness, color);
    }
    // close the outline back to where it started
    if let Some(last) = pts.last() {
        draw_thick_segment(&mut img, *last, first, thickness, color);
    }

    copy_into_frame(frame, &img)
}

/// Draws one bounding box outline plus a stack of label blocks, each a
/// filled rectangle in the box color with black text on top.
///
/// Labels normally stack upward, ending at the box top. When their total
/// height would run off the top edge of the image, the stack starts at the
/// box top and grows downward instead.
pub fn draw_bounding_box_on_image(
    img: &mut RgbImage,
    bounds: PixelBox,
    color: Rgb<u8>,
    font: &impl Font,
    scale: PxScale,
    thickness: u32,
    display_strs: &[String],
) {
    draw_box_outline(img, bounds, thickness, color);

    let total_height: f32 = display_strs
        .iter()
        .map(|s| text_size(scale, font, s).1 as f32)
        .sum::<f32>()
        * (1. + 2. * LABEL_MARGIN_PCT);

    let mut text_bottom = if bounds.top > total_height {
        bounds.top
    } else {
        bounds.top + total_height
    };

    // Last string lands closest to the box edge.
    for s in display_strs.iter().rev() {
        let (text_width, text_height) = text_size(scale, font, s);
        let (text_width, text_height) = (text_width as f32, text_height as f32);
        let margin = (LABEL_MARGIN_PCT * text_height).ceil();

        let background = Rect::at(
            bounds.left.round() as i32,
            (text_bottom - text_height - 2. * margin).round() as i32,
        )
        .of_size(
            (text_width.round() as i64).max(1) as u32,
            ((text_height + 2. * margin).round() as i64).max(1) as u32,
        );
        draw_filled_rect_mut(img, background, color);
        draw_text_mut(
            img,
            TEXT_COLOR,
            (bounds.left + margin).round() as i32,
            (text_bottom - text_height - margin).round() as i32,
            scale,
            font,
            s,
        );

        text_bottom -= text_height - 2. * margin;
    }
}

/// Overlays labeled boxes for a detection result set, in array order.
///
/// At most `max_boxes` entries are considered and entries scoring below
/// `min_score` are skipped. Rows of `boxes` are normalized
/// (ymin, xmin, ymax, xmax) coordinates; labels render as
/// `"<class>: <score>%"` and every box of a class shares that class's
/// palette color.
pub fn draw_boxes(
    frame: &mut Frame,
    boxes: ArrayView2<f32>,
    class_names: &[String],
    scores: &[f32],
    max_boxes: usize,
    min_score: f32,
) -> Result<()> {
    let font = default_font()?;
    let scale = PxScale::from(DEFAULT_LABEL_SCALE);

    let mut img = frame_to_image(frame)?;
    let (width, height) = img.dimensions();

    let mut drawn = 0;
    for i in 0..boxes.nrows().min(max_boxes) {
        if scores[i] < min_score {
            trace!("skipping box {i}: score {} below threshold", scores[i]);
            continue;
        }

        let row = boxes.row(i);
        let bounds = NormalizedBox {
            ymin: row[0],
            xmin: row[1],
            ymax: row[2],
            xmax: row[3],
        }
        .to_pixels(width, height);

        let label = format!(
            "{}: {}%",
            class_names[i],
            (100. * scores[i]).round() as i32
        );
        draw_bounding_box_on_image(
            &mut img,
            bounds,
            color_for(&class_names[i]),
            &font,
            scale,
            BOX_THICKNESS,
            &[label],
        );
        drawn += 1;
    }
    debug!("drew {drawn} of {} boxes", boxes.nrows());

    copy_into_frame(frame, &img)
}

/// Draws the trajectory trail for one tracked object: a polyline through
/// the centroids of its box history, in sequence order. Fewer than two
/// entries draw nothing.
pub fn draw_tracking_lines(img: &mut RgbImage, path: &[TrackedBox], color: Rgb<u8>, thickness: u32) {
    for pair in path.windows(2) {
        draw_thick_segment(
            img,
            pair[0].bounds.centroid(),
            pair[1].bounds.centroid(),
            thickness,
            color,
        );
    }
}

/// Overlays every active tracker as a labeled box plus its trajectory
/// trail. The color hashes the track id together with the class name, so
/// two objects of the same class stay visually distinct.
pub fn draw_boxes_and_lines(
    frame: &mut Frame,
    trackers: &[TrackedBox],
    tracks: &HashMap<String, Track>,
    class_name: &str,
) -> Result<()> {
    let font = default_font()?;
    let scale = PxScale::from(DEFAULT_LABEL_SCALE);

    for tracker in trackers {
        let track = tracks
            .get(&tracker.track_id)
            .with_context(|| format!("no history for track {}", tracker.track_id))?;
        let label = format!("{}: {class_name}", tracker.track_id);
        let color = color_for(&format!("{}{class_name}", tracker.track_id));

        let mut img = frame_to_image(frame)?;
        draw_bounding_box_on_image(
            &mut img,
            tracker.bounds,
            color,
            &font,
            scale,
            BOX_THICKNESS,
            &[label],
        );
        draw_tracking_lines(&mut img, &track.path, color, BOX_THICKNESS);
        copy_into_frame(frame, &img)?;
    }

    Ok(())
}

fn draw_box_outline(img: &mut RgbImage, bounds: PixelBox, thickness: u32, color: Rgb<u8>) {
    // imageproc rects are one pixel wide; nest them inward to thicken
    for i in 0..thickness.max(1) {
        let rect = Rect::at(
            bounds.left.round() as i32 + i as i32,
            bounds.top.round() as i32 + i as i32,
        )
        .of_size(
            (bounds.width().round() as i64 - 2 * i as i64).max(1) as u32,
            (bounds.height().round() as i64 - 2 * i as i64).max(1) as u32,
        );
        draw_hollow_rect_mut(img, rect, color);
    }
}

fn draw_thick_segment(
    img: &mut RgbImage,
    from: PointF32,
    to: PointF32,
    thickness: u32,
    color: Rgb<u8>,
) {
    // fan single-pixel segments out along the minor axis
    let horizontal_ish = (to.x - from.x).abs() >= (to.y - from.y).abs();
    for i in 0..thickness.max(1) {
        let offset = i as f32 - thickness.saturating_sub(1) as f32 / 2.;
        let (dx, dy) = if horizontal_ish {
            (0., offset)
        } else {
            (offset, 0.)
        };
        draw_line_segment_mut(
            img,
            (from.x + dx, from.y + dy),
            (to.x + dx, to.y + dy),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    fn rgb_at(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        [frame[[y, x, 0]], frame[[y, x, 1]], frame[[y, x, 2]]]
    }

    #[test]
    fn test_roi_outline_is_closed() {
        let mut frame = Frame::zeros((100, 100, 3));
        let pts: Vec<PointF32> = [(10., 10.), (60., 10.), (60., 60.), (10., 60.)]
            .into_iter()
            .map(PointF32::from)
            .collect();

        draw_roi_on_frame(&mut frame, &pts, 1, RED).unwrap();

        assert_eq!(frame.dim(), (100, 100, 3));
        // the closing segment from (10, 60) back up to (10, 10)
        assert_eq!(rgb_at(&frame, 10, 35), [255, 0, 0]);
        // and the explicit edges
        assert_eq!(rgb_at(&frame, 35, 10), [255, 0, 0]);
        assert_eq!(rgb_at(&frame, 60, 35), [255, 0, 0]);
    }

    #[test]
    fn test_roi_rejects_empty_points() {
        let mut frame = Frame::zeros((10, 10, 3));
        assert!(draw_roi_on_frame(&mut frame, &[], 1, RED).is_err());
    }

    #[test]
    fn test_roi_single_point_degenerates_to_dot() {
        let mut frame = Frame::zeros((10, 10, 3));
        draw_roi_on_frame(&mut frame, &[PointF32::new(5., 5.)], 1, RED).unwrap();
        assert_eq!(rgb_at(&frame, 5, 5), [255, 0, 0]);
    }

    #[test]
    fn test_draw_boxes_respects_cap_and_threshold() {
        let mut frame = Frame::zeros((100, 100, 3));
        let boxes = arr2(&[
            [0.1f32, 0.1, 0.3, 0.3],
            [0.4, 0.4, 0.6, 0.6],
            [0.7, 0.7, 0.9, 0.9],
        ]);
        let names = vec!["cat".to_string(), "cat".to_string(), "cat".to_string()];
        let scores = [0.9, 0.05, 0.9];

        draw_boxes(&mut frame, boxes.view(), &names, &scores, 2, 0.1).unwrap();

        let cat = color_for("cat").0;
        // first box drawn in the class color
        assert_eq!(rgb_at(&frame, 20, 10), cat);
        // second box is under the score threshold
        assert_eq!(rgb_at(&frame, 50, 40), [0, 0, 0]);
        // third box is past max_boxes, even though it scores well
        assert_eq!(rgb_at(&frame, 80, 70), [0, 0, 0]);
    }

    #[test]
    fn test_draw_boxes_is_deterministic() {
        let boxes = arr2(&[[0.2f32, 0.2, 0.8, 0.8]]);
        let names = vec!["dog".to_string()];

        let mut a = Frame::zeros((60, 60, 3));
        let mut b = Frame::zeros((60, 60, 3));
        draw_boxes(&mut a, boxes.view(), &names, &[0.75], 10, 0.1).unwrap();
        draw_boxes(&mut b, boxes.view(), &names, &[0.75], 10, 0.1).unwrap();

        assert_eq!(a, b);
    }

    // any green pixel strictly above the box top, with a little rounding slop
    fn any_green_above(img: &RgbImage, top: u32) -> bool {
        (0..top.saturating_sub(2))
            .any(|y| (0..img.width()).any(|x| img.get_pixel(x, y) == &GREEN))
    }

    #[test]
    fn test_label_stacks_down_near_top_edge_and_up_otherwise() {
        let font = default_font().unwrap();
        let scale = PxScale::from(DEFAULT_LABEL_SCALE);
        let label = "7: person".to_string();
        let (_, text_height) = text_size(scale, &font, &label);
        let text_height = text_height as f32;
        let margin = (LABEL_MARGIN_PCT * text_height).ceil();
        let block = text_height + 2. * margin;

        // too close to the top edge: the stack grows downward from the box
        // top, so nothing renders above it
        let mut img = RgbImage::new(200, 200);
        let bounds = PixelBox::new(20., 5., 120., 80.);
        draw_bounding_box_on_image(&mut img, bounds, GREEN, &font, scale, 2, &[label.clone()]);
        assert!(!any_green_above(&img, 5));

        // plenty of headroom: the stack sits above the box, ending at its top
        let mut img = RgbImage::new(200, 200);
        let bounds = PixelBox::new(20., 100., 120., 180.);
        draw_bounding_box_on_image(&mut img, bounds, GREEN, &font, scale, 2, &[label]);
        assert!(any_green_above(&img, 100));
        assert_eq!(img.get_pixel(20, (100. - block / 2.).round() as u32), &GREEN);
        // interior of the box stays clean
        assert_eq!(img.get_pixel(25, 110), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_box_outline_thickness() {
        let mut img = RgbImage::new(100, 100);
        let bounds = PixelBox::new(10., 10., 60., 60.);
        draw_bounding_box_on_image(
            &mut img,
            bounds,
            GREEN,
            &default_font().unwrap(),
            PxScale::from(DEFAULT_LABEL_SCALE),
            4,
            &[],
        );

        // four nested rects on the left edge, then clean interior
        for x in 10..14 {
            assert_eq!(img.get_pixel(x, 35), &GREEN);
        }
        assert_eq!(img.get_pixel(15, 35), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_tracking_lines_connect_centroids() {
        let mut img = RgbImage::new(100, 100);
        let path = [
            TrackedBox::new(PixelBox::new(0., 0., 20., 20.), "3"),
            TrackedBox::new(PixelBox::new(40., 0., 60., 20.), "3"),
        ];

        draw_tracking_lines(&mut img, &path, RED, 1);

        // centroids are (10, 10) and (50, 10)
        assert_eq!(img.get_pixel(30, 10), &RED);
        assert_eq!(img.get_pixel(30, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_tracking_lines_need_two_points() {
        let mut img = RgbImage::new(50, 50);
        let path = [TrackedBox::new(PixelBox::new(0., 0., 20., 20.), "3")];
        draw_tracking_lines(&mut img, &path, RED, 1);
        assert!(img.pixels().all(|p| p == &Rgb([0, 0, 0])));
    }

    #[test]
    fn test_boxes_and_lines_color_by_track_and_class() {
        let mut frame = Frame::zeros((100, 100, 3));
        let trackers = [
            TrackedBox::new(PixelBox::new(10., 40., 40., 70.), "1"),
            TrackedBox::new(PixelBox::new(60., 40., 90., 70.), "2"),
        ];
        let mut tracks = HashMap::new();
        for t in &trackers {
            tracks.insert(
                t.track_id.clone(),
                Track {
                    path: vec![t.clone()],
                },
            );
        }

        draw_boxes_and_lines(&mut frame, &trackers, &tracks, "person").unwrap();

        // distinct ids of one class land on distinct palette entries
        assert_eq!(rgb_at(&frame, 20, 40), color_for("1person").0);
        assert_eq!(rgb_at(&frame, 75, 40), color_for("2person").0);
        assert_ne!(color_for("1person"), color_for("2person"));
    }

    #[test]
    fn test_boxes_and_lines_missing_track_errors() {
        let mut frame = Frame::zeros((50, 50, 3));
        let trackers = [TrackedBox::new(PixelBox::new(5., 5., 20., 20.), "9")];
        let err = draw_boxes_and_lines(&mut frame, &trackers, &HashMap::new(), "person")
            .unwrap_err();
        assert!(err.to_string().contains("9"));
    }
}
