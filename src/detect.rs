use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use ndarray::{ArrayD, ArrayView1, ArrayView2, ArrayView4, Axis, Slice};
use tracing::debug;

use crate::frame::{Frame, load_frame};

pub const NUM_DETECTIONS: &str = "num_detections";
pub const DETECTION_BOXES: &str = "detection_boxes";
pub const DETECTION_SCORES: &str = "detection_scores";
pub const DETECTION_CLASSES: &str = "detection_classes";

/// Raw model output: field name to array, each with a leading batch
/// dimension of size 1.
pub type DetectorOutput = HashMap<String, ArrayD<f32>>;

/// An opaque, pre-trained detection model.
///
/// Input is a single-item batch of RGB pixels as f32, shape (1, H, W, 3).
/// Implementations must report at least [`NUM_DETECTIONS`],
/// [`DETECTION_BOXES`], [`DETECTION_SCORES`] and [`DETECTION_CLASSES`];
/// anything else they emit is carried through untouched.
pub trait Detector {
    fn detect(&self, input: ArrayView4<'_, f32>) -> Result<DetectorOutput>;
}

/// Per-object detection arrays, unpacked from a detector's batched output:
/// batch index 0 of every field, truncated to the reported detection count.
#[derive(Debug, Clone)]
pub struct Detections {
    pub num_detections: usize,
    /// Class ids, coerced from the model's float field.
    pub classes: Vec<i64>,
    fields: HashMap<String, ArrayD<f32>>,
}

impl Detections {
    fn from_batched(mut output: DetectorOutput) -> Result<Detections> {
        let num = output
            .remove(NUM_DETECTIONS)
            .with_context(|| format!("detector output is missing {NUM_DETECTIONS}"))?;
        let num = *num
            .iter()
            .next()
            .with_context(|| format!("{NUM_DETECTIONS} is empty"))? as usize;

        let mut fields = HashMap::new();
        for (name, value) in output {
            let unbatched = value.index_axis_move(Axis(0), 0);
            if unbatched.ndim() == 0 {
                bail!("field {name} has no per-detection axis");
            }
            let rows = unbatched.len_of(Axis(0));
            let trimmed = unbatched
                .slice_axis(Axis(0), Slice::from(..num.min(rows)))
                .to_owned();
            fields.insert(name, trimmed);
        }

        let classes = fields
            .remove(DETECTION_CLASSES)
            .with_context(|| format!("detector output is missing {DETECTION_CLASSES}"))?
            .iter()
            .map(|&c| c as i64)
            .collect();

        Ok(Detections {
            num_detections: num,
            classes,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.fields.get(name)
    }

    /// Normalized (ymin, xmin, ymax, xmax) rows, one per detection.
    pub fn boxes(&self) -> Result<ArrayView2<'_, f32>> {
        self.field(DETECTION_BOXES)
            .with_context(|| format!("detector output is missing {DETECTION_BOXES}"))?
            .view()
            .into_dimensionality()
            .context("detection boxes are not (n, 4) shaped")
    }

    pub fn scores(&self) -> Result<ArrayView1<'_, f32>> {
        self.field(DETECTION_SCORES)
            .with_context(|| format!("detector output is missing {DETECTION_SCORES}"))?
            .view()
            .into_dimensionality()
            .context("detection scores are not a flat array")
    }
}

/// Loads the image at `path`, runs it through the detector as a
/// single-item float batch, and unpacks the batched output. Returns the
/// pixel array alongside the per-object result set.
pub fn object_detect_image<D: Detector>(
    path: impl AsRef<Path>,
    detector: &D,
) -> Result<(Frame, Detections)> {
    let path = path.as_ref();
    let frame = load_frame(path)?;

    let input = frame.mapv(|v| v as f32).insert_axis(Axis(0));
    let output = detector
        .detect(input.view())
        .with_context(|| format!("running detector on {}", path.display()))?;

    let detections = Detections::from_batched(output)?;
    debug!(
        "detector returned {} detections for {}",
        detections.num_detections,
        path.display()
    );

    Ok((frame, detections))
}
