//! Where road-scene detections come from.
//!
//! Object detection itself runs outside this crate. Detections arrive either
//! as a fixed list or as a JSON box file written by the external detector.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use dl_protocol::{BoundingBox, Detection};

use crate::error::DetectorError;
use crate::inference::ImageSource;

/// Source of detections for an image. Order of the returned list is preserved
/// through prompt, log, and result.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &ImageSource) -> Result<Vec<Detection>, DetectorError>;

    /// Detector name (for logging).
    fn name(&self) -> &str;
}

/// Returns the same detections for every image.
pub struct StaticDetector {
    detections: Vec<Detection>,
}

impl StaticDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

#[async_trait]
impl Detector for StaticDetector {
    async fn detect(&self, _image: &ImageSource) -> Result<Vec<Detection>, DetectorError> {
        Ok(self.detections.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Box file written by the external object detector.
#[derive(Debug, Deserialize)]
struct BoxFile {
    image_width: f64,
    #[serde(default)]
    boxes: Vec<RawBox>,
}

#[derive(Debug, Deserialize)]
struct RawBox {
    label: String,
    confidence: f64,
    /// `[x1, y1, x2, y2]` in pixels.
    bbox: [f64; 4],
}

/// Reads raw boxes from a JSON file and reduces them to left/right detections.
///
/// File shape:
/// `{"image_width": 640, "boxes": [{"label": "pothole", "confidence": 0.93, "bbox": [10, 200, 110, 260]}]}`
pub struct BoxFileDetector {
    path: Option<PathBuf>,
}

impl BoxFileDetector {
    /// Read boxes from a fixed file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Read boxes from `<image stem>.boxes.json` next to each image.
    pub fn sidecar() -> Self {
        Self { path: None }
    }

    fn resolve(&self, image: &ImageSource) -> Result<PathBuf, DetectorError> {
        match (&self.path, image.path()) {
            (Some(path), _) => Ok(path.clone()),
            (None, Some(image_path)) => Ok(sidecar_path(image_path)),
            (None, None) => Err(DetectorError::NoSource),
        }
    }
}

/// `road/scene.jpg` → `road/scene.boxes.json`
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("boxes.json")
}

/// Convert a parsed box file into validated detections, preserving order.
fn detections_from(file: BoxFile) -> Result<Vec<Detection>, DetectorError> {
    file.boxes
        .into_iter()
        .map(|raw| -> Result<Detection, DetectorError> {
            let [x1, y1, x2, y2] = raw.bbox;
            let det = Detection::from_box(
                raw.label,
                raw.confidence,
                BoundingBox { x1, y1, x2, y2 },
                file.image_width,
            );
            det.validate()?;
            Ok(det)
        })
        .collect()
}

#[async_trait]
impl Detector for BoxFileDetector {
    async fn detect(&self, image: &ImageSource) -> Result<Vec<Detection>, DetectorError> {
        let path = self.resolve(image)?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| DetectorError::Io {
                path: path.clone(),
                source,
            })?;
        let file: BoxFile = serde_json::from_str(&contents)?;
        let detections = detections_from(file)?;
        tracing::debug!(path = %path.display(), count = detections.len(), "detections loaded");
        Ok(detections)
    }

    fn name(&self) -> &str {
        "box_file"
    }
}
