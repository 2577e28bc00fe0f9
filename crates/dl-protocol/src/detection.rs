use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position tag for objects whose box centre lies in the left half of the frame.
pub const POSITION_LEFT: &str = "왼쪽";
/// Position tag for objects whose box centre lies in the right half of the frame.
pub const POSITION_RIGHT: &str = "오른쪽";

/// One object recognized in a road scene by the external detector.
///
/// Field order matters: detections are serialized into prompts and log rows
/// with `label`, `confidence`, `position` in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label (e.g., "pothole", "person", "자동차").
    pub label: String,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    /// Coarse position tag ("왼쪽"/"오른쪽" or a named zone like "left lane").
    pub position: String,
}

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn center_x(&self) -> f64 {
        (self.x1 + self.x2) / 2.0
    }
}

/// A detection that violates the data model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("confidence {confidence} for '{label}' is outside [0, 1]")]
    ConfidenceOutOfRange { label: String, confidence: f64 },
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64, position: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            confidence,
            position: position.into(),
        }
    }

    /// Build a detection from a raw detector box.
    ///
    /// The position tag is derived from the horizontal centre of the box
    /// relative to the image width, and confidence is rounded to two decimals.
    pub fn from_box(
        label: impl Into<String>,
        confidence: f64,
        bbox: BoundingBox,
        image_width: f64,
    ) -> Self {
        let position = horizontal_position(bbox.center_x(), image_width);
        Self {
            label: label.into(),
            confidence: (confidence * 100.0).round() / 100.0,
            position: position.to_string(),
        }
    }

    /// Check the confidence invariant.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence) {
            Ok(())
        } else {
            Err(DetectionError::ConfidenceOutOfRange {
                label: self.label.clone(),
                confidence: self.confidence,
            })
        }
    }
}

/// Map a horizontal centre coordinate to a left/right position tag.
pub fn horizontal_position(center_x: f64, image_width: f64) -> &'static str {
    if center_x < image_width / 2.0 {
        POSITION_LEFT
    } else {
        POSITION_RIGHT
    }
}

/// Validate every detection in a sequence, stopping at the first violation.
pub fn validate_all(detections: &[Detection]) -> Result<(), DetectionError> {
    detections.iter().try_for_each(Detection::validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_box_left_half() {
        let bbox = BoundingBox {
            x1: 10.0,
            y1: 200.0,
            x2: 110.0,
            y2: 260.0,
        };
        let det = Detection::from_box("pothole", 0.9349, bbox, 640.0);
        assert_eq!(det.position, POSITION_LEFT);
        assert_eq!(det.confidence, 0.93);
        assert_eq!(det.label, "pothole");
    }

    #[test]
    fn from_box_centre_counts_as_right() {
        let bbox = BoundingBox {
            x1: 300.0,
            y1: 0.0,
            x2: 340.0,
            y2: 50.0,
        };
        let det = Detection::from_box("person", 0.88, bbox, 640.0);
        assert_eq!(det.position, POSITION_RIGHT);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(Detection::new("car", 0.0, "left").validate().is_ok());
        assert!(Detection::new("car", 1.0, "left").validate().is_ok());
        assert!(Detection::new("car", 1.01, "left").validate().is_err());
        assert!(Detection::new("car", -0.1, "left").validate().is_err());
        assert!(Detection::new("car", f64::NAN, "left").validate().is_err());
    }

    #[test]
    fn validate_all_reports_first_offender() {
        let dets = vec![
            Detection::new("car", 0.5, "left"),
            Detection::new("truck", 7.0, "right"),
        ];
        let err = validate_all(&dets).unwrap_err();
        assert!(err.to_string().contains("truck"));
    }

    #[test]
    fn serialization_keeps_hangul_unescaped() {
        let det = Detection::new("자동차", 0.75, POSITION_LEFT);
        let json = serde_json::to_string(&det).unwrap();
        assert_eq!(
            json,
            r#"{"label":"자동차","confidence":0.75,"position":"왼쪽"}"#
        );
        let back: Detection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, det);
    }
}
