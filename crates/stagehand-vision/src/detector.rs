use crate::types::FeatureVector;

/// A pixel-space bounding box, `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// True if the box lies entirely within a `frame_width` x `frame_height`
    /// frame.
    pub fn is_within_frame(&self, frame_width: f64, frame_height: f64) -> bool {
        self.x0 >= 0.0
            && self.y0 >= 0.0
            && self.x1 <= frame_width
            && self.y1 <= frame_height
            && self.x1 > self.x0
            && self.y1 > self.y0
    }
}

/// One detected-and-tracked mask/box pair for a single frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub track_id: u64,
    pub bbox: BBox,
}

/// Capability interface over a segmentation/detection tracker: given a
/// frame, produce zero or more tracked detections.
pub trait Detector: Send {
    fn detect(&mut self, frame: &image::RgbImage) -> Result<Vec<Detection>, String>;
}

/// Capability interface over the Re-ID network: given a cropped detection,
/// produce its embedding.
pub trait ReIdEncoder: Send {
    fn extract(&mut self, crop: &image::RgbImage) -> Result<FeatureVector, String>;
}

/// Detector that never finds anything, the same role `NullAsrEngine` plays
/// for the script pipeline: a placeholder wired in wherever no concrete
/// segmentation/tracking backend has been configured yet.
#[derive(Debug, Default)]
pub struct NoopDetector;

impl Detector for NoopDetector {
    fn detect(&mut self, _frame: &image::RgbImage) -> Result<Vec<Detection>, String> {
        Ok(Vec::new())
    }
}

/// Re-ID encoder that always returns the zero vector. Paired with
/// [`NoopDetector`] it makes the camera loop runnable end-to-end with no
/// real inference backend wired in.
#[derive(Debug, Default)]
pub struct NoopReIdEncoder;

impl ReIdEncoder for NoopReIdEncoder {
    fn extract(&mut self, _crop: &image::RgbImage) -> Result<FeatureVector, String> {
        Ok(FeatureVector([0.0; 512]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_within_frame_accepts_valid_box() {
        let bbox = BBox {
            x0: 10.0,
            y0: 10.0,
            x1: 100.0,
            y1: 200.0,
        };
        assert!(bbox.is_within_frame(640.0, 480.0));
    }

    #[test]
    fn bbox_outside_frame_is_rejected() {
        let bbox = BBox {
            x0: -5.0,
            y0: 10.0,
            x1: 100.0,
            y1: 200.0,
        };
        assert!(!bbox.is_within_frame(640.0, 480.0));
    }
}
