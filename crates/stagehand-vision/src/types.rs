/// Dense embedding produced by the Re-ID network. L2 distance is its metric;
/// there is no total order so this deliberately does not implement `Ord`.
#[derive(Debug, Clone)]
pub struct FeatureVector(pub [f32; 512]);

impl FeatureVector {
    pub fn l2_distance(&self, other: &FeatureVector) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A loaded identity: one directory under the descriptor store, holding the
/// Re-ID vectors extracted from every image in it.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub identity_id: String,
    pub vectors: Vec<FeatureVector>,
}

/// A point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// Camera-to-stage calibration: the source quad in image pixels, the stage
/// dimensions in metres, and the resulting homography.
#[derive(Debug, Clone)]
pub struct StagePlane {
    pub src_quad: [Point2; 4],
    pub width_m: f64,
    pub height_m: f64,
    pub h: nalgebra::Matrix3<f64>,
}

