use std::time::Instant;

/// Latest stage-plane position of the tracked performer. Written by the
/// tracking pipeline's camera loop (C8), read by the lamp control loop (C9)
/// through a single-writer/single-reader cell; a stale read is acceptable
/// and is exactly what the lamp loop's freshness check guards against.
#[derive(Debug, Clone, Copy)]
pub struct RealWorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub observed_at: Instant,
}
