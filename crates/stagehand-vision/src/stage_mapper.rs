use nalgebra::{Matrix3, Vector3};
use stagehand_foundation::VisionError;

use crate::types::{Point2, StagePlane};

/// C7: turns four image-space corner points plus stage dimensions into a
/// homography, and applies it to map detections onto the stage plane.
pub struct StageMapper {
    plane: StagePlane,
}

impl StageMapper {
    /// Builds a mapper from four (not-yet-sorted) source points and the
    /// stage's physical dimensions in metres.
    pub fn new(src_points: [Point2; 4], width_m: f64, height_m: f64) -> Result<Self, VisionError> {
        if !(width_m.is_finite() && width_m > 0.0 && height_m.is_finite() && height_m > 0.0) {
            return Err(VisionError::InvalidHomographyDimensions {
                width: width_m,
                height: height_m,
            });
        }

        let src_quad = sort_clockwise(src_points);
        let h = compute_homography(&src_quad, width_m, height_m)?;

        Ok(Self {
            plane: StagePlane {
                src_quad,
                width_m,
                height_m,
                h,
            },
        })
    }

    pub fn plane(&self) -> &StagePlane {
        &self.plane
    }

    /// Maps an image-space point onto the stage plane via the stored
    /// homography.
    pub fn transform(&self, p_img: Point2) -> Point2 {
        apply_homography(&self.plane.h, p_img)
    }

    pub fn point_in_quad(&self, p: Point2) -> bool {
        point_in_quad(&self.plane.src_quad, p)
    }

    pub fn clamp_to_quad_edge(&self, p: Point2) -> Point2 {
        clamp_to_quad_edge(&self.plane.src_quad, p)
    }
}

/// Sorts four points clockwise around their centroid using `atan2(y-cy,
/// x-cx)`, so the matched destination corners (`(0,0),(W,0),(W,H),(0,H)`)
/// always line up regardless of the order the caller supplied them in.
pub fn sort_clockwise(points: [Point2; 4]) -> [Point2; 4] {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let mut sorted = points;
    sorted.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a.partial_cmp(&angle_b).unwrap()
    });
    sorted
}

/// Standard DLT (Direct Linear Transform) in double precision: solves for
/// the 3x3 homography mapping `src` onto the destination rectangle
/// `(0,0),(W,0),(W,H),(0,H)`.
fn compute_homography(
    src: &[Point2; 4],
    width_m: f64,
    height_m: f64,
) -> Result<Matrix3<f64>, VisionError> {
    let dst = [
        Point2 { x: 0.0, y: 0.0 },
        Point2 { x: width_m, y: 0.0 },
        Point2 {
            x: width_m,
            y: height_m,
        },
        Point2 { x: 0.0, y: height_m },
    ];

    let mut a = nalgebra::DMatrix::<f64>::zeros(8, 8);
    let mut b = nalgebra::DVector::<f64>::zeros(8);

    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (xp, yp) = (dst[i].x, dst[i].y);

        a.set_row(
            2 * i,
            &nalgebra::RowDVector::from_vec(vec![x, y, 1.0, 0.0, 0.0, 0.0, -x * xp, -y * xp]),
        );
        b[2 * i] = xp;

        a.set_row(
            2 * i + 1,
            &nalgebra::RowDVector::from_vec(vec![0.0, 0.0, 0.0, x, y, 1.0, -x * yp, -y * yp]),
        );
        b[2 * i + 1] = yp;
    }

    let decomp = a.clone().lu();
    let h_vec = decomp
        .solve(&b)
        .ok_or(VisionError::SingularHomography)?;

    Ok(Matrix3::new(
        h_vec[0], h_vec[1], h_vec[2], h_vec[3], h_vec[4], h_vec[5], h_vec[6], h_vec[7], 1.0,
    ))
}

fn apply_homography(h: &Matrix3<f64>, p: Point2) -> Point2 {
    let v = Vector3::new(p.x, p.y, 1.0);
    let mapped = h * v;
    Point2 {
        x: mapped.x / mapped.z,
        y: mapped.y / mapped.z,
    }
}

fn point_in_quad(quad: &[Point2; 4], p: Point2) -> bool {
    let mut inside = false;
    let mut j = 3;
    for i in 0..4 {
        let (xi, yi) = (quad[i].x, quad[i].y);
        let (xj, yj) = (quad[j].x, quad[j].y);
        if ((yi > p.y) != (yj > p.y))
            && (p.x < (xj - xi) * (p.y - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Projects `p` onto the nearest point on the quad's boundary, grounded in
/// the original tracker's closest-point-on-polygon helper: the minimum over
/// each edge's closest-point-on-segment projection.
fn clamp_to_quad_edge(quad: &[Point2; 4], p: Point2) -> Point2 {
    let mut best = closest_point_on_segment(quad[3], quad[0], p);
    let mut best_dist = distance(best, p);

    for i in 0..3 {
        let candidate = closest_point_on_segment(quad[i], quad[i + 1], p);
        let d = distance(candidate, p);
        if d < best_dist {
            best_dist = d;
            best = candidate;
        }
    }
    best
}

fn closest_point_on_segment(a: Point2, b: Point2, p: Point2) -> Point2 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return a;
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    Point2 {
        x: a.x + t * dx,
        y: a.y + t * dy,
    }
}

fn distance(a: Point2, b: Point2) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis_aligned_quad() -> [Point2; 4] {
        // Deliberately out of clockwise order; `sort_clockwise` must fix it.
        [
            Point2 { x: 0.0, y: 0.0 },
            Point2 { x: 0.0, y: 10.0 },
            Point2 { x: 10.0, y: 10.0 },
            Point2 { x: 10.0, y: 0.0 },
        ]
    }

    #[test]
    fn sort_clockwise_orders_corners_consistently() {
        let sorted = sort_clockwise(axis_aligned_quad());
        // Image y grows downward, so clockwise from top-left is
        // top-left -> top-right -> bottom-right -> bottom-left.
        assert_eq!(sorted[0], Point2 { x: 0.0, y: 0.0 });
    }

    #[test]
    fn homography_maps_corners_to_destination_rectangle() {
        let mapper = StageMapper::new(axis_aligned_quad(), 5.0, 3.0).unwrap();
        let mapped = mapper.transform(Point2 { x: 0.0, y: 0.0 });
        assert!((mapped.x).abs() < 1e-6);
        assert!((mapped.y).abs() < 1e-6);

        let mapped = mapper.transform(Point2 { x: 10.0, y: 10.0 });
        assert!((mapped.x - 5.0).abs() < 1e-6);
        assert!((mapped.y - 3.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        let result = StageMapper::new(axis_aligned_quad(), 0.0, 3.0);
        assert!(matches!(
            result,
            Err(VisionError::InvalidHomographyDimensions { .. })
        ));
    }

    #[test]
    fn point_in_quad_detects_interior_and_exterior_points() {
        let mapper = StageMapper::new(axis_aligned_quad(), 5.0, 3.0).unwrap();
        assert!(mapper.point_in_quad(Point2 { x: 5.0, y: 5.0 }));
        assert!(!mapper.point_in_quad(Point2 { x: -5.0, y: 5.0 }));
    }

    #[test]
    fn clamp_to_quad_edge_projects_exterior_points_onto_the_boundary() {
        let mapper = StageMapper::new(axis_aligned_quad(), 5.0, 3.0).unwrap();
        let clamped = mapper.clamp_to_quad_edge(Point2 { x: -5.0, y: 5.0 });
        assert!((clamped.x - 0.0).abs() < 1e-6);
    }
}
