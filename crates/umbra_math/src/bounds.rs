use crate::{Mat4, Vec3, CAMERA_NEAR};

/// Axis-aligned bounding volume over every drawable's world-space points.
///
/// Starts empty and grows as points are merged. Feeds the shadow frustum fit
/// and the camera's far plane.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SceneBounds {
    min: Vec3,
    max: Vec3,
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl SceneBounds {
    /// Bounds containing nothing.
    pub const EMPTY: SceneBounds = SceneBounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an empty bounding volume.
    pub fn empty() -> Self {
        Self::EMPTY
    }

    /// Create the bounding volume of a point set.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::EMPTY;
        bounds.merge(points.iter().copied());
        bounds
    }

    /// Grow the volume to include every point.
    pub fn merge<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = Vec3>,
    {
        for point in points {
            self.merge_point(point);
        }
    }

    /// Grow the volume to include a single point.
    pub fn merge_point(&mut self, point: Vec3) {
        // NaN components would poison min/max permanently
        if !point.is_finite() {
            return;
        }
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow the volume to include another volume.
    pub fn merge_bounds(&mut self, other: &SceneBounds) {
        if !other.is_empty() {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    /// True until the first point is merged.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Vector from the min corner to the max corner.
    pub fn diagonal(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Center of the volume (origin when empty).
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.min + self.diagonal() * 0.5
        }
    }

    /// Length of the diagonal.
    pub fn size(&self) -> f32 {
        self.diagonal().length()
    }

    /// The 8 distinct corners of the volume.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// The 12 edges as 24 line-list points.
    pub fn edges(&self) -> [Vec3; 24] {
        const EDGES: [(usize, usize); 12] = [
            (0, 1), (2, 3), (4, 5), (6, 7), // along X
            (0, 2), (1, 3), (4, 6), (5, 7), // along Y
            (0, 4), (1, 5), (2, 6), (3, 7), // along Z
        ];

        let corners = self.corners();
        let mut points = [Vec3::ZERO; 24];
        for (i, (start, end)) in EDGES.iter().enumerate() {
            points[i * 2] = corners[*start];
            points[i * 2 + 1] = corners[*end];
        }
        points
    }

    /// Near/far planes that tightly enclose the volume for the given view.
    ///
    /// The raw fit pads the near plane by 10% toward the eye and the far plane
    /// by 10% away from it. The near plane never goes below `CAMERA_NEAR`,
    /// which the soft-shadow filter assumes.
    pub fn tight_near_far(&self, view: Mat4) -> (f32, f32) {
        if self.is_empty() {
            return (CAMERA_NEAR, CAMERA_NEAR * 1000.0);
        }

        let mut view_bounds = SceneBounds::empty();
        view_bounds.merge(self.corners().iter().map(|c| view.transform_point3(*c)));

        // Visible depth is negative in view space
        let near = (-0.9 * view_bounds.max.z).max(CAMERA_NEAR);
        let far = (-1.1 * view_bounds.min.z).max(near + CAMERA_NEAR);
        (near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bounds() {
        let bounds = SceneBounds::empty();
        assert!(bounds.is_empty());
        assert_eq!(bounds.size(), 0.0);
        assert_eq!(bounds.center(), Vec3::ZERO);
    }

    #[test]
    fn test_merge_points() {
        let mut bounds = SceneBounds::empty();
        bounds.merge([Vec3::new(-1.0, 2.0, 0.5), Vec3::new(3.0, -4.0, 1.0)]);

        assert_eq!(bounds.min(), Vec3::new(-1.0, -4.0, 0.5));
        assert_eq!(bounds.max(), Vec3::new(3.0, 2.0, 1.0));
        assert_eq!(bounds.center(), Vec3::new(1.0, -1.0, 0.75));
        assert!((bounds.size() - Vec3::new(4.0, 6.0, 0.5).length()).abs() < 0.001);
    }

    #[test]
    fn test_merge_keeps_min_below_max_and_size_growing() {
        let sets: [&[Vec3]; 4] = [
            &[Vec3::ZERO],
            &[Vec3::new(5.0, -2.0, 1.0), Vec3::new(-3.0, 0.0, 0.0)],
            &[Vec3::new(0.1, 0.1, 0.1)],
            &[Vec3::new(-10.0, 10.0, -10.0), Vec3::new(2.0, 2.0, 20.0)],
        ];

        let mut bounds = SceneBounds::empty();
        let mut last_size = bounds.size();
        for set in sets {
            bounds.merge(set.iter().copied());
            assert!(bounds.min().cmple(bounds.max()).all());
            assert!(bounds.size() >= last_size);
            last_size = bounds.size();
        }
    }

    #[test]
    fn test_single_point_has_zero_size() {
        let bounds = SceneBounds::from_points(&[Vec3::new(1.0, 2.0, 3.0)]);
        assert!(!bounds.is_empty());
        assert_eq!(bounds.size(), 0.0);
        assert_eq!(bounds.center(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_non_finite_points_ignored() {
        let mut bounds = SceneBounds::from_points(&[Vec3::ZERO, Vec3::ONE]);
        bounds.merge_point(Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(bounds.max(), Vec3::ONE);
    }

    #[test]
    fn test_corners_are_distinct() {
        let bounds = SceneBounds::from_points(&[Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)]);
        let corners = bounds.corners();
        for i in 0..8 {
            for j in (i + 1)..8 {
                assert_ne!(corners[i], corners[j]);
            }
        }
    }

    #[test]
    fn test_edges_have_axis_aligned_segments() {
        let bounds = SceneBounds::from_points(&[Vec3::ZERO, Vec3::ONE]);
        let edges = bounds.edges();
        assert_eq!(edges.len(), 24);
        for segment in edges.chunks(2) {
            let delta = (segment[1] - segment[0]).abs();
            assert!((delta.x + delta.y + delta.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_merge_bounds() {
        let mut a = SceneBounds::from_points(&[Vec3::ZERO, Vec3::ONE]);
        let b = SceneBounds::from_points(&[Vec3::splat(-1.0)]);
        a.merge_bounds(&b);
        a.merge_bounds(&SceneBounds::empty());
        assert_eq!(a.min(), Vec3::splat(-1.0));
        assert_eq!(a.max(), Vec3::ONE);
    }

    #[test]
    fn test_tight_near_far() {
        let bounds = SceneBounds::from_points(&[Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let (near, far) = bounds.tight_near_far(view);

        assert!((near - 0.9 * 9.0).abs() < 0.001);
        assert!((far - 1.1 * 11.0).abs() < 0.001);
    }

    #[test]
    fn test_tight_near_clamped_inside_volume() {
        let bounds = SceneBounds::from_points(&[Vec3::splat(-5.0), Vec3::splat(5.0)]);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let (near, far) = bounds.tight_near_far(view);

        assert_eq!(near, CAMERA_NEAR);
        assert!(far > near);
    }
}
