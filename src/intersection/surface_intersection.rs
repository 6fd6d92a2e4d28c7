use nalgebra::{Point3, Vector2};

use crate::misc::FloatingPoint;

/// Traced intersection curve between two parametric surfaces.
///
/// Two equal-length ordered sequences of parameter pairs, one per
/// surface, with `A(uvs_a[i]) ≈ B(uvs_b[i])` within the tracing
/// tolerance. Built once by a single trace and immutable afterwards; the
/// 3D points are surface A evaluated along the curve, captured at
/// construction so the record keeps no reference to either surface.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceIntersection<T: FloatingPoint> {
    uvs_a: Vec<Vector2<T>>,
    uvs_b: Vec<Vector2<T>>,
    points: Vec<Point3<T>>,
    looped: bool,
    singular_crossed: bool,
    too_short: bool,
}

impl<T: FloatingPoint> SurfaceIntersection<T> {
    pub(crate) fn new(
        uvs_a: Vec<Vector2<T>>,
        uvs_b: Vec<Vector2<T>>,
        points: Vec<Point3<T>>,
        looped: bool,
        singular_crossed: bool,
        too_short: bool,
    ) -> Self {
        debug_assert_eq!(uvs_a.len(), uvs_b.len());
        debug_assert_eq!(uvs_a.len(), points.len());
        Self {
            uvs_a,
            uvs_b,
            points,
            looped,
            singular_crossed,
            too_short,
        }
    }

    /// Parameter pairs on surface A.
    pub fn uvs_a(&self) -> &[Vector2<T>] {
        &self.uvs_a
    }

    /// Parameter pairs on surface B.
    pub fn uvs_b(&self) -> &[Vector2<T>] {
        &self.uvs_b
    }

    /// Surface A evaluated along the curve.
    pub fn points(&self) -> &[Point3<T>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.uvs_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uvs_a.is_empty()
    }

    /// The curve closes on itself.
    pub fn looped(&self) -> bool {
        self.looped
    }

    /// The trace passed through a point where the two surface normals
    /// were parallel.
    pub fn singular_crossed(&self) -> bool {
        self.singular_crossed
    }

    /// The step budget ran out before natural termination.
    pub fn too_short(&self) -> bool {
        self.too_short
    }

    /// Whether a refined start point would re-trace this curve.
    ///
    /// Compared against the traced 3D points rather than in parameter
    /// space, because the two parameterizations can differ in speed.
    pub fn can_be_started_by(&self, point: &Point3<T>, tolerance: T) -> bool {
        self.points.iter().any(|p| (p - point).norm() < tolerance)
    }
}
