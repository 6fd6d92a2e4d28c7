use crate::bounding_box::BoundingBox;
use crate::misc::FloatingPoint;

/// A 3D bounding box tagged with the (u, v) sub-range of the surface it
/// covers. Used to prune the search space for overlapping regions.
#[derive(Clone, Debug)]
pub struct SurfacePatch<T: FloatingPoint> {
    pub u_range: (T, T),
    pub v_range: (T, T),
    pub bounds: BoundingBox<T>,
}
