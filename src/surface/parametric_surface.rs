use nalgebra::{Point3, Vector3};

use crate::bounding_box::BoundingBox;
use crate::misc::FloatingPoint;

use super::{SurfacePatch, UVDirection};

/// Grid cells per axis used by the default patch subdivision.
const PATCH_DIVISIONS: usize = 8;

/// Samples per axis inside one patch cell.
const PATCH_SAMPLES: usize = 4;

/// Second derivatives of a surface at a parameter pair.
#[derive(Debug, Clone, Copy)]
pub struct SecondDerivatives<T: FloatingPoint> {
    pub duu: Vector3<T>,
    pub duv: Vector3<T>,
    pub dvv: Vector3<T>,
}

/// Operation set the intersection core requires from a surface.
///
/// A surface maps a rectangular (u, v) domain to 3D points with continuous
/// tangents. Closed (periodic) surfaces report the wrap through
/// [`ParametricSurface::u_closed_at`] / [`ParametricSurface::v_closed_at`]
/// so that out-of-range parameters can be wrapped instead of clamped.
pub trait ParametricSurface<T: FloatingPoint> {
    /// Evaluate the surface point at (u, v).
    fn point_at(&self, u: T, v: T) -> Point3<T>;

    /// First derivative along u.
    fn tangent_u(&self, u: T, v: T) -> Vector3<T>;

    /// First derivative along v.
    fn tangent_v(&self, u: T, v: T) -> Vector3<T>;

    /// Closed u parameter interval.
    fn u_domain(&self) -> (T, T);

    /// Closed v parameter interval.
    fn v_domain(&self) -> (T, T);

    /// Unit surface normal, zero at tangent-degenerate points.
    fn normal_at(&self, u: T, v: T) -> Vector3<T> {
        let n = self.tangent_u(u, v).cross(&self.tangent_v(u, v));
        n.try_normalize(T::default_epsilon())
            .unwrap_or_else(Vector3::zeros)
    }

    /// Second derivatives, `None` when the representation does not provide
    /// them. The intersection core never calls this; offset-surface
    /// wrappers built on top of it do.
    fn try_second_derivatives(&self, _u: T, _v: T) -> Option<SecondDerivatives<T>> {
        None
    }

    fn domain_at(&self, direction: UVDirection) -> (T, T) {
        match direction {
            UVDirection::U => self.u_domain(),
            UVDirection::V => self.v_domain(),
        }
    }

    /// Whether the surface is geometrically closed along u at the
    /// cross-section v, tested by comparing the 3D positions at the two
    /// ends of the u range.
    fn u_closed_at(&self, v: T) -> bool {
        let (umin, umax) = self.u_domain();
        let d = self.point_at(umin, v) - self.point_at(umax, v);
        d.norm() < T::from_f64(1e-6).unwrap()
    }

    /// Whether the surface is geometrically closed along v at the
    /// cross-section u.
    fn v_closed_at(&self, u: T) -> bool {
        let (vmin, vmax) = self.v_domain();
        let d = self.point_at(u, vmin) - self.point_at(u, vmax);
        d.norm() < T::from_f64(1e-6).unwrap()
    }

    /// Sub-boxes of the surface tagged with the (u, v) sub-range they
    /// cover.
    ///
    /// The default subdivides the domain into a uniform grid, samples each
    /// cell densely and inflates the sampled box. That is enough for
    /// pruning; representations with exact hulls may override.
    fn patch_bounds(&self) -> Vec<SurfacePatch<T>> {
        let (u0, u1) = self.u_domain();
        let (v0, v1) = self.v_domain();
        let div = T::from_usize(PATCH_DIVISIONS).unwrap();
        let du = (u1 - u0) / div;
        let dv = (v1 - v0) / div;
        let last = T::from_usize(PATCH_SAMPLES - 1).unwrap();

        let mut patches = Vec::with_capacity(PATCH_DIVISIONS * PATCH_DIVISIONS);
        for i in 0..PATCH_DIVISIONS {
            let ua = u0 + du * T::from_usize(i).unwrap();
            let ub = ua + du;
            for j in 0..PATCH_DIVISIONS {
                let va = v0 + dv * T::from_usize(j).unwrap();
                let vb = va + dv;

                let mut points = Vec::with_capacity(PATCH_SAMPLES * PATCH_SAMPLES);
                for si in 0..PATCH_SAMPLES {
                    let u = ua + (ub - ua) * T::from_usize(si).unwrap() / last;
                    for sj in 0..PATCH_SAMPLES {
                        let v = va + (vb - va) * T::from_usize(sj).unwrap() / last;
                        points.push(self.point_at(u, v));
                    }
                }

                let sampled = BoundingBox::new_with_points(points);
                let margin = sampled.diagonal() * T::from_f64(0.25).unwrap();
                patches.push(SurfacePatch {
                    u_range: (ua, ub),
                    v_range: (va, vb),
                    bounds: sampled.inflate(margin),
                });
            }
        }
        patches
    }

    /// Union of the patch bounds.
    fn bounding_box(&self) -> BoundingBox<T> {
        BoundingBox::new_with_points(
            self.patch_bounds()
                .iter()
                .flat_map(|p| [*p.bounds.min(), *p.bounds.max()]),
        )
    }
}

/// Whether a parameter lies inside a closed domain interval.
pub fn contains_parameter<T: FloatingPoint>(value: T, domain: (T, T)) -> bool {
    domain.0 <= value && value <= domain.1
}

/// Reinterpret an out-of-range parameter modulo the domain width.
pub fn wrap_parameter<T: FloatingPoint>(value: T, domain: (T, T)) -> T {
    let width = domain.1 - domain.0;
    if width <= T::zero() {
        return domain.0;
    }
    let t = (value - domain.0) / width;
    domain.0 + (t - t.floor()) * width
}

/// Truncate a parameter to the nearest domain boundary.
pub fn clamp_parameter<T: FloatingPoint>(value: T, domain: (T, T)) -> T {
    value.clamp(domain.0, domain.1)
}
