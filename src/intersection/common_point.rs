use nalgebra::{Point3, Vector2, Vector4};
use rand::Rng;

use crate::misc::FloatingPoint;
use crate::surface::{clamp_parameter, contains_parameter, wrap_parameter, ParametricSurface};

use super::deadline::Deadline;
use super::error::{IntersectionError, Result};
use super::nearest_point::{find_nearest_point, find_nearest_point_far_from};

/// A refined start must coincide in 3D at least this well.
fn coincidence_tolerance<T: FloatingPoint>() -> T {
    T::from_f64(1e-6).unwrap()
}

/// Find one parameter quadruple where two surfaces coincide, by joint
/// backtracking gradient descent on `|Pa - Pb|^2` from the given starts.
///
/// Each of the four coordinates is wrapped when its surface is periodic
/// there, otherwise an out-of-range candidate is rejected and the step
/// halved. On convergence any coordinate still outside its range is
/// wrapped or clamped, checked in the fixed order u_a, v_a, u_b, v_b.
pub fn find_first_common_point<T, SA, SB>(
    a: &SA,
    b: &SB,
    uv_a: Vector2<T>,
    uv_b: Vector2<T>,
    deadline: &Deadline,
) -> Result<(Vector2<T>, Vector2<T>)>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let eps = T::from_f64(1e-9).unwrap();
    let min_step = T::from_f64(1e-12).unwrap();
    let half = T::from_f64(0.5).unwrap();

    let mut x = Vector4::new(uv_a.x, uv_a.y, uv_b.x, uv_b.y);
    let mut pa = a.point_at(x.x, x.y);
    let mut pb = b.point_at(x.z, x.w);
    let mut cost = (pa - pb).norm_squared();

    loop {
        deadline.check()?;

        let gradient = joint_gradient(a, b, &x);
        if gradient.norm() < eps {
            break;
        }

        let evaluate = |step: T| {
            let candidate = wrap_quadruple(a, b, x - gradient * step)?;
            let ca = a.point_at(candidate.x, candidate.y);
            let cb = b.point_at(candidate.z, candidate.w);
            let candidate_cost = (ca - cb).norm_squared();
            Some((candidate, ca, cb, candidate_cost))
        };

        let mut step = T::one();
        let mut improved = None;
        while step > min_step {
            deadline.check()?;
            if let Some(c) = evaluate(step) {
                if c.3 < cost {
                    improved = Some(c);
                    break;
                }
            }
            step *= half;
        }
        // A shorter step often lands much closer to the minimum than the
        // first improving one; keep halving while that pays off.
        while improved.is_some() {
            step *= half;
            if step <= min_step {
                break;
            }
            match evaluate(step) {
                Some(c) if c.3 < improved.as_ref().map(|best| best.3).unwrap() => improved = Some(c),
                _ => break,
            }
        }

        let Some((next, next_pa, next_pb, next_cost)) = improved else {
            break;
        };
        let moved = (next_pa - pa).norm() + (next_pb - pb).norm();
        x = next;
        pa = next_pa;
        pb = next_pb;
        cost = next_cost;
        if moved < eps {
            break;
        }
    }

    let (uv_a, uv_b) = resolve_quadruple(a, b, x);
    let distance = (a.point_at(uv_a.x, uv_a.y) - b.point_at(uv_b.x, uv_b.y)).norm();
    if distance > coincidence_tolerance() {
        return Err(IntersectionError::NotFound);
    }
    Ok((uv_a, uv_b))
}

/// Project a hint point independently onto each surface, then refine
/// jointly.
pub fn find_common_point_from_hint<T, SA, SB>(
    a: &SA,
    b: &SB,
    hint: &Point3<T>,
    deadline: &Deadline,
) -> Result<(Vector2<T>, Vector2<T>)>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let start_a = find_nearest_point(a, hint, domain_center(a), None, deadline)?;
    let start_b = find_nearest_point(b, hint, domain_center(b), None, deadline)?;
    find_first_common_point(a, b, start_a, start_b, deadline)
}

/// Self-intersection variant: project the hint twice onto the same
/// surface, the second projection starting far from the first, then
/// refine jointly. Fails with [`IntersectionError::NotFound`] when no far
/// point can be found.
pub fn find_self_common_point<T, S, R>(
    surface: &S,
    hint: &Point3<T>,
    rng: &mut R,
    deadline: &Deadline,
) -> Result<(Vector2<T>, Vector2<T>)>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let first = find_nearest_point(surface, hint, domain_center(surface), None, deadline)?;

    let (u0, u1) = surface.u_domain();
    let (v0, v1) = surface.v_domain();
    let span = Vector2::new(u1 - u0, v1 - v0).norm();
    let min_separation = span * T::from_f64(0.5).unwrap();

    let second =
        find_nearest_point_far_from(surface, hint, first, min_separation, rng, deadline)?;
    find_first_common_point(surface, surface, first, second, deadline)
}

fn domain_center<T, S>(surface: &S) -> Vector2<T>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
{
    let (u0, u1) = surface.u_domain();
    let (v0, v1) = surface.v_domain();
    let half = T::from_f64(0.5).unwrap();
    Vector2::new((u0 + u1) * half, (v0 + v1) * half)
}

/// Gradient of `|Pa - Pb|^2` over the four parameters.
fn joint_gradient<T, SA, SB>(a: &SA, b: &SB, x: &Vector4<T>) -> Vector4<T>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let diff = a.point_at(x.x, x.y) - b.point_at(x.z, x.w);
    let two = T::from_usize(2).unwrap();
    Vector4::new(
        diff.dot(&a.tangent_u(x.x, x.y)),
        diff.dot(&a.tangent_v(x.x, x.y)),
        -diff.dot(&b.tangent_u(x.z, x.w)),
        -diff.dot(&b.tangent_v(x.z, x.w)),
    ) * two
}

/// Wrap out-of-range coordinates on periodic axes, `None` when any
/// coordinate leaves a non-periodic range. Checked in the order u_a, v_a,
/// u_b, v_b.
fn wrap_quadruple<T, SA, SB>(a: &SA, b: &SB, mut x: Vector4<T>) -> Option<Vector4<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let ua = a.u_domain();
    let va = a.v_domain();
    if !contains_parameter(x.x, ua) {
        if a.u_closed_at(clamp_parameter(x.y, va)) {
            x.x = wrap_parameter(x.x, ua);
        } else {
            return None;
        }
    }
    if !contains_parameter(x.y, va) {
        if a.v_closed_at(x.x) {
            x.y = wrap_parameter(x.y, va);
        } else {
            return None;
        }
    }

    let ub = b.u_domain();
    let vb = b.v_domain();
    if !contains_parameter(x.z, ub) {
        if b.u_closed_at(clamp_parameter(x.w, vb)) {
            x.z = wrap_parameter(x.z, ub);
        } else {
            return None;
        }
    }
    if !contains_parameter(x.w, vb) {
        if b.v_closed_at(x.z) {
            x.w = wrap_parameter(x.w, vb);
        } else {
            return None;
        }
    }
    Some(x)
}

/// Bring a converged quadruple back into both domains, wrapping periodic
/// axes and clamping the rest. Clamping is lossy, accepted as an
/// approximation.
fn resolve_quadruple<T, SA, SB>(a: &SA, b: &SB, mut x: Vector4<T>) -> (Vector2<T>, Vector2<T>)
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let ua = a.u_domain();
    let va = a.v_domain();
    if !contains_parameter(x.x, ua) {
        x.x = if a.u_closed_at(clamp_parameter(x.y, va)) {
            wrap_parameter(x.x, ua)
        } else {
            clamp_parameter(x.x, ua)
        };
    }
    if !contains_parameter(x.y, va) {
        x.y = if a.v_closed_at(x.x) {
            wrap_parameter(x.y, va)
        } else {
            clamp_parameter(x.y, va)
        };
    }
    let ub = b.u_domain();
    let vb = b.v_domain();
    if !contains_parameter(x.z, ub) {
        x.z = if b.u_closed_at(clamp_parameter(x.w, vb)) {
            wrap_parameter(x.z, ub)
        } else {
            clamp_parameter(x.z, ub)
        };
    }
    if !contains_parameter(x.w, vb) {
        x.w = if b.v_closed_at(x.z) {
            wrap_parameter(x.w, vb)
        } else {
            clamp_parameter(x.w, vb)
        };
    }
    (Vector2::new(x.x, x.y), Vector2::new(x.z, x.w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::time::Duration;

    /// The xy plane, z = 0.
    struct Horizontal;

    impl ParametricSurface<f64> for Horizontal {
        fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
            Point3::new(u, v, 0.)
        }

        fn tangent_u(&self, _u: f64, _v: f64) -> Vector3<f64> {
            Vector3::x()
        }

        fn tangent_v(&self, _u: f64, _v: f64) -> Vector3<f64> {
            Vector3::y()
        }

        fn u_domain(&self) -> (f64, f64) {
            (-1., 1.)
        }

        fn v_domain(&self) -> (f64, f64) {
            (-1., 1.)
        }
    }

    /// The xz plane, y = 0.
    struct Vertical;

    impl ParametricSurface<f64> for Vertical {
        fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
            Point3::new(u, 0., v)
        }

        fn tangent_u(&self, _u: f64, _v: f64) -> Vector3<f64> {
            Vector3::x()
        }

        fn tangent_v(&self, _u: f64, _v: f64) -> Vector3<f64> {
            Vector3::z()
        }

        fn u_domain(&self) -> (f64, f64) {
            (-1., 1.)
        }

        fn v_domain(&self) -> (f64, f64) {
            (-1., 1.)
        }
    }

    fn deadline() -> Deadline {
        Deadline::new(Duration::from_secs(10))
    }

    #[test]
    fn planes_converge_to_common_point() {
        let a = Horizontal;
        let b = Vertical;
        let (uv_a, uv_b) = find_first_common_point(
            &a,
            &b,
            Vector2::new(0.3, 0.4),
            Vector2::new(0.1, -0.2),
            &deadline(),
        )
        .unwrap();
        let pa = a.point_at(uv_a.x, uv_a.y);
        let pb = b.point_at(uv_b.x, uv_b.y);
        assert_relative_eq!(pa, pb, epsilon = 1e-6);
        // The planes meet along the x axis.
        assert_relative_eq!(pa.y, 0., epsilon = 1e-6);
        assert_relative_eq!(pa.z, 0., epsilon = 1e-6);
    }

    #[test]
    fn hint_point_is_refined_on_both() {
        let a = Horizontal;
        let b = Vertical;
        let hint = Point3::new(0.5, 0.05, -0.05);
        let (uv_a, uv_b) = find_common_point_from_hint(&a, &b, &hint, &deadline()).unwrap();
        let pa = a.point_at(uv_a.x, uv_a.y);
        let pb = b.point_at(uv_b.x, uv_b.y);
        assert_relative_eq!(pa, pb, epsilon = 1e-6);
        assert_relative_eq!(pa.x, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn disjoint_surfaces_are_not_found() {
        /// The xy plane lifted to z = 1.
        struct Lifted;
        impl ParametricSurface<f64> for Lifted {
            fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
                Point3::new(u, v, 1.)
            }
            fn tangent_u(&self, _u: f64, _v: f64) -> Vector3<f64> {
                Vector3::x()
            }
            fn tangent_v(&self, _u: f64, _v: f64) -> Vector3<f64> {
                Vector3::y()
            }
            fn u_domain(&self) -> (f64, f64) {
                (-1., 1.)
            }
            fn v_domain(&self) -> (f64, f64) {
                (-1., 1.)
            }
        }

        let res = find_first_common_point(
            &Horizontal,
            &Lifted,
            Vector2::new(0.2, 0.2),
            Vector2::new(-0.3, 0.1),
            &deadline(),
        );
        assert_eq!(res, Err(IntersectionError::NotFound));
    }
}
