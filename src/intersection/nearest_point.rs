use nalgebra::{Point3, Vector2};
use rand::Rng;

use crate::misc::FloatingPoint;
use crate::surface::{contains_parameter, wrap_parameter, ParametricSurface, UVDirection};

use super::deadline::Deadline;
use super::error::{IntersectionError, Result};

/// Retry bound for the random far-point search.
const FAR_POINT_ATTEMPTS: usize = 64;

/// Project a 3D point onto the (u, v) domain of a surface.
///
/// Steepest descent on the squared distance with step-halving
/// backtracking. `constant_axis` pins one parameter, used when projecting
/// along a fixed boundary. A candidate leaving the domain is wrapped when
/// the surface is periodic at the current cross-section, otherwise the
/// step is rejected and retried halved. Terminates when the evaluated
/// surface point moves less than a fixed epsilon between iterations, or
/// immediately when the initial gradient is already below epsilon.
pub fn find_nearest_point<T, S>(
    surface: &S,
    point: &Point3<T>,
    start: Vector2<T>,
    constant_axis: Option<UVDirection>,
    deadline: &Deadline,
) -> Result<Vector2<T>>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
{
    let eps = T::from_f64(1e-9).unwrap();
    let min_step = T::from_f64(1e-12).unwrap();
    let half = T::from_f64(0.5).unwrap();

    let mut uv = start;
    let mut evaluated = surface.point_at(uv.x, uv.y);
    let mut cost = (evaluated - point).norm_squared();

    loop {
        deadline.check()?;

        let gradient = distance_gradient(surface, &uv, point, constant_axis);
        if gradient.norm() < eps {
            break;
        }

        let evaluate = |step: T| {
            let candidate = uv - gradient * step;
            // Out of a non-periodic range means no candidate at this step.
            let candidate = wrap_into_domain(surface, candidate)?;
            let candidate_point = surface.point_at(candidate.x, candidate.y);
            let candidate_cost = (candidate_point - point).norm_squared();
            Some((candidate, candidate_point, candidate_cost))
        };

        let mut step = T::one();
        let mut improved = None;
        while step > min_step {
            deadline.check()?;
            if let Some(c) = evaluate(step) {
                if c.2 < cost {
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
                Some(c) if c.2 < improved.as_ref().map(|best| best.2).unwrap() => improved = Some(c),
                _ => break,
            }
        }

        let Some((next_uv, next_point, next_cost)) = improved else {
            break;
        };
        let moved = (next_point - evaluated).norm();
        uv = next_uv;
        evaluated = next_point;
        cost = next_cost;
        if moved < eps {
            break;
        }
    }

    Ok(uv)
}

/// Project a point repeatedly from random starts until the result lands
/// far enough from `uv_far` in parameter space.
///
/// Accepts the first projection whose parameter distance from `uv_far`
/// exceeds half of `min_separation`; fails with
/// [`IntersectionError::NotFound`] when the retry bound is exhausted.
pub fn find_nearest_point_far_from<T, S, R>(
    surface: &S,
    point: &Point3<T>,
    uv_far: Vector2<T>,
    min_separation: T,
    rng: &mut R,
    deadline: &Deadline,
) -> Result<Vector2<T>>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let half = T::from_f64(0.5).unwrap();
    let u_domain = surface.u_domain();
    let v_domain = surface.v_domain();

    for _ in 0..FAR_POINT_ATTEMPTS {
        deadline.check()?;
        let start = Vector2::new(
            sample_parameter(rng, u_domain),
            sample_parameter(rng, v_domain),
        );
        let uv = find_nearest_point(surface, point, start, None, deadline)?;
        if (uv - uv_far).norm() > min_separation * half {
            return Ok(uv);
        }
    }

    Err(IntersectionError::NotFound)
}

/// Uniform random parameter inside a domain interval.
pub(crate) fn sample_parameter<T, R>(rng: &mut R, domain: (T, T)) -> T
where
    T: FloatingPoint,
    R: Rng + ?Sized,
{
    let t = T::from_f64(rng.random_range(0.0..1.0)).unwrap();
    domain.0 + (domain.1 - domain.0) * t
}

/// Gradient of the squared distance to `point`, with the pinned axis
/// zeroed out.
fn distance_gradient<T, S>(
    surface: &S,
    uv: &Vector2<T>,
    point: &Point3<T>,
    constant_axis: Option<UVDirection>,
) -> Vector2<T>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
{
    let diff = surface.point_at(uv.x, uv.y) - point;
    let two = T::from_usize(2).unwrap();
    let mut gradient = Vector2::new(
        diff.dot(&surface.tangent_u(uv.x, uv.y)),
        diff.dot(&surface.tangent_v(uv.x, uv.y)),
    ) * two;
    match constant_axis {
        Some(UVDirection::U) => gradient.x = T::zero(),
        Some(UVDirection::V) => gradient.y = T::zero(),
        None => {}
    }
    gradient
}

/// Wrap each out-of-range coordinate when the surface is periodic there.
/// `None` when a coordinate leaves a non-periodic range. U is checked
/// before V.
pub(crate) fn wrap_into_domain<T, S>(surface: &S, mut uv: Vector2<T>) -> Option<Vector2<T>>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
{
    let u_domain = surface.u_domain();
    let v_domain = surface.v_domain();
    if !contains_parameter(uv.x, u_domain) {
        if surface.u_closed_at(uv.y.clamp(v_domain.0, v_domain.1)) {
            uv.x = wrap_parameter(uv.x, u_domain);
        } else {
            return None;
        }
    }
    if !contains_parameter(uv.y, v_domain) {
        if surface.v_closed_at(uv.x) {
            uv.y = wrap_parameter(uv.y, v_domain);
        } else {
            return None;
        }
    }
    Some(uv)
}
