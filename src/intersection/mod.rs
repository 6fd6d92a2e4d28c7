pub mod common_point;
pub mod deadline;
pub mod error;
pub mod nearest_point;
mod start_finder;
pub mod surface_intersection;
mod tracer;

pub use common_point::*;
pub use deadline::*;
pub use error::*;
pub use nearest_point::*;
pub use surface_intersection::*;

use std::time::Duration;

use nalgebra::{Point3, Vector2};
use rand::Rng;

use crate::misc::FloatingPoint;
use crate::surface::ParametricSurface;

/// Hyperparameters for the surface intersection solver.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceIntersectionOptions<T: FloatingPoint> {
    /// Target 3D arc length between consecutive trace points.
    pub step: T,
    /// Maximum number of marching iterations per trace.
    pub max_steps: usize,
    /// Random samples along u for the global start search.
    pub sample_count_u: usize,
    /// Random samples along v for the global start search.
    pub sample_count_v: usize,
    /// Keep tracing along domain borders to force an open intersection
    /// into a closed loop.
    pub force_loop: bool,
    /// 3D residual tolerance of the Newton corrector.
    pub tolerance: T,
    /// Wall-clock compute budget for one top-level call.
    pub compute_budget: Duration,
    /// Surface a timeout out of the tracer instead of keeping the best
    /// Newton point found so far.
    pub break_on_timeout: bool,
}

impl<T: FloatingPoint> Default for SurfaceIntersectionOptions<T> {
    fn default() -> Self {
        Self {
            step: T::from_f64(0.1).unwrap(),
            max_steps: 1000,
            sample_count_u: 10,
            sample_count_v: 10,
            force_loop: false,
            tolerance: T::from_f64(1e-7).unwrap(),
            compute_budget: Duration::from_secs(5),
            break_on_timeout: false,
        }
    }
}

impl<T: FloatingPoint> SurfaceIntersectionOptions<T> {
    pub fn with_step(mut self, step: T) -> Self {
        self.step = step;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_sample_count(mut self, u: usize, v: usize) -> Self {
        self.sample_count_u = u;
        self.sample_count_v = v;
        self
    }

    pub fn with_force_loop(mut self, force_loop: bool) -> Self {
        self.force_loop = force_loop;
        self
    }

    pub fn with_tolerance(mut self, tolerance: T) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_compute_budget(mut self, compute_budget: Duration) -> Self {
        self.compute_budget = compute_budget;
        self
    }

    pub fn with_break_on_timeout(mut self, break_on_timeout: bool) -> Self {
        self.break_on_timeout = break_on_timeout;
        self
    }
}

/// Trace the intersection curve of two surfaces from a known common
/// parameter quadruple. Deterministic: identical starts and options
/// always produce the same curve.
pub fn intersect_surfaces<T, SA, SB>(
    a: &SA,
    b: &SB,
    uv_a: Vector2<T>,
    uv_b: Vector2<T>,
    options: &SurfaceIntersectionOptions<T>,
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let deadline = Deadline::new(options.compute_budget);
    tracer::trace_from(a, b, uv_a, uv_b, options, &deadline)
}

/// Intersect two surfaces starting near a 3D hint point.
pub fn intersect_surfaces_with_hint<T, SA, SB>(
    a: &SA,
    b: &SB,
    hint: &Point3<T>,
    options: &SurfaceIntersectionOptions<T>,
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let deadline = Deadline::new(options.compute_budget);
    let (uv_a, uv_b) = find_common_point_from_hint(a, b, hint, &deadline)?;
    tracer::trace_from(a, b, uv_a, uv_b, options, &deadline)
}

/// Intersect two surfaces with no hint, searching overlapping patch
/// regions with random samples drawn from `rng`.
pub fn intersect_surfaces_without_hint<T, SA, SB, R>(
    a: &SA,
    b: &SB,
    options: &SurfaceIntersectionOptions<T>,
    rng: &mut R,
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let deadline = Deadline::new(options.compute_budget);
    start_finder::find_first_intersection(a, b, options, rng, &deadline, false)
}

/// Best-effort search for multiple intersection components. Failures of
/// individual samples are skipped, as is any sample landing on a curve
/// already found.
pub fn find_many_intersections<T, SA, SB, R>(
    a: &SA,
    b: &SB,
    options: &SurfaceIntersectionOptions<T>,
    rng: &mut R,
) -> Vec<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let deadline = Deadline::new(options.compute_budget);
    start_finder::find_all_intersections(a, b, options, rng, &deadline, false)
}

/// Intersect a surface with itself, starting near a 3D hint point.
pub fn self_intersect_surface_with_hint<T, S, R>(
    surface: &S,
    hint: &Point3<T>,
    options: &SurfaceIntersectionOptions<T>,
    rng: &mut R,
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let deadline = Deadline::new(options.compute_budget);
    let (uv_a, uv_b) = find_self_common_point(surface, hint, rng, &deadline)?;
    tracer::trace_from(surface, surface, uv_a, uv_b, options, &deadline)
}

/// Intersect a surface with itself with no hint.
pub fn self_intersect_surface_without_hint<T, S, R>(
    surface: &S,
    options: &SurfaceIntersectionOptions<T>,
    rng: &mut R,
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let deadline = Deadline::new(options.compute_budget);
    start_finder::find_first_intersection(surface, surface, options, rng, &deadline, true)
}
