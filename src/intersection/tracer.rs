use std::collections::VecDeque;

use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};

use crate::misc::FloatingPoint;
use crate::surface::{
    clamp_parameter, contains_parameter, wrap_parameter, ParametricSurface, UVDirection,
};

use super::deadline::Deadline;
use super::error::{IntersectionError, Result};
use super::nearest_point::find_nearest_point;
use super::surface_intersection::SurfaceIntersection;
use super::SurfaceIntersectionOptions;

/// Newton iterations per marching step.
const NEWTON_MAX_ITERS: usize = 32;

/// Trace the intersection curve of two surfaces from a known common
/// point, sharing the caller's deadline.
pub(crate) fn trace_from<T, SA, SB>(
    a: &SA,
    b: &SB,
    uv_a: Vector2<T>,
    uv_b: Vector2<T>,
    options: &SurfaceIntersectionOptions<T>,
    deadline: &Deadline,
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    Tracer::new(a, b, options, deadline).trace(uv_a, uv_b)
}

/// Which surface a border-following sub-mode is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinnedSurface {
    A,
    B,
}

/// Border-following sub-mode state, only reachable with `force_loop`.
#[derive(Debug, Clone, Copy)]
struct BorderFollow<T> {
    surface: PinnedSurface,
    /// The clamped axis; the trace moves along the other one.
    axis: UVDirection,
    /// Marching sign along the free axis.
    sign: T,
}

/// Outcome of a single marching iteration.
enum StepOutcome {
    Advanced,
    /// Singular crossing detected, retry without advancing.
    Retry,
    Closed,
    Stopped,
}

/// Marching state of one trace: double-ended parameter sequences growing
/// at both ends, a direction flag, a tangent-reversal flag toggled at
/// singular crossings, and the optional border-following sub-mode.
struct Tracer<'a, T: FloatingPoint, SA: ?Sized, SB: ?Sized> {
    a: &'a SA,
    b: &'a SB,
    step: T,
    max_steps: usize,
    tolerance: T,
    force_loop: bool,
    break_on_timeout: bool,
    deadline: &'a Deadline,
    uvs_a: VecDeque<Vector2<T>>,
    uvs_b: VecDeque<Vector2<T>>,
    points: VecDeque<Point3<T>>,
    inverse: bool,
    reverse_tangent: bool,
    border: Option<BorderFollow<T>>,
    singular_crossed: bool,
}

impl<'a, T, SA, SB> Tracer<'a, T, SA, SB>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    fn new(
        a: &'a SA,
        b: &'a SB,
        options: &SurfaceIntersectionOptions<T>,
        deadline: &'a Deadline,
    ) -> Self {
        Self {
            a,
            b,
            step: options.step,
            max_steps: options.max_steps,
            tolerance: options.tolerance,
            force_loop: options.force_loop,
            break_on_timeout: options.break_on_timeout,
            deadline,
            uvs_a: VecDeque::new(),
            uvs_b: VecDeque::new(),
            points: VecDeque::new(),
            inverse: false,
            reverse_tangent: false,
            border: None,
            singular_crossed: false,
        }
    }

    fn trace(mut self, uv_a: Vector2<T>, uv_b: Vector2<T>) -> Result<SurfaceIntersection<T>> {
        self.push_leading(uv_a, uv_b, self.a.point_at(uv_a.x, uv_a.y));

        let mut looped = false;
        let mut exhausted = true;
        for _ in 0..self.max_steps {
            let outcome = if self.border.is_some() {
                self.border_step()?
            } else {
                self.march_step()?
            };
            match outcome {
                StepOutcome::Advanced | StepOutcome::Retry => {}
                StepOutcome::Closed => {
                    looped = true;
                    exhausted = false;
                    break;
                }
                StepOutcome::Stopped => {
                    exhausted = false;
                    break;
                }
            }
        }

        #[cfg(feature = "log")]
        log::debug!(
            "trace finished with {} points (looped: {}, exhausted: {})",
            self.points.len(),
            looped,
            exhausted
        );

        Ok(SurfaceIntersection::new(
            self.uvs_a.into_iter().collect(),
            self.uvs_b.into_iter().collect(),
            self.points.into_iter().collect(),
            looped,
            self.singular_crossed,
            exhausted,
        ))
    }

    /// One predictor-corrector step in normal mode.
    fn march_step(&mut self) -> Result<StepOutcome> {
        let half = T::from_f64(0.5).unwrap();
        let (uv_a, uv_b) = self.leading();

        let normal_a = self.a.normal_at(uv_a.x, uv_a.y);
        let normal_b = self.b.normal_at(uv_b.x, uv_b.y);
        let mut tangent = normal_a
            .cross(&normal_b)
            .try_normalize(T::default_epsilon())
            .ok_or(IntersectionError::NotFound)?;
        if self.inverse {
            tangent = -tangent;
        }
        if self.reverse_tangent {
            tangent = -tangent;
        }

        let anchor = self.a.point_at(uv_a.x, uv_a.y);
        let mut x = Vector4::new(uv_a.x, uv_a.y, uv_b.x, uv_b.y);
        self.newton(&mut x, &anchor, &tangent)?;

        let change_direction = self.resolve_domains(&mut x, &uv_a, &uv_b);

        let new_uv_a = Vector2::new(x.x, x.y);
        let new_uv_b = Vector2::new(x.z, x.w);
        let new_point = self.a.point_at(new_uv_a.x, new_uv_a.y);

        // Newton turned back towards the point two steps behind: passed
        // through a singular point. Reverse the tangent and retry.
        if let Some((uv_back, point_back)) = self.two_back() {
            let d3 = (new_point - point_back).norm();
            let dp_new = (new_uv_a - uv_back).norm();
            let dp_prev = (uv_a - uv_back).norm();
            if d3 < self.step * half && dp_new < self.step * half && dp_new < dp_prev {
                self.reverse_tangent = !self.reverse_tangent;
                self.singular_crossed = true;
                return Ok(StepOutcome::Retry);
            }
        }

        if self.closes_loop(&new_point) {
            return Ok(StepOutcome::Closed);
        }

        self.push_leading(new_uv_a, new_uv_b, new_point);

        if change_direction {
            if self.inverse {
                return Ok(StepOutcome::Stopped);
            }
            #[cfg(feature = "log")]
            log::trace!("reached a border, marching from the other end");
            self.inverse = true;
        }
        Ok(StepOutcome::Advanced)
    }

    /// Solve the 4x4 system per step: three coincidence equations plus
    /// one arc-length equation along surface A's tangent line through the
    /// previous point. Out-of-range coordinates on periodic axes are
    /// re-entered after every iterate, so crossing a seam (or two seams at
    /// once) keeps converging; the iteration stops early only when the
    /// candidate leaves both surfaces' domains on axes that would clamp.
    fn newton(&self, x: &mut Vector4<T>, anchor: &Point3<T>, tangent: &Vector3<T>) -> Result<()> {
        for _ in 0..NEWTON_MAX_ITERS {
            if self.deadline.exceeded() {
                if self.break_on_timeout {
                    return Err(IntersectionError::Timeout);
                }
                // Keep the best point found so far.
                break;
            }

            let pa = self.a.point_at(x.x, x.y);
            let pb = self.b.point_at(x.z, x.w);
            let diff = pa - pb;
            let arc = (pa - anchor).dot(tangent) - self.step;
            if diff.norm() < self.tolerance && arc.abs() < self.tolerance {
                break;
            }

            let au = self.a.tangent_u(x.x, x.y);
            let av = self.a.tangent_v(x.x, x.y);
            let bu = self.b.tangent_u(x.z, x.w);
            let bv = self.b.tangent_v(x.z, x.w);
            let jacobian = Matrix4::new(
                au.x,
                av.x,
                -bu.x,
                -bv.x,
                au.y,
                av.y,
                -bu.y,
                -bv.y,
                au.z,
                av.z,
                -bu.z,
                -bv.z,
                au.dot(tangent),
                av.dot(tangent),
                T::zero(),
                T::zero(),
            );
            let rhs = Vector4::new(-diff.x, -diff.y, -diff.z, -arc);

            // Gaussian elimination with partial pivoting.
            let delta = jacobian
                .lu()
                .solve(&rhs)
                .ok_or(IntersectionError::NotFound)?;
            *x += delta;
            self.wrap_periodic(x);

            if self.outside_both(x) {
                break;
            }
        }
        Ok(())
    }

    /// Wrap each out-of-range coordinate whose surface is periodic at the
    /// current cross-section, leaving the rest untouched.
    fn wrap_periodic(&self, x: &mut Vector4<T>) {
        let ua = self.a.u_domain();
        let va = self.a.v_domain();
        if !contains_parameter(x.x, ua) && self.a.u_closed_at(clamp_parameter(x.y, va)) {
            x.x = wrap_parameter(x.x, ua);
        }
        if !contains_parameter(x.y, va) && self.a.v_closed_at(x.x) {
            x.y = wrap_parameter(x.y, va);
        }
        let ub = self.b.u_domain();
        let vb = self.b.v_domain();
        if !contains_parameter(x.z, ub) && self.b.u_closed_at(clamp_parameter(x.w, vb)) {
            x.z = wrap_parameter(x.z, ub);
        }
        if !contains_parameter(x.w, vb) && self.b.v_closed_at(x.z) {
            x.w = wrap_parameter(x.w, vb);
        }
    }

    fn outside_both(&self, x: &Vector4<T>) -> bool {
        let out_a = !contains_parameter(x.x, self.a.u_domain())
            || !contains_parameter(x.y, self.a.v_domain());
        let out_b = !contains_parameter(x.z, self.b.u_domain())
            || !contains_parameter(x.w, self.b.v_domain());
        out_a && out_b
    }

    /// Bring the solved quadruple back into both domains. Wrapping is
    /// preferred on periodic axes; clamping flags a direction change or,
    /// with `force_loop`, enters the border-following sub-mode. The
    /// coordinates are checked in the fixed order u_a, v_a, u_b, v_b.
    fn resolve_domains(&mut self, x: &mut Vector4<T>, uv_a: &Vector2<T>, uv_b: &Vector2<T>) -> bool {
        let mut change_direction = false;

        let ua = self.a.u_domain();
        let va = self.a.v_domain();
        if !contains_parameter(x.x, ua) {
            if self.a.u_closed_at(clamp_parameter(x.y, va)) {
                x.x = wrap_parameter(x.x, ua);
            } else {
                x.x = clamp_parameter(x.x, ua);
                if self.force_loop {
                    self.enter_border(PinnedSurface::A, UVDirection::U, x.y - uv_a.y);
                } else {
                    change_direction = true;
                }
            }
        }
        if !contains_parameter(x.y, va) {
            if self.a.v_closed_at(x.x) {
                x.y = wrap_parameter(x.y, va);
            } else {
                x.y = clamp_parameter(x.y, va);
                if self.force_loop {
                    self.enter_border(PinnedSurface::A, UVDirection::V, x.x - uv_a.x);
                } else {
                    change_direction = true;
                }
            }
        }

        let ub = self.b.u_domain();
        let vb = self.b.v_domain();
        if !contains_parameter(x.z, ub) {
            if self.b.u_closed_at(clamp_parameter(x.w, vb)) {
                x.z = wrap_parameter(x.z, ub);
            } else {
                x.z = clamp_parameter(x.z, ub);
                if self.force_loop {
                    self.enter_border(PinnedSurface::B, UVDirection::U, x.w - uv_b.y);
                } else {
                    change_direction = true;
                }
            }
        }
        if !contains_parameter(x.w, vb) {
            if self.b.v_closed_at(x.z) {
                x.w = wrap_parameter(x.w, vb);
            } else {
                x.w = clamp_parameter(x.w, vb);
                if self.force_loop {
                    self.enter_border(PinnedSurface::B, UVDirection::V, x.z - uv_b.x);
                } else {
                    change_direction = true;
                }
            }
        }

        change_direction
    }

    fn enter_border(&mut self, surface: PinnedSurface, axis: UVDirection, free_delta: T) {
        // The first clamped coordinate wins.
        if self.border.is_some() {
            return;
        }
        let sign = if free_delta < T::zero() {
            -T::one()
        } else {
            T::one()
        };
        self.border = Some(BorderFollow {
            surface,
            axis,
            sign,
        });
    }

    /// One step of the border-following sub-mode: a fixed-length step
    /// along the border tangent of the pinned surface, projected onto the
    /// other surface. Exits the sub-mode once the two surface points are
    /// again within half a step of each other.
    ///
    /// TODO: surfaces that never meet again after reaching the border,
    /// and loops that run entirely along one border, end the trace early
    /// here instead of closing.
    fn border_step(&mut self) -> Result<StepOutcome> {
        let half = T::from_f64(0.5).unwrap();
        let border = match self.border {
            Some(b) => b,
            None => return Ok(StepOutcome::Stopped),
        };
        let (uv_a, uv_b) = self.leading();

        let (new_uv_a, new_uv_b, new_point) = match border.surface {
            PinnedSurface::A => {
                let Some(next_a) = advance_along_border(self.a, uv_a, &border, self.step) else {
                    return Ok(StepOutcome::Stopped);
                };
                let pinned_point = self.a.point_at(next_a.x, next_a.y);
                let next_b = match find_nearest_point(self.b, &pinned_point, uv_b, None, self.deadline)
                {
                    Ok(uv) => uv,
                    Err(IntersectionError::Timeout) if !self.break_on_timeout => {
                        return Ok(StepOutcome::Stopped)
                    }
                    Err(e) => return Err(e),
                };
                let other_point = self.b.point_at(next_b.x, next_b.y);
                if (pinned_point - other_point).norm() < self.step * half {
                    self.border = None;
                }
                (next_a, next_b, pinned_point)
            }
            PinnedSurface::B => {
                let Some(next_b) = advance_along_border(self.b, uv_b, &border, self.step) else {
                    return Ok(StepOutcome::Stopped);
                };
                let pinned_point = self.b.point_at(next_b.x, next_b.y);
                let next_a = match find_nearest_point(self.a, &pinned_point, uv_a, None, self.deadline)
                {
                    Ok(uv) => uv,
                    Err(IntersectionError::Timeout) if !self.break_on_timeout => {
                        return Ok(StepOutcome::Stopped)
                    }
                    Err(e) => return Err(e),
                };
                let other_point = self.a.point_at(next_a.x, next_a.y);
                if (pinned_point - other_point).norm() < self.step * half {
                    self.border = None;
                }
                (next_a, next_b, other_point)
            }
        };

        if self.closes_loop(&new_point) {
            return Ok(StepOutcome::Closed);
        }

        self.push_leading(new_uv_a, new_uv_b, new_point);
        Ok(StepOutcome::Advanced)
    }

    fn leading(&self) -> (Vector2<T>, Vector2<T>) {
        if self.inverse {
            (*self.uvs_a.front().unwrap(), *self.uvs_b.front().unwrap())
        } else {
            (*self.uvs_a.back().unwrap(), *self.uvs_b.back().unwrap())
        }
    }

    /// The point two steps behind a prospective new point, i.e. the
    /// second entry from the leading end.
    fn two_back(&self) -> Option<(Vector2<T>, Point3<T>)> {
        let n = self.uvs_a.len();
        if n < 2 {
            return None;
        }
        let idx = if self.inverse { 1 } else { n - 2 };
        Some((self.uvs_a[idx], self.points[idx]))
    }

    /// The end opposite to the current marching direction.
    fn opposite_point(&self) -> &Point3<T> {
        if self.inverse {
            self.points.back().unwrap()
        } else {
            self.points.front().unwrap()
        }
    }

    fn closes_loop(&self, new_point: &Point3<T>) -> bool {
        let half = T::from_f64(0.5).unwrap();
        self.points.len() > 2 && (new_point - self.opposite_point()).norm() < self.step * half
    }

    fn push_leading(&mut self, uv_a: Vector2<T>, uv_b: Vector2<T>, point: Point3<T>) {
        if self.inverse {
            self.uvs_a.push_front(uv_a);
            self.uvs_b.push_front(uv_b);
            self.points.push_front(point);
        } else {
            self.uvs_a.push_back(uv_a);
            self.uvs_b.push_back(uv_b);
            self.points.push_back(point);
        }
    }
}

/// One fixed-length step along a surface border, moving on the free axis
/// while the clamped axis stays put. `None` when the free axis runs into
/// a non-periodic end; border corners are left unhandled and terminate
/// the trace.
fn advance_along_border<T, S>(
    surface: &S,
    uv: Vector2<T>,
    border: &BorderFollow<T>,
    step: T,
) -> Option<Vector2<T>>
where
    T: FloatingPoint,
    S: ParametricSurface<T> + ?Sized,
{
    let tiny = T::from_f64(1e-12).unwrap();
    let mut next = uv;
    match border.axis {
        // u pinned at its border, marching along v
        UVDirection::U => {
            let speed = surface.tangent_v(uv.x, uv.y).norm().max(tiny);
            next.y += border.sign * step / speed;
            let domain = surface.v_domain();
            if !contains_parameter(next.y, domain) {
                if surface.v_closed_at(next.x) {
                    next.y = wrap_parameter(next.y, domain);
                } else {
                    return None;
                }
            }
        }
        // v pinned at its border, marching along u
        UVDirection::V => {
            let speed = surface.tangent_u(uv.x, uv.y).norm().max(tiny);
            next.x += border.sign * step / speed;
            let domain = surface.u_domain();
            if !contains_parameter(next.x, domain) {
                if surface.u_closed_at(next.y) {
                    next.x = wrap_parameter(next.x, domain);
                } else {
                    return None;
                }
            }
        }
    }
    Some(next)
}
