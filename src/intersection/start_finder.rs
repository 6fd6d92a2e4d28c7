use itertools::Itertools;
use nalgebra::Vector2;
use rand::Rng;

use crate::misc::FloatingPoint;
use crate::surface::{ParametricSurface, SurfacePatch};

use super::common_point::find_first_common_point;
use super::deadline::Deadline;
use super::error::{IntersectionError, Result};
use super::nearest_point::sample_parameter;
use super::surface_intersection::SurfaceIntersection;
use super::tracer::trace_from;
use super::SurfaceIntersectionOptions;

/// Search for one intersection with no hint point: sample candidate
/// parameter quadruples inside overlapping patch-box pairs, refine each
/// promising one and return the first successful trace.
///
/// Per-sample failures are expected and frequent; both error kinds are
/// swallowed and the scan continues with the next sample.
pub(crate) fn find_first_intersection<T, SA, SB, R>(
    a: &SA,
    b: &SB,
    options: &SurfaceIntersectionOptions<T>,
    rng: &mut R,
    deadline: &Deadline,
    self_intersection: bool,
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let mut found = None;
    scan_samples(a, b, options, rng, deadline, |uv_a, uv_b| {
        match refine_and_trace(a, b, uv_a, uv_b, options, deadline, self_intersection, &[]) {
            Ok(curve) => {
                found = Some(curve);
                false
            }
            Err(_) => true,
        }
    })?;
    found.ok_or(IntersectionError::NotFound)
}

/// Best-effort search for multiple intersection components. Keeps
/// scanning all samples, skipping any whose refined start lies on a curve
/// already found.
pub(crate) fn find_all_intersections<T, SA, SB, R>(
    a: &SA,
    b: &SB,
    options: &SurfaceIntersectionOptions<T>,
    rng: &mut R,
    deadline: &Deadline,
    self_intersection: bool,
) -> Vec<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
{
    let mut found: Vec<SurfaceIntersection<T>> = Vec::new();
    let _ = scan_samples(a, b, options, rng, deadline, |uv_a, uv_b| {
        if let Ok(curve) = refine_and_trace(
            a,
            b,
            uv_a,
            uv_b,
            options,
            deadline,
            self_intersection,
            &found,
        ) {
            #[cfg(feature = "log")]
            log::debug!("found intersection component {}", found.len() + 1);
            found.push(curve);
        }
        true
    });
    found
}

/// Drive a visitor over the accepted random samples of every overlapping
/// patch-box pair. The visitor returns whether scanning should continue.
fn scan_samples<T, SA, SB, R, F>(
    a: &SA,
    b: &SB,
    options: &SurfaceIntersectionOptions<T>,
    rng: &mut R,
    deadline: &Deadline,
    mut visit: F,
) -> Result<()>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(Vector2<T>, Vector2<T>) -> bool,
{
    let pairs = overlapping_patch_pairs(a, b);
    if pairs.is_empty() {
        return Ok(());
    }

    let total = options.sample_count_u * options.sample_count_v;
    let per_pair = (total / pairs.len()).max(1);

    for (patch_a, patch_b) in &pairs {
        let Some(overlap) = patch_a.bounds.intersection(&patch_b.bounds) else {
            continue;
        };
        // Distance acceptance threshold scaled to the overlap region.
        let threshold = overlap.diagonal() / T::from_usize(per_pair + 1).unwrap();

        for _ in 0..per_pair {
            deadline.check()?;

            let uv_a = sample_patch(rng, patch_a);
            let uv_b = sample_patch(rng, patch_b);
            let distance =
                (a.point_at(uv_a.x, uv_a.y) - b.point_at(uv_b.x, uv_b.y)).norm();
            if distance >= threshold {
                continue;
            }
            if !visit(uv_a, uv_b) {
                return Ok(());
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn refine_and_trace<T, SA, SB>(
    a: &SA,
    b: &SB,
    uv_a: Vector2<T>,
    uv_b: Vector2<T>,
    options: &SurfaceIntersectionOptions<T>,
    deadline: &Deadline,
    self_intersection: bool,
    found: &[SurfaceIntersection<T>],
) -> Result<SurfaceIntersection<T>>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    let (start_a, start_b) = find_first_common_point(a, b, uv_a, uv_b, deadline)?;

    // A self-intersection start collapsing onto a single parameter point
    // is the trivial coincidence, not a curve.
    if self_intersection && (start_a - start_b).norm() < options.step {
        return Err(IntersectionError::NotFound);
    }

    let point = a.point_at(start_a.x, start_a.y);
    if found
        .iter()
        .any(|curve| curve.can_be_started_by(&point, options.step))
    {
        return Err(IntersectionError::NotFound);
    }

    trace_from(a, b, start_a, start_b, options, deadline)
}

fn overlapping_patch_pairs<T, SA, SB>(
    a: &SA,
    b: &SB,
) -> Vec<(SurfacePatch<T>, SurfacePatch<T>)>
where
    T: FloatingPoint,
    SA: ParametricSurface<T> + ?Sized,
    SB: ParametricSurface<T> + ?Sized,
{
    a.patch_bounds()
        .into_iter()
        .cartesian_product(b.patch_bounds())
        .filter(|(pa, pb)| pa.bounds.intersects(&pb.bounds, None))
        .collect()
}

fn sample_patch<T, R>(rng: &mut R, patch: &SurfacePatch<T>) -> Vector2<T>
where
    T: FloatingPoint,
    R: Rng + ?Sized,
{
    Vector2::new(
        sample_parameter(rng, patch.u_range),
        sample_parameter(rng, patch.v_range),
    )
}
