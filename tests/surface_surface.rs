mod common;

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_3};
use std::time::Duration;

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{CylinderAlongX, CylinderAlongY, FigureEight, PlanePatch, Sphere, Torus};
use intersurf::prelude::*;

fn unit_spheres() -> (Sphere, Sphere) {
    (
        Sphere::new(Point3::origin(), 1.),
        Sphere::new(Point3::new(1., 0., 0.), 1.),
    )
}

/// A point on the intersection circle of the two unit spheres.
fn sphere_hint() -> Point3<f64> {
    Point3::new(0.5, 3f64.sqrt() / 2., 0.)
}

fn sphere_options() -> SurfaceIntersectionOptions<f64> {
    SurfaceIntersectionOptions::default().with_step(0.05)
}

fn sphere_curve() -> SurfaceIntersection<f64> {
    let (a, b) = unit_spheres();
    intersect_surfaces_with_hint(&a, &b, &sphere_hint(), &sphere_options()).unwrap()
}

#[test]
fn overlapping_spheres_close_into_a_loop() {
    let (a, b) = unit_spheres();
    let curve = sphere_curve();
    assert!(curve.looped());
    assert!(!curve.too_short());
    assert!(!curve.singular_crossed());
    // Circle of radius sqrt(3)/2, circumference about 5.4.
    assert!(curve.len() > 50);
    for p in curve.points() {
        assert_relative_eq!((p - a.center).norm(), 1., epsilon = 1e-9);
        assert!(((p - b.center).norm() - 1.).abs() < 1e-5);
    }
}

#[test]
fn traced_parameters_evaluate_to_the_same_points() {
    let (a, b) = unit_spheres();
    let curve = sphere_curve();
    for (uv_a, uv_b) in curve.uvs_a().iter().zip(curve.uvs_b()) {
        let pa = a.point_at(uv_a.x, uv_a.y);
        let pb = b.point_at(uv_b.x, uv_b.y);
        assert!((pa - pb).norm() < 1e-5);
    }
}

#[test]
fn spacing_follows_the_requested_step() {
    let curve = sphere_curve();
    let points = curve.points();
    for w in points.windows(2) {
        let d = (w[1] - w[0]).norm();
        assert!(d > 0.05 * 0.8, "spacing {} too short", d);
        assert!(d < 0.05 * 1.5, "spacing {} too long", d);
    }
    // The loop closes within the half-step threshold plus one step.
    let gap = (points[points.len() - 1] - points[0]).norm();
    assert!(gap < 0.08);
}

#[test]
fn tracing_from_a_quadruple_is_deterministic() {
    let (a, b) = unit_spheres();
    let uv_a = Vector2::new(FRAC_PI_3, FRAC_PI_2);
    let uv_b = Vector2::new(2. * FRAC_PI_3, FRAC_PI_2);
    let first = intersect_surfaces(&a, &b, uv_a, uv_b, &sphere_options()).unwrap();
    let second = intersect_surfaces(&a, &b, uv_a, uv_b, &sphere_options()).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(first.uvs_a(), second.uvs_a());
    assert_eq!(first.uvs_b(), second.uvs_b());
}

#[test]
fn single_step_budget_is_too_short() {
    let (a, b) = unit_spheres();
    let curve = intersect_surfaces(
        &a,
        &b,
        Vector2::new(FRAC_PI_3, FRAC_PI_2),
        Vector2::new(2. * FRAC_PI_3, FRAC_PI_2),
        &sphere_options().with_max_steps(1),
    )
    .unwrap();
    assert!(curve.too_short());
    assert!(!curve.looped());
    assert_eq!(curve.len(), 2);
}

#[test]
fn exhausted_budget_reports_timeout() {
    let (a, b) = unit_spheres();
    let options = sphere_options()
        .with_compute_budget(Duration::ZERO)
        .with_break_on_timeout(true);
    std::thread::sleep(Duration::from_millis(1));
    let res = intersect_surfaces_with_hint(&a, &b, &sphere_hint(), &options);
    assert_eq!(res.unwrap_err(), IntersectionError::Timeout);
}

fn torus_options() -> SurfaceIntersectionOptions<f64> {
    SurfaceIntersectionOptions::default().with_compute_budget(Duration::from_secs(120))
}

/// Every point is on the z = 0 plane and on one of the two circles the
/// torus cuts out of it.
fn assert_on_midplane_circles(curve: &SurfaceIntersection<f64>) {
    for p in curve.points() {
        assert!(p.z.abs() < 1e-5);
        let rho = (p.x * p.x + p.y * p.y).sqrt();
        let off = (rho - 1.5).abs().min((rho - 2.5).abs());
        assert!(off < 1e-3, "point {:?} off both circles", p);
    }
}

#[test]
fn torus_and_midplane_meet_in_circles() {
    let torus = Torus::new(2., 0.5);
    let plane = PlanePatch::xy(3.);
    let mut rng = StdRng::seed_from_u64(42);
    let curves = find_many_intersections(&torus, &plane, &torus_options(), &mut rng);
    assert!(!curves.is_empty());
    // The two circles; starts landing on a found curve are not re-traced.
    assert!(curves.len() <= 2);
    for curve in &curves {
        assert!(curve.looped());
        assert_on_midplane_circles(curve);
    }
}

#[test]
fn hintless_search_finds_a_component() {
    let torus = Torus::new(2., 0.5);
    let plane = PlanePatch::xy(3.);
    let mut rng = StdRng::seed_from_u64(11);
    let curve =
        intersect_surfaces_without_hint(&torus, &plane, &torus_options(), &mut rng).unwrap();
    assert!(curve.looped());
    assert_on_midplane_circles(&curve);
}

#[test]
fn flat_patch_has_no_self_intersection() {
    let plane = PlanePatch::xy(1.);
    let options = SurfaceIntersectionOptions::default()
        .with_compute_budget(Duration::from_secs(60));
    let mut rng = StdRng::seed_from_u64(7);
    let res = self_intersect_surface_without_hint(&plane, &options, &mut rng);
    assert_eq!(res.unwrap_err(), IntersectionError::NotFound);
}

/// Two equal-radius cylinders cross along a curve through the tangency
/// points (0, 0, ±1), where the normals are parallel.
fn crossing_cylinders_curve() -> SurfaceIntersection<f64> {
    let a = CylinderAlongY;
    let b = CylinderAlongX;
    let hint = Point3::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2, FRAC_1_SQRT_2);
    let options = SurfaceIntersectionOptions::default()
        .with_step(0.05)
        .with_max_steps(500);
    intersect_surfaces_with_hint(&a, &b, &hint, &options).unwrap()
}

#[test]
fn crossing_cylinders_round_trip_stays_tight_across_seams() {
    let a = CylinderAlongY;
    let b = CylinderAlongX;
    let curve = crossing_cylinders_curve();
    // The curve runs through (1, 1, 0), where both u seams coincide.
    assert!(curve
        .points()
        .iter()
        .any(|p| (p - Point3::new(1., 1., 0.)).norm() < 0.1));
    for (uv_a, uv_b) in curve.uvs_a().iter().zip(curve.uvs_b()) {
        let pa = a.point_at(uv_a.x, uv_a.y);
        let pb = b.point_at(uv_b.x, uv_b.y);
        assert!(
            (pa - pb).norm() < 1e-6,
            "residual {} at {:?}",
            (pa - pb).norm(),
            uv_a
        );
    }
}

#[test]
fn tangency_crossing_is_flagged_and_closes() {
    let curve = crossing_cylinders_curve();
    assert!(curve.looped());
    assert!(curve.singular_crossed());
    assert!(!curve.too_short());
    assert!(curve.len() > 100);
    let top = curve
        .points()
        .iter()
        .map(|p| p.z)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(top > 0.99, "trace stopped short of the tangency: {}", top);
    for p in curve.points() {
        assert!((p.x * p.x + p.z * p.z - 1.).abs() < 1e-9);
        assert!((p.y * p.y + p.z * p.z - 1.).abs() < 1e-5);
    }
}

#[test]
fn figure_eight_sheet_intersects_itself() {
    let sheet = FigureEight;
    let options = SurfaceIntersectionOptions::default();
    let mut rng = StdRng::seed_from_u64(3);
    let curve =
        self_intersect_surface_with_hint(&sheet, &Point3::origin(), &options, &mut rng).unwrap();
    assert!(!curve.looped());
    assert!(curve.len() > 10);
    // The self-intersection is the segment x = y = 0, z in [-1, 1],
    // reached through two different parameter tracks.
    for p in curve.points() {
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6, "off the segment: {:?}", p);
    }
    let zs = curve.points().iter().map(|p| p.z);
    let top = zs.clone().fold(f64::NEG_INFINITY, f64::max);
    let bottom = zs.fold(f64::INFINITY, f64::min);
    assert!(top > 0.9 && bottom < -0.9);
    for (uv_a, uv_b) in curve.uvs_a().iter().zip(curve.uvs_b()) {
        assert!((uv_a.x - uv_b.x).abs() > 1.);
    }
}

#[test]
fn forced_loop_follows_the_patch_border() {
    // The patch ends at y = 1, cutting off the top of the circle the
    // sphere draws on it; border following closes the curve along y = 1.
    let plane = PlanePatch {
        origin: Point3::origin(),
        axis_u: nalgebra::Vector3::x(),
        axis_v: nalgebra::Vector3::y(),
        u_range: (-3., 3.),
        v_range: (-3., 1.),
    };
    let sphere = Sphere::new(Point3::origin(), 2.);
    let options = SurfaceIntersectionOptions::default().with_force_loop(true);
    let curve =
        intersect_surfaces_with_hint(&plane, &sphere, &Point3::new(0., -2., 0.), &options)
            .unwrap();
    assert!(curve.looped());
    assert!(!curve.too_short());
    assert!(curve.len() > 80);
    let mut border_points = 0;
    for p in curve.points() {
        assert!(p.z.abs() < 1e-5);
        let rho = (p.x * p.x + p.y * p.y).sqrt();
        let on_circle = (rho - 2.).abs() < 0.1;
        let on_border = (p.y - 1.).abs() < 1e-6;
        assert!(on_circle || on_border, "point {:?} off circle and border", p);
        if on_border {
            border_points += 1;
        }
    }
    assert!(border_points > 10);
}
