#![allow(dead_code)]

use intersurf::prelude::*;
use nalgebra::{Point3, Vector3};

/// Sphere parameterized by azimuth u in [0, 2π) and polar angle v in
/// [0, π]; closed along u.
pub struct Sphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Point3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl ParametricSurface<f64> for Sphere {
    fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        self.center
            + Vector3::new(v.sin() * u.cos(), v.sin() * u.sin(), v.cos()) * self.radius
    }

    fn tangent_u(&self, u: f64, v: f64) -> Vector3<f64> {
        Vector3::new(-v.sin() * u.sin(), v.sin() * u.cos(), 0.) * self.radius
    }

    fn tangent_v(&self, u: f64, v: f64) -> Vector3<f64> {
        Vector3::new(v.cos() * u.cos(), v.cos() * u.sin(), -v.sin()) * self.radius
    }

    fn u_domain(&self) -> (f64, f64) {
        (0., std::f64::consts::TAU)
    }

    fn v_domain(&self) -> (f64, f64) {
        (0., std::f64::consts::PI)
    }
}

/// Torus around the z axis, closed along both parameters.
pub struct Torus {
    pub major_radius: f64,
    pub minor_radius: f64,
}

impl Torus {
    pub fn new(major_radius: f64, minor_radius: f64) -> Self {
        Self {
            major_radius,
            minor_radius,
        }
    }
}

impl ParametricSurface<f64> for Torus {
    fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        let ring = self.major_radius + self.minor_radius * v.cos();
        Point3::new(ring * u.cos(), ring * u.sin(), self.minor_radius * v.sin())
    }

    fn tangent_u(&self, u: f64, v: f64) -> Vector3<f64> {
        let ring = self.major_radius + self.minor_radius * v.cos();
        Vector3::new(-ring * u.sin(), ring * u.cos(), 0.)
    }

    fn tangent_v(&self, u: f64, v: f64) -> Vector3<f64> {
        Vector3::new(
            -self.minor_radius * v.sin() * u.cos(),
            -self.minor_radius * v.sin() * u.sin(),
            self.minor_radius * v.cos(),
        )
    }

    fn u_domain(&self) -> (f64, f64) {
        (0., std::f64::consts::TAU)
    }

    fn v_domain(&self) -> (f64, f64) {
        (0., std::f64::consts::TAU)
    }
}

/// Radius-1 cylinder around the y axis, closed along u.
pub struct CylinderAlongY;

impl ParametricSurface<f64> for CylinderAlongY {
    fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        Point3::new(u.cos(), v, u.sin())
    }

    fn tangent_u(&self, u: f64, _v: f64) -> Vector3<f64> {
        Vector3::new(-u.sin(), 0., u.cos())
    }

    fn tangent_v(&self, _u: f64, _v: f64) -> Vector3<f64> {
        Vector3::y()
    }

    fn u_domain(&self) -> (f64, f64) {
        (0., std::f64::consts::TAU)
    }

    fn v_domain(&self) -> (f64, f64) {
        (-2., 2.)
    }
}

/// Radius-1 cylinder around the x axis, closed along u.
pub struct CylinderAlongX;

impl ParametricSurface<f64> for CylinderAlongX {
    fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        Point3::new(v, u.cos(), u.sin())
    }

    fn tangent_u(&self, u: f64, _v: f64) -> Vector3<f64> {
        Vector3::new(0., -u.sin(), u.cos())
    }

    fn tangent_v(&self, _u: f64, _v: f64) -> Vector3<f64> {
        Vector3::x()
    }

    fn u_domain(&self) -> (f64, f64) {
        (0., std::f64::consts::TAU)
    }

    fn v_domain(&self) -> (f64, f64) {
        (-2., 2.)
    }
}

/// Extrusion of a figure-eight curve along z. The sheet passes through
/// the segment x = y = 0 twice, at u = 0 and u = π, so it intersects
/// itself there.
pub struct FigureEight;

impl ParametricSurface<f64> for FigureEight {
    fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        Point3::new(u.sin(), u.sin() * u.cos(), v)
    }

    fn tangent_u(&self, u: f64, _v: f64) -> Vector3<f64> {
        Vector3::new(u.cos(), (2. * u).cos(), 0.)
    }

    fn tangent_v(&self, _u: f64, _v: f64) -> Vector3<f64> {
        Vector3::z()
    }

    fn u_domain(&self) -> (f64, f64) {
        (0., std::f64::consts::TAU)
    }

    fn v_domain(&self) -> (f64, f64) {
        (-1., 1.)
    }
}

/// Bounded planar patch spanned by two axes from an origin.
pub struct PlanePatch {
    pub origin: Point3<f64>,
    pub axis_u: Vector3<f64>,
    pub axis_v: Vector3<f64>,
    pub u_range: (f64, f64),
    pub v_range: (f64, f64),
}

impl PlanePatch {
    /// The square patch of the xy plane with the given half-extent.
    pub fn xy(extent: f64) -> Self {
        Self {
            origin: Point3::origin(),
            axis_u: Vector3::x(),
            axis_v: Vector3::y(),
            u_range: (-extent, extent),
            v_range: (-extent, extent),
        }
    }
}

impl ParametricSurface<f64> for PlanePatch {
    fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        self.origin + self.axis_u * u + self.axis_v * v
    }

    fn tangent_u(&self, _u: f64, _v: f64) -> Vector3<f64> {
        self.axis_u
    }

    fn tangent_v(&self, _u: f64, _v: f64) -> Vector3<f64> {
        self.axis_v
    }

    fn u_domain(&self) -> (f64, f64) {
        self.u_range
    }

    fn v_domain(&self) -> (f64, f64) {
        self.v_range
    }
}
