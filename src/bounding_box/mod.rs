use nalgebra::{Point3, Vector3};

use crate::misc::FloatingPoint;

/// An axis-aligned bounding box in 3D space.
#[derive(Clone, Debug)]
pub struct BoundingBox<T: FloatingPoint> {
    min: Point3<T>,
    max: Point3<T>,
}

impl<T: FloatingPoint> BoundingBox<T> {
    /// Create a new bounding box from two corner points.
    pub fn new(a: Point3<T>, b: Point3<T>) -> Self {
        let mut min = a;
        let mut max = b;
        for i in 0..3 {
            if min[i] > max[i] {
                let tmp = min[i];
                min[i] = max[i];
                max[i] = tmp;
            }
        }
        Self { min, max }
    }

    /// Create a new bounding box enclosing a point iterator.
    pub fn new_with_points<I: IntoIterator<Item = Point3<T>>>(iter: I) -> Self {
        let mut min = Point3::from(Vector3::from_element(T::max_value().unwrap()));
        let mut max = Point3::from(-min.coords);

        for point in iter {
            for i in 0..3 {
                min[i] = min[i].min(point[i]);
                max[i] = max[i].max(point[i]);
            }
        }

        Self { min, max }
    }

    pub fn min(&self) -> &Point3<T> {
        &self.min
    }

    pub fn max(&self) -> &Point3<T> {
        &self.max
    }

    pub fn center(&self) -> Point3<T> {
        self.min + (self.max - self.min) / T::from_usize(2).unwrap()
    }

    pub fn size(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> T {
        self.size().norm()
    }

    /// Grow the box by a margin on all sides.
    pub fn inflate(&self, margin: T) -> Self {
        let d = Vector3::from_element(margin);
        Self {
            min: self.min - d,
            max: self.max + d,
        }
    }

    /// Check if the bounding box intersects with another bounding box.
    ///
    /// # Examples
    /// ```
    /// use nalgebra::Point3;
    /// use intersurf::prelude::BoundingBox;
    ///
    /// let b0 = BoundingBox::new(Point3::new(0., 0., 0.), Point3::new(1., 1., 1.));
    /// assert!(b0.intersects(&b0, None));
    ///
    /// let b1 = BoundingBox::new(Point3::new(0.5, 0.5, 0.5), Point3::new(1.5, 1.5, 1.5));
    /// assert!(b0.intersects(&b1, None));
    ///
    /// let eps = 1e-6;
    /// let b2 = BoundingBox::new(Point3::new(1. + eps, 0., 0.), Point3::new(2., 1., 1.));
    /// assert!(!b0.intersects(&b2, None));
    /// ```
    pub fn intersects(&self, other: &Self, tolerance: Option<T>) -> bool {
        let tolerance = tolerance.unwrap_or(T::default_epsilon());

        // Check if the bounding boxes intersect along each dimension.
        for i in 0..3 {
            let a0 = self.min[i] - tolerance;
            let a1 = self.max[i] + tolerance;
            let b0 = other.min[i] - tolerance;
            let b1 = other.max[i] + tolerance;

            let d0 = b0 - a1;
            let d1 = b1 - a0;

            // If the intervals are disjoint,
            // there is no intersection.
            if d0 * d1 > T::zero() {
                return false;
            }
        }

        true
    }

    /// Overlapping region of two boxes, `None` when they are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let mut min = self.min;
        let mut max = self.max;
        for i in 0..3 {
            min[i] = min[i].max(other.min[i]);
            max[i] = max[i].min(other.max[i]);
            if min[i] > max[i] {
                return None;
            }
        }
        Some(Self { min, max })
    }
}
