//! Small geometric types shared across modules
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
///
/// An empty box is represented with `min > max` on every axis, so that
/// [`Aabb::union`] and [`Aabb::include`] can start from [`Aabb::empty`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Lower corner
    pub min: Point3<f32>,
    /// Upper corner
    pub max: Point3<f32>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Builds a box from its lower and upper corners
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Returns a box that contains nothing
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(
                f32::NEG_INFINITY,
                f32::NEG_INFINITY,
                f32::NEG_INFINITY,
            ),
        }
    }

    /// Builds the tightest box around a set of points
    pub fn from_points<'a, I: IntoIterator<Item = &'a Point3<f32>>>(
        points: I,
    ) -> Self {
        let mut out = Self::empty();
        for p in points {
            out.include(p);
        }
        out
    }

    /// Checks whether the box contains nothing
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Grows the box to contain the given point
    pub fn include(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Returns the smallest box containing both inputs
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Returns the size of the box along each axis
    pub fn extents(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Returns the center of the box
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Returns the length of the box diagonal
    pub fn diagonal(&self) -> f32 {
        self.extents().norm()
    }

    /// Returns the index of the longest axis (0, 1, or 2)
    pub fn longest_axis(&self) -> usize {
        self.extents().imax()
    }

    /// Returns the surface area of the box, or 0 if it is empty
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extents();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Returns a copy of the box grown by `d` on every side
    pub fn expanded(&self, d: f32) -> Aabb {
        let d = Vector3::repeat(d);
        Aabb {
            min: self.min - d,
            max: self.max + d,
        }
    }

    /// Returns the squared distance from `p` to the closest point in the box
    ///
    /// Points inside the box have a distance of 0.  This is a lower bound on
    /// the distance to anything contained in the box.
    #[inline]
    pub fn distance_squared(&self, p: &Point3<f32>) -> f32 {
        let mut d = 0.0;
        for i in 0..3 {
            let v = if p[i] < self.min[i] {
                self.min[i] - p[i]
            } else if p[i] > self.max[i] {
                p[i] - self.max[i]
            } else {
                0.0
            };
            d += v * v;
        }
        d
    }

    /// Checks whether the point lies within the box (inclusive)
    pub fn contains(&self, p: &Point3<f32>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// Region of a triangle on which a closest point lies
///
/// Edge `i` runs from vertex `i` to vertex `(i + 1) % 3`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Feature {
    /// Strictly inside the triangle
    Face,
    /// On the given edge, excluding its endpoints
    Edge(u8),
    /// On the given vertex
    Vertex(u8),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_box() {
        let b = Aabb::empty();
        assert!(b.is_empty());
        assert_eq!(b.surface_area(), 0.0);

        let mut b = b;
        b.include(&Point3::new(1.0, 2.0, 3.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, b.max);
    }

    #[test]
    fn box_distance() {
        let b = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(b.distance_squared(&Point3::new(0.5, 0.5, 0.5)), 0.0);
        assert_eq!(b.distance_squared(&Point3::new(2.0, 0.5, 0.5)), 1.0);
        assert_eq!(b.distance_squared(&Point3::new(-1.0, -1.0, 0.5)), 2.0);
        assert_eq!(b.surface_area(), 6.0);
        assert_eq!(b.longest_axis(), 0);
    }

    #[test]
    fn box_union() {
        let a = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(
            Point3::new(-1.0, 0.5, 0.5),
            Point3::new(0.5, 3.0, 0.5),
        );
        let u = a.union(&b);
        assert_eq!(u.min, Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(u.max, Point3::new(1.0, 3.0, 1.0));
        assert_eq!(u.longest_axis(), 1);
        assert_eq!(Aabb::empty().union(&a), a);
    }
}
