//! Triangle primitive with precomputed geometry
use crate::types::{Aabb, Feature};
use nalgebra::{Point3, Vector3};

/// A single triangle in a [`Soup`](super::Soup)
///
/// All derived values are computed once at construction; the triangle is
/// never modified afterwards.
#[derive(Copy, Clone, Debug)]
pub struct Triangle {
    verts: [Point3<f32>; 3],
    ab: Vector3<f32>,
    ac: Vector3<f32>,
    normal: Vector3<f32>,
    bounds: Aabb,
}

impl Triangle {
    /// Builds a triangle from three positions, wound counter-clockwise when
    /// seen from outside the shape
    pub fn new(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        let ab = b - a;
        let ac = c - a;
        let normal = ab
            .cross(&ac)
            .try_normalize(0.0)
            .unwrap_or_else(Vector3::zeros);
        Self {
            verts: [a, b, c],
            ab,
            ac,
            normal,
            bounds: Aabb::from_points(&[a, b, c]),
        }
    }

    /// Returns the triangle's vertices
    pub fn verts(&self) -> &[Point3<f32>; 3] {
        &self.verts
    }

    /// Returns the unit face normal (zero for a degenerate triangle)
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Returns the bounding box of the triangle
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Returns the centroid of the triangle
    pub fn centroid(&self) -> Point3<f32> {
        let [a, b, c] = self.verts;
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Returns the area of the triangle
    pub fn area(&self) -> f32 {
        self.ab.cross(&self.ac).norm() * 0.5
    }

    /// Returns the interior angle at vertex `i`, in radians
    pub fn angle(&self, i: usize) -> f32 {
        let p = self.verts[i];
        let u = self.verts[(i + 1) % 3] - p;
        let v = self.verts[(i + 2) % 3] - p;
        u.cross(&v).norm().atan2(u.dot(&v))
    }

    /// Finds the point on the triangle closest to `p`
    ///
    /// Returns the closest point and the region of the triangle (face, edge,
    /// or vertex) on which it lies.  This walks the Voronoi regions of the
    /// vertices and edges before falling back to a barycentric projection
    /// onto the face.
    pub fn closest_point(&self, p: &Point3<f32>) -> (Point3<f32>, Feature) {
        let [a, b, c] = self.verts;
        let (ab, ac) = (self.ab, self.ac);

        let ap = p - a;
        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return (a, Feature::Vertex(0));
        }

        let bp = p - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return (b, Feature::Vertex(1));
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return (a + ab * v, Feature::Edge(0));
        }

        let cp = p - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return (c, Feature::Vertex(2));
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return (a + ac * w, Feature::Edge(2));
        }

        let va = d3 * d6 - d5 * d4;
        let (e4, e5) = (d4 - d3, d5 - d6);
        if va <= 0.0 && e4 >= 0.0 && e5 >= 0.0 {
            let w = e4 / (e4 + e5);
            return (b + (c - b) * w, Feature::Edge(1));
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        (a + ab * v + ac * w, Feature::Face)
    }

    /// Returns the squared distance from `p` to the triangle, along with the
    /// closest point and its feature
    #[inline]
    pub fn distance_squared(
        &self,
        p: &Point3<f32>,
    ) -> (f32, Point3<f32>, Feature) {
        let (q, f) = self.closest_point(p);
        ((p - q).norm_squared(), q, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn tri() -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn triangle_basics() {
        let t = tri();
        assert_eq!(t.normal(), Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(t.area(), 0.5);
        assert_relative_eq!(t.angle(0), std::f32::consts::FRAC_PI_2);
        assert_relative_eq!(t.angle(1), std::f32::consts::FRAC_PI_4);
        assert_relative_eq!(
            t.angle(0) + t.angle(1) + t.angle(2),
            std::f32::consts::PI
        );
    }

    #[test]
    fn closest_point_regions() {
        let t = tri();

        let (q, f) = t.closest_point(&Point3::new(0.25, 0.25, 1.0));
        assert_eq!(f, Feature::Face);
        assert_relative_eq!(q, Point3::new(0.25, 0.25, 0.0));

        let (q, f) = t.closest_point(&Point3::new(-1.0, -1.0, 0.0));
        assert_eq!(f, Feature::Vertex(0));
        assert_eq!(q, Point3::new(0.0, 0.0, 0.0));

        let (q, f) = t.closest_point(&Point3::new(2.0, -0.5, 0.0));
        assert_eq!(f, Feature::Vertex(1));
        assert_eq!(q, Point3::new(1.0, 0.0, 0.0));

        let (q, f) = t.closest_point(&Point3::new(-0.5, 3.0, 0.5));
        assert_eq!(f, Feature::Vertex(2));
        assert_eq!(q, Point3::new(0.0, 1.0, 0.0));

        let (q, f) = t.closest_point(&Point3::new(0.5, -1.0, 0.0));
        assert_eq!(f, Feature::Edge(0));
        assert_relative_eq!(q, Point3::new(0.5, 0.0, 0.0));

        let (q, f) = t.closest_point(&Point3::new(1.0, 1.0, 0.0));
        assert_eq!(f, Feature::Edge(1));
        assert_relative_eq!(q, Point3::new(0.5, 0.5, 0.0));

        let (q, f) = t.closest_point(&Point3::new(-1.0, 0.5, -2.0));
        assert_eq!(f, Feature::Edge(2));
        assert_relative_eq!(q, Point3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn distance_matches_brute_force() {
        // Dense sampling of the triangle should never beat the exact answer
        let t = Triangle::new(
            Point3::new(0.1, -0.3, 0.2),
            Point3::new(1.2, 0.4, -0.1),
            Point3::new(-0.4, 0.9, 0.5),
        );
        let [a, b, c] = *t.verts();
        let queries = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(2.0, 2.0, 2.0),
            Point3::new(-1.0, 0.2, -0.5),
            Point3::new(0.3, 0.3, 0.3),
        ];
        for p in queries {
            let (d2, _, _) = t.distance_squared(&p);
            let mut best = f32::INFINITY;
            let n = 100;
            for i in 0..=n {
                for j in 0..=(n - i) {
                    let u = i as f32 / n as f32;
                    let v = j as f32 / n as f32;
                    let q = a + (b - a) * u + (c - a) * v;
                    best = best.min((p - q).norm_squared());
                }
            }
            assert!(d2 <= best + 1e-5, "{d2} > {best} at {p:?}");
            assert!(best - d2 < 1e-2, "{d2} much less than {best} at {p:?}");
        }
    }
}
