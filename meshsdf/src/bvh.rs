//! Bounding volume hierarchy for nearest-triangle queries
//!
//! The tree is stored as an arena of [`Node`] objects addressed by index, with
//! the root at index 0.  Leaves refer to a contiguous range of triangle
//! indices stored in a single shared array.
//!
//! Construction is deterministic: given the same triangles in the same order,
//! the resulting tree is identical, because every sort is keyed on both the
//! centroid coordinate and the triangle index.
use crate::{
    mesh::Triangle,
    types::{Aabb, Feature},
};
use nalgebra::Point3;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::{cmp::Reverse, collections::BinaryHeap, ops::Range};

/// Triangle count above which sorts are done in parallel
const PAR_SORT_THRESHOLD: usize = 1 << 14;

/// Settings for BVH construction
#[derive(Copy, Clone, Debug)]
pub struct BvhSettings {
    /// Nodes with at most this many triangles become leaves
    pub leaf_size: usize,
    /// Nodes at this depth become leaves regardless of their size
    pub max_depth: usize,
}

impl Default for BvhSettings {
    fn default() -> Self {
        Self {
            leaf_size: 4,
            max_depth: 48,
        }
    }
}

/// Contents of a BVH node
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    /// Leaf, covering `order[start..start + count]`
    Leaf {
        /// Offset into the triangle order array
        start: u32,
        /// Number of triangles
        count: u32,
    },
    /// Interior node with two children
    Branch {
        /// Index of the left child
        left: u32,
        /// Index of the right child
        right: u32,
    },
}

/// Single node in the tree
#[derive(Copy, Clone, Debug)]
pub struct Node {
    /// Box containing every triangle in this subtree
    pub bounds: Aabb,
    /// Leaf or branch data
    pub kind: NodeKind,
}

/// Result of a nearest-triangle query
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Nearest {
    /// Unsigned distance from the query point to the triangle
    pub distance: f32,
    /// Index of the nearest triangle
    pub triangle: usize,
    /// Closest point on the triangle
    pub point: Point3<f32>,
    /// Region of the triangle containing the closest point
    pub feature: Feature,
}

/// Reusable scratch space for nearest-triangle queries
///
/// Queries allocate a priority queue; keeping one of these per worker thread
/// avoids reallocating it for every voxel.
#[derive(Default)]
pub struct NearestQuery {
    heap: BinaryHeap<Reverse<(OrderedFloat<f32>, u32)>>,
}

/// Bounding volume hierarchy over a set of triangles
pub struct Bvh {
    nodes: Vec<Node>,
    order: Vec<u32>,
    depth: usize,
}

impl Bvh {
    /// Builds a BVH with default settings
    pub fn build(triangles: &[Triangle]) -> Self {
        Self::build_with(triangles, BvhSettings::default())
    }

    /// Builds a BVH with the given settings
    ///
    /// Interior nodes are split with a full-sweep surface area heuristic
    /// along every axis.
    pub fn build_with(triangles: &[Triangle], settings: BvhSettings) -> Self {
        let mut builder = Builder {
            triangles,
            centroids: triangles.iter().map(|t| t.centroid()).collect(),
            settings: BvhSettings {
                leaf_size: settings.leaf_size.max(1),
                ..settings
            },
            nodes: vec![],
            order: (0..triangles.len() as u32).collect(),
            depth: 0,
        };
        if !triangles.is_empty() {
            builder.build(0..triangles.len(), 0);
        }
        Self {
            nodes: builder.nodes,
            order: builder.order,
            depth: builder.depth,
        }
    }

    /// Returns the nodes of the tree; the root is at index 0
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the triangle indices referenced by a leaf
    pub fn leaf_triangles(&self, start: u32, count: u32) -> &[u32] {
        &self.order[start as usize..(start + count) as usize]
    }

    /// Returns the depth of the deepest leaf (the root has depth 0)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the bounding box of the whole tree
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    /// Finds the triangle nearest to `p`
    ///
    /// `triangles` must be the same slice that was used to build the tree.
    /// Returns `None` only if the tree is empty.
    pub fn nearest(
        &self,
        triangles: &[Triangle],
        p: &Point3<f32>,
    ) -> Option<Nearest> {
        self.nearest_with(&mut NearestQuery::default(), triangles, p, None)
    }

    /// Finds the triangle nearest to `p`, using caller-provided scratch space
    ///
    /// `hint` is a triangle which is likely to be close to `p` (e.g. the
    /// result for a neighboring point); it is used to seed the search, and
    /// does not change the result.  Ties are broken in favor of the lowest
    /// triangle index, so the answer is exact and unique.
    pub fn nearest_with(
        &self,
        query: &mut NearestQuery,
        triangles: &[Triangle],
        p: &Point3<f32>,
        hint: Option<usize>,
    ) -> Option<Nearest> {
        let root = self.nodes.first()?;

        let mut best = hint.map(|t| {
            let (d, q, f) = triangles[t].distance_squared(p);
            (d, t, q, f)
        });
        let bound = |best: &Option<(f32, usize, _, _)>| {
            best.map(|b| b.0).unwrap_or(f32::INFINITY)
        };

        let heap = &mut query.heap;
        heap.clear();
        heap.push(Reverse((OrderedFloat(root.bounds.distance_squared(p)), 0)));
        while let Some(Reverse((OrderedFloat(d), i))) = heap.pop() {
            if d > bound(&best) {
                break;
            }
            match self.nodes[i as usize].kind {
                NodeKind::Leaf { start, count } => {
                    for &t in self.leaf_triangles(start, count) {
                        let t = t as usize;
                        let (d, q, f) = triangles[t].distance_squared(p);
                        let better = match best {
                            None => true,
                            Some((bd, bt, ..)) => d < bd || (d == bd && t < bt),
                        };
                        if better {
                            best = Some((d, t, q, f));
                        }
                    }
                }
                NodeKind::Branch { left, right } => {
                    for c in [left, right] {
                        let b = &self.nodes[c as usize].bounds;
                        let d = b.distance_squared(p);
                        if d <= bound(&best) {
                            heap.push(Reverse((OrderedFloat(d), c)));
                        }
                    }
                }
            }
        }

        best.map(|(d, triangle, point, feature)| Nearest {
            distance: d.sqrt(),
            triangle,
            point,
            feature,
        })
    }
}

struct Builder<'a> {
    triangles: &'a [Triangle],
    centroids: Vec<Point3<f32>>,
    settings: BvhSettings,
    nodes: Vec<Node>,
    order: Vec<u32>,
    depth: usize,
}

impl Builder<'_> {
    /// Recursively builds the subtree for `order[range]`, returning its index
    fn build(&mut self, range: Range<usize>, depth: usize) -> u32 {
        let index = self.nodes.len();
        let bounds = self.order[range.clone()]
            .iter()
            .fold(Aabb::empty(), |b, &t| {
                b.union(self.triangles[t as usize].bounds())
            });
        let leaf = NodeKind::Leaf {
            start: range.start as u32,
            count: range.len() as u32,
        };
        self.nodes.push(Node { bounds, kind: leaf });
        self.depth = self.depth.max(depth);

        if range.len() <= self.settings.leaf_size
            || depth >= self.settings.max_depth
        {
            return index as u32;
        }

        let mid = range.start + self.split(range.clone());
        let left = self.build(range.start..mid, depth + 1);
        let right = self.build(mid..range.end, depth + 1);
        self.nodes[index].kind = NodeKind::Branch { left, right };
        index as u32
    }

    /// Reorders `order[range]` and returns the size of the left partition
    ///
    /// The result is always in `1..range.len()`.
    fn split(&mut self, range: Range<usize>) -> usize {
        let n = range.len();
        let mut best: Option<(f32, usize, usize)> = None;
        let mut sorted = self.order[range.clone()].to_vec();
        let mut right_area = vec![0.0; n];

        for axis in 0..3 {
            sort_on_axis(&mut sorted, &self.centroids, axis);

            // right_area[i] is the area of the box around sorted[i..]
            let mut b = Aabb::empty();
            for i in (1..n).rev() {
                b = b.union(self.triangles[sorted[i] as usize].bounds());
                right_area[i] = b.surface_area();
            }

            let mut b = Aabb::empty();
            for i in 1..n {
                b = b.union(self.triangles[sorted[i - 1] as usize].bounds());
                let cost = b.surface_area() * i as f32
                    + right_area[i] * (n - i) as f32;
                if best.is_none_or(|(c, ..)| cost < c) {
                    best = Some((cost, axis, i));
                }
            }
        }

        // `n >= 2` here, so at least one split was considered
        let (_, axis, mid) = best.unwrap_or((0.0, 0, n / 2));
        if axis != 2 {
            sort_on_axis(&mut sorted, &self.centroids, axis);
        }
        self.order[range].copy_from_slice(&sorted);
        mid
    }
}

/// Sorts triangle indices by centroid along one axis, then by index
///
/// The key is a total order, so the result does not depend on the input
/// order or on the sort implementation.
fn sort_on_axis(tris: &mut [u32], centroids: &[Point3<f32>], axis: usize) {
    let key = |t: &u32| (OrderedFloat(centroids[*t as usize][axis]), *t);
    if tris.len() >= PAR_SORT_THRESHOLD {
        tris.par_sort_unstable_by_key(key);
    } else {
        tris.sort_unstable_by_key(key);
    }
}
