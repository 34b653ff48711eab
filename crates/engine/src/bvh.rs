//! Bounding-volume hierarchy over a scene's primitives.
//!
//! Nodes live in a flat vector and refer to children by index.

use prism_core::scene::Primitive;

use crate::geometry::{bounding_box, hit_shape, Aabb, HitRecord, Interval, Ray};

#[derive(Debug)]
enum Node {
    Leaf {
        bbox: Aabb,
        primitive: usize,
    },
    Branch {
        bbox: Aabb,
        left: usize,
        right: usize,
    },
}

impl Node {
    fn bbox(&self) -> &Aabb {
        match self {
            Node::Leaf { bbox, .. } | Node::Branch { bbox, .. } => bbox,
        }
    }
}

#[derive(Debug)]
pub struct Bvh {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl Bvh {
    pub fn build(primitives: &[Primitive]) -> Self {
        let boxes: Vec<Aabb> = primitives.iter().map(|p| bounding_box(&p.shape)).collect();
        let mut indices: Vec<usize> = (0..primitives.len()).collect();
        let mut bvh = Self {
            nodes: Vec::with_capacity(primitives.len() * 2),
            root: None,
        };
        if !indices.is_empty() {
            bvh.root = Some(bvh.split(&boxes, &mut indices));
        }
        bvh
    }

    fn split(&mut self, boxes: &[Aabb], indices: &mut [usize]) -> usize {
        if let [only] = indices {
            self.nodes.push(Node::Leaf {
                bbox: boxes[*only],
                primitive: *only,
            });
            return self.nodes.len() - 1;
        }

        let bbox = indices
            .iter()
            .map(|&i| boxes[i])
            .reduce(Aabb::union)
            .unwrap_or(boxes[indices[0]]);
        let axis = bbox.longest_axis();
        indices.sort_by(|&a, &b| {
            boxes[a].centroid()[axis].total_cmp(&boxes[b].centroid()[axis])
        });

        let mid = indices.len() / 2;
        let (lo, hi) = indices.split_at_mut(mid);
        let left = self.split(boxes, lo);
        let right = self.split(boxes, hi);
        self.nodes.push(Node::Branch { bbox, left, right });
        self.nodes.len() - 1
    }

    /// Closest hit along `ray` within `interval`.
    pub fn hit(&self, primitives: &[Primitive], ray: &Ray, interval: Interval) -> Option<HitRecord> {
        let mut closest: Option<HitRecord> = None;
        let mut stack: Vec<usize> = self.root.into_iter().collect();

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let max = closest.map_or(interval.max, |h| h.t);
            if !node.bbox().hit(ray, Interval::new(interval.min, max)) {
                continue;
            }
            match *node {
                Node::Leaf { primitive, .. } => {
                    let p = &primitives[primitive];
                    if let Some(hit) =
                        hit_shape(&p.shape, p.material, ray, Interval::new(interval.min, max))
                    {
                        closest = Some(hit);
                    }
                }
                Node::Branch { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        closest
    }
}

#[cfg(test)]
mod tests {
    use prism_core::scene::{MaterialId, Shape};
    use prism_core::types::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::geometry::T_MIN;

    fn brute_force(primitives: &[Primitive], ray: &Ray) -> Option<f64> {
        primitives
            .iter()
            .filter_map(|p| {
                hit_shape(&p.shape, p.material, ray, Interval::new(T_MIN, f64::INFINITY))
            })
            .map(|h| h.t)
            .min_by(f64::total_cmp)
    }

    #[test]
    fn empty_bvh_hits_nothing() {
        let bvh = Bvh::build(&[]);
        let ray = Ray::new(Vec3::ZERO, Vec3::X, 0.0);
        assert!(bvh.hit(&[], &ray, Interval::new(T_MIN, f64::INFINITY)).is_none());
    }

    #[test]
    fn matches_brute_force_closest_hit() {
        let mut rng = StdRng::seed_from_u64(7);
        let primitives: Vec<Primitive> = (0..60)
            .map(|i| {
                let center = Vec3::new(
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-30.0..-5.0),
                );
                let shape = if i % 3 == 0 {
                    Shape::quad(center, Vec3::new(1.5, 0.0, 0.0), Vec3::new(0.0, 1.5, 0.3))
                } else {
                    Shape::sphere(center, rng.random_range(0.2..2.0))
                };
                Primitive {
                    shape,
                    material: MaterialId(0),
                }
            })
            .collect();
        let bvh = Bvh::build(&primitives);

        for _ in 0..200 {
            let direction = Vec3::new(
                rng.random_range(-0.6..0.6),
                rng.random_range(-0.6..0.6),
                -1.0,
            );
            let ray = Ray::new(Vec3::ZERO, direction, 0.0);
            let expected = brute_force(&primitives, &ray);
            let actual = bvh
                .hit(&primitives, &ray, Interval::new(T_MIN, f64::INFINITY))
                .map(|h| h.t);
            match (expected, actual) {
                (None, None) => {}
                (Some(e), Some(a)) => assert!((e - a).abs() < 1e-9, "{e} vs {a}"),
                other => panic!("mismatch: {other:?}"),
            }
        }
    }
}
