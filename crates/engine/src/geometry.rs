//! Rays, bounding boxes and ray/shape intersection.

use prism_core::scene::{MaterialId, Shape};
use prism_core::types::Vec3;

/// Minimum hit distance; avoids self-intersection ("shadow acne").
pub const T_MIN: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Shutter time in `[0, 1)`.
    pub time: f64,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, time: f64) -> Self {
        Self {
            origin,
            direction,
            time,
        }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + t * self.direction
    }
}

/// Open interval of accepted ray parameters.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn surrounds(&self, t: f64) -> bool {
        self.min < t && t < self.max
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HitRecord {
    pub point: Vec3,
    /// Always points against the incoming ray.
    pub normal: Vec3,
    pub t: f64,
    pub u: f64,
    pub v: f64,
    pub front_face: bool,
    pub material: MaterialId,
}

impl HitRecord {
    fn new(ray: &Ray, t: f64, outward_normal: Vec3, (u, v): (f64, f64), material: MaterialId) -> Self {
        let front_face = ray.direction.dot(outward_normal) < 0.0;
        Self {
            point: ray.at(t),
            normal: if front_face {
                outward_normal
            } else {
                -outward_normal
            },
            t,
            u,
            v,
            front_face,
            material,
        }
    }
}

// ---------------------------------------------------------------------------
// Bounding boxes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    const PADDING: f64 = 0.0001;

    /// Box spanned by two corners in any order; flat axes get padded.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut min = a.min(b);
        let mut max = a.max(b);
        for axis in 0..3 {
            if max[axis] - min[axis] < Self::PADDING {
                min[axis] -= Self::PADDING / 2.0;
                max[axis] += Self::PADDING / 2.0;
            }
        }
        Self { min, max }
    }

    pub fn union(self, other: Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn longest_axis(&self) -> usize {
        let extent = self.max - self.min;
        if extent.x > extent.y && extent.x > extent.z {
            0
        } else if extent.y > extent.z {
            1
        } else {
            2
        }
    }

    /// Slab test.
    pub fn hit(&self, ray: &Ray, mut interval: Interval) -> bool {
        for axis in 0..3 {
            let inv = 1.0 / ray.direction[axis];
            let mut t0 = (self.min[axis] - ray.origin[axis]) * inv;
            let mut t1 = (self.max[axis] - ray.origin[axis]) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            interval.min = interval.min.max(t0);
            interval.max = interval.max.min(t1);
            if interval.max <= interval.min {
                return false;
            }
        }
        true
    }
}

pub fn bounding_box(shape: &Shape) -> Aabb {
    match *shape {
        Shape::Sphere {
            center,
            motion,
            radius,
        } => {
            let r = Vec3::splat(radius.abs());
            let start = Aabb::from_points(center - r, center + r);
            let end = center + motion;
            start.union(Aabb::from_points(end - r, end + r))
        }
        Shape::Quad { q, u, v } => {
            Aabb::from_points(q, q + u + v).union(Aabb::from_points(q + u, q + v))
        }
    }
}

// ---------------------------------------------------------------------------
// Intersection
// ---------------------------------------------------------------------------

pub fn hit_shape(
    shape: &Shape,
    material: MaterialId,
    ray: &Ray,
    interval: Interval,
) -> Option<HitRecord> {
    match *shape {
        Shape::Sphere {
            center,
            motion,
            radius,
        } => hit_sphere(center + motion * ray.time, radius, material, ray, interval),
        Shape::Quad { q, u, v } => hit_quad(q, u, v, material, ray, interval),
    }
}

fn hit_sphere(
    center: Vec3,
    radius: f64,
    material: MaterialId,
    ray: &Ray,
    interval: Interval,
) -> Option<HitRecord> {
    let oc = center - ray.origin;
    let a = ray.direction.length_squared();
    let h = ray.direction.dot(oc);
    let c = oc.length_squared() - radius * radius;
    let discriminant = h * h - a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrtd = discriminant.sqrt();
    let mut root = (h - sqrtd) / a;
    if !interval.surrounds(root) {
        root = (h + sqrtd) / a;
        if !interval.surrounds(root) {
            return None;
        }
    }

    let outward = (ray.at(root) - center) / radius;
    Some(HitRecord::new(ray, root, outward, sphere_uv(outward), material))
}

/// Spherical coordinates of a point on the unit sphere, mapped to `[0, 1]`.
fn sphere_uv(p: Vec3) -> (f64, f64) {
    use std::f64::consts::PI;
    let theta = (-p.y).clamp(-1.0, 1.0).acos();
    let phi = (-p.z).atan2(p.x) + PI;
    (phi / (2.0 * PI), theta / PI)
}

fn hit_quad(
    q: Vec3,
    u: Vec3,
    v: Vec3,
    material: MaterialId,
    ray: &Ray,
    interval: Interval,
) -> Option<HitRecord> {
    let n = u.cross(v);
    let normal = n.normalize_or_zero();
    if normal == Vec3::ZERO {
        return None;
    }

    let denom = normal.dot(ray.direction);
    if denom.abs() < 1e-8 {
        return None;
    }

    let d = normal.dot(q);
    let t = (d - normal.dot(ray.origin)) / denom;
    if !interval.surrounds(t) {
        return None;
    }

    let w = n / n.dot(n);
    let planar = ray.at(t) - q;
    let alpha = w.dot(planar.cross(v));
    let beta = w.dot(u.cross(planar));
    if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
        return None;
    }

    Some(HitRecord::new(ray, t, normal, (alpha, beta), material))
}

#[cfg(test)]
mod tests {
    use super::*;

    const M: MaterialId = MaterialId(0);

    fn forward() -> Interval {
        Interval::new(T_MIN, f64::INFINITY)
    }

    #[test]
    fn ray_hits_sphere_front_face() {
        let sphere = Shape::sphere(Vec3::new(0.0, 0.0, -5.0), 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0.0);
        let hit = hit_shape(&sphere, M, &ray, forward()).unwrap();
        assert!((hit.t - 4.0).abs() < 1e-9);
        assert!(hit.front_face);
        assert_eq!(hit.normal, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn ray_misses_sphere_behind_it() {
        let sphere = Shape::sphere(Vec3::new(0.0, 0.0, 5.0), 1.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0.0);
        assert!(hit_shape(&sphere, M, &ray, forward()).is_none());
    }

    #[test]
    fn moving_sphere_follows_shutter_time() {
        let sphere = Shape::moving_sphere(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 10.0, -5.0),
            1.0,
        );
        let ray0 = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0.0);
        let ray1 = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0.9);
        assert!(hit_shape(&sphere, M, &ray0, forward()).is_some());
        assert!(hit_shape(&sphere, M, &ray1, forward()).is_none());
    }

    #[test]
    fn quad_hit_inside_and_outside() {
        let quad = Shape::quad(
            Vec3::new(-1.0, -1.0, -3.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        );
        let center = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0.0);
        let hit = hit_shape(&quad, M, &center, forward()).unwrap();
        assert!((hit.t - 3.0).abs() < 1e-9);
        assert!((hit.u - 0.5).abs() < 1e-9 && (hit.v - 0.5).abs() < 1e-9);

        let outside = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0), 0.0);
        assert!(hit_shape(&quad, M, &outside, forward()).is_none());
    }

    #[test]
    fn flat_quad_box_is_padded() {
        let quad = Shape::quad(Vec3::ZERO, Vec3::X, Vec3::Y);
        let bbox = bounding_box(&quad);
        assert!(bbox.max.z > bbox.min.z);
        let ray = Ray::new(Vec3::new(0.5, 0.5, 1.0), Vec3::new(0.0, 0.0, -1.0), 0.0);
        assert!(bbox.hit(&ray, forward()));
    }

    #[test]
    fn moving_sphere_box_covers_both_ends() {
        let sphere = Shape::moving_sphere(Vec3::ZERO, Vec3::new(0.0, 4.0, 0.0), 1.0);
        let bbox = bounding_box(&sphere);
        assert_eq!(bbox.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(bbox.max, Vec3::new(1.0, 5.0, 1.0));
    }
}
