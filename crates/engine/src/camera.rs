//! Pinhole / thin-lens camera derived from a [`CameraConfig`].

use prism_core::scene::CameraConfig;
use prism_core::types::Vec3;
use rand::Rng;

use crate::geometry::Ray;
use crate::material::random_in_unit_disk;
use crate::RenderError;

#[derive(Debug)]
pub struct Camera {
    pub width: u32,
    pub height: u32,
    center: Vec3,
    pixel00: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,
    defocus: bool,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Result<Self, RenderError> {
        let width = config.image_width.max(1);
        let height = config.image_height();

        let w = (config.lookfrom - config.lookat).normalize_or_zero();
        let u = config.vup.cross(w).normalize_or_zero();
        if w == Vec3::ZERO || u == Vec3::ZERO {
            return Err(RenderError::InvalidScene(
                "degenerate camera: lookfrom, lookat and vup must span a view".to_string(),
            ));
        }
        let v = w.cross(u);

        let h = (config.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * config.focus_dist;
        let viewport_width = viewport_height * f64::from(width) / f64::from(height);

        let viewport_u = viewport_width * u;
        let viewport_v = viewport_height * -v;
        let pixel_delta_u = viewport_u / f64::from(width);
        let pixel_delta_v = viewport_v / f64::from(height);

        let upper_left =
            config.lookfrom - config.focus_dist * w - viewport_u / 2.0 - viewport_v / 2.0;
        let defocus_radius = config.focus_dist * (config.defocus_angle / 2.0).to_radians().tan();

        Ok(Self {
            width,
            height,
            center: config.lookfrom,
            pixel00: upper_left + 0.5 * (pixel_delta_u + pixel_delta_v),
            pixel_delta_u,
            pixel_delta_v,
            defocus_disk_u: u * defocus_radius,
            defocus_disk_v: v * defocus_radius,
            defocus: config.defocus_angle > 0.0,
        })
    }

    /// A randomly jittered ray through pixel `(i, j)` at a random shutter time.
    pub fn ray<R: Rng + ?Sized>(&self, i: u32, j: u32, rng: &mut R) -> Ray {
        let dx: f64 = rng.random::<f64>() - 0.5;
        let dy: f64 = rng.random::<f64>() - 0.5;
        let sample = self.pixel00
            + (f64::from(i) + dx) * self.pixel_delta_u
            + (f64::from(j) + dy) * self.pixel_delta_v;

        let origin = if self.defocus {
            let p = random_in_unit_disk(rng);
            self.center + p.x * self.defocus_disk_u + p.y * self.defocus_disk_v
        } else {
            self.center
        };
        Ray::new(origin, sample - origin, rng.random())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn centre_ray_points_at_lookat() {
        let config = CameraConfig {
            image_width: 101,
            ..Default::default()
        };
        let camera = Camera::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let ray = camera.ray(50, 50, &mut rng);
        let dir = ray.direction.normalize();
        assert!(dir.dot(Vec3::new(0.0, 0.0, -1.0)) > 0.999);
        assert_eq!(ray.origin, Vec3::ZERO);
        assert!((0.0..1.0).contains(&ray.time));
    }

    #[test]
    fn coincident_lookfrom_and_lookat_is_rejected() {
        let config = CameraConfig {
            lookat: Vec3::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            Camera::new(&config),
            Err(RenderError::InvalidScene(_))
        ));
    }
}
