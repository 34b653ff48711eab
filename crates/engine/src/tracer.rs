//! The CPU path tracer.

use std::path::PathBuf;
use std::time::Instant;

use prism_core::progress::{percent_of, ProgressSink};
use prism_core::scene::{CameraConfig, SceneDescriptor};
use prism_core::types::Vec3;
use rand::Rng;

use crate::bvh::Bvh;
use crate::camera::Camera;
use crate::geometry::{Interval, Ray, T_MIN};
use crate::material::{emitted, scatter};
use crate::texture::Textures;
use crate::{PixelBuffer, RenderEngine, RenderError};

/// Samples traced between cancellation checks.
const CANCEL_CHECK_SAMPLES: u32 = 16;

/// Caps applied to a scene's camera before rendering.
///
/// `None` leaves the scene's value untouched. Width is capped with the
/// aspect ratio preserved, since the height is derived from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderLimits {
    pub max_image_width: Option<u32>,
    pub max_samples_per_pixel: Option<u32>,
}

impl RenderLimits {
    pub fn apply(&self, camera: &CameraConfig) -> CameraConfig {
        let mut capped = camera.clone();
        if let Some(max) = self.max_image_width {
            capped.image_width = capped.image_width.min(max.max(1));
        }
        if let Some(max) = self.max_samples_per_pixel {
            capped.samples_per_pixel = capped.samples_per_pixel.min(max.max(1));
        }
        capped
    }
}

/// Monte Carlo path tracer over spheres and quads.
#[derive(Debug, Clone, Default)]
pub struct PathTracer {
    asset_dir: PathBuf,
    limits: RenderLimits,
}

impl PathTracer {
    /// `asset_dir` is where image textures are looked up.
    pub fn new(asset_dir: impl Into<PathBuf>, limits: RenderLimits) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            limits,
        }
    }
}

struct World<'a> {
    scene: &'a SceneDescriptor,
    bvh: Bvh,
    textures: Textures,
    background: Vec3,
}

impl World<'_> {
    fn ray_color<R: Rng + ?Sized>(&self, mut ray: Ray, max_depth: u32, rng: &mut R) -> Vec3 {
        let mut radiance = Vec3::ZERO;
        let mut throughput = Vec3::ONE;

        for _ in 0..max_depth {
            let Some(hit) = self
                .bvh
                .hit(&self.scene.primitives, &ray, Interval::new(T_MIN, f64::INFINITY))
            else {
                return radiance + throughput * self.background;
            };
            let Some(material) = self.scene.material(hit.material) else {
                return radiance;
            };

            radiance += throughput * emitted(material, &self.textures, &hit);
            match scatter(material, &self.textures, &ray, &hit, rng) {
                Some(next) => {
                    throughput *= next.attenuation;
                    ray = next.ray;
                }
                None => return radiance,
            }
        }
        radiance
    }
}

impl RenderEngine for PathTracer {
    fn render(
        &self,
        scene: &SceneDescriptor,
        progress: &dyn ProgressSink,
    ) -> Result<PixelBuffer, RenderError> {
        scene
            .check_references()
            .map_err(RenderError::InvalidScene)?;

        let config = self.limits.apply(&scene.camera);
        let camera = Camera::new(&config)?;
        let mut rng = rand::rng();
        let world = World {
            scene,
            bvh: Bvh::build(&scene.primitives),
            textures: Textures::resolve(&scene.textures, &self.asset_dir, &mut rng)?,
            background: config.background,
        };

        let started = Instant::now();
        let samples = config.samples_per_pixel.max(1);
        let scale = 1.0 / f64::from(samples);
        tracing::debug!(
            width = camera.width,
            height = camera.height,
            samples,
            max_depth = config.max_depth,
            primitives = scene.primitives.len(),
            "Render started"
        );

        let mut buffer = PixelBuffer::new(camera.width, camera.height);
        for j in 0..camera.height {
            for i in 0..camera.width {
                let mut color = Vec3::ZERO;
                for s in 0..samples {
                    if s % CANCEL_CHECK_SAMPLES == 0 && progress.is_cancelled() {
                        tracing::debug!(scanline = j, "Render cancelled");
                        return Err(RenderError::Cancelled);
                    }
                    color += world.ray_color(camera.ray(i, j, &mut rng), config.max_depth, &mut rng);
                }
                buffer.put_linear(i, j, color * scale);
            }
            progress.report(percent_of(u64::from(j) + 1, u64::from(camera.height)));
        }

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Render finished"
        );
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use prism_core::progress::NoProgress;
    use prism_core::scene::{MaterialId, Shape};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<u8>>,
        cancel_after: Option<usize>,
        cancelled: AtomicBool,
    }

    impl ProgressSink for Recorder {
        fn report(&self, percent: u8) {
            let mut updates = self.updates.lock().unwrap();
            updates.push(percent);
            if self.cancel_after.is_some_and(|n| updates.len() >= n) {
                self.cancelled.store(true, Ordering::SeqCst);
            }
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    fn empty_scene(background: Vec3, width: u32) -> SceneDescriptor {
        SceneDescriptor::new(CameraConfig {
            image_width: width,
            samples_per_pixel: 2,
            background,
            ..Default::default()
        })
    }

    #[test]
    fn empty_scene_renders_background_exactly() {
        let tracer = PathTracer::default();
        let buffer = tracer
            .render(&empty_scene(Vec3::X, 8), &NoProgress)
            .unwrap();
        assert_eq!((buffer.width(), buffer.height()), (8, 8));
        assert_eq!(buffer.pixel(0, 0), [255, 0, 0]);
        assert_eq!(buffer.pixel(7, 7), [255, 0, 0]);
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100() {
        let recorder = Recorder::default();
        PathTracer::default()
            .render(&empty_scene(Vec3::ONE, 16), &recorder)
            .unwrap();
        let updates = recorder.updates.lock().unwrap();
        assert_eq!(updates.len(), 16);
        assert!(updates.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*updates.last().unwrap(), 100);
    }

    #[test]
    fn cancellation_is_noticed_within_a_scanline() {
        struct CancelAfterChecks {
            checks: AtomicUsize,
            reports: AtomicUsize,
        }

        impl ProgressSink for CancelAfterChecks {
            fn report(&self, _percent: u8) {
                self.reports.fetch_add(1, Ordering::SeqCst);
            }

            fn is_cancelled(&self) -> bool {
                self.checks.fetch_add(1, Ordering::SeqCst) >= 3
            }
        }

        let sink = CancelAfterChecks {
            checks: AtomicUsize::new(0),
            reports: AtomicUsize::new(0),
        };
        let result = PathTracer::default().render(&empty_scene(Vec3::ONE, 64), &sink);
        assert_matches!(result, Err(RenderError::Cancelled));
        assert_eq!(sink.reports.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_stops_between_scanlines() {
        let recorder = Recorder {
            cancel_after: Some(3),
            ..Default::default()
        };
        let result = PathTracer::default().render(&empty_scene(Vec3::ONE, 16), &recorder);
        assert_matches!(result, Err(RenderError::Cancelled));
        assert_eq!(recorder.updates.lock().unwrap().len(), 3);
    }

    #[test]
    fn limits_cap_width_and_samples() {
        let limits = RenderLimits {
            max_image_width: Some(10),
            max_samples_per_pixel: Some(1),
        };
        let capped = limits.apply(&CameraConfig::default());
        assert_eq!(capped.image_width, 10);
        assert_eq!(capped.samples_per_pixel, 1);

        let tracer = PathTracer::new(".", limits);
        let buffer = tracer.render(&empty_scene(Vec3::ZERO, 400), &NoProgress).unwrap();
        assert_eq!(buffer.width(), 10);
    }

    #[test]
    fn light_in_front_of_camera_is_visible() {
        let mut scene = empty_scene(Vec3::ZERO, 9);
        let light = scene.diffuse_light(Vec3::ONE);
        scene.add(Shape::sphere(Vec3::new(0.0, 0.0, -10.0), 1.0), light);

        let buffer = PathTracer::default().render(&scene, &NoProgress).unwrap();
        assert_eq!(buffer.pixel(4, 4), [255, 255, 255]);
        assert_eq!(buffer.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn dangling_material_is_rejected() {
        let mut scene = empty_scene(Vec3::ZERO, 4);
        scene.add(Shape::sphere(Vec3::ZERO, 1.0), MaterialId(5));
        assert_matches!(
            PathTracer::default().render(&scene, &NoProgress),
            Err(RenderError::InvalidScene(_))
        );
    }
}
