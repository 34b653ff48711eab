//! Scene descriptor builder.
//!
//! Turns a [`RenderRequest`] into either a [`SceneDescriptor`] for the
//! rendering engine or a raw source buffer for the dynamic code pipeline.

use rand::Rng;

use crate::color::hex_to_rgb;
use crate::error::CoreError;
use crate::presets::build_preset;
use crate::request::{CustomSettings, RenderRequest};
use crate::scene::{CameraConfig, SceneDescriptor, Shape};
use crate::types::Vec3;

/// Radius range of procedurally placed spheres.
pub const SPHERE_RADIUS_RANGE: (f64, f64) = (0.1, 5.0);

/// Coordinate range (per axis) of procedurally placed geometry.
pub const COORD_RANGE: (f64, f64) = (-5.0, 5.0);

/// What a job will execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneBuild {
    Scene(SceneDescriptor),
    Source(String),
}

/// Build with the thread-local RNG.
pub fn build(request: &RenderRequest) -> Result<SceneBuild, CoreError> {
    build_with_rng(request, &mut rand::rng())
}

/// Build using `rng` for every random draw, so seeded callers get
/// reproducible scenes.
pub fn build_with_rng<R: Rng + ?Sized>(
    request: &RenderRequest,
    rng: &mut R,
) -> Result<SceneBuild, CoreError> {
    let build = match request {
        RenderRequest::Preset(preset) => SceneBuild::Scene(build_preset(*preset, rng)),
        RenderRequest::Custom(settings) => SceneBuild::Scene(custom_scene(settings, rng)),
        RenderRequest::Generated { source, .. } => {
            if source.trim().is_empty() {
                return Err(CoreError::Validation(
                    "Generated source must not be empty".to_string(),
                ));
            }
            SceneBuild::Source(source.clone())
        }
    };

    if let SceneBuild::Scene(scene) = &build {
        scene.check_references().map_err(CoreError::Internal)?;
    }
    Ok(build)
}

/// Camera for the custom scene: client values over documented defaults.
pub fn custom_camera(settings: &CustomSettings) -> CameraConfig {
    let defaults = CameraConfig::default();
    CameraConfig {
        aspect_ratio: settings.aspect_ratio.unwrap_or(defaults.aspect_ratio),
        image_width: settings.image_width.unwrap_or(defaults.image_width),
        samples_per_pixel: settings
            .samples_per_pixel
            .unwrap_or(defaults.samples_per_pixel),
        max_depth: settings.max_depth.unwrap_or(defaults.max_depth),
        background: settings
            .background_color
            .as_deref()
            .map(|hex| hex_to_rgb(hex).to_unit())
            .unwrap_or(defaults.background),
        vfov: settings.vfov.unwrap_or(defaults.vfov),
        lookfrom: settings.lookfrom.map(Vec3::from).unwrap_or(defaults.lookfrom),
        lookat: settings.lookat.map(Vec3::from).unwrap_or(defaults.lookat),
        vup: settings.vup.map(Vec3::from).unwrap_or(defaults.vup),
        defocus_angle: settings.defocus_angle.unwrap_or(defaults.defocus_angle),
        focus_dist: settings.focus_dist.unwrap_or(defaults.focus_dist),
    }
}

fn custom_scene<R: Rng + ?Sized>(settings: &CustomSettings, rng: &mut R) -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(custom_camera(settings));
    let (lo, hi) = COORD_RANGE;
    let point = |rng: &mut R| {
        Vec3::new(
            rng.random_range(lo..hi),
            rng.random_range(lo..hi),
            rng.random_range(lo..hi),
        )
    };

    for _ in 0..settings.num_spheres.unwrap_or(0) {
        let radius = rng.random_range(SPHERE_RADIUS_RANGE.0..SPHERE_RADIUS_RANGE.1);
        let center = point(rng);
        let albedo = Vec3::new(rng.random(), rng.random(), rng.random());
        let material = scene.lambertian(albedo);
        scene.add(Shape::sphere(center, radius), material);
    }

    for _ in 0..settings.num_quads.unwrap_or(0) {
        let a = point(rng);
        let b = point(rng);
        let c = point(rng);
        let albedo = Vec3::new(rng.random(), rng.random(), rng.random());
        let material = scene.lambertian(albedo);
        scene.add(Shape::quad(a, b - a, c - a), material);
    }

    scene
}
