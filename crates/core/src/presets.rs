//! The seven built-in scenes with hard-coded geometry and camera settings.

use rand::Rng;

use crate::request::PresetName;
use crate::scene::{CameraConfig, Material, SceneDescriptor, Shape, Texture};
use crate::types::Vec3;

/// File name of the texture used by the `earth` preset.
pub const EARTH_TEXTURE: &str = "earthmap.jpg";

const SKY: Vec3 = Vec3::new(0.70, 0.80, 1.00);

/// Build the scene for `preset`. Only `bouncing_spheres` draws from `rng`.
pub fn build_preset<R: Rng + ?Sized>(preset: PresetName, rng: &mut R) -> SceneDescriptor {
    match preset {
        PresetName::BouncingSpheres => bouncing_spheres(rng),
        PresetName::CheckeredSpheres => checkered_spheres(),
        PresetName::Earth => earth(),
        PresetName::PerlinSpheres => perlin_spheres(),
        PresetName::Quads => quads(),
        PresetName::SimpleLight => simple_light(),
        PresetName::CornellBox => cornell_box(),
    }
}

/// Camera shared by the 16:9 "tutorial" presets.
fn wide_camera(samples_per_pixel: u32, max_depth: u32) -> CameraConfig {
    CameraConfig {
        aspect_ratio: 16.0 / 9.0,
        image_width: 400,
        samples_per_pixel,
        max_depth,
        background: SKY,
        vfov: 20.0,
        lookfrom: Vec3::new(13.0, 2.0, 3.0),
        lookat: Vec3::ZERO,
        vup: Vec3::Y,
        defocus_angle: 0.0,
        focus_dist: 10.0,
    }
}

fn checker(scene: &mut SceneDescriptor) -> crate::scene::MaterialId {
    let even = scene.add_texture(Texture::Solid(Vec3::new(0.2, 0.3, 0.1)));
    let odd = scene.add_texture(Texture::Solid(Vec3::new(0.9, 0.9, 0.9)));
    let checker = scene.add_texture(Texture::Checker {
        scale: 0.32,
        even,
        odd,
    });
    scene.add_material(Material::Lambertian { albedo: checker })
}

fn random_color<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> Vec3 {
    Vec3::new(
        rng.random_range(min..max),
        rng.random_range(min..max),
        rng.random_range(min..max),
    )
}

fn bouncing_spheres<R: Rng + ?Sized>(rng: &mut R) -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(CameraConfig {
        defocus_angle: 0.6,
        ..wide_camera(20, 20)
    });

    let ground = checker(&mut scene);
    scene.add(Shape::sphere(Vec3::new(0.0, -1000.0, 0.0), 1000.0), ground);

    for a in -11..11 {
        for b in -11..11 {
            let choose_mat: f64 = rng.random();
            let center = Vec3::new(
                f64::from(a) + 0.9 * rng.random::<f64>(),
                0.2,
                f64::from(b) + 0.9 * rng.random::<f64>(),
            );
            if (center - Vec3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            if choose_mat < 0.8 {
                let albedo = random_color(rng, 0.0, 1.0) * random_color(rng, 0.0, 1.0);
                let material = scene.lambertian(albedo);
                let to = center + Vec3::new(0.0, rng.random_range(0.0..0.5), 0.0);
                scene.add(Shape::moving_sphere(center, to, 0.2), material);
            } else if choose_mat < 0.95 {
                let albedo = random_color(rng, 0.5, 1.0);
                let fuzz = rng.random_range(0.0..0.5);
                let material = scene.add_material(Material::Metal { albedo, fuzz });
                scene.add(Shape::sphere(center, 0.2), material);
            } else {
                let material = scene.add_material(Material::Dielectric {
                    refraction_index: 1.5,
                });
                scene.add(Shape::sphere(center, 0.2), material);
            }
        }
    }

    let glass = scene.add_material(Material::Dielectric {
        refraction_index: 1.5,
    });
    scene.add(Shape::sphere(Vec3::new(0.0, 1.0, 0.0), 1.0), glass);

    let brown = scene.lambertian(Vec3::new(0.4, 0.2, 0.1));
    scene.add(Shape::sphere(Vec3::new(-4.0, 1.0, 0.0), 1.0), brown);

    let metal = scene.add_material(Material::Metal {
        albedo: Vec3::new(0.7, 0.6, 0.5),
        fuzz: 0.0,
    });
    scene.add(Shape::sphere(Vec3::new(4.0, 1.0, 0.0), 1.0), metal);

    scene
}

fn checkered_spheres() -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(wide_camera(100, 50));
    let material = checker(&mut scene);
    scene.add(Shape::sphere(Vec3::new(0.0, -10.0, 0.0), 10.0), material);
    scene.add(Shape::sphere(Vec3::new(0.0, 10.0, 0.0), 10.0), material);
    scene
}

fn earth() -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(CameraConfig {
        lookfrom: Vec3::new(0.0, 0.0, 12.0),
        ..wide_camera(100, 50)
    });
    let texture = scene.add_texture(Texture::Image {
        file_name: EARTH_TEXTURE.to_string(),
    });
    let surface = scene.add_material(Material::Lambertian { albedo: texture });
    scene.add(Shape::sphere(Vec3::ZERO, 2.0), surface);
    scene
}

fn perlin_spheres() -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(wide_camera(100, 50));
    let noise = scene.add_texture(Texture::Noise { scale: 4.0 });
    let material = scene.add_material(Material::Lambertian { albedo: noise });
    scene.add(Shape::sphere(Vec3::new(0.0, -1000.0, 0.0), 1000.0), material);
    scene.add(Shape::sphere(Vec3::new(0.0, 2.0, 0.0), 2.0), material);
    scene
}

fn quads() -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(CameraConfig {
        aspect_ratio: 1.0,
        image_width: 400,
        samples_per_pixel: 100,
        max_depth: 50,
        background: SKY,
        vfov: 80.0,
        lookfrom: Vec3::new(0.0, 0.0, 9.0),
        lookat: Vec3::ZERO,
        vup: Vec3::Y,
        defocus_angle: 0.0,
        focus_dist: 10.0,
    });

    let left_red = scene.lambertian(Vec3::new(1.0, 0.2, 0.2));
    let back_green = scene.lambertian(Vec3::new(0.2, 1.0, 0.2));
    let right_blue = scene.lambertian(Vec3::new(0.2, 0.2, 1.0));
    let upper_orange = scene.lambertian(Vec3::new(1.0, 0.5, 0.0));
    let lower_teal = scene.lambertian(Vec3::new(0.2, 0.8, 0.8));

    let quad = |q: [f64; 3], u: [f64; 3], v: [f64; 3]| {
        Shape::quad(Vec3::from(q), Vec3::from(u), Vec3::from(v))
    };
    scene.add(quad([-3.0, -2.0, 5.0], [0.0, 0.0, -4.0], [0.0, 4.0, 0.0]), left_red);
    scene.add(quad([-2.0, -2.0, 0.0], [4.0, 0.0, 0.0], [0.0, 4.0, 0.0]), back_green);
    scene.add(quad([3.0, -2.0, 1.0], [0.0, 0.0, 4.0], [0.0, 4.0, 0.0]), right_blue);
    scene.add(quad([-2.0, 3.0, 1.0], [4.0, 0.0, 0.0], [0.0, 0.0, 4.0]), upper_orange);
    scene.add(quad([-2.0, -3.0, 5.0], [4.0, 0.0, 0.0], [0.0, 0.0, -4.0]), lower_teal);

    scene
}

fn simple_light() -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(CameraConfig {
        background: Vec3::ZERO,
        lookfrom: Vec3::new(26.0, 3.0, 6.0),
        lookat: Vec3::new(0.0, 2.0, 0.0),
        ..wide_camera(100, 50)
    });

    let noise = scene.add_texture(Texture::Noise { scale: 4.0 });
    let marble = scene.add_material(Material::Lambertian { albedo: noise });
    scene.add(Shape::sphere(Vec3::new(0.0, -1000.0, 0.0), 1000.0), marble);
    scene.add(Shape::sphere(Vec3::new(0.0, 2.0, 0.0), 2.0), marble);

    let light = scene.diffuse_light(Vec3::splat(4.0));
    scene.add(Shape::sphere(Vec3::new(0.0, 7.0, 0.0), 2.0), light);
    scene.add(
        Shape::quad(
            Vec3::new(3.0, 1.0, -2.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ),
        light,
    );

    scene
}

fn cornell_box() -> SceneDescriptor {
    let mut scene = SceneDescriptor::new(CameraConfig {
        aspect_ratio: 1.0,
        image_width: 600,
        samples_per_pixel: 200,
        max_depth: 50,
        background: Vec3::ZERO,
        vfov: 40.0,
        lookfrom: Vec3::new(278.0, 278.0, -800.0),
        lookat: Vec3::new(278.0, 278.0, 0.0),
        vup: Vec3::Y,
        defocus_angle: 0.0,
        focus_dist: 10.0,
    });

    let red = scene.lambertian(Vec3::new(0.65, 0.05, 0.05));
    let white = scene.lambertian(Vec3::new(0.73, 0.73, 0.73));
    let green = scene.lambertian(Vec3::new(0.12, 0.45, 0.15));
    let light = scene.diffuse_light(Vec3::splat(15.0));

    let quad = |q: [f64; 3], u: [f64; 3], v: [f64; 3]| {
        Shape::quad(Vec3::from(q), Vec3::from(u), Vec3::from(v))
    };
    scene.add(quad([555.0, 0.0, 0.0], [0.0, 555.0, 0.0], [0.0, 0.0, 555.0]), green);
    scene.add(quad([0.0, 0.0, 0.0], [0.0, 555.0, 0.0], [0.0, 0.0, 555.0]), red);
    scene.add(quad([343.0, 554.0, 332.0], [-130.0, 0.0, 0.0], [0.0, 0.0, -105.0]), light);
    scene.add(quad([0.0, 0.0, 0.0], [555.0, 0.0, 0.0], [0.0, 0.0, 555.0]), white);
    scene.add(quad([555.0, 555.0, 555.0], [-555.0, 0.0, 0.0], [0.0, 0.0, -555.0]), white);
    scene.add(quad([0.0, 0.0, 555.0], [555.0, 0.0, 0.0], [0.0, 555.0, 0.0]), white);

    scene
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn every_preset_is_renderable() {
        let mut rng = StdRng::seed_from_u64(7);
        for preset in PresetName::ALL {
            let scene = build_preset(preset, &mut rng);
            assert!(!scene.primitives.is_empty(), "{preset} has no primitives");
            assert!(scene.camera.samples_per_pixel > 0, "{preset}");
            assert!(scene.camera.image_width > 0, "{preset}");
            assert!(scene.check_references().is_ok(), "{preset}");
        }
    }

    #[test]
    fn cornell_box_has_six_walls_and_square_camera() {
        let scene = cornell_box();
        assert_eq!(scene.quad_count(), 6);
        assert_eq!(scene.camera.image_width, 600);
        assert_eq!(scene.camera.image_height(), 600);
    }

    #[test]
    fn bouncing_spheres_keeps_clear_of_the_metal_sphere() {
        let mut rng = StdRng::seed_from_u64(42);
        let scene = bouncing_spheres(&mut rng);
        let anchor = Vec3::new(4.0, 0.2, 0.0);
        let small = scene.primitives.iter().filter_map(|p| match p.shape {
            Shape::Sphere { center, radius, .. } if radius == 0.2 => Some(center),
            _ => None,
        });
        for center in small {
            assert!((center - anchor).length() > 0.9);
        }
        assert!((scene.camera.defocus_angle - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn earth_uses_image_texture() {
        let scene = earth();
        assert!(scene
            .textures
            .iter()
            .any(|t| matches!(t, Texture::Image { file_name } if file_name == EARTH_TEXTURE)));
    }
}
