//! Texture sampling: solid colours, checkers, Perlin noise and image maps.

use std::path::Path;

use image::RgbImage;
use prism_core::scene::{Texture, TextureId};
use prism_core::types::Vec3;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::RenderError;

/// Colour returned by image textures whose file could not be loaded.
const MISSING_IMAGE_COLOR: Vec3 = Vec3::new(0.0, 1.0, 1.0);

#[derive(Debug)]
enum Sampler {
    Solid(Vec3),
    Checker {
        inv_scale: f64,
        even: usize,
        odd: usize,
    },
    Noise {
        scale: f64,
        perlin: Box<Perlin>,
    },
    Image(Option<RgbImage>),
}

/// Texture table resolved from a scene descriptor: images are decoded and
/// noise tables generated once per render.
#[derive(Debug)]
pub struct Textures {
    samplers: Vec<Sampler>,
}

impl Textures {
    /// Resolve `textures` against `asset_dir`.
    ///
    /// A checker may only reference textures declared before it, which rules
    /// out reference cycles.
    pub fn resolve<R: Rng + ?Sized>(
        textures: &[Texture],
        asset_dir: &Path,
        rng: &mut R,
    ) -> Result<Self, RenderError> {
        let mut samplers = Vec::with_capacity(textures.len());
        for (index, texture) in textures.iter().enumerate() {
            let sampler = match texture {
                Texture::Solid(color) => Sampler::Solid(*color),
                Texture::Checker { scale, even, odd } => {
                    if even.0 >= index || odd.0 >= index {
                        return Err(RenderError::InvalidScene(format!(
                            "checker texture {index} must reference earlier textures"
                        )));
                    }
                    Sampler::Checker {
                        inv_scale: 1.0 / scale,
                        even: even.0,
                        odd: odd.0,
                    }
                }
                Texture::Noise { scale } => Sampler::Noise {
                    scale: *scale,
                    perlin: Box::new(Perlin::new(rng)),
                },
                Texture::Image { file_name } => Sampler::Image(load_image(asset_dir, file_name)),
            };
            samplers.push(sampler);
        }
        Ok(Self { samplers })
    }

    pub fn value(&self, id: TextureId, u: f64, v: f64, p: Vec3) -> Vec3 {
        match self.samplers.get(id.0) {
            Some(Sampler::Solid(color)) => *color,
            Some(Sampler::Checker {
                inv_scale,
                even,
                odd,
            }) => {
                let cell = (inv_scale * p).floor();
                let sum = cell.x as i64 + cell.y as i64 + cell.z as i64;
                let next = if sum.rem_euclid(2) == 0 { *even } else { *odd };
                self.value(TextureId(next), u, v, p)
            }
            Some(Sampler::Noise { scale, perlin }) => {
                Vec3::splat(0.5) * (1.0 + (scale * p.z + 10.0 * perlin.turbulence(p, 7)).sin())
            }
            Some(Sampler::Image(Some(image))) => sample_image(image, u, v),
            Some(Sampler::Image(None)) => MISSING_IMAGE_COLOR,
            None => Vec3::ZERO,
        }
    }
}

fn load_image(asset_dir: &Path, file_name: &str) -> Option<RgbImage> {
    // Only the final component is honoured so scenes cannot escape the asset directory.
    let name = Path::new(file_name).file_name()?;
    let path = asset_dir.join(name);
    match image::open(&path) {
        Ok(image) => Some(image.to_rgb8()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Texture image unavailable, using fallback colour");
            None
        }
    }
}

fn sample_image(image: &RgbImage, u: f64, v: f64) -> Vec3 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return MISSING_IMAGE_COLOR;
    }
    let u = u.clamp(0.0, 1.0);
    let v = 1.0 - v.clamp(0.0, 1.0);
    let x = ((u * f64::from(width)) as u32).min(width - 1);
    let y = ((v * f64::from(height)) as u32).min(height - 1);
    let [r, g, b] = image.get_pixel(x, y).0;
    Vec3::new(f64::from(r), f64::from(g), f64::from(b)) / 255.0
}

// ---------------------------------------------------------------------------
// Perlin noise
// ---------------------------------------------------------------------------

const POINT_COUNT: usize = 256;

#[derive(Debug)]
struct Perlin {
    gradients: Vec<Vec3>,
    perm: [Vec<usize>; 3],
}

impl Perlin {
    fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let gradients = (0..POINT_COUNT)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                )
                .normalize_or_zero()
            })
            .collect();
        let mut permutation = || {
            let mut p: Vec<usize> = (0..POINT_COUNT).collect();
            p.shuffle(rng);
            p
        };
        let perm = [permutation(), permutation(), permutation()];
        Self { gradients, perm }
    }

    fn noise(&self, p: Vec3) -> f64 {
        let floor = p.floor();
        let frac = p - floor;
        let (i, j, k) = (floor.x as i64, floor.y as i64, floor.z as i64);

        let mut c = [[[Vec3::ZERO; 2]; 2]; 2];
        for (di, plane) in c.iter_mut().enumerate() {
            for (dj, row) in plane.iter_mut().enumerate() {
                for (dk, cell) in row.iter_mut().enumerate() {
                    let index = self.perm[0][wrap(i + di as i64)]
                        ^ self.perm[1][wrap(j + dj as i64)]
                        ^ self.perm[2][wrap(k + dk as i64)];
                    *cell = self.gradients[index];
                }
            }
        }

        let smooth = frac * frac * (Vec3::splat(3.0) - 2.0 * frac);
        let mut accum = 0.0;
        for (di, plane) in c.iter().enumerate() {
            for (dj, row) in plane.iter().enumerate() {
                for (dk, gradient) in row.iter().enumerate() {
                    let (fi, fj, fk) = (di as f64, dj as f64, dk as f64);
                    let weight = frac - Vec3::new(fi, fj, fk);
                    accum += (fi * smooth.x + (1.0 - fi) * (1.0 - smooth.x))
                        * (fj * smooth.y + (1.0 - fj) * (1.0 - smooth.y))
                        * (fk * smooth.z + (1.0 - fk) * (1.0 - smooth.z))
                        * gradient.dot(weight);
                }
            }
        }
        accum
    }

    fn turbulence(&self, p: Vec3, depth: u32) -> f64 {
        let mut accum = 0.0;
        let mut point = p;
        let mut weight = 1.0;
        for _ in 0..depth {
            accum += weight * self.noise(point);
            weight *= 0.5;
            point *= 2.0;
        }
        accum.abs()
    }
}

fn wrap(i: i64) -> usize {
    i.rem_euclid(POINT_COUNT as i64) as usize
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn resolve(textures: &[Texture]) -> Result<Textures, RenderError> {
        Textures::resolve(textures, Path::new("/nonexistent"), &mut StdRng::seed_from_u64(3))
    }

    #[test]
    fn checker_alternates_between_cells() {
        let textures = resolve(&[
            Texture::Solid(Vec3::ZERO),
            Texture::Solid(Vec3::ONE),
            Texture::Checker {
                scale: 1.0,
                even: TextureId(0),
                odd: TextureId(1),
            },
        ])
        .unwrap();
        let id = TextureId(2);
        assert_eq!(textures.value(id, 0.0, 0.0, Vec3::splat(0.5)), Vec3::ZERO);
        assert_eq!(textures.value(id, 0.0, 0.0, Vec3::new(1.5, 0.5, 0.5)), Vec3::ONE);
        assert_eq!(textures.value(id, 0.0, 0.0, Vec3::new(-0.5, 0.5, 0.5)), Vec3::ONE);
    }

    #[test]
    fn checker_forward_reference_is_rejected() {
        let err = resolve(&[Texture::Checker {
            scale: 1.0,
            even: TextureId(0),
            odd: TextureId(1),
        }])
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidScene(_)));
    }

    #[test]
    fn missing_image_uses_fallback_colour() {
        let textures = resolve(&[Texture::Image {
            file_name: "earthmap.jpg".into(),
        }])
        .unwrap();
        assert_eq!(textures.value(TextureId(0), 0.5, 0.5, Vec3::ZERO), MISSING_IMAGE_COLOR);
    }

    #[test]
    fn image_texture_samples_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        image.put_pixel(1, 0, image::Rgb([0, 0, 255]));
        image.save(dir.path().join("map.png")).unwrap();

        let textures = Textures::resolve(
            &[Texture::Image {
                file_name: "map.png".into(),
            }],
            dir.path(),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(textures.value(TextureId(0), 0.1, 0.5, Vec3::ZERO), Vec3::X);
        assert_eq!(textures.value(TextureId(0), 0.9, 0.5, Vec3::ZERO), Vec3::Z);
    }

    #[test]
    fn noise_stays_in_unit_range() {
        let textures = resolve(&[Texture::Noise { scale: 4.0 }]).unwrap();
        for i in 0..50 {
            let p = Vec3::new(i as f64 * 0.37, i as f64 * -0.11, i as f64 * 0.73);
            let c = textures.value(TextureId(0), 0.0, 0.0, p);
            assert!(c.x >= 0.0 && c.x <= 1.0);
        }
    }
}
