//! Surface scattering and emission.

use prism_core::scene::Material;
use prism_core::types::Vec3;
use rand::Rng;

use crate::geometry::{HitRecord, Ray};
use crate::texture::Textures;

/// Attenuation and outgoing ray of a scattered path.
pub struct Scatter {
    pub attenuation: Vec3,
    pub ray: Ray,
}

pub fn scatter<R: Rng + ?Sized>(
    material: &Material,
    textures: &Textures,
    ray: &Ray,
    hit: &HitRecord,
    rng: &mut R,
) -> Option<Scatter> {
    match *material {
        Material::Lambertian { albedo } => {
            let mut direction = hit.normal + random_unit_vector(rng);
            if near_zero(direction) {
                direction = hit.normal;
            }
            Some(Scatter {
                attenuation: textures.value(albedo, hit.u, hit.v, hit.point),
                ray: Ray::new(hit.point, direction, ray.time),
            })
        }
        Material::Metal { albedo, fuzz } => {
            let reflected = reflect(ray.direction, hit.normal).normalize_or_zero()
                + fuzz.clamp(0.0, 1.0) * random_unit_vector(rng);
            (reflected.dot(hit.normal) > 0.0).then(|| Scatter {
                attenuation: albedo,
                ray: Ray::new(hit.point, reflected, ray.time),
            })
        }
        Material::Dielectric { refraction_index } => {
            let ri = if hit.front_face {
                1.0 / refraction_index
            } else {
                refraction_index
            };
            let unit = ray.direction.normalize_or_zero();
            let cos_theta = (-unit).dot(hit.normal).min(1.0);
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

            let cannot_refract = ri * sin_theta > 1.0;
            let direction = if cannot_refract || reflectance(cos_theta, ri) > rng.random::<f64>() {
                reflect(unit, hit.normal)
            } else {
                refract(unit, hit.normal, ri)
            };
            Some(Scatter {
                attenuation: Vec3::ONE,
                ray: Ray::new(hit.point, direction, ray.time),
            })
        }
        Material::DiffuseLight { .. } => None,
    }
}

pub fn emitted(material: &Material, textures: &Textures, hit: &HitRecord) -> Vec3 {
    match *material {
        Material::DiffuseLight { emit } => textures.value(emit, hit.u, hit.v, hit.point),
        _ => Vec3::ZERO,
    }
}

fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

fn refract(uv: Vec3, n: Vec3, etai_over_etat: f64) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let perp = etai_over_etat * (uv + cos_theta * n);
    let parallel = -(1.0 - perp.length_squared()).abs().sqrt() * n;
    perp + parallel
}

/// Schlick's approximation.
fn reflectance(cosine: f64, refraction_index: f64) -> f64 {
    let r0 = ((1.0 - refraction_index) / (1.0 + refraction_index)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

fn near_zero(v: Vec3) -> bool {
    v.abs().max_element() < 1e-8
}

pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let p = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let len_sq = p.length_squared();
        if 1e-160 < len_sq && len_sq <= 1.0 {
            return p / len_sq.sqrt();
        }
    }
}

pub fn random_in_unit_disk<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let p = Vec3::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), 0.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}
