//! Scene descriptors handed to the rendering engine.
//!
//! A [`SceneDescriptor`] is an arena: textures, materials and primitives live
//! in flat vectors and refer to each other through [`TextureId`] and
//! [`MaterialId`] indices. A descriptor is built fresh for every job and owned
//! exclusively by it.

use serde::Serialize;

use crate::types::Vec3;

/// Index of a texture inside [`SceneDescriptor::textures`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TextureId(pub usize);

/// Index of a material inside [`SceneDescriptor::materials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MaterialId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Texture {
    Solid(Vec3),
    /// Alternating 3D checker pattern with cells of size `scale`.
    Checker {
        scale: f64,
        even: TextureId,
        odd: TextureId,
    },
    /// Turbulent marble-like Perlin noise.
    Noise { scale: f64 },
    /// Equirectangular image, resolved against the engine's asset directory.
    Image { file_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Lambertian { albedo: TextureId },
    Metal { albedo: Vec3, fuzz: f64 },
    Dielectric { refraction_index: f64 },
    DiffuseLight { emit: TextureId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A sphere; `motion` is the displacement of the centre over the
    /// shutter interval (zero for static spheres).
    Sphere {
        center: Vec3,
        motion: Vec3,
        radius: f64,
    },
    /// A parallelogram spanned by `u` and `v` from corner `q`.
    Quad { q: Vec3, u: Vec3, v: Vec3 },
}

impl Shape {
    pub fn sphere(center: Vec3, radius: f64) -> Self {
        Shape::Sphere {
            center,
            motion: Vec3::ZERO,
            radius,
        }
    }

    pub fn moving_sphere(from: Vec3, to: Vec3, radius: f64) -> Self {
        Shape::Sphere {
            center: from,
            motion: to - from,
            radius,
        }
    }

    pub fn quad(q: Vec3, u: Vec3, v: Vec3) -> Self {
        Shape::Quad { q, u, v }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub shape: Shape,
    pub material: MaterialId,
}

/// Camera projection and sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub aspect_ratio: f64,
    pub image_width: u32,
    pub samples_per_pixel: u32,
    pub max_depth: u32,
    pub background: Vec3,
    /// Vertical field of view in degrees.
    pub vfov: f64,
    pub lookfrom: Vec3,
    pub lookat: Vec3,
    pub vup: Vec3,
    /// Variation angle of rays through each pixel, in degrees.
    pub defocus_angle: f64,
    pub focus_dist: f64,
}

impl CameraConfig {
    /// Image height derived from width and aspect ratio (at least 1).
    pub fn image_height(&self) -> u32 {
        ((f64::from(self.image_width) / self.aspect_ratio) as u32).max(1)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: 1.0,
            image_width: 400,
            samples_per_pixel: 10,
            max_depth: 10,
            background: Vec3::ZERO,
            vfov: 20.0,
            lookfrom: Vec3::ZERO,
            lookat: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            defocus_angle: 0.0,
            focus_dist: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneDescriptor {
    pub textures: Vec<Texture>,
    pub materials: Vec<Material>,
    pub primitives: Vec<Primitive>,
    pub camera: CameraConfig,
}

impl SceneDescriptor {
    pub fn new(camera: CameraConfig) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    /// Shorthand for a lambertian material over a solid colour.
    pub fn lambertian(&mut self, albedo: Vec3) -> MaterialId {
        let texture = self.add_texture(Texture::Solid(albedo));
        self.add_material(Material::Lambertian { albedo: texture })
    }

    /// Shorthand for an emissive material of a solid colour.
    pub fn diffuse_light(&mut self, emit: Vec3) -> MaterialId {
        let texture = self.add_texture(Texture::Solid(emit));
        self.add_material(Material::DiffuseLight { emit: texture })
    }

    pub fn add(&mut self, shape: Shape, material: MaterialId) {
        self.primitives.push(Primitive { shape, material });
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn sphere_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|p| matches!(p.shape, Shape::Sphere { .. }))
            .count()
    }

    pub fn quad_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|p| matches!(p.shape, Shape::Quad { .. }))
            .count()
    }

    /// Check that every material and texture reference resolves inside the
    /// arena. Returns the first dangling reference as a message.
    pub fn check_references(&self) -> Result<(), String> {
        for (i, primitive) in self.primitives.iter().enumerate() {
            if self.material(primitive.material).is_none() {
                return Err(format!(
                    "primitive {i} references missing material {}",
                    primitive.material.0
                ));
            }
        }
        for (i, material) in self.materials.iter().enumerate() {
            let texture = match material {
                Material::Lambertian { albedo } => Some(*albedo),
                Material::DiffuseLight { emit } => Some(*emit),
                Material::Metal { .. } | Material::Dielectric { .. } => None,
            };
            if let Some(id) = texture {
                if self.texture(id).is_none() {
                    return Err(format!("material {i} references missing texture {}", id.0));
                }
            }
        }
        for (i, texture) in self.textures.iter().enumerate() {
            if let Texture::Checker { even, odd, .. } = texture {
                if self.texture(*even).is_none() || self.texture(*odd).is_none() {
                    return Err(format!("checker texture {i} references a missing texture"));
                }
            }
        }
        Ok(())
    }
}
