mod material;
mod textures;

pub use material::{DistortMaterial, DistortUniforms};
pub use textures::{
  create_effect_quad, create_field_texture, source_image, upload_field,
};

/// RGBA pixel with 8 bits per channel, using sRGB color space.
///
/// Re-exported from the `palette` crate for color handling.
pub type Rgba = palette::Srgba<u8>;

/// Creates an opaque RGB color (alpha = 255).
#[inline]
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgba {
  Rgba::new(r, g, b, 255)
}
