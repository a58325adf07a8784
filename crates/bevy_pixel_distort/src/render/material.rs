//! Material2d that samples the source through the displacement field.

use bevy::prelude::*;
use bevy::render::render_resource::{AsBindGroup, ShaderType};
use bevy::shader::ShaderRef;
use bevy::sprite_render::{AlphaMode2d, Material2d};

/// Per-frame shader parameters.
///
/// Field order matters for WGSL alignment - Vec2 fields first, then scalars.
#[derive(Clone, Copy, Debug, ShaderType)]
pub struct DistortUniforms {
  /// Effect bounds in physical pixels.
  pub resolution: Vec2,
  /// Seconds since the session entered the rendering phase.
  pub time: f32,
  /// Scale from field units to UV offset.
  pub offset_scale: f32,
}

impl Default for DistortUniforms {
  fn default() -> Self {
    Self {
      resolution: Vec2::ONE,
      time: 0.0,
      offset_scale: 0.02,
    }
  }
}

/// Material for the effect canvas quad.
#[derive(Asset, TypePath, AsBindGroup, Clone)]
pub struct DistortMaterial {
  /// Rasterized text or loaded photo (Rgba8UnormSrgb, linear sampled).
  #[texture(0)]
  #[sampler(1)]
  pub source_texture: Handle<Image>,

  /// Displacement field (Rgba32Float: x offset, y offset, sentinel,
  /// sentinel). Not filterable, so the sampler is nearest.
  #[texture(2, sample_type = "float", filterable = false)]
  #[sampler(3, sampler_type = "non_filtering")]
  pub field_texture: Handle<Image>,

  #[uniform(4)]
  pub uniforms: DistortUniforms,
}

impl Material2d for DistortMaterial {
  fn fragment_shader() -> ShaderRef {
    "embedded://bevy_pixel_distort/render/shaders/distort.wgsl".into()
  }

  fn alpha_mode(&self) -> AlphaMode2d {
    AlphaMode2d::Blend
  }
}
