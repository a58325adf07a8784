//! GPU texture creation and upload for the source image and the field.

use bevy::asset::RenderAssetUsages;
use bevy::image::ImageSampler;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};

use crate::field::DisplacementField;
use crate::primitives::RgbaSurface;

/// Builds a linear-sampled RGBA8 image from a rasterized surface.
pub fn source_image(surface: &RgbaSurface) -> Image {
  let size = Extent3d {
    width: surface.width(),
    height: surface.height(),
    depth_or_array_layers: 1,
  };

  let mut image = Image::new(
    size,
    TextureDimension::D2,
    surface.as_bytes().to_vec(),
    TextureFormat::Rgba8UnormSrgb,
    RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
  );
  image.sampler = ImageSampler::linear();
  image
}

/// Creates an N×N Rgba32Float texture holding the field at rest.
///
/// Nearest sampling keeps each cell a hard-edged block.
pub fn create_field_texture(images: &mut Assets<Image>, field: &DisplacementField) -> Handle<Image> {
  let size = Extent3d {
    width: field.size(),
    height: field.size(),
    depth_or_array_layers: 1,
  };

  let mut image = Image::new(
    size,
    TextureDimension::D2,
    field.as_bytes().to_vec(),
    TextureFormat::Rgba32Float,
    RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
  );
  image.sampler = ImageSampler::nearest();

  images.add(image)
}

/// Copies the field into its texture. Mutable access marks the asset changed,
/// so Bevy re-uploads it before the next draw.
///
/// Returns false, leaving the image untouched, when the image was not
/// created for a field of this size.
pub fn upload_field(field: &DisplacementField, image: &mut Image) -> bool {
  let bytes = field.as_bytes();
  match image.data {
    Some(ref mut data) if data.len() == bytes.len() => {
      data.copy_from_slice(bytes);
      true
    }
    _ => false,
  }
}

/// Creates a quad of the given size centered on the origin.
///
/// UV (0,0) is at the bottom-left so UV space matches the field's Y+ up rows.
pub fn create_effect_quad(size: Vec2) -> Mesh {
  let half = size / 2.0;
  Mesh::new(
    PrimitiveTopology::TriangleList,
    RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
  )
  .with_inserted_attribute(
    Mesh::ATTRIBUTE_POSITION,
    vec![
      [-half.x, -half.y, 0.0],
      [half.x, -half.y, 0.0],
      [half.x, half.y, 0.0],
      [-half.x, half.y, 0.0],
    ],
  )
  .with_inserted_attribute(
    Mesh::ATTRIBUTE_UV_0,
    vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
  )
  .with_inserted_indices(Indices::U32(vec![0, 1, 2, 0, 2, 3]))
}
