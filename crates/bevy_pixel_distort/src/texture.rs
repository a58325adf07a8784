//! Texture provider: rasterized text or a loaded image.
//!
//! Text resolves synchronously and can be regenerated at any time (resize,
//! option change) without touching the rest of the session. Images go through
//! the asset server and are polled until they load or fail.

use bevy::asset::LoadState;
use bevy::prelude::*;

use crate::config::DistortEffect;
use crate::error::DistortError;
use crate::primitives::RgbaSurface;
use crate::text::{CpuFont, TextStyle, rasterize_text};

/// Picks the face for the effect's font options.
pub fn font_for(effect: &DistortEffect) -> Result<CpuFont, DistortError> {
  match &effect.font {
    Some(path) => CpuFont::from_path(path),
    None if effect.is_bold() => Ok(CpuFont::bold()),
    None => Ok(CpuFont::regular()),
  }
}

/// Physical buffer size for bounds at a device pixel ratio.
pub fn buffer_size(bounds: Vec2, scale_factor: f32) -> UVec2 {
  let physical = (bounds * scale_factor.max(0.1)).ceil();
  UVec2::new(physical.x.max(1.0) as u32, physical.y.max(1.0) as u32)
}

/// Rasterizes `text` for bounds of `bounds` logical pixels.
pub fn text_surface(
  effect: &DistortEffect,
  text: &str,
  bounds: Vec2,
  scale_factor: f32,
) -> Result<RgbaSurface, DistortError> {
  let font = font_for(effect)?;
  let size = buffer_size(bounds, scale_factor);
  let style = TextStyle {
    font_size: effect.font_size * scale_factor,
    color: effect.text_color,
    background: effect.background_color,
    ..default()
  };
  rasterize_text(&font, text, &style, size.x, size.y)
}

/// Outcome of polling an image load.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageStatus {
  Pending,
  Ready,
  Failed(DistortError),
}

/// Checks whether an image handle finished loading.
pub fn poll_image(
  asset_server: &AssetServer,
  images: &Assets<Image>,
  handle: &Handle<Image>,
  path: &str,
) -> ImageStatus {
  if images.contains(handle.id()) {
    return ImageStatus::Ready;
  }
  match asset_server.get_load_state(handle.id()) {
    Some(LoadState::Failed(err)) => ImageStatus::Failed(DistortError::ImageLoad {
      path: path.to_string(),
      reason: err.to_string(),
    }),
    // Dropped or never started: the server will not produce it.
    None => ImageStatus::Failed(DistortError::ImageLoad {
      path: path.to_string(),
      reason: "asset is not tracked by the asset server".to_string(),
    }),
    _ => ImageStatus::Pending,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn buffer_size_follows_device_pixel_ratio() {
    assert_eq!(buffer_size(Vec2::new(100.0, 50.5), 2.0), UVec2::new(200, 101));
    assert_eq!(buffer_size(Vec2::ZERO, 1.0), UVec2::ONE);
  }

  #[test]
  fn regenerating_text_is_pixel_identical() {
    let effect = DistortEffect::text("Jane Doe");
    let a = text_surface(&effect, "Jane Doe", Vec2::new(300.0, 100.0), 1.5).unwrap();
    let b = text_surface(&effect, "Jane Doe", Vec2::new(300.0, 100.0), 1.5).unwrap();
    assert_eq!(a.width(), 450);
    assert_eq!(a.height(), 150);
    assert_eq!(a.as_bytes(), b.as_bytes());
  }

  #[test]
  fn missing_font_file_fails() {
    let effect = DistortEffect {
      font: Some("/nonexistent/face.otf".into()),
      ..DistortEffect::text("x")
    };
    assert!(matches!(
      text_surface(&effect, "x", Vec2::splat(64.0), 1.0),
      Err(DistortError::FontLoad { .. })
    ));
  }
}
