//! Per-effect options.
//!
//! [`DistortEffect`] is both the public configuration surface and the
//! component that mounts an effect on a host entity. It deserializes from
//! TOML with every field defaulted except the source.

use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Deserializer, de};

use crate::error::DistortError;
use crate::render::Rgba;

/// Smallest accepted field resolution.
pub const MIN_GRID_SIZE: u32 = 2;
/// Largest accepted field resolution. The per-frame scan is O(N²).
pub const MAX_GRID_SIZE: u32 = 80;
/// Per-frame decay applied to every field cell.
pub const DEFAULT_RELAXATION: f32 = 0.9;
/// Velocity magnitude (per axis) below which the pointer counts as idle.
pub const DEFAULT_IDLE_EPSILON: f32 = 0.001;

/// Where the effect gets its pixels from.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectSource {
  /// Rasterize this text.
  Text(String),
  /// Load this image through the asset server.
  Image(String),
}

/// Options for one mounted effect.
#[derive(Component, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DistortEffect {
  pub text: Option<String>,
  pub image_src: Option<String>,
  /// Path to a TTF/OTF file. `None` uses the embedded DejaVu Sans.
  pub font: Option<String>,
  /// Font size in logical pixels before fitting to the bounds.
  pub font_size: f32,
  /// CSS-style weight; 600 and above selects the bold face.
  pub font_weight: u16,
  #[serde(deserialize_with = "deserialize_hex_color")]
  pub text_color: Rgba,
  #[serde(deserialize_with = "deserialize_hex_color")]
  pub background_color: Rgba,
  /// Field resolution (cells per side).
  pub grid_size: u32,
  /// Displacement added per unit of pointer velocity.
  pub intensity: f32,
  /// Pointer influence radius as a fraction of the grid size.
  pub radius: f32,
  /// Pointer position smoothing in (0, 1]. 1 follows the pointer exactly.
  pub ease_factor: f32,
  /// Window width (logical px) below which the effect is disabled.
  pub mobile_breakpoint: f32,
  pub relaxation: f32,
  pub idle_epsilon: f32,
  pub resize_debounce_ms: u64,
  /// Time without pointer movement after which the pointer settles.
  pub idle_timeout_ms: u64,
}

impl Default for DistortEffect {
  fn default() -> Self {
    Self {
      text: None,
      image_src: None,
      font: None,
      font_size: 160.0,
      font_weight: 400,
      text_color: Rgba::new(255, 255, 255, 255),
      background_color: Rgba::new(0, 0, 0, 0),
      grid_size: 40,
      intensity: 0.05,
      radius: 0.2,
      ease_factor: 0.25,
      mobile_breakpoint: 768.0,
      relaxation: DEFAULT_RELAXATION,
      idle_epsilon: DEFAULT_IDLE_EPSILON,
      resize_debounce_ms: 100,
      idle_timeout_ms: 100,
    }
  }
}

impl DistortEffect {
  /// Effect that rasterizes `text`.
  pub fn text(text: impl Into<String>) -> Self {
    Self {
      text: Some(text.into()),
      ..default()
    }
  }

  /// Effect that distorts the image at `path` (relative to `assets/`).
  pub fn image(path: impl Into<String>) -> Self {
    Self {
      image_src: Some(path.into()),
      ..default()
    }
  }

  pub fn with_grid_size(mut self, grid_size: u32) -> Self {
    self.grid_size = grid_size;
    self
  }

  pub fn with_intensity(mut self, intensity: f32) -> Self {
    self.intensity = intensity;
    self
  }

  pub fn with_radius(mut self, radius: f32) -> Self {
    self.radius = radius;
    self
  }

  pub fn with_mobile_breakpoint(mut self, width: f32) -> Self {
    self.mobile_breakpoint = width;
    self
  }

  /// Resolves the configured source.
  pub fn source(&self) -> Result<EffectSource, DistortError> {
    match (&self.text, &self.image_src) {
      (Some(text), None) => Ok(EffectSource::Text(text.clone())),
      (None, Some(path)) => Ok(EffectSource::Image(path.clone())),
      (None, None) => Err(DistortError::MissingSource),
      (Some(_), Some(_)) => Err(DistortError::AmbiguousSource),
    }
  }

  /// Grid size clamped to [`MIN_GRID_SIZE`, `MAX_GRID_SIZE`].
  pub fn clamped_grid_size(&self) -> u32 {
    self.grid_size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE)
  }

  /// Relaxation factor clamped into [0.001, 0.999], inside the open
  /// interval (0, 1).
  pub fn clamped_relaxation(&self) -> f32 {
    self.relaxation.clamp(0.001, 0.999)
  }

  pub fn clamped_ease_factor(&self) -> f32 {
    self.ease_factor.clamp(0.01, 1.0)
  }

  pub fn is_bold(&self) -> bool {
    self.font_weight >= 600
  }

  pub fn resize_debounce(&self) -> Duration {
    Duration::from_millis(self.resize_debounce_ms)
  }

  pub fn idle_timeout(&self) -> Duration {
    Duration::from_millis(self.idle_timeout_ms)
  }

  /// Returns true if a window this wide should skip the effect.
  pub fn is_mobile(&self, window_width: f32) -> bool {
    window_width < self.mobile_breakpoint
  }
}

/// Parses `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(s: &str) -> Result<Rgba, String> {
  let s = s.trim_start_matches('#');
  if s.len() != 6 && s.len() != 8 {
    return Err(format!("hex color must be 6 or 8 characters, got {s:?}"));
  }
  let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string());
  let alpha = if s.len() == 8 { channel(6)? } else { 255 };
  Ok(Rgba::new(channel(0)?, channel(2)?, channel(4)?, alpha))
}

fn deserialize_hex_color<'de, D>(deserializer: D) -> Result<Rgba, D::Error>
where
  D: Deserializer<'de>,
{
  let s: String = Deserialize::deserialize(deserializer)?;
  parse_hex_color(&s).map_err(de::Error::custom)
}
