mod plugin;

use bevy::{asset::Asset, prelude::*, reflect::TypePath};
use bevy_pixel_distort::{DistortEffect, parse_hex_color};
pub use plugin::ConfigPlugin;
use serde::{Deserialize, Deserializer, de};

#[derive(Asset, TypePath, Deserialize, Debug, Clone)]
pub struct PortfolioConfig {
  pub window: WindowConfig,
  pub page: PageConfig,
  #[serde(default)]
  pub effects: Vec<EffectConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WindowConfig {
  pub width: u32,
  pub height: u32,
  pub title: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PageConfig {
  #[serde(deserialize_with = "deserialize_hex_color")]
  pub background: Color,
}

/// One effect on the page.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EffectConfig {
  /// Stable key used to match effects across reloads.
  pub name: String,
  /// Center of the effect as a fraction of the window size.
  pub center: [f32; 2],
  /// Size in logical pixels.
  pub size: [f32; 2],
  #[serde(flatten)]
  pub effect: DistortEffect,
}

impl EffectConfig {
  /// Top-left corner and size in window coordinates for a window this big.
  pub fn rect_in(&self, window: Vec2) -> (Vec2, Vec2) {
    let size = Vec2::from(self.size);
    let center = Vec2::from(self.center) * window;
    (center - size / 2.0, size)
  }
}

fn deserialize_hex_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
  D: Deserializer<'de>,
{
  let s: String = Deserialize::deserialize(deserializer)?;
  let c = parse_hex_color(&s).map_err(de::Error::custom)?;
  Ok(Color::srgba_u8(c.red, c.green, c.blue, c.alpha))
}

#[derive(Resource)]
pub struct ConfigHandle(pub Handle<PortfolioConfig>);

#[derive(Resource, Debug, Clone)]
pub struct ConfigLoaded {
  pub window: WindowConfig,
  pub page: PageConfig,
  pub effects: Vec<EffectConfig>,
}

impl From<PortfolioConfig> for ConfigLoaded {
  fn from(config: PortfolioConfig) -> Self {
    Self {
      window: config.window,
      page: config.page,
      effects: config.effects,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shipped_config_parses() {
    let config: PortfolioConfig =
      toml::from_str(include_str!("../../assets/config/portfolio.config.toml")).unwrap();
    assert_eq!(config.effects.len(), 2);
    let headline = &config.effects[0];
    assert_eq!(headline.name, "headline");
    assert_eq!(headline.effect.text.as_deref(), Some("JANE DOE"));
    assert!(headline.effect.is_bold());
    // Unset options keep their defaults.
    assert_eq!(headline.effect.mobile_breakpoint, 768.0);
  }

  #[test]
  fn rect_is_centered_on_window_fraction() {
    let config = EffectConfig {
      name: "a".into(),
      center: [0.5, 0.25],
      size: [200.0, 100.0],
      effect: DistortEffect::text("a"),
    };
    let (min, size) = config.rect_in(Vec2::new(1000.0, 800.0));
    assert_eq!(min, Vec2::new(400.0, 150.0));
    assert_eq!(size, Vec2::new(200.0, 100.0));
  }
}
