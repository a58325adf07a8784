mod config;
mod page;

use bevy::{
  prelude::*,
  window::{PresentMode, WindowResolution},
};
use bevy_pixel_distort::PixelDistortPlugin;

fn main() {
  // WASM: set up panic hook for better error messages
  #[cfg(target_family = "wasm")]
  console_error_panic_hook::set_once();

  // WASM: embed config at compile time (no filesystem access)
  #[cfg(target_family = "wasm")]
  let config_str = include_str!("../assets/config/portfolio.config.toml");
  #[cfg(not(target_family = "wasm"))]
  let config_str = std::fs::read_to_string("assets/config/portfolio.config.toml")
    .expect("Failed to read config file");

  let config: config::PortfolioConfig =
    toml::from_str(&config_str).expect("Failed to parse config");

  let mut app = App::new();

  app.insert_resource(ClearColor(config.page.background));
  app.insert_resource(config::ConfigLoaded::from(config.clone()));

  app
    .add_plugins(
      DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
          resolution: WindowResolution::new(config.window.width, config.window.height),
          title: config.window.title.clone(),
          present_mode: PresentMode::Fifo,
          // WASM: target canvas element and follow the page size
          #[cfg(target_family = "wasm")]
          canvas: Some("#bevy".to_string()),
          #[cfg(target_family = "wasm")]
          fit_canvas_to_parent: true,
          ..default()
        }),
        ..default()
      }),
    )
    // Must come after DefaultPlugins so the renderer is detected
    .add_plugins(PixelDistortPlugin)
    .add_plugins(config::ConfigPlugin)
    .add_plugins(page::PagePlugin);

  app.run();
}
