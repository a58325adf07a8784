#[cfg(not(target_family = "wasm"))]
use bevy::{asset::AssetEvent, ecs::message::MessageReader};
use bevy::{prelude::*, window::PrimaryWindow};
#[cfg(not(target_family = "wasm"))]
use bevy_common_assets::toml::TomlAssetPlugin;

#[cfg(not(target_family = "wasm"))]
use super::ConfigHandle;
#[cfg(not(target_family = "wasm"))]
use super::PortfolioConfig;
use super::ConfigLoaded;

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
  fn build(&self, app: &mut App) {
    // Native: asset-based config with hot-reload
    #[cfg(not(target_family = "wasm"))]
    app
      .add_plugins(TomlAssetPlugin::<PortfolioConfig>::new(&["config.toml"]))
      .add_systems(PreStartup, watch_config_file)
      .add_systems(Update, watch_config_changes);

    app.add_systems(
      Update,
      (
        update_window_on_config_change,
        update_clear_color_on_config_change,
      ),
    );
  }
}

/// Native: starts watching the config asset for hot reload. The initial
/// `ConfigLoaded` comes from the parse in `main`.
#[cfg(not(target_family = "wasm"))]
fn watch_config_file(mut commands: Commands, asset_server: Res<AssetServer>) {
  let handle: Handle<PortfolioConfig> = asset_server.load("config/portfolio.config.toml");
  commands.insert_resource(ConfigHandle(handle));
}

#[cfg(not(target_family = "wasm"))]
fn watch_config_changes(
  mut commands: Commands,
  config_handle: Res<ConfigHandle>,
  mut messages: MessageReader<AssetEvent<PortfolioConfig>>,
  configs: Res<Assets<PortfolioConfig>>,
) {
  for event in messages.read() {
    if let AssetEvent::Modified { id } = event
      && config_handle.0.id() == *id
      && let Some(config) = configs.get(&config_handle.0)
    {
      info!("Config reloaded!");
      commands.insert_resource(ConfigLoaded::from(config.clone()));
    }
  }
}

fn update_window_on_config_change(
  config: Res<ConfigLoaded>,
  mut windows: Query<&mut Window, With<PrimaryWindow>>,
) {
  if config.is_changed()
    && let Ok(mut window) = windows.single_mut()
  {
    window
      .resolution
      .set(config.window.width as f32, config.window.height as f32);
    window.title.clone_from(&config.window.title);
  }
}

fn update_clear_color_on_config_change(config: Res<ConfigLoaded>, mut clear: ResMut<ClearColor>) {
  if config.is_changed() {
    clear.0 = config.page.background;
  }
}
