//! Page layout: hosts for each configured effect and their plain content.
//!
//! Each effect gets a host entity placed at its configured window position
//! with the plain content (text or sprite) as a child. The effect plugin
//! hides the plain content while it renders and shows it otherwise.

use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowResized};
use bevy_pixel_distort::{
  DistortEffect, DistortMessage, EffectBounds, MountDistortEffect, UnmountDistortEffect,
};

use crate::config::{ConfigLoaded, EffectConfig};

pub struct PagePlugin;

impl Plugin for PagePlugin {
  fn build(&self, app: &mut App) {
    app.add_systems(Startup, spawn_camera).add_systems(
      Update,
      (
        sync_effects.run_if(resource_changed::<ConfigLoaded>),
        layout_hosts,
        log_effect_messages,
      )
        .chain(),
    );
  }
}

/// Host of one configured effect.
#[derive(Component, Debug, Clone)]
pub struct PageEffect {
  pub name: String,
  pub config: EffectConfig,
}

fn spawn_camera(mut commands: Commands) {
  commands.spawn((Name::new("Camera"), Camera2d));
}

fn window_size(windows: &Query<&Window, With<PrimaryWindow>>) -> Vec2 {
  windows.single().map_or(Vec2::ZERO, |w| w.size())
}

/// Spawns the plain content for an effect under its host.
fn spawn_plain(
  commands: &mut Commands,
  asset_server: Option<&AssetServer>,
  host: Entity,
  config: &EffectConfig,
) -> Entity {
  let effect = &config.effect;
  let mut plain = commands.spawn((
    Name::new(format!("{} (plain)", config.name)),
    Transform::default(),
    Visibility::Inherited,
    ChildOf(host),
  ));

  if let Some(text) = &effect.text {
    let c = effect.text_color;
    plain.insert((
      Text2d::new(text.clone()),
      TextFont {
        font_size: effect.font_size,
        ..default()
      },
      TextColor(Color::srgba_u8(c.red, c.green, c.blue, c.alpha)),
    ));
  } else if let (Some(path), Some(server)) = (&effect.image_src, asset_server) {
    plain.insert(Sprite {
      image: server.load(path.clone()),
      custom_size: Some(Vec2::from(config.size)),
      ..default()
    });
  }
  plain.id()
}

/// Mounts new effects, pushes changed options to existing ones and unmounts
/// effects removed from the config.
fn sync_effects(
  mut commands: Commands,
  config: Res<ConfigLoaded>,
  windows: Query<&Window, With<PrimaryWindow>>,
  asset_server: Option<Res<AssetServer>>,
  mut hosts: Query<(Entity, &mut PageEffect, Option<&mut DistortEffect>)>,
) {
  let window = window_size(&windows);

  for (entity, mut page_effect, effect) in &mut hosts {
    let Some(wanted) = config.effects.iter().find(|e| e.name == page_effect.name) else {
      info!("Removing effect {:?}", page_effect.name);
      commands.queue(UnmountDistortEffect::new(entity));
      commands.entity(entity).despawn();
      continue;
    };

    if page_effect.config != *wanted {
      page_effect.config = wanted.clone();
      if let Some(mut effect) = effect {
        effect.set_if_neq(wanted.effect.clone());
      }
    }
  }

  for wanted in &config.effects {
    if hosts.iter().any(|(_, e, _)| e.name == wanted.name) {
      continue;
    }

    let (min, size) = wanted.rect_in(window);
    let host = commands
      .spawn((
        Name::new(wanted.name.clone()),
        PageEffect {
          name: wanted.name.clone(),
          config: wanted.clone(),
        },
        Transform::from_translation(host_translation(min, size, window)),
        Visibility::default(),
      ))
      .id();
    let plain = spawn_plain(&mut commands, asset_server.as_deref(), host, wanted);

    info!("Mounting effect {:?}", wanted.name);
    commands.queue(
      MountDistortEffect::new(host, wanted.effect.clone(), EffectBounds::new(min, size))
        .with_plain(plain),
    );
  }
}

/// World position of a host centered on a window rect, for a 2D camera at
/// the origin.
fn host_translation(min: Vec2, size: Vec2, window: Vec2) -> Vec3 {
  let center = min + size / 2.0;
  Vec3::new(center.x - window.x / 2.0, window.y / 2.0 - center.y, 0.0)
}

/// Keeps host transforms and effect bounds in sync with the window size.
fn layout_hosts(
  mut resized: MessageReader<WindowResized>,
  windows: Query<&Window, With<PrimaryWindow>>,
  mut hosts: Query<(Ref<PageEffect>, &mut Transform, Option<&mut EffectBounds>)>,
) {
  let window_resized = resized.read().count() > 0;
  let window = window_size(&windows);

  for (page_effect, mut transform, bounds) in &mut hosts {
    if !window_resized && !page_effect.is_changed() {
      continue;
    }
    let (min, size) = page_effect.config.rect_in(window);
    transform.translation = host_translation(min, size, window);
    if let Some(mut bounds) = bounds {
      bounds.set_if_neq(EffectBounds::new(min, size));
    }
  }
}

fn log_effect_messages(mut messages: MessageReader<DistortMessage>) {
  for message in messages.read() {
    match message {
      DistortMessage::TextureFailed { host, error } => {
        warn!("Effect on {host:?} showing plain content: {error}")
      }
      other => debug!("{other:?}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use bevy::time::TimeUpdateStrategy;
  use bevy_pixel_distort::{EffectPhase, EffectSession, PixelDistortPlugin};

  use super::*;
  use crate::config::{PageConfig, WindowConfig};

  fn effect(name: &str, text: &str) -> EffectConfig {
    EffectConfig {
      name: name.into(),
      center: [0.5, 0.5],
      size: [400.0, 100.0],
      effect: DistortEffect::text(text),
    }
  }

  fn create_app(effects: Vec<EffectConfig>) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(bevy::asset::AssetPlugin::default());
    app.add_plugins(bevy::image::ImagePlugin::default());
    app.add_plugins(PixelDistortPlugin);
    app.add_plugins(PagePlugin);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(16)));

    let mut window = Window::default();
    window.resolution.set(1280.0, 720.0);
    app.world_mut().spawn((window, PrimaryWindow));

    app.insert_resource(ConfigLoaded {
      window: WindowConfig {
        width: 1280,
        height: 720,
        title: "test".into(),
      },
      page: PageConfig {
        background: Color::BLACK,
      },
      effects,
    });
    app
  }

  fn sessions(app: &mut App) -> Vec<(String, EffectPhase)> {
    let mut query = app.world_mut().query::<(&PageEffect, &EffectSession)>();
    query
      .iter(app.world())
      .map(|(p, s)| (p.name.clone(), s.phase()))
      .collect()
  }

  #[test]
  fn configured_effects_are_mounted_and_rendered() {
    let mut app = create_app(vec![effect("a", "Alpha"), effect("b", "Beta")]);
    for _ in 0..3 {
      app.update();
    }

    let mut mounted = sessions(&mut app);
    mounted.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
      mounted,
      vec![
        ("a".to_string(), EffectPhase::Rendering),
        ("b".to_string(), EffectPhase::Rendering),
      ]
    );

    let mut bounds = app.world_mut().query::<&EffectBounds>();
    let bounds = bounds.iter(app.world()).next().unwrap();
    assert_eq!(bounds.rect.min, Vec2::new(440.0, 310.0));
  }

  #[test]
  fn config_reload_unmounts_removed_effects() {
    let mut app = create_app(vec![effect("a", "Alpha"), effect("b", "Beta")]);
    for _ in 0..3 {
      app.update();
    }

    app.world_mut().resource_mut::<ConfigLoaded>().effects = vec![effect("b", "Beta")];
    for _ in 0..2 {
      app.update();
    }

    assert_eq!(
      sessions(&mut app),
      vec![("b".to_string(), EffectPhase::Rendering)]
    );
  }

  #[test]
  fn option_change_reaches_mounted_effect() {
    let mut app = create_app(vec![effect("a", "Alpha")]);
    for _ in 0..3 {
      app.update();
    }

    let mut changed = effect("a", "Alpha");
    changed.effect.grid_size = 20;
    app.world_mut().resource_mut::<ConfigLoaded>().effects = vec![changed];
    // Past the resize debounce.
    for _ in 0..10 {
      app.update();
    }

    let mut query = app.world_mut().query::<&EffectSession>();
    let session = query.single(app.world()).unwrap();
    assert_eq!(session.field().unwrap().size(), 20);
  }
}
