//! E2E test for a pointer sweep across a mounted effect.
//!
//! Sweeps the cursor across the bounds through window messages, lets the
//! idle timeout settle the pointer, then checks the field decays back to
//! near rest while the sentinel channels stay untouched.
//!
//! Run with:
//!   cargo test -p bevy_pixel_distort --test field_sweep_e2e

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy::window::{CursorMoved, PrimaryWindow};
use bevy_pixel_distort::{
  DistortEffect, EffectBounds, EffectPhase, EffectSession, FIELD_SENTINEL, MountDistortEffect,
  PixelDistortPlugin,
};

fn create_app() -> (App, Entity, Entity) {
  let mut app = App::new();
  app.add_plugins(MinimalPlugins);
  app.add_plugins(bevy::asset::AssetPlugin::default());
  app.add_plugins(bevy::image::ImagePlugin::default());
  app.add_plugins(PixelDistortPlugin);
  app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(16)));

  let mut window = Window::default();
  window.resolution.set(1280.0, 900.0);
  let window = app.world_mut().spawn((window, PrimaryWindow)).id();

  let host = app.world_mut().spawn(Transform::default()).id();
  let effect = DistortEffect::text("SWEEP")
    .with_grid_size(80)
    .with_intensity(0.05)
    .with_radius(0.25);
  app.world_mut().commands().queue(MountDistortEffect::new(
    host,
    effect,
    EffectBounds::new(Vec2::ZERO, Vec2::splat(800.0)),
  ));
  app.update();

  (app, window, host)
}

fn session(app: &App, host: Entity) -> &EffectSession {
  app.world().get::<EffectSession>(host).unwrap()
}

#[test]
fn sweep_decays_to_rest_after_pointer_settles() {
  let (mut app, window, host) = create_app();
  assert_eq!(session(&app, host).phase(), EffectPhase::Rendering);

  for step in 0..40 {
    let x = 80.0 + step as f32 * 16.0;
    app.world_mut().write_message(CursorMoved {
      window,
      position: Vec2::new(x, 400.0),
      delta: None,
    });
    app.update();
  }

  let peak = session(&app, host).field().unwrap().max_magnitude();
  assert!(peak > 0.0, "sweep should displace the field");

  // The idle timeout settles the pointer without another move.
  for _ in 0..20 {
    if session(&app, host).pointer().velocity == Vec2::ZERO {
      break;
    }
    app.update();
  }
  assert_eq!(session(&app, host).pointer().velocity, Vec2::ZERO);

  for _ in 0..50 {
    app.update();
  }

  let field = session(&app, host).field().unwrap();
  assert!(
    field.max_magnitude() < 1e-3,
    "field should be near rest, got {}",
    field.max_magnitude()
  );
  for y in 0..field.size() {
    for x in 0..field.size() {
      let cell = field.cell(x, y).unwrap();
      assert_eq!(cell[2], FIELD_SENTINEL);
      assert_eq!(cell[3], FIELD_SENTINEL);
    }
  }
}

#[test]
fn idle_frames_relax_geometrically() {
  let (mut app, window, host) = create_app();

  for x in [300.0, 400.0, 500.0] {
    app.world_mut().write_message(CursorMoved {
      window,
      position: Vec2::new(x, 400.0),
      delta: None,
    });
    app.update();
  }
  // Let the idle timeout settle the pointer.
  for _ in 0..10 {
    app.update();
  }

  let before = session(&app, host).field().unwrap().clone();
  app.update();
  let after = session(&app, host).field().unwrap();

  for y in 0..after.size() {
    for x in 0..after.size() {
      let expected = before.offset(x, y) * 0.9;
      let actual = after.offset(x, y);
      assert!((expected - actual).length() < 1e-6);
    }
  }
}
