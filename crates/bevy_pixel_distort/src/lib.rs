//! Pixel Distort - pointer-driven pixel displacement effect for Bevy.
//!
//! Renders text or an image through a coarse grid of displacement cells.
//! Pointer motion pushes the cells, which relax back to rest every frame,
//! producing a blocky "pixel smear" trailing the pointer.
//!
//! Add [`PixelDistortPlugin`], then mount effects on host entities with
//! [`MountDistortEffect`] and tear them down with [`UnmountDistortEffect`].

use bevy::prelude::*;
use bevy::sprite_render::Material2dPlugin;
use bevy::window::{CursorLeft, CursorMoved, WindowResized};

pub mod commands;
pub mod config;
pub mod error;
pub mod field;
pub mod pointer;
pub mod primitives;
pub mod render;
pub mod session;
pub mod systems;
pub mod text;
pub mod texture;

pub use commands::{MountDistortEffect, UnmountDistortEffect};
pub use config::{
  DEFAULT_IDLE_EPSILON, DEFAULT_RELAXATION, DistortEffect, EffectSource, MAX_GRID_SIZE,
  MIN_GRID_SIZE, parse_hex_color,
};
pub use error::DistortError;
pub use field::{DisplacementField, FIELD_SENTINEL, FieldParams, FieldStep};
pub use pointer::PointerState;
pub use primitives::{RgbaSurface, Surface};
pub use render::{DistortMaterial, DistortUniforms, Rgba, rgb};
pub use session::{EffectBounds, EffectCanvas, EffectPhase, EffectSession, PlainContent};
pub use systems::{DistortMessage, DistortSet, RenderingEnabled};
pub use text::{CpuFont, TextStyle, rasterize_text};

/// Plugin running every mounted effect.
///
/// Without `RenderPlugin` (headless apps, tests) sessions still build and
/// update their fields but create no mesh or material.
pub struct PixelDistortPlugin;

impl Plugin for PixelDistortPlugin {
  fn build(&self, app: &mut App) {
    if app.is_plugin_added::<bevy::render::RenderPlugin>() {
      bevy::asset::embedded_asset!(app, "render/shaders/distort.wgsl");
      app.add_plugins(Material2dPlugin::<DistortMaterial>::default());
      app.insert_resource(RenderingEnabled);
    }

    // Window messages are registered by WindowPlugin; headless apps need
    // them too.
    app
      .add_message::<DistortMessage>()
      .add_message::<CursorMoved>()
      .add_message::<CursorLeft>()
      .add_message::<WindowResized>();

    app.configure_sets(
      Update,
      (
        DistortSet::Input,
        DistortSet::Lifecycle,
        DistortSet::Simulate,
        DistortSet::Upload,
      )
        .chain(),
    );

    app.add_systems(
      Update,
      (
        (
          systems::attach_sessions,
          systems::check_viewport,
          systems::track_resize,
          systems::track_pointer,
        )
          .chain()
          .in_set(DistortSet::Input),
        (
          systems::begin_sessions,
          systems::poll_pending_textures,
          systems::apply_rebuilds,
        )
          .chain()
          .in_set(DistortSet::Lifecycle),
        systems::advance_sessions.in_set(DistortSet::Simulate),
        systems::upload_fields.in_set(DistortSet::Upload),
      ),
    );
  }
}
