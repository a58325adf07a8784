//! Per-effect session state.
//!
//! An [`EffectSession`] lives on the host entity next to its
//! [`DistortEffect`] options and [`EffectBounds`]. It owns everything the
//! effect acquires (field, textures, mesh, material, canvas entity, timers)
//! so a single release path can free it all on teardown, on mobile disable
//! and on option changes that need a full re-init.

use std::time::Duration;

use bevy::ecs::lifecycle::HookContext;
use bevy::ecs::world::DeferredWorld;
use bevy::prelude::*;

use crate::config::{DistortEffect, EffectSource};
use crate::error::DistortError;
use crate::field::DisplacementField;
use crate::pointer::PointerState;
use crate::render::DistortMaterial;

/// Lifecycle of one mounted effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectPhase {
  /// Mounted, nothing acquired yet.
  #[default]
  Uninitialized,
  /// Waiting for the image asset.
  LoadingTexture,
  /// Scene built, first frame not yet run.
  SceneReady,
  /// Running the per-frame loop.
  Rendering,
  /// Initialization failed; the plain content is shown.
  Fallback,
  /// Viewport below the mobile breakpoint; the plain content is shown.
  Disabled,
  /// Unmounted. Nothing may touch the session anymore.
  Disposed,
}

impl EffectPhase {
  /// Phases that run the per-frame field update.
  pub fn is_live(self) -> bool {
    matches!(self, Self::SceneReady | Self::Rendering)
  }
}

/// Host-supplied bounds of the effect in window coordinates (logical pixels,
/// top-left origin), like a DOM bounding rect.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct EffectBounds {
  pub rect: Rect,
}

impl EffectBounds {
  pub fn new(min: Vec2, size: Vec2) -> Self {
    Self {
      rect: Rect::from_corners(min, min + size),
    }
  }

  pub fn size(&self) -> Vec2 {
    self.rect.size()
  }

  /// Normalizes a window position into [0, 1]², or `None` outside the bounds.
  pub fn normalize(&self, position: Vec2) -> Option<Vec2> {
    let size = self.rect.size();
    if size.x <= 0.0 || size.y <= 0.0 || !self.rect.contains(position) {
      return None;
    }
    Some((position - self.rect.min) / size)
  }
}

/// The untouched source content shown whenever the effect is not rendering.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainContent(pub Entity);

/// Marker on the canvas entity a session appends under its host.
#[derive(Component, Debug, Clone, Copy)]
pub struct EffectCanvas {
  pub host: Entity,
}

/// Everything a session has acquired and must release.
#[derive(Default, Debug)]
pub(crate) struct SessionResources {
  pub source_texture: Option<Handle<Image>>,
  /// True when the source texture was created by the session (text mode)
  /// rather than loaded from a shared asset path.
  pub owns_source: bool,
  pub pending_image: Option<Handle<Image>>,
  pub field_texture: Option<Handle<Image>>,
  pub mesh: Option<Handle<Mesh>>,
  pub material: Option<Handle<DistortMaterial>>,
  pub canvas: Option<Entity>,
}

impl SessionResources {
  /// Releases through system parameters. Missing asset stores are skipped.
  pub fn release(
    self,
    commands: &mut Commands,
    images: Option<&mut Assets<Image>>,
    meshes: Option<&mut Assets<Mesh>>,
    materials: Option<&mut Assets<DistortMaterial>>,
  ) {
    if let Some(canvas) = self.canvas {
      commands.entity(canvas).try_despawn();
    }
    if let Some(images) = images {
      if let Some(field) = &self.field_texture {
        images.remove(field);
      }
      if self.owns_source
        && let Some(source) = &self.source_texture
      {
        images.remove(source);
      }
    }
    if let (Some(meshes), Some(mesh)) = (meshes, &self.mesh) {
      meshes.remove(mesh);
    }
    if let (Some(materials), Some(material)) = (materials, &self.material) {
      materials.remove(material);
    }
  }

  /// Releases with exclusive world access (used by commands).
  pub fn release_in_world(self, world: &mut World) {
    if let Some(canvas) = self.canvas
      && let Ok(entity) = world.get_entity_mut(canvas)
    {
      entity.despawn();
    }
    if let Some(mut images) = world.get_resource_mut::<Assets<Image>>() {
      if let Some(field) = &self.field_texture {
        images.remove(field);
      }
      if self.owns_source
        && let Some(source) = &self.source_texture
      {
        images.remove(source);
      }
    }
    if let (Some(mut meshes), Some(mesh)) = (world.get_resource_mut::<Assets<Mesh>>(), &self.mesh) {
      meshes.remove(mesh);
    }
    if let (Some(mut materials), Some(material)) = (
      world.get_resource_mut::<Assets<DistortMaterial>>(),
      &self.material,
    ) {
      materials.remove(material);
    }
  }
}

/// Runtime state of one mounted effect.
///
/// Removing the component (or despawning the host) releases whatever the
/// session still holds.
#[derive(Component, Debug)]
#[component(on_remove = EffectSession::on_remove)]
pub struct EffectSession {
  phase: EffectPhase,
  pub(crate) source: Option<EffectSource>,
  pub(crate) field: Option<DisplacementField>,
  pub(crate) pointer: PointerState,
  pub(crate) resources: SessionResources,
  /// Debounce for resize and option changes.
  resize_timer: Timer,
  rebuild_pending: bool,
  /// Fires when the pointer has not moved for the idle timeout.
  idle_timer: Timer,
  /// Seconds spent rendering.
  time: f32,
  frames: u64,
  /// Bounds size (logical px) and scale factor the scene was built for.
  pub(crate) built_size: Vec2,
  pub(crate) built_scale_factor: f32,
  last_error: Option<DistortError>,
  destroyed: bool,
}

impl EffectSession {
  pub fn new(effect: &DistortEffect) -> Self {
    let mut idle_timer = Timer::new(effect.idle_timeout(), TimerMode::Once);
    idle_timer.pause();
    Self {
      phase: EffectPhase::Uninitialized,
      source: None,
      field: None,
      pointer: PointerState::default(),
      resources: SessionResources::default(),
      resize_timer: Timer::new(effect.resize_debounce(), TimerMode::Once),
      rebuild_pending: false,
      idle_timer,
      time: 0.0,
      frames: 0,
      built_size: Vec2::ZERO,
      built_scale_factor: 1.0,
      last_error: None,
      destroyed: false,
    }
  }

  pub fn phase(&self) -> EffectPhase {
    self.phase
  }

  pub(crate) fn set_phase(&mut self, phase: EffectPhase) {
    if self.phase != phase {
      debug!("Effect session {:?} -> {:?}", self.phase, phase);
      self.phase = phase;
    }
  }

  pub fn field(&self) -> Option<&DisplacementField> {
    self.field.as_ref()
  }

  pub fn pointer(&self) -> &PointerState {
    &self.pointer
  }

  pub fn time(&self) -> f32 {
    self.time
  }

  /// Number of frames the loop has run.
  pub fn frames(&self) -> u64 {
    self.frames
  }

  pub fn canvas(&self) -> Option<Entity> {
    self.resources.canvas
  }

  pub fn source_texture(&self) -> Option<&Handle<Image>> {
    self.resources.source_texture.as_ref()
  }

  pub fn field_texture(&self) -> Option<&Handle<Image>> {
    self.resources.field_texture.as_ref()
  }

  pub fn last_error(&self) -> Option<&DistortError> {
    self.last_error.as_ref()
  }

  pub fn is_destroyed(&self) -> bool {
    self.destroyed
  }

  pub fn is_rebuild_pending(&self) -> bool {
    self.rebuild_pending
  }

  /// Records a failure and switches to the fallback phase.
  pub(crate) fn fail(&mut self, error: DistortError) {
    self.last_error = Some(error);
    self.set_phase(EffectPhase::Fallback);
  }

  /// Restarts the resize debounce.
  pub(crate) fn request_rebuild(&mut self) {
    self.rebuild_pending = true;
    self.resize_timer.reset();
  }

  /// Ticks the resize debounce. Returns true once when it fires.
  pub(crate) fn tick_rebuild(&mut self, delta: Duration) -> bool {
    if !self.rebuild_pending {
      return false;
    }
    self.resize_timer.tick(delta);
    if self.resize_timer.is_finished() {
      self.rebuild_pending = false;
      return true;
    }
    false
  }

  /// Applies a pointer-move and restarts the idle timer.
  pub(crate) fn pointer_moved(&mut self, position: Vec2, ease_factor: f32) {
    self.pointer.move_to(position, ease_factor);
    self.idle_timer.reset();
    self.idle_timer.unpause();
  }

  /// Advances the session clock and the idle timer by one frame.
  pub(crate) fn advance(&mut self, delta: Duration) {
    self.time += delta.as_secs_f32();
    self.frames += 1;
    self.idle_timer.tick(delta);
    if self.idle_timer.just_finished() {
      self.pointer.settle();
      self.idle_timer.pause();
    }
  }

  /// Takes the acquired resources, leaving the session empty.
  pub(crate) fn take_resources(&mut self) -> SessionResources {
    self.field = None;
    self.pointer.reset();
    self.idle_timer.pause();
    self.rebuild_pending = false;
    std::mem::take(&mut self.resources)
  }

  /// Marks the session dead. Systems skip destroyed sessions.
  pub(crate) fn destroy(&mut self) -> SessionResources {
    self.destroyed = true;
    self.set_phase(EffectPhase::Disposed);
    self.take_resources()
  }

  /// Forgets timing state before a re-init.
  pub(crate) fn restart(&mut self) {
    self.time = 0.0;
    self.frames = 0;
    self.last_error = None;
    self.source = None;
    self.set_phase(EffectPhase::Uninitialized);
  }

  fn on_remove(mut world: DeferredWorld, HookContext { entity, .. }: HookContext) {
    let Some(mut session) = world.get_mut::<EffectSession>(entity) else {
      return;
    };
    if session.is_destroyed() {
      return;
    }
    let resources = session.destroy();
    world
      .commands()
      .queue(move |world: &mut World| resources.release_in_world(world));
  }

  /// Applies new timing options.
  pub(crate) fn apply_timings(&mut self, effect: &DistortEffect) {
    self.resize_timer.set_duration(effect.resize_debounce());
    self.idle_timer.set_duration(effect.idle_timeout());
  }
}
