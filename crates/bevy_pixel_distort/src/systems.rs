//! Per-frame systems: input, lifecycle, field update and GPU upload.
//!
//! Systems run in [`DistortSet`] order every update, so the field update of a
//! frame always lands before Bevy extracts and draws it. Every system skips
//! sessions that are destroyed or not in a phase it owns.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::sprite_render::MeshMaterial2d;
use bevy::window::{CursorLeft, CursorMoved, PrimaryWindow, WindowResized};

use crate::config::{DistortEffect, EffectSource};
use crate::error::DistortError;
use crate::field::{DisplacementField, FieldParams};
use crate::render::{
  DistortMaterial, DistortUniforms, create_effect_quad, create_field_texture, source_image,
  upload_field,
};
use crate::session::{EffectBounds, EffectCanvas, EffectPhase, EffectSession, PlainContent};
use crate::texture::{ImageStatus, poll_image, text_surface};

/// Ordering of the effect systems within `Update`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum DistortSet {
  /// Pointer, resize and viewport notifications.
  Input,
  /// Session initialization, texture loading and debounced rebuilds.
  Lifecycle,
  /// Field update.
  Simulate,
  /// Field and uniform upload.
  Upload,
}

/// Notifications about session lifecycle, one per host entity.
#[derive(Message, Debug, Clone, PartialEq)]
pub enum DistortMessage {
  SceneReady { host: Entity },
  TextureFailed { host: Entity, error: DistortError },
  Disabled { host: Entity },
  Disposed { host: Entity },
}

/// Present when the app renders; without it sessions still run the field
/// but skip mesh and material creation.
#[derive(Resource)]
pub struct RenderingEnabled;

type HostQuery<'w, 's> = Query<
  'w,
  's,
  (
    Entity,
    &'static mut EffectSession,
    &'static DistortEffect,
    &'static EffectBounds,
    Option<&'static PlainContent>,
  ),
>;

/// Asset stores a session acquires from. Each is optional so headless apps
/// and apps without a renderer degrade instead of failing to schedule.
#[derive(SystemParam)]
pub(crate) struct SceneAssets<'w> {
  images: Option<ResMut<'w, Assets<Image>>>,
  meshes: Option<ResMut<'w, Assets<Mesh>>>,
  materials: Option<ResMut<'w, Assets<DistortMaterial>>>,
  rendering: Option<Res<'w, RenderingEnabled>>,
}

impl SceneAssets<'_> {
  /// Creates the field, its texture, the canvas and (when rendering) the
  /// quad and material for a resolved source texture.
  fn build_scene(
    &mut self,
    commands: &mut Commands,
    host: Entity,
    session: &mut EffectSession,
    effect: &DistortEffect,
    source: Handle<Image>,
    scale_factor: f32,
    size: Vec2,
  ) -> Result<(), DistortError> {
    let images = self
      .images
      .as_deref_mut()
      .ok_or(DistortError::NoGraphicsContext)?;

    let field = DisplacementField::new(effect.clamped_grid_size());
    let field_texture = create_field_texture(images, &field);

    let canvas = commands
      .spawn((
        Name::new("EffectCanvas"),
        EffectCanvas { host },
        Transform::from_xyz(0.0, 0.0, 0.1),
        Visibility::default(),
        ChildOf(host),
      ))
      .id();

    if self.rendering.is_some()
      && let (Some(meshes), Some(materials)) =
        (self.meshes.as_deref_mut(), self.materials.as_deref_mut())
    {
      let mesh = meshes.add(create_effect_quad(size));
      let material = materials.add(DistortMaterial {
        source_texture: source.clone(),
        field_texture: field_texture.clone(),
        uniforms: DistortUniforms {
          resolution: size * scale_factor,
          ..default()
        },
      });
      commands
        .entity(canvas)
        .insert((Mesh2d(mesh.clone()), MeshMaterial2d(material.clone())));
      session.resources.mesh = Some(mesh);
      session.resources.material = Some(material);
    }

    session.field = Some(field);
    session.resources.field_texture = Some(field_texture);
    session.resources.source_texture = Some(source);
    session.resources.canvas = Some(canvas);
    session.built_size = size;
    session.built_scale_factor = scale_factor;
    session.set_phase(EffectPhase::SceneReady);
    Ok(())
  }

  fn release(&mut self, commands: &mut Commands, session: &mut EffectSession) {
    session.take_resources().release(
      commands,
      self.images.as_deref_mut(),
      self.meshes.as_deref_mut(),
      self.materials.as_deref_mut(),
    );
  }
}

fn primary_window<'a>(windows: &'a Query<&Window, With<PrimaryWindow>>) -> Option<&'a Window> {
  windows.single().ok()
}

fn scale_factor(windows: &Query<&Window, With<PrimaryWindow>>) -> f32 {
  primary_window(windows).map_or(1.0, |w| w.scale_factor())
}

fn set_plain_visible(
  plain: Option<&PlainContent>,
  visibility: &mut Query<&mut Visibility, Without<EffectSession>>,
  visible: bool,
) {
  let Some(PlainContent(entity)) = plain else {
    return;
  };
  if let Ok(mut v) = visibility.get_mut(*entity) {
    *v = if visible {
      Visibility::Inherited
    } else {
      Visibility::Hidden
    };
  }
}

/// Gives every host with options and bounds a session.
pub(crate) fn attach_sessions(
  mut commands: Commands,
  hosts: Query<(Entity, &DistortEffect), (With<EffectBounds>, Without<EffectSession>)>,
) {
  for (entity, effect) in &hosts {
    commands.entity(entity).insert(EffectSession::new(effect));
  }
}

/// Disables sessions below the mobile breakpoint and re-arms them above it.
pub(crate) fn check_viewport(
  mut commands: Commands,
  windows: Query<&Window, With<PrimaryWindow>>,
  mut sessions: HostQuery,
  mut visibility: Query<&mut Visibility, Without<EffectSession>>,
  mut assets: SceneAssets,
  mut messages: MessageWriter<DistortMessage>,
) {
  let Some(window) = primary_window(&windows) else {
    return;
  };
  let width = window.width();

  for (host, mut session, effect, _, plain) in &mut sessions {
    if session.is_destroyed() {
      continue;
    }

    let mobile = effect.is_mobile(width);
    match (mobile, session.phase()) {
      (true, EffectPhase::Disabled | EffectPhase::Disposed) => {}
      (true, _) => {
        assets.release(&mut commands, &mut session);
        session.set_phase(EffectPhase::Disabled);
        set_plain_visible(plain, &mut visibility, true);
        info!("Effect on {host:?} disabled below {}px", effect.mobile_breakpoint);
        messages.write(DistortMessage::Disabled { host });
      }
      (false, EffectPhase::Disabled) => session.restart(),
      _ => {}
    }
  }
}

/// Restarts the resize debounce on window resizes and host changes.
pub(crate) fn track_resize(
  mut resized: MessageReader<WindowResized>,
  mut sessions: Query<(&mut EffectSession, Ref<EffectBounds>, Ref<DistortEffect>)>,
) {
  let window_resized = resized.read().count() > 0;

  for (mut session, bounds, effect) in &mut sessions {
    if session.is_destroyed() {
      continue;
    }

    let options_changed = effect.is_changed() && !effect.is_added();
    if options_changed {
      session.apply_timings(&effect);
      if session.phase() == EffectPhase::Fallback {
        session.restart();
        continue;
      }
      // A load in flight for a source that is no longer wanted is dropped.
      if session.phase() == EffectPhase::LoadingTexture && effect.source().ok() != session.source {
        debug!("Source changed while loading, re-initializing");
        drop(session.take_resources());
        session.restart();
        continue;
      }
    }

    let bounds_changed = bounds.is_changed() && !bounds.is_added();
    if session.phase().is_live() && (window_resized || bounds_changed || options_changed) {
      session.request_rebuild();
    }
  }
}

/// Feeds pointer-moves inside each session's bounds into its pointer state.
pub(crate) fn track_pointer(
  mut moved: MessageReader<CursorMoved>,
  mut left: MessageReader<CursorLeft>,
  mut sessions: Query<(&mut EffectSession, &DistortEffect, &EffectBounds)>,
) {
  let positions: Vec<Vec2> = moved.read().map(|m| m.position).collect();
  let left_window = left.read().count() > 0;
  if positions.is_empty() && !left_window {
    return;
  }

  for (mut session, effect, bounds) in &mut sessions {
    if session.is_destroyed() || !session.phase().is_live() {
      continue;
    }
    for &position in &positions {
      if let Some(normalized) = bounds.normalize(position) {
        session.pointer_moved(normalized, effect.clamped_ease_factor());
      }
    }
    if left_window {
      session.pointer.settle();
    }
  }
}

/// Moves uninitialized sessions toward the scene: text resolves at once,
/// images start loading.
pub(crate) fn begin_sessions(
  mut commands: Commands,
  windows: Query<&Window, With<PrimaryWindow>>,
  asset_server: Option<Res<AssetServer>>,
  mut sessions: HostQuery,
  mut visibility: Query<&mut Visibility, Without<EffectSession>>,
  mut assets: SceneAssets,
  mut messages: MessageWriter<DistortMessage>,
) {
  let scale = scale_factor(&windows);

  for (host, mut session, effect, bounds, plain) in &mut sessions {
    if session.is_destroyed() || session.phase() != EffectPhase::Uninitialized {
      continue;
    }

    let result = effect.source().and_then(|source| {
      session.source = Some(source.clone());
      match source {
        EffectSource::Text(text) => {
          let images = assets
            .images
            .as_deref_mut()
            .ok_or(DistortError::NoGraphicsContext)?;
          let surface = text_surface(effect, &text, bounds.size(), scale)?;
          let texture = images.add(source_image(&surface));
          session.resources.owns_source = true;
          assets.build_scene(
            &mut commands,
            host,
            &mut session,
            effect,
            texture,
            scale,
            bounds.size(),
          )
        }
        EffectSource::Image(path) => {
          let server = asset_server
            .as_deref()
            .ok_or(DistortError::NoGraphicsContext)?;
          session.resources.pending_image = Some(server.load(path));
          session.set_phase(EffectPhase::LoadingTexture);
          Ok(())
        }
      }
    });

    match result {
      Ok(()) if session.phase() == EffectPhase::SceneReady => {
        set_plain_visible(plain, &mut visibility, false);
        messages.write(DistortMessage::SceneReady { host });
      }
      Ok(()) => {}
      Err(DistortError::NoGraphicsContext) => {
        debug!("No graphics context for effect on {host:?}, showing plain content");
        session.fail(DistortError::NoGraphicsContext);
        set_plain_visible(plain, &mut visibility, true);
      }
      Err(error) => {
        warn!("Effect on {host:?} failed to initialize: {error}");
        assets.release(&mut commands, &mut session);
        session.fail(error.clone());
        set_plain_visible(plain, &mut visibility, true);
        messages.write(DistortMessage::TextureFailed { host, error });
      }
    }
  }
}

/// Finishes sessions whose image resolved, or falls back when it failed.
pub(crate) fn poll_pending_textures(
  mut commands: Commands,
  windows: Query<&Window, With<PrimaryWindow>>,
  asset_server: Option<Res<AssetServer>>,
  mut sessions: HostQuery,
  mut visibility: Query<&mut Visibility, Without<EffectSession>>,
  mut assets: SceneAssets,
  mut messages: MessageWriter<DistortMessage>,
) {
  let Some(asset_server) = asset_server else {
    return;
  };
  let scale = scale_factor(&windows);

  for (host, mut session, effect, bounds, plain) in &mut sessions {
    if session.is_destroyed() || session.phase() != EffectPhase::LoadingTexture {
      continue;
    }
    let Some(handle) = session.resources.pending_image.clone() else {
      continue;
    };
    let Some(EffectSource::Image(path)) = session.source.clone() else {
      continue;
    };

    let status = match assets.images.as_deref() {
      Some(images) => poll_image(&asset_server, images, &handle, &path),
      None => ImageStatus::Failed(DistortError::NoGraphicsContext),
    };

    let result = match status {
      ImageStatus::Pending => continue,
      ImageStatus::Ready => {
        session.resources.pending_image = None;
        assets.build_scene(
          &mut commands,
          host,
          &mut session,
          effect,
          handle,
          scale,
          bounds.size(),
        )
      }
      ImageStatus::Failed(error) => Err(error),
    };

    match result {
      Ok(()) => {
        info!("Image {path} ready for effect on {host:?}");
        set_plain_visible(plain, &mut visibility, false);
        messages.write(DistortMessage::SceneReady { host });
      }
      Err(error) => {
        warn!("Effect on {host:?} falling back: {error}");
        assets.release(&mut commands, &mut session);
        session.fail(error.clone());
        set_plain_visible(plain, &mut visibility, true);
        messages.write(DistortMessage::TextureFailed { host, error });
      }
    }
  }
}

/// Applies debounced resizes and option changes to live sessions.
///
/// Geometry is rebuilt, the field returns to rest (recreated if the grid
/// size changed) and text textures are regenerated. A changed source kind
/// re-initializes the session instead.
pub(crate) fn apply_rebuilds(
  mut commands: Commands,
  time: Res<Time>,
  windows: Query<&Window, With<PrimaryWindow>>,
  mut sessions: HostQuery,
  mut assets: SceneAssets,
) {
  let scale = scale_factor(&windows);

  for (host, mut session, effect, bounds, _) in &mut sessions {
    if session.is_destroyed() || !session.phase().is_live() {
      continue;
    }
    if !session.tick_rebuild(time.delta()) {
      continue;
    }

    if effect.source().ok() != session.source {
      debug!("Source of effect on {host:?} changed, re-initializing");
      assets.release(&mut commands, &mut session);
      session.restart();
      continue;
    }

    let size = bounds.size();
    let session = &mut *session;

    if let (Some(meshes), Some(mesh)) = (assets.meshes.as_deref_mut(), &session.resources.mesh)
      && let Some(quad) = meshes.get_mut(mesh)
    {
      *quad = create_effect_quad(size);
    }

    let Some(images) = assets.images.as_deref_mut() else {
      continue;
    };

    let grid = effect.clamped_grid_size();
    match session.field.as_mut() {
      Some(field) if field.size() == grid => field.reset(),
      _ => {
        let field = DisplacementField::new(grid);
        if let Some(old) = session.resources.field_texture.take() {
          images.remove(&old);
        }
        session.resources.field_texture = Some(create_field_texture(images, &field));
        session.field = Some(field);
      }
    }
    session.pointer.reset();

    if let Some(EffectSource::Text(text)) = &session.source {
      // A failed regeneration keeps the previous texture on screen.
      match text_surface(effect, text, size, scale) {
        Ok(surface) => {
          let texture = images.add(source_image(&surface));
          if let Some(old) = session.resources.source_texture.replace(texture) {
            images.remove(&old);
          }
        }
        Err(error) => warn!("Keeping previous texture for effect on {host:?}: {error}"),
      }
    }

    if let (Some(materials), Some(material)) =
      (assets.materials.as_deref_mut(), &session.resources.material)
      && let Some(material) = materials.get_mut(material)
    {
      if let Some(source) = &session.resources.source_texture {
        material.source_texture = source.clone();
      }
      if let Some(field) = &session.resources.field_texture {
        material.field_texture = field.clone();
      }
      material.uniforms.resolution = size * scale;
    }

    session.built_size = size;
    session.built_scale_factor = scale;
    debug!("Rebuilt effect on {host:?} at {size} (grid {grid})");
  }
}

/// Runs one frame of every live session: clock, idle timer, field update.
pub(crate) fn advance_sessions(
  time: Res<Time>,
  mut sessions: Query<(&mut EffectSession, &DistortEffect, &EffectBounds)>,
) {
  for (mut session, effect, bounds) in &mut sessions {
    if session.is_destroyed() || !session.phase().is_live() {
      continue;
    }
    if session.phase() == EffectPhase::SceneReady {
      session.set_phase(EffectPhase::Rendering);
    }

    session.advance(time.delta());
    let params = FieldParams::from_effect(effect, bounds.size());
    let session = &mut *session;
    if let Some(field) = session.field.as_mut() {
      field.step(&mut session.pointer, &params);
    }
  }
}

/// Pushes each rendering session's field and uniforms to its assets.
pub(crate) fn upload_fields(
  sessions: Query<&EffectSession>,
  mut images: Option<ResMut<Assets<Image>>>,
  mut materials: Option<ResMut<Assets<DistortMaterial>>>,
) {
  for session in &sessions {
    if session.is_destroyed() || session.phase() != EffectPhase::Rendering {
      continue;
    }

    if let (Some(field), Some(handle)) = (session.field(), session.field_texture())
      && let Some(images) = images.as_deref_mut()
      && let Some(image) = images.get_mut(handle)
      && !upload_field(field, image)
    {
      warn!(
        "Field texture does not match a {0}x{0} field, skipping upload",
        field.size()
      );
    }

    if let (Some(materials), Some(handle)) =
      (materials.as_deref_mut(), &session.resources.material)
      && let Some(material) = materials.get_mut(handle)
    {
      material.uniforms.time = session.time();
      material.uniforms.resolution = session.built_size * session.built_scale_factor;
    }
  }
}
