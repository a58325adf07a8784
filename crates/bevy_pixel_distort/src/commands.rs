//! Mount and unmount commands for host entities.

use bevy::prelude::*;

use crate::config::DistortEffect;
use crate::session::{EffectBounds, EffectSession, PlainContent};
use crate::systems::DistortMessage;

/// Mounts an effect on an existing host entity.
///
/// The host keeps its own transform; the effect canvas is spawned as its
/// child once the source texture resolves. `plain` is the entity holding the
/// untouched content, hidden while the effect renders and shown otherwise.
///
/// # Example
/// ```ignore
/// fn setup(mut commands: Commands) {
///     let host = commands.spawn(Transform::default()).id();
///     commands.queue(MountDistortEffect::new(
///         host,
///         DistortEffect::text("Jane Doe"),
///         EffectBounds::new(Vec2::ZERO, Vec2::new(600.0, 200.0)),
///     ));
/// }
/// ```
pub struct MountDistortEffect {
  pub host: Entity,
  pub effect: DistortEffect,
  pub bounds: EffectBounds,
  pub plain: Option<Entity>,
}

impl MountDistortEffect {
  pub fn new(host: Entity, effect: DistortEffect, bounds: EffectBounds) -> Self {
    Self {
      host,
      effect,
      bounds,
      plain: None,
    }
  }

  /// Sets the plain content entity shown when the effect does not render.
  pub fn with_plain(mut self, plain: Entity) -> Self {
    self.plain = Some(plain);
    self
  }
}

impl bevy::ecs::system::Command for MountDistortEffect {
  fn apply(self, world: &mut World) {
    let Ok(mut host) = world.get_entity_mut(self.host) else {
      warn!("Cannot mount effect on missing entity {:?}", self.host);
      return;
    };
    if host.contains::<EffectSession>() {
      warn!("Entity {:?} already hosts an effect", self.host);
      return;
    }

    let session = EffectSession::new(&self.effect);
    host.insert((self.effect, self.bounds, session));
    if let Some(plain) = self.plain {
      host.insert(PlainContent(plain));
    }
    debug!("Mounted effect on {:?}", self.host);
  }
}

/// Tears down the effect on a host.
///
/// Marks the session destroyed, releases everything it acquired and shows
/// the plain content again. Unmounting twice is a no-op.
pub struct UnmountDistortEffect {
  pub host: Entity,
}

impl UnmountDistortEffect {
  pub fn new(host: Entity) -> Self {
    Self { host }
  }
}

impl bevy::ecs::system::Command for UnmountDistortEffect {
  fn apply(self, world: &mut World) {
    let Ok(mut host) = world.get_entity_mut(self.host) else {
      return;
    };
    let plain = host.get::<PlainContent>().copied();
    let Some(mut session) = host.get_mut::<EffectSession>() else {
      return;
    };
    if session.is_destroyed() {
      return;
    }

    let resources = session.destroy();
    host.remove::<(EffectSession, DistortEffect, EffectBounds, PlainContent)>();
    resources.release_in_world(world);

    if let Some(PlainContent(plain)) = plain
      && let Some(mut visibility) = world.get_mut::<Visibility>(plain)
    {
      *visibility = Visibility::Inherited;
    }

    info!("Unmounted effect on {:?}", self.host);
    world.write_message(DistortMessage::Disposed { host: self.host });
  }
}
