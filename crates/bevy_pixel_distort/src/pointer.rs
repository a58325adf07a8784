//! Normalized pointer tracking for one effect.

use bevy::prelude::*;

/// Fraction of velocity kept after each frame.
pub const POINTER_VELOCITY_DECAY: f32 = 0.9;

/// Pointer position inside the effect bounds and its per-event velocity.
///
/// Positions are normalized to [0, 1] with (0, 0) at the top-left of the
/// bounds, like window coordinates. Only pointer-move events inside the
/// bounds mutate the position; the frame update reads it once and decays the
/// velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
  pub current: Vec2,
  pub previous: Vec2,
  pub velocity: Vec2,
  /// False until the first move; the first move snaps without velocity.
  tracking: bool,
}

impl PointerState {
  /// Applies a pointer-move to `target`, eased by `ease_factor`.
  ///
  /// Easing happens per event, not per frame: once events stop, `current`
  /// stays where the last event left it, and each event's velocity is the
  /// eased step rather than the raw pointer delta. The frame update only
  /// decays the velocity.
  pub fn move_to(&mut self, target: Vec2, ease_factor: f32) {
    let target = target.clamp(Vec2::ZERO, Vec2::ONE);
    if !self.tracking {
      self.tracking = true;
      self.current = target;
      self.previous = target;
      self.velocity = Vec2::ZERO;
      return;
    }

    self.previous = self.current;
    self.current += (target - self.current) * ease_factor;
    self.velocity = self.current - self.previous;
  }

  /// Stops contributing: the pointer left the bounds or went idle.
  pub fn settle(&mut self) {
    self.velocity = Vec2::ZERO;
  }

  /// Forgets the position so the next move snaps again.
  pub fn reset(&mut self) {
    *self = Self::default();
  }

  /// Returns true if both velocity components are below `epsilon`.
  pub fn is_idle(&self, epsilon: f32) -> bool {
    self.velocity.x.abs() < epsilon && self.velocity.y.abs() < epsilon
  }

  /// Applies one frame of velocity decay.
  pub fn decay(&mut self) {
    self.velocity *= POINTER_VELOCITY_DECAY;
  }

  pub fn is_tracking(&self) -> bool {
    self.tracking
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_move_snaps_without_velocity() {
    let mut pointer = PointerState::default();
    pointer.move_to(Vec2::new(0.4, 0.6), 0.5);
    assert_eq!(pointer.current, Vec2::new(0.4, 0.6));
    assert_eq!(pointer.velocity, Vec2::ZERO);
  }

  #[test]
  fn ease_factor_smooths_position() {
    let mut pointer = PointerState::default();
    pointer.move_to(Vec2::ZERO, 0.5);
    pointer.move_to(Vec2::new(1.0, 0.0), 0.5);
    assert_eq!(pointer.current, Vec2::new(0.5, 0.0));
    assert_eq!(pointer.velocity, Vec2::new(0.5, 0.0));
  }

  #[test]
  fn position_only_advances_on_events() {
    let mut pointer = PointerState::default();
    pointer.move_to(Vec2::ZERO, 0.25);
    pointer.move_to(Vec2::new(0.8, 0.0), 0.25);
    let eased = pointer.current;
    assert_eq!(eased, Vec2::new(0.2, 0.0));
    assert_eq!(pointer.velocity, Vec2::new(0.2, 0.0));

    // Frames without events decay velocity but never move the position.
    for _ in 0..10 {
      pointer.decay();
    }
    assert_eq!(pointer.current, eased);

    // The next event eases from where the last one stopped.
    pointer.move_to(Vec2::new(0.8, 0.0), 0.25);
    assert!((pointer.current.x - 0.35).abs() < 1e-6);
  }

  #[test]
  fn positions_are_clamped_to_unit_square() {
    let mut pointer = PointerState::default();
    pointer.move_to(Vec2::new(-1.0, 3.0), 1.0);
    assert_eq!(pointer.current, Vec2::new(0.0, 1.0));
  }

  #[test]
  fn decay_keeps_ninety_percent() {
    let mut pointer = PointerState::default();
    pointer.move_to(Vec2::ZERO, 1.0);
    pointer.move_to(Vec2::new(0.1, 0.2), 1.0);
    pointer.decay();
    assert!((pointer.velocity - Vec2::new(0.09, 0.18)).length() < 1e-6);
    assert!(!pointer.is_idle(0.001));
    pointer.settle();
    assert!(pointer.is_idle(0.001));
  }
}
