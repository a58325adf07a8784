//! Displacement field update.
//!
//! The field is a small N×N grid of offset vectors. Every frame each cell
//! relaxes toward zero; while the pointer moves, cells inside an elliptical
//! cutoff around it receive the pointer velocity weighted by inverse
//! distance. Grids are at most 80×80, so the update is a brute-force scan.

use bevy::prelude::*;

use crate::config::DistortEffect;
use crate::pointer::PointerState;
use crate::primitives::Surface;

/// Value held by the two unused channels of every cell.
pub const FIELD_SENTINEL: f32 = 255.0;
/// Upper bound of the inverse-distance falloff weight.
pub const MAX_FALLOFF_WEIGHT: f32 = 10.0;

/// Parameters of one field update, derived from the effect options and the
/// current bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldParams {
  pub relaxation: f32,
  pub idle_epsilon: f32,
  pub intensity: f32,
  pub radius: f32,
  /// Viewport height / width.
  pub aspect: f32,
}

impl FieldParams {
  pub fn from_effect(effect: &DistortEffect, bounds: Vec2) -> Self {
    let aspect = if bounds.x > 0.0 && bounds.y > 0.0 {
      bounds.y / bounds.x
    } else {
      1.0
    };
    Self {
      relaxation: effect.clamped_relaxation(),
      idle_epsilon: effect.idle_epsilon,
      intensity: effect.intensity,
      radius: effect.radius,
      aspect,
    }
  }
}

/// What a frame update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStep {
  /// Pointer idle: the field only relaxed.
  Relaxed,
  /// Pointer velocity was added to this many cells.
  Pushed { cells: usize },
}

/// N×N grid of `[x, y, sentinel, sentinel]` cells, row 0 at the bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
  cells: Surface<[f32; 4]>,
}

impl DisplacementField {
  /// Creates a field at rest.
  pub fn new(size: u32) -> Self {
    Self {
      cells: Surface::filled(size, size, Self::rest_cell()),
    }
  }

  #[inline]
  const fn rest_cell() -> [f32; 4] {
    [0.0, 0.0, FIELD_SENTINEL, FIELD_SENTINEL]
  }

  /// Cells per side.
  #[inline]
  pub fn size(&self) -> u32 {
    self.cells.width()
  }

  /// Returns every cell to rest.
  pub fn reset(&mut self) {
    self.cells.fill(Self::rest_cell());
  }

  /// Returns the (x, y) offset at a cell. Out of bounds reads as zero.
  pub fn offset(&self, x: u32, y: u32) -> Vec2 {
    self
      .cells
      .get(x, y)
      .map(|c| Vec2::new(c[0], c[1]))
      .unwrap_or(Vec2::ZERO)
  }

  pub fn cell(&self, x: u32, y: u32) -> Option<&[f32; 4]> {
    self.cells.get(x, y)
  }

  /// Largest offset length over all cells.
  pub fn max_magnitude(&self) -> f32 {
    self
      .cells
      .as_slice()
      .iter()
      .map(|c| Vec2::new(c[0], c[1]).length())
      .fold(0.0, f32::max)
  }

  pub fn is_at_rest(&self) -> bool {
    self.cells.as_slice().iter().all(|c| c[0] == 0.0 && c[1] == 0.0)
  }

  /// Field bytes for GPU upload (Rgba32Float layout).
  pub fn as_bytes(&self) -> &[u8] {
    self.cells.as_bytes()
  }

  /// Multiplies the offset channels of every cell by `factor`.
  pub fn relax(&mut self, factor: f32) {
    for cell in self.cells.as_slice_mut() {
      cell[0] *= factor;
      cell[1] *= factor;
    }
  }

  /// Adds the pointer velocity to every cell inside the cutoff.
  ///
  /// Returns the number of cells touched.
  pub fn push(&mut self, pointer: &PointerState, params: &FieldParams) -> usize {
    let size = self.size();
    let n = size as f32;
    let grid_x = n * pointer.current.x;
    let grid_y = n * (1.0 - pointer.current.y);
    let max_dist = n * params.radius;
    let cutoff_sq = max_dist * max_dist;
    let aspect = params.aspect.max(f32::EPSILON);
    let velocity = pointer.velocity;

    let mut touched = 0;
    for j in 0..size {
      for i in 0..size {
        let dx = grid_x - i as f32;
        let dy = grid_y - j as f32;
        let distance = dx * dx / aspect + dy * dy;
        if distance >= cutoff_sq {
          continue;
        }

        // sqrt(0) gives inf, which the cap turns into the maximum weight.
        let weight = (max_dist / distance.sqrt()).min(MAX_FALLOFF_WEIGHT);
        let cell = &mut self.cells[(i, j)];
        cell[0] += velocity.x * params.intensity * weight;
        cell[1] -= velocity.y * params.intensity * weight;
        touched += 1;
      }
    }
    touched
  }

  /// Runs one frame: relax, then push unless the pointer is idle, then decay
  /// the pointer velocity.
  pub fn step(&mut self, pointer: &mut PointerState, params: &FieldParams) -> FieldStep {
    self.relax(params.relaxation);

    if pointer.is_idle(params.idle_epsilon) {
      pointer.decay();
      return FieldStep::Relaxed;
    }

    let cells = self.push(pointer, params);
    pointer.decay();
    FieldStep::Pushed { cells }
  }
}

#[cfg(test)]
mod tests {
  use rand::{Rng, SeedableRng, rngs::StdRng};

  use super::*;

  fn params(radius: f32) -> FieldParams {
    FieldParams {
      relaxation: 0.9,
      idle_epsilon: 0.001,
      intensity: 0.05,
      radius,
      aspect: 1.0,
    }
  }

  fn moving_pointer(from: Vec2, to: Vec2) -> PointerState {
    let mut pointer = PointerState::default();
    pointer.move_to(from, 1.0);
    pointer.move_to(to, 1.0);
    pointer
  }

  #[test]
  fn new_field_is_at_rest_with_sentinels() {
    let field = DisplacementField::new(8);
    assert!(field.is_at_rest());
    assert_eq!(field.cell(7, 7), Some(&[0.0, 0.0, FIELD_SENTINEL, FIELD_SENTINEL]));
    assert_eq!(field.as_bytes().len(), 8 * 8 * 16);
  }

  #[test]
  fn idle_frames_decay_every_cell_by_relaxation() {
    let mut field = DisplacementField::new(16);
    let mut pointer = moving_pointer(Vec2::new(0.3, 0.3), Vec2::new(0.5, 0.6));
    field.step(&mut pointer, &params(0.3));
    pointer.settle();

    let before = field.clone();
    assert_eq!(field.step(&mut pointer, &params(0.3)), FieldStep::Relaxed);

    for y in 0..16 {
      for x in 0..16 {
        let prev = before.offset(x, y);
        let next = field.offset(x, y);
        assert_eq!(next.x, prev.x * 0.9);
        assert_eq!(next.y, prev.y * 0.9);
        assert!(next.length() < prev.length() || prev == Vec2::ZERO);
        assert_eq!(field.cell(x, y).map(|c| c[2]), Some(FIELD_SENTINEL));
      }
    }
  }

  #[test]
  fn nearest_cell_gets_largest_push_and_cutoff_is_respected() {
    let size = 20;
    let p = params(0.25);
    let mut field = DisplacementField::new(size);
    let pointer = moving_pointer(Vec2::new(0.25, 0.25), Vec2::new(0.5, 0.5));
    field.push(&pointer, &p);

    let center = field.offset(10, 10).length();
    assert!(center > 0.0);

    let max_dist = size as f32 * p.radius;
    for j in 0..size {
      for i in 0..size {
        let d = (10.0 - i as f32).powi(2) + (10.0 - j as f32).powi(2);
        let magnitude = field.offset(i, j).length();
        assert!(magnitude <= center, "cell ({i}, {j}) exceeds the nearest cell");
        if d >= max_dist * max_dist {
          assert_eq!(magnitude, 0.0, "cell ({i}, {j}) is beyond the cutoff");
        }
      }
    }
  }

  #[test]
  fn y_velocity_is_flipped_into_texture_space() {
    let mut field = DisplacementField::new(10);
    // Moving down the screen (y grows) pushes cells toward negative y.
    let pointer = moving_pointer(Vec2::new(0.5, 0.4), Vec2::new(0.5, 0.5));
    field.push(&pointer, &params(0.3));
    assert!(field.offset(5, 5).y < 0.0);
    assert_eq!(field.offset(5, 5).x, 0.0);
  }

  #[test]
  fn wide_viewports_shrink_horizontal_reach_in_cells() {
    let mut wide = params(0.2);
    wide.aspect = 0.25;
    let mut field = DisplacementField::new(40);
    let pointer = moving_pointer(Vec2::new(0.25, 0.5), Vec2::new(0.5, 0.5));
    field.push(&pointer, &wide);

    // Cutoff is 8 cells: 7 cells up is inside, 7 cells right is 7² / 0.25 away.
    assert!(field.offset(20, 27).length() > 0.0);
    assert_eq!(field.offset(27, 20).length(), 0.0);
    assert!(field.offset(23, 20).length() > 0.0);
  }

  #[test]
  fn idle_fast_path_still_decays_velocity() {
    let mut field = DisplacementField::new(4);
    let mut pointer = moving_pointer(Vec2::ZERO, Vec2::new(0.0005, 0.0));
    assert_eq!(field.step(&mut pointer, &params(0.5)), FieldStep::Relaxed);
    assert!(field.is_at_rest());
    assert!((pointer.velocity.x - 0.00045).abs() < 1e-9);
  }

  #[test]
  fn pointer_sweep_builds_then_fully_relaxes() {
    let p = params(0.25);
    let mut field = DisplacementField::new(80);
    let mut pointer = PointerState::default();
    pointer.move_to(Vec2::ZERO, 1.0);

    for frame in 1..=10 {
      let t = frame as f32 / 10.0;
      pointer.move_to(Vec2::splat(t), 1.0);
      field.step(&mut pointer, &p);
      if frame == 5 {
        assert!(field.max_magnitude() > 0.0, "field is degenerate at frame 5");
      }
    }

    pointer.settle();
    for _ in 0..50 {
      assert_eq!(field.step(&mut pointer, &p), FieldStep::Relaxed);
    }
    assert!(
      field.max_magnitude() < 1e-3,
      "field did not relax: {}",
      field.max_magnitude()
    );
  }

  #[test]
  fn random_pushes_never_touch_cells_beyond_cutoff() {
    let mut rng = StdRng::seed_from_u64(7);
    let size = 32;
    for _ in 0..50 {
      let radius = rng.gen_range(0.05..0.5);
      let p = params(radius);
      let from = Vec2::new(rng.r#gen(), rng.r#gen());
      let to = Vec2::new(rng.r#gen(), rng.r#gen());
      let pointer = moving_pointer(from, to);
      let mut field = DisplacementField::new(size);
      field.push(&pointer, &p);

      let n = size as f32;
      let gx = n * pointer.current.x;
      let gy = n * (1.0 - pointer.current.y);
      let cutoff = (n * radius).powi(2);
      for j in 0..size {
        for i in 0..size {
          let d = (gx - i as f32).powi(2) + (gy - j as f32).powi(2);
          if d >= cutoff {
            assert_eq!(field.offset(i, j), Vec2::ZERO);
          }
        }
      }
    }
  }
}
