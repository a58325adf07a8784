//! Row-major 2D buffers shared by the field and the texture provider.
//!
//! A [`Surface`] does not impose an orientation. The displacement field
//! stores row 0 at the bottom (texture space, Y+ up), while rasterized
//! textures store row 0 at the top to match GPU image upload order.

use std::ops::{Index, IndexMut};

use crate::render::Rgba;

// `as_bytes()` relies on these element types being tightly packed.
const _: () = assert!(std::mem::size_of::<Rgba>() == 4);
const _: () = assert!(std::mem::size_of::<[f32; 4]>() == 16);

/// A 2D buffer of elements stored as `y * width + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface<T> {
  data: Box<[T]>,
  width: u32,
  height: u32,
}

impl<T: Clone> Surface<T> {
  /// Creates a new surface filled with the given value.
  pub fn filled(width: u32, height: u32, value: T) -> Self {
    let len = (width as usize) * (height as usize);
    Self {
      data: vec![value; len].into_boxed_slice(),
      width,
      height,
    }
  }

  /// Fills the entire surface with the given value.
  #[inline]
  pub fn fill(&mut self, value: T) {
    self.data.fill(value);
  }
}

impl<T: Clone + Default> Surface<T> {
  /// Creates a new surface filled with the default value.
  pub fn new(width: u32, height: u32) -> Self {
    Self::filled(width, height, T::default())
  }
}

impl<T> Surface<T> {
  #[inline]
  pub fn width(&self) -> u32 {
    self.width
  }

  #[inline]
  pub fn height(&self) -> u32 {
    self.height
  }

  #[inline]
  fn index_of(&self, x: u32, y: u32) -> Option<usize> {
    if x < self.width && y < self.height {
      Some((y as usize) * (self.width as usize) + (x as usize))
    } else {
      None
    }
  }

  /// Returns a reference to the element at (x, y), or `None` if out of bounds.
  #[inline]
  pub fn get(&self, x: u32, y: u32) -> Option<&T> {
    self.index_of(x, y).map(|i| &self.data[i])
  }

  /// Returns a mutable reference to the element at (x, y), or `None` if out of
  /// bounds.
  #[inline]
  pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut T> {
    self.index_of(x, y).map(|i| &mut self.data[i])
  }

  /// Sets the element at (x, y). Returns `false` if out of bounds.
  #[inline]
  pub fn set(&mut self, x: u32, y: u32, value: T) -> bool {
    if let Some(i) = self.index_of(x, y) {
      self.data[i] = value;
      true
    } else {
      false
    }
  }

  /// Returns the raw data as a byte slice (for GPU upload).
  ///
  /// Only meaningful when `T` is plain data without padding; the element
  /// types used in this crate are checked at compile time above.
  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    let ptr = self.data.as_ptr() as *const u8;
    let len = std::mem::size_of_val(&*self.data);
    // SAFETY: the slice is contiguous and `len` covers exactly its elements.
    unsafe { std::slice::from_raw_parts(ptr, len) }
  }

  #[inline]
  pub fn as_slice(&self) -> &[T] {
    &self.data
  }

  #[inline]
  pub fn as_slice_mut(&mut self) -> &mut [T] {
    &mut self.data
  }
}

impl<T> Index<(u32, u32)> for Surface<T> {
  type Output = T;

  #[inline]
  fn index(&self, (x, y): (u32, u32)) -> &Self::Output {
    let i = (y as usize) * (self.width as usize) + (x as usize);
    &self.data[i]
  }
}

impl<T> IndexMut<(u32, u32)> for Surface<T> {
  #[inline]
  fn index_mut(&mut self, (x, y): (u32, u32)) -> &mut Self::Output {
    let i = (y as usize) * (self.width as usize) + (x as usize);
    &mut self.data[i]
  }
}

/// A surface of RGBA8 pixels, row 0 at the top, ready for GPU upload.
pub type RgbaSurface = Surface<Rgba>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn out_of_bounds_access_is_rejected() {
    let mut surface: Surface<u8> = Surface::new(4, 2);
    assert!(surface.set(3, 1, 7));
    assert!(!surface.set(4, 0, 1));
    assert_eq!(surface.get(3, 1), Some(&7));
    assert_eq!(surface.get(0, 2), None);
  }

  #[test]
  fn field_cells_are_sixteen_bytes() {
    let surface = Surface::filled(3, 3, [1.0f32, 2.0, 3.0, 4.0]);
    assert_eq!(surface.as_bytes().len(), 3 * 3 * 16);
    assert_eq!(&surface.as_bytes()[0..4], &1.0f32.to_ne_bytes());
  }
}
