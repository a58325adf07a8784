//! Text rasterization for the effect's source texture.
//!
//! Uses `ab_glyph` for outlines and coverage. The text is fitted to the
//! buffer width, centered, stroked a few times with a one-pixel dilation and
//! then filled, which thickens the anti-aliased edges before the shader
//! starts pulling pixels around.

use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};

use crate::error::DistortError;
use crate::primitives::{RgbaSurface, Surface};
use crate::render::Rgba;

const REGULAR_FONT_BYTES: &[u8] = include_bytes!("fonts/DejaVuSans.ttf");
const BOLD_FONT_BYTES: &[u8] = include_bytes!("fonts/DejaVuSans-Bold.ttf");

/// Fraction of the buffer the text may span on either axis.
pub const TEXT_FIT_MARGIN: f32 = 0.9;
/// Number of dilated stroke passes drawn before the fill.
pub const STROKE_PASSES: u32 = 3;

/// A CPU-side font for text rasterization.
#[derive(Clone)]
pub struct CpuFont {
  font: FontArc,
}

impl CpuFont {
  /// The embedded regular face (DejaVu Sans).
  pub fn regular() -> Self {
    Self {
      font: FontArc::try_from_slice(REGULAR_FONT_BYTES).expect("embedded font should be valid"),
    }
  }

  /// The embedded bold face (DejaVu Sans Bold).
  pub fn bold() -> Self {
    Self {
      font: FontArc::try_from_slice(BOLD_FONT_BYTES).expect("embedded font should be valid"),
    }
  }

  /// Creates a font from raw TTF/OTF bytes.
  ///
  /// Returns `None` if the bytes are not a valid font.
  pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
    FontArc::try_from_vec(data).ok().map(|font| Self { font })
  }

  /// Reads a font file from disk.
  pub fn from_path(path: &str) -> Result<Self, DistortError> {
    let data = std::fs::read(path).map_err(|e| DistortError::FontLoad {
      path: path.to_string(),
      reason: e.to_string(),
    })?;
    Self::from_bytes(data).ok_or_else(|| DistortError::FontLoad {
      path: path.to_string(),
      reason: "not a TTF/OTF font".to_string(),
    })
  }
}

/// Text rendering parameters for one rasterization.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
  /// Font size in physical pixels before fitting.
  pub font_size: f32,
  pub color: Rgba,
  pub background: Rgba,
  pub stroke_passes: u32,
}

impl Default for TextStyle {
  fn default() -> Self {
    Self {
      font_size: 160.0,
      color: Rgba::new(255, 255, 255, 255),
      background: Rgba::new(0, 0, 0, 0),
      stroke_passes: STROKE_PASSES,
    }
  }
}

/// Glyph bounds in pixels: `(min_x, min_y, max_x, max_y)`.
type Bounds = (f32, f32, f32, f32);

/// Positions glyphs along the baseline, with kerning.
fn layout_glyphs<SF: ScaleFont<F>, F: Font>(scaled_font: &SF, text: &str, scale: PxScale) -> Vec<Glyph> {
  let mut glyphs = Vec::new();
  let mut cursor_x = 0.0f32;
  let mut previous = None;

  for ch in text.chars() {
    let glyph_id = scaled_font.glyph_id(ch);
    if let Some(prev) = previous {
      cursor_x += scaled_font.kern(prev, glyph_id);
    }
    glyphs.push(glyph_id.with_scale_and_position(scale, point(cursor_x, scaled_font.ascent())));
    cursor_x += scaled_font.h_advance(glyph_id);
    previous = Some(glyph_id);
  }

  glyphs
}

/// Computes the aggregate pixel bounds of the outlined glyphs.
///
/// Returns `None` if nothing has an outline (empty or whitespace text).
fn glyph_bounds<SF: ScaleFont<F>, F: Font>(scaled_font: &SF, glyphs: &[Glyph]) -> Option<Bounds> {
  let mut bounds: Option<Bounds> = None;

  for glyph in glyphs {
    if let Some(outlined) = scaled_font.outline_glyph(glyph.clone()) {
      let px = outlined.px_bounds();
      bounds = Some(match bounds {
        None => (px.min.x, px.min.y, px.max.x, px.max.y),
        Some((x0, y0, x1, y1)) => (
          x0.min(px.min.x),
          y0.min(px.min.y),
          x1.max(px.max.x),
          y1.max(px.max.y),
        ),
      });
    }
  }

  bounds.filter(|(x0, y0, x1, y1)| x1 > x0 && y1 > y0)
}

/// Horizontal and vertical pixel scale that fit text measured at
/// `font_size` into a `width`×`height` buffer.
///
/// The horizontal scale makes the text span the margin-reduced width; the
/// vertical scale matches it unless the text would then overflow the height,
/// in which case it is shrunk by the same ratio the overflow requires.
pub fn fit_scale(font_size: f32, measured: (f32, f32), width: u32, height: u32) -> PxScale {
  let (text_w, text_h) = measured;
  let fit = width as f32 * TEXT_FIT_MARGIN / text_w;
  let fitted_h = text_h * fit;
  let max_h = height as f32 * TEXT_FIT_MARGIN;
  let aspect_correction = if fitted_h > max_h { max_h / fitted_h } else { 1.0 };

  PxScale {
    x: font_size * fit,
    y: font_size * fit * aspect_correction,
  }
}

/// Draws the glyph coverage into a `width`×`height` mask, centered.
fn coverage_mask(font: &CpuFont, text: &str, scale: PxScale, width: u32, height: u32) -> Option<Surface<f32>> {
  let scaled_font = font.font.as_scaled(scale);
  let glyphs = layout_glyphs(&scaled_font, text, scale);
  let (min_x, min_y, max_x, max_y) = glyph_bounds(&scaled_font, &glyphs)?;

  let offset_x = (width as f32 - (max_x - min_x)) / 2.0 - min_x;
  let offset_y = (height as f32 - (max_y - min_y)) / 2.0 - min_y;

  let mut mask = Surface::filled(width, height, 0.0f32);
  for mut glyph in glyphs {
    glyph.position = point(glyph.position.x + offset_x, glyph.position.y + offset_y);
    let Some(outlined) = scaled_font.outline_glyph(glyph) else {
      continue;
    };
    let bounds = outlined.px_bounds();
    outlined.draw(|px, py, coverage| {
      let x = bounds.min.x as i32 + px as i32;
      let y = bounds.min.y as i32 + py as i32;
      if x >= 0 && y >= 0 {
        if let Some(cell) = mask.get_mut(x as u32, y as u32) {
          *cell = cell.max(coverage.clamp(0.0, 1.0));
        }
      }
    });
  }

  Some(mask)
}

/// One-pixel dilation: each cell takes the maximum of its 3×3 neighborhood.
fn dilate(mask: &Surface<f32>) -> Surface<f32> {
  let (width, height) = (mask.width(), mask.height());
  let mut out = Surface::filled(width, height, 0.0f32);
  for y in 0..height {
    for x in 0..width {
      let mut value = 0.0f32;
      for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
          value = value.max(mask[(nx, ny)]);
        }
      }
      out[(x, y)] = value;
    }
  }
  out
}

/// Source-over blend of `color` at `coverage` onto `dst` (straight alpha).
fn blend_over(dst: Rgba, color: Rgba, coverage: f32) -> Rgba {
  let sa = (color.alpha as f32 / 255.0) * coverage;
  if sa <= 0.0 {
    return dst;
  }
  let da = dst.alpha as f32 / 255.0;
  let out_a = sa + da * (1.0 - sa);
  let channel = |s: u8, d: u8| {
    let value = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
    value.round().clamp(0.0, 255.0) as u8
  };
  Rgba::new(
    channel(color.red, dst.red),
    channel(color.green, dst.green),
    channel(color.blue, dst.blue),
    (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
  )
}

fn composite(surface: &mut RgbaSurface, mask: &Surface<f32>, color: Rgba) {
  for (dst, &coverage) in surface.as_slice_mut().iter_mut().zip(mask.as_slice()) {
    if coverage > 0.0 {
      *dst = blend_over(*dst, color, coverage);
    }
  }
}

/// Rasterizes `text` into a `width`×`height` RGBA buffer (row 0 at the top).
///
/// The buffer is filled with the background, the text is fitted and
/// centered, stroked `style.stroke_passes` times and filled. Identical inputs
/// produce identical bytes.
pub fn rasterize_text(
  font: &CpuFont,
  text: &str,
  style: &TextStyle,
  width: u32,
  height: u32,
) -> Result<RgbaSurface, DistortError> {
  if text.trim().is_empty() || width == 0 || height == 0 {
    return Err(DistortError::EmptyText);
  }

  let base = PxScale::from(style.font_size.max(1.0));
  let scaled_font = font.font.as_scaled(base);
  let glyphs = layout_glyphs(&scaled_font, text, base);
  let (min_x, min_y, max_x, max_y) =
    glyph_bounds(&scaled_font, &glyphs).ok_or(DistortError::EmptyText)?;

  let scale = fit_scale(base.y, (max_x - min_x, max_y - min_y), width, height);
  let mask = coverage_mask(font, text, scale, width, height).ok_or(DistortError::EmptyText)?;

  let mut surface = Surface::filled(width, height, style.background);
  if style.stroke_passes > 0 {
    let stroke = dilate(&mask);
    for _ in 0..style.stroke_passes {
      composite(&mut surface, &stroke, style.color);
    }
  }
  composite(&mut surface, &mask, style.color);

  Ok(surface)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn covered(surface: &RgbaSurface) -> usize {
    surface.as_slice().iter().filter(|p| p.alpha > 0).count()
  }

  #[test]
  fn rasterization_is_deterministic() {
    let font = CpuFont::regular();
    let style = TextStyle::default();
    let a = rasterize_text(&font, "Portfolio", &style, 320, 120).unwrap();
    let b = rasterize_text(&font, "Portfolio", &style, 320, 120).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
    assert!(covered(&a) > 0);
  }

  #[test]
  fn text_is_centered_and_fits() {
    let font = CpuFont::regular();
    let surface = rasterize_text(&font, "HELLO", &TextStyle::default(), 400, 200).unwrap();

    let (mut min_x, mut max_x) = (u32::MAX, 0);
    for y in 0..surface.height() {
      for x in 0..surface.width() {
        if surface[(x, y)].alpha > 0 {
          min_x = min_x.min(x);
          max_x = max_x.max(x);
        }
      }
    }

    // Margins on both sides, roughly equal.
    assert!(min_x > 0 && max_x < 399);
    let left = min_x as i32;
    let right = 399 - max_x as i32;
    assert!((left - right).abs() <= 4, "left {left} right {right}");
  }

  #[test]
  fn tall_text_gets_vertical_correction() {
    // Measured 50×100 at 100px: fitting the width alone would make it 720px
    // tall in a 100px buffer.
    let scale = fit_scale(100.0, (50.0, 100.0), 400, 100);
    assert!((scale.x - 720.0).abs() < 1e-3);
    assert!((scale.y - 90.0).abs() < 1e-3);
  }

  #[test]
  fn stroke_passes_thicken_the_glyphs() {
    let font = CpuFont::regular();
    let thin = TextStyle {
      stroke_passes: 0,
      ..default_style()
    };
    let thick = default_style();
    let a = rasterize_text(&font, "Aa", &thin, 200, 100).unwrap();
    let b = rasterize_text(&font, "Aa", &thick, 200, 100).unwrap();
    assert!(covered(&b) > covered(&a));
  }

  #[test]
  fn background_fills_the_buffer() {
    let font = CpuFont::bold();
    let style = TextStyle {
      background: Rgba::new(10, 20, 30, 255),
      ..default_style()
    };
    let surface = rasterize_text(&font, "x", &style, 64, 64).unwrap();
    assert_eq!(surface[(0, 0)], Rgba::new(10, 20, 30, 255));
  }

  #[test]
  fn blank_text_is_rejected() {
    let font = CpuFont::regular();
    assert_eq!(
      rasterize_text(&font, "   ", &TextStyle::default(), 64, 64).err(),
      Some(DistortError::EmptyText)
    );
  }

  #[test]
  fn invalid_font_bytes_are_rejected() {
    assert!(CpuFont::from_bytes(vec![0, 1, 2, 3]).is_none());
    assert!(matches!(
      CpuFont::from_path("/nonexistent/font.ttf"),
      Err(DistortError::FontLoad { .. })
    ));
  }

  fn default_style() -> TextStyle {
    TextStyle::default()
  }
}
