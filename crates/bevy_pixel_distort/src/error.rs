//! Error type for effect initialization and texture provisioning.

/// Reasons an effect cannot reach the rendering phase.
///
/// None of these are fatal to the host: a failing session falls back to the
/// plain content.
#[derive(Debug, Clone, PartialEq)]
pub enum DistortError {
  /// Neither `text` nor `image_src` was configured.
  MissingSource,
  /// Both `text` and `image_src` were configured.
  AmbiguousSource,
  /// The configured font could not be read or parsed.
  FontLoad { path: String, reason: String },
  /// The text has no renderable glyphs.
  EmptyText,
  /// The image asset failed to load.
  ImageLoad { path: String, reason: String },
  /// `Assets<Image>` is not available in this app.
  NoGraphicsContext,
}

impl std::fmt::Display for DistortError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::MissingSource => write!(f, "no text or image source configured"),
      Self::AmbiguousSource => write!(f, "both text and image source configured"),
      Self::FontLoad { path, reason } => write!(f, "failed to load font {path}: {reason}"),
      Self::EmptyText => write!(f, "text has no renderable glyphs"),
      Self::ImageLoad { path, reason } => write!(f, "failed to load image {path}: {reason}"),
      Self::NoGraphicsContext => write!(f, "image assets are not available"),
    }
  }
}

impl std::error::Error for DistortError {}
