mod surface;

pub use surface::{RgbaSurface, Surface};
