mod font;

pub use font::{CpuFont, STROKE_PASSES, TEXT_FIT_MARGIN, TextStyle, fit_scale, rasterize_text};
