//! Output element types.
//!
//! Mean subtraction and scaling run in `f64`; the result is narrowed to the
//! destination element type only when it is written.

/// Numeric type a transformer can write into a destination buffer
pub trait Element: Copy + Send + Sync + 'static {
    /// Narrows a working-precision value to this element type
    fn from_f64(value: f64) -> Self;
}

impl Element for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Element for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}
