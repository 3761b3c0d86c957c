//! Field descriptors, naming and geometry shared by the form materializer.

pub mod descriptor;
pub mod geometry;
pub mod naming;
pub mod normalize;

pub use descriptor::{Align, FieldDescriptor, FieldKind, DEFAULT_FONT_SIZE};
pub use geometry::{PageBox, PageTransform, PixelRect, PointRect, REFERENCE_WIDTH};
pub use naming::{sanitize_name, synthesize_name, NameRegistry};
pub use normalize::{normalize, DroppedField, Normalized, NormalizedField, Normalizer, WidgetKind};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("page width must be positive, got {0}")]
    InvalidPage(f64),
    #[error("rectangle has non-finite coordinates")]
    NonFinite,
    #[error("rectangle is empty ({width} x {height})")]
    Degenerate { width: f64, height: f64 },
}
