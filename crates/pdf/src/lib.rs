//! Interactive form materialization on top of lopdf.
//!
//! Takes a document and a list of field descriptors in screen-pixel space and
//! produces a new document with one AcroForm widget per accepted descriptor.

pub mod acroform;
pub mod appearance;
pub mod error;
pub mod fields;
pub mod materialize;
pub mod utils;

pub use error::{FieldError, PdfError};
pub use materialize::{
    materialize, materialize_document, save_document, MaterializeReport, Materialized,
    PlacedField, SkippedField, Stage,
};
