//! PDF 处理错误类型

use formforge_core::CoreError;
use thiserror::Error;

/// 文档级错误，整个调用失败
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("failed to parse document: {0}")]
    Load(#[source] lopdf::Error),

    #[error("failed to serialize document: {0}")]
    Save(String),

    #[error("malformed document structure: {0}")]
    Structure(String),

    #[error(transparent)]
    Object(#[from] lopdf::Error),
}

/// 单个字段的放置错误，只跳过该字段
#[derive(Error, Debug)]
pub enum FieldError {
    #[error("invalid geometry: {0}")]
    Geometry(#[from] CoreError),

    #[error("page {0} does not exist")]
    MissingPage(usize),

    #[error("malformed page structure: {0}")]
    Structure(String),

    #[error(transparent)]
    Object(#[from] lopdf::Error),
}

impl From<PdfError> for FieldError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Object(e) | PdfError::Load(e) => FieldError::Object(e),
            PdfError::Structure(msg) | PdfError::Save(msg) => FieldError::Structure(msg),
        }
    }
}
