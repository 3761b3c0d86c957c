//! 将字段描述符落地为 AcroForm 字段
//!
//! 流程：Loaded → Normalizing → Placing(1..n) → Saved。
//! 单个字段失败只跳过该字段；文档级错误使整个调用失败。

use formforge_core::{
    DroppedField, FieldDescriptor, FieldKind, NormalizedField, Normalizer, PageTransform,
    PointRect, WidgetKind,
};
use lopdf::{Document, ObjectId};
use serde::Serialize;

use crate::acroform::{existing_field_names, FormContext};
use crate::error::{FieldError, PdfError};
use crate::fields::{build_checkbox, build_text_field, ObjectBatch, TextStyle, WidgetSpec};
use crate::utils::{check_reference_array, get_page_box, page_ids};

/// 处理阶段，用于日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Normalizing,
    Placing,
    Saved,
}

/// 成功放置的字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedField {
    pub id: String,
    pub name: String,
    pub page: usize,
    pub kind: FieldKind,
    pub rect: PointRect,
}

/// 放置失败被跳过的字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedField {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// 单次处理的结果汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeReport {
    pub placed: Vec<PlacedField>,
    pub skipped: Vec<SkippedField>,
    pub dropped: Vec<DroppedField>,
}

/// 处理后的文档
#[derive(Debug, Clone)]
pub struct Materialized {
    pub bytes: Vec<u8>,
    pub report: MaterializeReport,
}

/// 从文档字节生成带交互式表单的新文档
///
/// 输入字节和描述符列表都不会被修改。
pub fn materialize(source: &[u8], descriptors: &[FieldDescriptor]) -> Result<Materialized, PdfError> {
    let mut doc = Document::load_mem(source).map_err(PdfError::Load)?;
    log::info!("[Materialize] {:?}: {} 页", Stage::Loaded, doc.get_pages().len());

    let report = materialize_document(&mut doc, descriptors)?;
    let bytes = save_document(&mut doc)?;
    log::info!(
        "[Materialize] {:?}: {} 字节, 放置 {} 个字段, 跳过 {} 个, 丢弃 {} 个",
        Stage::Saved,
        bytes.len(),
        report.placed.len(),
        report.skipped.len(),
        report.dropped.len()
    );

    Ok(Materialized { bytes, report })
}

/// 在已加载的文档上放置字段
pub fn materialize_document(
    doc: &mut Document,
    descriptors: &[FieldDescriptor],
) -> Result<MaterializeReport, PdfError> {
    let pages = page_ids(doc);
    let existing = existing_field_names(doc);

    log::info!(
        "[Materialize] {:?}: {} 个描述符, 文档已有 {} 个字段",
        Stage::Normalizing,
        descriptors.len(),
        existing.len()
    );
    let normalized = Normalizer::new(pages.len())
        .reserve(existing)
        .normalize(descriptors);

    let mut report = MaterializeReport {
        dropped: normalized.dropped,
        ..Default::default()
    };
    if normalized.fields.is_empty() {
        return Ok(report);
    }

    let mut form = FormContext::open(doc)?;
    let total = normalized.fields.len();

    for (i, field) in normalized.fields.iter().enumerate() {
        log::debug!(
            "[Materialize] {:?}({}/{}): {} -> {:?}",
            Stage::Placing,
            i + 1,
            total,
            field.id,
            field.name
        );

        match place_field(doc, &mut form, &pages, field) {
            Ok(placed) => report.placed.push(placed),
            Err(e) => {
                log::warn!("[Materialize] 跳过字段 {} ({:?}): {}", field.id, field.name, e);
                report.skipped.push(SkippedField {
                    id: field.id.clone(),
                    name: field.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

fn place_field(
    doc: &mut Document,
    form: &mut FormContext,
    pages: &[ObjectId],
    field: &NormalizedField,
) -> Result<PlacedField, FieldError> {
    let page_id = *pages.get(field.page).ok_or(FieldError::MissingPage(field.page))?;
    let transform = PageTransform::new(get_page_box(doc, page_id))?;
    let rect = transform.to_points(&field.rect)?;
    log::debug!(
        "[Materialize] {} 像素 {:?} -> 点 {:?} (scale {})",
        field.id,
        field.rect,
        rect,
        transform.scale()
    );

    check_reference_array(doc, page_id, b"Annots")?;

    // 字体在所有字段间共用，不随单个字段回滚
    let (kind, font) = match field.widget {
        WidgetKind::Text { .. } => (FieldKind::Text, form.helvetica(doc)?),
        WidgetKind::Checkbox => (FieldKind::Checkbox, form.zapf_dingbats(doc)?),
    };

    let spec = WidgetSpec {
        name: &field.name,
        page_id,
        rect,
        required: field.required,
    };

    let mut batch = ObjectBatch::new(doc);
    let built = match field.widget {
        WidgetKind::Text { font_size, align } => {
            let style = TextStyle::new(font, transform.font_size(font_size), align);
            build_text_field(&mut batch, &spec, &style)
        }
        WidgetKind::Checkbox => build_checkbox(&mut batch, &spec, font),
    };
    let widget_id = match built.and_then(|id| form.attach_widget(batch.doc(), page_id, id).map(|_| id)) {
        Ok(id) => id,
        Err(e) => {
            batch.rollback();
            return Err(e.into());
        }
    };

    if let Err(e) = form.register_field(batch.doc(), widget_id) {
        form.detach_widget(batch.doc(), page_id, widget_id);
        batch.rollback();
        return Err(e.into());
    }
    batch.commit();

    Ok(PlacedField {
        id: field.id.clone(),
        name: field.name.clone(),
        page: field.page,
        kind,
        rect,
    })
}

/// 压缩并序列化文档
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    Ok(bytes)
}
