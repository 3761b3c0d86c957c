//! AcroForm 处理
//!
//! 读取文档已有的字段名称，创建或复用交互式表单及其默认资源。

use std::collections::HashSet;

use lopdf::{dictionary, Document, Object, ObjectId};

use crate::appearance::FontRef;
use crate::error::PdfError;
use crate::utils::{
    get_catalog_id, get_text, indirect_array, indirect_dictionary, push_reference, reference_ids,
    remove_reference,
};

/// 文本字段共用的字体资源名
pub const HELVETICA: &str = "Helv";
/// 复选框对勾使用的字体资源名
pub const ZAPF_DINGBATS: &str = "ZaDb";

/// 字段层级的最大深度
const MAX_FIELD_DEPTH: usize = 32;

/// 获取 Catalog 中 AcroForm 的字典（可能内联或引用）
fn acroform_dict(doc: &Document) -> Option<&lopdf::Dictionary> {
    let catalog_id = get_catalog_id(doc).ok()?;
    let catalog = doc.get_dictionary(catalog_id).ok()?;
    match catalog.get(b"AcroForm").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// 获取 AcroForm 中所有顶层字段的 ID
fn get_form_field_ids(doc: &Document) -> Vec<ObjectId> {
    match acroform_dict(doc).and_then(|form| form.get(b"Fields").ok()) {
        Some(fields) => reference_ids(doc, fields),
        None => Vec::new(),
    }
}

/// 递归收集字段全名（`父.子`）
fn collect_field_names(
    doc: &Document,
    field_id: ObjectId,
    prefix: Option<&str>,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    names: &mut Vec<String>,
) {
    if depth > MAX_FIELD_DEPTH || !visited.insert(field_id) {
        return;
    }
    let dict = match doc.get_dictionary(field_id) {
        Ok(dict) => dict,
        Err(_) => return,
    };

    let full_name = match (prefix, get_text(doc, dict, b"T")) {
        (Some(parent), Some(partial)) => Some(format!("{}.{}", parent, partial)),
        (None, Some(partial)) => Some(partial),
        (parent, None) => parent.map(str::to_string),
    };
    if dict.has(b"T") {
        if let Some(name) = &full_name {
            names.push(name.clone());
        }
    }

    if let Ok(kids) = dict.get(b"Kids") {
        for kid_id in reference_ids(doc, kids) {
            collect_field_names(doc, kid_id, full_name.as_deref(), depth + 1, visited, names);
        }
    }
}

/// 文档表单中已有字段的全名
pub fn existing_field_names(doc: &Document) -> Vec<String> {
    let mut names = Vec::new();
    let mut visited = HashSet::new();
    for field_id in get_form_field_ids(doc) {
        collect_field_names(doc, field_id, None, 0, &mut visited, &mut names);
    }
    names
}

/// 单次处理的表单上下文
///
/// 字体资源在首次使用时登记，之后所有字段共用。
#[derive(Debug)]
pub struct FormContext {
    acroform_id: ObjectId,
    fields_id: ObjectId,
    helvetica: Option<FontRef>,
    zapf_dingbats: Option<FontRef>,
}

impl FormContext {
    /// 获取或创建 AcroForm，并确保 /Fields 是间接数组
    pub fn open(doc: &mut Document) -> Result<Self, PdfError> {
        let catalog_id = get_catalog_id(doc)?;
        doc.get_dictionary(catalog_id)
            .map_err(|_| PdfError::Structure("catalog is not a dictionary".to_string()))?;

        let acroform_id = indirect_dictionary(doc, catalog_id, b"AcroForm")?;
        let fields_id = indirect_array(doc, acroform_id, b"Fields")?;

        let acroform = doc.get_dictionary_mut(acroform_id)?;
        if !acroform.has(b"DA") {
            acroform.set("DA", Object::string_literal(format!("/{} 0 Tf 0 g", HELVETICA)));
        }

        log::debug!("[Form] AcroForm {:?}, Fields {:?}", acroform_id, fields_id);
        Ok(Self {
            acroform_id,
            fields_id,
            helvetica: None,
            zapf_dingbats: None,
        })
    }

    pub fn acroform_id(&self) -> ObjectId {
        self.acroform_id
    }

    /// 文本字段字体
    pub fn helvetica(&mut self, doc: &mut Document) -> Result<FontRef, PdfError> {
        if let Some(font) = self.helvetica {
            return Ok(font);
        }
        let font = self.register_font(doc, HELVETICA, "Helvetica", true)?;
        self.helvetica = Some(font);
        Ok(font)
    }

    /// 复选框字体
    pub fn zapf_dingbats(&mut self, doc: &mut Document) -> Result<FontRef, PdfError> {
        if let Some(font) = self.zapf_dingbats {
            return Ok(font);
        }
        let font = self.register_font(doc, ZAPF_DINGBATS, "ZapfDingbats", false)?;
        self.zapf_dingbats = Some(font);
        Ok(font)
    }

    /// 在 /DR /Font 中登记标准字体，同名资源已存在时复用
    fn register_font(
        &self,
        doc: &mut Document,
        resource: &'static str,
        base_font: &str,
        win_ansi: bool,
    ) -> Result<FontRef, PdfError> {
        let dr_id = indirect_dictionary(doc, self.acroform_id, b"DR")?;
        let fonts_id = indirect_dictionary(doc, dr_id, b"Font")?;

        let existing = doc
            .get_dictionary(fonts_id)?
            .get(resource.as_bytes())
            .ok()
            .cloned();
        match existing {
            Some(Object::Reference(id)) if doc.get_dictionary(id).is_ok() => {
                log::debug!("[Form] 复用已有字体资源 /{} {:?}", resource, id);
                return Ok(FontRef { resource, id });
            }
            // 外观流只能引用间接对象，内联字体字典需要提升
            Some(Object::Dictionary(inline)) => {
                let id = doc.add_object(inline);
                doc.get_dictionary_mut(fonts_id)?
                    .set(resource, Object::Reference(id));
                log::info!("[Form] 内联字体资源 /{} 提升为 {:?}", resource, id);
                return Ok(FontRef { resource, id });
            }
            _ => {}
        }

        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font,
        };
        if win_ansi {
            font.set("Encoding", "WinAnsiEncoding");
        }
        let id = doc.add_object(font);
        doc.get_dictionary_mut(fonts_id)?
            .set(resource, Object::Reference(id));

        log::info!("[Form] 登记字体 /{} ({}) {:?}", resource, base_font, id);
        Ok(FontRef { resource, id })
    }

    /// 将字段加入 /Fields
    pub fn register_field(&self, doc: &mut Document, field_id: ObjectId) -> Result<(), PdfError> {
        doc.get_object_mut(self.fields_id)?
            .as_array_mut()?
            .push(Object::Reference(field_id));
        Ok(())
    }

    /// 将控件加入页面 /Annots
    pub fn attach_widget(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        widget_id: ObjectId,
    ) -> Result<(), PdfError> {
        push_reference(doc, page_id, b"Annots", widget_id)
    }

    pub fn detach_widget(&self, doc: &mut Document, page_id: ObjectId, widget_id: ObjectId) {
        remove_reference(doc, page_id, b"Annots", widget_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::text_string;
    use lopdf::Dictionary;

    fn document_with_form(form: Object) -> Document {
        let mut doc = Document::with_version("1.7");
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "AcroForm" => form,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn test_existing_names_are_fully_qualified() {
        let mut doc = Document::with_version("1.7");
        let kid = doc.add_object(dictionary! { "T" => text_string("street") });
        let widget = doc.add_object(dictionary! { "Subtype" => "Widget" });
        let parent = doc.add_object(dictionary! {
            "T" => text_string("address"),
            "Kids" => vec![Object::Reference(kid), Object::Reference(widget)],
        });
        let top = doc.add_object(dictionary! { "T" => text_string("Name") });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "AcroForm" => dictionary! {
                "Fields" => vec![Object::Reference(parent), Object::Reference(top)],
            },
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let names = existing_field_names(&doc);
        assert_eq!(names, vec!["address", "address.street", "Name"]);
    }

    #[test]
    fn test_no_form_has_no_names() {
        let doc = document_with_form(Object::Null);
        assert!(existing_field_names(&doc).is_empty());
    }

    #[test]
    fn test_open_promotes_inline_form() {
        let mut doc = document_with_form(Object::Dictionary(dictionary! {
            "Fields" => Object::Array(vec![]),
            "SigFlags" => 0,
        }));

        let ctx = FormContext::open(&mut doc).unwrap();
        let form = doc.get_dictionary(ctx.acroform_id()).unwrap();
        assert!(form.has(b"SigFlags"));
        assert!(form.has(b"DA"));
        assert!(matches!(form.get(b"Fields"), Ok(Object::Reference(_))));
    }

    #[test]
    fn test_font_is_registered_once() {
        let mut doc = document_with_form(Object::Null);
        let mut ctx = FormContext::open(&mut doc).unwrap();

        let first = ctx.helvetica(&mut doc).unwrap();
        let second = ctx.helvetica(&mut doc).unwrap();
        assert_eq!(first, second);

        let fonts = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| matches!(d.get(b"Type"), Ok(Object::Name(n)) if n == b"Font"))
            .count();
        assert_eq!(fonts, 1);
    }

    #[test]
    fn test_existing_font_resource_is_reused() {
        let mut doc = Document::with_version("1.7");
        let helv = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut form = Dictionary::new();
        form.set("DR", dictionary! { "Font" => dictionary! { "Helv" => helv } });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "AcroForm" => form,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut ctx = FormContext::open(&mut doc).unwrap();
        assert_eq!(ctx.helvetica(&mut doc).unwrap().id, helv);
    }

    #[test]
    fn test_inline_font_resource_is_promoted() {
        let mut doc = Document::with_version("1.7");
        let mut form = Dictionary::new();
        form.set(
            "DR",
            dictionary! {
                "Font" => dictionary! {
                    "Helv" => dictionary! {
                        "Type" => "Font",
                        "Subtype" => "Type1",
                        "BaseFont" => "Helvetica-Custom",
                    },
                },
            },
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "AcroForm" => form,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut ctx = FormContext::open(&mut doc).unwrap();
        let font = ctx.helvetica(&mut doc).unwrap();

        let promoted = doc.get_dictionary(font.id).unwrap();
        assert_eq!(
            promoted.get(b"BaseFont").unwrap().as_name().unwrap(),
            b"Helvetica-Custom"
        );
        // 第二次调用复用同一对象
        assert_eq!(ctx.helvetica(&mut doc).unwrap().id, font.id);

        let dr_id = doc
            .get_dictionary(ctx.acroform_id())
            .unwrap()
            .get(b"DR")
            .unwrap()
            .as_reference()
            .unwrap();
        let fonts_id = doc
            .get_dictionary(dr_id)
            .unwrap()
            .get(b"Font")
            .unwrap()
            .as_reference()
            .unwrap();
        let fonts = doc.get_dictionary(fonts_id).unwrap();
        assert_eq!(fonts.get(b"Helv").unwrap().as_reference().unwrap(), font.id);
    }

    #[test]
    fn test_missing_catalog_is_an_error() {
        let mut doc = Document::with_version("1.7");
        assert!(FormContext::open(&mut doc).is_err());
    }
}
