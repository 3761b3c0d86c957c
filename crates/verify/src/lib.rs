//! Post-processing verification of generated form fields.
//!
//! Lists every terminal AcroForm field of a document and flags the problems
//! viewers tend to trip over: duplicate names, names with trailing spaces and
//! widgets without a normal appearance.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use formforge_pdf::utils::{extract_box_values, get_catalog_id, get_text, page_ids, reference_ids};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use thiserror::Error;

const MAX_FIELD_DEPTH: usize = 32;
const REPORT_RULE_WIDTH: usize = 50;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse document: {0}")]
    Load(#[from] lopdf::Error),
}

/// 单个终端字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    /// 全名（`父.子`）
    pub name: String,
    /// /FT，可能继承自父字段
    pub kind: Option<String>,
    pub required: bool,
    /// 第一个控件所在页（从 0 开始）
    pub page: Option<usize>,
    pub rect: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub fields: Vec<FieldInfo>,
    pub warnings: Vec<String>,
}

/// 从父字段继承的属性
#[derive(Clone, Default)]
struct Inherited {
    name: Option<String>,
    kind: Option<String>,
    flags: i64,
}

struct Walker<'a> {
    doc: &'a Document,
    pages: HashMap<ObjectId, usize>,
    annot_pages: HashMap<ObjectId, usize>,
    visited: HashSet<ObjectId>,
    fields: Vec<FieldInfo>,
    warnings: Vec<String>,
}

impl<'a> Walker<'a> {
    fn new(doc: &'a Document) -> Self {
        let ids = page_ids(doc);
        let mut annot_pages = HashMap::new();
        for (index, page_id) in ids.iter().enumerate() {
            if let Ok(annots) = doc.get_dictionary(*page_id).and_then(|page| page.get(b"Annots")) {
                for annot in reference_ids(doc, annots) {
                    annot_pages.entry(annot).or_insert(index);
                }
            }
        }

        Self {
            doc,
            pages: ids.into_iter().enumerate().map(|(i, id)| (id, i)).collect(),
            annot_pages,
            visited: HashSet::new(),
            fields: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn page_of(&self, widget_id: ObjectId, widget: &Dictionary) -> Option<usize> {
        if let Ok(Object::Reference(page)) = widget.get(b"P") {
            if let Some(index) = self.pages.get(page) {
                return Some(*index);
            }
        }
        self.annot_pages.get(&widget_id).copied()
    }

    fn walk(&mut self, field_id: ObjectId, parent: &Inherited, depth: usize) {
        if depth > MAX_FIELD_DEPTH || !self.visited.insert(field_id) {
            return;
        }
        let doc = self.doc;
        let dict = match doc.get_dictionary(field_id) {
            Ok(dict) => dict,
            Err(_) => {
                self.warnings.push(format!("field {:?} is not a dictionary", field_id));
                return;
            }
        };

        let partial = get_text(doc, dict, b"T");
        let current = Inherited {
            name: match (&parent.name, &partial) {
                (Some(p), Some(t)) => Some(format!("{}.{}", p, t)),
                (None, Some(t)) => Some(t.clone()),
                (p, None) => p.clone(),
            },
            kind: match dict.get(b"FT") {
                Ok(Object::Name(ft)) => Some(String::from_utf8_lossy(ft).into_owned()),
                _ => parent.kind.clone(),
            },
            flags: dict
                .get(b"Ff")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(parent.flags),
        };

        let kids = dict
            .get(b"Kids")
            .map(|kids| reference_ids(doc, kids))
            .unwrap_or_default();
        let child_fields: Vec<ObjectId> = kids
            .iter()
            .copied()
            .filter(|kid| {
                doc.get_dictionary(*kid)
                    .map(|d| d.has(b"T"))
                    .unwrap_or(false)
            })
            .collect();

        if !child_fields.is_empty() {
            for kid in child_fields {
                self.walk(kid, &current, depth + 1);
            }
            return;
        }

        // 终端字段：自身即控件，或所有子节点都是控件
        let widgets = if kids.is_empty() { vec![field_id] } else { kids };
        let name = current.name.clone().unwrap_or_default();
        let mut info = FieldInfo {
            name: name.clone(),
            kind: current.kind.clone(),
            required: current.flags & 2 != 0,
            page: None,
            rect: None,
        };

        for widget_id in widgets {
            let widget = match doc.get_dictionary(widget_id) {
                Ok(widget) => widget,
                Err(_) => continue,
            };
            if info.page.is_none() {
                info.page = self.page_of(widget_id, widget);
                info.rect = widget
                    .get(b"Rect")
                    .ok()
                    .and_then(|rect| extract_box_values(doc, rect));
            }
            if !has_normal_appearance(doc, widget) {
                self.warnings
                    .push(format!("field '{}' has no normal appearance", name));
            }
        }

        self.fields.push(info);
    }
}

fn has_normal_appearance(doc: &Document, widget: &Dictionary) -> bool {
    let ap = match widget.get(b"AP") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    // /N 可以是外观流，也可以是按状态分组的外观字典
    let normal = match ap.and_then(|ap| ap.get(b"N").ok()) {
        Some(Object::Reference(id)) => doc.get_object(*id).ok(),
        other => other,
    };
    matches!(normal, Some(Object::Stream(_)) | Some(Object::Dictionary(_)))
}

fn top_level_fields(doc: &Document) -> Vec<ObjectId> {
    let catalog = match get_catalog_id(doc)
        .ok()
        .and_then(|id| doc.get_dictionary(id).ok())
    {
        Some(catalog) => catalog,
        None => return Vec::new(),
    };
    let form = match catalog.get(b"AcroForm") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    form.and_then(|form| form.get(b"Fields").ok())
        .map(|fields| reference_ids(doc, fields))
        .unwrap_or_default()
}

/// 检查已加载的文档
pub fn verify_document(doc: &Document) -> VerifyResult {
    let mut walker = Walker::new(doc);
    for field_id in top_level_fields(doc) {
        walker.walk(field_id, &Inherited::default(), 0);
    }
    let Walker {
        fields,
        mut warnings,
        ..
    } = walker;

    let mut seen = HashSet::new();
    for field in &fields {
        if !seen.insert(field.name.as_str()) {
            warnings.push(format!("duplicate field name '{}'", field.name));
        }
        if field.name.ends_with(' ') {
            warnings.push(format!("field name '{}' ends with a space", field.name));
        }
    }

    log::info!(
        "[Verify] {} 个字段, {} 条警告",
        fields.len(),
        warnings.len()
    );
    VerifyResult {
        ok: warnings.is_empty(),
        fields,
        warnings,
    }
}

pub fn verify_bytes(bytes: &[u8]) -> Result<VerifyResult, VerifyError> {
    let doc = Document::load_mem(bytes)?;
    Ok(verify_document(&doc))
}

pub fn verify_file(path: &Path) -> Result<VerifyResult, VerifyError> {
    let bytes = std::fs::read(path).map_err(|source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    verify_bytes(&bytes)
}

/// 纯文本报告：标题、分隔线、每行一个字段名，警告附在最后
pub fn render_report(source: &str, result: &VerifyResult) -> String {
    let mut out = format!("Verification Report for: {}\n", source);
    out.push_str(&"=".repeat(REPORT_RULE_WIDTH));
    out.push_str("\n\n");

    for field in &result.fields {
        out.push_str(&field.name);
        out.push('\n');
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &result.warnings {
            out.push_str("- ");
            out.push_str(warning);
            out.push('\n');
        }
    }
    out
}
