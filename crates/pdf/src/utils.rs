//! lopdf 辅助函数

use formforge_core::PageBox;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::PdfError;

/// 页面树继承链的最大深度，防止循环引用
const MAX_INHERIT_DEPTH: usize = 32;

/// 获取文档 Catalog 的 ObjectId
pub fn get_catalog_id(doc: &Document) -> Result<ObjectId, PdfError> {
    match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => Ok(*id),
        _ => Err(PdfError::Structure("document has no catalog".to_string())),
    }
}

/// 按顺序返回所有页面的 ObjectId
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Integer 或 Real 转为 f64
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// 如果是引用则解引用
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// 从数组对象中提取四个坐标
pub fn extract_box_values(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = match resolve(doc, obj) {
        Object::Array(arr) => arr,
        _ => return None,
    };
    let values: Vec<f64> = arr.iter().filter_map(|o| number(resolve(doc, o))).collect();
    if values.len() == 4 {
        Some([values[0], values[1], values[2], values[3]])
    } else {
        None
    }
}

/// 获取页面 MediaBox，沿 Parent 链向上继承
///
/// 找不到时使用 Letter 尺寸
pub fn get_page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        if depth >= MAX_INHERIT_DEPTH {
            break;
        }
        depth += 1;

        let dict = match doc.get_dictionary(id) {
            Ok(dict) => dict,
            Err(_) => break,
        };
        if let Some([x1, y1, x2, y2]) = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| extract_box_values(doc, obj))
        {
            return PageBox::from_corners(x1, y1, x2, y2);
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => Some(*parent),
            _ => None,
        };
    }

    log::warn!("[MediaBox] 页面 {:?} 没有 MediaBox，使用默认 Letter 尺寸", page_id);
    PageBox::new(612.0, 792.0)
}

/// 收集数组（或指向数组的引用）中的所有引用
pub fn reference_ids(doc: &Document, obj: &Object) -> Vec<ObjectId> {
    match resolve(doc, obj) {
        Object::Array(arr) => arr
            .iter()
            .filter_map(|o| match o {
                Object::Reference(id) => Some(*id),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// 字典中某个数组项的存放方式
enum ArraySlot {
    Missing,
    Inline,
    Indirect(ObjectId),
}

fn array_slot(doc: &Document, holder: ObjectId, key: &[u8]) -> Result<ArraySlot, PdfError> {
    match doc.get_dictionary(holder)?.get(key) {
        Err(_) => Ok(ArraySlot::Missing),
        Ok(Object::Array(_)) => Ok(ArraySlot::Inline),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(_)) => Ok(ArraySlot::Indirect(*id)),
            _ => Err(PdfError::Structure(format!(
                "/{} of {:?} does not reference an array",
                String::from_utf8_lossy(key),
                holder
            ))),
        },
        Ok(_) => Err(PdfError::Structure(format!(
            "/{} of {:?} is not an array",
            String::from_utf8_lossy(key),
            holder
        ))),
    }
}

/// 检查能否向 `holder[key]` 数组追加引用
pub fn check_reference_array(doc: &Document, holder: ObjectId, key: &[u8]) -> Result<(), PdfError> {
    array_slot(doc, holder, key).map(|_| ())
}

/// 向 `holder[key]` 数组追加一个引用，数组不存在时创建
pub fn push_reference(
    doc: &mut Document,
    holder: ObjectId,
    key: &[u8],
    target: ObjectId,
) -> Result<(), PdfError> {
    match array_slot(doc, holder, key)? {
        ArraySlot::Missing => {
            doc.get_dictionary_mut(holder)?
                .set(key, vec![Object::Reference(target)]);
        }
        ArraySlot::Inline => {
            doc.get_dictionary_mut(holder)?
                .get_mut(key)?
                .as_array_mut()?
                .push(Object::Reference(target));
        }
        ArraySlot::Indirect(id) => {
            doc.get_object_mut(id)?
                .as_array_mut()?
                .push(Object::Reference(target));
        }
    }
    Ok(())
}

/// 从 `holder[key]` 数组中移除一个引用
pub fn remove_reference(doc: &mut Document, holder: ObjectId, key: &[u8], target: ObjectId) {
    let slot = match array_slot(doc, holder, key) {
        Ok(slot) => slot,
        Err(_) => return,
    };
    let arr = match slot {
        ArraySlot::Missing => return,
        ArraySlot::Inline => doc
            .get_dictionary_mut(holder)
            .and_then(|dict| dict.get_mut(key))
            .and_then(|obj| obj.as_array_mut()),
        ArraySlot::Indirect(id) => doc.get_object_mut(id).and_then(|obj| obj.as_array_mut()),
    };
    if let Ok(arr) = arr {
        arr.retain(|o| !matches!(o, Object::Reference(id) if *id == target));
    }
}

/// 返回 `holder[key]` 字典的 ObjectId
///
/// 内联字典会被提升为间接对象，缺失时创建空字典
pub fn indirect_dictionary(
    doc: &mut Document,
    holder: ObjectId,
    key: &[u8],
) -> Result<ObjectId, PdfError> {
    let inline = match doc.get_dictionary(holder)?.get(key) {
        Ok(Object::Reference(id)) => {
            if doc.get_dictionary(*id).is_ok() {
                return Ok(*id);
            }
            log::warn!(
                "[Form] /{} 引用无效 ({:?})，重新创建",
                String::from_utf8_lossy(key),
                id
            );
            Dictionary::new()
        }
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let id = doc.add_object(inline);
    doc.get_dictionary_mut(holder)?.set(key, Object::Reference(id));
    Ok(id)
}

/// 返回 `holder[key]` 数组的 ObjectId，规则同 [`indirect_dictionary`]
pub fn indirect_array(doc: &mut Document, holder: ObjectId, key: &[u8]) -> Result<ObjectId, PdfError> {
    let inline = match doc.get_dictionary(holder)?.get(key) {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(_)) => return Ok(*id),
            _ => Vec::new(),
        },
        Ok(Object::Array(arr)) => arr.clone(),
        _ => Vec::new(),
    };

    let id = doc.add_object(Object::Array(inline));
    doc.get_dictionary_mut(holder)?.set(key, Object::Reference(id));
    Ok(id)
}

/// 编码为 PDF 文本字符串：ASCII 直接写入，其余使用带 BOM 的 UTF-16BE
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// 解码 PDF 文本字符串
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|b| *b as char).collect()
    }
}

/// 读取字典中的文本字符串项
pub fn get_text(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match resolve(doc, dict.get(key).ok()?) {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// 数字格式化：最多三位小数，去掉多余的 0
pub fn format_number(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
