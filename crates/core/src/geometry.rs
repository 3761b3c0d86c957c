//! 参考像素空间到 PDF 点空间的坐标转换
//!
//! 编辑器以 800 像素宽渲染页面，原点在左上角；PDF 原点在左下角。

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// 编辑器渲染页面时使用的固定宽度
pub const REFERENCE_WIDTH: f64 = 800.0;

/// 参考像素空间中的矩形（左上角原点）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// PDF 点空间中的矩形（左下角原点）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PointRect {
    /// `[llx lly urx ury]`，即 /Rect 的顺序
    pub fn corners(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// 由 /Rect 数组还原，允许两个角点任意顺序
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }
}

/// 页面的 MediaBox
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            llx: 0.0,
            lly: 0.0,
            width,
            height,
        }
    }

    /// 由 `[llx lly urx ury]` 构造
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            llx: x1.min(x2),
            lly: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }
}

/// 单个页面的转换参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    page: PageBox,
    scale: f64,
}

impl PageTransform {
    pub fn new(page: PageBox) -> Result<Self> {
        if !page.width.is_finite() || page.width <= 0.0 || !page.height.is_finite() {
            return Err(CoreError::InvalidPage(page.width));
        }
        Ok(Self {
            page,
            scale: page.width / REFERENCE_WIDTH,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn page(&self) -> PageBox {
        self.page
    }

    /// 像素矩形 → 点空间矩形，Y 轴翻转
    pub fn to_points(&self, rect: &PixelRect) -> Result<PointRect> {
        let values = [rect.x, rect.y, rect.w, rect.h];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::NonFinite);
        }

        let sx = rect.x * self.scale;
        let sy = rect.y * self.scale;
        let sw = rect.w * self.scale;
        let sh = rect.h * self.scale;

        if sw <= 0.0 || sh <= 0.0 {
            return Err(CoreError::Degenerate {
                width: sw,
                height: sh,
            });
        }

        Ok(PointRect {
            x: self.page.llx + sx,
            y: self.page.lly + self.page.height - sy - sh,
            width: sw,
            height: sh,
        })
    }

    /// 编辑器中的像素字号按同一比例缩放
    pub fn font_size(&self, pixels: f64) -> f64 {
        pixels * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity_scale_inverts_y() {
        let t = PageTransform::new(PageBox::new(800.0, 1000.0)).unwrap();
        let r = t
            .to_points(&PixelRect {
                x: 100.0,
                y: 50.0,
                w: 160.0,
                h: 30.0,
            })
            .unwrap();

        assert!(approx(r.x, 100.0));
        assert!(approx(r.y, 1000.0 - 50.0 - 30.0));
        assert!(approx(r.width, 160.0));
        assert!(approx(r.height, 30.0));
    }

    #[test]
    fn test_letter_page_scaling() {
        let t = PageTransform::new(PageBox::new(612.0, 792.0)).unwrap();
        let rect = PixelRect {
            x: 40.0,
            y: 120.0,
            w: 200.0,
            h: 24.0,
        };
        let r = t.to_points(&rect).unwrap();
        let s = 612.0 / 800.0;

        assert!(approx(t.scale(), s));
        assert!(approx(r.x, 40.0 * s));
        assert!(approx(r.y, 792.0 - 120.0 * s - 24.0 * s));
        assert!(approx(r.width, 200.0 * s));
        assert!(approx(r.height, 24.0 * s));
        assert!(approx(t.font_size(11.0), 11.0 * s));
    }

    #[test]
    fn test_offset_media_box() {
        let t = PageTransform::new(PageBox::from_corners(10.0, 20.0, 810.0, 1020.0)).unwrap();
        let r = t
            .to_points(&PixelRect {
                x: 0.0,
                y: 0.0,
                w: 10.0,
                h: 10.0,
            })
            .unwrap();

        assert!(approx(r.x, 10.0));
        assert!(approx(r.y, 20.0 + 1000.0 - 10.0));
    }

    #[test]
    fn test_rejects_degenerate_rect() {
        let t = PageTransform::new(PageBox::new(800.0, 1000.0)).unwrap();
        let err = t
            .to_points(&PixelRect {
                x: 0.0,
                y: 0.0,
                w: 0.0,
                h: 10.0,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Degenerate { .. }));

        let err = t
            .to_points(&PixelRect {
                x: f64::NAN,
                y: 0.0,
                w: 5.0,
                h: 10.0,
            })
            .unwrap_err();
        assert_eq!(err, CoreError::NonFinite);
    }

    #[test]
    fn test_rejects_zero_width_page() {
        assert!(PageTransform::new(PageBox::new(0.0, 792.0)).is_err());
    }

    #[test]
    fn test_corners_round_trip() {
        let r = PointRect::from_corners(50.0, 700.0, 10.0, 680.0);
        assert_eq!(r.corners(), [10.0, 680.0, 50.0, 700.0]);
    }
}
