use cadraster_core::geometry::{Bounds2D, Point2};
use glam::{DAffine2, DVec2};

use crate::options::RenderOptions;

/// 裁剪后额外保留的底部像素，避免贴边文字被截断。
const CROP_SLACK: i64 = 30;

/// 视图变换：`mapped = document * scale + offset`，Y 轴翻转由表面初始变换完成。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale: f64,
    pub offset: DVec2,
    canvas_height: f64,
}

/// 像素裁剪矩形（屏幕坐标，原点在左上角）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewTransform {
    /// 计算将 `bounds` 居中放入去除边距后画布的缩放与偏移。
    pub fn fit(bounds: &Bounds2D, options: &RenderOptions) -> Self {
        let scale_x = options.available_width() / bounds.width();
        let scale_y = options.available_height() / bounds.height();
        let scale = scale_x.min(scale_y);

        let bounds_center = bounds.center().as_vec2();
        let canvas_center = DVec2::new(options.canvas_width() / 2.0, options.canvas_height() / 2.0);
        let offset = canvas_center - bounds_center * scale;

        Self {
            scale,
            offset,
            canvas_height: options.canvas_height(),
        }
    }

    #[inline]
    pub fn map_point(&self, point: Point2) -> DVec2 {
        self.offset + point.as_vec2() * self.scale
    }

    #[inline]
    pub fn inverse_map(&self, mapped: DVec2) -> Point2 {
        Point2::from_vec((mapped - self.offset) / self.scale)
    }

    /// 表面初始变换：先按 (1, -1) 缩放，再平移画布高度，使文档 Y 轴朝上。
    pub fn surface_setup(&self) -> DAffine2 {
        DAffine2::from_scale(DVec2::new(1.0, -1.0))
            * DAffine2::from_translation(DVec2::new(0.0, -self.canvas_height))
    }

    /// 映射坐标转换为屏幕像素坐标。
    #[inline]
    pub fn to_screen(&self, mapped: DVec2) -> DVec2 {
        self.surface_setup().transform_point2(mapped)
    }

    /// 屏幕像素坐标还原为文档坐标。
    pub fn screen_to_document(&self, screen: DVec2) -> Point2 {
        let mapped = self.surface_setup().inverse().transform_point2(screen);
        self.inverse_map(mapped)
    }

    /// 计算裁剪去空白边后的区域；区域无效时返回 None。
    pub fn crop_rect(&self, bounds: &Bounds2D, options: &RenderOptions) -> Option<CropRect> {
        let scaled_width = bounds.width() * self.scale;
        let scaled_height = bounds.height() * self.scale;

        let start_x = (options.margin + (options.available_width() - scaled_width) / 2.0).max(options.margin);
        let start_y = (options.margin + (options.available_height() - scaled_height) / 2.0).max(options.margin);

        let crop_x = start_x.floor() as i64;
        let crop_y = start_y.floor() as i64;
        let canvas_w = i64::from(options.width);
        let canvas_h = i64::from(options.height);

        let crop_width = (scaled_width.ceil() as i64).min(canvas_w - crop_x);
        let crop_height = ((scaled_height.ceil() as i64).min(canvas_h - crop_y) + CROP_SLACK)
            .min(canvas_h - crop_y);

        if crop_x < 0 || crop_y < 0 || crop_width <= 0 || crop_height <= 0 {
            return None;
        }

        Some(CropRect {
            x: crop_x as u32,
            y: crop_y as u32,
            width: crop_width as u32,
            height: crop_height as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RenderOptions {
        RenderOptions::default()
    }

    #[test]
    fn fit_uses_smaller_axis_scale() {
        let bounds = Bounds2D::from_origin_size(0.0, 0.0, 1000.0, 500.0);
        let view = ViewTransform::fit(&bounds, &options());
        assert!((view.scale - 1.16).abs() < 1e-9);

        let min = view.map_point(bounds.min());
        let max = view.map_point(bounds.max());
        assert!(((min.x + max.x) / 2.0 - 600.0).abs() < 1e-9);
        assert!(((min.y + max.y) / 2.0 - 800.0).abs() < 1e-9);
        assert!((min.x - 20.0).abs() < 1e-9);
    }

    #[test]
    fn map_and_inverse_round_trip() {
        let bounds = Bounds2D::from_origin_size(-37.5, 12.25, 310.0, 95.0);
        let view = ViewTransform::fit(&bounds, &options());
        for point in [
            Point2::new(-37.5, 12.25),
            Point2::new(100.125, 50.5),
            Point2::new(1e4, -3e3),
        ] {
            let back = view.inverse_map(view.map_point(point));
            assert!((back.x() - point.x()).abs() < 1e-9);
            assert!((back.y() - point.y()).abs() < 1e-9);

            let screen = view.to_screen(view.map_point(point));
            let restored = view.screen_to_document(screen);
            assert!((restored.x() - point.x()).abs() < 1e-9);
            assert!((restored.y() - point.y()).abs() < 1e-9);
        }
    }

    #[test]
    fn document_y_up_becomes_screen_y_down() {
        let bounds = Bounds2D::from_origin_size(0.0, 0.0, 100.0, 100.0);
        let view = ViewTransform::fit(&bounds, &options());
        let low = view.to_screen(view.map_point(Point2::new(0.0, 0.0)));
        let high = view.to_screen(view.map_point(Point2::new(0.0, 100.0)));
        assert!(high.y < low.y);
    }

    #[test]
    fn crop_rect_trims_to_scaled_bounds_with_slack() {
        let bounds = Bounds2D::from_origin_size(0.0, 0.0, 1000.0, 500.0);
        let opts = options();
        let view = ViewTransform::fit(&bounds, &opts);
        let crop = view.crop_rect(&bounds, &opts).expect("crop");
        assert_eq!(crop.x, 20);
        assert!((i64::from(crop.width) - 1160).abs() <= 1);
        assert!((i64::from(crop.y) - 510).abs() <= 1);
        assert!((i64::from(crop.height) - (580 + 30)).abs() <= 1);
    }

    #[test]
    fn crop_height_is_clamped_to_canvas() {
        let bounds = Bounds2D::from_origin_size(0.0, 0.0, 100.0, 1000.0);
        let opts = options();
        let view = ViewTransform::fit(&bounds, &opts);
        let crop = view.crop_rect(&bounds, &opts).expect("crop");
        assert!(crop.y + crop.height <= opts.height);
    }
}
