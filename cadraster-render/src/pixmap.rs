use std::fs;
use std::path::Path;

use glam::{DAffine2, DVec2};
use image::RgbaImage;
use rusttype::{point, OutlineBuilder, Scale};
use tiny_skia::{
    Color, FillRule, FilterQuality, IntRect, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pattern,
    Pixmap, PixmapPaint, Rect, SpreadMode, Stroke, StrokeDash, Transform,
};
use tracing::debug;

use crate::errors::{RenderError, SurfaceError};
use crate::hatch::HatchStyle;
use crate::resources::Rgba;
use crate::surface::{Brush, DrawingSurface, Font, Pen, SurfacePath, TextAlign, TextLayout};
use crate::transform::CropRect;

/// 基于 tiny-skia 的光栅绘图表面；配置 TrueType 字体后才绘制文字。
pub struct PixmapSurface {
    pixmap: Pixmap,
    transform: DAffine2,
    stack: Vec<DAffine2>,
    font: Option<rusttype::Font<'static>>,
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("transform", &self.transform)
            .field("depth", &self.stack.len())
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(width, height).ok_or(RenderError::InvalidCanvas { width, height })?;
        Ok(Self {
            pixmap,
            transform: DAffine2::IDENTITY,
            stack: Vec::new(),
            font: None,
        })
    }

    /// 从文件加载 TrueType 字体；失败时保留原有字体。
    pub fn load_font_file(&mut self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = rusttype::Font::try_from_vec(data).ok_or_else(|| RenderError::InvalidFont {
            path: path.to_path_buf(),
        })?;
        self.font = Some(font);
        Ok(())
    }

    pub fn with_font(mut self, font: rusttype::Font<'static>) -> Self {
        self.font = Some(font);
        self
    }

    #[inline]
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    /// 裁剪出指定区域；区域越界时返回 None。
    pub fn cropped(&self, rect: CropRect) -> Option<Pixmap> {
        let fits_x = rect.x.checked_add(rect.width)? <= self.pixmap.width();
        let fits_y = rect.y.checked_add(rect.height)? <= self.pixmap.height();
        if !fits_x || !fits_y {
            return None;
        }
        let x = i32::try_from(rect.x).ok()?;
        let y = i32::try_from(rect.y).ok()?;
        let area = IntRect::from_xywh(x, y, rect.width, rect.height)?;
        self.pixmap.clone_rect(area)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        encode_png(&self.pixmap)
    }

    fn skia_transform(&self) -> Transform {
        to_skia_transform(self.transform)
    }

    fn fill_skia_path(&mut self, brush: &Brush, path: &tiny_skia::Path, rule: FillRule) -> Result<(), SurfaceError> {
        let transform = self.skia_transform();
        match brush {
            Brush::Solid(color) => {
                let paint = solid_paint(*color);
                self.pixmap.fill_path(path, &paint, rule, transform, None);
            }
            Brush::Hatch {
                style,
                foreground,
                background,
            } => {
                let tile = hatch_tile(*style, *foreground, *background)
                    .ok_or_else(|| SurfaceError::Backend("hatch tile allocation failed".to_string()))?;
                // 点阵对齐设备像素，不随当前变换缩放。
                let inverse = transform.invert().ok_or(SurfaceError::UnsupportedFill)?;
                let mut paint = Paint::default();
                paint.anti_alias = false;
                paint.shader = Pattern::new(
                    tile.as_ref(),
                    SpreadMode::Repeat,
                    FilterQuality::Nearest,
                    1.0,
                    inverse,
                );
                self.pixmap.fill_path(path, &paint, rule, transform, None);
            }
        }
        Ok(())
    }

    fn text_lines(&self, face: &rusttype::Font<'static>, text: &str, scale: Scale, max_width: f64) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            if max_width <= 0.0 {
                lines.push(paragraph.to_string());
                continue;
            }
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if !current.is_empty() && line_width(face, &candidate, scale) > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            lines.push(current);
        }
        lines
    }
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    pixmap
        .encode_png()
        .map_err(|err| RenderError::Encode(err.to_string()))
}

pub fn to_skia_transform(transform: DAffine2) -> Transform {
    let m = transform.matrix2;
    let t = transform.translation;
    Transform::from_row(
        m.x_axis.x as f32,
        m.x_axis.y as f32,
        m.y_axis.x as f32,
        m.y_axis.y as f32,
        t.x as f32,
        t.y as f32,
    )
}

#[inline]
fn skia_color(color: Rgba) -> Color {
    Color::from_rgba8(color.r, color.g, color.b, color.a)
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// 生成 8x8 点阵贴图。
pub fn hatch_tile(style: HatchStyle, foreground: Rgba, background: Rgba) -> Option<Pixmap> {
    let mut tile = Pixmap::new(8, 8)?;
    tile.fill(skia_color(background));
    let mut paint = solid_paint(foreground);
    paint.anti_alias = false;
    for y in 0..8u32 {
        for x in 0..8u32 {
            if style.is_set(x, y) {
                let cell = Rect::from_xywh(x as f32, y as f32, 1.0, 1.0)?;
                tile.fill_rect(cell, &paint, Transform::identity(), None);
            }
        }
    }
    Some(tile)
}

fn build_skia_path(path: &SurfacePath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for figure in path.figures() {
        let mut points = figure.points.iter();
        let first = points.next()?;
        builder.move_to(first.x as f32, first.y as f32);
        for point in points {
            builder.line_to(point.x as f32, point.y as f32);
        }
        if figure.closed {
            builder.close();
        }
    }
    builder.finish()
}

fn skia_stroke(pen: &Pen) -> Stroke {
    let width = pen.width.max(0.0) as f32;
    let dash = pen.dash.as_ref().and_then(|pattern| {
        let unit = width.max(1.0);
        StrokeDash::new(pattern.iter().map(|v| *v as f32 * unit).collect(), 0.0)
    });
    Stroke {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        dash,
        ..Stroke::default()
    }
}

#[inline]
fn align_factor(align: TextAlign) -> f64 {
    match align {
        TextAlign::Near => 0.0,
        TextAlign::Center => 0.5,
        TextAlign::Far => 1.0,
    }
}

fn line_width(face: &rusttype::Font<'static>, line: &str, scale: Scale) -> f64 {
    face.layout(line, scale, point(0.0, 0.0))
        .last()
        .map(|glyph| f64::from(glyph.position().x + glyph.unpositioned().h_metrics().advance_width))
        .unwrap_or(0.0)
}

fn line_height(face: &rusttype::Font<'static>, scale: Scale) -> f64 {
    let metrics = face.v_metrics(scale);
    f64::from(metrics.ascent - metrics.descent + metrics.line_gap)
}

/// 字形轮廓写入 tiny-skia 路径。
struct GlyphPath {
    builder: PathBuilder,
}

impl OutlineBuilder for GlyphPath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

impl DrawingSurface for PixmapSurface {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn clear(&mut self, color: Rgba) {
        self.pixmap.fill(skia_color(color));
    }

    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.stack.pop() {
            self.transform = transform;
        }
    }

    fn transform(&self) -> DAffine2 {
        self.transform
    }

    fn set_transform(&mut self, transform: DAffine2) {
        self.transform = transform;
    }

    fn fill_path(&mut self, brush: &Brush, path: &SurfacePath) -> Result<(), SurfaceError> {
        let skia_path = build_skia_path(path).ok_or(SurfaceError::EmptyPath)?;
        self.fill_skia_path(brush, &skia_path, FillRule::EvenOdd)
    }

    fn stroke_path(&mut self, pen: &Pen, path: &SurfacePath) {
        let Some(skia_path) = build_skia_path(path) else {
            return;
        };
        let paint = solid_paint(pen.color);
        let stroke = skia_stroke(pen);
        let transform = self.skia_transform();
        self.pixmap
            .stroke_path(&skia_path, &paint, &stroke, transform, None);
    }

    fn draw_text(&mut self, text: &str, font: &Font, brush: &Brush, origin: DVec2, layout: &TextLayout) {
        let Some(face) = self.font.as_ref() else {
            debug!(chars = text.chars().count(), "未配置字体，跳过文字");
            return;
        };
        let scale = Scale::uniform(font.size as f32);
        let lines = self.text_lines(face, text, scale, layout.max_width);
        let ascent = f64::from(face.v_metrics(scale).ascent);
        let step = line_height(face, scale);
        let top = origin.y - align_factor(layout.vertical) * step * lines.len() as f64;

        let mut glyphs = GlyphPath {
            builder: PathBuilder::new(),
        };
        for (index, line) in lines.iter().enumerate() {
            let left = origin.x - align_factor(layout.horizontal) * line_width(face, line, scale);
            let baseline = top + ascent + step * index as f64;
            for glyph in face.layout(line, scale, point(left as f32, baseline as f32)) {
                glyph.build_outline(&mut glyphs);
            }
        }
        let Some(path) = glyphs.builder.finish() else {
            return;
        };
        if let Err(err) = self.fill_skia_path(brush, &path, FillRule::Winding) {
            debug!(%err, "文字填充失败");
        }
    }

    fn measure_text(&self, text: &str, font: &Font) -> DVec2 {
        let lines = text.split('\n').count().max(1) as f64;
        match self.font.as_ref() {
            Some(face) => {
                let scale = Scale::uniform(font.size as f32);
                let width = text
                    .split('\n')
                    .map(|line| line_width(face, line, scale))
                    .fold(0.0, f64::max);
                DVec2::new(width, line_height(face, scale) * lines)
            }
            None => {
                let longest = text.split('\n').map(|l| l.chars().count()).max().unwrap_or(0);
                DVec2::new(font.size * 0.6 * longest as f64, font.size * 1.2 * lines)
            }
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, origin: DVec2, size: DVec2) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let mut data = Vec::with_capacity(image.as_raw().len());
        for pixel in image.pixels() {
            let [r, g, b, a] = pixel.0;
            let premultiply = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
            data.extend_from_slice(&[premultiply(r), premultiply(g), premultiply(b), a]);
        }
        let Some(source) = IntSize::from_wh(width, height).and_then(|size| Pixmap::from_vec(data, size)) else {
            debug!(width, height, "图像像素转换失败");
            return;
        };
        let placement = self.transform
            * DAffine2::from_translation(origin)
            * DAffine2::from_scale(DVec2::new(size.x / f64::from(width), size.y / f64::from(height)));
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, to_skia_transform(placement), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_surface() -> PixmapSurface {
        let mut surface = PixmapSurface::new(100, 100).expect("surface");
        surface.clear(Rgba::WHITE);
        surface
    }

    fn red_at(surface: &PixmapSurface, x: u32, y: u32) -> u8 {
        surface.pixmap().pixel(x, y).expect("pixel").red()
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        assert!(matches!(
            PixmapSurface::new(0, 10),
            Err(RenderError::InvalidCanvas { width: 0, height: 10 })
        ));
    }

    #[test]
    fn lines_are_stroked_through_the_transform() {
        let mut surface = white_surface();
        surface.set_transform(DAffine2::from_translation(DVec2::new(0.0, 40.0)));
        let pen = Pen::solid(Rgba::BLACK, 3.0);
        surface.draw_line(&pen, DVec2::new(10.0, 10.0), DVec2::new(90.0, 10.0));
        assert!(red_at(&surface, 50, 50) < 60);
        assert_eq!(red_at(&surface, 50, 10), 255);
    }

    #[test]
    fn pattern_fill_aligns_with_device_pixels() {
        let mut surface = white_surface();
        let brush = Brush::Hatch {
            style: HatchStyle::ForwardDiagonal,
            foreground: Rgba::BLACK,
            background: Rgba::TRANSPARENT,
        };
        surface
            .fill_rectangle(&brush, DVec2::ZERO, DVec2::new(16.0, 16.0))
            .expect("fill");
        assert_eq!(red_at(&surface, 3, 3), 0);
        assert_eq!(red_at(&surface, 4, 3), 255);
        assert_eq!(red_at(&surface, 50, 50), 255);
    }

    #[test]
    fn empty_path_fill_is_an_error() {
        let mut surface = white_surface();
        let result = surface.fill_path(&Brush::Solid(Rgba::BLACK), &SurfacePath::new());
        assert_eq!(result, Err(SurfaceError::EmptyPath));
    }

    #[test]
    fn images_are_scaled_into_place() {
        let mut surface = white_surface();
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        surface.draw_image(&image, DVec2::new(10.0, 10.0), DVec2::new(20.0, 20.0));
        let pixel = surface.pixmap().pixel(20, 20).expect("pixel");
        assert_eq!(pixel.red(), 255);
        assert_eq!(pixel.green(), 0);
        assert_eq!(red_at(&surface, 5, 5), 255);
        let untouched = surface.pixmap().pixel(5, 5).expect("pixel");
        assert_eq!(untouched.green(), 255);
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut surface = white_surface();
        let before = surface.pixmap().data().to_vec();
        surface.draw_text(
            "hello",
            &Font::new(12.0),
            &Brush::Solid(Rgba::BLACK),
            DVec2::new(50.0, 50.0),
            &TextLayout::centered(),
        );
        assert_eq!(surface.pixmap().data(), before.as_slice());
        let size = surface.measure_text("hello", &Font::new(10.0));
        assert!((size.x - 30.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_font_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").expect("write");
        let mut surface = white_surface();
        assert!(matches!(
            surface.load_font_file(&path),
            Err(RenderError::InvalidFont { .. })
        ));
        assert!(matches!(
            surface.load_font_file(dir.path().join("missing.ttf")),
            Err(RenderError::Io { .. })
        ));
        assert!(!surface.has_font());
    }

    #[test]
    fn crop_extracts_region() {
        let surface = white_surface();
        let cropped = surface
            .cropped(CropRect {
                x: 10,
                y: 20,
                width: 30,
                height: 40,
            })
            .expect("crop");
        assert_eq!((cropped.width(), cropped.height()), (30, 40));
        assert!(
            surface
                .cropped(CropRect {
                    x: 90,
                    y: 0,
                    width: 30,
                    height: 10,
                })
                .is_none()
        );
    }

    #[test]
    fn png_encoding_produces_signature() {
        let surface = white_surface();
        let bytes = surface.encode_png().expect("png");
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
