use std::f64::consts::{FRAC_PI_2, PI, TAU};

use cadraster_core::document::{
    Dimension, DimensionKind, Document, Ellipse, Entity, HorizontalAnchor, MText, Polyline,
    RasterImage, Text, VerticalAnchor,
};
use cadraster_core::geometry::{Bounds2D, Point2};
use glam::DVec2;
use tracing::debug;

use crate::curves::ellipse_sweep;
use crate::dispatch::should_draw;
use crate::options::RenderOptions;

/// 范围提示的可信窗口。
const HINT_LIMIT: f64 = 5999.0;
const TEXT_WIDTH_FACTOR: f64 = 0.6;
const MTEXT_LINE_WIDTH_FACTOR: f64 = 0.7;

/// 计算文档范围：优先使用可信的范围提示，否则合并全部可绘制实体的范围。
/// 没有任何实体贡献范围时退回到画布大小的矩形。
pub fn document_bounds(document: &Document, options: &RenderOptions) -> Bounds2D {
    if !options.force_recompute_bounds {
        if let Some(hint) = document.extent_hint() {
            if is_reasonable_hint(&hint) {
                debug!(
                    min_x = hint.min().x(),
                    min_y = hint.min().y(),
                    max_x = hint.max().x(),
                    max_y = hint.max().y(),
                    "使用文档范围提示"
                );
                return hint;
            }
        }
    }

    let mut bounds = Bounds2D::empty();
    for (_, entity) in document.entities() {
        if !should_draw(entity, document, options) {
            continue;
        }
        if let Some(entity_bounds) = entity_bounds(entity) {
            bounds.include_bounds(&entity_bounds);
        }
    }

    if is_degenerate(&bounds) {
        debug!("文档范围为空，退回画布大小");
        return fallback_bounds(options);
    }
    bounds
}

/// 画布大小的兜底范围。
pub fn fallback_bounds(options: &RenderOptions) -> Bounds2D {
    Bounds2D::from_origin_size(0.0, 0.0, options.canvas_width(), options.canvas_height())
}

/// 提示范围需位于 ±5999 窗口内，且不能是原点附近的默认小范围。
pub fn is_reasonable_hint(hint: &Bounds2D) -> bool {
    let (min, max) = (hint.min(), hint.max());
    let in_window = min.x() > -HINT_LIMIT
        && min.y() > -HINT_LIMIT
        && max.x() < HINT_LIMIT
        && max.y() < HINT_LIMIT;
    let near_origin_default = min.x() == 0.0 && min.y() == 0.0 && max.x() < 100.0 && max.y() < 100.0;
    in_window && !near_origin_default && !is_degenerate(hint)
}

fn is_degenerate(bounds: &Bounds2D) -> bool {
    if bounds.is_empty() {
        return true;
    }
    let finite = bounds.min().as_vec2().is_finite() && bounds.max().as_vec2().is_finite();
    !finite || (bounds.width() <= 0.0 && bounds.height() <= 0.0)
}

/// 单个实体的范围；没有范围规则的实体返回 None。
pub fn entity_bounds(entity: &Entity) -> Option<Bounds2D> {
    match entity {
        Entity::Line(line) => Bounds2D::from_points([line.start, line.end]),
        Entity::Circle(circle) => Some(circle_bounds(circle.center, circle.radius)),
        Entity::Arc(arc) => Some(arc_bounds(
            arc.center,
            arc.radius,
            arc.start_angle,
            arc.end_angle,
        )),
        Entity::Ellipse(ellipse) => Some(ellipse_bounds(ellipse)),
        Entity::Polyline(polyline) => polyline_bounds(polyline),
        Entity::Text(text) => Some(text_bounds(text)),
        Entity::MText(mtext) => mtext_bounds(mtext),
        Entity::Dimension(dimension) => dimension_bounds(dimension),
        Entity::RasterImage(image) => Some(image_bounds(image)),
        _ => None,
    }
}

fn circle_bounds(center: Point2, radius: f64) -> Bounds2D {
    let r = radius.abs();
    Bounds2D::new(
        Point2::new(center.x() - r, center.y() - r),
        Point2::new(center.x() + r, center.y() + r),
    )
}

#[inline]
fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// `angle` 是否落在从 `start` 逆时针扫到 `end` 的范围内（含端点，处理跨 0）。
pub fn angle_in_range(angle: f64, start: f64, end: f64) -> bool {
    let angle = normalize_angle(angle);
    let start = normalize_angle(start);
    let end = normalize_angle(end);
    if end < start {
        angle >= start || angle <= end
    } else {
        angle >= start && angle <= end
    }
}

/// 圆弧范围：端点加上落在扫掠范围内的四个轴向关键角。
pub fn arc_bounds(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Bounds2D {
    let mut bounds = Bounds2D::empty();
    bounds.include_point(Point2::polar(center, radius, start_angle));
    bounds.include_point(Point2::polar(center, radius, end_angle));
    for key in [0.0, FRAC_PI_2, PI, 1.5 * PI] {
        if angle_in_range(key, start_angle, end_angle) {
            bounds.include_point(Point2::polar(center, radius, key));
        }
    }
    bounds
}

fn ellipse_point(center: DVec2, a: f64, b: f64, rotation: f64, t: f64) -> Point2 {
    let local = DVec2::new(a * t.cos(), b * t.sin());
    Point2::from_vec(center + DVec2::from_angle(rotation).rotate(local))
}

/// 旋转完整椭圆的半宽与半高。
pub fn rotated_ellipse_extent(a: f64, b: f64, rotation: f64) -> DVec2 {
    let (sin, cos) = rotation.sin_cos();
    DVec2::new(
        ((a * cos).powi(2) + (b * sin).powi(2)).sqrt(),
        ((a * sin).powi(2) + (b * cos).powi(2)).sqrt(),
    )
}

fn ellipse_bounds(ellipse: &Ellipse) -> Bounds2D {
    let center = ellipse.center.as_vec2();
    let a = ellipse.semi_major();
    let b = ellipse.semi_minor();
    let rotation = ellipse.rotation();

    if ellipse.is_full() {
        let half = rotated_ellipse_extent(a, b, rotation);
        return Bounds2D::new(
            Point2::from_vec(center - half),
            Point2::from_vec(center + half),
        );
    }

    let start = ellipse.start_parameter;
    let sweep = ellipse_sweep(start, ellipse.end_parameter);
    let (sin, cos) = rotation.sin_cos();

    let mut bounds = Bounds2D::empty();
    bounds.include_point(ellipse_point(center, a, b, rotation, start));
    bounds.include_point(ellipse_point(center, a, b, rotation, start + sweep));

    // 关键参数：x、y 分量导数为零处，随旋转角偏移。
    let x_extreme = (-b * sin).atan2(a * cos);
    let y_extreme = (b * cos).atan2(a * sin);
    for key in [x_extreme, x_extreme + PI, y_extreme, y_extreme + PI] {
        let relative = (key - start).rem_euclid(TAU);
        if relative <= sweep {
            bounds.include_point(ellipse_point(center, a, b, rotation, key));
        }
    }
    bounds
}

fn polyline_bounds(polyline: &Polyline) -> Option<Bounds2D> {
    let bounds = Bounds2D::from_points(polyline.vertices.iter().map(|vertex| vertex.position))?;
    let (min, max) = (bounds.min(), bounds.max());
    if min == max {
        return Some(Bounds2D::from_origin_size(min.x() - 0.5, min.y() - 0.5, 1.0, 1.0));
    }
    Some(Bounds2D::from_origin_size(
        min.x(),
        min.y(),
        bounds.width().max(0.1),
        bounds.height().max(0.1),
    ))
}

fn anchor_shift(horizontal: HorizontalAnchor, vertical: VerticalAnchor, width: f64, height: f64) -> DVec2 {
    let dx = match horizontal {
        HorizontalAnchor::Left => 0.0,
        HorizontalAnchor::Center => -width / 2.0,
        HorizontalAnchor::Right => -width,
    };
    let dy = match vertical {
        VerticalAnchor::Top => -height,
        VerticalAnchor::Middle => -height / 2.0,
        VerticalAnchor::Bottom => 0.0,
    };
    DVec2::new(dx, dy)
}

/// 单行文字范围：宽度按字符数 × 0.6 × 字高估算，四周留 5% 字高。
pub fn text_bounds(text: &Text) -> Bounds2D {
    let height = text.height;
    let width = height * text.content.chars().count() as f64 * TEXT_WIDTH_FACTOR;
    let origin = text.insert.as_vec2()
        + anchor_shift(
            text.alignment.horizontal(),
            text.alignment.vertical(),
            width,
            height,
        );
    let margin = height * 0.05;
    Bounds2D::from_origin_size(
        origin.x - margin,
        origin.y - margin,
        width + margin * 2.0,
        height + margin * 2.0,
    )
}

/// 多行文字范围：显式换行数与按宽度估算的行数取较大者，四周留 50% 总高。
pub fn mtext_bounds(mtext: &MText) -> Option<Bounds2D> {
    if mtext.content.is_empty() {
        return None;
    }
    let line_height = mtext.height;
    let explicit_lines: Vec<&str> = mtext.content.split("\\P").collect();
    let lines_from_breaks = explicit_lines.len();

    let (width, lines_from_width) = if mtext.rectangle_width > 0.0 {
        let chars = mtext.content.replace("\\P", "").chars().count() as f64;
        let total_width = chars * line_height;
        let width = mtext.rectangle_width.min(total_width);
        let lines = if width > 0.0 {
            (total_width / width).ceil() as usize
        } else {
            1
        };
        (width, lines)
    } else {
        let widest = explicit_lines
            .iter()
            .map(|line| line_height * line.chars().count() as f64 * MTEXT_LINE_WIDTH_FACTOR)
            .fold(0.0_f64, f64::max);
        (widest.max(line_height * 3.0), lines_from_breaks)
    };

    let lines = lines_from_breaks.max(lines_from_width);
    let height = line_height * lines as f64;
    let origin = mtext.insert.as_vec2()
        + anchor_shift(
            mtext.attachment.horizontal(),
            mtext.attachment.vertical(),
            width,
            height,
        );
    let margin = height * 0.5;
    Some(Bounds2D::from_origin_size(
        origin.x - margin,
        origin.y - margin,
        width + margin * 2.0,
        height + margin * 2.0,
    ))
}

/// 只有线性与对齐标注参与范围计算。
fn dimension_bounds(dimension: &Dimension) -> Option<Bounds2D> {
    match &dimension.kind {
        DimensionKind::Linear { first, second, .. }
        | DimensionKind::Aligned { first, second, .. } => {
            Bounds2D::from_points([*first, *second, dimension.text_reference])
        }
        _ => None,
    }
}

/// 图像四角（左下、右下、右上、左上），按旋转角绕插入点旋转。
pub fn image_corners(image: &RasterImage) -> [Point2; 4] {
    let origin = image.position.as_vec2();
    let axis = DVec2::from_angle(image.rotation);
    let corner = |local: DVec2| Point2::from_vec(origin + axis.rotate(local));
    [
        corner(DVec2::ZERO),
        corner(DVec2::new(image.width, 0.0)),
        corner(DVec2::new(image.width, image.height)),
        corner(DVec2::new(0.0, image.height)),
    ]
}

fn image_bounds(image: &RasterImage) -> Bounds2D {
    if image.rotation.abs() <= 1e-3_f64.to_radians() {
        return Bounds2D::from_origin_size(
            image.position.x(),
            image.position.y(),
            image.width,
            image.height,
        );
    }
    let mut bounds = Bounds2D::empty();
    for corner in image_corners(image) {
        bounds.include_point(corner);
    }
    bounds
}
