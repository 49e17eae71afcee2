//! 七种标注的几何布局。所有计算在映射坐标（Y 轴向上）中进行，
//! 文字经 [`draw_screen_text`] 转到屏幕空间绘制。

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use cadraster_core::document::{Dimension, DimensionKind, OrdinateAxis};
use cadraster_core::geometry::Point2;
use glam::DVec2;
use tracing::debug;

use crate::dispatch::{draw_arrow, draw_screen_text, DrawContext, DrawOutcome, EntityStyle, SkipReason};
use crate::resources::Rgba;
use crate::surface::{Font, Pen, TextAlign, TextLayout};
use crate::text::{dimension_font_size, dimension_text, resolve_dimension_style, ResolvedDimensionStyle};

const MARKER_RADIUS: f64 = 2.0;
const SHORT_TEXT_CHARS: usize = 6;
const VERTICAL_SINE: f64 = 0.7;
const DIAMETER_PREFIX: &str = "Ø";
const RADIUS_PREFIX: &str = "R";
const DEGREE_SUFFIX: &str = "°";

/// 标注绘制所需的公共状态。
struct DimensionPainter<'s> {
    style: &'s EntityStyle,
    resolved: ResolvedDimensionStyle,
    font: Font,
    scale: f64,
}

impl DimensionPainter<'_> {
    fn pen(&self) -> &Pen {
        &self.style.pen
    }

    fn text(&self, dimension: &Dimension, prefix: &str, suffix: &str) -> String {
        dimension_text(dimension, &self.resolved, dimension.measurement(), prefix, suffix)
    }

    /// 文字相对锚点的额外偏移量。
    fn text_gap(&self) -> f64 {
        (3.0 * self.scale).min(6.0)
    }
}

pub fn draw_dimension(ctx: &mut DrawContext<'_>, dimension: &Dimension, style: &EntityStyle) -> DrawOutcome {
    if !ctx.options.draw_dimensions {
        return DrawOutcome::Skipped(SkipReason::Disabled);
    }
    let resolved = resolve_dimension_style(dimension, ctx.document);
    let scale = ctx.scale();
    let font = ctx.font(dimension_font_size(&resolved, scale)).as_ref().clone();
    let painter = DimensionPainter {
        style,
        resolved,
        font,
        scale,
    };

    match &dimension.kind {
        DimensionKind::Linear {
            first,
            second,
            rotation,
        } => draw_linear(ctx, &painter, dimension, *first, *second, *rotation),
        DimensionKind::Aligned {
            first,
            second,
            dimension_line,
        } => draw_aligned(ctx, &painter, dimension, *first, *second, *dimension_line),
        DimensionKind::Radial { center, .. } => draw_radial(ctx, &painter, dimension, *center),
        DimensionKind::Diametric { center, reference } => {
            draw_diametric(ctx, &painter, dimension, *center, *reference)
        }
        DimensionKind::Angular2Line { .. } => draw_angular(ctx, &painter, dimension),
        DimensionKind::Ordinate { feature, axis, .. } => {
            draw_ordinate(ctx, &painter, dimension, *feature, *axis)
        }
        DimensionKind::ArcLength {
            center,
            radius,
            start_angle,
            end_angle,
            offset,
        } => draw_arc_length(
            ctx,
            &painter,
            dimension,
            *center,
            *radius,
            *start_angle,
            *end_angle,
            *offset,
        ),
    }
}

/// 尺寸界线起点的红色小圆点。
pub fn draw_extension_markers(ctx: &mut DrawContext<'_>, points: &[DVec2]) {
    let brush = ctx.brush(Rgba::RED);
    for point in points {
        if let Err(err) = ctx
            .surface
            .fill_ellipse(&brush, *point, DVec2::splat(MARKER_RADIUS))
        {
            debug!(%err, "尺寸界线标记填充失败");
        }
    }
}

/// 近竖直方向的文字旋转 -90°（屏幕角）。
fn vertical_text_rotation(angle: f64) -> f64 {
    if angle.sin().abs() > VERTICAL_SINE {
        -FRAC_PI_2
    } else {
        0.0
    }
}

#[inline]
fn angle_of(delta: DVec2) -> f64 {
    delta.y.atan2(delta.x)
}

fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU { 0.0 } else { wrapped }
}

fn put_text(
    ctx: &mut DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    text: &str,
    anchor: DVec2,
    rotation: f64,
    layout: TextLayout,
) {
    draw_screen_text(ctx, text, &painter.font, &painter.style.brush, anchor, rotation, layout);
}

fn draw_linear(
    ctx: &mut DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    dimension: &Dimension,
    first: Point2,
    second: Point2,
    rotation: f64,
) -> DrawOutcome {
    // 尺寸线方向由旋转角给出，经过文字参考点。
    let direction = DVec2::from_angle(rotation);
    let normal = direction.perp();
    let reference = dimension.text_reference.as_vec2();
    let p1 = first.as_vec2();
    let p2 = second.as_vec2();
    let end1 = p1 + normal * (reference - p1).dot(normal);
    let end2 = p2 + normal * (reference - p2).dot(normal);

    let start1 = ctx.map(first);
    let start2 = ctx.map(second);
    let end1 = ctx.map(Point2::from_vec(end1));
    let end2 = ctx.map(Point2::from_vec(end2));
    let pen = painter.pen();

    ctx.surface.draw_line(pen, start1, end1);
    ctx.surface.draw_line(pen, start2, end2);
    draw_extension_markers(ctx, &[start1, start2]);
    ctx.surface.draw_line(pen, end1, end2);

    if end1.distance(end2) > 1e-9 {
        let toward_second = angle_of(end2 - end1);
        draw_arrow(ctx, end1, toward_second, pen);
        draw_arrow(ctx, end2, toward_second + PI, pen);
    }

    let text = painter.text(dimension, "", "");
    put_text(
        ctx,
        painter,
        &text,
        (end1 + end2) / 2.0,
        vertical_text_rotation(rotation),
        TextLayout::centered(),
    );
    DrawOutcome::Drawn
}

fn draw_aligned(
    ctx: &mut DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    dimension: &Dimension,
    first: Point2,
    second: Point2,
    dimension_line: Point2,
) -> DrawOutcome {
    let start = ctx.map(first);
    let end = ctx.map(second);
    let Some(direction) = (end - start).try_normalize() else {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    };
    let normal = direction.perp();
    let along = ctx.map(dimension_line);
    let offset = (along - start).dot(normal);
    let end1 = start + normal * offset;
    let end2 = end + normal * offset;
    // 尺寸界线略微越过尺寸线。
    let overshoot = normal * (2.0 * painter.scale * offset.signum());
    let pen = painter.pen();

    ctx.surface.draw_line(pen, start, end1 + overshoot);
    ctx.surface.draw_line(pen, end, end2 + overshoot);
    draw_extension_markers(ctx, &[start, end]);
    ctx.surface.draw_line(pen, end1, end2);

    let angle = angle_of(direction);
    draw_arrow(ctx, end1, angle, pen);
    draw_arrow(ctx, end2, angle + PI, pen);

    let text = painter.text(dimension, "", "");
    put_text(
        ctx,
        painter,
        &text,
        (end1 + end2) / 2.0,
        vertical_text_rotation(angle),
        TextLayout::centered(),
    );
    DrawOutcome::Drawn
}

/// 半径/直径文字锚点：长文字且占线长比例较大时沿径向外移，再整体上移。
fn radial_text_anchor(
    ctx: &DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    text: &str,
    base: DVec2,
    angle: f64,
    line_length: f64,
) -> DVec2 {
    let size = ctx.surface.measure_text(text, &painter.font);
    let gap = painter.text_gap();
    let short = text.chars().count() <= SHORT_TEXT_CHARS;
    let crowded = size.x > 0.3 * line_length || size.y > 0.3 * line_length;
    let mut anchor = base;
    if !short && crowded {
        anchor += DVec2::from_angle(angle) * gap;
    }
    anchor + DVec2::new(0.0, gap)
}

fn draw_radial(
    ctx: &mut DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    dimension: &Dimension,
    center: Point2,
) -> DrawOutcome {
    let center = ctx.map(center);
    let outer = ctx.map(dimension.text_reference);
    let length = center.distance(outer);
    if length <= 1e-9 {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let angle = angle_of(outer - center);
    let pen = painter.pen();

    ctx.surface.draw_line(pen, center, outer);
    draw_arrow(ctx, outer, angle + PI, pen);

    let text = painter.text(dimension, RADIUS_PREFIX, "");
    let anchor = radial_text_anchor(ctx, painter, &text, outer, angle, length);
    put_text(
        ctx,
        painter,
        &text,
        anchor,
        vertical_text_rotation(angle),
        TextLayout::centered(),
    );
    DrawOutcome::Drawn
}

fn draw_diametric(
    ctx: &mut DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    dimension: &Dimension,
    center: Point2,
    reference: Point2,
) -> DrawOutcome {
    let center_px = ctx.map(center);
    let Some(direction) = center.vector_to(reference).as_vec2().try_normalize() else {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    };
    let radius = center.distance(reference) * painter.scale;
    if radius <= 1e-9 {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let near = center_px + direction * radius;
    let far = center_px - direction * radius;
    let text_point = ctx.map(dimension.text_reference);
    let angle = angle_of(direction);
    let pen = painter.pen();

    ctx.surface.draw_line(pen, near, far);
    if text_point.distance(center_px) > radius * 1.1 {
        ctx.surface.draw_line(pen, near, text_point);
    }
    draw_arrow(ctx, near, angle + PI, pen);
    draw_arrow(ctx, far, angle, pen);

    let text = painter.text(dimension, DIAMETER_PREFIX, "");
    let anchor = radial_text_anchor(ctx, painter, &text, text_point, angle, radius * 2.0);
    put_text(
        ctx,
        painter,
        &text,
        anchor,
        vertical_text_rotation(angle),
        TextLayout::centered(),
    );
    DrawOutcome::Drawn
}

/// 直线上离顶点较远的端点，用于确定射线方向。
fn ray_point(vertex: Point2, start: Point2, end: Point2) -> Point2 {
    if vertex.distance(end) >= vertex.distance(start) {
        end
    } else {
        start
    }
}

fn draw_angular(ctx: &mut DrawContext<'_>, painter: &DimensionPainter<'_>, dimension: &Dimension) -> DrawOutcome {
    let DimensionKind::Angular2Line {
        first_start,
        first_end,
        second_start,
        second_end,
    } = &dimension.kind
    else {
        return DrawOutcome::Skipped(SkipReason::UnresolvedGeometry);
    };
    let Some(vertex) = dimension.angular_vertex() else {
        return DrawOutcome::Skipped(SkipReason::UnresolvedGeometry);
    };

    let first = ray_point(vertex, *first_start, *first_end);
    let second = ray_point(vertex, *second_start, *second_end);
    let a1 = normalize_angle(vertex.vector_to(first).angle());
    let a2 = normalize_angle(vertex.vector_to(second).angle());
    let (start, end) = if (a2 - a1).abs() <= PI {
        (a1.min(a2), a1.max(a2))
    } else {
        (a1.max(a2), a1.min(a2) + TAU)
    };

    let center = ctx.map(vertex);
    let radius = vertex.distance(dimension.text_reference) * painter.scale;
    if radius <= 1e-9 {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let sweep = end - start;
    let pen = painter.pen();

    ctx.surface
        .draw_arc(pen, center, DVec2::splat(radius), start, sweep);

    let reach = radius + 10.0 * painter.scale;
    ctx.surface
        .draw_line(pen, center, center + DVec2::from_angle(start) * reach);
    ctx.surface
        .draw_line(pen, center, center + DVec2::from_angle(end) * reach);
    draw_extension_markers(ctx, &[center]);

    draw_arrow(ctx, center + DVec2::from_angle(start) * radius, start + FRAC_PI_2, pen);
    draw_arrow(ctx, center + DVec2::from_angle(end) * radius, end - FRAC_PI_2, pen);

    let text = if dimension.user_text.trim().is_empty() {
        painter.text(dimension, "", DEGREE_SUFFIX)
    } else {
        painter.text(dimension, "", "")
    };
    let mid = (start + end) / 2.0;
    let mut anchor = center + DVec2::from_angle(mid) * radius;
    let size = ctx.surface.measure_text(&text, &painter.font);
    let arc_length = radius * sweep;
    let short = text.chars().count() <= SHORT_TEXT_CHARS;
    if !short || size.x > 0.6 * arc_length {
        anchor += DVec2::from_angle(mid) * (5.0 * painter.scale).min(8.0);
    }
    put_text(
        ctx,
        painter,
        &text,
        anchor,
        vertical_text_rotation(mid),
        TextLayout::centered(),
    );
    DrawOutcome::Drawn
}

fn draw_ordinate(
    ctx: &mut DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    dimension: &Dimension,
    feature: Point2,
    axis: OrdinateAxis,
) -> DrawOutcome {
    let feature = ctx.map(feature);
    let leader = ctx.map(dimension.text_reference);
    let elbow = match axis {
        OrdinateAxis::X => DVec2::new(feature.x, leader.y),
        OrdinateAxis::Y => DVec2::new(leader.x, feature.y),
    };
    let pen = painter.pen();
    ctx.surface.draw_lines(pen, &[feature, elbow, leader]);
    draw_extension_markers(ctx, &[feature]);

    let fallback = match axis {
        OrdinateAxis::X => DVec2::X,
        OrdinateAxis::Y => DVec2::NEG_Y,
    };
    let direction = (leader - elbow).try_normalize().unwrap_or(fallback);
    let anchor = leader + direction * painter.text_gap();
    let text = painter.text(dimension, "", "");

    let (rotation, layout) = match axis {
        OrdinateAxis::X => {
            let horizontal = if direction.x >= 0.0 {
                TextAlign::Near
            } else {
                TextAlign::Far
            };
            (
                0.0,
                TextLayout {
                    horizontal,
                    vertical: TextAlign::Center,
                    max_width: 0.0,
                },
            )
        }
        OrdinateAxis::Y => (-FRAC_PI_2, TextLayout::centered()),
    };
    put_text(ctx, painter, &text, anchor, rotation, layout);
    DrawOutcome::Drawn
}

#[allow(clippy::too_many_arguments)]
fn draw_arc_length(
    ctx: &mut DrawContext<'_>,
    painter: &DimensionPainter<'_>,
    dimension: &Dimension,
    center: Point2,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    offset: f64,
) -> DrawOutcome {
    let scale = painter.scale;
    let center_px = ctx.map(center);
    let arc_radius = radius.abs() * scale;
    if arc_radius <= 1e-9 {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let dim_radius = if offset.abs() * scale > 1e-9 {
        arc_radius + offset.abs() * scale
    } else {
        arc_radius * 1.2
    };

    let mut sweep = end_angle - start_angle;
    if sweep < 0.0 {
        sweep += TAU;
    }
    // 负偏移标注补弧：自终点起扫过剩余角度。
    let (from, span) = if offset < 0.0 {
        (end_angle, TAU - sweep)
    } else {
        (start_angle, sweep)
    };
    let pen = painter.pen();

    if offset.abs() * scale > 2.0 * scale {
        let first = center_px + DVec2::from_angle(start_angle) * arc_radius;
        let second = center_px + DVec2::from_angle(end_angle) * arc_radius;
        let reach = dim_radius + 2.0 * scale;
        ctx.surface
            .draw_line(pen, first, center_px + DVec2::from_angle(start_angle) * reach);
        ctx.surface
            .draw_line(pen, second, center_px + DVec2::from_angle(end_angle) * reach);
        draw_extension_markers(ctx, &[first, second]);
    }

    ctx.surface
        .draw_arc(pen, center_px, DVec2::splat(dim_radius), from, span);

    let text = painter.text(dimension, "", "");
    let anchor = ctx.map(dimension.text_reference);
    put_text(ctx, painter, &text, anchor, 0.0, TextLayout::centered());
    DrawOutcome::Drawn
}
