use cadraster_core::document::{Hatch, HatchEdge, HatchLoop};
use cadraster_core::geometry::Point2;
use glam::DVec2;
use tracing::debug;

use crate::curves::{self, CurveError, NurbsCurve};
use crate::dispatch::{DrawContext, DrawOutcome, EntityStyle, SkipReason};
use crate::resources::Rgba;
use crate::surface::{Brush, SurfacePath};

/// 内置 8x8 点阵填充样式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HatchStyle {
    ForwardDiagonal,
    BackwardDiagonal,
    Cross,
    DiagonalCross,
    LightUpwardDiagonal,
    LightVertical,
    LightHorizontal,
    DiagonalBrick,
    Weave,
    LargeGrid,
    Plaid,
    Shingle,
    LargeConfetti,
    SmallGrid,
    DashedHorizontal,
    Sphere,
    Wave,
    Percent30,
    SmallConfetti,
    Percent05,
    ZigZag,
}

impl HatchStyle {
    /// 图案名（不区分大小写）映射到点阵样式，未知名称使用正向斜线。
    pub fn from_pattern_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" => HatchStyle::Cross,
            "ansi31" => HatchStyle::BackwardDiagonal,
            "ansi32" | "steel" => HatchStyle::LightUpwardDiagonal,
            "ansi33" | "brass" | "ansi35" | "fire" => HatchStyle::LightVertical,
            "ansi34" | "plastic" | "ansi36" | "line" | "plast" => HatchStyle::LightHorizontal,
            "ansi37" | "mudst" | "triang" | "angle" => HatchStyle::DiagonalCross,
            "ansi38" | "sand" => HatchStyle::DiagonalBrick,
            "ar-b816" | "brick" | "ar-hbone" | "herringbone" | "escher" => HatchStyle::Weave,
            "sacncr" | "ar-conc" | "concrete" | "box" | "grate" | "hex" | "honey" | "net"
            | "square" => HatchStyle::LargeGrid,
            "ar-parq1" | "parquet" | "hound" => HatchStyle::Plaid,
            "ar-rroof" | "roof" | "ar-rshke" | "shake" => HatchStyle::Shingle,
            "ar-sand" | "cork" | "dots" => HatchStyle::LargeConfetti,
            "clay" | "net3" => HatchStyle::SmallGrid,
            "cross" => HatchStyle::Cross,
            "dash" => HatchStyle::DashedHorizontal,
            "dolmit" | "earth" | "swamp" => HatchStyle::Sphere,
            "flex" | "insul" => HatchStyle::Wave,
            "grass" => HatchStyle::Percent30,
            "stars" => HatchStyle::SmallConfetti,
            "trans" => HatchStyle::Percent05,
            "zigzag" => HatchStyle::ZigZag,
            _ => HatchStyle::ForwardDiagonal,
        }
    }

    /// 点阵行数据，最高位对应最左列。
    pub fn tile(self) -> [u8; 8] {
        match self {
            HatchStyle::ForwardDiagonal => [0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01],
            HatchStyle::BackwardDiagonal => [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80],
            HatchStyle::Cross | HatchStyle::LargeGrid => {
                [0xFF, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80]
            }
            HatchStyle::DiagonalCross => [0x81, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x81],
            HatchStyle::LightUpwardDiagonal => [0x11, 0x22, 0x44, 0x88, 0x11, 0x22, 0x44, 0x88],
            HatchStyle::LightVertical => [0x88; 8],
            HatchStyle::LightHorizontal => [0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00],
            HatchStyle::DiagonalBrick => [0x01, 0x02, 0x04, 0x08, 0x18, 0x24, 0x42, 0x81],
            HatchStyle::Weave => [0x88, 0x54, 0x22, 0x45, 0x88, 0x14, 0x22, 0x51],
            HatchStyle::Plaid => [0xAA, 0x55, 0xAA, 0x55, 0xF0, 0xF0, 0xF0, 0xF0],
            HatchStyle::Shingle => [0x03, 0x84, 0x48, 0x30, 0x0C, 0x02, 0x01, 0x01],
            HatchStyle::LargeConfetti => [0x8D, 0x0C, 0xC0, 0xD8, 0x1B, 0x03, 0x30, 0xB1],
            HatchStyle::SmallGrid => [0xFF, 0x88, 0x88, 0x88, 0xFF, 0x88, 0x88, 0x88],
            HatchStyle::DashedHorizontal => [0xF0, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x00, 0x00],
            HatchStyle::Sphere => [0x77, 0x98, 0xF8, 0xF8, 0x77, 0x89, 0x8F, 0x8F],
            HatchStyle::Wave => [0x00, 0x18, 0xA4, 0x03, 0x00, 0x18, 0xA4, 0x03],
            HatchStyle::Percent30 => [0xAA, 0x44, 0xAA, 0x11, 0xAA, 0x44, 0xAA, 0x11],
            HatchStyle::SmallConfetti => [0x80, 0x08, 0x40, 0x02, 0x10, 0x01, 0x20, 0x04],
            HatchStyle::Percent05 => [0x80, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00],
            HatchStyle::ZigZag => [0x81, 0x42, 0x24, 0x18, 0x81, 0x42, 0x24, 0x18],
        }
    }

    #[inline]
    pub fn is_set(self, x: u32, y: u32) -> bool {
        let row = self.tile()[(y % 8) as usize];
        row & (0x80 >> (x % 8)) != 0
    }
}

/// 单条边界边的转换失败原因。
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeSkip {
    TooFewPoints,
    Degenerate,
}

/// 将一个边界环的各条边依次追加到路径；返回成功转换的边数。
pub fn append_loop(
    path: &mut SurfacePath,
    boundary: &HatchLoop,
    map: impl Fn(Point2) -> DVec2,
    scale: f64,
) -> usize {
    let mut converted = 0;
    for (index, edge) in boundary.edges.iter().enumerate() {
        match edge_points(edge, &map, scale) {
            Ok(EdgeGeometry::Open(points)) => {
                path.add_lines(&points);
                converted += 1;
            }
            Ok(EdgeGeometry::Closed(points)) => {
                path.add_polygon(&points);
                converted += 1;
            }
            Err(reason) => debug!(index, ?reason, "跳过无法转换的填充边界边"),
        }
    }
    if boundary.flags.closes_figure() {
        path.close_figure();
    }
    converted
}

enum EdgeGeometry {
    Open(Vec<DVec2>),
    Closed(Vec<DVec2>),
}

fn edge_points(edge: &HatchEdge, map: &impl Fn(Point2) -> DVec2, scale: f64) -> Result<EdgeGeometry, EdgeSkip> {
    match edge {
        HatchEdge::Line { start, end } => Ok(EdgeGeometry::Open(vec![map(*start), map(*end)])),
        HatchEdge::Polyline {
            vertices,
            is_closed,
        } => {
            if vertices.len() < 2 {
                return Err(EdgeSkip::TooFewPoints);
            }
            let points: Vec<DVec2> = vertices.iter().map(|p| map(*p)).collect();
            if *is_closed {
                Ok(EdgeGeometry::Closed(points))
            } else {
                Ok(EdgeGeometry::Open(points))
            }
        }
        HatchEdge::Spline {
            degree,
            control_points,
            knots,
            weights,
        } => {
            if control_points.len() < 2 {
                return Err(EdgeSkip::TooFewPoints);
            }
            let control: Vec<DVec2> = control_points.iter().map(|p| p.as_vec2()).collect();
            let sampled: Result<Vec<DVec2>, CurveError> = NurbsCurve {
                degree: *degree,
                control_points: &control,
                knots,
                weights,
                closed: false,
                periodic: false,
            }
            .evaluate(curves::hatch_spline_precision(control.len()));
            let samples = match sampled {
                Ok(samples) if samples.len() >= 2 => samples,
                Ok(_) => control,
                Err(err) => {
                    debug!(%err, "填充样条边求值失败，使用控制多边形");
                    control
                }
            };
            Ok(EdgeGeometry::Open(
                samples
                    .into_iter()
                    .map(|p| map(Point2::from_vec(p)))
                    .collect(),
            ))
        }
        HatchEdge::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            is_counter_clockwise,
        } => {
            if *radius <= 0.0 {
                return Err(EdgeSkip::Degenerate);
            }
            let sweep = directed_sweep(*start_angle, *end_angle, *is_counter_clockwise, curves::sweep_angle);
            let segments = curves::arc_segment_count(radius * scale, sweep);
            let points = curves::arc_points(
                center.as_vec2(),
                DVec2::splat(*radius),
                0.0,
                *start_angle,
                sweep,
                segments,
            );
            Ok(EdgeGeometry::Open(
                points.into_iter().map(|p| map(Point2::from_vec(p))).collect(),
            ))
        }
        HatchEdge::Ellipse {
            center,
            major_axis,
            ratio,
            start_parameter,
            end_parameter,
            is_counter_clockwise,
        } => {
            let semi_major = major_axis.length();
            if semi_major <= 0.0 || *ratio <= 0.0 {
                return Err(EdgeSkip::Degenerate);
            }
            let sweep = directed_sweep(
                *start_parameter,
                *end_parameter,
                *is_counter_clockwise,
                curves::ellipse_sweep,
            );
            let segments = curves::arc_segment_count(semi_major * scale, sweep);
            let points = curves::arc_points(
                center.as_vec2(),
                DVec2::new(semi_major, semi_major * ratio),
                major_axis.angle(),
                *start_parameter,
                sweep,
                segments,
            );
            Ok(EdgeGeometry::Open(
                points.into_iter().map(|p| map(Point2::from_vec(p))).collect(),
            ))
        }
    }
}

/// 顺时针边界边从起点反向扫到终点。
fn directed_sweep(start: f64, end: f64, counter_clockwise: bool, sweep: fn(f64, f64) -> f64) -> f64 {
    if counter_clockwise {
        sweep(start, end)
    } else {
        -sweep(end, start)
    }
}

/// 填充图案：实心时使用实体颜色，否则为透明背景的点阵画刷。
pub fn hatch_brush(hatch: &Hatch, color: Rgba) -> Brush {
    if hatch.is_solid {
        Brush::Solid(color)
    } else {
        Brush::Hatch {
            style: HatchStyle::from_pattern_name(&hatch.pattern_name),
            foreground: color,
            background: Rgba::TRANSPARENT,
        }
    }
}

pub fn draw_hatch(ctx: &mut DrawContext<'_>, hatch: &Hatch, style: &EntityStyle) -> DrawOutcome {
    if !ctx.options.draw_hatch {
        return DrawOutcome::Skipped(SkipReason::Disabled);
    }
    if hatch.loops.is_empty() {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }

    let paths = loop_paths(hatch, |point| ctx.map(point), ctx.scale());
    if paths.is_empty() {
        debug!(pattern = %hatch.pattern_name, "填充边界为空");
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }

    // 每个边界环单独填充，失败时只描边该环。
    let brush = hatch_brush(hatch, style.color);
    for path in &paths {
        if let Err(err) = ctx.surface.fill_path(&brush, path) {
            if hatch.is_solid {
                debug!(%err, "实心填充失败");
            } else {
                debug!(%err, pattern = %hatch.pattern_name, "图案填充失败，改为描边");
                ctx.surface.stroke_path(&style.pen, path);
            }
        }
    }
    DrawOutcome::Drawn
}

/// 每个边界环生成一条独立路径，丢弃没有可用边的环。
pub fn loop_paths(hatch: &Hatch, map: impl Fn(Point2) -> DVec2, scale: f64) -> Vec<SurfacePath> {
    hatch
        .loops
        .iter()
        .filter_map(|boundary| {
            let mut path = SurfacePath::new();
            let converted = append_loop(&mut path, boundary, &map, scale);
            if path.is_empty() {
                debug!(converted, "填充边界环为空");
                None
            } else {
                Some(path)
            }
        })
        .collect()
}
