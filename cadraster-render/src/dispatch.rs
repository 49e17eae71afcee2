use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use cadraster_core::document::{
    Arc as ArcEntity, Circle, Document, Ellipse, Entity, HorizontalAnchor, Leader, Line, MText,
    MultiLine, Point, Polyline, RasterImage, Spline, Text, TextAnchor, VerticalAnchor, Wipeout,
    WipeoutBoundary,
};
use cadraster_core::geometry::Point2;
use glam::{DAffine2, DVec2};
use tracing::{debug, warn};

use crate::block;
use crate::curves::{self, CurveError, NurbsCurve, Segment};
use crate::dimension;
use crate::hatch;
use crate::options::RenderOptions;
use crate::resources::{self, ResourceCache, Rgba};
use crate::surface::{Brush, DrawingSurface, Font, Pen, TextAlign, TextLayout};
use crate::text::{clean_text, text_font_size};
use crate::transform::ViewTransform;

/// 屏幕文字旋转阈值（弧度）。
const TEXT_ROTATION_EPSILON: f64 = 0.001 * std::f64::consts::PI / 180.0;
const IMAGE_PLACEHOLDER_LABEL: &str = "IMG NoFound";

/// 单个实体的绘制结果。跳过不是错误，调度器只做统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 图层隐藏或对应绘制开关关闭。
    Filtered,
    EmptyGeometry,
    MissingBlock,
    UnresolvedGeometry,
    Disabled,
    /// 块嵌套超过上限（通常为自引用块）。
    RecursionLimit,
}

impl DrawOutcome {
    #[inline]
    pub fn is_drawn(self) -> bool {
        matches!(self, DrawOutcome::Drawn)
    }
}

/// 可见性判定：图层隐藏、标注或文字开关关闭时不绘制。
pub fn should_draw(entity: &Entity, document: &Document, options: &RenderOptions) -> bool {
    if let Some(layer) = document.layer(entity.layer_name()) {
        if !layer.is_visible {
            return false;
        }
    }
    if entity.is_dimension() && !options.draw_dimensions {
        return false;
    }
    if entity.is_text() && !options.draw_text {
        return false;
    }
    true
}

/// 当前绘制帧：块实例会压入新的帧。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrame {
    pub scale: f64,
    pub offset: DVec2,
    /// 累计的块旋转角，屏幕空间文字需要叠加。
    pub rotation: f64,
    pub line_width: f64,
}

/// 实体的颜色与画笔、画刷。
#[derive(Debug, Clone)]
pub struct EntityStyle {
    pub color: Rgba,
    pub pen: Arc<Pen>,
    pub brush: Arc<Brush>,
}

/// 绘制前可独立完成的准备工作（颜色解析、资源获取、样条采样），可在线程池中执行。
#[derive(Debug, Clone)]
pub struct PreparedEntity {
    pub style: EntityStyle,
    pub spline: Option<Result<Vec<DVec2>, CurveError>>,
}

pub fn prepare_entity(
    entity: &Entity,
    document: &Document,
    options: &RenderOptions,
    resources: &ResourceCache,
    frame: &ViewFrame,
) -> PreparedEntity {
    let color = resources::entity_color(entity, document, options);
    let style = EntityStyle {
        color,
        pen: resources.pen(color, frame.line_width),
        brush: resources.brush(color),
    };
    let spline = match entity {
        Entity::Spline(spline) => Some(sample_spline(spline, frame.scale)),
        _ => None,
    };
    PreparedEntity { style, spline }
}

fn sample_spline(spline: &Spline, scale: f64) -> Result<Vec<DVec2>, CurveError> {
    let control: Vec<DVec2> = spline.control_points.iter().map(|p| p.as_vec2()).collect();
    NurbsCurve {
        degree: spline.degree,
        control_points: &control,
        knots: &spline.knots,
        weights: &spline.weights,
        closed: spline.is_closed,
        periodic: spline.is_periodic,
    }
    .evaluate(curves::spline_precision(scale))
}

/// 绘制上下文：持有绘图表面、文档、选项与资源池，并维护帧栈。
pub struct DrawContext<'a> {
    pub surface: &'a mut dyn DrawingSurface,
    pub document: &'a Document,
    pub options: &'a RenderOptions,
    pub resources: &'a ResourceCache,
    base: ViewFrame,
    frames: Vec<ViewFrame>,
}

impl<'a> DrawContext<'a> {
    pub fn new(
        surface: &'a mut dyn DrawingSurface,
        document: &'a Document,
        options: &'a RenderOptions,
        resources: &'a ResourceCache,
        view: &ViewTransform,
    ) -> Self {
        Self {
            surface,
            document,
            options,
            resources,
            base: ViewFrame {
                scale: view.scale,
                offset: view.offset,
                rotation: 0.0,
                line_width: options.line_width,
            },
            frames: Vec::new(),
        }
    }

    #[inline]
    pub fn frame(&self) -> ViewFrame {
        self.frames.last().copied().unwrap_or(self.base)
    }

    /// 修改当前帧；仅在 [`StateGuard`] 作用域内有意义。
    pub fn frame_mut(&mut self) -> &mut ViewFrame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.base,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.frame().scale
    }

    /// 文档坐标映射到当前帧坐标。
    #[inline]
    pub fn map(&self, point: Point2) -> DVec2 {
        let frame = self.frame();
        frame.offset + point.as_vec2() * frame.scale
    }

    /// 当前帧坐标经表面变换后的设备坐标。
    #[inline]
    pub fn device_point(&self, mapped: DVec2) -> DVec2 {
        self.surface.transform().transform_point2(mapped)
    }

    /// 保存图形状态并压入帧，返回的守卫在离开作用域时无条件恢复。
    pub fn scoped(&mut self) -> StateGuard<'_, 'a> {
        StateGuard::new(self)
    }

    pub fn style_for(&self, entity: &Entity) -> EntityStyle {
        prepare_entity(entity, self.document, self.options, self.resources, &self.frame()).style
    }

    pub fn pen(&self, color: Rgba, width: f64) -> Arc<Pen> {
        self.resources.pen(color, width)
    }

    pub fn brush(&self, color: Rgba) -> Arc<Brush> {
        self.resources.brush(color)
    }

    pub fn font(&self, size: f64) -> Arc<Font> {
        self.resources.font(size)
    }
}

/// 图形状态守卫：创建时保存表面状态并复制当前帧，Drop 时弹出帧并恢复表面状态。
pub struct StateGuard<'g, 'a> {
    ctx: &'g mut DrawContext<'a>,
}

impl<'g, 'a> StateGuard<'g, 'a> {
    fn new(ctx: &'g mut DrawContext<'a>) -> Self {
        ctx.surface.save();
        let frame = ctx.frame();
        ctx.frames.push(frame);
        Self { ctx }
    }
}

impl<'a> Deref for StateGuard<'_, 'a> {
    type Target = DrawContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for StateGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for StateGuard<'_, '_> {
    fn drop(&mut self) {
        self.ctx.frames.pop();
        self.ctx.surface.restore();
    }
}

/// 判定可见性后绘制单个实体。
pub fn draw_entity(ctx: &mut DrawContext<'_>, entity: &Entity) -> DrawOutcome {
    if !should_draw(entity, ctx.document, ctx.options) {
        return DrawOutcome::Skipped(SkipReason::Filtered);
    }
    let prepared = prepare_entity(entity, ctx.document, ctx.options, ctx.resources, &ctx.frame());
    draw_prepared(ctx, entity, &prepared)
}

/// 按实体种类路由到具体绘制例程。
pub fn draw_prepared(ctx: &mut DrawContext<'_>, entity: &Entity, prepared: &PreparedEntity) -> DrawOutcome {
    let style = &prepared.style;
    let outcome = match entity {
        Entity::Line(line) => draw_line(ctx, line, &style.pen),
        Entity::Circle(circle) => draw_circle(ctx, circle, &style.pen),
        Entity::Arc(arc) => draw_arc(ctx, arc, &style.pen),
        Entity::Ellipse(ellipse) => draw_ellipse(ctx, ellipse, &style.pen),
        Entity::Point(point) => draw_point(ctx, point, &style.brush),
        Entity::Polyline(polyline) => draw_polyline(ctx, polyline, &style.pen),
        Entity::MultiLine(mline) => draw_multiline(ctx, mline, &style.pen),
        Entity::Spline(spline) => draw_spline(ctx, spline, &style.pen, prepared.spline.as_ref()),
        Entity::Text(text) => draw_text_entity(ctx, text, &style.brush),
        Entity::MText(mtext) => draw_mtext(ctx, mtext, &style.brush),
        Entity::Leader(leader) => draw_leader(ctx, leader, &style.pen),
        Entity::Dimension(dim) => dimension::draw_dimension(ctx, dim, style),
        Entity::Hatch(hatch) => hatch::draw_hatch(ctx, hatch, style),
        Entity::BlockReference(reference) => block::draw_block_reference(ctx, reference),
        Entity::RasterImage(image) => draw_raster_image(ctx, image, style),
        Entity::Wipeout(wipeout) => draw_wipeout(ctx, wipeout, &style.pen),
    };
    if let DrawOutcome::Skipped(reason) = outcome {
        debug!(kind = entity.kind_name(), layer = entity.layer_name(), ?reason, "实体未绘制");
    }
    outcome
}

fn draw_line(ctx: &mut DrawContext<'_>, line: &Line, pen: &Pen) -> DrawOutcome {
    let start = ctx.map(line.start);
    let end = ctx.map(line.end);
    ctx.surface.draw_line(pen, start, end);
    DrawOutcome::Drawn
}

fn draw_circle(ctx: &mut DrawContext<'_>, circle: &Circle, pen: &Pen) -> DrawOutcome {
    let center = ctx.map(circle.center);
    let radius = circle.radius * ctx.scale();
    ctx.surface.draw_ellipse(pen, center, DVec2::splat(radius));
    DrawOutcome::Drawn
}

fn draw_arc(ctx: &mut DrawContext<'_>, arc: &ArcEntity, pen: &Pen) -> DrawOutcome {
    let center = ctx.map(arc.center);
    let radius = arc.radius * ctx.scale();
    let sweep = curves::sweep_angle(arc.start_angle, arc.end_angle);
    ctx.surface
        .draw_arc(pen, center, DVec2::splat(radius), arc.start_angle, sweep);
    DrawOutcome::Drawn
}

fn draw_ellipse(ctx: &mut DrawContext<'_>, ellipse: &Ellipse, pen: &Pen) -> DrawOutcome {
    let center = ctx.map(ellipse.center);
    let scale = ctx.scale();
    let radii = DVec2::new(ellipse.semi_major() * scale, ellipse.semi_minor() * scale);
    let rotation = ellipse.rotation();

    let mut guard = ctx.scoped();
    let mut local = DAffine2::from_translation(center);
    if rotation.abs() > 1e-10 {
        local = local * DAffine2::from_angle(rotation);
    }
    guard.surface.concat_transform(local);
    if ellipse.is_full() {
        guard.surface.draw_ellipse(pen, DVec2::ZERO, radii);
    } else {
        let sweep = curves::ellipse_sweep(ellipse.start_parameter, ellipse.end_parameter);
        guard
            .surface
            .draw_arc(pen, DVec2::ZERO, radii, ellipse.start_parameter, sweep);
    }
    DrawOutcome::Drawn
}

fn draw_point(ctx: &mut DrawContext<'_>, point: &Point, brush: &Brush) -> DrawOutcome {
    let center = ctx.map(point.location);
    let size = (0.5 * ctx.scale()).max(2.0);
    if let Err(err) = ctx
        .surface
        .fill_ellipse(brush, center, DVec2::splat(size / 2.0))
    {
        debug!(%err, "点填充失败");
    }
    DrawOutcome::Drawn
}

fn draw_polyline(ctx: &mut DrawContext<'_>, polyline: &Polyline, pen: &Pen) -> DrawOutcome {
    let vertices = &polyline.vertices;
    if vertices.len() < 2 {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }

    let mut order: Vec<usize> = (0..vertices.len()).collect();
    if polyline.is_closed && vertices.len() > 2 {
        order.push(0);
    }

    for pair in order.windows(2) {
        let from = &vertices[pair[0]];
        let to = &vertices[pair[1]];
        let start = ctx.map(from.position);
        let end = ctx.map(to.position);
        match curves::polyline_segment(start, end, from.bulge) {
            Some(Segment::Line(a, b)) => ctx.surface.draw_line(pen, a, b),
            Some(Segment::Arc(arc)) => ctx.surface.draw_arc(
                pen,
                arc.center,
                DVec2::splat(arc.radius),
                arc.start_angle,
                arc.sweep,
            ),
            None => debug!(index = pair[0], "跳过零长度弧段"),
        }
    }
    DrawOutcome::Drawn
}

fn draw_multiline(ctx: &mut DrawContext<'_>, mline: &MultiLine, pen: &Pen) -> DrawOutcome {
    if mline.vertices.len() < 2 || mline.offsets.is_empty() {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let vertices: Vec<DVec2> = mline.vertices.iter().map(|p| p.as_vec2()).collect();
    let lines = curves::explode_multiline(&vertices, &mline.offsets, mline.scale, mline.is_closed);
    for (start, end) in lines {
        let a = ctx.map(Point2::from_vec(start));
        let b = ctx.map(Point2::from_vec(end));
        ctx.surface.draw_line(pen, a, b);
    }
    DrawOutcome::Drawn
}

fn draw_spline(
    ctx: &mut DrawContext<'_>,
    spline: &Spline,
    pen: &Pen,
    prepared: Option<&Result<Vec<DVec2>, CurveError>>,
) -> DrawOutcome {
    let sampled = match prepared {
        Some(result) => result.clone(),
        None => sample_spline(spline, ctx.scale()),
    };

    match sampled {
        Ok(samples) if samples.len() >= 2 => {
            let points: Vec<DVec2> = samples
                .into_iter()
                .map(|p| ctx.map(Point2::from_vec(p)))
                .collect();
            if spline.is_closed || spline.is_periodic {
                ctx.surface.draw_polygon(pen, &points);
            } else {
                ctx.surface.draw_lines(pen, &points);
            }
            DrawOutcome::Drawn
        }
        other => {
            if let Err(err) = &other {
                debug!(%err, "样条求值失败，改为连接控制点");
            }
            if spline.control_points.len() < 2 {
                return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
            }
            let points: Vec<DVec2> = spline.control_points.iter().map(|p| ctx.map(*p)).collect();
            ctx.surface.draw_lines(pen, &points);
            DrawOutcome::Drawn
        }
    }
}

fn anchor_layout(anchor: TextAnchor) -> TextLayout {
    let horizontal = match anchor.horizontal() {
        HorizontalAnchor::Left => TextAlign::Near,
        HorizontalAnchor::Center => TextAlign::Center,
        HorizontalAnchor::Right => TextAlign::Far,
    };
    let vertical = match anchor.vertical() {
        VerticalAnchor::Top => TextAlign::Near,
        VerticalAnchor::Middle => TextAlign::Center,
        VerticalAnchor::Bottom => TextAlign::Far,
    };
    TextLayout {
        horizontal,
        vertical,
        max_width: 0.0,
    }
}

/// 在屏幕空间绘制文字：锚点经当前表面变换转换为设备坐标后重置变换，
/// 需要旋转时先平移到锚点再旋转。`rotation` 为屏幕角（Y 轴向下）。
pub fn draw_screen_text(
    ctx: &mut DrawContext<'_>,
    text: &str,
    font: &Font,
    brush: &Brush,
    anchor: DVec2,
    rotation: f64,
    layout: TextLayout,
) {
    let content = clean_text(text);
    if content.is_empty() {
        return;
    }
    let device = ctx.device_point(anchor);
    let rotation = rotation - ctx.frame().rotation;

    let mut guard = ctx.scoped();
    guard.surface.reset_transform();
    if rotation.abs() > TEXT_ROTATION_EPSILON {
        guard
            .surface
            .concat_transform(DAffine2::from_translation(device) * DAffine2::from_angle(rotation));
        guard
            .surface
            .draw_text(&content, font, brush, DVec2::ZERO, &layout);
    } else {
        guard.surface.draw_text(&content, font, brush, device, &layout);
    }
}

fn draw_text_entity(ctx: &mut DrawContext<'_>, text: &Text, brush: &Brush) -> DrawOutcome {
    if !ctx.options.draw_text || text.content.is_empty() {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let anchor = ctx.map(text.insert);
    let font = ctx.font(text_font_size(text.height, ctx.scale()));
    draw_screen_text(
        ctx,
        &text.content,
        &font,
        brush,
        anchor,
        -text.rotation,
        anchor_layout(text.alignment),
    );
    DrawOutcome::Drawn
}

fn draw_mtext(ctx: &mut DrawContext<'_>, mtext: &MText, brush: &Brush) -> DrawOutcome {
    if !ctx.options.draw_text || mtext.content.is_empty() {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let scale = ctx.scale();
    let anchor = ctx.map(mtext.insert);
    let font = ctx.font(text_font_size(mtext.height, scale));
    let box_width = if mtext.rectangle_width > 0.0 {
        mtext.rectangle_width * scale
    } else {
        0.0
    };
    let max_width = box_width + mtext.height * scale;
    draw_screen_text(
        ctx,
        &mtext.content,
        &font,
        brush,
        anchor,
        -mtext.rotation,
        anchor_layout(mtext.attachment).with_max_width(max_width),
    );
    DrawOutcome::Drawn
}

/// 箭头：尖端位于 `point` 沿 `angle` 方向，细长填充三角形加加粗轮廓。
pub fn draw_arrow(ctx: &mut DrawContext<'_>, point: DVec2, angle: f64, pen: &Pen) {
    let length = pen.width + 2.0;
    let direction = DVec2::from_angle(angle);
    let tip = point - direction;
    let spread = std::f64::consts::PI / 8.0;
    let left = tip + DVec2::from_angle(angle + std::f64::consts::PI - spread) * length;
    let right = tip + DVec2::from_angle(angle + std::f64::consts::PI + spread) * length;
    let triangle = [tip, left, right];

    let brush = ctx.brush(pen.color);
    if let Err(err) = ctx.surface.fill_polygon(&brush, &triangle) {
        debug!(%err, "箭头填充失败");
    }
    let outline = ctx.pen(pen.color, pen.width * 1.8);
    ctx.surface.draw_polygon(&outline, &triangle);
}

fn draw_leader(ctx: &mut DrawContext<'_>, leader: &Leader, pen: &Pen) -> DrawOutcome {
    if leader.vertices.len() < 2 {
        return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    let points: Vec<DVec2> = leader.vertices.iter().map(|p| ctx.map(*p)).collect();
    for pair in points.windows(2) {
        ctx.surface.draw_line(pen, pair[0], pair[1]);
    }
    if leader.has_arrowhead {
        let delta = points[0] - points[1];
        draw_arrow(ctx, points[0], delta.y.atan2(delta.x), pen);
    }
    DrawOutcome::Drawn
}

/// 相对路径按文档目录解析。
pub fn resolve_image_path(document: &Document, file: &str) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_relative() {
        if let Some(dir) = document.base_dir() {
            return dir.join(path);
        }
    }
    path
}

fn draw_raster_image(ctx: &mut DrawContext<'_>, image: &RasterImage, style: &EntityStyle) -> DrawOutcome {
    let scale = ctx.scale();
    let width = image.width * scale;
    let height = image.height * scale;
    let device = ctx.device_point(ctx.map(image.position));
    let rotation = -(image.rotation + ctx.frame().rotation);

    let loaded = match &image.file_path {
        Some(file) if !file.is_empty() => {
            let path = resolve_image_path(ctx.document, file);
            match image::open(&path) {
                Ok(decoded) => Some(decoded.to_rgba8()),
                Err(err) => {
                    warn!(path = %path.display(), %err, "图像加载失败，绘制占位符");
                    None
                }
            }
        }
        _ => {
            warn!("图像未关联文件，绘制占位符");
            None
        }
    };

    let mut guard = ctx.scoped();
    guard.surface.reset_transform();
    guard.surface.concat_transform(DAffine2::from_translation(device));
    if rotation.abs() > TEXT_ROTATION_EPSILON {
        guard.surface.concat_transform(DAffine2::from_angle(rotation));
    }

    // 设备坐标 Y 轴向下，插入点为左下角。
    let top_left = DVec2::new(0.0, -height);
    let size = DVec2::new(width, height);
    match loaded {
        Some(pixels) => guard.surface.draw_image(&pixels, top_left, size),
        None => draw_image_placeholder(&mut guard, top_left, size, style),
    }
    DrawOutcome::Drawn
}

fn draw_image_placeholder(ctx: &mut DrawContext<'_>, top_left: DVec2, size: DVec2, style: &EntityStyle) {
    let pen = &style.pen;
    ctx.surface.draw_rectangle(pen, top_left, size);
    ctx.surface.draw_line(pen, top_left, top_left + size);
    ctx.surface.draw_line(
        pen,
        DVec2::new(top_left.x + size.x, top_left.y),
        DVec2::new(top_left.x, top_left.y + size.y),
    );
    let font = ctx.font((size.y / 10.0).max(8.0));
    ctx.surface.draw_text(
        IMAGE_PLACEHOLDER_LABEL,
        &font,
        &style.brush,
        top_left + size / 2.0,
        &TextLayout::centered(),
    );
}

fn draw_wipeout(ctx: &mut DrawContext<'_>, wipeout: &Wipeout, pen: &Pen) -> DrawOutcome {
    let fill = ctx.brush(resources::background_color(ctx.options));
    let show_frame = ctx.options.show_wipeout_frame;

    match &wipeout.boundary {
        WipeoutBoundary::Rectangular(a, b) => {
            let a = ctx.map(*a);
            let b = ctx.map(*b);
            let min = a.min(b);
            let size = (b - a).abs();
            if let Err(err) = ctx.surface.fill_rectangle(&fill, min, size) {
                debug!(%err, "擦除区域填充失败");
            }
            if show_frame {
                ctx.surface.draw_rectangle(pen, min, size);
            }
        }
        WipeoutBoundary::Polygonal(vertices) => {
            if vertices.len() < 2 {
                return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
            }
            let points: Vec<DVec2> = vertices.iter().map(|p| ctx.map(*p)).collect();
            if let Err(err) = ctx.surface.fill_polygon(&fill, &points) {
                debug!(%err, "擦除区域填充失败");
            }
            if show_frame {
                ctx.surface.draw_polygon(pen, &points);
            }
        }
    }
    DrawOutcome::Drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingSurface};
    use cadraster_core::document::{EntityColor, PolylineVertex};
    use cadraster_core::geometry::Bounds2D;

    fn context_parts() -> (Document, RenderOptions, ResourceCache, ViewTransform) {
        let options = RenderOptions::default();
        let bounds = Bounds2D::from_origin_size(0.0, 0.0, 100.0, 100.0);
        let view = ViewTransform::fit(&bounds, &options);
        (Document::new(), options, ResourceCache::new(), view)
    }

    #[test]
    fn state_guard_restores_frame_and_surface() {
        let (doc, options, resources, view) = context_parts();
        let mut surface = RecordingSurface::new(options.width, options.height);
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        let before = ctx.surface.transform();
        {
            let mut guard = ctx.scoped();
            guard.surface.concat_transform(DAffine2::from_scale(DVec2::splat(3.0)));
            guard.frame_mut().offset = DVec2::ZERO;
            assert_eq!(guard.depth(), 1);
        }
        assert_eq!(ctx.depth(), 0);
        assert_eq!(ctx.frame().offset, view.offset);
        assert_eq!(ctx.surface.transform(), before);
    }

    #[test]
    fn hidden_layer_is_filtered() {
        let (mut doc, options, resources, view) = context_parts();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), "OFF");
        doc.set_layer_visible("OFF", false);
        let entity = doc.entities().next().map(|(_, e)| e.clone()).expect("entity");
        let mut surface = RecordingSurface::new(options.width, options.height);
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        assert_eq!(
            draw_entity(&mut ctx, &entity),
            DrawOutcome::Skipped(SkipReason::Filtered)
        );
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn polyline_mixes_lines_and_bulge_arcs() {
        let (doc, options, resources, view) = context_parts();
        let polyline = Entity::Polyline(Polyline {
            vertices: vec![
                PolylineVertex::new(Point2::new(0.0, 0.0)),
                PolylineVertex::with_bulge(Point2::new(10.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(20.0, 0.0)),
            ],
            is_closed: true,
            layer: "0".to_string(),
            color: EntityColor::ByLayer,
        });
        let mut surface = RecordingSurface::new(options.width, options.height);
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        assert!(draw_entity(&mut ctx, &polyline).is_drawn());

        let commands = surface.commands();
        let lines = commands
            .iter()
            .filter(|c| matches!(c.command, DrawCommand::Line { .. }))
            .count();
        let arcs = commands
            .iter()
            .filter(|c| matches!(c.command, DrawCommand::Arc { .. }))
            .count();
        assert_eq!(lines, 2);
        assert_eq!(arcs, 1);
    }

    #[test]
    fn text_is_drawn_in_screen_space() {
        let (mut doc, options, resources, view) = context_parts();
        doc.add_text(Point2::new(50.0, 50.0), "Hi\\PThere", 2.5, 0.0, "0");
        let entity = doc.entities().next().map(|(_, e)| e.clone()).expect("entity");
        let mut surface = RecordingSurface::new(options.width, options.height);
        surface.set_transform(view.surface_setup());
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        assert!(draw_entity(&mut ctx, &entity).is_drawn());

        let expected = view.to_screen(view.map_point(Point2::new(50.0, 50.0)));
        let text = surface
            .commands()
            .iter()
            .find_map(|c| match &c.command {
                DrawCommand::Text { text, origin, .. } => Some((text.clone(), *origin, c.transform)),
                _ => None,
            })
            .expect("text command");
        assert_eq!(text.0, "Hi\nThere");
        assert!(text.1.distance(expected) < 1e-9);
        assert_eq!(text.2, DAffine2::IDENTITY);
        assert_eq!(surface.transform(), view.surface_setup());
    }

    #[test]
    fn missing_image_draws_placeholder() {
        let (doc, options, resources, view) = context_parts();
        let image = Entity::RasterImage(RasterImage {
            position: Point2::new(10.0, 10.0),
            width: 20.0,
            height: 10.0,
            rotation: 0.0,
            file_path: Some("definitely/missing.png".to_string()),
            layer: "0".to_string(),
            color: EntityColor::ByLayer,
        });
        let mut surface = RecordingSurface::new(options.width, options.height);
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        assert!(draw_entity(&mut ctx, &image).is_drawn());
        assert!(surface.commands().iter().any(|c| matches!(
            &c.command,
            DrawCommand::Text { text, .. } if text == IMAGE_PLACEHOLDER_LABEL
        )));
        assert!(!surface
            .commands()
            .iter()
            .any(|c| matches!(c.command, DrawCommand::Image { .. })));
    }

    #[test]
    fn wipeout_fills_with_background() {
        let (doc, options, resources, view) = context_parts();
        let wipeout = Entity::Wipeout(Wipeout {
            boundary: WipeoutBoundary::Rectangular(Point2::new(0.0, 0.0), Point2::new(5.0, 5.0)),
            layer: "0".to_string(),
            color: EntityColor::ByLayer,
        });
        let mut surface = RecordingSurface::new(options.width, options.height);
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        draw_entity(&mut ctx, &wipeout);
        let fill = surface
            .commands()
            .iter()
            .find_map(|c| match &c.command {
                DrawCommand::FillPolygon { brush, .. } => Some(brush.clone()),
                _ => None,
            })
            .expect("fill");
        assert_eq!(fill, Brush::Solid(Rgba::WHITE));
        assert!(!surface
            .commands()
            .iter()
            .any(|c| matches!(c.command, DrawCommand::Polygon { .. })));
    }
}
