use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cadraster_core::document::{Document, Entity, EntityId};
use cadraster_core::geometry::Bounds2D;
use glam::DVec2;
use rayon::prelude::*;
use tiny_skia::Pixmap;
use tracing::{debug, info, warn};

use crate::bounds::{document_bounds, entity_bounds};
use crate::dispatch::{self, DrawContext, DrawOutcome, PreparedEntity, should_draw};
use crate::errors::RenderError;
use crate::options::RenderOptions;
use crate::pixmap::{PixmapSurface, encode_png};
use crate::resources::{ResourceCache, Rgba, background_color};
use crate::surface::{DrawingSurface, Pen};
use crate::transform::ViewTransform;

/// 一次渲染的统计结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    pub entities: usize,
    pub drawn: usize,
    pub skipped: usize,
    pub bounds: Bounds2D,
    pub scale: f64,
}

/// 光栅输出：像素与本次渲染统计。
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub pixmap: Pixmap,
    pub summary: RenderSummary,
}

/// 渲染会话：持有文档、选项与资源池，析构时释放资源。
#[derive(Debug)]
pub struct Renderer {
    document: Document,
    options: RenderOptions,
    resources: Arc<ResourceCache>,
    parallel: bool,
    font_path: Option<PathBuf>,
    view: Option<(Bounds2D, ViewTransform)>,
}

impl Renderer {
    pub fn new(document: Document, options: RenderOptions) -> Self {
        Self {
            document,
            options,
            resources: Arc::new(ResourceCache::new()),
            parallel: false,
            font_path: None,
            view: None,
        }
    }

    /// 按图层分组并行准备实体，绘制仍按文档顺序串行进行。
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 与其他会话共用资源池；本会话析构时仍会清空它。
    pub fn with_resources(mut self, resources: Arc<ResourceCache>) -> Self {
        self.resources = resources;
        self
    }

    /// 光栅输出使用的 TrueType 字体。
    pub fn with_font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// 最近一次计算的视图变换。
    pub fn view(&self) -> Option<ViewTransform> {
        self.view.map(|(_, view)| view)
    }

    fn fit_view(&mut self) -> (Bounds2D, ViewTransform) {
        let bounds = document_bounds(&self.document, &self.options);
        let view = ViewTransform::fit(&bounds, &self.options);
        debug!(
            width = bounds.width(),
            height = bounds.height(),
            scale = view.scale,
            "视图变换已计算"
        );
        self.view = Some((bounds, view));
        (bounds, view)
    }

    /// 清空表面并绘制整个文档。
    pub fn render(&mut self, surface: &mut dyn DrawingSurface) -> Result<RenderSummary, RenderError> {
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidCanvas { width, height });
        }

        let total = self.document.entity_count();
        info!(entities = total, parallel = self.parallel, width, height, "开始渲染");
        let (bounds, view) = self.fit_view();

        surface.clear(background_color(&self.options));
        surface.set_transform(view.surface_setup());

        let mut ctx = DrawContext::new(surface, &self.document, &self.options, &self.resources, &view);
        if self.options.draw_debug_bounds {
            draw_debug_bounds(&mut ctx, &bounds, &view);
        }

        let outcomes = if self.parallel {
            render_parallel(&mut ctx)
        } else {
            render_sequential(&mut ctx)
        };

        let drawn = outcomes.iter().filter(|o| o.is_drawn()).count();
        let summary = RenderSummary {
            entities: total,
            drawn,
            skipped: outcomes.len() - drawn,
            bounds,
            scale: view.scale,
        };
        info!(drawn = summary.drawn, skipped = summary.skipped, scale = summary.scale, "渲染完成");
        Ok(summary)
    }

    /// 以当前视图在表面上追加绘制一个实体，不清空画面。
    pub fn draw_entity(&mut self, surface: &mut dyn DrawingSurface, entity: &Entity) -> DrawOutcome {
        let view = match self.view {
            Some((_, view)) => view,
            None => self.fit_view().1,
        };
        let mut ctx = DrawContext::new(surface, &self.document, &self.options, &self.resources, &view);
        dispatch::draw_entity(&mut ctx, entity)
    }

    /// 绘制实体并追加到文档末尾。
    pub fn add_entity(&mut self, surface: &mut dyn DrawingSurface, entity: Entity) -> (EntityId, DrawOutcome) {
        let outcome = self.draw_entity(surface, &entity);
        let id = self.document.add_entity(entity);
        (id, outcome)
    }

    /// 渲染到新建的光栅表面，按需裁剪空白边。
    pub fn render_to_pixmap(&mut self) -> Result<RenderedImage, RenderError> {
        let mut surface = PixmapSurface::new(self.options.width, self.options.height)?;
        if let Some(path) = &self.font_path {
            if let Err(err) = surface.load_font_file(path) {
                warn!(path = %path.display(), %err, "字体加载失败，文字将被跳过");
            }
        }

        let summary = self.render(&mut surface)?;
        let pixmap = if self.options.crop_empty_edges {
            self.crop(&surface, &summary)
        } else {
            None
        };
        let pixmap = pixmap.unwrap_or_else(|| surface.into_pixmap());
        Ok(RenderedImage { pixmap, summary })
    }

    fn crop(&self, surface: &PixmapSurface, summary: &RenderSummary) -> Option<Pixmap> {
        let (_, view) = self.view?;
        let Some(rect) = view.crop_rect(&summary.bounds, &self.options) else {
            debug!("裁剪区域无效，保留原图");
            return None;
        };
        let cropped = surface.cropped(rect);
        if cropped.is_some() {
            debug!(x = rect.x, y = rect.y, width = rect.width, height = rect.height, "已裁剪空白边");
        }
        cropped
    }

    /// 渲染并写出 PNG，自动创建缺失的父目录。
    pub fn render_to_png(&mut self, path: impl AsRef<Path>) -> Result<RenderSummary, RenderError> {
        let path = path.as_ref();
        let rendered = self.render_to_pixmap()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RenderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = encode_png(&rendered.pixmap)?;
        fs::write(path, bytes).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            width = rendered.pixmap.width(),
            height = rendered.pixmap.height(),
            "PNG 已写出"
        );
        Ok(rendered.summary)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.resources.clear();
    }
}

fn render_sequential(ctx: &mut DrawContext<'_>) -> Vec<DrawOutcome> {
    let document = ctx.document;
    document
        .entities()
        .map(|(_, entity)| dispatch::draw_entity(ctx, entity))
        .collect()
}

/// 按图层分组在线程池上准备实体，随后按文档顺序回放到表面。
fn render_parallel(ctx: &mut DrawContext<'_>) -> Vec<DrawOutcome> {
    let document = ctx.document;
    let options = ctx.options;
    let resources = ctx.resources;
    let frame = ctx.frame();
    let entities: Vec<&Entity> = document.entities().map(|(_, entity)| entity).collect();

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, entity) in entities.iter().enumerate() {
        if should_draw(entity, document, options) {
            groups.entry(entity.layer_name()).or_default().push(index);
        }
    }
    debug!(groups = groups.len(), "按图层分组准备实体");

    let prepared: Vec<(usize, PreparedEntity)> = groups
        .par_iter()
        .flat_map_iter(|(_, indices)| {
            indices.iter().map(|&index| {
                (
                    index,
                    dispatch::prepare_entity(entities[index], document, options, resources, &frame),
                )
            })
        })
        .collect();

    let mut slots: Vec<Option<PreparedEntity>> = vec![None; entities.len()];
    for (index, entity) in prepared {
        slots[index] = Some(entity);
    }

    entities
        .iter()
        .zip(slots)
        .map(|(entity, slot)| match slot {
            Some(prepared) => dispatch::draw_prepared(ctx, entity, &prepared),
            None => DrawOutcome::Skipped(dispatch::SkipReason::Filtered),
        })
        .collect()
}

fn draw_debug_bounds(ctx: &mut DrawContext<'_>, bounds: &Bounds2D, view: &ViewTransform) {
    let outline = Pen::solid(Rgba::RED, 2.0);
    let min = view.map_point(bounds.min());
    let size = DVec2::new(bounds.width(), bounds.height()) * view.scale;
    ctx.surface.draw_rectangle(&outline, min, size);

    let dashed = Pen::dashed(Rgba::RED, 1.0);
    let document = ctx.document;
    for (_, entity) in document.entities() {
        if !should_draw(entity, document, ctx.options) {
            continue;
        }
        if let Some(extent) = entity_bounds(entity) {
            let min = view.map_point(extent.min());
            let size = DVec2::new(extent.width(), extent.height()) * view.scale;
            ctx.surface.draw_rectangle(&dashed, min, size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingSurface};
    use cadraster_core::geometry::Point2;

    fn sample_document() -> Document {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), "A");
        doc.add_circle(Point2::new(50.0, 50.0), 10.0, "B");
        doc.add_line(Point2::new(0.0, 100.0), Point2::new(100.0, 100.0), "A");
        doc.add_text(Point2::new(10.0, 10.0), "note", 2.5, 0.0, "C");
        doc
    }

    #[test]
    fn render_clears_and_counts_outcomes() {
        let mut renderer = Renderer::new(sample_document(), RenderOptions::default());
        let mut surface = RecordingSurface::new(1200, 1600);
        let summary = renderer.render(&mut surface).expect("render");
        assert_eq!(summary.entities, 4);
        assert_eq!(summary.drawn, 4);
        assert_eq!(summary.skipped, 0);
        assert!(matches!(
            surface.commands().first().map(|c| &c.command),
            Some(DrawCommand::Clear(Rgba::WHITE))
        ));
        assert_eq!(surface.state_depth(), 0);
    }

    #[test]
    fn parallel_mode_matches_sequential_output() {
        let mut sequential = Renderer::new(sample_document(), RenderOptions::default());
        let mut parallel = Renderer::new(sample_document(), RenderOptions::default()).with_parallel(true);
        let mut a = RecordingSurface::new(1200, 1600);
        let mut b = RecordingSurface::new(1200, 1600);
        let first = sequential.render(&mut a).expect("sequential");
        let second = parallel.render(&mut b).expect("parallel");
        assert_eq!(first, second);
        assert_eq!(a.commands(), b.commands());
    }

    #[test]
    fn zero_sized_surface_is_rejected() {
        let mut renderer = Renderer::new(Document::new(), RenderOptions::default());
        let mut surface = RecordingSurface::new(0, 100);
        assert!(matches!(
            renderer.render(&mut surface),
            Err(RenderError::InvalidCanvas { width: 0, height: 100 })
        ));
    }

    #[test]
    fn debug_bounds_draw_outline_and_dashed_boxes() {
        let options = RenderOptions {
            draw_debug_bounds: true,
            ..RenderOptions::default()
        };
        let mut renderer = Renderer::new(sample_document(), options);
        let mut surface = RecordingSurface::new(1200, 1600);
        renderer.render(&mut surface).expect("render");
        let outlines: Vec<&Pen> = surface
            .commands()
            .iter()
            .filter_map(|c| match &c.command {
                DrawCommand::Polygon { pen, .. } if pen.color == Rgba::RED => Some(pen),
                _ => None,
            })
            .collect();
        assert_eq!(outlines.len(), 5);
        assert!((outlines[0].width - 2.0).abs() < 1e-12);
        assert!(outlines[1..].iter().all(|pen| pen.dash.is_some()));
    }

    #[test]
    fn add_entity_draws_and_appends() {
        let mut renderer = Renderer::new(sample_document(), RenderOptions::default());
        let mut surface = RecordingSurface::new(1200, 1600);
        renderer.render(&mut surface).expect("render");
        let before = surface.commands().len();
        let line = Entity::Line(cadraster_core::document::Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(10.0, 10.0),
            layer: "NEW".to_string(),
            color: Default::default(),
        });
        let (id, outcome) = renderer.add_entity(&mut surface, line);
        assert!(outcome.is_drawn());
        assert_eq!(surface.commands().len(), before + 1);
        assert!(renderer.document().entity(id).is_some());
        assert!(renderer.document().layer("NEW").is_some());
    }

    #[test]
    fn shared_resources_are_cleared_when_renderer_drops() {
        let shared = Arc::new(ResourceCache::new());
        let mut renderer =
            Renderer::new(sample_document(), RenderOptions::default()).with_resources(Arc::clone(&shared));
        let mut surface = RecordingSurface::new(1200, 1600);
        renderer.render(&mut surface).expect("render");
        assert!(!shared.is_empty());
        assert!(renderer.resources().len().0 >= 1);
        drop(renderer);
        assert!(shared.is_empty());
        assert_eq!(shared.len(), (0, 0, 0));
    }
}
