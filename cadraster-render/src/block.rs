use cadraster_core::document::BlockReference;
use glam::{DAffine2, DVec2};
use tracing::debug;

use crate::dispatch::{draw_entity, DrawContext, DrawOutcome, SkipReason};

/// 块嵌套深度上限。
pub const MAX_BLOCK_DEPTH: usize = 32;

/// 块实例的局部变换：平移到插入点、旋转、缩放，再平移块基点（已乘视图缩放）。
pub fn instance_transform(insert: DVec2, rotation: f64, scale: DVec2, base_point: DVec2, view_scale: f64) -> DAffine2 {
    DAffine2::from_translation(insert)
        * DAffine2::from_angle(rotation)
        * DAffine2::from_scale(scale)
        * DAffine2::from_translation(-base_point * view_scale)
}

/// 块内线宽按较小的缩放分量折算，保证实例化后线宽不变。
pub fn instance_line_width(line_width: f64, scale: DVec2) -> f64 {
    let factor = scale.x.abs().min(scale.y.abs());
    if factor > f64::EPSILON {
        line_width / factor
    } else {
        line_width
    }
}

pub fn draw_block_reference(ctx: &mut DrawContext<'_>, reference: &BlockReference) -> DrawOutcome {
    let document = ctx.document;
    let Some(block) = document.block(&reference.name) else {
        debug!(block = %reference.name, "块定义不存在");
        return DrawOutcome::Skipped(SkipReason::MissingBlock);
    };
    if ctx.depth() >= MAX_BLOCK_DEPTH {
        debug!(block = %reference.name, depth = ctx.depth(), "块嵌套过深");
        return DrawOutcome::Skipped(SkipReason::RecursionLimit);
    }

    let insert = ctx.map(reference.insert);
    let scale = reference.scale.as_vec2();
    let frame = ctx.frame();
    let local = instance_transform(
        insert,
        reference.rotation,
        scale,
        block.base_point.as_vec2(),
        frame.scale,
    );

    let mut guard = ctx.scoped();
    guard.surface.concat_transform(local);
    {
        // 偏移已并入表面变换，缩放保留用于块内线宽与字号。
        let inner = guard.frame_mut();
        inner.offset = DVec2::ZERO;
        inner.rotation += reference.rotation;
        inner.line_width = instance_line_width(frame.line_width, scale);
    }

    let mut drawn = 0usize;
    for entity in &block.entities {
        if draw_entity(&mut guard, entity).is_drawn() {
            drawn += 1;
        }
    }
    debug!(block = %reference.name, entities = block.entities.len(), drawn, "块实例绘制完成");
    DrawOutcome::Drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RenderOptions;
    use crate::recording::{DrawCommand, RecordingSurface};
    use crate::resources::ResourceCache;
    use crate::surface::DrawingSurface;
    use crate::transform::ViewTransform;
    use cadraster_core::document::{BlockDefinition, Document, Entity, EntityColor, Line};
    use cadraster_core::geometry::{Bounds2D, Point2, Vector2};
    use std::f64::consts::FRAC_PI_2;

    fn block_document() -> Document {
        let mut doc = Document::new();
        doc.add_block_definition(BlockDefinition {
            name: "TAG".to_string(),
            base_point: Point2::new(1.0, 1.0),
            entities: vec![Entity::Line(Line {
                start: Point2::new(1.0, 1.0),
                end: Point2::new(2.0, 1.0),
                layer: "0".to_string(),
                color: EntityColor::ByBlock,
            })],
        });
        doc
    }

    #[test]
    fn block_entities_follow_instance_transform() {
        let mut doc = block_document();
        doc.add_block_reference("TAG", Point2::new(10.0, 10.0), Vector2::new(2.0, 2.0), FRAC_PI_2, "0");
        let options = RenderOptions::default();
        let view = ViewTransform::fit(&Bounds2D::from_origin_size(0.0, 0.0, 20.0, 20.0), &options);
        let resources = ResourceCache::new();
        let mut surface = RecordingSurface::new(options.width, options.height);
        surface.set_transform(view.surface_setup());

        let entity = doc.entities().last().map(|(_, e)| e.clone()).expect("insert");
        {
            let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
            assert!(draw_entity(&mut ctx, &entity).is_drawn());
            assert_eq!(ctx.depth(), 0);
        }

        let (start, end, width, transform) = surface
            .commands()
            .iter()
            .find_map(|c| match &c.command {
                DrawCommand::Line { pen, start, end } => Some((*start, *end, pen.width, c.transform)),
                _ => None,
            })
            .expect("line");
        let expected_start = view.to_screen(view.map_point(Point2::new(10.0, 10.0)));
        let expected_end = view.to_screen(view.map_point(Point2::new(10.0, 12.0)));
        assert!(transform.transform_point2(start).distance(expected_start) < 1e-6);
        assert!(transform.transform_point2(end).distance(expected_end) < 1e-6);
        assert!((width - 0.5).abs() < 1e-12);
        assert_eq!(surface.transform(), view.surface_setup());
    }

    #[test]
    fn missing_block_is_skipped() {
        let doc = Document::new();
        let reference = BlockReference {
            name: "NOPE".to_string(),
            insert: Point2::new(0.0, 0.0),
            scale: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            layer: "0".to_string(),
            color: EntityColor::ByLayer,
        };
        let options = RenderOptions::default();
        let view = ViewTransform::fit(&Bounds2D::from_origin_size(0.0, 0.0, 1.0, 1.0), &options);
        let resources = ResourceCache::new();
        let mut surface = RecordingSurface::new(options.width, options.height);
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        assert_eq!(
            draw_block_reference(&mut ctx, &reference),
            DrawOutcome::Skipped(SkipReason::MissingBlock)
        );
    }

    #[test]
    fn self_referencing_block_stops_at_depth_limit() {
        let mut doc = Document::new();
        doc.add_block_definition(BlockDefinition {
            name: "LOOP".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![Entity::BlockReference(BlockReference {
                name: "LOOP".to_string(),
                insert: Point2::new(1.0, 0.0),
                scale: Vector2::new(1.0, 1.0),
                rotation: 0.0,
                layer: "0".to_string(),
                color: EntityColor::ByLayer,
            })],
        });
        doc.add_block_reference("LOOP", Point2::new(0.0, 0.0), Vector2::new(1.0, 1.0), 0.0, "0");
        let options = RenderOptions::default();
        let view = ViewTransform::fit(&Bounds2D::from_origin_size(0.0, 0.0, 10.0, 10.0), &options);
        let resources = ResourceCache::new();
        let mut surface = RecordingSurface::new(options.width, options.height);
        let entity = doc.entities().last().map(|(_, e)| e.clone()).expect("insert");
        let mut ctx = DrawContext::new(&mut surface, &doc, &options, &resources, &view);
        assert!(draw_entity(&mut ctx, &entity).is_drawn());
        assert_eq!(ctx.depth(), 0);
        assert_eq!(ctx.surface.transform(), DAffine2::IDENTITY);
    }

    #[test]
    fn line_width_uses_smaller_scale_component() {
        assert!((instance_line_width(1.0, DVec2::new(4.0, -2.0)) - 0.5).abs() < 1e-12);
        assert!((instance_line_width(1.0, DVec2::ZERO) - 1.0).abs() < 1e-12);
    }
}
