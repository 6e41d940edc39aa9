use aperture_shared::aperture::{Aperture, ApertureId};
use aperture_shared::transform::{compute_clipped_projection, compute_destination_view};
use glam::{Mat4, Vec3};
use tracing::{debug, warn};

use crate::renderer::backend::RenderBackend;
use crate::renderer::frustum::{aperture_is_visible, extract_frustum_planes, faces_eye};
use crate::renderer::scene::{ItemTag, SceneItem};
use crate::renderer::state::{CompareFunction, RenderState, StateScope, StencilOperation, StencilState};
use crate::renderer::{PassContext, RenderStats, ViewSetup};

/// One level of the recursive portal render.
#[derive(Debug, Clone)]
pub struct RecursionFrame {
    pub level: u32,
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub apertures_visible: Vec<ApertureId>,
}

fn mask_state(level: u8) -> RenderState {
    RenderState {
        color_write: false,
        depth_write: false,
        depth_test: false,
        depth_compare: CompareFunction::Less,
        stencil: StencilState::write(CompareFunction::Equal, level, StencilOperation::IncrementClamp),
    }
}

fn terminal_state(level: u8) -> RenderState {
    RenderState {
        stencil: StencilState::test(CompareFunction::Equal, level + 1),
        ..RenderState::NORMAL
    }
}

fn unmask_state(level: u8) -> RenderState {
    RenderState {
        stencil: StencilState::write(
            CompareFunction::Equal,
            level + 1,
            StencilOperation::DecrementClamp,
        ),
        ..mask_state(level)
    }
}

fn proxy_depth_state() -> RenderState {
    RenderState {
        color_write: false,
        depth_write: true,
        depth_test: true,
        depth_compare: CompareFunction::Always,
        stencil: StencilState {
            write_mask: 0,
            ..StencilState::DISABLED
        },
    }
}

fn scene_state(level: u8) -> RenderState {
    RenderState {
        stencil: StencilState::test(CompareFunction::LessEqual, level),
        ..RenderState::NORMAL
    }
}

/// Renders the scene through every linked aperture with stencil-masked
/// recursion down to `max_recursion` levels.
pub fn render_recursive<B: RenderBackend + ?Sized>(
    backend: &mut B,
    ctx: &PassContext<'_>,
    setup: &ViewSetup,
) -> RenderStats {
    let mut stats = RenderStats::default();
    let candidates: Vec<ApertureId> = match ctx.apertures.linked_pair() {
        Some((a, b)) => vec![a.id, b.id],
        None => Vec::new(),
    };

    let mut scope = StateScope::new(backend);
    render_level(
        &mut *scope,
        ctx,
        0,
        setup.view,
        setup.projection,
        setup.eye,
        &candidates,
        &mut stats,
    );
    stats
}

/// One recursion level. Levels past `max_recursion` draw nothing.
#[allow(clippy::too_many_arguments)]
pub fn render_level<B: RenderBackend + ?Sized>(
    backend: &mut B,
    ctx: &PassContext<'_>,
    level: u32,
    view: Mat4,
    projection: Mat4,
    eye: Vec3,
    candidates: &[ApertureId],
    stats: &mut RenderStats,
) {
    if level > ctx.max_recursion {
        debug!("Recursion level {level} past limit {}, stopping", ctx.max_recursion);
        stats.truncated_levels += 1;
        return;
    }
    stats.deepest_level = stats.deepest_level.max(level);

    let frame = RecursionFrame {
        level,
        view,
        projection,
        eye,
        apertures_visible: visible_apertures(ctx, candidates, &view, &projection, eye),
    };
    let reference = level as u8;

    for &id in &frame.apertures_visible {
        let (source, destination) = match ctx.apertures.endpoints(id) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                debug!("Skipping aperture {} at level {level}: {err}", id.0);
                continue;
            }
        };
        let Some(proxy) = ctx.scene.aperture_proxy(source.id) else {
            warn!("Aperture {} has no proxy geometry, skipping", source.id.0);
            continue;
        };

        backend.apply_state(&mask_state(reference));
        draw(backend, &[proxy], &frame.view, &frame.projection, stats);

        let destination_view = compute_destination_view(source, destination, frame.view);
        let destination_projection =
            compute_clipped_projection(destination, destination_view, frame.projection);
        let destination_eye = destination_view.inverse().w_axis.truncate();

        if level == ctx.max_recursion {
            backend.apply_state(&terminal_state(reference));
            backend.clear_depth();
            let items = ctx.scene.select(|item| {
                !is_endpoint_proxy(item, source, destination)
                    && proxy_faces_eye(ctx, item, destination_eye)
            });
            draw(backend, &items, &destination_view, &destination_projection, stats);
            stats.terminal_views += 1;
        } else {
            render_level(
                backend,
                ctx,
                level + 1,
                destination_view,
                destination_projection,
                destination_eye,
                &[source.id, destination.id],
                stats,
            );
        }

        backend.apply_state(&unmask_state(reference));
        draw(backend, &[proxy], &frame.view, &frame.projection, stats);
    }

    composite(backend, ctx, &frame, stats);
}

fn visible_apertures(
    ctx: &PassContext<'_>,
    candidates: &[ApertureId],
    view: &Mat4,
    projection: &Mat4,
    eye: Vec3,
) -> Vec<ApertureId> {
    let planes = ctx
        .cull_invisible
        .then(|| extract_frustum_planes(*projection * *view));
    candidates
        .iter()
        .filter_map(|id| ctx.apertures.get(*id))
        .filter(|aperture| aperture.pair().is_some())
        .filter(|aperture| aperture_is_visible(aperture, eye, planes.as_ref()))
        .map(|aperture| aperture.id)
        .collect()
}

fn proxy_faces_eye(ctx: &PassContext<'_>, item: &SceneItem, eye: Vec3) -> bool {
    match item.tag {
        ItemTag::Aperture(id) => ctx
            .apertures
            .get(id)
            .is_none_or(|aperture| faces_eye(aperture, eye)),
        _ => true,
    }
}

/// Lays down the depth of the apertures drawn at this level so the ordinary
/// scene cannot cover their views, then draws the scene for this level's
/// stencil region. Proxies seen from behind are left out of both passes.
fn composite<B: RenderBackend + ?Sized>(
    backend: &mut B,
    ctx: &PassContext<'_>,
    frame: &RecursionFrame,
    stats: &mut RenderStats,
) {
    backend.apply_state(&proxy_depth_state());
    backend.clear_depth();
    let proxies: Vec<&SceneItem> = frame
        .apertures_visible
        .iter()
        .filter_map(|id| ctx.scene.aperture_proxy(*id))
        .collect();
    if !proxies.is_empty() {
        draw(backend, &proxies, &frame.view, &frame.projection, stats);
    }

    backend.apply_state(&scene_state(frame.level as u8));
    let items = ctx.scene.select(|item| {
        proxy_faces_eye(ctx, item, frame.eye)
            && (frame.level > 0 || !ctx.direct_view_exclusions.contains(&item.tag.class()))
    });
    draw(backend, &items, &frame.view, &frame.projection, stats);
}

/// Both ends of the pair are left out of a terminal view: the destination
/// quad lies exactly on the clipped near plane.
fn is_endpoint_proxy(item: &SceneItem, source: &Aperture, destination: &Aperture) -> bool {
    item.tag == ItemTag::Aperture(source.id) || item.tag == ItemTag::Aperture(destination.id)
}

fn draw<B: RenderBackend + ?Sized>(
    backend: &mut B,
    items: &[&SceneItem],
    view: &Mat4,
    projection: &Mat4,
    stats: &mut RenderStats,
) {
    backend.render_subset(items, view, projection);
    stats.draw_calls += 1;
}
