use aperture_shared::transform::{compute_clipped_projection, compute_destination_view};
use tracing::debug;

use crate::renderer::backend::RenderBackend;
use crate::renderer::frustum::{aperture_is_visible, extract_frustum_planes};
use crate::renderer::scene::{ItemTag, SceneItem};
use crate::renderer::state::{CompareFunction, RenderState, StateScope, StencilOperation, StencilState};
use crate::renderer::{PassContext, RenderStats, ViewSetup};

/// Single-level rendering that tags each aperture's pixels with its own
/// stencil index instead of nesting.
///
/// Proxies are drawn first, then the ordinary scene resets the stencil to 0
/// wherever it lies in front of a proxy, then each aperture's destination view
/// is drawn where the stencil still holds its index.
pub fn render_indexed<B: RenderBackend + ?Sized>(
    backend: &mut B,
    ctx: &PassContext<'_>,
    setup: &ViewSetup,
) -> RenderStats {
    let mut stats = RenderStats::default();
    let mut scope = StateScope::new(&mut *backend);

    let planes = ctx
        .cull_invisible
        .then(|| extract_frustum_planes(setup.projection * setup.view));
    let visible: Vec<_> = ctx
        .apertures
        .iter()
        .filter(|aperture| aperture.pair().is_some())
        .filter(|aperture| aperture_is_visible(aperture, setup.eye, planes.as_ref()))
        .collect();

    for aperture in &visible {
        let Some(proxy) = ctx.scene.aperture_proxy(aperture.id) else {
            continue;
        };
        scope.apply_state(&RenderState {
            color_write: false,
            stencil: StencilState::write(
                CompareFunction::Always,
                aperture.stencil_index,
                StencilOperation::Replace,
            ),
            ..RenderState::NORMAL
        });
        scope.render_subset(&[proxy], &setup.view, &setup.projection);
        stats.draw_calls += 1;
    }

    scope.apply_state(&RenderState {
        stencil: StencilState::write(CompareFunction::Always, 0, StencilOperation::Replace),
        ..RenderState::NORMAL
    });
    let direct: Vec<&SceneItem> = ctx.scene.select(|item| {
        !matches!(item.tag, ItemTag::Aperture(_))
            && !ctx.direct_view_exclusions.contains(&item.tag.class())
    });
    scope.render_subset(&direct, &setup.view, &setup.projection);
    stats.draw_calls += 1;

    for aperture in &visible {
        let (source, destination) = match ctx.apertures.endpoints(aperture.id) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                debug!("Skipping aperture {}: {err}", aperture.id.0);
                continue;
            }
        };
        let view = compute_destination_view(source, destination, setup.view);
        let projection = compute_clipped_projection(destination, view, setup.projection);

        scope.apply_state(&RenderState {
            stencil: StencilState::test(CompareFunction::Equal, source.stencil_index),
            ..RenderState::NORMAL
        });
        scope.clear_depth();
        let items = ctx.scene.select(|item| {
            item.tag != ItemTag::Aperture(source.id) && item.tag != ItemTag::Aperture(destination.id)
        });
        scope.render_subset(&items, &view, &projection);
        stats.draw_calls += 1;
        stats.terminal_views += 1;
    }

    stats
}
