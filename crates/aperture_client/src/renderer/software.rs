//! Coarse CPU backend for exercising the portal passes. Each item is drawn as
//! the screen rectangle covering its projected bounds at the depth of its
//! nearest corner.

use glam::{Mat4, Vec3};

use crate::renderer::backend::RenderBackend;
use crate::renderer::scene::{ItemId, SceneItem};
use crate::renderer::state::RenderState;

#[derive(Debug, Clone)]
pub enum Call {
    State(RenderState),
    ClearDepth,
    Draw {
        items: Vec<ItemId>,
        view: Mat4,
        projection: Mat4,
    },
}

pub struct SoftwareBackend {
    width: usize,
    height: usize,
    state: RenderState,
    stencil: Vec<u8>,
    depth: Vec<f32>,
    color: Vec<Option<ItemId>>,
    calls: Vec<Call>,
}

struct Footprint {
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
    depth: f32,
}

impl SoftwareBackend {
    pub fn new(width: usize, height: usize) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            state: RenderState::NORMAL,
            stencil: vec![0; len],
            depth: vec![1.0; len],
            color: vec![None; len],
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn stencil(&self) -> &[u8] {
        &self.stencil
    }

    pub fn color_at(&self, x: usize, y: usize) -> Option<ItemId> {
        self.color[y * self.width + x]
    }

    /// Every draw paired with the state it was issued under.
    pub fn draws_with_state(&self) -> Vec<(RenderState, Vec<ItemId>)> {
        let mut state = RenderState::NORMAL;
        let mut draws = Vec::new();
        for call in &self.calls {
            match call {
                Call::State(next) => state = *next,
                Call::ClearDepth => {}
                Call::Draw { items, .. } => draws.push((state, items.clone())),
            }
        }
        draws
    }

    fn footprint(&self, item: &SceneItem, clip_from_world: &Mat4) -> Option<Footprint> {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { item.bounds.min.x } else { item.bounds.max.x },
                if i & 2 == 0 { item.bounds.min.y } else { item.bounds.max.y },
                if i & 4 == 0 { item.bounds.min.z } else { item.bounds.max.z },
            );
            let clip = *clip_from_world * corner.extend(1.0);
            if clip.w <= 1.0e-4 {
                return None;
            }
            let ndc = clip.truncate() / clip.w;
            min = min.min(ndc);
            max = max.max(ndc);
        }
        if max.z < -1.0 + 1.0e-3 || min.z > 1.0 {
            return None;
        }

        let to_pixels = |ndc: f32, size: usize| (ndc + 1.0) * 0.5 * size as f32;
        let span = |lo: f32, hi: f32, size: usize| {
            let first = (lo - 0.5).ceil().max(0.0) as usize;
            let last = ((hi - 0.5).floor() + 1.0).clamp(0.0, size as f32) as usize;
            (first, last)
        };
        let (x0, x1) = span(to_pixels(min.x, self.width), to_pixels(max.x, self.width), self.width);
        // NDC y points up, rows count down.
        let (y0, y1) = span(
            to_pixels(-max.y, self.height),
            to_pixels(-min.y, self.height),
            self.height,
        );
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Footprint {
            x0,
            x1,
            y0,
            y1,
            depth: ((min.z.max(-1.0) + 1.0) * 0.5).clamp(0.0, 1.0),
        })
    }
}

impl RenderBackend for SoftwareBackend {
    fn state(&self) -> RenderState {
        self.state
    }

    fn apply_state(&mut self, state: &RenderState) {
        self.state = *state;
        self.calls.push(Call::State(*state));
    }

    fn clear_depth(&mut self) {
        for (depth, stored) in self.depth.iter_mut().zip(&self.stencil) {
            if self.state.stencil.passes(*stored) {
                *depth = 1.0;
            }
        }
        self.calls.push(Call::ClearDepth);
    }

    fn render_subset(&mut self, items: &[&SceneItem], view: &Mat4, projection: &Mat4) {
        let clip_from_world = *projection * *view;
        let state = self.state;
        for item in items {
            let Some(footprint) = self.footprint(item, &clip_from_world) else {
                continue;
            };
            for y in footprint.y0..footprint.y1 {
                for x in footprint.x0..footprint.x1 {
                    let index = y * self.width + x;
                    let stored = self.stencil[index];
                    let stencil_passed = state.stencil.passes(stored);
                    let depth_passed =
                        stencil_passed && state.depth_passes(footprint.depth, self.depth[index]);
                    self.stencil[index] = state.stencil.resolve(stored, stencil_passed, depth_passed);
                    if !depth_passed {
                        continue;
                    }
                    if state.depth_write && state.depth_test {
                        self.depth[index] = footprint.depth;
                    }
                    if state.color_write {
                        self.color[index] = Some(item.id);
                    }
                }
            }
        }
        self.calls.push(Call::Draw {
            items: items.iter().map(|item| item.id).collect(),
            view: *view,
            projection: *projection,
        });
    }
}
