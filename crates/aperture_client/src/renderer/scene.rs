use aperture_shared::aperture::{Aperture, ApertureId, ApertureSet};
use aperture_shared::config::ItemClass;
use aperture_shared::physics::Aabb;
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Cube spanning [-1, 1] on every axis.
pub const CUBE_MESH: MeshId = MeshId(0);
/// Quad in the XY plane spanning [-1, 1], facing +Z.
pub const QUAD_MESH: MeshId = MeshId(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemTag {
    World,
    Avatar,
    Prop,
    Aperture(ApertureId),
}

impl ItemTag {
    pub fn class(self) -> ItemClass {
        match self {
            Self::World => ItemClass::World,
            Self::Avatar => ItemClass::Avatar,
            Self::Prop => ItemClass::Prop,
            Self::Aperture(_) => ItemClass::Aperture,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneItem {
    pub id: ItemId,
    pub tag: ItemTag,
    pub mesh: MeshId,
    pub model: Mat4,
    pub color: [f32; 4],
    /// World-space bounds of the transformed mesh.
    pub bounds: Aabb,
}

/// Flat list of renderable items. Aperture proxies are kept in sync with the
/// live aperture set through [`Scene::sync_apertures`].
#[derive(Debug, Default)]
pub struct Scene {
    items: Vec<SceneItem>,
    proxies: FxHashMap<ApertureId, ItemId>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item whose mesh spans `local_bounds` before `model` is applied.
    pub fn insert(
        &mut self,
        tag: ItemTag,
        mesh: MeshId,
        model: Mat4,
        local_bounds: Aabb,
        color: [f32; 4],
    ) -> ItemId {
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.items.push(SceneItem {
            id,
            tag,
            mesh,
            model,
            color,
            bounds: transform_bounds(model, local_bounds),
        });
        id
    }

    pub fn remove(&mut self, id: ItemId) -> Option<SceneItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(index);
        if let ItemTag::Aperture(aperture) = removed.tag {
            self.proxies.remove(&aperture);
        }
        Some(removed)
    }

    pub fn set_model(&mut self, id: ItemId, model: Mat4, local_bounds: Aabb) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.model = model;
            item.bounds = transform_bounds(model, local_bounds);
        }
    }

    pub fn items(&self) -> &[SceneItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&SceneItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn aperture_proxy(&self, aperture: ApertureId) -> Option<&SceneItem> {
        self.proxies.get(&aperture).and_then(|id| self.get(*id))
    }

    /// Items for which `keep` returns true, in insertion order.
    pub fn select(&self, keep: impl Fn(&SceneItem) -> bool) -> Vec<&SceneItem> {
        self.items.iter().filter(|item| keep(item)).collect()
    }

    /// Creates, moves and drops aperture proxy quads so there is exactly one
    /// per live aperture. `quad` is a unit quad in the XY plane spanning [-1, 1].
    pub fn sync_apertures(&mut self, apertures: &ApertureSet, quad: MeshId) {
        let stale: Vec<ItemId> = self
            .proxies
            .iter()
            .filter(|(aperture, _)| apertures.get(**aperture).is_none())
            .map(|(_, item)| *item)
            .collect();
        for item in stale {
            self.remove(item);
        }

        for aperture in apertures.iter() {
            let model = proxy_model(aperture);
            match self.proxies.get(&aperture.id).copied() {
                Some(item) => self.set_model(item, model, unit_quad_bounds()),
                None => {
                    let item = self.insert(
                        ItemTag::Aperture(aperture.id),
                        quad,
                        model,
                        unit_quad_bounds(),
                        proxy_color(aperture),
                    );
                    self.proxies.insert(aperture.id, item);
                }
            }
        }
    }
}

pub fn unit_quad_bounds() -> Aabb {
    Aabb {
        min: Vec3::new(-1.0, -1.0, 0.0),
        max: Vec3::new(1.0, 1.0, 0.0),
    }
}

pub fn proxy_model(aperture: &Aperture) -> Mat4 {
    aperture.world_matrix()
        * Mat4::from_scale(aperture.half_extent.extend(1.0))
}

fn proxy_color(aperture: &Aperture) -> [f32; 4] {
    match aperture.stencil_index {
        1 => [1.0, 165.0 / 255.0, 0.0, 1.0],
        _ => [0.0, 130.0 / 255.0, 1.0, 1.0],
    }
}

pub fn transform_bounds(model: Mat4, local: Aabb) -> Aabb {
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for i in 0..8 {
        let corner = Vec3::new(
            if i & 1 == 0 { local.min.x } else { local.max.x },
            if i & 2 == 0 { local.min.y } else { local.max.y },
            if i & 4 == 0 { local.min.z } else { local.max.z },
        );
        let world = model.transform_point3(corner);
        min = min.min(world);
        max = max.max(world);
    }
    Aabb { min, max }
}

#[cfg(test)]
mod tests {
    use aperture_shared::aperture::{ApertureDesc, ApertureSet, Handedness};
    use aperture_shared::config::ItemClass;
    use aperture_shared::physics::Aabb;
    use glam::{Mat4, Quat, Vec2, Vec3};

    use super::{ItemTag, MeshId, Scene};

    #[test]
    fn proxies_follow_aperture_set() {
        let mut set = ApertureSet::new();
        let mut scene = Scene::new();
        let wall = scene.insert(
            ItemTag::World,
            MeshId(0),
            Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)),
            Aabb {
                min: Vec3::splat(-1.0),
                max: Vec3::splat(1.0),
            },
            [1.0; 4],
        );

        let (a, _) = set
            .place(
                Handedness::Primary,
                ApertureDesc::new(Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY, Vec2::new(5.0, 7.5)),
            )
            .unwrap();
        scene.sync_apertures(&set, MeshId(1));
        let proxy = scene.aperture_proxy(a).unwrap();
        assert_eq!(proxy.tag.class(), ItemClass::Aperture);
        assert!(proxy.bounds.min.abs_diff_eq(Vec3::new(-5.0, -5.5, 0.0), 1.0e-5));
        assert!(proxy.bounds.max.abs_diff_eq(Vec3::new(5.0, 9.5, 0.0), 1.0e-5));
        assert_eq!(scene.items().len(), 2);

        set.remove(Handedness::Primary);
        scene.sync_apertures(&set, MeshId(1));
        assert!(scene.aperture_proxy(a).is_none());
        assert_eq!(scene.items().len(), 1);
        assert!(scene.get(wall).is_some());
    }
}
