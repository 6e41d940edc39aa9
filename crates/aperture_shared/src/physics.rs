use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::aperture::{Aperture, ApertureId, SurfaceId};
use crate::body::{BodyId, BodyKind, BodyState};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Box enclosing the opening of `aperture`, thickened by `depth` on both sides.
    pub fn around_aperture(aperture: &Aperture, depth: f32) -> Self {
        let offset = aperture.normal() * depth;
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in aperture.corners() {
            for point in [corner + offset, corner - offset] {
                min = min.min(point);
                max = max.max(point);
            }
        }
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionGroups: u32 {
        const WALLS = 1 << 0;
        const PROPS = 1 << 1;
        const APERTURE = 1 << 2;
        const PLAYER = 1 << 3;
        const RAYCAST = 1 << 4;
        const GROUND = 1 << 5;
        const APERTURE_HOST = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub group: CollisionGroups,
    pub mask: CollisionGroups,
}

impl CollisionFilter {
    pub fn for_body(kind: BodyKind) -> Self {
        match kind {
            BodyKind::Player => Self {
                group: CollisionGroups::PLAYER,
                mask: CollisionGroups::all() - CollisionGroups::PLAYER,
            },
            BodyKind::HeldProp | BodyKind::Prop => Self {
                group: CollisionGroups::PROPS,
                mask: CollisionGroups::all(),
            },
        }
    }

    pub fn wall() -> Self {
        Self {
            group: CollisionGroups::WALLS,
            mask: CollisionGroups::all(),
        }
    }

    pub fn aperture_host() -> Self {
        Self {
            group: CollisionGroups::APERTURE_HOST,
            mask: CollisionGroups::all(),
        }
    }

    pub fn aperture_proxy() -> Self {
        Self {
            group: CollisionGroups::APERTURE,
            mask: CollisionGroups::PLAYER | CollisionGroups::PROPS,
        }
    }

    /// Both sides must accept each other for a collision to be resolved.
    pub fn interacts_with(&self, other: &CollisionFilter) -> bool {
        self.mask.intersects(other.group) && other.mask.intersects(self.group)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhysicsHandle {
    Body(BodyId),
    Aperture(ApertureId),
    Surface(SurfaceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactPair {
    pub a: PhysicsHandle,
    pub b: PhysicsHandle,
}

impl ContactPair {
    /// Returns the body and aperture when this contact is between exactly those two.
    pub fn body_aperture(&self) -> Option<(BodyId, ApertureId)> {
        match (self.a, self.b) {
            (PhysicsHandle::Body(body), PhysicsHandle::Aperture(aperture))
            | (PhysicsHandle::Aperture(aperture), PhysicsHandle::Body(body)) => {
                Some((body, aperture))
            }
            _ => None,
        }
    }
}

/// The rigid-body engine the portal core drives. Integration and constraint
/// solving stay on the other side of this trait.
pub trait PhysicsWorld {
    fn step(&mut self, dt: f32);
    fn body_state(&self, body: BodyId) -> Option<BodyState>;
    fn contacts(&self) -> Vec<ContactPair>;
    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3);
    fn set_velocity(&mut self, body: BodyId, velocity: Vec3);
    fn set_position(&mut self, body: BodyId, position: Vec3);
    fn set_orientation(&mut self, body: BodyId, orientation: Quat);
    fn set_collision_filter(&mut self, handle: PhysicsHandle, filter: CollisionFilter);

    /// Creates, moves or (with `None`) removes the physical proxy of an aperture.
    fn set_aperture_proxy(&mut self, _aperture: ApertureId, _proxy: Option<Aabb>) {}
}

#[derive(Debug, Clone)]
struct KinematicBody {
    state: BodyState,
    half_extents: Vec3,
    inv_mass: f32,
    filter: CollisionFilter,
}

#[derive(Debug, Clone)]
struct StaticCollider {
    bounds: Aabb,
    filter: CollisionFilter,
}

/// Small axis-separated integrator used by the tools and tests in place of a
/// full physics engine. Bodies are boxes, surfaces are static boxes and
/// aperture proxies are overlap-only sensors.
#[derive(Debug, Clone, Default)]
pub struct KinematicWorld {
    pub gravity: Vec3,
    bodies: BTreeMap<BodyId, KinematicBody>,
    surfaces: FxHashMap<SurfaceId, StaticCollider>,
    apertures: FxHashMap<ApertureId, StaticCollider>,
    contacts: Vec<ContactPair>,
}

impl KinematicWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            ..Self::default()
        }
    }

    pub fn insert_body(
        &mut self,
        id: BodyId,
        kind: BodyKind,
        state: BodyState,
        half_extents: Vec3,
        mass: f32,
    ) {
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.bodies.insert(
            id,
            KinematicBody {
                state,
                half_extents,
                inv_mass,
                filter: CollisionFilter::for_body(kind),
            },
        );
    }

    pub fn remove_body(&mut self, id: BodyId) -> Option<BodyState> {
        self.bodies.remove(&id).map(|body| body.state)
    }

    pub fn insert_surface(&mut self, id: SurfaceId, bounds: Aabb) {
        self.surfaces.insert(
            id,
            StaticCollider {
                bounds,
                filter: CollisionFilter::wall(),
            },
        );
    }

    pub fn collision_filter(&self, handle: PhysicsHandle) -> Option<CollisionFilter> {
        match handle {
            PhysicsHandle::Body(id) => self.bodies.get(&id).map(|b| b.filter),
            PhysicsHandle::Surface(id) => self.surfaces.get(&id).map(|s| s.filter),
            PhysicsHandle::Aperture(id) => self.apertures.get(&id).map(|a| a.filter),
        }
    }

    fn blocked(&self, bounds: &Aabb, filter: &CollisionFilter) -> bool {
        self.surfaces
            .values()
            .any(|surface| surface.filter.interacts_with(filter) && surface.bounds.intersects(bounds))
    }

    fn integrate(&mut self, id: BodyId, dt: f32) {
        let Some(mut body) = self.bodies.get(&id).cloned() else {
            return;
        };
        if body.inv_mass > 0.0 {
            body.state.velocity += self.gravity * dt;
        }

        let displacement = body.state.velocity * dt;
        for axis in 0..3 {
            if displacement[axis] == 0.0 {
                continue;
            }
            let mut step = Vec3::ZERO;
            step[axis] = displacement[axis];
            let moved = body.state.position + step;
            let bounds = Aabb::from_center_half_extents(moved, body.half_extents);
            if self.blocked(&bounds, &body.filter) {
                body.state.velocity[axis] = 0.0;
            } else {
                body.state.position = moved;
            }
        }

        self.bodies.insert(id, body);
    }

    fn refresh_contacts(&mut self) {
        self.contacts.clear();
        for (&body_id, body) in &self.bodies {
            let bounds = Aabb::from_center_half_extents(body.state.position, body.half_extents);
            let mut touching: Vec<ApertureId> = self
                .apertures
                .iter()
                .filter(|(_, proxy)| proxy.bounds.intersects(&bounds))
                .map(|(&id, _)| id)
                .collect();
            touching.sort();
            self.contacts
                .extend(touching.into_iter().map(|aperture_id| ContactPair {
                    a: PhysicsHandle::Body(body_id),
                    b: PhysicsHandle::Aperture(aperture_id),
                }));
        }
    }
}

impl PhysicsWorld for KinematicWorld {
    fn step(&mut self, dt: f32) {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        for id in ids {
            self.integrate(id, dt);
        }
        self.refresh_contacts();
    }

    fn body_state(&self, body: BodyId) -> Option<BodyState> {
        self.bodies.get(&body).map(|b| b.state)
    }

    fn contacts(&self) -> Vec<ContactPair> {
        self.contacts.clone()
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3) {
        if let Some(body) = self.bodies.get_mut(&body) {
            body.state.velocity += impulse * body.inv_mass;
        }
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(&body) {
            body.state.velocity = velocity;
        }
    }

    fn set_position(&mut self, body: BodyId, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(&body) {
            body.state.position = position;
        }
    }

    fn set_orientation(&mut self, body: BodyId, orientation: Quat) {
        if let Some(body) = self.bodies.get_mut(&body) {
            body.state.orientation = orientation;
        }
    }

    fn set_collision_filter(&mut self, handle: PhysicsHandle, filter: CollisionFilter) {
        match handle {
            PhysicsHandle::Body(id) => {
                if let Some(body) = self.bodies.get_mut(&id) {
                    body.filter = filter;
                }
            }
            PhysicsHandle::Surface(id) => {
                if let Some(surface) = self.surfaces.get_mut(&id) {
                    surface.filter = filter;
                }
            }
            PhysicsHandle::Aperture(id) => {
                if let Some(proxy) = self.apertures.get_mut(&id) {
                    proxy.filter = filter;
                }
            }
        }
    }

    fn set_aperture_proxy(&mut self, aperture: ApertureId, proxy: Option<Aabb>) {
        match proxy {
            Some(bounds) => {
                self.apertures.insert(
                    aperture,
                    StaticCollider {
                        bounds,
                        filter: CollisionFilter::aperture_proxy(),
                    },
                );
            }
            None => {
                self.apertures.remove(&aperture);
            }
        }
    }
}
