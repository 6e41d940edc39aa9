use std::collections::BTreeMap;

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::aperture::{Aperture, ApertureDesc, ApertureError, ApertureId, ApertureSet, Handedness};
use crate::body::{BodyId, TrackedBody};
use crate::collision::CollisionPolicy;
use crate::config::PortalConfig;
use crate::crossing::{detect_crossing, teleport, FloorClamp};
use crate::funnel::FunnelAssist;
use crate::physics::{CollisionFilter, PhysicsHandle, PhysicsWorld};
use crate::placement::{compute_placement, PlacementError, PlacementRequest, SurfaceHit};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeleportEvent {
    pub body: BodyId,
    pub from: ApertureId,
    pub to: ApertureId,
    pub crossing_t: f32,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Per-step portal simulation state: the live apertures, the bodies that may
/// pass through them and the policies applied to both.
#[derive(Debug)]
pub struct PortalWorld {
    config: PortalConfig,
    apertures: ApertureSet,
    bodies: BTreeMap<BodyId, TrackedBody>,
    collision: CollisionPolicy,
    funnel: FunnelAssist,
}

impl PortalWorld {
    pub fn new(config: PortalConfig) -> Self {
        let config = config.sanitize();
        let funnel = FunnelAssist::new(&config.funnel);
        Self {
            config,
            apertures: ApertureSet::new(),
            bodies: BTreeMap::new(),
            collision: CollisionPolicy::new(),
            funnel,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn apertures(&self) -> &ApertureSet {
        &self.apertures
    }

    pub fn body(&self, id: BodyId) -> Option<&TrackedBody> {
        self.bodies.get(&id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = &TrackedBody> {
        self.bodies.values()
    }

    /// Starts tracking `body`, taking its current physics position as the
    /// baseline against every live aperture.
    pub fn track_body<P: PhysicsWorld + ?Sized>(&mut self, physics: &P, mut body: TrackedBody) {
        if let Some(state) = physics.body_state(body.id) {
            for aperture in self.apertures.iter() {
                body.set_baseline(aperture.id, aperture.signed_distance(state.position), state.position);
            }
        }
        debug!("Tracking body {} ({:?})", body.id.0, body.kind);
        self.bodies.insert(body.id, body);
    }

    pub fn untrack_body<P: PhysicsWorld + ?Sized>(
        &mut self,
        physics: &mut P,
        id: BodyId,
    ) -> Option<TrackedBody> {
        let body = self.bodies.remove(&id)?;
        if self.collision.is_suppressed(id) {
            physics.set_collision_filter(PhysicsHandle::Body(id), CollisionFilter::for_body(body.kind));
            self.collision.forget(id);
        }
        Some(body)
    }

    pub fn insert_aperture<P: PhysicsWorld + ?Sized>(
        &mut self,
        physics: &mut P,
        handedness: Handedness,
        desc: ApertureDesc,
    ) -> Result<ApertureId, ApertureError> {
        let (id, replaced) = self.apertures.place(handedness, desc)?;
        if let Some(old) = replaced {
            self.retire_aperture(physics, &old);
        }
        if let Some(aperture) = self.apertures.get(id) {
            self.collision.aperture_added(physics, aperture);
            info!(
                "Placed {:?} aperture {} at {:?} facing {:?}",
                handedness,
                id.0,
                aperture.position,
                aperture.normal()
            );
        }
        Ok(id)
    }

    /// Places an aperture from a raycast hit on a surface.
    pub fn place_aperture<P: PhysicsWorld + ?Sized>(
        &mut self,
        physics: &mut P,
        request: &PlacementRequest,
        hit: &SurfaceHit,
    ) -> Result<ApertureId, PlacementError> {
        let desc = compute_placement(request, hit, &self.apertures, &self.config.placement)
            .inspect_err(|err| debug!("Rejected {:?} placement: {err}", request.handedness))?;
        Ok(self.insert_aperture(physics, request.handedness, desc)?)
    }

    pub fn remove_aperture<P: PhysicsWorld + ?Sized>(
        &mut self,
        physics: &mut P,
        handedness: Handedness,
    ) -> Option<Aperture> {
        let removed = self.apertures.remove(handedness)?;
        self.retire_aperture(physics, &removed);
        info!("Removed {:?} aperture {}", handedness, removed.id.0);
        Some(removed)
    }

    fn retire_aperture<P: PhysicsWorld + ?Sized>(&mut self, physics: &mut P, aperture: &Aperture) {
        self.collision.aperture_removed(physics, aperture, &self.apertures);
        for body in self.bodies.values_mut() {
            body.forget_aperture(aperture.id);
        }
    }

    /// Runs the portal logic for one simulation step, after the physics
    /// engine has integrated. Returns the teleports that happened, ordered by body.
    pub fn step<P: PhysicsWorld + ?Sized>(&mut self, physics: &mut P) -> Vec<TeleportEvent> {
        let contacts = physics.contacts();
        self.collision
            .update(physics, &contacts, &self.bodies, &self.apertures);

        if self.config.funnel.enabled && self.apertures.is_linked() {
            self.apply_funnel(physics);
        }

        let mut events = Vec::new();
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        for id in ids {
            let Some(state) = physics.body_state(id) else {
                warn!("Tracked body {} has no physics state, skipping", id.0);
                continue;
            };

            if let Some(bounds) = self.config.world_bounds {
                if !bounds.contains(state.position) {
                    info!("Body {} left the world bounds, respawning", id.0);
                    physics.set_position(id, bounds.respawn);
                    physics.set_velocity(id, Vec3::ZERO);
                    if let Some(body) = self.bodies.get_mut(&id) {
                        body.clear_baselines();
                    }
                    continue;
                }
            }

            if let Some(event) = self.process_body(physics, id) {
                events.push(event);
            }
        }
        events
    }

    fn apply_funnel<P: PhysicsWorld + ?Sized>(&self, physics: &mut P) {
        for id in self.bodies.keys() {
            let Some(state) = physics.body_state(*id) else {
                continue;
            };
            for aperture in self.apertures.iter() {
                if let Some(impulse) = self.funnel.impulse(aperture, state.position) {
                    physics.apply_impulse(*id, impulse);
                }
            }
        }
    }

    /// Checks one body against every live aperture; at most one teleport fires.
    fn process_body<P: PhysicsWorld + ?Sized>(
        &mut self,
        physics: &mut P,
        id: BodyId,
    ) -> Option<TeleportEvent> {
        let state = physics.body_state(id)?;
        let body = self.bodies.get_mut(&id)?;

        let mut crossed = None;
        for aperture in self.apertures.iter() {
            let current = aperture.signed_distance(state.position);
            let previous = body.baseline(aperture.id);
            // On the plane the body has no side yet; keep the last one it had.
            if current != 0.0 || previous.is_none() {
                body.set_baseline(aperture.id, current, state.position);
            }
            let Some(previous) = previous else {
                continue;
            };

            if crossed.is_some() {
                continue;
            }
            if let Some(crossing) = detect_crossing(aperture, previous, state.position, body.center_offset) {
                crossed = Some((aperture.id, crossing));
            }
        }

        let (source_id, crossing) = crossed?;
        let (source, destination) = match self.apertures.endpoints(source_id) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                debug!("Body {} crossed aperture {}: {err}", id.0, source_id.0);
                return None;
            }
        };

        let floor = FloorClamp {
            floor_height: self.config.teleport.floor_height,
            standing_height: body.standing_height,
            tolerance: self.config.teleport.floor_tolerance,
        };
        let after = teleport(source, destination, &state, &floor);
        physics.set_position(id, after.position);
        physics.set_orientation(id, after.orientation);
        physics.set_velocity(id, after.velocity);

        for aperture in [source, destination] {
            body.set_baseline(aperture.id, aperture.signed_distance(after.position), after.position);
        }

        info!(
            "Body {} teleported {} -> {} at t={:.3}, now at {:?}",
            id.0, source.id.0, destination.id.0, crossing.t, after.position
        );
        Some(TeleportEvent {
            body: id,
            from: source.id,
            to: destination.id,
            crossing_t: crossing.t,
            position: after.position,
            velocity: after.velocity,
        })
    }
}
