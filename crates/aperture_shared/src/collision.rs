use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::aperture::{Aperture, ApertureSet};
use crate::body::{BodyId, TrackedBody};
use crate::physics::{Aabb, CollisionFilter, CollisionGroups, ContactPair, PhysicsHandle, PhysicsWorld};

/// Half thickness of the overlap proxy placed around each aperture.
pub const PROXY_DEPTH: f32 = 1.0;

/// Keeps bodies that touch an aperture from colliding with the surface it is
/// mounted on, so they can reach the crossing plane.
#[derive(Debug, Default)]
pub struct CollisionPolicy {
    suppressed: BTreeSet<BodyId>,
}

impl CollisionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppressed_filter(body: &TrackedBody) -> CollisionFilter {
        let default = CollisionFilter::for_body(body.kind);
        CollisionFilter {
            group: default.group,
            mask: default.mask - (CollisionGroups::APERTURE_HOST | CollisionGroups::APERTURE),
        }
    }

    pub fn is_suppressed(&self, body: BodyId) -> bool {
        self.suppressed.contains(&body)
    }

    pub fn aperture_added<P: PhysicsWorld + ?Sized>(&self, physics: &mut P, aperture: &Aperture) {
        physics.set_aperture_proxy(
            aperture.id,
            Some(Aabb::around_aperture(aperture, PROXY_DEPTH)),
        );
        if let Some(surface) = aperture.surface {
            physics.set_collision_filter(PhysicsHandle::Surface(surface), CollisionFilter::aperture_host());
        }
    }

    /// Drops the proxy of `removed` and hands its surface back to the walls
    /// unless another live aperture still sits on it.
    pub fn aperture_removed<P: PhysicsWorld + ?Sized>(
        &self,
        physics: &mut P,
        removed: &Aperture,
        remaining: &ApertureSet,
    ) {
        physics.set_aperture_proxy(removed.id, None);
        let Some(surface) = removed.surface else {
            return;
        };
        let still_hosting = remaining
            .iter()
            .any(|aperture| aperture.id != removed.id && aperture.surface == Some(surface));
        if !still_hosting {
            physics.set_collision_filter(PhysicsHandle::Surface(surface), CollisionFilter::wall());
        }
    }

    pub fn update<P: PhysicsWorld + ?Sized>(
        &mut self,
        physics: &mut P,
        contacts: &[ContactPair],
        bodies: &BTreeMap<BodyId, TrackedBody>,
        apertures: &ApertureSet,
    ) {
        let linked = apertures.is_linked();
        let touching: BTreeSet<BodyId> = contacts
            .iter()
            .filter_map(ContactPair::body_aperture)
            .filter(|(_, aperture)| apertures.get(*aperture).is_some())
            .map(|(body, _)| body)
            .collect();

        for (id, body) in bodies {
            let want = linked && touching.contains(id);
            let has = self.suppressed.contains(id);
            if want && !has {
                debug!("Suppressing aperture host collisions for body {}", id.0);
                physics.set_collision_filter(PhysicsHandle::Body(*id), Self::suppressed_filter(body));
                self.suppressed.insert(*id);
            } else if !want && has {
                debug!("Restoring collisions for body {}", id.0);
                physics.set_collision_filter(PhysicsHandle::Body(*id), CollisionFilter::for_body(body.kind));
                self.suppressed.remove(id);
            }
        }

        self.suppressed.retain(|id| bodies.contains_key(id));
    }

    pub fn forget(&mut self, body: BodyId) {
        self.suppressed.remove(&body);
    }
}
