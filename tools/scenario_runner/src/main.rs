use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use aperture_shared::physics::{Aabb, KinematicWorld, PhysicsWorld};
use aperture_shared::{
    ApertureDesc, BodyId, BodyKind, BodyState, Handedness, PortalConfig, PortalWorld, SurfaceId,
    TrackedBody,
};
use glam::{Quat, Vec2, Vec3};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default = "default_steps")]
    steps: u32,
    #[serde(default = "default_dt")]
    dt: f32,
    #[serde(default)]
    gravity: Vec3,
    #[serde(default)]
    config: PortalConfig,
    #[serde(default)]
    surfaces: Vec<SurfaceSpec>,
    #[serde(default)]
    apertures: Vec<ApertureSpec>,
    #[serde(default)]
    bodies: Vec<BodySpec>,
}

#[derive(Debug, Deserialize)]
struct SurfaceSpec {
    id: u32,
    min: Vec3,
    max: Vec3,
}

/// Either `size` (an axis-aligned box flat on one axis) or a yaw plus an
/// optional half extent.
#[derive(Debug, Deserialize)]
struct ApertureSpec {
    handedness: Handedness,
    position: Vec3,
    #[serde(default)]
    yaw_deg: f32,
    #[serde(default)]
    half_extent: Option<Vec2>,
    #[serde(default)]
    size: Option<Vec3>,
    #[serde(default)]
    surface: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BodySpec {
    id: u32,
    #[serde(default = "default_kind")]
    kind: BodyKind,
    position: Vec3,
    #[serde(default)]
    velocity: Vec3,
    #[serde(default)]
    yaw_deg: f32,
    #[serde(default = "default_body_half_extents")]
    half_extents: Vec3,
    #[serde(default = "default_mass")]
    mass: f32,
}

fn default_steps() -> u32 {
    60
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

fn default_kind() -> BodyKind {
    BodyKind::Prop
}

fn default_body_half_extents() -> Vec3 {
    Vec3::splat(0.5)
}

fn default_mass() -> f32 {
    1.0
}

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut scenario_path = PathBuf::from("demos/hallway.toml");
    let mut steps_override: Option<u32> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--steps" => {
                let Some(value) = args.next() else {
                    eprintln!("--steps expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u32>() {
                    Ok(parsed) => steps_override = Some(parsed),
                    Err(err) => {
                        eprintln!("invalid step count '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--help" | "-h" => {
                println!("Usage: scenario_runner [<scenario.toml>] [--steps <u32>]");
                return;
            }
            other if other.starts_with('-') => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
            path => scenario_path = PathBuf::from(path),
        }
    }

    if let Err(err) = run(&scenario_path, steps_override) {
        eprintln!("scenario_runner error: {err}");
        std::process::exit(1);
    }
}

fn run(path: &Path, steps_override: Option<u32>) -> Result<(), String> {
    let source = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let scenario: Scenario = toml::from_str(&source)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))?;

    let steps = steps_override.unwrap_or(scenario.steps);
    if !(scenario.dt.is_finite() && scenario.dt > 0.0) {
        return Err(format!("dt must be positive, got {}", scenario.dt));
    }

    let config = scenario.config.sanitize();
    let mut physics = KinematicWorld::new(scenario.gravity);
    let mut world = PortalWorld::new(config.clone());

    for surface in &scenario.surfaces {
        physics.insert_surface(
            SurfaceId(surface.id),
            Aabb {
                min: surface.min.min(surface.max),
                max: surface.min.max(surface.max),
            },
        );
    }

    for spec in &scenario.apertures {
        let desc = aperture_desc(spec, config.aperture_half_extent)?;
        world
            .insert_aperture(&mut physics, spec.handedness, desc)
            .map_err(|err| format!("{:?} aperture rejected: {err}", spec.handedness))?;
    }
    if !world.apertures().is_linked() {
        warn!("Scenario does not link both apertures; no body can teleport");
    }

    for spec in &scenario.bodies {
        let state = BodyState {
            position: spec.position,
            orientation: Quat::from_rotation_y(spec.yaw_deg.to_radians()),
            velocity: spec.velocity,
        };
        let id = BodyId(spec.id);
        physics.insert_body(id, spec.kind, state, spec.half_extents, spec.mass);
        world.track_body(&physics, TrackedBody::new(id, spec.kind));
    }

    info!(
        "Running {} steps of {:.4}s with {} bodies",
        steps,
        scenario.dt,
        scenario.bodies.len()
    );

    let mut teleports = 0usize;
    for step in 0..steps {
        physics.step(scenario.dt);
        for event in world.step(&mut physics) {
            teleports += 1;
            println!(
                "step {:>5}  body {:>3}  aperture {} -> {}  t={:.3}  pos=({:.3}, {:.3}, {:.3})  vel=({:.3}, {:.3}, {:.3})",
                step,
                event.body.0,
                event.from.0,
                event.to.0,
                event.crossing_t,
                event.position.x,
                event.position.y,
                event.position.z,
                event.velocity.x,
                event.velocity.y,
                event.velocity.z,
            );
        }
    }

    for spec in &scenario.bodies {
        if let Some(state) = physics.body_state(BodyId(spec.id)) {
            println!(
                "final  body {:>3}  pos=({:.3}, {:.3}, {:.3})  vel=({:.3}, {:.3}, {:.3})",
                spec.id,
                state.position.x,
                state.position.y,
                state.position.z,
                state.velocity.x,
                state.velocity.y,
                state.velocity.z,
            );
        }
    }
    println!("{teleports} teleport(s) in {steps} step(s)");
    Ok(())
}

fn aperture_desc(spec: &ApertureSpec, default_half_extent: Vec2) -> Result<ApertureDesc, String> {
    let desc = match spec.size {
        Some(size) => ApertureDesc::from_axis_aligned_box(spec.position, size)
            .map_err(|err| format!("{:?} aperture: {err}", spec.handedness))?,
        None => ApertureDesc::new(
            spec.position,
            Quat::from_rotation_y(spec.yaw_deg.to_radians()),
            spec.half_extent.unwrap_or(default_half_extent),
        ),
    };
    Ok(match spec.surface {
        Some(surface) => desc.on_surface(SurfaceId(surface)),
        None => desc,
    })
}
