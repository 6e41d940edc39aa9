use std::env;
use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};

use aperture_client::renderer::scene::{ItemTag, Scene, CUBE_MESH, QUAD_MESH};
use aperture_client::renderer::wgpu_backend::{build_cube_mesh, build_quad_mesh, WgpuBackend};
use aperture_client::{Camera, FrameDriver, PortalRenderer};
use aperture_shared::config::RenderMode;
use aperture_shared::physics::{Aabb, KinematicWorld};
use aperture_shared::{
    ApertureDesc, BodyId, BodyKind, BodyState, Handedness, PortalConfig, PortalWorld, SurfaceId,
    TrackedBody,
};
use glam::{Mat4, Quat, Vec2, Vec3};
use tracing::info;

const ROOM_HALF: f32 = 20.0;
const WALL_HEIGHT: f32 = 16.0;
const WALL_THICKNESS: f32 = 0.5;
const APERTURE_HALF_EXTENT: Vec2 = Vec2::new(5.0, 7.5);
const CLEAR_COLOR: [f64; 4] = [0.55, 0.7, 0.9, 1.0];

struct SnapshotOptions {
    output: PathBuf,
    width: u32,
    height: u32,
    frames: u32,
    recursion: Option<u32>,
    mode: Option<RenderMode>,
    config: Option<PathBuf>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("portal_snapshot.png"),
            width: 640,
            height: 360,
            frames: 30,
            recursion: None,
            mode: None,
            config: None,
        }
    }
}

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut options = SnapshotOptions::default();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--output" | "-o" => {
                let Some(value) = args.next() else {
                    eprintln!("--output expects a path argument");
                    std::process::exit(2);
                };
                options.output = PathBuf::from(value);
            }
            "--config" => {
                let Some(value) = args.next() else {
                    eprintln!("--config expects a path argument");
                    std::process::exit(2);
                };
                options.config = Some(PathBuf::from(value));
            }
            "--width" => options.width = parse_number(&arg, args.next()),
            "--height" => options.height = parse_number(&arg, args.next()),
            "--frames" => options.frames = parse_number(&arg, args.next()),
            "--recursion" => options.recursion = Some(parse_number(&arg, args.next())),
            "--mode" => {
                let Some(value) = args.next() else {
                    eprintln!("--mode expects 'recursive' or 'indexed'");
                    std::process::exit(2);
                };
                options.mode = match value.as_str() {
                    "recursive" => Some(RenderMode::Recursive),
                    "indexed" => Some(RenderMode::Indexed),
                    other => {
                        eprintln!("unknown render mode '{other}'");
                        std::process::exit(2);
                    }
                };
            }
            "--help" | "-h" => {
                println!(
                    "Usage: portal_snapshot [--output <png>] [--width <u32>] [--height <u32>] \
                     [--frames <u32>] [--recursion <u32>] [--mode recursive|indexed] [--config <toml>]"
                );
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    if let Err(err) = run(&options) {
        eprintln!("portal_snapshot error: {err}");
        std::process::exit(1);
    }
}

fn parse_number(flag: &str, value: Option<String>) -> u32 {
    let Some(value) = value else {
        eprintln!("{flag} expects a numeric argument");
        std::process::exit(2);
    };
    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 || flag == "--recursion" => parsed,
        Ok(_) => {
            eprintln!("{flag} must be greater than zero");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("invalid value for {flag} '{value}': {err}");
            std::process::exit(2);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PortalConfig, String> {
    match path {
        Some(path) => PortalConfig::load(path)
            .map_err(|err| format!("failed to load {}: {err}", path.display())),
        None => Ok(PortalConfig::default()),
    }
}

fn run(options: &SnapshotOptions) -> Result<(), String> {
    let config = load_config(options.config.as_deref())?;

    let mut physics = KinematicWorld::new(Vec3::new(0.0, -9.81, 0.0));
    let mut world = PortalWorld::new(config.clone());
    let mut scene = Scene::new();
    build_room(&mut physics, &mut scene);

    world
        .insert_aperture(
            &mut physics,
            Handedness::Primary,
            ApertureDesc::new(
                Vec3::new(0.0, APERTURE_HALF_EXTENT.y, -ROOM_HALF + 0.05),
                Quat::IDENTITY,
                APERTURE_HALF_EXTENT,
            )
            .on_surface(SurfaceId(1)),
        )
        .map_err(|err| format!("primary aperture rejected: {err}"))?;
    world
        .insert_aperture(
            &mut physics,
            Handedness::Secondary,
            ApertureDesc::new(
                Vec3::new(ROOM_HALF - 0.05, APERTURE_HALF_EXTENT.y, 0.0),
                Quat::from_rotation_y(-FRAC_PI_2),
                APERTURE_HALF_EXTENT,
            )
            .on_surface(SurfaceId(2)),
        )
        .map_err(|err| format!("secondary aperture rejected: {err}"))?;

    // A crate sliding toward the primary aperture.
    let prop = BodyId(1);
    let prop_half = Vec3::splat(1.5);
    let mut state = BodyState::at(Vec3::new(-2.0, prop_half.y, -8.0));
    state.velocity = Vec3::new(0.0, 0.0, -12.0);
    physics.insert_body(prop, BodyKind::Prop, state, prop_half, 4.0);
    world.track_body(&physics, TrackedBody::new(prop, BodyKind::Prop));
    let prop_item = scene.insert(
        ItemTag::Prop,
        CUBE_MESH,
        Mat4::IDENTITY,
        unit_cube(),
        [0.85, 0.45, 0.15, 1.0],
    );

    let mut backend = WgpuBackend::new(options.width, options.height)
        .map_err(|err| format!("failed to initialize renderer: {err}"))?;
    let (cube_vertices, cube_indices) = build_cube_mesh();
    backend.register_mesh(CUBE_MESH, &cube_vertices, &cube_indices);
    let (quad_vertices, quad_indices) = build_quad_mesh();
    backend.register_mesh(QUAD_MESH, &quad_vertices, &quad_indices);

    let mut renderer = PortalRenderer::from_config(&config);
    if let Some(mode) = options.mode {
        renderer.set_mode(mode);
    }
    if let Some(recursion) = options.recursion {
        renderer.set_max_recursion(recursion);
    }

    let camera = Camera {
        position: Vec3::new(-6.0, 9.0, 14.0),
        yaw: -FRAC_PI_2 - 0.15,
        pitch: -0.1,
        aspect: options.width as f32 / options.height as f32,
        ..Camera::default()
    };
    let mut driver = FrameDriver::new(renderer, camera);
    driver.bind_body_item(prop, prop_item, prop_half);

    let dt = 1.0 / 60.0;
    let mut teleports = 0usize;
    let mut last_stats = None;
    for _ in 0..options.frames {
        backend.begin_frame(CLEAR_COLOR);
        let report = driver.run_frame(&mut physics, &mut world, &mut scene, &mut backend, dt);
        backend.submit_frame();
        teleports += report.teleports.len();
        last_stats = Some(report.render);
    }

    let image = backend
        .read_pixels()
        .map_err(|err| format!("failed to read back frame: {err}"))?;
    image
        .save(&options.output)
        .map_err(|err| format!("failed to write {}: {err}", options.output.display()))?;

    if let Some(stats) = last_stats {
        info!(
            "Last frame: {} draw calls, deepest level {}, {} terminal views",
            stats.draw_calls, stats.deepest_level, stats.terminal_views
        );
    }
    println!(
        "Wrote {}x{} snapshot to {} after {} frame(s), {} teleport(s)",
        options.width,
        options.height,
        options.output.display(),
        options.frames,
        teleports
    );
    Ok(())
}

fn unit_cube() -> Aabb {
    Aabb {
        min: Vec3::splat(-1.0),
        max: Vec3::splat(1.0),
    }
}

/// Floor, four walls and a couple of pillars. Walls 1 and 2 host the apertures.
fn build_room(physics: &mut KinematicWorld, scene: &mut Scene) {
    let wall_half_y = WALL_HEIGHT * 0.5;
    let boxes = [
        (
            0,
            Vec3::new(0.0, -WALL_THICKNESS, 0.0),
            Vec3::new(ROOM_HALF, WALL_THICKNESS, ROOM_HALF),
            [0.45, 0.45, 0.5, 1.0],
        ),
        (
            1,
            Vec3::new(0.0, wall_half_y, -ROOM_HALF - WALL_THICKNESS),
            Vec3::new(ROOM_HALF, wall_half_y, WALL_THICKNESS),
            [0.8, 0.8, 0.78, 1.0],
        ),
        (
            2,
            Vec3::new(ROOM_HALF + WALL_THICKNESS, wall_half_y, 0.0),
            Vec3::new(WALL_THICKNESS, wall_half_y, ROOM_HALF),
            [0.7, 0.75, 0.8, 1.0],
        ),
        (
            3,
            Vec3::new(-ROOM_HALF - WALL_THICKNESS, wall_half_y, 0.0),
            Vec3::new(WALL_THICKNESS, wall_half_y, ROOM_HALF),
            [0.75, 0.7, 0.65, 1.0],
        ),
        (
            4,
            Vec3::new(0.0, wall_half_y, ROOM_HALF + WALL_THICKNESS),
            Vec3::new(ROOM_HALF, wall_half_y, WALL_THICKNESS),
            [0.65, 0.7, 0.6, 1.0],
        ),
    ];
    for (id, center, half, color) in boxes {
        physics.insert_surface(SurfaceId(id), Aabb::from_center_half_extents(center, half));
        scene.insert(
            ItemTag::World,
            CUBE_MESH,
            Mat4::from_scale_rotation_translation(half, Quat::IDENTITY, center),
            unit_cube(),
            color,
        );
    }

    let pillars = [
        (Vec3::new(8.0, 4.0, -6.0), [0.2, 0.6, 0.3, 1.0]),
        (Vec3::new(-10.0, 4.0, 6.0), [0.6, 0.2, 0.5, 1.0]),
    ];
    for (center, color) in pillars {
        let half = Vec3::new(1.5, 4.0, 1.5);
        scene.insert(
            ItemTag::World,
            CUBE_MESH,
            Mat4::from_scale_rotation_translation(half, Quat::IDENTITY, center),
            unit_cube(),
            color,
        );
    }
}
