// host.rs - startup, the timedemo frame loop and shutdown

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};

use qview_common::cvar::CvarContext;
use qview_common::entities::{find_by_classname, parse_entities, Entity};
use qview_common::files::FsContext;
use qview_common::q_shared::Vec3;
use qview_common::{Level, QError};
use qview_renderer::{ViewConfig, World};

use crate::camera::{FlyCamera, DEFAULT_ORIGIN};
use crate::in_script::InputScript;
use crate::vid_null::{BackendCounters, StatsBackend};
use crate::SysError;

/// Yaw used when the start entity has no `angle`.
const DEFAULT_YAW: f32 = 90.0;

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedemoSummary {
    pub frames: u64,
    pub seconds: f64,
    pub leaves_visited: usize,
    pub totals: BackendCounters,
    pub final_position: Vec3,
}

impl TimedemoSummary {
    pub fn fps(&self) -> f64 {
        if self.seconds > 0.0 {
            self.frames as f64 / self.seconds
        } else {
            0.0
        }
    }
}

/// Starts `env_logger`. `RUST_LOG` wins; otherwise `developer 1` selects
/// debug output.
pub fn init_logging(cvars: &CvarContext) {
    let default_filter = if cvars.variable_value("developer") != 0.0 {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

/// Origin and yaw of the first `info_player_start`.
pub fn start_position(entities: &[Entity]) -> (Vec3, f32) {
    let start = find_by_classname(entities, "info_player_start");
    let origin = start.and_then(Entity::origin).unwrap_or(DEFAULT_ORIGIN);
    let yaw = start
        .and_then(|e| e.get("angle"))
        .and_then(|a| a.trim().parse::<f32>().ok())
        .unwrap_or(DEFAULT_YAW);
    (origin, yaw)
}

fn positive_cvar(cvars: &CvarContext, name: &str) -> Result<u32, QError> {
    let value = cvars.variable_value(name);
    if value < 1.0 {
        return Err(QError::Format(format!("{} must be positive, got \"{}\"", name, cvars.variable_string(name))));
    }
    Ok(value as u32)
}

/// Loads the configured map, plays the input script through the renderer
/// and shuts everything down.
pub fn run(cvars: &CvarContext) -> Result<TimedemoSummary, SysError> {
    let mut fs = FsContext::new();
    fs.add_directory(cvars.variable_string("basedir"))?;
    for path in fs.path_list() {
        debug!("search path: {}", path);
    }

    let level = Level::load(&fs, cvars.variable_string("map"), cvars.variable_string("palette"))?;
    let entities = parse_entities(&level.bsp.entity_string)?;
    let (origin, yaw) = start_position(&entities);
    info!("{} entities, start at {:?} facing {}", entities.len(), origin, yaw);

    let script = InputScript::parse(cvars.variable_string("cl_script"))?;
    let width = positive_cvar(cvars, "vid_width")?;
    let height = positive_cvar(cvars, "vid_height")?;
    let config = ViewConfig {
        z_near: cvars.variable_value("r_znear"),
        z_far: cvars.variable_value("r_zfar"),
    };
    if config.z_near <= 0.0 || config.z_far <= config.z_near {
        return Err(QError::Format(format!(
            "bad clip planes: r_znear {} r_zfar {}",
            config.z_near, config.z_far
        ))
        .into());
    }

    let dump_dir = cvars.variable_string("r_dumptextures");
    let mut backend = if dump_dir.is_empty() {
        StatsBackend::new()
    } else {
        StatsBackend::with_texture_dump(Path::new(dump_dir))?
    };

    let mut world = World::initialize(&level, &mut backend, width, height, config)?;

    let requested = cvars.variable_value("timedemo_frames");
    let frames = if requested >= 1.0 {
        requested as u64
    } else {
        script.total_frames().max(1)
    };

    let mut camera = FlyCamera::new(origin, yaw);
    let mut leaves = HashSet::new();
    let start = Instant::now();

    for frame in 0..frames {
        script.action_at(frame).apply(&mut camera);
        camera.update_position();

        let stats = match world.render(&level, &mut backend, &camera) {
            Ok(stats) => stats,
            Err(err) => {
                world.shutdown(&mut backend);
                return Err(err.into());
            }
        };
        leaves.insert(stats.leaf);
        debug!(
            "frame {}: pos {:?} leaf {} surfaces {} polys {}",
            frame, camera.head, stats.leaf, stats.visible_surfaces, stats.polygons
        );
    }

    let seconds = start.elapsed().as_secs_f64();
    world.shutdown(&mut backend);

    let summary = TimedemoSummary {
        frames,
        seconds,
        leaves_visited: leaves.len(),
        totals: backend.totals,
        final_position: camera.head,
    };
    info!(
        "{} frames {:.3} seconds {:.1} fps, {} leaves visited, {} polygons, {} vertices",
        summary.frames,
        summary.seconds,
        summary.fps(),
        summary.leaves_visited,
        summary.totals.polygons,
        summary.totals.vertices
    );
    Ok(summary)
}
