use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use glam::{Quat, Vec3, Vec4};
use tracing_subscriber::EnvFilter;
use worldspace_common::{Clock, ManualClock, USECS_PER_SECOND};
use worldspace_entities::{
    ComponentMode, EntityProperties, EntityShape, EntityTree, EntityType, MirrorMode, PulseMode,
    PulsePropertyGroup, ZonePropertyGroup,
};
use worldspace_entities_render::{EntityRendererConfig, EntityTreeRenderer, calculate_pulse_color};
use worldspace_render::{DebugTextRenderer, RenderView, Renderer, ViewFrustum};

#[derive(Parser)]
#[command(name = "worldspace-cli", about = "CLI tool for entity rendering")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Renderer configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the active renderer configuration
    Info,
    /// Build a demo world, run the tree driver and render one debug frame
    Frame {
        /// Number of shape entities placed on a ring
        #[arg(short, long, default_value = "6")]
        entities: usize,
        /// Simulated ticks before the frame is drawn
        #[arg(short, long, default_value = "3")]
        ticks: u32,
        /// Add a mirror facing the ring
        #[arg(short, long)]
        mirror: bool,
        /// Camera distance from the origin
        #[arg(long, default_value = "12.0")]
        distance: f32,
    },
    /// Reflect a camera through a mirror at the origin
    Mirror {
        /// Camera position
        #[arg(
            long,
            num_args = 3,
            default_values_t = [1.0, 0.0, 2.0],
            allow_hyphen_values = true
        )]
        eye: Vec<f32>,
        /// Treat the surface as a portal whose exit coincides with it
        #[arg(long)]
        portal: bool,
    },
    /// Sample a pulse over time
    Pulse {
        /// Seconds per cycle
        #[arg(short, long, default_value = "1.0")]
        period: f32,
        #[arg(long, value_enum, default_value = "in-phase")]
        color: PulseArg,
        #[arg(long, value_enum, default_value = "none")]
        alpha: PulseArg,
        /// Number of samples over one period
        #[arg(short, long, default_value = "8")]
        samples: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PulseArg {
    None,
    InPhase,
    OutPhase,
}

impl From<PulseArg> for PulseMode {
    fn from(arg: PulseArg) -> Self {
        match arg {
            PulseArg::None => PulseMode::None,
            PulseArg::InPhase => PulseMode::InPhase,
            PulseArg::OutPhase => PulseMode::OutPhase,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => EntityRendererConfig::load(path)
            .with_context(|| format!("loading renderer config {}", path.display()))?,
        None => EntityRendererConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("worldspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", worldspace_common::crate_info());
            println!("entities: {}", worldspace_entities::crate_info());
            println!("render: {}", worldspace_render::crate_info());
            println!(
                "entities-render: {}",
                worldspace_entities_render::crate_info()
            );
            println!(
                "fade duration (procedural): {:.2}s",
                config.fade_duration_secs
            );
            println!("fade on add: {}", config.fade_on_add);
            println!(
                "status thresholds: remote edit {:.2}s, broadcast {:.2}s",
                config.remote_edit_threshold_secs, config.broadcast_threshold_secs
            );
            println!("max mirror depth: {}", config.max_mirror_depth);
        }
        Commands::Frame {
            entities,
            ticks,
            mirror,
            distance,
        } => frame(config, entities, ticks, mirror, distance)?,
        Commands::Mirror { eye, portal } => {
            let eye = Vec3::from_slice(&eye);
            let mut frustum = ViewFrustum::new(eye, Quat::IDENTITY);
            let mode = if portal {
                MirrorMode::Portal
            } else {
                MirrorMode::Mirror
            };
            let exit = portal.then_some(worldspace_entities_render::PortalExit {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                item_id: worldspace_render::ItemId::INVALID,
            });
            worldspace_entities_render::compute_mirror_view(
                &mut frustum,
                Vec3::ZERO,
                Quat::IDENTITY,
                mode,
                exit,
            );
            let p = frustum.position();
            let f = frustum.forward();
            println!("input:  eye=({:.3}, {:.3}, {:.3})", eye.x, eye.y, eye.z);
            println!(
                "output: eye=({:.3}, {:.3}, {:.3}) forward=({:.3}, {:.3}, {:.3})",
                p.x, p.y, p.z, f.x, f.y, f.z
            );
            let row = frustum.projection().row(2);
            println!(
                "projection row 2: ({:.4}, {:.4}, {:.4}, {:.4})",
                row.x, row.y, row.z, row.w
            );
        }
        Commands::Pulse {
            period,
            color,
            alpha,
            samples,
        } => {
            let pulse = PulsePropertyGroup {
                period,
                color_mode: color.into(),
                alpha_mode: alpha.into(),
                ..PulsePropertyGroup::default()
            };
            let samples = samples.max(1);
            for i in 0..=samples {
                let t = period * i as f32 / samples as f32;
                let now = (t.max(0.0) * USECS_PER_SECOND as f32) as u64;
                let c = calculate_pulse_color(Vec4::ONE, &pulse, 0, now);
                println!(
                    "t={t:.3}s rgb=({:.3}, {:.3}, {:.3}) a={:.3}",
                    c.x, c.y, c.z, c.w
                );
            }
        }
    }

    Ok(())
}

fn frame(
    config: EntityRendererConfig,
    entities: usize,
    ticks: u32,
    mirror: bool,
    distance: f32,
) -> anyhow::Result<()> {
    let clock = Arc::new(ManualClock::new(0));
    let renderer = DebugTextRenderer::new(config.max_mirror_depth);
    let mut driver = EntityTreeRenderer::new(config, clock.clone());
    let scene = worldspace_render::Scene::new();
    let mut tree = EntityTree::new();

    let zone = tree.add_entity(
        EntityType::Zone,
        EntityProperties {
            dimensions: Vec3::splat(distance * 4.0),
            zone: ZonePropertyGroup {
                key_light_mode: ComponentMode::Enabled,
                ambient_light_mode: ComponentMode::Enabled,
                ..ZonePropertyGroup::default()
            },
            ..EntityProperties::default()
        },
        clock.now_usec(),
    );

    let shapes = [
        EntityShape::Cube,
        EntityShape::Sphere,
        EntityShape::Torus,
        EntityShape::Cone,
        EntityShape::Quad,
        EntityShape::Icosahedron,
    ];
    for i in 0..entities {
        let angle = i as f32 / entities.max(1) as f32 * std::f32::consts::TAU;
        let position = Vec3::new(angle.cos(), 0.0, angle.sin()) * 3.0;
        let shape = shapes[i % shapes.len()];
        tree.add_entity(
            EntityType::Shape,
            EntityProperties {
                shape,
                dimensions: Vec3::ONE,
                color: [(40 * i % 256) as u8, 128, 200],
                render_with_zones: if i % 2 == 0 { vec![zone] } else { Vec::new() },
                ..EntityProperties::at(position)
            },
            clock.now_usec(),
        );
    }
    if mirror {
        tree.add_entity(
            EntityType::Shape,
            EntityProperties {
                shape: EntityShape::Quad,
                dimensions: Vec3::new(4.0, 4.0, 0.1),
                mirror_mode: MirrorMode::Mirror,
                ..EntityProperties::at(Vec3::new(0.0, 0.0, -6.0))
            },
            clock.now_usec(),
        );
    }

    let eye = Vec3::new(0.0, distance * 0.5, distance);
    for tick in 0..ticks.max(1) {
        let stats = driver.update(&mut tree, &scene, eye);
        let processed = scene.process_transactions(clock.now_usec());
        tracing::info!(
            tick,
            added = stats.added,
            updated = stats.updated,
            processed = processed.updated,
            "tick"
        );
        clock.advance(USECS_PER_SECOND / 2);
    }
    anyhow::ensure!(
        driver.renderable_count() > 0 || entities == 0,
        "no renderers were created"
    );

    let view = RenderView {
        frustum: ViewFrustum::looking_at(eye, Vec3::ZERO),
        now_usec: clock.now_usec(),
        ..RenderView::default()
    };
    let report = renderer.render(&scene, &view);
    print!("{}", report.text);
    let collected = scene.graveyard().collect();
    tracing::debug!(collected, "graveyard collected");
    Ok(())
}
