use std::path::PathBuf;

use anyhow::Context;
use beamdrive_common::{CollisionEvent, ControlInput};
use beamdrive_physics::PointMassWorld;
use beamdrive_structure::{StructureEvent, TopologyBuilder};
use beamdrive_tools::{StructureInspector, VehicleInspector};
use beamdrive_vehicle::{VehicleConfig, VehicleController};
use clap::{Parser, Subcommand, ValueEnum};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

const SPAWN: Vec3 = Vec3::new(0.0, 1.4, 0.0);

#[derive(Parser)]
#[command(name = "beamdrive-cli", about = "Headless beamdrive vehicle tool")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Vehicle config (.yaml, .yml or .json); built-in sedan when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Build the structure topology and summarise it
    Layout {
        #[arg(long)]
        json: bool,
    },
    /// Drive with fixed inputs and print telemetry
    Drive {
        #[arg(short, long, default_value = "600")]
        ticks: u64,
        #[arg(long, default_value = "1.0")]
        throttle: f32,
        #[arg(long, default_value = "0.0")]
        brake: f32,
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        steering: f32,
        #[arg(long)]
        handbrake: bool,
        /// Print telemetry every N ticks
        #[arg(long, default_value = "60")]
        every: u64,
        /// Emit telemetry as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Drive into a wall-like impact, report damage, then reset
    Crash {
        /// Ticks of full throttle before the hit
        #[arg(short, long, default_value = "120")]
        ticks: u64,
        #[arg(long, default_value = "20000")]
        impulse: f32,
        #[arg(long, default_value = "3")]
        hits: u32,
        /// Beams listed in the report
        #[arg(long, default_value = "10")]
        worst: usize,
    },
    /// Run the same drive twice and compare engine state hashes
    Replay {
        #[arg(short, long, default_value = "300")]
        ticks: u64,
    },
    /// Print the effective config
    Config {
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<VehicleConfig> {
    match path {
        Some(path) => VehicleConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(VehicleConfig::default()),
    }
}

fn spawn(config: VehicleConfig) -> anyhow::Result<(PointMassWorld, VehicleController)> {
    let mut world = PointMassWorld::new();
    let vehicle = VehicleController::spawn(&mut world, config, SPAWN)?;
    Ok((world, vehicle))
}

fn drive(
    world: &mut PointMassWorld,
    vehicle: &mut VehicleController,
    input: ControlInput,
    ticks: u64,
) -> anyhow::Result<()> {
    let dt = vehicle.config().step.fixed_dt * 2.0;
    for _ in 0..ticks {
        vehicle.advance(world, input, dt)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Info => {
            println!("beamdrive-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", beamdrive_common::crate_info());
            println!("physics: {}", beamdrive_physics::crate_info());
            println!("structure: {}", beamdrive_structure::crate_info());
            println!("dynamics: {}", beamdrive_dynamics::crate_info());
            println!("vehicle: {}", beamdrive_vehicle::crate_info());
            println!("tools: {}", beamdrive_tools::crate_info());
        }
        Commands::Layout { json } => {
            let topology = TopologyBuilder::new(&config.layout).build()?;
            let summary = StructureInspector::topology_summary(&topology);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{summary}");
                for warning in &topology.warnings {
                    println!("  warning: {warning:?}");
                }
            }
        }
        Commands::Drive {
            ticks,
            throttle,
            brake,
            steering,
            handbrake,
            every,
            json,
        } => {
            let (mut world, mut vehicle) = spawn(config)?;
            let input = ControlInput::new(throttle, brake, steering, handbrake);
            let every = every.max(1);
            let dt = vehicle.config().step.fixed_dt * 2.0;
            for tick in 1..=ticks {
                let telemetry = vehicle.advance(&mut world, input, dt)?;
                if tick % every == 0 || tick == ticks {
                    if json {
                        println!("{}", serde_json::to_string(telemetry)?);
                    } else {
                        println!("{}", VehicleInspector::summary(&vehicle));
                    }
                }
            }
        }
        Commands::Crash {
            ticks,
            impulse,
            hits,
            worst,
        } => {
            let (mut world, mut vehicle) = spawn(config)?;
            drive(&mut world, &mut vehicle, ControlInput::new(1.0, 0.0, 0.0, false), ticks)?;
            println!("Before impact: {}", VehicleInspector::summary(&vehicle));

            for _ in 0..hits {
                let nose = vehicle.telemetry().position + Vec3::new(0.0, 0.0, -2.1);
                let added = vehicle.on_collision(
                    &mut world,
                    CollisionEvent {
                        impact_point: nose,
                        impact_normal: Vec3::Z,
                        impulse_magnitude: impulse,
                    },
                );
                tracing::info!(added, "impact");
                drive(&mut world, &mut vehicle, ControlInput::default(), 10)?;
            }
            println!("After impact: {}", VehicleInspector::summary(&vehicle));
            print!("{}", StructureInspector::damage_report(vehicle.structure()));
            for beam in StructureInspector::worst_beams(vehicle.structure(), worst) {
                println!("  {beam}");
            }
            let breaks = vehicle
                .drain_structure_events()
                .iter()
                .filter(|e| matches!(e, StructureEvent::BeamBroken { .. }))
                .count();
            println!("Break events: {breaks}");

            vehicle.reset(&mut world);
            vehicle.drain_structure_events();
            println!("After reset: {}", VehicleInspector::summary(&vehicle));
        }
        Commands::Replay { ticks } => {
            let input = ControlInput::new(1.0, 0.0, 0.3, false);
            let mut hashes = Vec::with_capacity(2);
            for _ in 0..2 {
                let (mut world, mut vehicle) = spawn(config.clone())?;
                drive(&mut world, &mut vehicle, input, ticks)?;
                hashes.push(world.state_hash());
            }
            println!("Run 1: hash={:#x}", hashes[0]);
            println!("Run 2: hash={:#x}", hashes[1]);
            println!(
                "Match: {}",
                if hashes[0] == hashes[1] { "OK" } else { "MISMATCH" }
            );
        }
        Commands::Config { format } => match format {
            Format::Yaml => print!("{}", config.to_yaml_string()?),
            Format::Json => println!("{}", config.to_json_string()?),
        },
    }

    Ok(())
}
