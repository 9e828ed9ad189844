//! Polyscan
//!
//! Drives a ring of depth cameras from the command line:
//! - `scan` captures and fuses a cloud and saves it
//! - `calibrate` measures mounting offsets and writes them to the config
//! - `list` shows the configured rig
//! - `init` writes an example configuration
//!
//! Cameras are simulated; the config describes what they see.

mod config;

use clap::{Parser, Subcommand};
use config::{RigConfig, RigMode};
use polyscan_core::{Partition, ScanManager};
use polyscan_data::FormatRegistry;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

/// Polyscan - multi-camera depth scanning
#[derive(Parser, Debug)]
#[command(name = "polyscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rig configuration file
    #[arg(short, long, default_value = "polyscan.json")]
    config: PathBuf,

    /// Run captures on a tokio runtime instead of scoped threads
    #[arg(long = "async")]
    use_async: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Connect to a Tracy profiler
    #[cfg(feature = "tracy")]
    #[arg(long)]
    tracy: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture, fuse and save a point cloud
    Scan {
        /// Output format
        #[arg(short, long, default_value = "xyz")]
        format: String,

        /// Output base name, overriding the config
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log per-camera fusion details
        #[arg(long)]
        debug: bool,
    },
    /// Measure per-camera position deviations against the calibration surface
    Calibrate {
        /// Report deviations without updating the config
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the configured cameras and available output formats
    List,
    /// Write an example configuration
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) {
    #[cfg(feature = "tracy")]
    {
        if args.tracy {
            use tracing_subscriber::Layer;
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;
            tracing_subscriber::registry()
                .with(tracing_tracy::TracyLayer::default())
                .with(
                    tracing_subscriber::fmt::layer().with_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
                    ),
                )
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Init { force } => {
            if args.config.exists() && !force {
                return Err(format!("{} already exists (use --force to replace it)", args.config.display()).into());
            }
            RigConfig::example().save(&args.config)?;
            println!("Wrote {}", args.config.display());
            Ok(())
        }
        Command::List => {
            let config = RigConfig::load(&args.config)?;
            list(&config);
            Ok(())
        }
        Command::Scan { format, output, debug } => {
            let mut config = RigConfig::load(&args.config)?;
            if let Some(output) = output {
                config.session.filename = output;
            }
            config.session.debug |= debug;
            scan(&config, &format, args.use_async)
        }
        Command::Calibrate { dry_run } => {
            let mut config = RigConfig::load(&args.config)?;
            calibrate(&mut config, args.use_async)?;
            if dry_run {
                info!("Dry run, leaving {} unchanged", args.config.display());
            } else {
                config.save(&args.config)?;
                println!("Updated deviations in {}", args.config.display());
            }
            Ok(())
        }
    }
}

fn manager_for(config: &RigConfig, mode: RigMode) -> ScanManager {
    ScanManager::new(config.build_cameras(mode))
        .with_session(config.session.clone())
        .with_calibration_surface(config.calibration_surface)
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

fn scan(config: &RigConfig, format: &str, use_async: bool) -> Result<(), Box<dyn Error>> {
    let manager = manager_for(config, RigMode::Scan);
    // Fail on a bad format before touching the cameras.
    manager.formats().get(format)?;

    let path = if use_async {
        runtime()?.block_on(async {
            let cloud = manager.scan_object_async().await?;
            manager.save_point_cloud_async(&cloud, format).await
        })?
    } else {
        let cloud = manager.scan_object()?;
        manager.save_point_cloud(&cloud, format)?
    };

    println!("Saved {}", path.display());
    Ok(())
}

fn calibrate(config: &mut RigConfig, use_async: bool) -> Result<(), Box<dyn Error>> {
    let mut manager = manager_for(config, RigMode::Calibrate);

    let deviations = if use_async {
        runtime()?.block_on(manager.calibrate_async())?
    } else {
        manager.calibrate()?
    };

    for measured in &deviations {
        println!(
            "{:<16} {:>9.4} {:>9.4} {:>9.4}",
            measured.serial, measured.deviation.x, measured.deviation.y, measured.deviation.z
        );
    }
    config.store_deviations(&manager.cameras);
    Ok(())
}

fn list(config: &RigConfig) {
    let cameras = config.build_cameras(RigMode::Scan);
    let partition = Partition::of(&cameras);

    println!("{:<16} {:<13} {:>4} {:>8} {:>8}  schedule", "serial", "type", "on", "angle", "fov");
    for (i, camera) in cameras.iter().enumerate() {
        let schedule = if partition.concurrent.contains(&i) {
            "concurrent"
        } else if partition.exclusive.contains(&i) {
            "exclusive"
        } else {
            "-"
        };
        println!(
            "{:<16} {:<13} {:>4} {:>7.1}° {:>7.1}°  {}",
            camera.serial(),
            camera.camera_type().to_string(),
            if camera.is_on() { "yes" } else { "no" },
            camera.angle().to_degrees(),
            camera.field_of_view().to_degrees(),
            schedule
        );
    }

    let registry = FormatRegistry::default();
    let formats: Vec<&str> = registry.formats().collect();
    println!("formats: {}", formats.join(", "));
}
