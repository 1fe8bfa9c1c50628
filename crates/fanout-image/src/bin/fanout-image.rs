//! fanout-image: render, check and launch the gateway container image.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use fanout_image::{verify, Dockerfile, ImageSpec, Launcher};
use fanout_telemetry::{init_logging, TelemetryConfig};

/// Container image tooling for the fanout gateway
#[derive(Parser, Debug)]
#[command(name = "fanout-image")]
#[command(about = "Render, check and launch the fanout gateway image")]
struct Args {
    /// Log at info level (default: warn, or FANOUT_LOG_LEVEL)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a Dockerfile from an image description
    Render {
        /// TOML image description (default: the built-in gateway image)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a Dockerfile against the image contract
    Check {
        #[arg(default_value = "Dockerfile")]
        dockerfile: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a Dockerfile's launch command locally and exit with its status
    Launch {
        #[arg(default_value = "Dockerfile")]
        dockerfile: PathBuf,

        /// Working directory for the child (default: current directory)
        #[arg(short = 'C', long)]
        workdir: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::for_service("fanout-image");
    if args.verbose {
        telemetry.log_level = "info".to_string();
    } else if std::env::var_os("FANOUT_LOG_LEVEL").is_none()
        && std::env::var_os("RUST_LOG").is_none()
    {
        telemetry.log_level = "warn".to_string();
    }
    let _logger = init_logging(&telemetry).context("failed to initialize logging")?;

    match args.command {
        Commands::Render { spec, output } => render(spec, output),
        Commands::Check { dockerfile, json } => check(&dockerfile, json),
        Commands::Launch {
            dockerfile,
            workdir,
        } => launch(&dockerfile, workdir),
    }
}

fn render(spec: Option<PathBuf>, output: Option<PathBuf>) -> Result<ExitCode> {
    let spec = match spec {
        Some(path) => ImageSpec::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ImageSpec::default(),
    };
    let text = spec.render();

    match output {
        Some(path) => {
            std::fs::write(&path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "dockerfile rendered");
        }
        None => print!("{}", text),
    }
    Ok(ExitCode::SUCCESS)
}

fn load_dockerfile(path: &Path) -> Result<Dockerfile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Dockerfile::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn check(path: &Path, json: bool) -> Result<ExitCode> {
    let dockerfile = load_dockerfile(path)?;

    match verify(&dockerfile) {
        Ok(report) if json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(report) => {
            println!(
                "{}: ok ({} stage(s), port {}, launch {:?})",
                path.display(),
                report.stages,
                report.port,
                report.launch
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(violations) if json => {
            println!("{}", serde_json::to_string_pretty(&violations)?);
            Ok(ExitCode::FAILURE)
        }
        Err(violations) => {
            eprint!("{}: {}", path.display(), violations);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn launch(path: &Path, workdir: Option<PathBuf>) -> Result<ExitCode> {
    let dockerfile = load_dockerfile(path)?;
    let report = verify(&dockerfile)
        .with_context(|| format!("{} violates the image contract", path.display()))?;

    let mut launcher = Launcher::new(report.launch);
    if let Some(dir) = workdir {
        launcher = launcher.with_workdir(dir);
    }
    launcher.build()?;
    let code = launcher.run()?;

    // Only the low byte survives, as with a real process exit
    Ok(ExitCode::from((code & 0xff) as u8))
}
