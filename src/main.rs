use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shelfscan::{AppConfig, DetectionWorkflow, ImageRepository};

#[derive(Parser)]
#[command(name = "shelfscan")]
#[command(about = "Detect objects in predefined grocery images")]
struct Cli {
    /// Repository image to process headless (skips the UI)
    #[arg(value_name = "IMAGE")]
    image: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// List the available images and exit
    #[arg(long)]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    if args.list {
        for name in ImageRepository::new(&config.image_dir).list()? {
            println!("{name}");
        }
        return Ok(());
    }

    if let Some(name) = &args.image {
        let workflow = DetectionWorkflow::from_config(&config);
        let outcome = workflow.run(name)?;

        println!(
            "{} detections in {} ({} ms)",
            outcome.detections.len(),
            name,
            outcome.elapsed.as_millis()
        );
        for det in &outcome.detections {
            println!(
                "  {} {:.2} at ({:.0}, {:.0})-({:.0}, {:.0})",
                det.label, det.confidence, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2
            );
        }
        println!("Saved annotated image to {}", outcome.result_path.display());
        return Ok(());
    }

    #[cfg(feature = "gui")]
    return shelfscan::gui::run(config).context("failed to start the UI");

    #[cfg(not(feature = "gui"))]
    {
        let _ = config;
        anyhow::bail!("this build has no GUI; pass IMAGE to run a headless detection")
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "shelfscan=debug,info"
    } else {
        "shelfscan=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
