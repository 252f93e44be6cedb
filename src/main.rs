use clap::{Parser, Subcommand};
use mediafile::imaging::{OutputFormat, Quality};
use mediafile::{Engines, MediaImage, config, report};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mediafile")]
#[command(about = "Inspect uploaded images and generate previews")]
#[command(long_about = "\
Inspect uploaded images and generate previews

Reports format support, corruption, dimensions, colour model and animation
timing for JPEG, PNG/APNG, GIF, WebP and AVIF files.

Animation timing:
  GIF, WebP:   sum of per-frame delays (delays <= 10ms count as 100ms)
  APNG, AVIF:  container duration from ffprobe, when available

Set RUST_LOG=debug for engine diagnostics.
Run 'mediafile gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print everything known about a file
    Inspect {
        file: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a scaled preview and print its path
    Preview {
        file: PathBuf,
        /// Bounding box width (default from config)
        #[arg(long)]
        width: Option<u32>,
        /// Bounding box height (default from config)
        #[arg(long)]
        height: Option<u32>,
        /// jpeg, png, webp or avif (default from config)
        #[arg(long)]
        format: Option<OutputFormat>,
        /// Lossy quality 1-100 (default from config)
        #[arg(long)]
        quality: Option<u32>,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { file, json } => {
            let config = config::load_config(cli.config.as_deref())?;
            let mut image = MediaImage::open(file, Engines::from_config(&config))?;
            let media_report = report::MediaReport::from_image(&image);
            image.close();
            if json {
                println!("{}", serde_json::to_string_pretty(&media_report)?);
            } else {
                report::print_report(&media_report);
            }
        }
        Command::Preview {
            file,
            width,
            height,
            format,
            quality,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            let mut options = config.preview.resize_options();
            if let Some(format) = format {
                options.format = format;
            }
            if let Some(quality) = quality {
                options.quality = Quality::new(quality);
            }
            let max_width = width.unwrap_or(config.preview.max_width);
            let max_height = height.unwrap_or(config.preview.max_height);

            let mut image = MediaImage::open(file, Engines::from_config(&config))?;
            let preview = image.preview(max_width, max_height, &options)?;
            image.close();
            println!("{}", preview.path().display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
