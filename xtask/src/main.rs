// ABOUTME: xtask binary for previewing thumbnails and inspecting terminal capabilities
// ABOUTME: Provides commands to render an image with any protocol and to report detection results

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use termthumb::protocols::{kitty, query};
use termthumb::{
    CapabilityDetector, GraphicsProtocol, TerminalEnv, ThumbnailGenerator, ThumbnailSettings,
};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Developer tasks for termthumb")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an image to the terminal
    Preview {
        /// Image file to render
        path: PathBuf,

        /// Protocol to use (kitty, sixel, halfblock, ascii); detected when omitted
        #[arg(short, long)]
        protocol: Option<String>,

        /// Width in character cells (defaults to half the terminal width)
        #[arg(long)]
        width: Option<u32>,

        /// Height in character cells
        #[arg(long)]
        height: Option<u32>,

        /// Disable color output for half-block and ASCII rendering
        #[arg(long)]
        no_color: bool,

        /// Skip loading settings files
        #[arg(long)]
        no_config: bool,
    },
    /// Report which protocol this terminal would get
    Detect {
        /// Also probe the terminal with a device attributes query
        #[arg(long)]
        probe: bool,
    },
    /// Clear any Kitty images on screen
    ClearImages,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Preview {
            path,
            protocol,
            width,
            height,
            no_color,
            no_config,
        } => preview(path, protocol, width, height, no_color, no_config)?,
        Commands::Detect { probe } => detect(probe),
        Commands::ClearImages => print!("{}", kitty::delete_all()),
    }

    Ok(())
}

fn preview(
    path: PathBuf,
    protocol: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    no_color: bool,
    no_config: bool,
) -> Result<()> {
    let settings = if no_config {
        ThumbnailSettings::default()
    } else {
        ThumbnailSettings::load().context("Failed to load termthumb settings")?
    };

    let generator = ThumbnailGenerator::from_settings(&settings);

    if let Some(name) = protocol {
        let protocol = name
            .parse::<GraphicsProtocol>()
            .map_err(|e| anyhow!("{} (valid: kitty, sixel, halfblock, ascii)", e))?;
        generator.set_protocol(protocol);
    }

    let current = generator.config();
    let width = width.or(settings.width).unwrap_or_else(default_width);
    let height = height.unwrap_or(current.height());
    generator.set_dimensions(width, height);
    if no_color {
        generator.set_colored(false);
    }

    if let (false, Some(error)) = generator.validate(&path) {
        let hint = error
            .help_text()
            .map(|help| format!(" ({})", help))
            .unwrap_or_default();
        return Err(anyhow!("Cannot preview {}: {}{}", path.display(), error, hint));
    }

    let rendered = generator
        .generate(&path)
        .with_context(|| format!("Failed to render {}", path.display()))?;
    println!("{}", rendered);

    let config = generator.config();
    log::debug!(
        "Rendered {} at {}x{} cells with {}",
        path.display(),
        config.width(),
        config.height(),
        config.protocol
    );
    Ok(())
}

fn default_width() -> u32 {
    crossterm::terminal::size()
        .map(|(columns, _)| (columns as u32 / 2).max(1))
        .unwrap_or(termthumb::constants::defaults::WIDTH)
}

fn detect(probe: bool) {
    let env = TerminalEnv::from_env();
    let detector = CapabilityDetector::with_env(env.clone());

    let protocol = detector.detect();
    println!("terminal:  {}", env.terminal_name());
    println!("protocol:  {}", protocol);
    println!(
        "output:    {}",
        if protocol.is_pixel_protocol() {
            "pixel graphics"
        } else {
            "printable text"
        }
    );

    if probe {
        let reply = query::query_device_attributes();
        if reply.is_empty() {
            println!("probe:     no reply");
        } else {
            println!("probe:     {:?}", reply);
            println!(
                "sixel:     {}",
                if query::reply_advertises_sixel(&reply) {
                    "advertised"
                } else {
                    "not advertised"
                }
            );
        }
    }
}
