//! Rewind CLI Tool
//!
//! Command-line interface for inspecting replay capture files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rewind_core::types::FrameIndex;
use rewind_decoder::ReplayReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "Rewind - game replay capture inspector")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show summary information about a capture file
    Info {
        /// Input capture file path
        input: PathBuf,
    },

    /// Print the entity tree
    Tree {
        /// Input capture file path
        input: PathBuf,
    },

    /// Print log entries
    Logs {
        /// Input capture file path
        input: PathBuf,

        /// Only show logs in this category
        #[arg(long)]
        category: Option<String>,

        /// Window start time in seconds
        #[arg(long)]
        from: Option<f64>,

        /// Window end time in seconds
        #[arg(long)]
        to: Option<f64>,
    },

    /// Print draw commands active on a frame
    Draws {
        /// Input capture file path
        input: PathBuf,

        /// Frame number (defaults to the last frame)
        #[arg(long)]
        frame: Option<FrameIndex>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rewind_decoder=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => print_info(input)?,
        Commands::Tree { input } => print_tree(input)?,
        Commands::Logs {
            input,
            category,
            from,
            to,
        } => print_logs(input, category, from, to)?,
        Commands::Draws { input, frame } => print_draws(input, frame)?,
    }

    Ok(())
}

fn print_info(input: PathBuf) -> Result<()> {
    let reader = ReplayReader::load(&input)?;

    println!("=== Capture Information ===");
    println!("File: {}", input.display());
    println!(
        "Frames: {} ({:.3} seconds)",
        reader.frame_count(),
        reader.total_time()
    );
    println!("Entities: {}", reader.entity_count());

    let entity_categories: Vec<_> = reader.entity_categories().collect();
    println!("Entity categories: {}", entity_categories.join(", "));

    let log_count = reader.logs().count();
    let log_categories: Vec<_> = reader.log_categories().collect();
    println!("Log entries: {} in categories: {}", log_count, log_categories.join(", "));

    let draw_count = reader.draws().count();
    let draw_categories: Vec<_> = reader.draw_categories().collect();
    println!("Draw commands: {} in categories: {}", draw_count, draw_categories.join(", "));

    Ok(())
}

fn print_tree(input: PathBuf) -> Result<()> {
    let reader = ReplayReader::load(&input)?;
    let graph = reader.graph();

    for (node, depth) in graph.depth_first() {
        let Some(id) = graph.entity_at(node) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        match reader.entity(id) {
            Some(entity) => println!(
                "{}{} [{}] {} ({})",
                indent, entity.name, id, entity.type_name, entity.category_name
            ),
            None => println!("{}<unknown> [{}]", indent, id),
        }
    }

    Ok(())
}

fn print_logs(
    input: PathBuf,
    category: Option<String>,
    from: Option<f64>,
    to: Option<f64>,
) -> Result<()> {
    let reader = ReplayReader::load(&input)?;

    let range = reader.frame_range_for_times(
        from.unwrap_or(0.0),
        to.unwrap_or_else(|| reader.total_time()),
    );

    for (frame, entry) in reader.logs_in_range(range) {
        if category.as_deref().is_some_and(|c| c != entry.category) {
            continue;
        }
        let who = entry
            .entity
            .and_then(|id| reader.entity(id))
            .map_or_else(|| "<global>".to_string(), |e| e.name.clone());
        println!(
            "[{:6}] {:.3}s {} {}: {}",
            frame,
            reader.time_for_frame(frame),
            who,
            entry.category,
            entry.message
        );
    }

    Ok(())
}

fn print_draws(input: PathBuf, frame: Option<FrameIndex>) -> Result<()> {
    let reader = ReplayReader::load(&input)?;
    let frame = frame.unwrap_or_else(|| reader.last_frame());

    println!("Draw commands on frame {}:", frame);
    for draw in reader.draws_at_frame(frame) {
        let who = draw
            .entity
            .and_then(|id| reader.entity(id))
            .map_or_else(|| "<global>".to_string(), |e| e.name.clone());
        let pos = draw.pos();
        println!(
            "  {:?} {} ({}) at ({:.2}, {:.2}, {:.2}) color {:?}",
            draw.shape, who, draw.category, pos.x, pos.y, pos.z, draw.color
        );
    }

    Ok(())
}
