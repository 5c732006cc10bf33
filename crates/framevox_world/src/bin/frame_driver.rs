//! # Frame Driver
//!
//! Feeds synthetic frames through a [`FrameWorld`] and reports throughput.
//!
//! The worker count is changed every `--resize-every` frames to exercise
//! pool reconfiguration between frames, the way a player would when the
//! user changes the thread setting mid-video.

use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::{Duration, Instant};

use framevox_core::FramevoxConfig;
use framevox_world::{FrameWorld, GeometryType, VideoFrame};

struct Options {
    frames: u64,
    width: usize,
    height: usize,
    threads: Option<usize>,
    resize_every: u64,
    config: Option<String>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let threads = match flag_value(args, "--threads") {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|_| format!("--threads expects a number, got '{raw}'"))?,
            ),
            None => None,
        };

        Ok(Self {
            frames: flag_number(args, "--frames", 120)?,
            width: flag_number(args, "--width", 640)?,
            height: flag_number(args, "--height", 360)?,
            threads,
            resize_every: flag_number(args, "--resize-every", 0)?,
            config: flag_value(args, "--config").map(str::to_owned),
        })
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn flag_number<T: FromStr>(args: &[String], flag: &str, default: T) -> Result<T, String> {
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("{flag} expects a number, got '{raw}'")),
        None => Ok(default),
    }
}

fn print_usage() {
    println!("Usage: frame_driver [options]");
    println!();
    println!("Options:");
    println!("  --frames <n>         Frames to display (default 120)");
    println!("  --width <px>         Frame width (default 640)");
    println!("  --height <px>        Frame height (default 360)");
    println!("  --threads <n>        Worker threads (default from config)");
    println!("  --resize-every <n>   Alternate the thread count every n frames");
    println!("  --config <file>      TOML config file");
}

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         FRAMEVOX FRAME DRIVER                                    ║");
    println!("║         FRAMES IN, TERRAIN OUT                                   ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let options = match Options::parse(&args) {
        Ok(options) => options,
        Err(err) => {
            println!("Error: {err}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let mut config = match &options.config {
        Some(path) => match FramevoxConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(err) => {
                println!("Error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => FramevoxConfig::production(),
    };
    if let Some(threads) = options.threads {
        config.pool.threads = threads;
    }
    if let Err(err) = config.validate() {
        println!("Error: {err}");
        return ExitCode::FAILURE;
    }

    let world = match FrameWorld::new(options.width, options.height, &config) {
        Ok(world) => world,
        Err(err) => {
            println!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let (columns_x, columns_z) = world.grid_size();

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Frame Size:         {}x{}", options.width, options.height);
    println!("│ Chunk Grid:         {columns_x}x{columns_z} columns");
    println!("│ Frames:             {}", options.frames);
    println!("│ Worker Threads:     {}", config.pool.threads);
    println!("│ Initial Slots:      {}", config.slots.initial_slots);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let base_threads = config.pool.threads;
    let started = Instant::now();
    let mut worst = Duration::ZERO;
    let mut vertices = 0usize;

    for index in 0..options.frames {
        if options.resize_every > 0 && index > 0 && index % options.resize_every == 0 {
            let odd_round = (index / options.resize_every) % 2 == 1;
            let threads = if odd_round { (base_threads / 2).max(1) } else { base_threads };
            if let Err(err) = world.set_thread_count(threads) {
                println!("Error: {err}");
                return ExitCode::FAILURE;
            }
            println!("  frame {index:>5}: workers -> {threads}");
        }

        let frame = VideoFrame::gradient(options.width, options.height, index);
        let report = match world.display_frame(&frame) {
            Ok(report) => report,
            Err(err) => {
                println!("Error on frame {index}: {err}");
                return ExitCode::FAILURE;
            }
        };

        // Stand-in for the render thread
        for geometry in GeometryType::ALL {
            drop(world.commit_geometry(geometry));
        }

        worst = worst.max(report.elapsed);
        vertices = report.vertices;
    }

    let elapsed = started.elapsed();
    let stats = world.pool_stats();
    let fps = options.frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!();
    println!("┌─ RESULTS ───────────────────────────────────────────────────────┐");
    println!("│ Total Time:         {elapsed:.2?}");
    println!("│ Frames / Second:    {fps:.1}");
    println!("│ Worst Frame:        {worst:.2?}");
    println!("│ Vertices / Frame:   {vertices}");
    println!("│ Tasks Completed:    {}", stats.completed);
    println!("│ Tasks Failed:       {}", stats.failed);
    println!("│ Tasks Drained:      {}", stats.drained);
    println!("│ Vertex Buffers:     {} created, {} free",
        world.vertex_pool().total_created(),
        world.vertex_pool().available());
    println!("│ Index Buffers:      {} created, {} free",
        world.index_pool().total_created(),
        world.index_pool().available());
    println!("└──────────────────────────────────────────────────────────────────┘");

    if stats.failed == 0 {
        println!("✓ All passes completed");
        ExitCode::SUCCESS
    } else {
        println!("⚠ {} tasks failed", stats.failed);
        ExitCode::FAILURE
    }
}
