//! Animquant CLI - Quantize a synthetic layered animation from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use animquant::{
    animation::MemorySink,
    compute::{ComputeBackend, CpuBackend, QuantizeError, gpu::GpuBackend},
    pipeline::{EncodeSummary, Palettizer},
    schema::{Backend, RunConfig},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some("--example") {
        print_example_config();
        return;
    }
    if args.get(1).map(String::as_str) == Some("--help") {
        print_usage(&args[0]);
        return;
    }

    let config: RunConfig = match args.get(1) {
        Some(path) => {
            let config_path = PathBuf::from(path);
            let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => RunConfig::default(),
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    println!("Animquant");
    println!("=========");
    println!(
        "Scene: {}x{}, {} frames, {} layers",
        config.scene.width,
        config.scene.height,
        config.scene.frame_count,
        config.scene.layers.len()
    );
    println!(
        "Palette: up to {} colors, merge threshold {}",
        config.quantizer.max_palette_size, config.quantizer.merge_threshold
    );
    println!();

    let result = match config.quantizer.backend {
        Backend::Cpu => run(CpuBackend::new(), config),
        Backend::Gpu => pollster::block_on(GpuBackend::new()).and_then(|backend| run(backend, config)),
    };

    if let Err(e) = result {
        eprintln!("Encoding failed: {}", e);
        std::process::exit(1);
    }
}

fn run<B: ComputeBackend>(backend: B, config: RunConfig) -> Result<(), QuantizeError> {
    println!("Backend: {}", backend.name());

    let RunConfig { quantizer, mut scene } = config;
    let mut palettizer = Palettizer::new(backend, quantizer)?;
    let mut sink = MemorySink::new();

    let start = Instant::now();
    let summary = palettizer.encode(&mut scene, &mut sink)?;
    let elapsed = start.elapsed();

    print_summary(&summary, &sink);
    println!("Time: {:.2}s", elapsed.as_secs_f32());
    Ok(())
}

fn print_summary(summary: &EncodeSummary, sink: &MemorySink) {
    println!();
    println!("Result:");
    println!("  Distinct colors: {}", summary.distinct_colors);
    println!(
        "  Palette entries: {} (transparent index {})",
        summary.palette_len,
        summary.palette_len.saturating_sub(1)
    );
    println!(
        "  Frames: {} in, {} emitted, {} skipped",
        summary.frames_in, summary.frames_emitted, summary.frames_skipped
    );

    let full_bytes = sink
        .info()
        .map(|info| info.width as usize * info.height as usize * summary.frames_in)
        .unwrap_or(0);
    println!(
        "  Index bytes: {} ({:.1}% of full frames)",
        summary.bytes_emitted,
        100.0 * summary.bytes_emitted as f64 / full_bytes.max(1) as f64
    );

    for (i, frame) in sink.frames().iter().enumerate() {
        println!(
            "  Frame {:3}: {:4}x{:<4} at ({:4}, {:4}), delay {} cs{}",
            i,
            frame.indices.width(),
            frame.indices.height(),
            frame.left,
            frame.top,
            frame.delay,
            if frame.uses_transparency { ", transparent" } else { "" }
        );
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [config.json]", program);
    eprintln!();
    eprintln!("Render a layered scene and quantize it to an indexed, diffed animation.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json  Run configuration (default: built-in scene, CPU backend)");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
    eprintln!("Set RUST_LOG=debug for per-stage logging.");
}

fn print_example_config() {
    let config = RunConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example config: {}", e),
    }
}
