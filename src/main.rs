//! Memory Layout Inspector - Command Line Entry Point

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use memlayout::config::{parse_linker_script, Args};
use memlayout::elf::extract_symbols_from_file;
use memlayout::memory::model::MemoryModel;
use memlayout::memory::segment::{EmptyRegionPolicy, Segment};
use memlayout::utils::{format_address, format_size};
use memlayout::Config;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.generate_config {
        let config = Config::default();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&args)?;

    info!("memlayout v{}", env!("CARGO_PKG_VERSION"));
    debug!("command line args: {:?}", args);

    let mut config = Config::load(args.config.as_ref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config.merge_args(&args);

    if let Some(script_path) = &args.linker_script {
        let text = std::fs::read_to_string(script_path)?;
        match parse_linker_script(&text) {
            Some(settings) => {
                info!("using regions from linker script {}", script_path.display());
                config.regions = settings;
            }
            None => {
                anyhow::bail!(
                    "no MEMORY block with FLASH and RAM regions in {}",
                    script_path.display()
                );
            }
        }
    }

    if args.show_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        e
    })?;
    let regions = config.regions.to_region_config()?;

    let Some(elf_path) = &args.elf else {
        anyhow::bail!("no ELF image given (try: memlayout firmware.elf)");
    };

    let symbols = extract_symbols_from_file(elf_path)?;
    let mut model = MemoryModel::new();
    model.load_symbols(&symbols);

    let mut segments = Vec::new();
    for region in regions.regions() {
        if let Some(segment) = model.segment_for(region, EmptyRegionPolicy::FullGap)? {
            segments.push(segment);
        }
    }

    if args.json {
        let report = serde_json::json!({
            "elf": elf_path,
            "variables": symbols,
            "segments": segments,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&segments, symbols.len());
    }

    Ok(())
}

fn print_report(segments: &[Segment], variable_count: usize) {
    println!("{} variable symbols\n", variable_count);
    for segment in segments {
        println!(
            "{} ({} - {})",
            segment.name,
            format_address(segment.min_address),
            format_address(segment.max_address)
        );
        for entry in &segment.entries {
            let end = entry.address.wrapping_add(entry.size).wrapping_sub(1);
            println!(
                "  {} - {}  {:>12}  {:<10}  {}",
                format_address(entry.address),
                format_address(end),
                format_size(entry.size as u64),
                entry.kind.name(),
                entry.name
            );
        }
        println!();
    }
}

/// Initialize logging system
fn init_logging(args: &Args) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        subscriber.with_writer(file).with_ansi(false).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    debug!("logging initialized with level: {}", args.log_level);
    Ok(())
}
