use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vsnd::audio::wav::PcmClip;
use vsnd::cli::{Cli, Commands};
use vsnd::config::Config;
use vsnd::device::{Device, Registry};
use vsnd::diagnostics::{InitOutcome, check_devices, create_missing_fifos};
use vsnd::playback::{Playback, PlaybackReport};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!(version = %vsnd::version_string(), "vsnd starting");

    match cli.command {
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            if !check_devices(&config) {
                std::process::exit(1);
            }
        }
        Commands::Devices { json } => {
            let config = load_config(cli.config.as_deref())?;
            list_devices(&config, json)?;
        }
        Commands::Init => {
            let config = load_config(cli.config.as_deref())?;
            init_fifos(&config)?;
        }
        Commands::Play { path, device } => {
            let config = load_config(cli.config.as_deref())?;
            let clip = PcmClip::open(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            let report = play(&config, device, &clip)?;
            print_report(&report, cli.quiet);
        }
        Commands::Tone {
            freq,
            duration,
            device,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let registry = Registry::from_config(&config)?;
            let dev = select_device(&registry, device)?;
            let clip = PcmClip::sine(freq, duration, dev.default_params().rate);
            let report = play_on(dev, &clip)?;
            print_report(&report, cli.quiet);
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vsnd", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `-v`/`-q`.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("vsnd={level}"))),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration with the following priority:
/// 1. Explicit --config path
/// 2. Default config path (~/.config/vsnd/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path()?)?
    };

    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn list_devices(config: &Config, json: bool) -> Result<()> {
    let registry = Registry::from_config(config)?;
    let infos: Vec<_> = registry.devices().map(|d| d.info()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("Registered devices:");
    for info in infos {
        let params = info.default_params;
        println!(
            "  [{}] {}  {}  {} {} Hz {}ch  buffer {} / period {} frames  {} ticks/s{}",
            info.id,
            info.name.bold(),
            info.output.display(),
            params.format,
            params.rate,
            params.channels,
            params.buffer_frames,
            params.period_frames,
            info.tick_rate,
            if info.busy { " (busy)" } else { "" }
        );
    }
    Ok(())
}

fn init_fifos(config: &Config) -> Result<()> {
    let mut failed = 0usize;
    for (path, outcome) in create_missing_fifos(config) {
        match outcome {
            InitOutcome::Created => println!("{} {}", "created".green(), path.display()),
            InitOutcome::AlreadyExists => println!("{} {}", "exists ".dimmed(), path.display()),
            InitOutcome::NotAFifo => {
                failed += 1;
                println!(
                    "{} {} (not a named pipe)",
                    "skipped".yellow(),
                    path.display()
                );
            }
            InitOutcome::Failed(msg) => {
                failed += 1;
                println!("{} {}: {}", "failed ".red(), path.display(), msg);
            }
        }
    }
    if failed > 0 {
        bail!("{failed} output(s) could not be created");
    }
    Ok(())
}

fn select_device(registry: &Registry, id: Option<u32>) -> Result<&Arc<Device>> {
    let id = match id {
        Some(id) => id,
        None => registry.first_id().context("No device registered")?,
    };
    Ok(registry.device(id)?)
}

fn play(config: &Config, device: Option<u32>, clip: &PcmClip) -> Result<PlaybackReport> {
    let registry = Registry::from_config(config)?;
    play_on(select_device(&registry, device)?, clip)
}

fn play_on(device: &Arc<Device>, clip: &PcmClip) -> Result<PlaybackReport> {
    let defaults = device.default_params();
    let mut stream = device
        .open()
        .with_context(|| format!("Failed to open {}", device.name()))?;
    let result = Playback::new(&stream)
        .with_limits(device.limits())
        .run(clip, defaults.buffer_frames, defaults.period_frames);
    stream.close();
    Ok(result?)
}

fn print_report(report: &PlaybackReport, quiet: bool) {
    if quiet {
        return;
    }
    let stats = report.stats;
    println!(
        "{} {} bytes in {} periods ({} delivered, {} dropped, {} ticks)",
        "played".green(),
        report.clip_bytes,
        report.periods,
        stats.bytes_delivered,
        stats.bytes_dropped,
        stats.ticks
    );
    println!(
        "  buffer {} / period {} frames",
        report.geometry.buffer_frames(),
        report.geometry.period_frames()
    );
    if stats.bytes_dropped > 0 {
        println!(
            "{}",
            "⚠ Some audio was dropped; is anything reading the pipe?".yellow()
        );
    }
}
