use idrshot::caps::CapabilitySet;
use idrshot::cli::Args;
use idrshot::config::{self, ExportSettings, LOG_FILE, PathConfig, SETTINGS_FILE};
use idrshot::export::{ExportRequest, ExportSession};
use idrshot::extract;
use idrshot::format::{PictureFormat, negotiate};
use idrshot::source::{FrameSource, RawYuvSource};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, error, info};
use std::path::Path;
use std::process::ExitCode;

fn init_logger(args: &Args, path_config: &PathConfig) {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file(LOG_FILE, path_config));

        match std::fs::File::create(&log_path) {
            Ok(file) => {
                env_logger::Builder::new()
                    .filter_level(log_level)
                    .format_timestamp_millis()
                    .target(env_logger::Target::Pipe(Box::new(file)))
                    .init();
                info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
                return;
            }
            Err(e) => eprintln!(
                "Warning: cannot create log file {}: {}, logging to console",
                log_path.display(),
                e
            ),
        }
    }

    // Console logging (respects RUST_LOG if set)
    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn print_backends(caps: &CapabilitySet) {
    println!("Backends: {}", caps);
    for &format in PictureFormat::all() {
        let n = negotiate(format, caps);
        println!(
            "  {:<7} -> {:<7} .{:<4} ({})",
            format.to_string(),
            n.format.to_string(),
            n.extension(),
            n.backend.name()
        );
    }
}

/// Settings file merged with CLI overrides
fn effective_settings(args: &Args, path_config: &PathConfig) -> Result<ExportSettings> {
    let mut settings = ExportSettings::load(&config::config_file(SETTINGS_FILE, path_config))?;
    if let Some(format) = args.format {
        settings.format = format;
    }
    if args.quality.is_some() {
        settings.quality = args.quality;
    }
    if args.output_dir.is_some() {
        settings.output_dir = args.output_dir.clone();
    }
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if let Some(count) = args.count {
        settings.count = count as usize;
    }
    if let Some(workers) = args.workers {
        settings.parallel = workers > 1;
    }
    Ok(settings)
}

/// Returns Ok(true) when every export was written
fn run(args: &Args, path_config: &PathConfig) -> Result<bool> {
    let caps = CapabilitySet::global();
    if args.backends {
        print_backends(&caps);
        return Ok(true);
    }

    let settings = effective_settings(args, path_config)?;
    debug!("Effective settings: {:?}", settings);
    if args.save_settings {
        config::ensure_dirs(path_config)?;
        settings.save(&config::config_file(SETTINGS_FILE, path_config))?;
    }

    let Some(input) = args.input.as_deref() else {
        bail!("No input file given");
    };
    let Some((width, height)) = args.size else {
        bail!("--size WxH is required for raw 4:2:0 input");
    };

    let source = RawYuvSource::open(input, width, height)?;
    info!("Input: {} ({} pictures)", input.display(), source.picture_count());

    let indices = extract::plan(&source, settings.mode, settings.count);
    if indices.is_empty() {
        bail!("No pictures to export from {}", input.display());
    }
    info!("Mode {}: exporting pictures {:?}", settings.mode, indices);

    if let Some(dir) = &settings.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let base_name = args.name.clone().unwrap_or_else(|| file_stem(input));
    let mut template = ExportRequest::new(settings.format, base_name);
    template.quality = settings.quality;
    template.output_dir = settings.output_dir.clone();

    let session = ExportSession::new(caps)
        .with_source(source.path())
        .with_default_qualities(settings.jpeg_quality, settings.webp_quality);

    let summary = match args.workers {
        Some(n) if n > 1 => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .context("Failed to build worker pool")?;
            pool.install(|| session.export_batch(&source, &indices, &template, true))
        }
        _ => session.export_batch(&source, &indices, &template, settings.parallel),
    };

    for result in &summary.results {
        match &result.error {
            Some(e) if !result.is_written() => {
                eprintln!("FAILED  {}: {}", result.path.display(), e)
            }
            _ => println!("{:<8}{}", result.status.to_string(), result.path.display()),
        }
    }
    info!("{}", summary);
    Ok(summary.all_written())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "picture".to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if args.log_file.is_some() || args.save_settings {
        if let Err(e) = config::ensure_dirs(&path_config) {
            eprintln!("Warning: Failed to create application directories: {}", e);
        }
    }
    init_logger(&args, &path_config);
    debug!("Command-line args: {:?}", args);
    debug!(
        "Config path: {}",
        config::config_file(SETTINGS_FILE, &path_config).display()
    );

    match run(&args, &path_config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
