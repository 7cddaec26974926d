use anyhow::Context;
use clap::{ArgAction, Parser};
use is_terminal::IsTerminal;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use logcat_color::config::{self, Config, Profile};
use logcat_color::pipeline::filters::SharedSink;
use logcat_color::{
    AdbProducer, ConfigError, DeviceSelector, FilterStage, FormatKind, LayoutMode, LogInput,
    LogcatArgs, PipelineConfig, ProcessingStats, ReconnectPolicy, SessionController, SessionError,
};

/// Width assumed when the output is not a terminal
const PIPED_WIDTH: usize = 2000;

#[derive(Parser)]
#[command(name = "logcat-color")]
#[command(about = "A colorful and highly configurable alternative to the adb logcat command")]
#[command(version)]
struct Args {
    /// Profile name from the config file, followed by logcat filter specs
    #[arg(value_name = "PROFILE|FILTERSPEC")]
    positional: Vec<String>,

    /// Path to the config file (default: ~/.logcat-color.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Apply profiles and filters but write lines unformatted
    #[arg(long)]
    plain: bool,

    /// Don't wrap messages into a column
    #[arg(long)]
    no_wrap: bool,

    /// Wait for the device to come back when it disconnects
    #[arg(long)]
    stay_connected: bool,

    /// Keep the detected format across reconnects instead of re-detecting
    #[arg(long)]
    keep_format: bool,

    /// Read from FILE instead of starting adb
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: Option<PathBuf>,

    /// Write to FILE (default: stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Connect to the only plugged-in device
    #[arg(short = 'd', long, conflicts_with_all = ["emulator", "serial_number"])]
    device: bool,

    /// Connect to the only running emulator
    #[arg(short = 'e', long, conflicts_with = "serial_number")]
    emulator: bool,

    /// Connect to a device by serial number
    #[arg(short = 's', long, value_name = "SERIAL")]
    serial_number: Option<String>,

    /// Alternate log buffer to view, such as events or radio
    #[arg(short = 'b', long = "buffer", value_name = "BUFFER", action = ArgAction::Append)]
    buffers: Vec<String>,

    /// Clear the entire log and exit
    #[arg(short = 'c', long)]
    clear: bool,

    /// Dump the log and exit
    #[arg(long)]
    dump: bool,

    /// Have logcat write its output to FILE on the device
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<String>,

    /// Print the size of the log buffer and exit
    #[arg(short = 'g', long)]
    print_size: bool,

    /// Maximum number of rotated logs (requires -r)
    #[arg(short = 'n', long, value_name = "COUNT")]
    max_rotated_logs: Option<u32>,

    /// Rotate the log file every KBYTES of output (requires -f)
    #[arg(short = 'r', long = "rotate", value_name = "KBYTES")]
    rotate_kbytes: Option<u32>,

    /// Set the default filter spec to silent
    #[arg(long)]
    silent: bool,

    /// Log format (default: auto-detect)
    #[arg(short = 'v', long, value_enum)]
    format: Option<FormatKind>,

    /// Record every filter decision as JSON lines in FILE
    #[arg(long, value_name = "FILE")]
    filter_log: Option<PathBuf>,

    /// Debug logging and final statistics
    #[arg(long)]
    debug: bool,

    #[arg(long, hide = true, value_name = "N")]
    max_reconnects: Option<usize>,
}

impl Args {
    /// Split positionals into a profile (if the first one names one) and
    /// filter specs
    fn resolve_profile<'c>(&self, config: &'c Config) -> (Option<(&str, &'c Profile)>, &[String]) {
        match self.positional.split_first() {
            Some((first, rest)) => match config.profile(first) {
                Some(profile) => (Some((first.as_str(), profile)), rest),
                None => (None, &self.positional),
            },
            None => (None, &self.positional),
        }
    }

    fn device_selector(&self) -> Option<DeviceSelector> {
        if let Some(serial) = &self.serial_number {
            Some(DeviceSelector::Serial(serial.clone()))
        } else if self.device {
            Some(DeviceSelector::Device)
        } else if self.emulator {
            Some(DeviceSelector::Emulator)
        } else {
            None
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let code = match run(args) {
        Ok(()) => 0,
        Err(e) => {
            report(&e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

fn init_logging(debug: bool) {
    let level = if debug { "logcat_color=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<SessionError>() {
        // adb failures carry their own remediation text
        Some(SessionError::Spawn(spawn)) => eprintln!("{}", spawn),
        _ => eprintln!("logcat-color: {:#}", e),
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<SessionError>()
        .map(SessionError::exit_code)
        .unwrap_or(1)
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = config::load(args.config.as_deref())?;
    let (profile, filter_specs) = args.resolve_profile(&config);

    let profile_format = match profile {
        Some((_, p)) => p.format()?,
        None => None,
    };
    let format = args.format.or(profile_format);

    let wrap = !args.no_wrap
        && profile
            .and_then(|(_, p)| p.wrap)
            .or(config.wrap)
            .unwrap_or(true);

    let mut filters = match profile {
        Some((name, p)) => p.build_filters(name)?,
        None => FilterStage::new(),
    };
    if let Some(path) = &args.filter_log {
        let file = File::create(path)
            .with_context(|| format!("Failed to create filter log '{}'", path.display()))?;
        let sink: SharedSink = Arc::new(Mutex::new(Box::new(io::BufWriter::new(file))));
        filters = filters.recorded(sink);
    }

    let device = args
        .device_selector()
        .or_else(|| profile.and_then(|(_, p)| p.device_selector()))
        .unwrap_or_default();

    let mut logcat = LogcatArgs::new();
    if let Some(format) = format {
        logcat = logcat.format(format);
    }
    for (enabled, flag) in [
        (args.clear, "-c"),
        (args.dump, "-d"),
        (args.print_size, "-g"),
        (args.silent, "-s"),
    ] {
        if enabled {
            logcat = logcat.flag(flag);
        }
    }
    let profile_buffers = profile.map(|(_, p)| p.buffers.as_slice()).unwrap_or(&[]);
    for buffer in args.buffers.iter().chain(profile_buffers) {
        logcat = logcat.buffer(buffer);
    }
    if let Some(file) = &args.file {
        logcat = logcat.file(file);
    }
    if let Some(count) = args.max_rotated_logs {
        logcat = logcat.max_rotated_logs(count);
    }
    if let Some(kbytes) = args.rotate_kbytes {
        logcat = logcat.rotate_kbytes(kbytes);
    }
    for spec in filter_specs {
        logcat = logcat.filter_spec(spec);
    }

    let adb = config.adb_program(std::env::var("ADB").ok());
    let producer = AdbProducer::new(&adb, device, logcat);

    let mut pipeline_config = PipelineConfig {
        format,
        layout: if args.plain { LayoutMode::Plain } else { LayoutMode::Color },
        width: output_width(args.output.is_some()),
        wrap,
        reuse_format: args.keep_format || config.keep_format,
        profile: profile.map(|(name, _)| name.to_string()),
        ..PipelineConfig::default()
    };
    if let Some(width) = config.tag_width {
        pipeline_config.columns.tag = width;
    }
    if let Some(width) = config.pid_width {
        pipeline_config.columns.pid = width;
    }

    let policy = ReconnectPolicy {
        stay_connected: args.stay_connected || config.stay_connected,
        max_waits: args.max_reconnects,
    };

    if let Some(path) = &args.input {
        if !path.is_file() {
            return Err(ConfigError::InputNotFound(path.clone()).into());
        }
    }

    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
            Box::new(io::BufWriter::with_capacity(pipeline_config.buffer_size, file))
        }
        None => Box::new(io::BufWriter::with_capacity(
            pipeline_config.buffer_size,
            io::stdout(),
        )),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let mut controller =
        SessionController::new(producer, pipeline_config, Arc::new(filters), policy);

    let result: anyhow::Result<ProcessingStats> = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(true);
            }
        });

        // piped stdin or --input replaces the first adb session
        let initial: Option<LogInput> = match &args.input {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| ConfigError::Io {
                        path: path.clone(),
                        source: e,
                    })?;
                Some(Box::new(file))
            }
            None if !io::stdin().is_terminal() => Some(Box::new(tokio::io::stdin())),
            None => None,
        };

        controller
            .run(initial, &mut output, shutdown_rx)
            .await
            .map_err(anyhow::Error::from)
    });

    // stdin is read on a blocking thread that may never return after Ctrl-C
    drop(controller);
    runtime.shutdown_background();

    match output.flush() {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e.into()),
        _ => {}
    }

    let stats = result?;
    if args.debug {
        print_stats(&stats);
    }
    Ok(())
}

fn output_width(to_file: bool) -> usize {
    if to_file || !io::stdout().is_terminal() {
        return PIPED_WIDTH;
    }
    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(80)
}

fn print_stats(stats: &ProcessingStats) {
    eprintln!("Final statistics:");
    eprintln!("  Sessions: {}", stats.sessions);
    eprintln!("  Lines read: {}", stats.lines_read);
    eprintln!("  Markers: {}", stats.markers);
    eprintln!("  Records matched: {}", stats.records_matched);
    eprintln!("  Records output: {}", stats.records_output);
    eprintln!("  Records filtered: {}", stats.records_filtered);
    eprintln!("  Lines unmatched: {}", stats.lines_unmatched);
    eprintln!("  Processing time: {:?}", stats.processing_time);

    if stats.lines_read > 0 && !stats.processing_time.is_zero() {
        let rate = stats.lines_read as f64 / stats.processing_time.as_secs_f64();
        eprintln!("  Processing rate: {:.0} lines/second", rate);
    }
}
