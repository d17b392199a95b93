use anyhow::{Context, Result};
use clap::Parser;
use gatepass::{
    parse_payload, Capability, GatepassConfig, HttpValidationClient, ManualEntryPrompt, Outcome,
    PlatformCapability, ScanControls, Scanner, ScriptedCapability,
};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const EXIT_NAVIGATE: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "gatepass")]
#[command(about = "Scan a visitor gate pass QR code and resolve the visitor it belongs to")]
#[command(version)]
#[command(long_about = "Scans a visitor gate pass from a camera or a photo, validates it \
against the visitor management API and prints the outcome as JSON. Falls back to manual \
entry, or an unattended simulated pass, when no QR decoder is available.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gatepass.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Session token for the validation endpoint
    #[arg(long, env = "GATEPASS_TOKEN", hide_env_values = true)]
    credential: Option<String>,

    /// Scan a photo of a pass instead of the camera
    #[arg(long, value_name = "PATH")]
    image: Option<String>,

    /// No camera backend; decode through manual entry or unattended synthesis
    #[arg(long)]
    headless: bool,

    /// Interpret a payload string and exit
    #[arg(long, value_name = "PAYLOAD")]
    parse: Option<String>,

    /// Do not open the manual entry prompt
    #[arg(long)]
    no_prompt: bool,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without scanning")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let guard = init_logging(&args)?;
    let exit_code = run(&args).await?;

    // Flush the file log before exiting
    drop(guard);
    std::process::exit(exit_code);
}

async fn run(args: &Args) -> Result<i32> {
    if let Some(payload) = &args.parse {
        return print_parse(payload);
    }

    info!("Starting gatepass v{}", env!("CARGO_PKG_VERSION"));

    let mut config = GatepassConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if let Some(image) = &args.image {
        config.camera.still_image = Some(image.clone());
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        return Ok(EXIT_ERROR);
    }
    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(EXIT_NAVIGATE);
    }

    run_scan(args, &config).await
}

async fn run_scan(args: &Args, config: &GatepassConfig) -> Result<i32> {
    let capability: Arc<dyn Capability> = if args.headless {
        info!("Headless mode, no camera backend");
        Arc::new(ScriptedCapability::headless())
    } else {
        Arc::new(PlatformCapability::new(config.camera.clone(), &config.api))
    };

    let validator = HttpValidationClient::new(&config.api)
        .context("Failed to create validation client")?;
    let mut scanner = Scanner::new(capability, config).with_validator(Arc::new(validator));

    let (controls, inputs) = ScanControls::pair();

    let signal_controls = controls.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling scan");
            signal_controls.cancel();
        }
    });

    if let Some(seconds) = args.timeout {
        let timeout_controls = controls.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            warn!("Scan timed out after {}s", seconds);
            timeout_controls.cancel();
        });
    }

    let prompt = (!args.no_prompt && std::io::stdin().is_terminal()).then(|| {
        let prompt = ManualEntryPrompt::new(controls.clone());
        let handle = prompt.start();
        (prompt, handle)
    });

    let report = scanner.run(args.credential.as_deref(), inputs).await;

    if let Some((prompt, handle)) = prompt {
        prompt.stop(handle).await;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(match report.outcome {
        Outcome::NavigateTo(_) => EXIT_NAVIGATE,
        Outcome::Error { .. } => EXIT_ERROR,
        Outcome::Cancelled => EXIT_CANCELLED,
    })
}

fn print_parse(payload: &str) -> Result<i32> {
    let (body, code) = match parse_payload(payload) {
        Ok(parsed) => (serde_json::to_value(&parsed)?, EXIT_NAVIGATE),
        Err(e) => (serde_json::to_value(Outcome::from(e))?, EXIT_ERROR),
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(code)
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gatepass={}", log_level)));

    // stdout carries the JSON outcome, logs go to stderr
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gatepass.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

fn print_default_config() -> Result<()> {
    println!("# Gatepass Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&GatepassConfig::default())?);
    Ok(())
}
