//! Mailgate - HTTP email gateway accepting HMAC-signed send requests.

use std::env;
use std::process::ExitCode;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailgate::auth::{Authenticator, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use mailgate::config::Settings;
use mailgate::server::GatewayServer;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "/etc/mailgate/mailgate.toml";

fn main() -> ExitCode {
    // Parse command line arguments (simple std::env approach)
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_option(&args, "--config", "-c")
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.get(1).map(String::as_str) == Some("sign") {
        return run_sign(&args, &settings);
    }

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Bind address: {}", settings.server.bind);
    info!("Log level: {}", settings.logging.level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

/// Async main function.
async fn async_main(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let server = GatewayServer::bind(&settings).await?;
    info!(addr = %server.local_addr()?, "Listening");

    server.run(shutdown_signal()).await?;

    info!("Gateway stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections...");
}

/// `mailgate sign`: print the headers a client would send for a body file.
fn run_sign(args: &[String], settings: &Settings) -> ExitCode {
    let Some(body_path) = get_option(args, "--body-file", "-b") else {
        eprintln!("sign requires --body-file <FILE>");
        return ExitCode::FAILURE;
    };

    let body = match std::fs::read(&body_path) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error reading {}: {}", body_path, e);
            return ExitCode::FAILURE;
        }
    };

    let timestamp = match get_option(args, "--timestamp", "-t") {
        Some(ts) => ts,
        None => chrono::Utc::now().timestamp().to_string(),
    };

    let secret = match settings.load_secret() {
        Ok(secret) => secret,
        Err(e) => {
            eprintln!("Error loading secret: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let signature = Authenticator::new(&secret).sign(&timestamp, &body);
    println!("{}: {}", TIMESTAMP_HEADER, timestamp);
    println!("{}: {}", SIGNATURE_HEADER, signature);

    ExitCode::SUCCESS
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
HTTP email gateway accepting HMAC-signed send requests.

USAGE:
    {} [OPTIONS]
    {} sign --body-file <FILE> [--timestamp <SECS>] [OPTIONS]

OPTIONS:
    -c, --config <PATH>       Path to configuration file
                              [default: {}]
    -b, --body-file <FILE>    Request body to sign (sign only)
    -t, --timestamp <SECS>    Timestamp to sign with [default: now] (sign only)
    -h, --help                Print help information
    -V, --version             Print version information
"#,
        NAME, VERSION, NAME, NAME, DEFAULT_CONFIG_PATH
    );
}

/// Get the value of `--name <value>`, `-n <value>` or `--name=<value>`.
fn get_option(args: &[String], long: &str, short: &str) -> Option<String> {
    let inline = format!("{}=", long);
    for (i, arg) in args.iter().enumerate() {
        if (arg == long || arg == short) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(value) = arg.strip_prefix(inline.as_str()) {
            return Some(value.to_string());
        }
    }
    None
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}
