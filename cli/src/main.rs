use clap::Parser;
mod app;
mod commands;
use std::sync::Arc;

use commands::cli;
use fluxbridge_core::api::{AppContext, CliError, HookError, LoggingConfig, PredictError};
use fluxbridge_plugins::factory::StandardServicesFactory;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = fluxbridge_core::config::load_default()
        .map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    let ctx = AppContext::new(cfg, Some(Arc::new(StandardServicesFactory)));

    // No subcommand behaves like `predict` with defaults: the platform
    // invokes the binary with the request on stdin.
    let cmd = args
        .command
        .unwrap_or(cli::Commands::Predict(cli::PredictArgs {
            request: "-".into(),
            output_dir: "outputs".into(),
            no_preview: false,
            run_id: None,
        }));

    dispatch(cmd, ctx).await
}

async fn dispatch(cmd: cli::Commands, ctx: AppContext) -> Result<i32, CliError> {
    match cmd {
        cli::Commands::Predict(predict_args) => app::run_predict(predict_args, &ctx).await,
        cli::Commands::Frames(frames_args) => app::run_frames(frames_args).await,
        cli::Commands::Weights(weights_args) => app::run_weights(weights_args, &ctx).await,
    }
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config / invalid request
    // 20: io, weights, setup, output handling
    // 30: generation failure from the engine
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Predict(pe) => match pe {
            PredictError::Config(_) | PredictError::InvalidRequest(_) => 11,
            PredictError::Weights(_)
            | PredictError::Setup(_)
            | PredictError::Output(_)
            | PredictError::Io(_) => 20,
            PredictError::Hook(HookError::Generation(_)) => 30,
            PredictError::Hook(_) => 50,
        },
        CliError::Frames(_) => 20,
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("fluxbridge"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("fluxbridge.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    // Console output goes to stderr only: stdout is the frame channel and
    // the result manifest.
    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
