use actix_web::{App, HttpServer, web};
use clap::Parser;
use signal_execution_rs::api;
use signal_execution_rs::config::{Settings, TelemetryConfig};
use signal_execution_rs::context::ExecutionContext;
use signal_execution_rs::exchange::select_executor;
use signal_execution_rs::pipeline::SignalPipeline;
use signal_execution_rs::risk_gate::RiskGate;
use signal_execution_rs::telegram::TelegramListener;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const QUEUE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "signal-execution", about = "Chat signal to exchange order pipeline")]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config/bot.toml")]
    config: String,

    /// Log orders instead of sending them
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&telemetry.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if telemetry.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let settings = Settings::load(&args.config, args.dry_run)?;
    init_tracing(&settings.telemetry);

    info!(
        config = %args.config,
        environment = %settings.mode.environment,
        market_type = %settings.mode.market_type,
        dry_run = settings.debug.dry_run,
        "Signal execution starting"
    );

    let ctx = ExecutionContext::new_system();
    let executor = select_executor(&settings, &ctx)?;
    let risk = Arc::new(RiskGate::new(&settings.risk, ctx.time.clone()));
    let pipeline = Arc::new(SignalPipeline::from_settings(
        &settings,
        risk.clone(),
        executor,
    )?);

    info!("✅ Core components initialized");

    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

    // Without a transport the sender is held so the pipeline idles until shutdown.
    let (listener_handle, _idle_sender) = if settings.telegram.enabled {
        let token = settings.telegram.bot_token.resolve()?;
        let listener = TelegramListener::new(&settings.telegram, &token)?;
        (Some(tokio::spawn(listener.run(tx))), None)
    } else {
        warn!("No transport enabled; pipeline will idle");
        (None, Some(tx))
    };

    let mut pipeline_handle = tokio::spawn(pipeline.run(rx, settings.trading.max_in_flight));

    // --- Ops API ---
    let server_handle = match settings.telemetry.http_port {
        Some(port) => {
            info!("🚀 Starting ops API on 0.0.0.0:{}", port);
            let gate = risk.clone();
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(web::Data::new(gate.clone()))
                    .configure(api::config)
            })
            .disable_signals()
            .bind(("0.0.0.0", port))?
            .run();
            let handle = server.handle();
            tokio::spawn(server);
            Some(handle)
        }
        None => None,
    };

    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        res = &mut pipeline_handle => {
            if let Err(e) = res {
                error!("Pipeline task ended unexpectedly: {}", e);
            }
        }
    }

    if let Some(handle) = listener_handle {
        handle.abort();
    }
    pipeline_handle.abort();
    if let Some(handle) = server_handle {
        handle.stop(true).await;
    }

    info!("Signal execution stopped");
    Ok(())
}
