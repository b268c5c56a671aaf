//! pankha-hwstate entry point: CLI dispatch, signal handlers, async runtime.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use pankha_hwstate::alarms::TracingAlarmSink;
use pankha_hwstate::app::bootstrap::{build_hardware, Hardware};
use pankha_hwstate::app::cli::Args;
use pankha_hwstate::app::logging::{filter_for_level, init_tracing, reload_level};
use pankha_hwstate::config::{load_config, validate_config};
use pankha_hwstate::publisher::Publisher;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
    let early_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok());
    let filter = match early_level.as_deref() {
        Some(level) => filter_for_level(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}'. Using INFO. Valid levels: TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL", level);
            "info"
        }),
        None => "info",
    };
    init_tracing(filter);

    let config = match load_config(args.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    if early_level.is_none() {
        if let Err(e) = reload_level(&config.agent.log_level) {
            error!("Ignoring configured log level: {:#}", e);
        }
    }

    if let Err(e) = validate_config(&config) {
        error!("Invalid configuration: {:#}", e);
        std::process::exit(1);
    }

    if args.show_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if args.check {
        println!(
            "Configuration OK: {} components, {} sensors, {} hot-plug devices",
            config.components.len(),
            config.sensors.len(),
            config.hotplug.devices.len()
        );
        return Ok(());
    }

    info!("pankha-hwstate v{} starting", env!("CARGO_PKG_VERSION"));

    let Hardware { state, devices } = build_hardware(&config).await?;
    let state_file = if args.once { None } else { config.output.state_file.clone() };
    let mut publisher = Publisher::new(state, TracingAlarmSink, state_file);

    if args.once {
        let snapshot = publisher.poll_once().await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        for device in &devices {
            device.shutdown().await;
        }
        return Ok(());
    }

    for device in &devices {
        device.start().await;
    }

    // SIGHUP re-reads the config and applies its log level
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let config_path = args.config.clone();
        let pinned_by_flag = early_level.is_some();
        match signal(SignalKind::hangup()) {
            Ok(mut sighup) => {
                tokio::spawn(async move {
                    while sighup.recv().await.is_some() {
                        info!("SIGHUP received, reloading log level configuration");
                        if pinned_by_flag {
                            info!("Log level set on the command line, keeping it");
                            continue;
                        }
                        match load_config(config_path.as_deref()).await {
                            Ok(new_config) => match reload_level(&new_config.agent.log_level) {
                                Ok(()) => info!("Log level reloaded: {}", new_config.agent.log_level.to_uppercase()),
                                Err(e) => error!("Failed to reload log level: {:#}", e),
                            },
                            Err(e) => error!("Failed to reload config: {:#}", e),
                        }
                    }
                });
            }
            Err(e) => error!("Failed to setup SIGHUP handler: {}", e),
        }
    }

    let interval = Duration::from_secs_f64(config.agent.poll_interval);
    tokio::select! {
        _ = publisher.run(interval) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received (Ctrl+C)");
        }
    }

    for device in &devices {
        device.shutdown().await;
    }

    info!("Agent shutdown complete");
    Ok(())
}
