mod cli;
mod config;
mod logging;
mod metrics;

use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use manager::{admin_router, ManagerResources, StreamManager};
use sysinfo::{Pid, System};
use tokio::time::sleep;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::{read_config, Config};
use crate::logging::LogDestination;
use crate::metrics::CPU_SECONDS_TOTAL_COUNTER;

const DEFAULT_CONFIG_PATHS: &[&str] = &["weir.yaml", "/etc/weir/config.yaml", "/etc/weir.yaml"];
const API_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const SINGLE_STREAM_ID: &str = "main";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.wants_listing() {
        print_listings(&cli);
        return;
    }

    let (config, lints) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(detail) => {
            eprintln!("Configuration file read error: {detail}");
            process::exit(1);
        }
    };

    if cli.lint {
        for lint in &lints {
            eprintln!("{lint}");
        }
        process::exit(if lints.is_empty() { 0 } else { 1 });
    }

    if cli.print_yaml || cli.print_json {
        print_config(&cli, &config);
        return;
    }

    let exit_timeout = match flow::parse_duration(&config.system_close_timeout) {
        Ok(timeout) => timeout,
        Err(detail) => {
            eprintln!("Failed to parse shutdown timeout period string: {detail}");
            process::exit(1);
        }
    };

    init_logging(&config);

    if !lints.is_empty() {
        for lint in &lints {
            if cli.strict {
                tracing::error!(lint = %lint, "config lint");
            } else {
                tracing::warn!(lint = %lint, "config lint");
            }
        }
        if cli.strict {
            tracing::error!("shutting down due to --strict mode");
            process::exit(1);
        }
    }

    if config.metrics.enabled {
        if let Err(detail) = init_metrics_exporter(&config).await {
            tracing::error!(error = %detail, "failed to start metrics exporter");
            process::exit(1);
        }
    }

    let resources = match ManagerResources::from_config(&config.resources) {
        Ok(resources) => resources,
        Err(err) => {
            tracing::error!(error = %err, "failed to create resources");
            process::exit(1);
        }
    };
    let stream_manager = Arc::new(StreamManager::new(resources.shared(), API_STOP_TIMEOUT));

    if cli.streams {
        if let Some(dir) = &cli.streams_dir {
            match manager::load_stream_configs_from_directory(dir) {
                Ok(configs) => {
                    let count = configs.len();
                    for (id, stream_config) in configs {
                        if let Err(err) = stream_manager.create(&id, stream_config) {
                            tracing::error!(stream = %id, error = %err, "failed to create stream");
                            process::exit(1);
                        }
                    }
                    if count > 0 {
                        tracing::info!(
                            streams = count,
                            directory = %dir.display(),
                            "created streams from directory"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to load stream configs");
                    process::exit(1);
                }
            }
        }
        tracing::info!("launching weir in streams mode, use CTRL+C to close");
    } else {
        let stream_config = match config.stream_config() {
            Ok(stream_config) => stream_config,
            Err(err) => {
                tracing::error!(error = %err, "service closing");
                process::exit(1);
            }
        };
        if let Err(err) = stream_manager.create(SINGLE_STREAM_ID, stream_config) {
            tracing::error!(error = %err, "service closing");
            process::exit(1);
        }
        tracing::info!("launching a weir instance, use CTRL+C to close");
    }

    if config.http.enabled {
        let router = admin_router(stream_manager.clone(), cli.streams);
        let address = config.http.address.clone();
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&address).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!(address = %address, error = %err, "admin API failed to bind");
                    return;
                }
            };
            tracing::info!(address = %address, "listening for HTTP requests");
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(error = %err, "admin API server error");
            }
        });
    }

    wait_for_termination_signal().await;
    tracing::info!("received termination signal, the service is closing");

    // Half the budget drains the streams; the rest is the hard-stop
    // margin before the watchdog gives up on the process entirely.
    let drain_timeout = exit_timeout / 2;
    tokio::spawn(async move {
        sleep(exit_timeout).await;
        eprintln!(
            "Service failed to close cleanly within allocated time. Exiting forcefully."
        );
        process::exit(1);
    });

    if stream_manager.stop_all(drain_timeout).await.is_err() {
        tracing::error!("streams failed to drain within the shutdown budget");
        process::exit(1);
    }
    process::exit(0);
}

fn load_config(cli: &Cli) -> Result<(Config, Vec<String>), String> {
    if let Some(path) = &cli.config {
        return read_config(path).map_err(|e| e.to_string());
    }
    for candidate in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(candidate);
        if path.exists() {
            eprintln!("Config file not specified, reading from {candidate}");
            return read_config(&path).map_err(|e| e.to_string());
        }
    }
    Ok((Config::default(), Vec::new()))
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logger.level.clone()));
    match logging::open_destination(&config.logger) {
        Ok(LogDestination::Stdout) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
        Ok(LogDestination::File(writer)) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(writer)),
                )
                .init();
        }
        Err(err) => {
            eprintln!("Failed to open log output: {err}");
            process::exit(1);
        }
    }
}

async fn init_metrics_exporter(config: &Config) -> Result<(), String> {
    let addr = config
        .metrics
        .address
        .parse()
        .map_err(|e| format!("invalid metrics address: {e}"))?;
    let exporter = prometheus_exporter::start(addr).map_err(|e| e.to_string())?;
    // Leak the exporter handle so the endpoint stays alive for the
    // duration of the process.
    Box::leak(Box::new(exporter));

    let poll_interval = flow::parse_duration(&config.metrics.poll_interval)
        .unwrap_or_else(|_| Duration::from_secs(5));

    tokio::spawn(async move {
        let mut system = System::new();
        let pid = Pid::from_u32(process::id());
        loop {
            system.refresh_process(pid);
            if let Some(proc_info) = system.process(pid) {
                let cpu_usage_percent = proc_info.cpu_usage() as f64;
                telemetry::CPU_USAGE_GAUGE.set(cpu_usage_percent as i64);
                let delta_secs = (cpu_usage_percent / 100.0) * poll_interval.as_secs_f64();
                if delta_secs.is_finite() && delta_secs >= 0.0 {
                    CPU_SECONDS_TOTAL_COUNTER.inc_by(delta_secs);
                }
                telemetry::MEMORY_USAGE_GAUGE.set(proc_info.memory() as i64);
            } else {
                telemetry::CPU_USAGE_GAUGE.set(0);
                telemetry::MEMORY_USAGE_GAUGE.set(0);
            }

            sleep(poll_interval).await;
        }
    });

    Ok(())
}

async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn print_listings(cli: &Cli) {
    let mut sections: Vec<(&str, Vec<(String, &'static str)>)> = Vec::new();
    if cli.list_inputs {
        sections.push(("Inputs", flow::registry::input_descriptions()));
    }
    if cli.list_processors {
        sections.push(("Processors", flow::registry::processor_descriptions()));
    }
    if cli.list_buffers {
        sections.push(("Buffers", flow::registry::buffer_descriptions()));
    }
    if cli.list_outputs {
        sections.push(("Outputs", flow::registry::output_descriptions()));
    }
    if cli.list_conditions {
        sections.push((
            "Conditions",
            flow::condition_descriptions()
                .into_iter()
                .map(|(name, desc)| (name.to_string(), desc))
                .collect(),
        ));
    }
    if cli.list_caches {
        sections.push((
            "Caches",
            manager::cache_descriptions()
                .into_iter()
                .map(|(name, desc)| (name.to_string(), desc))
                .collect(),
        ));
    }
    if cli.list_rate_limits {
        sections.push((
            "Rate limits",
            manager::rate_limit_descriptions()
                .into_iter()
                .map(|(name, desc)| (name.to_string(), desc))
                .collect(),
        ));
    }
    for (title, entries) in sections {
        println!("{title}:");
        for (name, description) in entries {
            println!("  {name} - {description}");
        }
    }
}

fn print_config(cli: &Cli, config: &Config) {
    let value = if cli.all {
        serde_json::to_value(config).expect("serialise config")
    } else {
        config.sanitised()
    };
    if cli.print_json {
        println!(
            "{}",
            serde_json::to_string(&value).expect("marshal config json")
        );
    } else {
        println!(
            "{}",
            serde_yaml::to_string(&value).expect("marshal config yaml")
        );
    }
}
