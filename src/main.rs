// src/main.rs

//! The main entry point for the LineWire server application.

use anyhow::{Context, Result};
use dashmap::DashMap;
use linewire::config::Config;
use linewire::core::HandlerError;
use linewire::core::commands::CommandTable;
use linewire::server::{self, ServerMode};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{Registry, filter::EnvFilter, prelude::*, reload};

const DEFAULT_CONFIG_PATH: &str = "linewire.toml";

type LogReloadHandle = reload::Handle<EnvFilter, Registry>;

#[tokio::main]
async fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("LineWire version {VERSION}");
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: linewire [--config path] [--port N] [--mode single|multi]");
        return Ok(());
    }

    // An explicit --config must exist; the default path is optional.
    let explicit_config = flag_value(&args, "--config");
    let config_path = explicit_config.unwrap_or(DEFAULT_CONFIG_PATH);
    let mut config = if explicit_config.is_some() || Path::new(config_path).exists() {
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    if let Some(port_str) = flag_value(&args, "--port") {
        match port_str.parse::<u16>() {
            Ok(port) => config.port = port,
            Err(_) => {
                eprintln!("Invalid port number: {port_str}");
                std::process::exit(1);
            }
        }
    }
    if let Some(mode_str) = flag_value(&args, "--mode") {
        match mode_str.parse::<ServerMode>() {
            Ok(mode) => config.mode = mode,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
    for flag in ["--config", "--port", "--mode"] {
        if args.last().is_some_and(|a| a == flag) {
            eprintln!("{flag} flag requires a value");
            std::process::exit(1);
        }
    }

    // Get initial log level from env var or config.
    let initial_log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    // Reloadable so LOGLEVEL can change it at runtime.
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();

    info!("Starting LineWire {} in {} mode.", VERSION, config.mode);

    let table = demo_table(reload_handle).context("Failed to build the command table")?;
    if let Err(e) = server::run(config, table).await {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// A small command set that makes the binary usable with `nc`.
fn demo_table(log_reload_handle: LogReloadHandle) -> Result<CommandTable> {
    let store: Arc<DashMap<String, String>> = Arc::new(DashMap::new());
    let set_store = store.clone();
    let get_store = store.clone();
    let incr_store = store;

    let mut table = CommandTable::new();
    table
        .register("PING", 0, |ctx, _| {
            ctx.send_string("PONG");
            Ok(())
        })?
        .register("PING", 1, |ctx, args| {
            ctx.send_string(args[0].clone());
            Ok(())
        })?
        .register("ECHO", 1, |ctx, args| {
            ctx.send_string(args[0].clone());
            Ok(())
        })?
        .register("SET", 2, move |ctx, args| {
            set_store.insert(args[0].clone(), args[1].clone());
            ctx.send_string("OK");
            Ok(())
        })?
        .register("GET", 1, move |ctx, args| {
            match get_store.get(&args[0]) {
                Some(value) => ctx.send_string(value.value().clone()),
                None => ctx.send_string("(nil)"),
            }
            Ok(())
        })?
        .register("INCR", 1, move |ctx, args| {
            let mut entry = incr_store
                .entry(args[0].clone())
                .or_insert_with(|| "0".to_string());
            let current: i64 = entry
                .parse()
                .map_err(|_| HandlerError::invalid("value is not an integer"))?;
            let next = current
                .checked_add(1)
                .ok_or_else(|| HandlerError::invalid("increment would overflow"))?;
            *entry = next.to_string();
            ctx.send_string(next.to_string());
            Ok(())
        })?
        .register("LOGLEVEL", 1, move |ctx, args| {
            let filter = EnvFilter::try_new(&args[0])
                .map_err(|e| HandlerError::invalid(format!("invalid log filter: {e}")))?;
            log_reload_handle
                .reload(filter)
                .context("Failed to reload the log filter")?;
            info!("Log filter changed to '{}'.", args[0]);
            ctx.send_string("OK");
            Ok(())
        })?
        .register("QUIT", 0, |ctx, _| {
            ctx.send_string("BYE");
            ctx.close();
            Ok(())
        })?;
    table.on_invalid_arguments(|ctx, reason| {
        ctx.send_string(format!("ERR {reason}"));
    });
    Ok(table)
}
