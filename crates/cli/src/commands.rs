// SPDX-License-Identifier: MIT

//! Subcommand handlers: turn parsed CLI args into control-socket calls.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand};
use serde_json::{json, Map, Value};

use crate::client::DaemonClient;
use crate::output::{format_or_json, handle_list, OutputFormat};

#[derive(Subcommand)]
pub enum Command {
    /// Start a new app from a script
    Start(StartArgs),
    /// Stop an app's workers without forgetting it
    Stop { name: String },
    /// Stop then start an app's workers
    Restart { name: String },
    /// Rolling-restart an app's workers without a gap in availability
    Reload { name: String },
    /// Stop an app and forget its configuration
    Delete { name: String },
    /// List every known app
    List,
    /// Show one app's workers and their state
    Status { name: String },
    /// Dump every app's full status (like `list`, with worker detail)
    Dump,
    /// Ping the daemon
    Ping,
    /// Ask the daemon to stop every app and exit
    Shutdown,
    /// Tail an app's worker stdout/stderr until interrupted
    Logs { name: String },
    /// Tail an app's worker metrics until interrupted
    Metrics { name: String },
}

#[derive(Args)]
pub struct StartArgs {
    /// Unique app name
    pub name: String,
    /// Path to the program to run
    #[arg(long)]
    pub script: PathBuf,
    /// Interpreter to run the script with (e.g. `node`, `python3`)
    #[arg(long)]
    pub interpreter: Option<String>,
    /// Worker count, or `max` to use all CPUs
    #[arg(long, default_value = "1")]
    pub instances: String,
    /// Public port the app listens on (required for clustering)
    #[arg(long)]
    pub port: Option<u16>,
    /// Extra environment variable, `KEY=VALUE`; repeatable
    #[arg(long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
    /// Working directory for the worker process
    #[arg(long)]
    pub cwd: Option<PathBuf>,
    /// Max restarts inside the restart window before the app is marked errored
    #[arg(long)]
    pub max_restarts: Option<u32>,
    /// Restart-budget window, in milliseconds
    #[arg(long)]
    pub restart_window_ms: Option<u64>,
    /// Minimum uptime before a crash counts against the restart budget
    #[arg(long)]
    pub min_uptime_ms: Option<u64>,
    /// Shutdown signal sent before the kill timeout (`SIGTERM` or `SIGINT`)
    #[arg(long)]
    pub shutdown_signal: Option<String>,
    /// Grace period before a `SIGKILL` follows the shutdown signal
    #[arg(long)]
    pub kill_timeout_ms: Option<u64>,
    /// How long a worker may stay in `starting` before it's killed
    #[arg(long)]
    pub ready_timeout_ms: Option<u64>,
    /// Enable the HTTP health check
    #[arg(long)]
    pub health_check: bool,
    /// Health check path
    #[arg(long, default_value = "/")]
    pub health_path: String,
    /// Enable multi-instance clustering
    #[arg(long)]
    pub cluster: bool,
    /// Clustering strategy: `auto`, `reuse-port`, or `proxy`
    #[arg(long, default_value = "auto")]
    pub cluster_strategy: String,
    /// Never restart a worker after it exits
    #[arg(long)]
    pub no_autorestart: bool,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) => Ok((k.to_string(), v.to_string())),
        None => Err(format!("expected `KEY=VALUE`, got `{raw}`")),
    }
}

pub async fn run(command: Command, format: OutputFormat) -> Result<()> {
    match command {
        Command::Start(args) => start(args, format).await,
        Command::Stop { name } => simple("stop", name, format).await,
        Command::Restart { name } => simple("restart", name, format).await,
        Command::Reload { name } => simple("reload", name, format).await,
        Command::Delete { name } => simple("delete", name, format).await,
        Command::List => list(format).await,
        Command::Status { name } => status(name, format).await,
        Command::Dump => dump(format).await,
        Command::Ping => ping(format).await,
        Command::Shutdown => shutdown(format).await,
        Command::Logs { name } => logs(name).await,
        Command::Metrics { name } => metrics(name).await,
    }
}

fn build_config(args: StartArgs) -> Result<Value> {
    let instances = match args.instances.to_ascii_lowercase().as_str() {
        "max" => json!("max"),
        n => json!(n.parse::<u32>().map_err(|_| anyhow!("--instances must be a number or `max`"))?),
    };

    let mut config = Map::new();
    config.insert("name".into(), json!(args.name));
    config.insert("script".into(), json!(args.script));
    config.insert("interpreter".into(), json!(args.interpreter));
    config.insert("instances".into(), instances);
    config.insert("port".into(), json!(args.port));
    config.insert("env".into(), json!(args.env.into_iter().collect::<std::collections::HashMap<_, _>>()));
    config.insert("cwd".into(), json!(args.cwd));
    config.insert("autorestart".into(), json!(!args.no_autorestart));

    let mut restart = Map::new();
    if let Some(v) = args.max_restarts {
        restart.insert("max_restarts".into(), json!(v));
    }
    if let Some(v) = args.restart_window_ms {
        restart.insert("max_restart_window_ms".into(), json!(v));
    }
    if let Some(v) = args.min_uptime_ms {
        restart.insert("min_uptime_ms".into(), json!(v));
    }
    if !restart.is_empty() {
        config.insert("restart".into(), Value::Object(restart));
    }

    let mut shutdown = Map::new();
    if let Some(signal) = &args.shutdown_signal {
        let normalized = match signal.to_ascii_uppercase().as_str() {
            "SIGTERM" | "TERM" => "SIGTERM",
            "SIGINT" | "INT" => "SIGINT",
            other => bail!("unknown shutdown signal `{other}`, expected SIGTERM or SIGINT"),
        };
        shutdown.insert("signal".into(), json!(normalized));
    }
    if let Some(v) = args.kill_timeout_ms {
        shutdown.insert("kill_timeout_ms".into(), json!(v));
    }
    if !shutdown.is_empty() {
        config.insert("shutdown".into(), Value::Object(shutdown));
    }

    if let Some(v) = args.ready_timeout_ms {
        config.insert("ready_timeout_ms".into(), json!(v));
    }

    if args.health_check {
        config.insert(
            "health_check".into(),
            json!({"enabled": true, "path": args.health_path}),
        );
    }

    if args.cluster {
        let strategy = match args.cluster_strategy.to_ascii_lowercase().as_str() {
            "auto" => "auto",
            "reuse-port" | "reuseport" => "reusePort",
            "proxy" => "proxy",
            other => bail!("unknown cluster strategy `{other}`, expected auto, reuse-port, or proxy"),
        };
        config.insert("clustering".into(), json!({"enabled": true, "strategy": strategy}));
    }

    Ok(Value::Object(config))
}

async fn start(args: StartArgs, format: OutputFormat) -> Result<()> {
    let name = args.name.clone();
    let config = build_config(args)?;
    let mut client = DaemonClient::connect().await?;
    client.call("start", json!({"config": config})).await.map_err(|e| anyhow!("{e}"))?;
    format_or_json(format, &json!({"started": &name}), || println!("Started '{name}'"))
}

async fn simple(cmd: &'static str, name: String, format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    client.call(cmd, json!({"name": &name})).await.map_err(|e| anyhow!("{e}"))?;
    let verb = match cmd {
        "stop" => "stopped",
        "restart" => "restarted",
        "reload" => "reloaded",
        "delete" => "deleted",
        other => other,
    };
    format_or_json(format, &json!({"name": &name, "result": verb}), || println!("{name} {verb}"))
}

async fn list(format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    let data = client.call("list", json!({})).await.map_err(|e| anyhow!("{e}"))?;
    let apps = data.as_array().cloned().unwrap_or_default();
    handle_list(format, &apps, "No apps registered.", |items| {
        for app in items {
            println!("{:<20} {}", app["name"].as_str().unwrap_or("?"), app["overall"].as_str().unwrap_or("?"));
        }
    })
}

async fn status(name: String, format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    let data = client.call("status", json!({"name": &name})).await.map_err(|e| anyhow!("{e}"))?;
    format_or_json(format, &data, || {
        println!("{}: {}", data["name"].as_str().unwrap_or("?"), data["overall"].as_str().unwrap_or("?"));
        for worker in data["workers"].as_array().into_iter().flatten() {
            println!(
                "  worker {} slot {} pid={} state={}",
                worker["id"], worker["slot"], worker["pid"], worker["state"]
            );
        }
    })
}

async fn dump(format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    let data = client.call("dump", json!({})).await.map_err(|e| anyhow!("{e}"))?;
    format_or_json(format, &data, || println!("{}", serde_json::to_string_pretty(&data).unwrap_or_default()))
}

async fn ping(format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    let data = client.call("ping", json!({})).await.map_err(|e| anyhow!("{e}"))?;
    format_or_json(format, &data, || println!("pong"))
}

async fn shutdown(format: OutputFormat) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    client.call("shutdown", json!({})).await.map_err(|e| anyhow!("{e}"))?;
    format_or_json(format, &json!({"result": "shutting down"}), || println!("supervisord is shutting down"))
}

async fn logs(name: String) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    client
        .stream("logs", json!({"name": &name}), |chunk| {
            let stream = chunk["stream"].as_str().unwrap_or("stdout");
            let line = chunk["line"].as_str().unwrap_or_default();
            println!("[{}:{stream}] {line}", chunk["worker"]);
            true
        })
        .await
        .map_err(|e| anyhow!("{e}"))
}

async fn metrics(name: String) -> Result<()> {
    let mut client = DaemonClient::connect().await?;
    client
        .stream("metrics", json!({"name": &name}), |chunk| {
            println!(
                "worker {} rss={} cpu%={:.1}",
                chunk["worker"],
                chunk["memory"]["rss"],
                chunk["cpuPct"].as_f64().unwrap_or(0.0)
            );
            true
        })
        .await
        .map_err(|e| anyhow!("{e}"))
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
