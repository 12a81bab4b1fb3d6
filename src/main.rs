//! Memo Cache - cooldown driver
//!
//! Reads commands from stdin and answers whether each subject is throttled.
//!
//! # Commands
//! - `cooldown <subject> <secs>` - set a subject's own cooldown, `0` = default
//! - `hit <subject>` - `throttled` if cooling down, else `allowed` and start cooldown
//! - `forget <subject>` - end a cooldown early
//! - `stats` - print registry statistics as JSON

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{CacheConfig, RateLimitRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CacheConfig::try_from_env().context("loading cache configuration")?;
    info!(
        capacity = ?config.capacity,
        rate_limit_ttl = ?config.rate_limit_ttl,
        "Configuration loaded"
    );

    let mut registry: RateLimitRegistry<String> = config.rate_limit_registry();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let reply = match handle_line(&mut registry, &line) {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(err) => {
                warn!(line = %line, "rejected command: {err:#}");
                format!("error: {err}")
            }
        };
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn handle_line(registry: &mut RateLimitRegistry<String>, line: &str) -> Result<Option<String>> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };

    let reply = match (command, parts.next(), parts.next()) {
        ("cooldown", Some(subject), Some(secs)) => {
            let secs: f64 = secs.parse().context("cooldown seconds")?;
            let duration = Duration::try_from_secs_f64(secs).context("cooldown seconds")?;
            registry.set_duration(subject.to_string(), duration);
            // Zero falls back to the default
            match registry.duration_for(&subject.to_string()) {
                Some(effective) => format!("ok {subject} {}s", effective.as_secs_f64()),
                None => format!("ok {subject} no expiry"),
            }
        }
        ("hit", Some(subject), None) => {
            if registry.check_and_record(subject.to_string()) {
                "throttled".to_string()
            } else {
                "allowed".to_string()
            }
        }
        ("forget", Some(subject), None) => {
            registry.forget(&subject.to_string());
            format!("ok {subject}")
        }
        ("stats", None, None) => serde_json::to_string(&registry.stats())?,
        _ => bail!("unrecognized command"),
    };
    Ok(Some(reply))
}
