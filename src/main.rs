//! faucet - Demo Entry Point
//!
//! Runs a round-robin ping-pong pipe: two counting inputs take turns, and two
//! outputs hand each value to one another before it is logged.
//!
//! Usage: `faucet [CONFIG] [RUN_MS]`

use anyhow::Context as _;
use crossbeam_channel::bounded;
use faucet_rs::{Context, Pipe, PipeConfig};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long the demo runs when no duration is given
const DEFAULT_RUN_MS: u64 = 5_500;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,faucet_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);

    let config = match args.next() {
        Some(path) => PipeConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => PipeConfig::with_rate("ping-pong", 60),
    };

    let run_for = match args.next() {
        Some(ms) => Duration::from_millis(ms.parse().context("RUN_MS must be an integer")?),
        None => Duration::from_millis(DEFAULT_RUN_MS),
    };

    tracing::info!("Running pipe '{}' for {:?}", config.name, run_for);

    let pipe: Pipe<i64> = Pipe::from_config(&config);

    let up = AtomicI64::new(0);
    pipe.add_input(move |_| Ok(Some(up.fetch_add(1, Ordering::SeqCst) + 1)));

    let down = AtomicI64::new(0);
    pipe.add_input(move |_| Ok(Some(down.fetch_sub(1, Ordering::SeqCst) - 1)));

    let (ping_tx, pong_rx) = bounded::<()>(0);

    pipe.add_output(move |_, value| {
        tracing::info!("ping: {}", value);
        ping_tx.send(())?;
        Ok(())
    });

    pipe.add_output(move |_, value| {
        pong_rx.recv()?;
        tracing::info!("pong: {}", value);
        Ok(())
    });

    let (ctx, _cancel) = Context::with_timeout(&Context::background(), run_for);
    pipe.start_with_config(&ctx, &config)?;
    pipe.done().wait();

    let stats = pipe.stats();
    tracing::info!(
        "Pipe finished after {} ticks ({} values delivered)",
        stats.ticks,
        stats.values_delivered
    );

    match pipe.err() {
        Some(err) if err.is_context() => Ok(()),
        Some(err) => Err(anyhow::anyhow!("pipe failed: {}", err)),
        None => Ok(()),
    }
}
