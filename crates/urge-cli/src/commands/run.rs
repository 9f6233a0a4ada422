use urge_core::{run_ticker, Config, TickerConfig};

use super::{open_service, CliResult};

/// Foreground ticker. Prints one JSON line per tick that produced events,
/// plus one whenever the remaining whole minutes change.
pub fn run() -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut last_minutes = None;
    runtime.block_on(async {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler failed; stopping");
            }
        };
        run_ticker(
            &mut service,
            TickerConfig::from(&config),
            shutdown,
            |remaining, events| {
                let minutes = remaining.div_ceil(60);
                if events.is_empty() && last_minutes == Some(minutes) {
                    return;
                }
                last_minutes = Some(minutes);
                println!(
                    "{}",
                    serde_json::json!({ "remaining_secs": remaining, "events": events })
                );
            },
        )
        .await
    })?;

    Ok(())
}
