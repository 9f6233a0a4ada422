//! Async driver for the display and rollover ticks.
//!
//! Both ticks are reads against the wall clock. A tick that is missed while
//! the process is suspended is skipped, not replayed: the next one recomputes
//! everything from the stored end timestamp anyway.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::companion::PeerTransport;
use crate::error::Result;
use crate::events::Event;
use crate::service::UrgeService;
use crate::storage::{Config, Store, UsageLog};

/// Tick cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerConfig {
    pub display: Duration,
    pub rollover: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            display: Duration::from_secs(1),
            rollover: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for TickerConfig {
    fn from(config: &Config) -> Self {
        Self {
            display: config.display_interval(),
            rollover: config.rollover_interval(),
        }
    }
}

/// Run both ticks until `shutdown` resolves.
///
/// State is rebuilt with [`UrgeService::resume`] before the first tick.
/// After every tick `on_tick` receives the remaining seconds and the events
/// queued by that tick.
pub async fn run_ticker<S, C, T, F>(
    service: &mut UrgeService<S, C, T>,
    config: TickerConfig,
    shutdown: F,
    mut on_tick: impl FnMut(u64, Vec<Event>),
) -> Result<()>
where
    S: Store + UsageLog,
    C: Clock,
    T: PeerTransport,
    F: Future<Output = ()>,
{
    service.resume()?;
    on_tick(service.tick(), service.drain_events());

    let mut display = interval(config.display);
    display.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rollover = interval(config.rollover);
    rollover.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick of an interval completes immediately; resume covered it.
    display.tick().await;
    rollover.tick().await;

    tokio::pin!(shutdown);
    info!(?config, "ticker started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("ticker stopped");
                break;
            }
            _ = rollover.tick() => {
                if let Err(e) = service.rollover_tick() {
                    warn!(error = %e, "rollover check failed, retrying on next tick");
                }
                on_tick(service.tick(), service.drain_events());
            }
            _ = display.tick() => {
                let remaining = service.tick();
                debug!(remaining, "display tick");
                on_tick(remaining, service.drain_events());
            }
        }
    }

    Ok(())
}
