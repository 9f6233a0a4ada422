use urge_core::Config;

use super::{open_service, print_json, print_outcome, CliResult};

pub fn take(force: bool) -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;

    let remaining = service.remaining();
    if remaining > 0 && !force {
        print_json(&serde_json::json!({
            "rejected": "countdown_running",
            "remaining_secs": remaining,
        }))?;
        std::process::exit(2);
    }

    service.take_one()?;
    print_outcome(&mut service)
}

pub fn panic() -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;
    service.use_panic()?;
    print_outcome(&mut service)
}

pub fn stop() -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;
    service.stop()?;
    print_outcome(&mut service)
}

pub fn status() -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;
    service.tick();

    match service.snapshot() {
        Some(snapshot) => print_json(&serde_json::json!({
            "configured": true,
            "snapshot": snapshot,
            "companion": {
                "state": service.channel().state(),
                "sequence": service.channel().sequence(),
                "device_id": service.channel().device_id(),
            },
            "events": service.drain_events(),
        })),
        None => print_json(&serde_json::json!({ "configured": false })),
    }
}
