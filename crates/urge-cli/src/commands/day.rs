use urge_core::Config;

use super::{open_service, print_outcome, CliResult};

pub fn reset_day() -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;
    service.reset_day()?;
    print_outcome(&mut service)
}

pub fn apply_override(daily: u32, panic: u32) -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;
    service.apply_manual_override(daily, panic)?;
    print_outcome(&mut service)
}
