use urge_core::Config;

use super::{open_service, print_json, CliResult};

pub fn run() -> CliResult {
    let config = Config::load_or_default();
    let service = open_service(&config)?;
    let stats = service.stats()?;
    print_json(&stats)
}
