use clap::Args;
use urge_core::storage::hours_to_secs;
use urge_core::{AllowanceConfig, Config, CoreError, SubstanceProfile};

use super::{open_service, print_json, print_outcome, CliResult};

#[derive(Args)]
pub struct OnboardArgs {
    /// snus or cigarette (defaults.substance when omitted)
    #[arg(long)]
    substance: Option<SubstanceProfile>,
    /// Uses per day (defaults.daily_limit when omitted)
    #[arg(long)]
    daily_limit: Option<u32>,
    /// Minimum wait between uses, in hours; at least 1
    #[arg(long)]
    interval_hours: Option<f64>,
    /// Panic uses per week; at least 1
    #[arg(long)]
    panic_limit: Option<u32>,
}

#[derive(Args)]
pub struct SettingsArgs {
    #[arg(long)]
    daily_limit: Option<u32>,
    #[arg(long)]
    interval_hours: Option<f64>,
    #[arg(long)]
    panic_limit: Option<u32>,
}

pub fn onboard(args: OnboardArgs) -> CliResult {
    let config = Config::load_or_default();
    let defaults = &config.defaults;
    let mut service = open_service(&config)?;

    let substance = args.substance.unwrap_or(defaults.substance);
    let allowance = AllowanceConfig::new(
        args.daily_limit.unwrap_or(defaults.daily_limit),
        hours_to_secs(args.interval_hours.unwrap_or(defaults.interval_hours)),
        args.panic_limit.unwrap_or(defaults.weekly_panic_limit),
    );
    service.complete_onboarding(substance, allowance)?;
    print_outcome(&mut service)
}

pub fn settings(args: SettingsArgs) -> CliResult {
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;

    let current = *service.ledger().ok_or(CoreError::NotConfigured)?.config();
    let updated = AllowanceConfig::new(
        args.daily_limit.unwrap_or(current.daily_limit()),
        args.interval_hours
            .map(hours_to_secs)
            .unwrap_or(current.interval_secs()),
        args.panic_limit.unwrap_or(current.weekly_panic_limit()),
    );
    service.update_settings(updated)?;
    print_outcome(&mut service)
}

pub fn change_substance(yes: bool) -> CliResult {
    if !yes {
        return Err("this wipes all allowances and statistics; pass --yes to confirm".into());
    }
    let config = Config::load_or_default();
    let mut service = open_service(&config)?;
    service.change_substance()?;
    print_json(&serde_json::json!({
        "events": service.drain_events(),
        "next": "run `urge-cli onboard` to choose a substance",
    }))
}
