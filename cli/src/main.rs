use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use serde_json::json;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::time::Duration;
use yocto_api::hub::SimulatedHub;
use yocto_api::yocto_types::{Excitation, FunctionClass};
use yocto_api::{ApiSettings, Function, Sensor, WeighScale, YoctoApi};

use crate::cli::Cli;

mod cli;
mod settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SIMULATED_SERIAL: &str = "YWBRIDG1-SIMUL";

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    CombinedLogger::init(vec![TermLogger::new(
        args.log_level.into(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;

    let Some(target) = args.target.clone() else {
        usage();
        std::process::exit(1);
    };

    info!("Starting weighscale-demo v{}", VERSION);
    let settings = load_settings(&args)?;
    let mut api = YoctoApi::new(settings.clone());

    let simulation = match args.simulate {
        true => Some(simulated_bridge()?),
        false => None,
    };
    if let Err(e) = register_hubs(&mut api, &args, &settings, simulation.as_ref()) {
        eprintln!("RegisterHub error: {}", e);
        std::process::exit(1);
    }

    let target = if target == "any" {
        let first = WeighScale::first_weigh_scale(&mut api).ok().flatten();
        let serial = first.and_then(|scale| scale.get_serial_number(&mut api).ok());
        match serial {
            Some(serial) => serial,
            None => {
                println!("No module connected (check USB cable)");
                std::process::exit(1);
            }
        }
    } else {
        target
    };

    let scale = WeighScale::find_weigh_scale(&mut api, &format!("{}.weighScale1", target));
    debug!("Using {}", scale.describe(&mut api));

    if scale.is_online(&mut api) {
        println!("Resetting tare weight...");
        let unit = reset_tare(&mut api, scale, Duration::from_secs(3));

        let mut tick = 0_u32;
        while scale.is_online(&mut api) {
            let Ok(weight) = scale.get_current_value(&mut api) else {
                break;
            };
            println!("Weight : {}{}  (press Ctrl-C to exit)", weight, unit);
            api.sleep(Duration::from_secs(1));

            if let Some(hub) = &simulation {
                tick += 1;
                drift_load(hub, tick);
            }
        }
    }

    println!("Module not connected (check identification and USB cable)");
    api.free_api();
    Ok(())
}

fn usage() {
    println!("Usage");
    println!("weighscale-demo <serial_number>");
    println!("weighscale-demo <logical_name>");
    println!("weighscale-demo any");
    println!("Example:");
    println!("weighscale-demo any");
}

// Switches the bridge to AC excitation, lets it settle, then tares it and returns the unit.
// A module lost along the way is only logged, the read loop notices it is gone.
fn reset_tare(api: &mut YoctoApi, scale: WeighScale, settle: Duration) -> String {
    if let Err(e) = scale.set_excitation(api, Excitation::Ac) {
        warn!("Unable to set the excitation: {}", e);
    }
    api.sleep(settle);
    if let Err(e) = scale.tare(api) {
        warn!("Unable to reset the tare: {}", e);
    }
    scale.get_unit(api).unwrap_or_else(|e| {
        warn!("Unable to read the unit: {}", e);
        String::new()
    })
}

fn load_settings(args: &Cli) -> Result<ApiSettings> {
    let existing = args.config.exists();
    let settings = settings::read(&args.config)?;
    if !existing {
        if let Err(e) = settings::write(&settings, &args.config) {
            warn!(
                "Couldn't save settings to {}: {}",
                args.config.to_string_lossy(),
                e
            );
        }
    }
    Ok(settings)
}

fn register_hubs(
    api: &mut YoctoApi,
    args: &Cli,
    settings: &ApiSettings,
    simulation: Option<&SimulatedHub>,
) -> yocto_api::Result<()> {
    if let Some(hub) = simulation {
        return api.register_hub_instance(Box::new(hub.clone()));
    }

    let hubs = match &args.hub {
        Some(hub) => vec![hub.clone()],
        None => settings.hubs.clone(),
    };
    for hub in hubs {
        api.register_hub(&hub)?;
    }
    Ok(())
}

// A bridge with a 1kg load cell, reading a little over 250g.
fn simulated_bridge() -> Result<SimulatedHub> {
    let hub = SimulatedHub::new("simulated");
    hub.add_module(SIMULATED_SERIAL, "Yocto-Bridge", 0x4d);
    hub.add_function(
        SIMULATED_SERIAL,
        FunctionClass::WeighScale,
        "weighScale1",
        json!({
            "advertisedValue": "250.3",
            "unit": "g",
            "currentValue": fixed(250.3),
            "currentRawValue": fixed(250.3),
            "lowestValue": fixed(250.3),
            "highestValue": fixed(250.3),
            "resolution": fixed(0.1),
            "logFrequency": "1/s",
            "reportFrequency": "OFF",
            "excitation": Excitation::Off as i32,
            "adaptRatio": 0,
            "compTemperature": fixed(21.5),
            "compensation": 0,
            "zeroTracking": 0,
            "command": ""
        }),
    )
    .context("Could not build the simulated bridge")?;
    Ok(hub)
}

fn drift_load(hub: &SimulatedHub, tick: u32) {
    let weight = 250.0 + (f64::from(tick) / 5.0).sin() * 2.5;
    if let Err(e) = hub.update_attribute(
        SIMULATED_SERIAL,
        "weighScale1",
        "currentValue",
        json!(fixed(weight)),
    ) {
        warn!("Unable to update the simulated load: {}", e);
    }
}

fn fixed(value: f64) -> i64 {
    (value * 65536.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulated_api() -> (YoctoApi, SimulatedHub, WeighScale) {
        let hub = simulated_bridge().unwrap();
        let mut api = YoctoApi::default();
        api.register_hub_instance(Box::new(hub.clone())).unwrap();
        let identifier = format!("{}.weighScale1", SIMULATED_SERIAL);
        let scale = WeighScale::find_weigh_scale(&mut api, &identifier);
        (api, hub, scale)
    }

    #[test]
    fn tare_reset_configures_the_bridge() {
        let (mut api, hub, scale) = simulated_api();
        assert_eq!(reset_tare(&mut api, scale, Duration::ZERO), "g");

        let writes: Vec<(String, String)> = hub
            .writes()
            .into_iter()
            .map(|w| (w.attribute, w.value))
            .collect();
        assert_eq!(
            writes,
            vec![
                (String::from("excitation"), String::from("2")),
                (String::from("command"), String::from("T")),
            ]
        );
    }

    #[test]
    fn tare_reset_survives_a_lost_module() {
        let (mut api, hub, scale) = simulated_api();
        hub.set_reachable(false);
        assert_eq!(reset_tare(&mut api, scale, Duration::ZERO), "");
        assert!(!scale.is_online(&mut api));
    }

    #[test]
    fn drifting_load_stays_near_250g() {
        let (mut api, hub, scale) = simulated_api();
        drift_load(&hub, 8);
        api.update_device_list().unwrap();
        let weight = scale.get_current_value(&mut api).unwrap();
        assert!((247.5..=252.5).contains(&weight));
    }
}
