use std::env;
use std::io;
use std::path::PathBuf;

use edsim::config::{Horizon, SimulationConfig};
use edsim::{report, run_batch};

/// Usage: edsim [settings.json] [results.csv]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .init();

    let mut args = env::args().skip(1);
    let settings = args.next().map(PathBuf::from);
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("results.csv"));

    let config = match &settings {
        Some(path) => SimulationConfig::from_path(path)?,
        None => SimulationConfig::default(),
    };

    println!("Emergency department simulation");
    match &settings {
        Some(path) => println!("Settings: {}", path.display()),
        None => println!("Settings: built-in defaults"),
    }
    println!("Configuration:");
    println!(
        "  runs={}, master seed={}",
        config.general.number_of_runs, config.general.seed
    );
    match config.general.horizon {
        Horizon::Minutes(minutes) => println!(
            "  warm-up: {:.0} min, horizon: {:.0} min",
            config.general.warm_up_minutes, minutes
        ),
        Horizon::Patients(count) => println!(
            "  warm-up: {:.0} min, horizon: {} patients",
            config.general.warm_up_minutes, count
        ),
    }
    println!(
        "  staffing: receptionist={}, nurse={}, doctor={}, waiting room seats={}",
        config.resources.receptionist,
        config.resources.nurse,
        config.resources.doctor,
        config.resources.waiting_room
    );
    println!();

    let batch = run_batch(&config)?;
    report::write_results(&output, &batch)?;

    println!("Wrote {} result rows to {}", batch.runs.len(), output.display());
    println!();
    let stdout = io::stdout();
    report::print_batch_summary(&mut stdout.lock(), &batch)?;

    Ok(())
}
