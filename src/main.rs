use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use plastiscan::bus::{RegisterBus, SimulatedBus};
use plastiscan::config::AppConfig;
use plastiscan::data::loader::load_references;
use plastiscan::data::model::{RawSample, ReferenceTable, CHANNELS};
use plastiscan::operator::{ConsoleOperator, OperatorInput};
use plastiscan::sink::{ConsoleSink, HttpSink, LabelledCsvSink};
use plastiscan::timing::StdDelay;
use plastiscan::{AcquisitionLoop, CancelToken, Pipeline, PlastiscanError};

const DEFAULT_SIM_SPECTRUM: &str = "1200,1500,1100,1300,1400,1250";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogData {
    /// Ask the operator at startup
    Ask,
    Yes,
    No,
}

#[derive(Parser)]
#[command(name = "plastiscan", version)]
#[command(about = "Identify microplastics from a 6-channel NIR sensor", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "PLASTISCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Reference spectra (.json / .csv) replacing the built-in table
    #[arg(short, long)]
    references: Option<PathBuf>,

    /// Post every result to this URL
    #[arg(long, env = "PLASTISCAN_SERVER_URL")]
    server_url: Option<String>,

    /// Labelled data log
    #[arg(long)]
    csv_path: Option<PathBuf>,

    /// Operator-labelled CSV logging
    #[arg(long, value_enum, default_value_t = LogData::Ask)]
    log_data: LogData,

    /// Stop after this many cycles
    #[arg(short = 'n', long)]
    cycles: Option<u64>,

    /// Use an in-memory sensor returning this raw spectrum
    #[arg(
        long,
        value_name = "C0,...,C5",
        num_args = 0..=1,
        default_missing_value = DEFAULT_SIM_SPECTRUM,
        value_parser = parse_spectrum
    )]
    simulate: Option<RawSample>,

    /// I2C device (overrides the config file)
    #[arg(long)]
    bus: Option<PathBuf>,
}

fn parse_spectrum(s: &str) -> Result<RawSample, String> {
    let values = s
        .split(',')
        .map(|tok| tok.trim().parse::<u16>().map_err(|e| format!("'{tok}': {e}")))
        .collect::<Result<Vec<u16>, String>>()?;
    let n = values.len();
    <[u16; CHANNELS]>::try_from(values)
        .map(RawSample::new)
        .map_err(|_| format!("expected {CHANNELS} channels, got {n}"))
}

fn open_bus(cli: &Cli, config: &AppConfig) -> Result<Box<dyn RegisterBus>> {
    if let Some(spectrum) = &cli.simulate {
        log::info!("Simulated sensor returning {spectrum}");
        return Ok(Box::new(SimulatedBus::with_spectrum(
            config.sensor.registers.data_start,
            spectrum,
        )));
    }
    open_hardware_bus(config)
}

#[cfg(feature = "linux")]
fn open_hardware_bus(config: &AppConfig) -> Result<Box<dyn RegisterBus>> {
    use plastiscan::bus::I2cRegisterBus;

    let path = &config.sensor.bus_path;
    let i2c = linux_embedded_hal::I2cdev::new(path)
        .with_context(|| format!("opening {}", path.display()))?;
    log::info!("Using {} at {:#04x}", path.display(), config.sensor.address);
    Ok(Box::new(I2cRegisterBus::new(i2c, config.sensor.address)))
}

#[cfg(not(feature = "linux"))]
fn open_hardware_bus(_config: &AppConfig) -> Result<Box<dyn RegisterBus>> {
    anyhow::bail!("built without the `linux` feature; run with --simulate or rebuild with --features linux")
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let conditioner = config.conditioning.conditioner()?;
    let table = match &config.references.path {
        Some(path) => load_references(path, config.references.precondition.then_some(&conditioner))?,
        None => ReferenceTable::builtin(&conditioner)?,
    };
    Ok(Pipeline::new(conditioner, table, config.matching.metric))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.references {
        config.references.path = Some(path.clone());
    }
    if let Some(url) = &cli.server_url {
        config.sinks.server_url = Some(url.clone());
    }
    if let Some(path) = &cli.csv_path {
        config.sinks.csv_path = path.clone();
    }
    if let Some(path) = &cli.bus {
        config.sensor.bus_path = path.clone();
    }

    // Config errors are fatal here, before the sensor is touched.
    let pipeline = build_pipeline(&config).context("loading reference table")?;
    let bus = open_bus(&cli, &config)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("Stopping after the current step");
        handler_token.cancel();
    })
    .context("installing Ctrl-C handler")?;

    let mut acquisition =
        AcquisitionLoop::new(bus, StdDelay, config.sensor.clone(), &config.acquisition, pipeline)
            .with_sink(Box::new(ConsoleSink::stdout()));

    // The sensor is brought up before the operator is asked anything.
    match acquisition.setup(&cancel) {
        Err(PlastiscanError::Cancelled) => {
            log::info!("Cancelled during sensor setup");
            return Ok(());
        }
        other => other.context("sensor setup")?,
    }

    if let Some(url) = &config.sinks.server_url {
        log::info!("Posting results to {url}");
        acquisition.add_sink(Box::new(HttpSink::new(
            url.clone(),
            Duration::from_millis(config.sinks.http_timeout_ms),
        )));
    }

    let mut operator = ConsoleOperator::stdio(cancel.clone());
    let log_data = match cli.log_data {
        LogData::Yes => true,
        LogData::No => false,
        LogData::Ask => operator.confirm("Enable data logging?"),
    };
    if log_data {
        log::info!("Logging labelled data to {}", config.sinks.csv_path.display());
        acquisition.add_sink(Box::new(LabelledCsvSink::new(
            config.sinks.csv_path.clone(),
            operator,
        )));
    }

    let stats = acquisition.run(&cancel, cli.cycles)?;
    log::info!(
        "{} cycles: {} classified, {} unknown, {} bus errors, {} sink errors",
        stats.cycles,
        stats.classified,
        stats.unknown,
        stats.bus_errors,
        stats.sink_errors
    );
    Ok(())
}
