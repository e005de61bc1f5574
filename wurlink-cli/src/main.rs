// wurlink CLI - Wake-up radio link power analysis
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # wurlink
//!
//! Command-line front end for the wurlink engine.
//!
//! ## Usage
//!
//! ```bash
//! # Analyse an always-on WuR run
//! wurlink analyze aowstate_log.txt --capture capture.csv -o alwaysonwur.csv
//!
//! # Duty-cycled BLE with a different sleep phase length
//! wurlink analyze dcbstate_log.txt -s dcb --capture capture.csv --sleep-duration 5
//!
//! # Compare the three tables
//! wurlink compare "Always-On WUR=alwaysonwur.csv" "Duty-Cycled WUR=dutycycledwur.csv"
//!
//! # Print a preset as an editable JSON configuration
//! wurlink config duty-cycled-wur > dcw.json
//! ```

mod capture;
mod error;
mod table;

use clap::{Args as ClapArgs, Parser, Subcommand};
use error::CliError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use wurlink::{
    ComparatorConfig, FillPolicy, PacketLengthIndex, PowerEngine, RunMetrics, Scenario,
    ScenarioComparator, ScenarioConfig, ScenarioReport, ScenarioTotals, SleepSpan,
};

/// Wake-up radio / BLE power analysis
#[derive(Parser, Debug)]
#[command(name = "wurlink", author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconstruct power from an event log and a capture index
    Analyze(AnalyzeArgs),
    /// Compare the cumulative energy of several power tables
    Compare(CompareArgs),
    /// Print the preset configuration of a scenario as JSON
    Config {
        /// Scenario name (always-on-wur, duty-cycled-wur, duty-cycled-ble)
        scenario: Scenario,
    },
}

#[derive(ClapArgs, Debug)]
struct AnalyzeArgs {
    /// Event log (`Time <n>s: <description>` lines)
    log: PathBuf,

    /// Capture index as CSV with frame number and length columns
    #[arg(short, long)]
    capture: Option<PathBuf>,

    /// Scenario preset
    #[arg(short, long, default_value = "always-on-wur")]
    scenario: Scenario,

    /// JSON scenario configuration, replacing the preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the merged power table to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the power of matched events to this CSV file
    #[arg(long)]
    per_packet: Option<PathBuf>,

    /// Gap fill policy of the table (carry-forward, zero)
    #[arg(long)]
    fill: Option<FillPolicy>,

    /// Operating voltage in volts
    #[arg(long)]
    voltage: Option<f64>,

    /// BLE channels per exchange
    #[arg(long)]
    channels: Option<u32>,

    /// Communication window in seconds
    #[arg(long)]
    window: Option<f64>,

    /// Frame length tolerance in bytes
    #[arg(long)]
    tolerance: Option<u32>,

    /// Seconds per sleep phase (duty-cycled BLE)
    #[arg(long)]
    sleep_duration: Option<f64>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Print every BLE and WuR sample
    #[arg(long)]
    dump: bool,
}

#[derive(ClapArgs, Debug)]
struct CompareArgs {
    /// Power tables, as `NAME=PATH` or `PATH` (named after the file)
    #[arg(required = true, num_args = 1..)]
    tables: Vec<String>,

    /// Supply voltage in volts
    #[arg(long, default_value_t = wurlink::comparator::DEFAULT_COMPARISON_VOLTAGE)]
    voltage: f64,

    /// Divisor bringing the power column to base units
    #[arg(long, default_value_t = wurlink::comparator::DEFAULT_UNIT_SCALE)]
    unit_scale: f64,

    /// Write the cumulative curves to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// JSON form of an analysis.
#[derive(Serialize)]
struct AnalysisSummary<'a> {
    scenario: Scenario,
    elapsed: f64,
    totals: &'a ScenarioTotals,
    sleep_spans: &'a [SleepSpan],
    metrics: &'a RunMetrics,
}

impl<'a> From<&'a ScenarioReport> for AnalysisSummary<'a> {
    fn from(report: &'a ScenarioReport) -> Self {
        Self {
            scenario: report.scenario,
            elapsed: report.elapsed,
            totals: &report.totals,
            sleep_spans: &report.sleep_spans,
            metrics: &report.metrics,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("wurlink v{}", env!("CARGO_PKG_VERSION"));

    let result = match args.command {
        Command::Analyze(analyze_args) => analyze(&analyze_args),
        Command::Compare(compare_args) => compare(&compare_args),
        Command::Config { scenario } => print_config(scenario),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<ScenarioConfig, CliError> {
    let file = std::fs::File::open(path)?;
    let config = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(config)
}

/// Preset or file configuration with command-line overrides applied.
fn resolve_config(args: &AnalyzeArgs) -> Result<ScenarioConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            if config.scenario != args.scenario {
                info!("Using scenario '{}' from {}", config.scenario, path.display());
            }
            config
        }
        None => args.scenario.config(),
    };

    if let Some(voltage) = args.voltage {
        config.budget.operating_voltage = voltage;
    }
    if let Some(channels) = args.channels {
        config.budget.channel_count = channels;
    }
    if let Some(window) = args.window {
        config.budget.comm_window = window;
    }
    if let Some(tolerance) = args.tolerance {
        config.length_tolerance = tolerance;
    }
    if let Some(seconds) = args.sleep_duration {
        if config.sleep_duration().is_none() {
            warn!("--sleep-duration has no effect on {}", config.scenario);
        }
        config.set_sleep_duration(seconds);
    }
    if let Some(fill) = args.fill {
        config.fill_policy = fill;
    }
    Ok(config)
}

fn analyze(args: &AnalyzeArgs) -> Result<(), CliError> {
    let config = resolve_config(args)?;
    let fill = config.fill_policy;
    let engine = PowerEngine::new(config)?;

    let index = match &args.capture {
        Some(path) => capture::load_capture(path)?,
        None => {
            warn!("No capture index given; every event will be counted at idle power");
            PacketLengthIndex::new()
        }
    };

    let report = engine.run_path(&args.log, &index)?;

    if let Some(path) = &args.output {
        table::save_timeline(path, &report.timeline(fill))?;
        info!("Power consumption data saved to {}", path.display());
    }
    if let Some(path) = &args.per_packet {
        table::save_per_packet(path, &report.per_packet_power)?;
        info!("Per-packet power saved to {}", path.display());
    }

    if args.dump {
        print_samples(&report);
    }

    if args.json {
        let summary = AnalysisSummary::from(&report);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", report.summary());
        print!("{}", report.metrics.report());
    }
    Ok(())
}

fn print_samples(report: &ScenarioReport) {
    println!("\nBLE Power Times (in mA):");
    for sample in report.ble_power.iter() {
        println!("Time {}s: {:.6} mA", sample.timestamp, sample.power);
    }
    if let Some(wur) = &report.wur_power {
        println!("\nWuR Power Times (in µA):");
        for sample in wur.iter() {
            println!("Time {}s: {:.2} µA", sample.timestamp, sample.power);
        }
    }
    println!("\nPower Per Packet (in mA):");
    for sample in report.per_packet_power.iter() {
        println!("Packet Time {}s: {:.6} mA", sample.timestamp, sample.power);
    }
    println!();
}

/// Split `NAME=PATH`; a bare path is named after its file stem.
fn parse_table_arg(arg: &str) -> (String, PathBuf) {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() => (name.to_string(), PathBuf::from(path)),
        _ => {
            let path = PathBuf::from(arg);
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| arg.to_string());
            (name, path)
        }
    }
}

fn compare(args: &CompareArgs) -> Result<(), CliError> {
    let config = ComparatorConfig {
        voltage: args.voltage,
        unit_scale: args.unit_scale,
    };
    if !(config.unit_scale.is_finite() && config.unit_scale > 0.0) {
        return Err(CliError::InvalidFormat(format!(
            "unit scale must be positive, got {}",
            config.unit_scale
        )));
    }

    let mut comparator = ScenarioComparator::with_config(config);
    for arg in &args.tables {
        let (name, path) = parse_table_arg(arg);
        let series = table::load_series(&name, &path)?;
        info!("Loaded '{}': {} samples", name, series.len());
        comparator.add_series(series);
    }

    let comparison = comparator.compare();
    if let Some(path) = &args.output {
        table::save_comparison(path, &comparison)?;
        info!("Cumulative energy saved to {}", path.display());
    }
    print!("{}", comparison.report());
    Ok(())
}

fn print_config(scenario: Scenario) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(&scenario.config())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["wurlink", "analyze"];
        full.extend_from_slice(argv);
        match Args::parse_from(full).command {
            Command::Analyze(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_table_arg() {
        assert_eq!(
            parse_table_arg("Always-On WUR=out/aow.csv"),
            ("Always-On WUR".to_string(), PathBuf::from("out/aow.csv"))
        );
        assert_eq!(
            parse_table_arg("out/dutycycledble.csv"),
            ("dutycycledble".to_string(), PathBuf::from("out/dutycycledble.csv"))
        );
    }

    #[test]
    fn test_overrides() {
        let args = analyze_args(&[
            "log.txt",
            "-s",
            "dcb",
            "--voltage",
            "3.3",
            "--sleep-duration",
            "5",
            "--fill",
            "carry-forward",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.scenario, Scenario::DutyCycledBle);
        assert_eq!(config.budget.operating_voltage, 3.3);
        assert_eq!(config.sleep_duration(), Some(5.0));
        assert_eq!(config.fill_policy, FillPolicy::CarryForward);
    }

    #[test]
    fn test_config_file_replaces_preset() {
        let mut preset = ScenarioConfig::duty_cycled_wur();
        preset.length_tolerance = 4;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&preset).unwrap()).unwrap();
        file.flush().unwrap();

        let path = file.path().to_string_lossy().to_string();
        let args = analyze_args(&["log.txt", "--config", path.as_str()]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.scenario, Scenario::DutyCycledWur);
        assert_eq!(config.length_tolerance, 4);
    }

    #[test]
    fn test_analyze_end_to_end() {
        let mut log = NamedTempFile::new().unwrap();
        writeln!(log, "Time 0s: Wake-up radio is checking for a signal").unwrap();
        writeln!(log, "Time 5s: Wake-up signal detected").unwrap();
        writeln!(log, "Time 6s: BLE device is now awake and communicating").unwrap();
        writeln!(log, "Time 7s: BLE device is transmitting advertising indication").unwrap();
        log.flush().unwrap();

        let mut capture = NamedTempFile::new().unwrap();
        writeln!(capture, "No.,Length").unwrap();
        writeln!(capture, "1,19").unwrap();
        capture.flush().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("alwaysonwur.csv");

        let log_path = log.path().to_string_lossy().to_string();
        let capture_path = capture.path().to_string_lossy().to_string();
        let output_path = output.to_string_lossy().to_string();
        let args = analyze_args(&[
            log_path.as_str(),
            "-c",
            capture_path.as_str(),
            "-o",
            output_path.as_str(),
            "--json",
        ]);
        analyze(&args).unwrap();

        let series = table::load_series("aow", &output).unwrap();
        assert_eq!(series.times, vec![0.0, 5.0, 6.0, 7.0]);
        assert!(series.powers[3] > series.powers[0]);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = analyze_args(&["log.txt", "--window", "0"]);
        let config = resolve_config(&args).unwrap();
        assert!(matches!(
            PowerEngine::new(config),
            Err(wurlink::WurlinkError::InvalidConfig(_))
        ));
    }
}
