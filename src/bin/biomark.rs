//! Biomark CLI - Command-line interface for beatmark
//!
//! Commands:
//! - compute: Compute configured biomarkers for a set of recordings
//! - plan: Validate a run configuration and show what it will compute
//! - list: List registered biomarkers
//! - units: List supported units per category
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use beatmark::engine::PlanEntry;
use beatmark::units::UnitTable;
use beatmark::{
    BiomarkerEngine, BiomarkerRegistry, ConfigError, RecordingSet, ReportEncoder, RunConfig,
    TableFormat, UnitCategory, PRODUCER_NAME, VERSION,
};

/// Biomark - Beat segmentation and biomarker extraction for cardiac cell recordings
#[derive(Parser)]
#[command(name = "biomark")]
#[command(version = VERSION)]
#[command(about = "Compute cardiac biomarkers from recorded traces", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute biomarkers for every unit in a recording file
    Compute {
        /// Run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Recordings file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: OutputFormat,

        /// Omit the id column from delimited output
        #[arg(long)]
        no_ids: bool,
    },

    /// Validate a run configuration and print the resolved plan
    Plan {
        /// Run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered biomarkers
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported units
    Units {
        /// Only show units of this category (e.g. time, potential)
        #[arg(long)]
        category: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a run configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated table
    Csv,
    /// Tab-separated table
    Tsv,
    /// JSON report
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BiomarkCliError> {
    match cli.command {
        Commands::Compute {
            config,
            input,
            output,
            format,
            no_ids,
        } => cmd_compute(&config, &input, &output, format, no_ids),

        Commands::Plan { config, json } => cmd_plan(&config, json),

        Commands::List { json } => cmd_list(json),

        Commands::Units { category, json } => cmd_units(category.as_deref(), json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_compute(
    config: &Path,
    input: &Path,
    output: &Path,
    format: OutputFormat,
    no_ids: bool,
) -> Result<(), BiomarkCliError> {
    let engine = load_engine(config)?;
    let recordings = RecordingSet::from_json(&read_input(input)?)?;

    if recordings.units.is_empty() {
        return Err(BiomarkCliError::NoUnits);
    }

    let table = engine.process_recordings(recordings)?;

    let output_data = match format {
        OutputFormat::Csv | OutputFormat::Tsv => {
            let table_format = TableFormat {
                delimiter: if matches!(format, OutputFormat::Tsv) { "\t" } else { "," }.to_string(),
                include_ids: !no_ids,
                ..TableFormat::default()
            };
            table.to_delimited(&table_format)
        }
        OutputFormat::Json => ReportEncoder::new().encode_to_json(&table)? + "\n",
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_plan(config: &Path, json: bool) -> Result<(), BiomarkCliError> {
    let engine = load_engine(config)?;
    let plan = engine.describe();

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Run Plan");
    println!("========");
    for entry in &plan {
        println!(
            "  {:<16} {:<8} needs [{}]{}",
            entry.name,
            entry.unit,
            channel_list(&entry.required_channels),
            optional_suffix(entry)
        );
    }
    println!();
    println!(
        "Required channels: {}",
        engine
            .required_channels()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(())
}

fn channel_list(channels: &[beatmark::Channel]) -> String {
    channels.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
}

fn optional_suffix(entry: &PlanEntry) -> String {
    if entry.optional_channels.is_empty() {
        String::new()
    } else {
        format!(" optional [{}]", channel_list(&entry.optional_channels))
    }
}

#[derive(Serialize)]
struct BiomarkerListing {
    name: String,
    category: UnitCategory,
    required_channels: Vec<beatmark::Channel>,
}

fn cmd_list(json: bool) -> Result<(), BiomarkCliError> {
    let registry = BiomarkerRegistry::standard();
    let listing: Vec<BiomarkerListing> = registry
        .iter()
        .map(|b| BiomarkerListing {
            name: b.name().to_string(),
            category: b.unit_category(),
            required_channels: b.required_channels().iter().collect(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for item in &listing {
            println!(
                "{:<16} {:<16} [{}]",
                item.name,
                item.category.as_str(),
                channel_list(&item.required_channels)
            );
        }
    }

    Ok(())
}

fn cmd_units(category: Option<&str>, json: bool) -> Result<(), BiomarkCliError> {
    let table = UnitTable::standard();

    let categories: Vec<UnitCategory> = match category {
        Some(name) => {
            let found = UnitCategory::ALL
                .iter()
                .copied()
                .find(|c| c.as_str() == name)
                .ok_or_else(|| BiomarkCliError::UnknownCategory(name.to_string()))?;
            vec![found]
        }
        None => UnitCategory::ALL.to_vec(),
    };

    if json {
        let units: Vec<_> = categories
            .iter()
            .flat_map(|c| table.units_of(*c))
            .collect();
        println!("{}", serde_json::to_string_pretty(&units)?);
        return Ok(());
    }

    for c in categories {
        let names: Vec<String> = table
            .units_of(c)
            .map(|u| {
                if u.canonical {
                    format!("{}*", u.name)
                } else {
                    u.name.clone()
                }
            })
            .collect();
        println!("{:<16} {}", c.as_str(), names.join(" "));
    }
    println!();
    println!("* canonical unit; '{}' resolves to it", beatmark::units::DEFAULT_UNIT);

    Ok(())
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), BiomarkCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("beatmark version {}", VERSION),
    });

    let registry = BiomarkerRegistry::standard();
    checks.push(DoctorCheck {
        name: "registry".to_string(),
        status: if registry.is_empty() { CheckStatus::Error } else { CheckStatus::Ok },
        message: format!("{} biomarkers registered", registry.len()),
    });

    if let Some(config_path) = config {
        let check = if !config_path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Configuration file does not exist".to_string(),
            }
        } else {
            match load_engine(config_path) {
                Ok(engine) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Configuration valid ({} biomarkers, channels: {})",
                        engine.plan().len(),
                        engine
                            .required_channels()
                            .iter()
                            .map(|c| c.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: CliError::from(e).message,
                },
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass recordings with --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Biomark Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error)) {
        Err(BiomarkCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(path: &Path) -> Result<String, BiomarkCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_engine(path: &Path) -> Result<BiomarkerEngine, BiomarkCliError> {
    let config = RunConfig::from_json(&fs::read_to_string(path)?)?;
    Ok(BiomarkerEngine::new(&config)?)
}

// Error handling

#[derive(Debug)]
enum BiomarkCliError {
    Io(io::Error),
    Config(ConfigError),
    Json(serde_json::Error),
    NoUnits,
    UnknownCategory(String),
    DoctorFailed,
}

impl From<io::Error> for BiomarkCliError {
    fn from(e: io::Error) -> Self {
        BiomarkCliError::Io(e)
    }
}

impl From<ConfigError> for BiomarkCliError {
    fn from(e: ConfigError) -> Self {
        BiomarkCliError::Config(e)
    }
}

impl From<serde_json::Error> for BiomarkCliError {
    fn from(e: serde_json::Error) -> Self {
        BiomarkCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BiomarkCliError> for CliError {
    fn from(e: BiomarkCliError) -> Self {
        match e {
            BiomarkCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BiomarkCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'biomark list' and 'biomark units' for valid names".to_string()),
            },
            BiomarkCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BiomarkCliError::NoUnits => CliError {
                code: "NO_UNITS".to_string(),
                message: "No units found in recordings".to_string(),
                hint: Some("Ensure the recordings file has a non-empty \"units\" array".to_string()),
            },
            BiomarkCliError::UnknownCategory(name) => CliError {
                code: "UNKNOWN_CATEGORY".to_string(),
                message: format!("Unknown unit category: {}", name),
                hint: Some("Run 'biomark units' to see all categories".to_string()),
            },
            BiomarkCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}
