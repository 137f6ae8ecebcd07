use std::fs::File;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geodata_cache::app::{
    App, FetchOptions, FetchResult, FrameSummary, LookupResult, ProgressEvent, ProgressSink,
};
use geodata_cache::client::{DatasetClient, HttpDatasetClient};
use geodata_cache::config::{ConfigLoader, ResolvedConfig};
use geodata_cache::domain::{DatasetRequest, StateAbbrev, Year};
use geodata_cache::error::GeodataError;
use geodata_cache::output::JsonOutput;
use geodata_cache::store::Store;

#[derive(Parser)]
#[command(name = "geodata")]
#[command(about = "Download, cache and load public geospatial datasets")]
#[command(version, author)]
struct Cli {
    /// Project root holding data_raw/, data_clean/ and output/.
    #[arg(long, global = true)]
    root: Option<Utf8PathBuf>,

    /// Print machine-readable JSON instead of a summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch a dataset, or every dataset listed in a config file")]
    Fetch(FetchArgs),
    #[command(about = "List catalog datasets and their cache state")]
    List,
    #[command(about = "Create the project directory layout")]
    Setup,
    #[command(about = "Manage FIPS crosswalk tables")]
    Crosswalk(CrosswalkArgs),
    #[command(about = "Look up the FIPS code of a state abbreviation")]
    StateFips(StateFipsArgs),
    #[command(about = "Look up the FIPS code of a county by name")]
    CountyFips(CountyFipsArgs),
    #[command(about = "Fetch and stack census tracts for several states")]
    Tracts(TractsArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Dataset specifier, e.g. tiger-counties:2021 or tiger-roads:2021:CA:037.
    specifier: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    force: bool,

    /// Parse the dataset after fetching and report its shape.
    #[arg(long)]
    load: bool,
}

#[derive(Args)]
struct CrosswalkArgs {
    #[command(subcommand)]
    command: CrosswalkCommand,
}

#[derive(Subcommand)]
enum CrosswalkCommand {
    #[command(about = "Derive and persist state and county crosswalks")]
    Build(YearArg),
}

#[derive(Args)]
struct YearArg {
    #[arg(long)]
    year: Option<Year>,
}

#[derive(Args)]
struct StateFipsArgs {
    abbrev: String,
}

#[derive(Args)]
struct CountyFipsArgs {
    state: String,
    name: String,

    #[arg(long)]
    year: Option<Year>,
}

#[derive(Args)]
struct TractsArgs {
    year: Year,

    #[arg(required = true)]
    states: Vec<StateAbbrev>,

    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GeodataError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GeodataError) -> u8 {
    match error {
        GeodataError::UnknownDataset(_)
        | GeodataError::UnknownState(_)
        | GeodataError::StateNotFound(_)
        | GeodataError::CountyNotFound { .. }
        | GeodataError::MissingConfig => 2,
        GeodataError::Http(_) | GeodataError::HttpStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match &cli.command {
        Commands::Fetch(args) => args.config.as_deref(),
        _ => None,
    };
    let config = load_config(config_path)?;
    let store = match cli.root.clone().or_else(|| config.project_root.clone()) {
        Some(root) => Store::new(root),
        None => Store::from_current_dir()?,
    };
    let json = cli.json;

    match cli.command {
        Commands::List => {
            let app = App::new(store, NopClient);
            let result = app.list(&sink(json))?;
            if json {
                JsonOutput::print_list(&result).into_diagnostic()?;
            } else {
                for entry in &result.datasets {
                    let state = if entry.cached { "cached" } else { "-" };
                    println!("{:<24} {:<10} {}", entry.dataset, entry.format, state);
                }
            }
            Ok(())
        }
        Commands::Setup => {
            let app = App::new(store, NopClient);
            let result = app.setup(&sink(json))?;
            if json {
                JsonOutput::print_setup(&result).into_diagnostic()?;
            } else {
                for dir in &result.directories {
                    println!("{dir}");
                }
            }
            Ok(())
        }
        command => {
            let client = HttpDatasetClient::new(config.timeout)?;
            let app = App::new(store, client).with_reference_year(config.reference_year);
            run_network_command(command, &app, &config, json)
        }
    }
}

fn run_network_command<C: DatasetClient>(
    command: Commands,
    app: &App<C>,
    config: &ResolvedConfig,
    json: bool,
) -> miette::Result<()> {
    let sink = sink(json);
    match command {
        Commands::Fetch(args) => {
            let options = FetchOptions { force: args.force };
            let Some(specifier) = args.specifier else {
                let result = app.fetch_config(config, options, &sink)?;
                return print_fetch(&result, json);
            };
            let request: DatasetRequest = specifier.parse()?;
            if args.load {
                let frame = app.load(&request, options, &sink)?;
                return print_frame(&FrameSummary::of(&frame), json);
            }
            let item = app.fetch(&request, options, &sink)?;
            print_fetch(&FetchResult { items: vec![item] }, json)
        }
        Commands::Crosswalk(CrosswalkArgs {
            command: CrosswalkCommand::Build(args),
        }) => {
            let year = args.year.unwrap_or(config.reference_year);
            let result = app.build_crosswalks(year, &sink)?;
            if json {
                JsonOutput::print_crosswalk(&result).into_diagnostic()?;
            } else {
                println!("{} ({} states)", result.state_path, result.states);
                println!("{} ({} counties)", result.county_csv_path, result.counties);
                println!("{}", result.county_parquet_path);
            }
            Ok(())
        }
        Commands::StateFips(args) => {
            let fips = app.state_fips_for_abbrev(&args.abbrev, &sink)?;
            print_lookup(
                &LookupResult {
                    query: args.abbrev,
                    fips,
                },
                json,
            )
        }
        Commands::CountyFips(args) => {
            let year = args.year.unwrap_or(config.reference_year);
            let fips = app.county_fips_for_name(&args.state, &args.name, year, &sink)?;
            print_lookup(
                &LookupResult {
                    query: format!("{}, {}", args.name, args.state),
                    fips,
                },
                json,
            )
        }
        Commands::Tracts(args) => {
            let options = FetchOptions { force: args.force };
            let frame = app.tracts_for_states(args.year, &args.states, options, &sink)?;
            print_frame(&FrameSummary::of(&frame), json)
        }
        Commands::List | Commands::Setup => Ok(()),
    }
}

/// Falls back to defaults when no config file is present in the current
/// directory. An explicit `--config` path must exist.
fn load_config(path: Option<&str>) -> miette::Result<ResolvedConfig> {
    match ConfigLoader::resolve(path) {
        Ok(config) => Ok(config),
        Err(GeodataError::MissingConfig) => Ok(ResolvedConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn print_fetch(result: &FetchResult, json: bool) -> miette::Result<()> {
    if json {
        return JsonOutput::print_fetch(result).into_diagnostic();
    }
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";
    println!("{cyan}geodata summary{reset}");
    for item in &result.items {
        let action = item.action.as_str();
        let color = if action == "hit" { green } else { cyan };
        println!("{color}{} ({action}){reset}", item.dataset);
        println!("{color}   {}{reset}", item.path);
    }
    Ok(())
}

fn print_frame(summary: &FrameSummary, json: bool) -> miette::Result<()> {
    if json {
        return JsonOutput::print_frame(summary).into_diagnostic();
    }
    println!("rows: {}", summary.rows);
    println!("columns: {}", summary.columns.join(", "));
    if let Some(crs) = &summary.crs {
        println!("crs: {crs}");
    }
    Ok(())
}

fn print_lookup(result: &LookupResult, json: bool) -> miette::Result<()> {
    if json {
        return JsonOutput::print_lookup(result).into_diagnostic();
    }
    println!("{}", result.fips);
    Ok(())
}

enum ProgressOutput {
    Log,
    Quiet,
}

fn sink(json: bool) -> ProgressOutput {
    if json {
        ProgressOutput::Quiet
    } else {
        ProgressOutput::Log
    }
}

impl ProgressSink for ProgressOutput {
    fn event(&self, event: ProgressEvent) {
        if let ProgressOutput::Log = self {
            match event.elapsed {
                Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
                None => info!("{}", event.message),
            }
        }
    }
}

struct NopClient;

impl DatasetClient for NopClient {
    fn download(&self, url: &str, _destination: &mut File) -> Result<u64, GeodataError> {
        Err(GeodataError::Http(format!("network access disabled for {url}")))
    }
}
