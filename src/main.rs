use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use trafficeval::analyser::{decay, utils};
use trafficeval::analyser::decay::DecayAggregator;
use trafficeval::ui::output;
use trafficeval::{evaluate, Result, ScoringPolicy};

/// trafficeval scores traffic classifier output and tracks per-host representations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a results document against its ground-truth labels
    Score {
        /// Results JSON produced by an evaluation run
        #[arg(short = 'r', long, value_parser)]
        results: PathBuf,

        /// Label assignments JSON; re-derives ground truth from capture names
        #[arg(short = 'a', long, value_parser)]
        assignments: Option<PathBuf>,

        /// Scoring policy to apply
        #[arg(short = 'p', long, value_enum, default_value_t = PolicyArg::Both)]
        policy: PolicyArg,

        /// Display output as formatted JSON
        #[arg(short = 'j', long)]
        json: bool,

        /// Directory to write scores.json into
        #[arg(short = 'o', long, value_parser)]
        output_dir: Option<PathBuf>,
    },
    /// Fold observation streams into one decayed representation per entity
    Represent {
        /// Observations JSON, a list of {entity, observations}
        #[arg(short = 'i', long, value_parser)]
        input: PathBuf,

        /// Decay constant in seconds, default is one day
        #[arg(short = 't', long, default_value_t = decay::DEFAULT_TAU, value_parser)]
        tau: f64,

        /// Display output as formatted JSON
        #[arg(short = 'j', long)]
        json: bool,

        /// Directory to write representations.json into
        #[arg(short = 'o', long, value_parser)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    OpenSet,
    Forced,
    Both,
}

impl PolicyArg {
    fn policies(self) -> Vec<ScoringPolicy> {
        match self {
            PolicyArg::OpenSet => vec![ScoringPolicy::OpenSet],
            PolicyArg::Forced => vec![ScoringPolicy::ForcedDecision],
            PolicyArg::Both => vec![ScoringPolicy::OpenSet, ScoringPolicy::ForcedDecision],
        }
    }
}

/// LOG_LEVEL picks the default level; RUST_LOG still overrides it.
fn init_logging() {
    let mut level = LevelFilter::Info;
    let mut bad_level = None;

    if let Ok(value) = std::env::var("LOG_LEVEL") {
        if !value.is_empty() {
            match value.parse::<LevelFilter>() {
                Ok(parsed) => level = parsed,
                Err(e) => bad_level = Some(format!("{value}: {e}")),
            }
        }
    }

    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("Unable to initialise logging: {e}");
    }
    if let Some(reason) = bad_level {
        log::error!("Unable to set logging level because {reason}, defaulting to INFO.");
    }
}

fn prepare_output_dir(output_dir: Option<&Path>) -> Result<()> {
    match output_dir {
        Some(dir) => {
            log::info!("Output directory {}", dir.display());
            fs::create_dir_all(dir)?;
        }
        None => log::warn!("No output directory specified."),
    }
    Ok(())
}

fn score(
    results: &Path,
    assignments: Option<&Path>,
    policy: PolicyArg,
    json: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    prepare_output_dir(output_dir)?;

    let mut document = utils::load_results(results)?;
    if let Some(path) = assignments {
        log::info!("Getting label assignments");
        let assignments = utils::load_label_assignments(path)?;
        utils::relabel(&mut document, &assignments);
    }

    let evaluations: Vec<_> = policy
        .policies()
        .into_iter()
        .map(|policy| evaluate(document.samples.values(), policy))
        .collect();

    if json || output_dir.is_some() {
        let json_out = output::data_as_json(&evaluations)?;
        match output_dir {
            Some(dir) => output::data_to_file(json_out, &dir.join("scores.json"))?,
            None => println!("{json_out}"),
        }
    }
    if !json {
        for evaluation in &evaluations {
            output::print_evaluation(evaluation);
        }
    }

    Ok(())
}

fn represent(input: &Path, tau: f64, json: bool, output_dir: Option<&Path>) -> Result<()> {
    prepare_output_dir(output_dir)?;

    let streams = utils::load_observations(input)?;
    let mut aggregator = DecayAggregator::with_tau(tau)?;

    for stream in &streams {
        log::info!("Updating representation of {}", stream.entity);
        if aggregator.update_batch(&stream.entity, &stream.observations)?.is_none() {
            log::warn!("No observations for {}, no representation available.", stream.entity);
        }
    }

    let states: BTreeMap<&str, _> = aggregator
        .states()
        .iter()
        .map(|(entity, state)| (entity.as_str(), state))
        .collect();

    if json || output_dir.is_some() {
        let json_out = output::data_as_json(&states)?;
        match output_dir {
            Some(dir) => output::data_to_file(json_out, &dir.join("representations.json"))?,
            None => println!("{json_out}"),
        }
    }
    if !json {
        output::print_representations(&states);
    }

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();

    let outcome = match &args.command {
        Command::Score { results, assignments, policy, json, output_dir } => {
            score(results, assignments.as_deref(), *policy, *json, output_dir.as_deref())
        }
        Command::Represent { input, tau, json, output_dir } => {
            represent(input, *tau, *json, output_dir.as_deref())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
