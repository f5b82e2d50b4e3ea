//! Command line entry point: simulator runs against the in-memory cloud

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use reco_orchestrator::{run_simulator, telemetry, OrchestratorConfig, SimulatorConfig};
use std::path::PathBuf;
use std::time::Duration;

fn cli() -> Command {
    Command::new("reco-orchestrator")
        .version(reco_orchestrator::VERSION)
        .about("Long-running recommendation listing and apply orchestration")
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run listing, requirement checks and an apply against an in-memory cloud")
                .arg(
                    Arg::new("projects")
                        .long("projects")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Number of projects to simulate"),
                )
                .arg(
                    Arg::new("blocked")
                        .long("blocked")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Number of projects missing a required permission"),
                )
                .arg(
                    Arg::new("fail-project")
                        .long("fail-project")
                        .value_parser(value_parser!(usize))
                        .help("Index of a project whose recommender queries fail"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .default_value("5")
                        .value_parser(value_parser!(u64))
                        .help("Latency of every simulated remote call"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML orchestrator configuration"),
                ),
        )
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<OrchestratorConfig> {
    let Some(path) = path else {
        return Ok(OrchestratorConfig::default());
    };
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    OrchestratorConfig::from_toml_str(&document).with_context(|| format!("parsing {}", path.display()))
}

async fn simulate(args: &ArgMatches) -> anyhow::Result<bool> {
    let defaults = SimulatorConfig::default();
    let config = SimulatorConfig {
        projects: args.get_one::<usize>("projects").copied().unwrap_or(defaults.projects),
        blocked: args.get_one::<usize>("blocked").copied().unwrap_or(defaults.blocked),
        fail_project: args.get_one::<usize>("fail-project").copied(),
        latency: args
            .get_one::<u64>("latency-ms")
            .map_or(defaults.latency, |ms| Duration::from_millis(*ms)),
        orchestrator: load_config(args.get_one::<PathBuf>("config"))?,
        ..defaults
    };

    println!("Running Reco simulator...");
    println!("Projects: {}", config.projects);
    println!("Blocked: {}", config.blocked);
    if let Some(index) = config.fail_project {
        println!("Failing project: {index}");
    }
    println!();

    let report = run_simulator(config).await?;
    println!("{}", report.generate_text());
    Ok(report.passed())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    telemetry::init(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let passed = simulate(args).await?;
            std::process::exit(if passed { 0 } else { 1 });
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
