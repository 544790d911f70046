mod report;
mod schema;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

use crate::report::MatchReport;
use crate::schema::CliSchema;

/// Exit status for arguments the schema rejects.
const PARSE_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "optmatch-cli")]
#[command(version, about = "Match command-line arguments against a JSON command schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse ARGS against the schema and print what was bound
    Match(MatchArgs),

    /// Load the schema and report declaration errors
    Check(CheckArgs),
}

#[derive(Parser)]
struct MatchArgs {
    /// Path to the JSON command schema
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Keep matching options after the collected parameter starts
    #[arg(long)]
    options_after_collected: bool,

    /// Arguments to match (pass after `--`)
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Parser)]
struct CheckArgs {
    /// Path to the JSON command schema
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Match(args) => match_command(args),
        Commands::Check(args) => check_command(args),
    }
}

fn match_command(args: MatchArgs) -> Result<ExitCode> {
    tracing::debug!("executing match command");

    let schema = CliSchema::from_file(&args.schema)?;
    let mut cli = schema.build()?;

    let mut config = schema.parser;
    config.options_after_collected |= args.options_after_collected;
    let parser = optmatch::Parser::with_config(config);

    match parser.parse(&mut cli, &args.args) {
        Ok(outcome) => {
            let report = MatchReport::new(&cli, outcome.command);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::debug!(?err, "arguments rejected");
            eprintln!("error: {err}");
            Ok(ExitCode::from(PARSE_FAILURE))
        }
    }
}

fn check_command(args: CheckArgs) -> Result<ExitCode> {
    tracing::debug!("executing check command");

    let schema = CliSchema::from_file(&args.schema)?;
    let cli = schema
        .build()
        .with_context(|| format!("invalid schema: {}", args.schema.display()))?;

    eprintln!("OK: {}", cli.name());
    for command in cli.commands() {
        let mut line = vec![command.name()];
        line.extend(
            command
                .options()
                .decls()
                .filter(|(_, decl)| decl.is_option())
                .flat_map(|(_, decl)| decl.names().iter().map(String::as_str)),
        );
        println!("{}", line.join(" "));
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
