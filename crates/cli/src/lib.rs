pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pharmai",
    about = "PharmAI operator CLI",
    long_about = "Inspect configuration, check readiness, browse the demo catalogue, and run offline chat turns.",
    after_help = "Examples:\n  pharmai doctor --json\n  pharmai config\n  pharmai ask \"is advil in stock?\"\n  pharmai ask \"list my prescriptions\" --user u003"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model credentials, and the demo dataset")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Answer one message offline with the keyword classifier and templates")]
    Ask {
        #[arg(help = "The user message to answer")]
        message: String,
        #[arg(long = "user", help = "Demo user id, e.g. u001")]
        user_id: Option<String>,
        #[arg(long, help = "Emit the full reply with intent and workflow result as JSON")]
        json: bool,
    },
    #[command(about = "List the demo medication catalogue")]
    Meds {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::CommandResult::output(commands::config::run()),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { message, user_id, json } => commands::ask::run(&message, user_id, json),
        Command::Meds { json } => commands::CommandResult::output(commands::meds::run(json)),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
