pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "relaybot",
    about = "Relaybot operator CLI",
    long_about = "Inspect relaybot configuration, check Slack readiness, and preview mrkdwn rendering.",
    after_help = "Examples:\n  relaybot doctor --json\n  relaybot config\n  echo '**hi**' | relaybot render"
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
    #[command(about = "Validate config, Slack token readiness, reactions, and listen settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Convert markdown to Slack mrkdwn (argument or stdin)")]
    Render {
        #[arg(help = "Markdown text; read from stdin when omitted")]
        text: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Render { text } => commands::render::run(text),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
