//! socmap CLI: compose SoC address maps and plan exact-ratio clock trees.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "socmap",
    version,
    about = "Compose SoC address maps and plan exact-ratio clock trees"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a board description into a system image
    Assemble {
        /// Board file (.board.toml)
        board: PathBuf,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
        /// Write the image to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Derive an exact PLL multiply/divide pair
    Ratio {
        /// Reference frequency in Hz
        reference_hz: u64,
        /// Target frequency in Hz
        target_hz: u64,
        /// Largest feedback multiplier
        #[arg(long, default_value_t = 64)]
        max_multiply: u64,
        /// Largest input divider
        #[arg(long, default_value_t = 64)]
        max_divide: u64,
    },
    /// Validate a board description and try a dry-run assembly
    Check {
        /// Board file (.board.toml)
        board: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Assemble {
            board,
            format,
            output,
        } => commands::assemble::run(&board, format.as_deref(), output.as_deref()),

        Commands::Ratio {
            reference_hz,
            target_hz,
            max_multiply,
            max_divide,
        } => commands::ratio::run(reference_hz, target_hz, max_multiply, max_divide),

        Commands::Check { board } => commands::check::run(&board),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_assemble_arguments() {
        let cli = Cli::parse_from([
            "socmap",
            "assemble",
            "boards/atlys-mini.board.toml",
            "--format",
            "json",
        ]);
        match cli.command {
            Commands::Assemble { board, format, output } => {
                assert_eq!(board, PathBuf::from("boards/atlys-mini.board.toml"));
                assert_eq!(format.as_deref(), Some("json"));
                assert!(output.is_none());
            }
            _ => panic!("expected assemble"),
        }
    }

    /// Full workflow: check -> assemble to file -> read back.
    #[test]
    fn check_then_assemble_workflow() {
        let board = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../boards/atlys-mini.board.toml");
        commands::check::run(&board).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("atlys.json");
        commands::assemble::run(&board, Some("json"), Some(&out)).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["board"], "atlys-mini");
        assert_eq!(json["address_map"]["control_slots"]["19"], "ethmac");
    }
}
