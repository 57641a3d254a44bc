//! Print the contents of a device tree blob.
//!
//! Usage:
//!   dtb-dump -f board.dtb tree           # Node tree
//!   dtb-dump -f board.dtb records        # Record tree as JSON
//!   dtb-dump -f board.dtb resolve 0x5    # Path of a phandle
//!   dtb-dump compatible < board.dtb      # Read the blob from stdin

use std::{
    io::{self, BufReader, Read},
    num::ParseIntError,
    path::PathBuf,
    process,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dtb_parser::DtbParser;
use log::LevelFilter;

mod logger;

/// Print the contents of a device tree blob
#[derive(Parser)]
#[command(name = "dtb-dump")]
struct Cli {
    /// Blob to read, stdin if omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Maximum log level written to stderr
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,

    /// Print JSON instead of debug output
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node tree
    Tree,
    /// Print the record tree
    Records,
    /// Print the root compatible strings
    Compatible,
    /// Print the path of the node declaring a phandle
    Resolve {
        /// Phandle value, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_phandle)]
        phandle: u32,
    },
    /// Print every phandle and the node declaring it
    Phandles,
    /// Print the memory reservation block
    Reservations,
    /// Print the blob header
    Header,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init(cli.log_level).context("failed to install logger")?;

    let dtb = match &cli.file {
        Some(path) => DtbParser::from_path(path)?,
        None => {
            let mut blob = Vec::new();
            BufReader::new(io::stdin())
                .read_to_end(&mut blob)
                .context("failed to read blob from stdin")?;
            DtbParser::from_bytes(&blob)?
        }
    };

    match cli.command {
        Commands::Tree => {
            let root = dtb.root();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&root)?);
            } else {
                println!("{:#?}", root);
            }
        }
        Commands::Records => {
            println!("{}", serde_json::to_string_pretty(&dtb.traverse())?);
        }
        Commands::Compatible => {
            for compatible in dtb.compatible_strings() {
                println!("{}", compatible);
            }
        }
        Commands::Resolve { phandle } => match dtb.resolve_phandle(phandle) {
            Some(path) => println!("{}", path),
            None => {
                eprintln!("phandle {:#x} not found", phandle);
                process::exit(1);
            }
        },
        Commands::Phandles => {
            for (phandle, path) in dtb.phandles().iter() {
                println!("{:#06x} {}", phandle, path);
            }
        }
        Commands::Reservations => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(dtb.memory_reservations())?
                );
            } else {
                for rsv in dtb.memory_reservations() {
                    println!("{:#018x} {:#x}", rsv.address, rsv.size);
                }
            }
        }
        Commands::Header => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(dtb.header())?);
            } else {
                println!("{:#x?}", dtb.header());
            }
        }
    }

    Ok(())
}

fn parse_phandle(s: &str) -> Result<u32, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_phandles() {
        for (input, exp) in [("5", 5), ("0x5", 5), ("0X1f", 0x1f), ("4294967295", u32::MAX)] {
            assert_eq!(parse_phandle(input), Ok(exp));
        }

        assert!(parse_phandle("0x").is_err());
        assert!(parse_phandle("five").is_err());
        assert!(parse_phandle("-1").is_err());
    }

    #[test]
    fn parse_arguments() {
        let cli =
            Cli::try_parse_from(["dtb-dump", "-f", "board.dtb", "resolve", "0x10"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("board.dtb")));
        assert_eq!(cli.log_level, LevelFilter::Warn);
        assert!(matches!(cli.command, Commands::Resolve { phandle: 0x10 }));

        let cli = Cli::try_parse_from(["dtb-dump", "--json", "--log-level", "debug", "tree"])
            .unwrap();
        assert!(cli.file.is_none());
        assert!(cli.json);
        assert_eq!(cli.log_level, LevelFilter::Debug);
    }
}
