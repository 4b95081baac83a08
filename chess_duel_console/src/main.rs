// Legend for various fix-this comments:
//   * "TODO" - bug or missing crucial feature.
//   * "Improvement potential" - missing nice-to-have feature or an opportunity
//       to make code better or faster.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod network;

mod check_position;
mod server_config;
mod server_main;

use std::io;

use clap::{Command, arg};
use log::error;
use server_config::ServerConfig;

fn main() -> io::Result<()> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .filter_module("tide", log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let matches = Command::new("Chess duel")
        .author(clap::crate_authors!())
        .version(clap::crate_version!())
        .about("Two-player chess server with spectators")
        .subcommand_required(true)
        .subcommand(Command::new("server").about("Run as server").arg(
            arg!(<config_file> "Path to the configuration file: yaml-serialized ServerConfig."),
        ))
        .subcommand(
            Command::new("check-position")
                .about("Verifies whether a FEN string can be used as the starting position.")
                .arg(arg!(<fen> "Position to check")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            let config_file = sub_matches.get_one::<String>("config_file").unwrap();
            let result = ServerConfig::read_file(config_file).and_then(server_main::run);
            result.map_err(|err| {
                error!("{:#}", err);
                io::Error::other(err)
            })
        }
        Some(("check-position", sub_matches)) => {
            check_position::run(sub_matches.get_one::<String>("fen").unwrap())
        }
        _ => unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`"),
    }
}
