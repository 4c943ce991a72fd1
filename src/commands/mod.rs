// Command handlers module
pub mod config;
pub mod env;
pub mod run;
pub mod snapshot;
pub mod temp;

use clap::{Arg, ArgAction, Command};

/// Full command line definition, shared by the binary and its tests.
pub fn cli() -> Command {
    Command::new("gravity")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Host telemetry sampler")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Read settings from this JSON file instead of the default location")
                .global(true),
        )
        .arg(
            Arg::new("interval-ms")
                .short('i')
                .long("interval-ms")
                .value_name("MS")
                .help("Sampling cycle length in milliseconds")
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .value_name("KIND")
                .help("Force the environment: wsl, linux or unix")
                .global(true),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Sample continuously until Ctrl+C")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print one JSON snapshot per line")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("snapshot").about("Warm up for two cycles and print one JSON snapshot"),
        )
        .subcommand(Command::new("env").about("Show the detected environment profile"))
        .subcommand(Command::new("temp").about("Read the CPU temperature once"))
}
