use anyhow::Result;

use gravity::commands;

fn main() -> Result<()> {
    let matches = commands::cli().get_matches();

    gravity::init_logging(matches.get_flag("debug"));

    match matches.subcommand() {
        Some(("run", sub_matches)) => commands::run::execute(sub_matches),
        Some(("snapshot", sub_matches)) => commands::snapshot::execute(sub_matches),
        Some(("env", sub_matches)) => commands::env::execute(sub_matches),
        Some(("temp", sub_matches)) => commands::temp::execute(sub_matches),
        _ => {
            println!("Use 'gravity --help' for more information.");
            Ok(())
        }
    }
}
