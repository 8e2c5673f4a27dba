use clap::Parser;
use env_logger::Env;
use midas::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
    run(cli)
}
