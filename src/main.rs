use anyhow::Result;
use clap::Parser;
use statement_splitter::cli;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        if tracing::dispatcher::has_been_set() {
            error!("{:#}", err);
        } else {
            // config errors happen before logging is up
            eprintln!("error: {:#}", err);
        }
        std::process::exit(1);
    }
    Ok(())
}
