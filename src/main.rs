use clap::Parser;
use dataset_workbench::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    // The server and the file commands each handle Ctrl+C themselves
    if let Err(error) = runtime.block_on(commands::run(args)) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
