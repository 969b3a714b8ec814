use archifer_cli::{Cli, Commands};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    let (name, result) = match &cli.command {
        Commands::Summary {
            table,
            categories,
            columns,
            year,
        } => ("summary", commands::summary::handle(table, categories, columns, *year)),
        Commands::Compile {
            config,
            table,
            key_column,
            lp_out,
        } => (
            "compile",
            commands::compile::handle(config, table, key_column.as_deref(), lp_out.as_deref()),
        ),
        Commands::Fit {
            config,
            table,
            key_column,
            solver,
            out,
        } => (
            "fit",
            commands::fit::handle(config, table, key_column.as_deref(), solver, out.as_deref()),
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{name} failed: {e:?}");
            ExitCode::FAILURE
        }
    }
}
