use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::info;
use splitcli::{diagnostics::report_ir_error, init_logging};
use splitir::{
    extract::{ExtractSelection, extract},
    store::{load, write_snapshot},
    utils::Error,
};

/// Copy the named definitions of a module, and declarations of everything
/// they reference, into a new module.
#[derive(Parser, Debug)]
#[command(name = "irextract", version, about, long_about = None)]
pub struct Arguments {
    /// Module to extract from
    snapshot: PathBuf,

    /// Function whose definition is kept
    #[arg(long = "func", value_name = "NAME")]
    functions: Vec<String>,

    /// Global whose definition is kept
    #[arg(long = "glob", value_name = "NAME")]
    globals: Vec<String>,

    /// Output module
    #[arg(short, long)]
    output: PathBuf,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn run(args: &Arguments) -> Result<(), Error> {
    let module = load(&args.snapshot)?;

    let selection = ExtractSelection {
        functions: args.functions.iter().cloned().collect(),
        globals: args.globals.iter().cloned().collect(),
    };
    let extracted = extract(&module, &selection)?;
    write_snapshot(&extracted, &args.output)?;

    info!(
        "extracted {} function(s) and {} global(s) into {}",
        selection.functions.len(),
        selection.globals.len(),
        args.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Arguments::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_ir_error(&error);
            ExitCode::FAILURE
        }
    }
}
