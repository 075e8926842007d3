use std::process::ExitCode;

use clap::Parser;
use log::info;
use splitcli::{
    cli::{Cli, Command, SplitArgs, SurveyArgs},
    diagnostics::report_error,
    init_logging,
};
use splitcore::{scheduler::Scheduler, survey::survey_list, utils::error::SplitResult};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Command::Split(args) => split(args, cli.verbose),
        Command::Survey(args) => survey(args, cli.verbose),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            report_error(&error);
            ExitCode::FAILURE
        }
    }
}

fn split(args: &SplitArgs, verbose: bool) -> SplitResult<ExitCode> {
    let config = args.to_config(verbose)?;
    let report = Scheduler::new(config).run_file(&args.input)?;

    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    for failure in &report.failures {
        eprint!("@{}: ", failure.symbol);
        report_error(&failure.error);
    }
    if let Some(snapshot) = &report.snapshot {
        info!("snapshot written to {}", snapshot.display());
    }
    info!(
        "{} partition(s) from {}",
        report.partitions.len(),
        args.input.display()
    );

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn survey(args: &SurveyArgs, verbose: bool) -> SplitResult<ExitCode> {
    let config = args.to_config(verbose)?;
    let report = survey_list(&args.list, &config)?;

    for (path, error) in &report.skipped {
        eprint!("{}: ", path.display());
        report_error(error);
    }

    for entry in &report.entries {
        println!("{}", entry.function);
        if config.safe || config.verbose {
            println!("  {}", entry.viability);
        }
        if config.verbose {
            for callee in &entry.callees {
                println!("  calls {}", callee);
            }
            for caller in &entry.callers {
                println!("  used by {}", caller);
            }
        }
        println!("  {}", entry.request);
    }

    Ok(ExitCode::SUCCESS)
}
