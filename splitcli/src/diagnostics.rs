//! Error reporting for the command-line tools.
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use splitcore::utils::error::SplitError;
use splitir::utils::{Error, ParserError};

/// Print every parser diagnostic as an annotated source excerpt.
pub fn report_parser_errors(errors: &[ParserError]) {
    let mut colors = ColorGenerator::new();
    let color = colors.next();

    for error in errors {
        let file = error.file.clone().unwrap_or_else(|| "<input>".to_string());
        let source = std::fs::read_to_string(&file).unwrap_or_default();
        let span = (file.clone(), error.start..error.end);

        let printed = Report::build(ReportKind::Error, span.clone())
            .with_message(&error.message)
            .with_label(
                Label::new(span)
                    .with_message("the error occurred here")
                    .with_color(color),
            )
            .finish()
            .eprint((file, Source::from(source)));
        if printed.is_err() {
            eprintln!("error: {}", error);
        }
    }
}

pub fn report_ir_error(error: &Error) {
    match error {
        Error::ParserErrors { errors, .. } => report_parser_errors(errors),
        _ => eprintln!("error: {}", error),
    }
}

pub fn report_error(error: &SplitError) {
    match error {
        SplitError::Ir(error) => report_ir_error(error),
        SplitError::VerificationError { issues, .. } => {
            eprintln!("error: {}", error);
            for issue in issues {
                eprintln!("  {}", issue);
            }
        }
        _ => eprintln!("error: {}", error),
    }
}
