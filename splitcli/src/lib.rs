//! Command-line front ends of the splitter: `irsplit` drives the pipeline,
//! `irextract` materializes a single partition out of a snapshot.

pub mod cli;
pub mod diagnostics;

/// Install the global logger. `verbose` raises the default level to
/// `debug`; `RUST_LOG` overrides both. A logger installed earlier is kept.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    if let Err(error) = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init()
    {
        log::debug!("keeping the installed logger: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_can_be_initialized_twice() {
        init_logging(false);
        init_logging(true);
        assert!(log::max_level() >= log::LevelFilter::Warn);
    }
}
