//! Loading and persisting modules.
use std::path::Path;

use log::{debug, info};

use crate::{module::Module, utils::Error};

/// Parse a module from its textual form. `file` is only used for diagnostics.
#[cfg(feature = "chumsky")]
pub fn parse(source: &str, file: Option<&str>) -> Result<Module, Error> {
    let mut module = Module::default();
    crate::parser::extend_module_from_string(&mut module, source, file)?;
    Ok(module)
}

/// Load the module stored at `path`.
#[cfg(feature = "chumsky")]
pub fn load(path: impl AsRef<Path>) -> Result<Module, Error> {
    let path = path.as_ref();
    let mut module = Module::default();
    crate::parser::extend_module_from_path(&mut module, path)?;
    debug!(
        "store: loaded {} ({} globals, {} functions)",
        path.display(),
        module.globals.len(),
        module.functions.len()
    );
    Ok(module)
}

/// Print `module` to `path`, creating parent directories as needed.
pub fn write_snapshot(module: &Module, path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    let io_error = |source| Error::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, module.to_string()).map_err(io_error)?;
    info!("store: wrote {}", path.display());
    Ok(())
}
