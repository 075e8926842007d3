//! Textual intermediate representation used by the splitting engine.
//!
//! A [`module::Module`] owns global variables and functions, each carrying
//! link attributes ([`symbol::Linkage`], [`symbol::Visibility`] and the
//! resolves-locally flag). The crate can parse modules from text, print them
//! back, verify their structure and materialize a named-symbol closure the way
//! an external extraction tool does.

pub mod constant;
pub mod extract;
pub mod fmt;
pub mod instructions;
pub mod module;
pub mod operand;
#[cfg(feature = "chumsky")]
pub mod parser;
pub mod store;
pub mod symbol;
pub mod terminator;
pub mod types;
pub mod utils;
pub mod verify;
