//! Splitting engine for `splitir` modules.
//!
//! The crate decides, for every definition of a module, which companion
//! symbols must travel with it into its own partition, and rewrites link
//! attributes so that the partitions can be compiled independently and linked
//! back together. The pipeline lives in [`scheduler`]; partitions are
//! materialized either by an external extraction tool or in process by the
//! [`cloner`].

pub mod callgraph;
pub mod cloner;
pub mod config;
pub mod dispatch;
pub mod linkage;
pub mod magic;
pub mod partition;
pub mod resolver;
pub mod scheduler;
pub mod survey;
pub mod utils;
pub mod walker;

#[cfg(test)]
pub(crate) mod tests_utils;
