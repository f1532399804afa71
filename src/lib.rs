//! sql-deploy - sequential deployment of multi-statement SQL scripts.
//!
//! A script is segmented into statements, each statement is classified by
//! its leading keywords, an advisory validator flags common authoring
//! mistakes, and the deployer runs the statements one at a time against a
//! [`db::DeployTarget`], stopping at the first failure.
//!
//! This library exposes the core modules for the binary and for
//! integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod deploy;
pub mod error;
pub mod logging;
pub mod script;
pub mod validate;
