//! Integration tests for sql-deploy.

pub mod deploy_test;
pub mod pipeline_test;
pub mod postgres_test;
