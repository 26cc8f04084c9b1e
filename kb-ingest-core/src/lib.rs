#![doc = "kb-ingest-core: core logic library for kb-ingest."]

//! This crate contains the ingestion workflow and its data model: document
//! upload, ingestion-job submission and polling, job history, knowledge-base
//! selection and retrieval-augmented queries.
//! All external services are reached through the traits in [`contract`];
//! the AWS clients and the console live in the `kb-ingest` crate.
//!
//! # Usage
//! Add this as a dependency for anything that drives the workflow, and use the
//! `Mock*` types (feature `test-export-mocks`) to test against scripted services.

pub mod contract;
pub mod error;
pub mod history;
pub mod ingest;
pub mod query;
pub mod select;
pub mod timer;
pub mod token;
pub mod workflow;
