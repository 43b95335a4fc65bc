//! Tabula: a data summarization agent.
//!
//! Give it a reference to tabular data (a URL, a Google Sheets link, a file
//! path, or inline CSV/JSON) and it loads the data, computes descriptive
//! statistics, renders charts, assembles a self-contained HTML report, deploys
//! the report into a freshly provisioned sandbox, and hands back a public
//! preview URL. A chat adapter triggers the same pipeline per inbound message.

pub mod agent;
pub mod analyzer;
pub mod charts;
pub mod config;
pub mod errors;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod sandbox;
pub mod table;
