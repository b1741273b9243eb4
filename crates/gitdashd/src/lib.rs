pub mod cli;
pub mod commands;
pub mod ingest;
pub mod logging;
