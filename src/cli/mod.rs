//! CLI module for the APIM management API

pub mod serve;

use clap::{Parser, Subcommand};

/// APIM management API - REST management plane for an API gateway
#[derive(Parser)]
#[command(name = "apim-management")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the management API server
    Serve,
}
