//! Command-line interface

use clap::{Args, Parser, Subcommand};

use crate::config::Environment;

#[derive(Parser)]
#[command(name = "klouds-connector")]
#[command(about = "Connect an AWS account's cost and usage reporting to klouds.io", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision cost reporting resources and connect them to klouds.io
    Create(CreateArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// AWS region for new resources (defaults to the environment's home region)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Which klouds.io environment to connect to
    #[arg(short, long, value_enum, default_value_t = Environment::Prod)]
    pub environment: Environment,

    /// Handshake id linking this run to a klouds.io user account
    #[arg(long)]
    pub handshake: String,
}
