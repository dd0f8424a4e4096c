//! klouds.io AWS connector
//!
//! Interactive setup wizard that provisions the AWS resources klouds.io
//! needs (report bucket, Cost and Usage Report, cross-account role) and
//! tells the backend about the new connection.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use klouds_connector::aws::{AwsCredentialSource, CostService, IdentityService};
use klouds_connector::cli::{Cli, Command, CreateArgs};
use klouds_connector::wizard::{self, DialoguerPrompter, WizardOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Create(args) => create(args).await,
    }
}

async fn create(args: CreateArgs) -> Result<()> {
    let target = args.environment.target();
    let region = args
        .region
        .clone()
        .unwrap_or_else(|| target.default_region.to_string());

    tracing::debug!(%region, environment = %args.environment, "starting connector setup");

    let mut prompter = DialoguerPrompter;
    let source = AwsCredentialSource::new(Some(region.clone()));
    let Some(config) = wizard::resolve_credentials(&mut prompter, &source).await? else {
        // User declined; not an error.
        return Ok(());
    };

    let cost = CostService::new(&config);
    let identity = IdentityService::new(&config);
    let outcome = wizard::run_wizard(
        &mut prompter,
        &cost,
        &identity,
        target,
        &region,
        &args.handshake,
    )
    .await?;

    match outcome {
        WizardOutcome::TemplateLink(url) | WizardOutcome::StackSetLink(url) => {
            println!("Please log in to the AWS console and open the link below to create the CloudFormation stack");
            println!("{url}");
        }
        WizardOutcome::Connected { role_arn } => {
            tracing::debug!(%role_arn, "cross-account role connected");
            println!("Return to klouds.io to see the new connection");
        }
    }
    Ok(())
}
