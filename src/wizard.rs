//! The interactive setup wizard
//!
//! A fixed decision tree with no cycles and no state between runs:
//!
//! credentials -> report (existing | create new) -> scope (organisation |
//! this account) -> connect method (CloudFormation | CLI) -> done.
//!
//! Every prompt goes through [`Prompter`], so the whole flow can run
//! headless with a [`ScriptedPrompter`]; every AWS call goes through
//! [`CostApi`]/[`IdentityApi`]/[`CredentialSource`].

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use std::collections::VecDeque;

use crate::aws::cost::validate_bucket_name;
use crate::aws::{CostApi, CredentialSource, IdentityApi, ProvisioningEvent, ReportLocation};
use crate::config::ConnectorTarget;
use crate::links;

/// Answer source for the wizard's prompts.
pub trait Prompter {
    fn confirm(&mut self, message: &str) -> Result<bool>;
    fn input(&mut self, message: &str, default: Option<&str>) -> Result<String>;
    fn select(&mut self, message: &str, items: &[String]) -> Result<usize>;
    fn multi_select(&mut self, message: &str, items: &[String]) -> Result<Vec<usize>>;
}

/// Terminal-backed prompter.
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(Confirm::new().with_prompt(message).default(true).interact()?)
    }

    fn input(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(message);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn select(&mut self, message: &str, items: &[String]) -> Result<usize> {
        Ok(Select::new()
            .with_prompt(message)
            .items(items)
            .default(0)
            .interact()?)
    }

    fn multi_select(&mut self, message: &str, items: &[String]) -> Result<Vec<usize>> {
        Ok(MultiSelect::new().with_prompt(message).items(items).interact()?)
    }
}

/// One pre-recorded answer for a [`ScriptedPrompter`].
#[derive(Debug, Clone)]
pub enum Answer {
    Confirm(bool),
    Input(String),
    Select(usize),
    MultiSelect(Vec<usize>),
}

/// Scripted answer source, for driving the wizard without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Answer>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    fn next(&mut self, message: &str) -> Result<Answer> {
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted answer left for prompt: {message}"))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        match self.next(message)? {
            Answer::Confirm(value) => Ok(value),
            other => bail!("expected a confirm answer for {message:?}, got {other:?}"),
        }
    }

    fn input(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        match self.next(message)? {
            Answer::Input(value) if value.is_empty() => {
                Ok(default.unwrap_or_default().to_string())
            }
            Answer::Input(value) => Ok(value),
            other => bail!("expected an input answer for {message:?}, got {other:?}"),
        }
    }

    fn select(&mut self, message: &str, items: &[String]) -> Result<usize> {
        match self.next(message)? {
            Answer::Select(index) if index < items.len() => Ok(index),
            Answer::Select(index) => bail!("scripted selection {index} out of range for {message:?}"),
            other => bail!("expected a select answer for {message:?}, got {other:?}"),
        }
    }

    fn multi_select(&mut self, message: &str, items: &[String]) -> Result<Vec<usize>> {
        match self.next(message)? {
            Answer::MultiSelect(indices) if indices.iter().all(|&i| i < items.len()) => Ok(indices),
            Answer::MultiSelect(_) => bail!("scripted selection out of range for {message:?}"),
            other => bail!("expected a multi-select answer for {message:?}, got {other:?}"),
        }
    }
}

/// How the wizard finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome {
    /// Single-account CloudFormation quick-create link.
    TemplateLink(String),
    /// Organisation-wide stack-set quick-create link.
    StackSetLink(String),
    /// The role was created and the completion event published.
    Connected { role_arn: String },
}

/// Find credentials worth using, or `None` if the user declines.
///
/// The ambient chain is tried first; on failure or a negative confirmation
/// the user may pick a stored profile, which gets one identity check of its
/// own. Identity-check errors are swallowed so the flow can fall through to
/// the picker.
pub async fn resolve_credentials<P, S>(prompter: &mut P, source: &S) -> Result<Option<SdkConfig>>
where
    P: Prompter,
    S: CredentialSource + Sync,
{
    if let Some(config) = confirm_identity(prompter, source.ambient_identity().await)? {
        return Ok(Some(config));
    }

    if !prompter.confirm("Would you like to select another profile from your local credentials?")? {
        return Ok(None);
    }

    let profiles = source.stored_profiles()?;
    if profiles.is_empty() {
        println!("No usable profiles found in the shared credentials files");
        return Ok(None);
    }
    let labels: Vec<String> = profiles
        .iter()
        .map(|profile| format!("{} ({})", profile.name, profile.kind.as_str()))
        .collect();
    let picked = prompter.select("Select a profile", &labels)?;

    confirm_identity(
        prompter,
        source.profile_identity(&profiles[picked].name).await,
    )
}

fn confirm_identity<P: Prompter>(
    prompter: &mut P,
    identity: Result<(SdkConfig, String)>,
) -> Result<Option<SdkConfig>> {
    match identity {
        Ok((config, account)) => {
            let message = format!("Found credentials for AWS account {account}, continue?");
            if prompter.confirm(&message)? {
                Ok(Some(config))
            } else {
                Ok(None)
            }
        }
        Err(error) => {
            tracing::debug!("identity check failed: {error:#}");
            Ok(None)
        }
    }
}

/// Run the post-credential wizard to completion.
pub async fn run_wizard<P, C, I>(
    prompter: &mut P,
    cost: &C,
    identity: &I,
    target: &ConnectorTarget,
    region: &str,
    handshake: &str,
) -> Result<WizardOutcome>
where
    P: Prompter,
    C: CostApi + Sync,
    I: IdentityApi + Sync,
{
    let reports = cost.valid_reports().await?;

    let mut choices = vec!["1. Create New Report".to_string()];
    choices.extend(reports.iter().enumerate().map(|(index, report)| {
        format!(
            "{}. Name: {} S3 Bucket: {} S3 Region: {} Prefix: {}",
            index + 2,
            report.name,
            report.bucket,
            report.region,
            report.prefix
        )
    }));
    let picked = prompter.select("Select a report or choose Create New Report", &choices)?;

    let report = if picked == 0 {
        create_new_report(prompter, cost, region).await?
    } else {
        ReportLocation::from(&reports[picked - 1])
    };

    connect(prompter, cost, identity, target, region, handshake, &report).await
}

async fn create_new_report<P, C>(prompter: &mut P, cost: &C, region: &str) -> Result<ReportLocation>
where
    P: Prompter,
    C: CostApi + Sync,
{
    let create_bucket = prompter.confirm("Would you like to create an S3 bucket for the reports?")?;
    let bucket = loop {
        let name = prompter.input("S3 Bucket Name", None)?;
        match validate_bucket_name(&name) {
            Ok(()) => break name,
            Err(reason) => println!("{reason}"),
        }
    };
    if create_bucket {
        println!("Creating S3 Bucket and Policy");
        cost.create_bucket(&bucket, region).await?;
    }

    let name = prompter.input("Report Name", Some("cost-and-usage-reports"))?;
    let prefix = prompter.input("Report Prefix", Some("costs"))?;
    println!("Creating Cost and Usage Report");
    cost.create_report(&name, &bucket, region, &prefix).await?;

    Ok(ReportLocation {
        name,
        bucket,
        region: region.to_string(),
        prefix,
    })
}

async fn connect<P, C, I>(
    prompter: &mut P,
    cost: &C,
    identity: &I,
    target: &ConnectorTarget,
    region: &str,
    handshake: &str,
    report: &ReportLocation,
) -> Result<WizardOutcome>
where
    P: Prompter,
    C: CostApi + Sync,
    I: IdentityApi + Sync,
{
    let scope = prompter.select(
        "Would you like to connect the full AWS Organisation (this will enable Trusted Access) or just this account?",
        &["Organisation".to_string(), "This Account".to_string()],
    )?;

    if scope == 0 {
        let org = identity.organization().await?;
        println!(
            "Connecting organisation {} (management account {})",
            org.id, org.management_account
        );
        println!("Ensuring Trusted Access is enabled");
        identity.enable_trusted_access().await?;

        println!("Looking for organisational identifiers");
        let nodes = identity.org_nodes().await?;
        let labels: Vec<String> = nodes
            .iter()
            .map(|node| format!("{} ({})", node.name, node.id))
            .collect();
        let picked = loop {
            let selection = prompter.multi_select(
                "Select from the list of organisation roots or organisational units to connect",
                &labels,
            )?;
            if selection.is_empty() {
                println!("You must select at least one option");
            } else {
                break selection;
            }
        };
        let ou_ids: Vec<String> = picked.iter().map(|&index| nodes[index].id.clone()).collect();

        let url = links::stack_set_url(target, region, handshake, report, &ou_ids);
        return Ok(WizardOutcome::StackSetLink(url));
    }

    let method = prompter.select(
        "Would you like to use CloudFormation or this CLI to create the cross-account IAM role?",
        &["CloudFormation".to_string(), "CLI".to_string()],
    )?;
    if method == 0 {
        return Ok(WizardOutcome::TemplateLink(links::connector_url(
            target, region, handshake, report,
        )));
    }

    let role_arn = cost
        .create_role(target.principal_id, target.external_id, &report.bucket)
        .await?;
    let event = ProvisioningEvent {
        role_arn: role_arn.clone(),
        user_identifier: handshake.to_string(),
        report_bucket: report.bucket.clone(),
        report_bucket_region: report.region.clone(),
        report_name: report.name.clone(),
        report_prefix: report.prefix.clone(),
        region: region.to_string(),
    };
    cost.publish_event(target.topic_arn, &event).await?;
    Ok(WizardOutcome::Connected { role_arn })
}
