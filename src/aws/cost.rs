//! Cost and Usage Report provisioning
//!
//! [`CostService`] owns every mutating call the wizard makes: report
//! discovery, bucket and report creation, the cross-account role, and the
//! completion event. Reports coming back from the SDK are flattened into
//! [`CostReport`] at this boundary so the rest of the crate never touches
//! SDK response types.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_costandusagereport::types::{
    AwsRegion, CompressionFormat, ReportDefinition, ReportFormat, ReportVersioning, SchemaElement,
    TimeUnit,
};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use serde::Serialize;
use std::time::Duration;

use crate::aws::policy::{connector_access_policy, connector_trust_policy, report_delivery_policy};
use crate::aws::{CostApi, HOME_REGION};

/// Managed policy attached to the connector role alongside the custom one.
const SECURITY_AUDIT_POLICY_ARN: &str = "arn:aws:iam::aws:policy/SecurityAudit";

/// IAM policy attachment is eventually consistent; the role is handed to the
/// backend immediately after creation, so give the attachment a moment to
/// propagate. A blind wait, no polling.
const ROLE_PROPAGATION_WAIT: Duration = Duration::from_secs(10);

/// A report definition, flattened from the SDK shape.
#[derive(Debug, Clone)]
pub struct CostReport {
    pub name: String,
    pub time_unit: TimeUnit,
    pub format: ReportFormat,
    pub compression: CompressionFormat,
    pub schema_elements: Vec<SchemaElement>,
    pub bucket: String,
    pub region: String,
    pub prefix: String,
}

impl CostReport {
    /// Whether this report has the shape klouds.io can ingest: daily
    /// granularity, gzipped text/csv, resource ids included.
    pub fn is_valid(&self) -> bool {
        self.time_unit == TimeUnit::Daily
            && self.format == ReportFormat::Csv
            && self.compression == CompressionFormat::Gzip
            && self.schema_elements.contains(&SchemaElement::Resources)
    }
}

impl From<&ReportDefinition> for CostReport {
    fn from(definition: &ReportDefinition) -> Self {
        Self {
            name: definition.report_name().to_string(),
            time_unit: definition.time_unit().clone(),
            format: definition.format().clone(),
            compression: definition.compression().clone(),
            schema_elements: definition.additional_schema_elements().to_vec(),
            bucket: definition.s3_bucket().to_string(),
            region: definition.s3_region().as_str().to_string(),
            prefix: definition.s3_prefix().to_string(),
        }
    }
}

/// Where the selected (or freshly created) report lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLocation {
    pub name: String,
    pub bucket: String,
    pub region: String,
    pub prefix: String,
}

impl From<&CostReport> for ReportLocation {
    fn from(report: &CostReport) -> Self {
        Self {
            name: report.name.clone(),
            bucket: report.bucket.clone(),
            region: report.region.clone(),
            prefix: report.prefix.clone(),
        }
    }
}

/// Completion event published to the connector topic. Fire-and-forget.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisioningEvent {
    pub role_arn: String,
    pub user_identifier: String,
    pub report_bucket: String,
    pub report_bucket_region: String,
    pub report_name: String,
    pub report_prefix: String,
    pub region: String,
}

pub struct CostService {
    s3: aws_sdk_s3::Client,
    iam: aws_sdk_iam::Client,
    sns: aws_sdk_sns::Client,
    cur: aws_sdk_costandusagereport::Client,
}

impl CostService {
    /// Build the service clients from one explicit configuration.
    ///
    /// CUR, IAM and the connector topics are all served out of the home
    /// region regardless of where the report bucket lives, so every client
    /// is pinned there; bucket placement goes through a location constraint
    /// instead.
    pub fn new(config: &SdkConfig) -> Self {
        let home = Region::new(HOME_REGION);
        let s3_config = aws_sdk_s3::config::Builder::from(config)
            .region(home.clone())
            .build();
        let iam_config = aws_sdk_iam::config::Builder::from(config)
            .region(home.clone())
            .build();
        let sns_config = aws_sdk_sns::config::Builder::from(config)
            .region(home.clone())
            .build();
        let cur_config = aws_sdk_costandusagereport::config::Builder::from(config)
            .region(home)
            .build();
        Self {
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            iam: aws_sdk_iam::Client::from_conf(iam_config),
            sns: aws_sdk_sns::Client::from_conf(sns_config),
            cur: aws_sdk_costandusagereport::Client::from_conf(cur_config),
        }
    }
}

#[async_trait]
impl CostApi for CostService {
    async fn valid_reports(&self) -> Result<Vec<CostReport>> {
        let mut pages = self.cur.describe_report_definitions().into_paginator().send();
        let mut all = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.context("failed to list report definitions")?;
            all.extend(page.report_definitions().iter().map(CostReport::from));
        }

        let valid: Vec<CostReport> = all.iter().filter(|report| report.is_valid()).cloned().collect();
        println!(
            "Found {} daily gzipped csv reports with resource ids enabled out of a total of {} reports",
            valid.len(),
            all.len()
        );
        Ok(valid)
    }

    async fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        let mut request = self.s3.create_bucket().bucket(name);
        if region != "us-east-1" {
            let constraint = BucketLocationConstraint::from(region);
            let configuration = CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build();
            request = request.create_bucket_configuration(configuration);
        }
        request
            .send()
            .await
            .with_context(|| format!("failed to create bucket {name}"))?;

        // No rollback: if this fails the bucket is left behind and the
        // error propagates.
        let policy = report_delivery_policy(name)
            .to_json()
            .context("failed to serialize the bucket policy")?;
        self.s3
            .put_bucket_policy()
            .bucket(name)
            .policy(policy)
            .send()
            .await
            .with_context(|| format!("failed to attach the delivery policy to bucket {name}"))?;
        Ok(())
    }

    async fn create_report(&self, name: &str, bucket: &str, region: &str, prefix: &str) -> Result<()> {
        let definition = ReportDefinition::builder()
            .report_name(name)
            .time_unit(TimeUnit::Daily)
            .format(ReportFormat::Csv)
            .compression(CompressionFormat::Gzip)
            .additional_schema_elements(SchemaElement::Resources)
            .s3_bucket(bucket)
            .s3_prefix(prefix)
            .s3_region(AwsRegion::from(region))
            .refresh_closed_reports(true)
            .report_versioning(ReportVersioning::OverwriteReport)
            .build()
            .context("invalid report definition")?;
        self.cur
            .put_report_definition()
            .report_definition(definition)
            .send()
            .await
            .with_context(|| format!("failed to create report {name}"))?;
        Ok(())
    }

    async fn create_role(&self, principal_id: &str, external_id: &str, bucket: &str) -> Result<String> {
        let suffix = random_suffix();
        let role_name = format!("klouds-connector-{suffix}");

        let trust = connector_trust_policy(principal_id, external_id)
            .to_json()
            .context("failed to serialize the trust policy")?;
        let created = self
            .iam
            .create_role()
            .role_name(&role_name)
            .assume_role_policy_document(trust)
            .send()
            .await
            .with_context(|| format!("failed to create role {role_name}"))?;
        let role_arn = created
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| anyhow!("CreateRole returned no role"))?;

        self.iam
            .attach_role_policy()
            .role_name(&role_name)
            .policy_arn(SECURITY_AUDIT_POLICY_ARN)
            .send()
            .await
            .context("failed to attach the SecurityAudit policy")?;

        let access = connector_access_policy(bucket)
            .to_json()
            .context("failed to serialize the access policy")?;
        let policy = self
            .iam
            .create_policy()
            .policy_name(format!("klouds-connector-access-{suffix}"))
            .policy_document(access)
            .send()
            .await
            .context("failed to create the access policy")?;
        let policy_arn = policy
            .policy()
            .and_then(|policy| policy.arn())
            .ok_or_else(|| anyhow!("CreatePolicy returned no ARN"))?;
        self.iam
            .attach_role_policy()
            .role_name(&role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .context("failed to attach the access policy")?;

        tokio::time::sleep(ROLE_PROPAGATION_WAIT).await;
        Ok(role_arn)
    }

    async fn publish_event(&self, topic_arn: &str, event: &ProvisioningEvent) -> Result<()> {
        let payload =
            serde_json::to_string(event).context("failed to serialize the provisioning event")?;
        self.sns
            .publish()
            .topic_arn(topic_arn)
            .message(payload)
            .send()
            .await
            .with_context(|| format!("failed to publish the connection event to {topic_arn}"))?;
        Ok(())
    }
}

fn random_suffix() -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}

/// S3 bucket naming rules, checked before any API call is made.
pub fn validate_bucket_name(input: &str) -> Result<(), String> {
    if input.is_empty() {
        return Err("Bucket name cannot be empty".to_string());
    }
    if input.len() < 3 || input.len() > 63 {
        return Err("Bucket name must be 3-63 characters".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Bucket name must contain only lowercase letters, numbers, and hyphens".to_string());
    }
    if input.starts_with('-') || input.ends_with('-') {
        return Err("Bucket name cannot start or end with a hyphen".to_string());
    }
    Ok(())
}
