//! AWS service wrappers
//!
//! This module provides everything the wizard needs from AWS:
//! - [`credentials`] - profile discovery and identity confirmation
//! - [`cost::CostService`] - report discovery and resource provisioning
//! - [`identity::IdentityService`] - account and organisation lookups
//! - [`policy`] - generated IAM policy documents
//!
//! The service structs implement [`CostApi`] and [`IdentityApi`] so the
//! wizard can be driven headless against test doubles.

use anyhow::Result;
use async_trait::async_trait;

pub mod cost;
pub mod credentials;
pub mod identity;
pub mod policy;

pub use cost::{CostReport, CostService, ProvisioningEvent, ReportLocation};
pub use credentials::{AwsCredentialSource, CredentialProfile, CredentialSource, ProfileKind, ProfileStore};
pub use identity::{IdentityService, OrgNode, OrgSummary};

/// CUR, IAM, Organizations and the connector topics are only addressable
/// from this region; report buckets may live anywhere.
pub const HOME_REGION: &str = "us-east-1";

/// Report discovery and resource provisioning operations.
#[async_trait]
pub trait CostApi {
    /// List all report definitions and return the ones klouds.io can ingest.
    async fn valid_reports(&self) -> Result<Vec<CostReport>>;

    /// Create a bucket and attach the report delivery policy to it.
    async fn create_bucket(&self, name: &str, region: &str) -> Result<()>;

    /// Create a daily gzipped csv report definition with resource ids.
    async fn create_report(&self, name: &str, bucket: &str, region: &str, prefix: &str) -> Result<()>;

    /// Create the cross-account role and return its ARN.
    async fn create_role(&self, principal_id: &str, external_id: &str, bucket: &str) -> Result<String>;

    /// Publish the completion event to the connector topic.
    async fn publish_event(&self, topic_arn: &str, event: &ProvisioningEvent) -> Result<()>;
}

/// Account and organisation lookups.
#[async_trait]
pub trait IdentityApi {
    /// The organisation the current account belongs to.
    async fn organization(&self) -> Result<OrgSummary>;

    /// Organisation roots followed by their immediate child OUs.
    async fn org_nodes(&self) -> Result<Vec<OrgNode>>;

    /// Enable trusted access for the account management service.
    async fn enable_trusted_access(&self) -> Result<()>;
}
