//! Organisation lookups
//!
//! Wraps Organizations behind [`IdentityApi`]: what the surrounding
//! organisation looks like, its roots and organisational units, and the
//! one-shot trusted-access switch an organisation-wide connection needs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use futures_util::future::try_join_all;

use crate::aws::{IdentityApi, HOME_REGION};

/// Service principal that must be granted trusted access before stack sets
/// can roll the connector out across an organisation.
const TRUSTED_SERVICE: &str = "account.amazonaws.com";

/// An organisation root or organisational unit offered for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgNode {
    pub id: String,
    pub name: String,
}

/// The organisation the current account belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgSummary {
    pub id: String,
    pub management_account: String,
}

pub struct IdentityService {
    org: aws_sdk_organizations::Client,
}

impl IdentityService {
    pub fn new(config: &SdkConfig) -> Self {
        // Organizations is only addressable from the home region.
        let org_config = aws_sdk_organizations::config::Builder::from(config)
            .region(Region::new(HOME_REGION))
            .build();
        Self {
            org: aws_sdk_organizations::Client::from_conf(org_config),
        }
    }
}

#[async_trait]
impl IdentityApi for IdentityService {
    async fn organization(&self) -> Result<OrgSummary> {
        let out = self
            .org
            .describe_organization()
            .send()
            .await
            .context("failed to describe the organisation")?;
        let org = out.organization();
        Ok(OrgSummary {
            id: org.and_then(|o| o.id()).unwrap_or_default().to_string(),
            management_account: org
                .and_then(|o| o.master_account_id())
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn org_nodes(&self) -> Result<Vec<OrgNode>> {
        let roots_out = self
            .org
            .list_roots()
            .send()
            .await
            .context("failed to list organisation roots")?;
        let roots = roots_out.roots();

        // One lookup per root, all in flight at once.
        let lookups = roots.iter().filter_map(|root| root.id()).map(|parent| {
            let client = self.org.clone();
            let parent = parent.to_string();
            async move {
                client
                    .list_organizational_units_for_parent()
                    .parent_id(parent)
                    .send()
                    .await
            }
        });
        let pages = try_join_all(lookups)
            .await
            .context("failed to list organisational units")?;

        let mut nodes: Vec<OrgNode> = roots
            .iter()
            .filter_map(|root| {
                root.id().map(|id| OrgNode {
                    id: id.to_string(),
                    name: root.name().unwrap_or_default().to_string(),
                })
            })
            .collect();
        for page in pages {
            for unit in page.organizational_units() {
                if let Some(id) = unit.id() {
                    nodes.push(OrgNode {
                        id: id.to_string(),
                        name: unit.name().unwrap_or_default().to_string(),
                    });
                }
            }
        }
        Ok(nodes)
    }

    async fn enable_trusted_access(&self) -> Result<()> {
        // Idempotent on the provider side.
        self.org
            .enable_aws_service_access()
            .service_principal(TRUSTED_SERVICE)
            .send()
            .await
            .context("failed to enable trusted access")?;
        Ok(())
    }
}
