//! Connector environment configuration
//!
//! The connector talks to one of two klouds.io deployments. Each deployment
//! pins its own SNS topic, assuming principal and CloudFormation template
//! URLs; the external id is shared. Nothing here is read from disk — the
//! environment is selected on the command line and everything else follows
//! from it.

use clap::ValueEnum;
use std::fmt;

/// Which klouds.io deployment to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Dev,
    Prod,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Dev => write!(f, "dev"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

/// Fixed identifiers for one klouds.io deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorTarget {
    /// Unique id of the klouds.io role that will assume the cross-account role.
    pub principal_id: &'static str,
    /// External id the assuming principal must present.
    pub external_id: &'static str,
    /// SNS topic the completion event is published to.
    pub topic_arn: &'static str,
    /// Quick-create template for a single-account connection.
    pub connector_template_url: &'static str,
    /// Quick-create template for an organisation-wide stack set.
    pub stack_set_template_url: &'static str,
    /// Region used when `--region` is not given.
    pub default_region: &'static str,
}

/// Both deployments share one external id.
const EXTERNAL_ID: &str = "741bef1f-594a-40a5-99b3-8fe3cf29e9a0";

const DEV: ConnectorTarget = ConnectorTarget {
    principal_id: "AROAZUK5T2MB6I655JA67",
    external_id: EXTERNAL_ID,
    topic_arn: "arn:aws:sns:us-east-1:662158168835:klouds-connection-connector-dev",
    connector_template_url: "https://klouds-user-template.s3.eu-west-1.amazonaws.com/end-to-end-manual.json",
    stack_set_template_url: "https://klouds-user-template.s3.eu-west-1.amazonaws.com/klouds-stack-set-with-cost-reports.json",
    default_region: "eu-west-2",
};

const PROD: ConnectorTarget = ConnectorTarget {
    principal_id: "AROAQX6R4Q4KCQSNZ62HA",
    external_id: EXTERNAL_ID,
    topic_arn: "arn:aws:sns:us-east-1:051442910996:klouds-connection-connector-prod",
    connector_template_url: "https://klouds-user-template.s3.eu-west-1.amazonaws.com/end-to-end-manual.json",
    stack_set_template_url: "https://klouds-user-template.s3.eu-west-1.amazonaws.com/klouds-stack-set-with-cost-reports.json",
    default_region: "us-east-1",
};

impl Environment {
    /// Resolve the fixed identifiers for this deployment.
    pub fn target(self) -> &'static ConnectorTarget {
        match self {
            Environment::Dev => &DEV,
            Environment::Prod => &PROD,
        }
    }
}
