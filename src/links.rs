//! CloudFormation quick-create links
//!
//! The no-CLI connection paths hand the user a console URL that pre-fills
//! the connector stack (or stack set) with the report location and the
//! environment's fixed identifiers. Each link carries a fresh 8-character
//! correlation id.

use crate::aws::ReportLocation;
use crate::config::ConnectorTarget;

/// Stack name used by both templates.
const STACK_NAME: &str = "klouds-connector";

/// Percent-encode a query parameter value.
fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn correlation_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Quick-create URL for a single-account connector stack.
pub fn connector_url(
    target: &ConnectorTarget,
    region: &str,
    handshake: &str,
    report: &ReportLocation,
) -> String {
    connector_url_with_id(target, region, handshake, report, &correlation_id())
}

pub fn connector_url_with_id(
    target: &ConnectorTarget,
    region: &str,
    handshake: &str,
    report: &ReportLocation,
    unique_id: &str,
) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/cloudformation/home?region={region}\
         #/stacks/quickcreate?templateUrl={template}&stackName={STACK_NAME}\
         &param_ConnectorEndpoint={endpoint}&param_ConnectorExternalId={external_id}\
         &param_ConnectorPrincipalId={principal_id}&param_KloudsUserIdentifier={handshake}\
         &param_UniqueId={unique_id}&param_ReportBucket={bucket}\
         &param_ReportBucketRegion={bucket_region}&param_ReportPrefix={prefix}\
         &param_ReportName={name}",
        template = encode(target.connector_template_url),
        endpoint = encode(target.topic_arn),
        external_id = target.external_id,
        principal_id = target.principal_id,
        bucket = report.bucket,
        bucket_region = report.region,
        prefix = report.prefix,
        name = report.name,
    )
}

/// Quick-create URL for an organisation-wide stack set covering the given
/// roots and organisational units.
pub fn stack_set_url(
    target: &ConnectorTarget,
    region: &str,
    handshake: &str,
    report: &ReportLocation,
    ou_ids: &[String],
) -> String {
    stack_set_url_with_id(target, region, handshake, report, ou_ids, &correlation_id())
}

pub fn stack_set_url_with_id(
    target: &ConnectorTarget,
    region: &str,
    handshake: &str,
    report: &ReportLocation,
    ou_ids: &[String],
    unique_id: &str,
) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/cloudformation/home?region={region}\
         #/stacks/quickcreate?templateUrl={template}\
         &param_OrganizationalUnitIds={ou_ids}&stackName={STACK_NAME}\
         &param_ConnectorEndpoint={endpoint}&param_ConnectorExternalId={external_id}\
         &param_ConnectorPrincipalId={principal_id}&param_KloudsUserIdentifier={handshake}\
         &param_UniqueId={unique_id}&param_ReportBucketArn={bucket}\
         &param_ReportBucketRegion={bucket_region}&param_ReportPrefix={prefix}\
         &param_ReportName={name}",
        template = encode(target.stack_set_template_url),
        ou_ids = ou_ids.join(","),
        endpoint = encode(target.topic_arn),
        external_id = target.external_id,
        principal_id = target.principal_id,
        bucket = report.bucket,
        bucket_region = report.region,
        prefix = report.prefix,
        name = report.name,
    )
}
