//! IAM policy document generation
//!
//! All three documents the connector needs are generated here and serialized
//! to JSON at the call site: the bucket delivery policy for the billing
//! service, the cross-account trust policy, and the least-privilege access
//! policy attached to the connector role.

use serde::Serialize;
use serde_json::json;

const POLICY_VERSION: &str = "2012-10-17";

/// Service principal AWS uses to deliver Cost and Usage Reports.
const BILLING_PRINCIPAL: &str = "billingreports.amazonaws.com";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub enum Principal {
    #[serde(rename = "Service")]
    Service(String),
    #[serde(rename = "AWS")]
    Aws(String),
}

impl PolicyDocument {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn allow(principal: Option<Principal>, action: &[&str], resource: Vec<String>) -> Statement {
    Statement {
        effect: "Allow",
        principal,
        action: action.iter().map(|a| a.to_string()).collect(),
        resource,
        condition: None,
    }
}

/// Bucket policy letting the billing service inspect the bucket and deliver
/// report objects into it.
pub fn report_delivery_policy(bucket: &str) -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION,
        statement: vec![
            allow(
                Some(Principal::Service(BILLING_PRINCIPAL.to_string())),
                &["s3:GetBucketAcl", "s3:GetBucketPolicy"],
                vec![format!("arn:aws:s3:::{bucket}")],
            ),
            allow(
                Some(Principal::Service(BILLING_PRINCIPAL.to_string())),
                &["s3:PutObject"],
                vec![format!("arn:aws:s3:::{bucket}/*")],
            ),
        ],
    }
}

/// Trust policy for the cross-account role. Assumption is only allowed for
/// sessions of the configured principal, and only when the caller presents
/// the configured external id.
pub fn connector_trust_policy(principal_id: &str, external_id: &str) -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION,
        statement: vec![Statement {
            effect: "Allow",
            principal: Some(Principal::Aws("*".to_string())),
            action: vec!["sts:AssumeRole".to_string()],
            resource: Vec::new(),
            condition: Some(json!({
                "StringEquals": { "sts:ExternalId": external_id },
                "StringLike": { "aws:userId": format!("{principal_id}:*") },
            })),
        }],
    }
}

/// Access policy attached to the connector role: read the report definitions
/// and the contents of the report bucket, nothing else.
pub fn connector_access_policy(bucket: &str) -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION,
        statement: vec![
            allow(None, &["cur:DescribeReportDefinitions"], vec!["*".to_string()]),
            allow(
                None,
                &["s3:ListBucket"],
                vec![format!("arn:aws:s3:::{bucket}")],
            ),
            allow(
                None,
                &["s3:GetObject"],
                vec![format!("arn:aws:s3:::{bucket}/*")],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_policy_has_exactly_two_statements() {
        let policy = report_delivery_policy("x");
        assert_eq!(policy.statement.len(), 2);

        let inspect = &policy.statement[0];
        assert_eq!(inspect.action, vec!["s3:GetBucketAcl", "s3:GetBucketPolicy"]);
        assert_eq!(inspect.resource, vec!["arn:aws:s3:::x"]);

        let deliver = &policy.statement[1];
        assert_eq!(deliver.action, vec!["s3:PutObject"]);
        assert_eq!(deliver.resource, vec!["arn:aws:s3:::x/*"]);
    }

    #[test]
    fn test_delivery_policy_grants_billing_service() {
        let value: serde_json::Value =
            serde_json::from_str(&report_delivery_policy("reports").to_json().unwrap()).unwrap();
        for statement in value["Statement"].as_array().unwrap() {
            assert_eq!(
                statement["Principal"]["Service"],
                "billingreports.amazonaws.com"
            );
            assert_eq!(statement["Effect"], "Allow");
        }
        assert_eq!(value["Version"], "2012-10-17");
    }

    #[test]
    fn test_trust_policy_is_deterministic() {
        let a = connector_trust_policy("AROA123", "ext-id").to_json().unwrap();
        let b = connector_trust_policy("AROA123", "ext-id").to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trust_policy_pins_external_id_and_principal() {
        let value: serde_json::Value =
            serde_json::from_str(&connector_trust_policy("AROA123", "ext-id").to_json().unwrap())
                .unwrap();
        let statements = value["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 1);
        let statement = &statements[0];
        assert_eq!(statement["Action"][0], "sts:AssumeRole");
        assert_eq!(
            statement["Condition"]["StringEquals"]["sts:ExternalId"],
            "ext-id"
        );
        assert_eq!(
            statement["Condition"]["StringLike"]["aws:userId"],
            "AROA123:*"
        );
    }

    #[test]
    fn test_access_policy_scoped_to_bucket() {
        let policy = connector_access_policy("my-bucket");
        let resources: Vec<&str> = policy
            .statement
            .iter()
            .flat_map(|s| s.resource.iter().map(String::as_str))
            .collect();
        assert!(resources.contains(&"arn:aws:s3:::my-bucket"));
        assert!(resources.contains(&"arn:aws:s3:::my-bucket/*"));
        assert!(policy
            .statement
            .iter()
            .all(|s| s.action.iter().all(|a| a.starts_with("cur:") || a.starts_with("s3:"))));
    }

    #[test]
    fn test_statement_serialization_skips_empty_fields() {
        let value: serde_json::Value =
            serde_json::from_str(&connector_access_policy("b").to_json().unwrap()).unwrap();
        let statement = &value["Statement"][0];
        assert!(statement.get("Principal").is_none());
        assert!(statement.get("Condition").is_none());
    }
}
