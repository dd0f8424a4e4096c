//! Headless wizard runs against scripted answers and AWS test doubles.

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_costandusagereport::types::{CompressionFormat, ReportFormat, SchemaElement, TimeUnit};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use klouds_connector::aws::{
    CostApi, CostReport, IdentityApi, OrgNode, OrgSummary, ProvisioningEvent,
};
use klouds_connector::config::Environment;
use klouds_connector::wizard::{run_wizard, Answer, ScriptedPrompter, WizardOutcome};

#[derive(Default)]
struct MockCost {
    reports: Vec<CostReport>,
    created_buckets: Mutex<Vec<(String, String)>>,
    created_reports: Mutex<Vec<(String, String, String, String)>>,
    created_roles: Mutex<Vec<(String, String, String)>>,
    published: Mutex<Vec<(String, ProvisioningEvent)>>,
}

impl MockCost {
    fn with_report(name: &str, bucket: &str, region: &str, prefix: &str) -> Self {
        Self {
            reports: vec![CostReport {
                name: name.to_string(),
                time_unit: TimeUnit::Daily,
                format: ReportFormat::Csv,
                compression: CompressionFormat::Gzip,
                schema_elements: vec![SchemaElement::Resources],
                bucket: bucket.to_string(),
                region: region.to_string(),
                prefix: prefix.to_string(),
            }],
            ..Self::default()
        }
    }
}

#[async_trait]
impl CostApi for MockCost {
    async fn valid_reports(&self) -> Result<Vec<CostReport>> {
        Ok(self.reports.clone())
    }

    async fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        self.created_buckets
            .lock()
            .unwrap()
            .push((name.to_string(), region.to_string()));
        Ok(())
    }

    async fn create_report(&self, name: &str, bucket: &str, region: &str, prefix: &str) -> Result<()> {
        self.created_reports.lock().unwrap().push((
            name.to_string(),
            bucket.to_string(),
            region.to_string(),
            prefix.to_string(),
        ));
        Ok(())
    }

    async fn create_role(&self, principal_id: &str, external_id: &str, bucket: &str) -> Result<String> {
        self.created_roles.lock().unwrap().push((
            principal_id.to_string(),
            external_id.to_string(),
            bucket.to_string(),
        ));
        Ok("arn:aws:iam::111122223333:role/klouds-connector-test".to_string())
    }

    async fn publish_event(&self, topic_arn: &str, event: &ProvisioningEvent) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((topic_arn.to_string(), event.clone()));
        Ok(())
    }
}

struct MockIdentity {
    nodes: Vec<OrgNode>,
    trusted_access_calls: AtomicUsize,
}

impl MockIdentity {
    fn new(nodes: Vec<OrgNode>) -> Self {
        Self {
            nodes,
            trusted_access_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityApi for MockIdentity {
    async fn organization(&self) -> Result<OrgSummary> {
        Ok(OrgSummary {
            id: "o-example".to_string(),
            management_account: "111122223333".to_string(),
        })
    }

    async fn org_nodes(&self) -> Result<Vec<OrgNode>> {
        Ok(self.nodes.clone())
    }

    async fn enable_trusted_access(&self) -> Result<()> {
        self.trusted_access_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_existing_report_cli_connection_creates_role_and_publishes_once() {
    let cost = MockCost::with_report("cost-and-usage-reports", "my-bucket", "us-east-1", "costs");
    let identity = MockIdentity::new(Vec::new());
    let target = Environment::Prod.target();
    let mut prompter = ScriptedPrompter::new([
        Answer::Select(1), // the one existing report (index 0 is "create new")
        Answer::Select(1), // This Account
        Answer::Select(1), // CLI
    ]);

    let outcome = run_wizard(&mut prompter, &cost, &identity, target, "us-east-1", "handshake-1")
        .await
        .unwrap();

    assert!(matches!(outcome, WizardOutcome::Connected { .. }));

    let roles = cost.created_roles.lock().unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(
        roles[0],
        (
            target.principal_id.to_string(),
            target.external_id.to_string(),
            "my-bucket".to_string()
        )
    );

    let published = cost.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    let (topic, event) = &published[0];
    assert_eq!(topic, target.topic_arn);
    assert_eq!(event.report_bucket, "my-bucket");
    assert_eq!(event.report_prefix, "costs");
    assert_eq!(event.report_name, "cost-and-usage-reports");
    assert_eq!(event.user_identifier, "handshake-1");
}

#[tokio::test]
async fn test_cloudformation_connection_makes_no_mutating_calls() {
    let cost = MockCost::with_report("cost-and-usage-reports", "my-bucket", "eu-west-1", "costs");
    let identity = MockIdentity::new(Vec::new());
    let mut prompter = ScriptedPrompter::new([
        Answer::Select(1), // the existing report
        Answer::Select(1), // This Account
        Answer::Select(0), // CloudFormation
    ]);

    let outcome = run_wizard(
        &mut prompter,
        &cost,
        &identity,
        Environment::Prod.target(),
        "us-east-1",
        "handshake-1",
    )
    .await
    .unwrap();

    let WizardOutcome::TemplateLink(url) = outcome else {
        panic!("expected a template link");
    };
    assert!(url.contains("param_ReportBucket=my-bucket"));
    assert!(url.contains("param_ReportBucketRegion=eu-west-1"));
    assert!(url.contains("param_KloudsUserIdentifier=handshake-1"));

    assert!(cost.created_roles.lock().unwrap().is_empty());
    assert!(cost.published.lock().unwrap().is_empty());
    assert!(cost.created_buckets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_new_report_provisions_bucket_and_report() {
    let cost = MockCost::default();
    let identity = MockIdentity::new(Vec::new());
    let mut prompter = ScriptedPrompter::new([
        Answer::Select(0),                        // Create New Report
        Answer::Confirm(true),                    // create the bucket
        Answer::Input("Bad_Bucket".to_string()),  // rejected by validation
        Answer::Input("my-new-bucket".to_string()),
        Answer::Input(String::new()),             // default report name
        Answer::Input(String::new()),             // default prefix
        Answer::Select(1),                        // This Account
        Answer::Select(0),                        // CloudFormation
    ]);

    let outcome = run_wizard(
        &mut prompter,
        &cost,
        &identity,
        Environment::Prod.target(),
        "eu-west-2",
        "handshake-2",
    )
    .await
    .unwrap();

    let buckets = cost.created_buckets.lock().unwrap();
    assert_eq!(buckets.as_slice(), &[("my-new-bucket".to_string(), "eu-west-2".to_string())]);

    let reports = cost.created_reports.lock().unwrap();
    assert_eq!(
        reports.as_slice(),
        &[(
            "cost-and-usage-reports".to_string(),
            "my-new-bucket".to_string(),
            "eu-west-2".to_string(),
            "costs".to_string()
        )]
    );

    let WizardOutcome::TemplateLink(url) = outcome else {
        panic!("expected a template link");
    };
    assert!(url.contains("param_ReportBucket=my-new-bucket"));
    assert!(url.contains("param_ReportName=cost-and-usage-reports"));
}

#[tokio::test]
async fn test_existing_bucket_is_reused_without_creation() {
    let cost = MockCost::default();
    let identity = MockIdentity::new(Vec::new());
    let mut prompter = ScriptedPrompter::new([
        Answer::Select(0),                          // Create New Report
        Answer::Confirm(false),                     // bucket already exists
        Answer::Input("existing-bucket".to_string()),
        Answer::Input("my-report".to_string()),
        Answer::Input("billing".to_string()),
        Answer::Select(1),                          // This Account
        Answer::Select(0),                          // CloudFormation
    ]);

    run_wizard(
        &mut prompter,
        &cost,
        &identity,
        Environment::Prod.target(),
        "us-east-1",
        "handshake-3",
    )
    .await
    .unwrap();

    assert!(cost.created_buckets.lock().unwrap().is_empty());
    let reports = cost.created_reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "my-report");
    assert_eq!(reports[0].1, "existing-bucket");
}

#[tokio::test]
async fn test_organisation_connection_enables_trusted_access_and_links_stack_set() {
    let cost = MockCost::with_report("cost-and-usage-reports", "my-bucket", "us-east-1", "costs");
    let identity = MockIdentity::new(vec![
        OrgNode {
            id: "r-abcd".to_string(),
            name: "Root".to_string(),
        },
        OrgNode {
            id: "ou-abcd-11112222".to_string(),
            name: "Platform".to_string(),
        },
    ]);
    let mut prompter = ScriptedPrompter::new([
        Answer::Select(1),              // the existing report
        Answer::Select(0),              // Organisation
        Answer::MultiSelect(Vec::new()), // nothing picked: re-prompted
        Answer::MultiSelect(vec![0, 1]),
    ]);

    let outcome = run_wizard(
        &mut prompter,
        &cost,
        &identity,
        Environment::Dev.target(),
        "us-east-1",
        "handshake-4",
    )
    .await
    .unwrap();

    assert_eq!(identity.trusted_access_calls.load(Ordering::SeqCst), 1);

    let WizardOutcome::StackSetLink(url) = outcome else {
        panic!("expected a stack set link");
    };
    assert!(url.contains("param_OrganizationalUnitIds=r-abcd,ou-abcd-11112222"));
    assert!(url.contains("klouds-stack-set-with-cost-reports.json"));
    // Dev environment wiring ends up in the link.
    assert!(url.contains("662158168835"));

    assert!(cost.created_roles.lock().unwrap().is_empty());
    assert!(cost.published.lock().unwrap().is_empty());
}
