use pretty_assertions::assert_eq;
use tagwarden_core::gateway::Listing;
use tagwarden_core::prelude::*;
use tagwarden_test_utils::{bucket, instance, untagged_bucket, InventoryBuilder};

fn gateway() -> InMemoryGateway {
    InMemoryGateway::new(
        InventoryBuilder::new()
            .instance(instance("i-1", &[("Owner", "alice"), ("Environment", "prod")], &[]))
            .bucket(bucket("data", &[("CostCenter", "42"), ("Note", "a,b")]))
            .bucket(untagged_bucket("bare"))
            .build(),
    )
}

#[tokio::test]
async fn collects_both_types_and_writes_csv() {
    let gateway = gateway();
    let policy = RequiredTagPolicy::default();
    let mut report = TagReport::new(&policy);

    assert_eq!(report.collect::<ComputeInstance>(&gateway, &policy).await.unwrap(), 1);
    assert_eq!(report.collect::<ObjectBucket>(&gateway, &policy).await.unwrap(), 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tag_report.csv");
    assert_eq!(report.write_csv(&path).unwrap(), 3);

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "ResourceType,ResourceId,Owner,Environment,CostCenter\r\n\
         EC2,i-1,alice,prod,\r\n\
         S3,data,,,42\r\n\
         S3,bare,,,\r\n"
    );
    assert!(gateway.mutations().is_empty());
}

#[tokio::test]
async fn unreadable_bucket_is_left_out() {
    let gateway =
        gateway().with_failing_reads("data", GatewayError::AccessDenied("data".into()));
    let policy = RequiredTagPolicy::default();
    let mut report = TagReport::new(&policy);

    let added = report.collect::<ObjectBucket>(&gateway, &policy).await.unwrap();

    assert_eq!(added, 1);
    assert_eq!(report.rows()[0].resource_id.as_str(), "bare");
}

#[tokio::test]
async fn unreachable_listing_is_an_error() {
    let gateway = gateway().with_unreachable(Listing::Buckets);
    let policy = RequiredTagPolicy::default();
    let mut report = TagReport::new(&policy);

    let err = report.collect::<ObjectBucket>(&gateway, &policy).await.unwrap_err();

    assert!(err.is_transport());
    assert!(report.rows().is_empty());
}

#[tokio::test]
async fn report_from_findings_reflects_remediation() {
    let gateway = gateway();
    let settings = AuditSettings {
        policy: RequiredTagPolicy::default(),
        defaults: DefaultTagMapping::new().with("CostCenter", "7"),
        dry_run: false,
    };
    let audit = TagAuditor::new(&gateway, &settings)
        .audit::<ComputeInstance>()
        .await
        .unwrap();

    let report = TagReport::from_findings(&audit.findings, &settings.policy);

    assert_eq!(report.rows()[0].values, vec!["alice", "prod", "7"]);
}
