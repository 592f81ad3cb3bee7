use pretty_assertions::assert_eq;
use std::io::Write;
use tagwarden_core::gateway::InstanceState;
use tagwarden_core::prelude::*;

const YAML_INVENTORY: &str = r#"
instances:
  - id: i-1
    state: stopped
    tags:
      - { Key: Owner, Value: alice }
    volumes: [vol-1]
buckets:
  - name: logs
  - name: data
    tags:
      - { Key: Project, Value: a }
snapshots:
  - id: snap-1
    volume_id: vol-1
    created_at: 2026-03-01T00:00:00Z
users:
  - name: bob
    mfa_devices: ["arn:mfa/bob"]
"#;

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn yaml_inventory_loads_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "inventory.yaml", YAML_INVENTORY);

    let inventory = Inventory::load(&path).unwrap();

    assert_eq!(inventory.instances[0].state, InstanceState::Stopped);
    assert!(inventory.buckets[0].tags.is_none());
    assert_eq!(inventory.snapshots[0].owner, "self");
    assert!(inventory.users[0].password_last_used.is_none());
}

#[test]
fn saved_json_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = Inventory::from_yaml_str(YAML_INVENTORY).unwrap();
    let path = dir.path().join("state.json");

    inventory.save(&path).unwrap();

    assert_eq!(Inventory::load(&path).unwrap(), inventory);
}

#[test]
fn malformed_inventory_is_an_inventory_error() {
    let err = Inventory::from_json_str("{\"instances\": 3}").unwrap_err();
    assert!(matches!(err, GovernanceError::Inventory(_)));
}

#[test]
fn config_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "tagwarden.toml",
        "required_tags = [\"Owner\", \"Team\"]\nretention_days = 30\n\n[default_tags]\nTeam = \"infra\"\n",
    );

    let config = GovernanceConfig::load(&path).unwrap();

    assert_eq!(config.required_tags.keys().collect::<Vec<_>>(), vec!["Owner", "Team"]);
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.snapshot_settings().retention.days(), 30);
    assert_eq!(config.audit_settings().defaults.get("Team"), Some("infra"));
}

#[test]
fn missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GovernanceConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, GovernanceError::Io(_)));
}

#[test]
fn malformed_auto_tag_is_rejected() {
    let err = DefaultTagMapping::parse_pairs(["Owner=alice", "Environment"]).unwrap_err();
    assert!(matches!(err, GovernanceError::Config(_)));

    let parsed = DefaultTagMapping::parse_pairs(["Owner=alice", "Url=a=b"]).unwrap();
    assert_eq!(parsed.get("Url"), Some("a=b"));
}

#[test]
fn bundled_demo_documents_parse() {
    let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");

    let inventory = Inventory::load(&demos.join("inventory.yaml")).unwrap();
    assert_eq!(inventory.instances.len(), 2);
    assert!(inventory.buckets[1].tags.is_none());

    let config = GovernanceConfig::load(&demos.join("tagwarden.toml")).unwrap();
    assert_eq!(config.default_tags.get("CostCenter"), Some("0000"));
}
