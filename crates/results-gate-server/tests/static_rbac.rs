// crates/results-gate-server/tests/static_rbac.rs
// ============================================================================
// Module: Static RBAC Tests
// Description: Role and binding evaluation for standalone deployments.
// Purpose: Validate namespace scoping, wildcards, and resource names.
// Dependencies: results-gate-server, results-gate-config, toml
// ============================================================================

//! Static RBAC authority tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use results_gate_config::ResultsGateConfig;
use results_gate_config::config_toml_example;
use results_gate_core::AuthorizationTuple;
use results_gate_core::CallIdentity;
use results_gate_core::CredentialKind;
use results_gate_core::ResourceType;
use results_gate_core::Verb;
use results_gate_server::RbacAuthority;
use results_gate_server::StaticRbacAuthority;

fn authority(toml_str: &str) -> StaticRbacAuthority {
    let config: ResultsGateConfig = toml::from_str(toml_str).unwrap();
    config.validate().unwrap();
    StaticRbacAuthority::from_config(&config.rbac)
}

fn user(subject: &str, groups: &[&str]) -> CallIdentity {
    CallIdentity::new(subject, CredentialKind::StaticToken)
        .unwrap()
        .with_groups(groups.iter().copied())
}

fn tuple(namespace: &str, resource: ResourceType, verb: Verb) -> AuthorizationTuple {
    AuthorizationTuple::new(namespace, resource, verb)
}

const RULES: &str = r#"
[[rbac.roles]]
name = "editor"
[[rbac.roles.rules]]
resources = ["results", "records"]
verbs = ["*"]

[[rbac.roles]]
name = "viewer"
[[rbac.roles.rules]]
resources = ["*"]
verbs = ["get", "list"]

[[rbac.roles]]
name = "pinned"
[[rbac.roles.rules]]
resources = ["results"]
verbs = ["get"]
resource_names = ["golden"]

[[rbac.bindings]]
role = "editor"
namespace = "team-a"
users = ["svc:ci"]

[[rbac.bindings]]
role = "viewer"
groups = ["auditors"]

[[rbac.bindings]]
role = "pinned"
namespace = "team-b"
users = ["svc:probe"]
"#;

#[test]
fn namespace_binding_does_not_leak() {
    let rbac = authority(RULES);
    let ci = user("svc:ci", &[]);
    assert!(rbac.evaluate(&ci, &tuple("team-a", ResourceType::Record, Verb::Delete)).allowed);
    assert!(!rbac.evaluate(&ci, &tuple("team-b", ResourceType::Record, Verb::Get)).allowed);
}

#[test]
fn cluster_binding_applies_to_groups_everywhere() {
    let rbac = authority(RULES);
    let auditor = user("alice", &["auditors"]);
    for namespace in ["team-a", "team-b", "default"] {
        let list = tuple(namespace, ResourceType::Result, Verb::List);
        let update = tuple(namespace, ResourceType::Result, Verb::Update);
        assert!(rbac.evaluate(&auditor, &list).allowed);
        assert!(!rbac.evaluate(&auditor, &update).allowed);
    }
}

#[test]
fn resource_names_restrict_named_access() {
    let rbac = authority(RULES);
    let probe = user("svc:probe", &[]);
    let golden = tuple("team-b", ResourceType::Result, Verb::Get).with_resource_name("golden");
    let other = tuple("team-b", ResourceType::Result, Verb::Get).with_resource_name("other");
    let unnamed = tuple("team-b", ResourceType::Result, Verb::Get);
    assert!(rbac.evaluate(&probe, &golden).allowed);
    assert!(!rbac.evaluate(&probe, &other).allowed);
    assert!(!rbac.evaluate(&probe, &unnamed).allowed);
}

#[test]
fn unbound_subjects_are_denied_with_reason() {
    let rbac = authority(RULES);
    let get = tuple("team-a", ResourceType::Result, Verb::Get);
    let decision = rbac.evaluate(&user("mallory", &[]), &get);
    assert!(!decision.allowed);
    assert!(decision.reason.is_some());
}

#[test]
fn empty_rbac_denies_everything() {
    let rbac = authority("");
    let get = tuple("x", ResourceType::Result, Verb::Get);
    let decision = rbac.evaluate(&user("svc:ci", &["system:masters"]), &get);
    assert!(!decision.allowed);
}

#[tokio::test]
async fn example_config_grants_writer_and_reader_roles() {
    let rbac = authority(&config_toml_example());
    let writer = user("svc:writer", &["writers"]);
    let reader = user("svc:reader", &["readers"]);
    let create = tuple("default", ResourceType::Result, Verb::Create);
    let delete = tuple("default", ResourceType::Result, Verb::Delete);
    let list = tuple("default", ResourceType::Record, Verb::List);
    assert!(rbac.authorize(&writer, &create).await.unwrap().allowed);
    assert!(!rbac.authorize(&reader, &delete).await.unwrap().allowed);
    assert!(rbac.authorize(&reader, &list).await.unwrap().allowed);
}
