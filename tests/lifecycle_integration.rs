//! End-to-end lifecycle scenarios through the dispatcher, backed by the
//! in-memory action provider.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

use resource_reconciler::config::MAX_POLICY_VERSIONS;
use resource_reconciler::infra::secrets::StaticSecretProvider;
use resource_reconciler::providers::{InMemoryActions, PlatformKind};
use resource_reconciler::reconcile::{Dispatcher, LifecycleResponse};
use resource_reconciler::ReconcileResult;

struct Harness {
    actions: Arc<InMemoryActions>,
    secrets: Arc<StaticSecretProvider>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new(page_size: usize) -> Self {
        let actions = Arc::new(InMemoryActions::new().with_page_size(page_size));
        let secrets = Arc::new(
            StaticSecretProvider::new()
                .with_secret("prod/fcm", r#"{"serverKey":"abc"}"#)
                .with_secret("prod/apns", r#"{"signingKey":"-----KEY-----","teamId":"TEAM42"}"#),
        );
        let dispatcher = Dispatcher::new(actions.clone(), actions.clone(), secrets.clone());
        Self {
            actions,
            secrets,
            dispatcher,
        }
    }

    async fn send(&self, event: Value) -> ReconcileResult<LifecycleResponse> {
        self.dispatcher.handle_json(&event.to_string()).await
    }
}

fn policy_props(document: Value) -> Value {
    json!({
        "ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:reconciler",
        "policyName": "greengrass-core",
        "policyDocument": document
    })
}

fn fcm_props(name: &str) -> Value {
    json!({
        "name": name,
        "platform": "GCM",
        "firebaseCloudMessagingServerKeySecretName": "prod/fcm"
    })
}

#[tokio::test]
async fn policy_full_lifecycle() {
    let h = Harness::new(100);

    let created = h
        .send(json!({
            "RequestType": "Create",
            "ResourceType": "Custom::VersionedIoTPolicy",
            "RequestId": "req-1",
            "LogicalResourceId": "CorePolicy",
            "ResourceProperties": policy_props(json!({"rev": 0}))
        }))
        .await
        .unwrap();
    assert_eq!(created.physical_resource_id, "VersionedPolicy:greengrass-core");
    assert_eq!(created.data["createdPolicyVersion"], "1");

    let mut last_evicted = Vec::new();
    for rev in 1..=7 {
        let updated = h
            .send(json!({
                "RequestType": "Update",
                "ResourceType": "Custom::VersionedIoTPolicy",
                "PhysicalResourceId": created.physical_resource_id,
                "ResourceProperties": policy_props(json!({"rev": rev})),
                "OldResourceProperties": policy_props(json!({"rev": rev - 1}))
            }))
            .await
            .unwrap();

        assert_eq!(updated.physical_resource_id, created.physical_resource_id);
        assert_eq!(updated.data["createdPolicyVersion"], (rev + 1).to_string());
        last_evicted.push(updated.data["deletedPolicyVersion"].clone());
        assert!(h.actions.policy_versions("greengrass-core").len() <= MAX_POLICY_VERSIONS);
    }

    // The first four updates fill the cap; each later one evicts the oldest version.
    assert_eq!(last_evicted, vec!["", "", "", "", "1", "2", "3"]);

    let deleted = h
        .send(json!({
            "RequestType": "Delete",
            "ResourceType": "Custom::VersionedIoTPolicy",
            "PhysicalResourceId": created.physical_resource_id,
            "ResourceProperties": policy_props(json!({"rev": 7}))
        }))
        .await
        .unwrap();
    assert_eq!(deleted.data["deletedPolicyVersion"], "*");
    assert!(!h.actions.policy_exists("greengrass-core"));
}

#[tokio::test]
async fn platform_application_redelivery_converges() {
    let h = Harness::new(3);
    for filler in ["alpha", "beta", "gamma", "delta"] {
        h.send(json!({"RequestType": "Create", "ResourceProperties": fcm_props(filler)}))
            .await
            .unwrap();
    }

    let create = json!({
        "RequestType": "Create",
        "ResourceType": "Custom::SNSPlatformApplicationFirebase",
        "ResourceProperties": fcm_props("app1")
    });
    let first = h.send(create.clone()).await.unwrap();
    let second = h.send(create).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.actions.application_count(), 5);
    assert_eq!(
        h.actions.application_attributes("app1", PlatformKind::Gcm).unwrap()["PlatformCredential"],
        "abc"
    );

    let delete = json!({
        "RequestType": "Delete",
        "ResourceType": "Custom::SNSPlatformApplicationFirebase",
        "PhysicalResourceId": first.physical_resource_id,
        "ResourceProperties": fcm_props("app1")
    });
    let removed = h.send(delete.clone()).await.unwrap();
    assert_eq!(removed.data["platformApplicationArn"], first.data["platformApplicationArn"]);

    let redelivered = h.send(delete).await.unwrap();
    assert_eq!(redelivered.data["platformApplicationArn"], "");
    assert_eq!(h.actions.application_count(), 4);
}

#[tokio::test]
async fn secret_rotation_flows_through_update() {
    let h = Harness::new(100);
    let created = h
        .send(json!({"RequestType": "Create", "ResourceProperties": fcm_props("app1")}))
        .await
        .unwrap();

    h.secrets.insert("prod/fcm", "rotated-server-key");
    let updated = h
        .send(json!({
            "RequestType": "Update",
            "PhysicalResourceId": created.physical_resource_id,
            "ResourceProperties": fcm_props("app1"),
            "OldResourceProperties": fcm_props("app1")
        }))
        .await
        .unwrap();

    assert_eq!(updated, created);
    assert_eq!(
        h.actions.application_attributes("app1", PlatformKind::Gcm).unwrap()["PlatformCredential"],
        "rotated-server-key"
    );
}

#[tokio::test]
async fn apns_without_team_id_creates_nothing() {
    let h = Harness::new(100);
    h.secrets.insert("prod/apns", r#"{"signingKey":"-----KEY-----"}"#);

    let err = h
        .send(json!({
            "RequestType": "Create",
            "ResourceType": "Custom::SNSPlatformApplicationAPNS",
            "ResourceProperties": {
                "name": "ios-app",
                "platform": "APNS",
                "signingKeySecretName": "prod/apns",
                "signingKeyId": "KEY123",
                "appBundleId": "com.example.app"
            }
        }))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "ValidationError");
    assert!(h.actions.calls_to("CreatePlatformApplication").is_empty());
}

#[tokio::test]
async fn apns_inline_and_secret_fields_combine() {
    let h = Harness::new(100);
    let response = h
        .send(json!({
            "RequestType": "Create",
            "ResourceType": "Custom::SNSPlatformApplicationAPNS",
            "ResourceProperties": {
                "name": "ios-app",
                "platform": "APNS_SANDBOX",
                "signingKeySecretName": "prod/apns",
                "signingKeyId": "KEY123",
                "appBundleId": "com.example.app",
                "attributes": {"SuccessFeedbackSampleRate": "100"}
            }
        }))
        .await
        .unwrap();

    assert_eq!(response.physical_resource_id, "PlatformApplication:ios-app:APNS_SANDBOX");
    let stored = h
        .actions
        .application_attributes("ios-app", PlatformKind::ApnsSandbox)
        .unwrap();
    assert_eq!(stored["ApplePlatformTeamID"], "TEAM42");
    assert_eq!(stored["PlatformPrincipal"], "KEY123");
    assert_eq!(stored["SuccessFeedbackSampleRate"], "100");
}

#[tokio::test]
async fn update_of_missing_policy_creates_no_version() {
    let h = Harness::new(100);
    let err = h
        .send(json!({
            "RequestType": "Update",
            "PhysicalResourceId": "VersionedPolicy:p1",
            "ResourceProperties": {"policyName": "p1", "policyDocument": "{}"},
            "OldResourceProperties": {"policyName": "p1", "policyDocument": "{}"}
        }))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "NotFound");
    assert!(h.actions.calls_to("CreatePolicyVersion").is_empty());
}
