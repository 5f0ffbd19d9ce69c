//! End-to-end tests: service request → store → secret → config map.

mod common;

use common::{RequestBuilder, TestHarness};

use gitops_creds::cluster::ClusterApi;
use gitops_creds::db::gitops_config_repo;
use gitops_creds::gitops::{encode, RepositoryCredentialEntry, SecretKeyRef};
use gitops_creds::{ErrorKind, GitProvider, GITOPS_SECRET_NAME};

fn entry(url: &str, secret: &str) -> RepositoryCredentialEntry {
    RepositoryCredentialEntry {
        url: url.to_string(),
        username_secret: Some(SecretKeyRef::new(secret, "username")),
        password_secret: Some(SecretKeyRef::new(secret, "password")),
        ..RepositoryCredentialEntry::default()
    }
}

#[tokio::test]
async fn test_new_host_appends_exact_entry() {
    let harness = TestHarness::new();

    let response = harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap();
    assert!(response.id.is_some());

    let entries = harness.entries();
    assert_eq!(
        entries,
        vec![RepositoryCredentialEntry {
            url: "https://github.com/org".to_string(),
            username_secret: Some(SecretKeyRef::new("u", "username")),
            password_secret: Some(SecretKeyRef::new("t", "password")),
            ..RepositoryCredentialEntry::default()
        }]
    );
    assert_eq!(harness.cluster.update_config_map_calls(), 1);
}

#[tokio::test]
async fn test_other_entries_untouched() {
    let existing = vec![
        entry("https://gitlab.com/group", "gitlab-secret"),
        entry("https://bitbucket.org/team", "bb-secret"),
    ];
    let harness = TestHarness::with_credentials(&encode(&existing).unwrap());

    harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap();

    let entries = harness.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(&entries[..2], &existing[..]);
    assert_eq!(entries[2].url, "https://github.com/org");
}

#[tokio::test]
async fn test_second_create_for_same_host_does_not_write() {
    let harness = TestHarness::new();

    harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap();
    let version = harness.config_map_version();
    let text = harness.credentials_text();

    harness
        .service
        .create_config(RequestBuilder::new().username("u2").token("t2").build(), 1)
        .await
        .unwrap();

    assert_eq!(harness.cluster.update_config_map_calls(), 1);
    assert_eq!(harness.config_map_version(), version);
    assert_eq!(harness.credentials_text(), text);
    assert_eq!(harness.service.get_all().unwrap().len(), 2);
}

#[tokio::test]
async fn test_existing_entry_is_left_as_stored() {
    let existing = vec![entry("https://github.com/org", "hand-made-secret")];
    let text = encode(&existing).unwrap();
    let harness = TestHarness::with_credentials(&text);

    harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap();

    assert_eq!(harness.cluster.update_config_map_calls(), 0);
    assert_eq!(harness.credentials_text(), text);
}

#[tokio::test]
async fn test_secret_created_once() {
    let harness = TestHarness::new();

    harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap();
    harness
        .service
        .create_config(
            RequestBuilder::new()
                .host("https://github.com/other")
                .username("someone-else")
                .build(),
            1,
        )
        .await
        .unwrap();

    assert_eq!(harness.cluster.create_secret_calls(), 1);
    let secret = harness
        .cluster
        .get_secret(&harness.target.namespace, GITOPS_SECRET_NAME)
        .await
        .unwrap();
    assert_eq!(secret.data.get("username").map(String::as_str), Some("u"));
    assert_eq!(secret.data.get("password").map(String::as_str), Some("t"));
}

#[tokio::test]
async fn test_reads_omit_username_and_token() {
    let harness = TestHarness::new();
    let created = harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap();

    let dto = harness.service.get_by_id(created.id.unwrap()).unwrap();
    assert!(dto.username.is_empty());
    assert!(dto.token.is_empty());
    assert_eq!(dto.git_hub_org_id, "org");

    let json = serde_json::to_value(&dto).unwrap();
    assert!(json.get("username").is_none());
    assert!(json.get("token").is_none());
    assert_eq!(json["provider"], "GITHUB");
    assert_eq!(json["host"], "https://github.com/org");

    let by_provider = harness.service.get_by_provider(GitProvider::Github).unwrap();
    assert_eq!(by_provider.id, created.id);
}

#[tokio::test]
async fn test_update_moves_record_to_new_host() {
    let harness = TestHarness::new();
    let created = harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap();

    harness
        .service
        .update_config(
            RequestBuilder::new()
                .id(created.id.unwrap())
                .provider(GitProvider::Gitlab)
                .gitlab_group("platform")
                .host("https://gitlab.com/platform")
                .build(),
            2,
        )
        .await
        .unwrap();

    let dto = harness.service.get_by_id(created.id.unwrap()).unwrap();
    assert_eq!(dto.provider, Some(GitProvider::Gitlab));
    assert_eq!(dto.git_lab_group_id, "platform");

    let urls: Vec<String> = harness.entries().into_iter().map(|e| e.url).collect();
    assert_eq!(
        urls,
        vec!["https://github.com/org", "https://gitlab.com/platform"]
    );
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let harness = TestHarness::new();
    let err = harness
        .service
        .update_config(RequestBuilder::new().id(999).build(), 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(harness.cluster.get_secret_calls(), 0);
}

#[tokio::test]
async fn test_malformed_credentials_is_serialization_error() {
    let harness = TestHarness::with_credentials("- url: [unterminated");

    let err = harness
        .service
        .create_config(RequestBuilder::new().build(), 1)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Serialization);
    assert_eq!(harness.cluster.get_config_map_calls(), 1);
    assert_eq!(harness.cluster.update_config_map_calls(), 0);
    // The record write is not rolled back.
    assert_eq!(harness.service.get_all().unwrap().len(), 1);
}

#[tokio::test]
async fn test_encrypted_store_keeps_token_out_of_database() {
    let harness = TestHarness::encrypted();
    let created = harness
        .service
        .create_config(RequestBuilder::new().token("ghp_secret").build(), 1)
        .await
        .unwrap();

    let row = gitops_config_repo::find_by_id(&harness.db, created.id.unwrap())
        .unwrap()
        .unwrap();
    assert!(row.token_encrypted);
    assert!(!row.token.contains("ghp_secret"));
    assert!(harness.db_path.exists());

    // Mirroring still uses the plaintext token.
    assert_eq!(
        harness.entries()[0].password_secret,
        Some(SecretKeyRef::new("ghp_secret", "password"))
    );
}
