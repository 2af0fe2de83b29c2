//! File workflow integration tests: credit-gated upload, authorization,
//! visibility, download, and deletion.

mod common;

use axum_test::multipart::{MultipartForm, Part};
use common::TestHarness;
use dropgate_core::{UserId, STARTING_CREDITS};
use dropgate_store::Store;

fn file_part(name: &str, contents: &[u8]) -> Part {
    Part::bytes(contents.to_vec())
        .file_name(name)
        .mime_type("text/plain")
}

/// Upload one named file for the harness user and return its id.
async fn upload_one(harness: &TestHarness, name: &str, contents: &[u8]) -> String {
    let form = MultipartForm::new().add_part("files", file_part(name, contents));

    let response = harness
        .server
        .post("/v1/files/upload")
        .add_header("authorization", harness.user_auth_header())
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["files"][0]["id"]
        .as_str()
        .expect("upload returns a file id")
        .to_string()
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn upload_debits_one_credit_per_file() {
    let harness = TestHarness::new();

    let form = MultipartForm::new()
        .add_part("files", file_part("a.txt", b"alpha"))
        .add_part("files", file_part("b.txt", b"bravo"));

    let response = harness
        .server
        .post("/v1/files/upload")
        .add_header("authorization", harness.user_auth_header())
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
    assert_eq!(body["remaining_credits"], STARTING_CREDITS - 2);
    assert_eq!(body["files"][0]["name"], "a.txt");
    assert_eq!(body["files"][0]["is_public"], false);
}

#[tokio::test]
async fn upload_skips_unnamed_parts() {
    let harness = TestHarness::new();

    let form = MultipartForm::new()
        .add_part("files", file_part("named.txt", b"kept"))
        .add_part("files", Part::text("no file name here"));

    let response = harness
        .server
        .post("/v1/files/upload")
        .add_header("authorization", harness.user_auth_header())
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["files"].as_array().unwrap().len(), 1);
    assert_eq!(body["remaining_credits"], STARTING_CREDITS - 1);
}

#[tokio::test]
async fn upload_batch_larger_than_balance_fails_fast() {
    let harness = TestHarness::new();

    // One more file than the starting balance covers.
    let mut form = MultipartForm::new();
    for i in 0..=STARTING_CREDITS {
        form = form.add_part("files", file_part(&format!("f{i}.txt"), b"x"));
    }

    let response = harness
        .server
        .post("/v1/files/upload")
        .add_header("authorization", harness.user_auth_header())
        .multipart(form)
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");

    // Nothing was debited and nothing was stored.
    let account = harness.store.get_account(&harness.test_user_id).unwrap().unwrap();
    assert_eq!(account.credits, STARTING_CREDITS);
    assert!(harness
        .store
        .list_files_by_owner(&harness.test_user_id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn upload_with_no_files_is_rejected() {
    let harness = TestHarness::new();

    let form = MultipartForm::new().add_part("files", Part::text("not a file"));

    let response = harness
        .server
        .post("/v1/files/upload")
        .add_header("authorization", harness.user_auth_header())
        .multipart(form)
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn upload_requires_auth() {
    let harness = TestHarness::new();

    let form = MultipartForm::new().add_part("files", file_part("a.txt", b"x"));

    let response = harness.server.post("/v1/files/upload").multipart(form).await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Listing and reads
// ============================================================================

#[tokio::test]
async fn list_returns_only_own_files() {
    let harness = TestHarness::new();
    let other = UserId::generate();

    upload_one(&harness, "mine.txt", b"mine").await;

    let form = MultipartForm::new().add_part("files", file_part("theirs.txt", b"theirs"));
    harness
        .server
        .post("/v1/files/upload")
        .add_header("authorization", TestHarness::auth_header_for(other))
        .multipart(form)
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/files")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let files = body.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["name"], "mine.txt");
}

#[tokio::test]
async fn get_file_hides_other_users_private_files() {
    let harness = TestHarness::new();
    let file_id = upload_one(&harness, "secret.txt", b"secret").await;

    // Owner sees it
    harness
        .server
        .get(&format!("/v1/files/{file_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_ok();

    // A stranger gets the same answer as for a missing file
    let response = harness
        .server
        .get(&format!("/v1/files/{file_id}"))
        .add_header("authorization", TestHarness::auth_header_for(UserId::generate()))
        .await;
    response.assert_status_not_found();

    // Unknown ids are not distinguishable either
    harness
        .server
        .get("/v1/files/01ARZ3NDEKTSV4RRFFQ69G5FAV")
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_not_found();
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn public_fetch_requires_visibility_toggle() {
    let harness = TestHarness::new();
    let file_id = upload_one(&harness, "shared.txt", b"shared").await;

    // Private by default
    harness
        .server
        .get(&format!("/v1/files/public/{file_id}"))
        .await
        .assert_status_forbidden();

    // Owner toggles it public
    let response = harness
        .server
        .patch(&format!("/v1/files/{file_id}/visibility"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["is_public"], true);

    // Now anonymously fetchable
    let response = harness
        .server
        .get(&format!("/v1/files/public/{file_id}"))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "shared.txt");

    // Missing files are distinct from forbidden ones on the public route
    harness
        .server
        .get("/v1/files/public/01ARZ3NDEKTSV4RRFFQ69G5FAV")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn toggle_by_non_owner_is_forbidden() {
    let harness = TestHarness::new();
    let file_id = upload_one(&harness, "mine.txt", b"mine").await;

    let response = harness
        .server
        .patch(&format!("/v1/files/{file_id}/visibility"))
        .add_header("authorization", TestHarness::auth_header_for(UserId::generate()))
        .await;

    response.assert_status_forbidden();
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn download_authorization_matrix() {
    let harness = TestHarness::new();
    let file_id = upload_one(&harness, "doc.txt", b"document body").await;

    // Anonymous + private -> 401
    harness
        .server
        .get(&format!("/v1/files/download/{file_id}"))
        .await
        .assert_status_unauthorized();

    // Authenticated non-owner + private -> 403
    harness
        .server
        .get(&format!("/v1/files/download/{file_id}"))
        .add_header("authorization", TestHarness::auth_header_for(UserId::generate()))
        .await
        .assert_status_forbidden();

    // Owner -> 200 with the original bytes
    let response = harness
        .server
        .get(&format!("/v1/files/download/{file_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "document body");

    // Toggle public, then anonymous -> 200
    harness
        .server
        .patch(&format!("/v1/files/{file_id}/visibility"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get(&format!("/v1/files/download/{file_id}"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "document body");
}

#[tokio::test]
async fn download_fails_when_blob_is_missing() {
    let harness = TestHarness::new();
    let file_id = upload_one(&harness, "gone.txt", b"soon gone").await;

    // Remove the blob behind the record's back
    let record = &harness
        .store
        .list_files_by_owner(&harness.test_user_id)
        .unwrap()[0];
    std::fs::remove_file(&record.location).unwrap();

    let response = harness
        .server
        .get(&format!("/v1/files/download/{file_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn delete_removes_record_and_second_delete_is_false() {
    let harness = TestHarness::new();
    let file_id = upload_one(&harness, "temp.txt", b"temp").await;
    let location = harness
        .store
        .list_files_by_owner(&harness.test_user_id)
        .unwrap()[0]
        .location
        .clone();

    let response = harness
        .server
        .delete(&format!("/v1/files/{file_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["deleted"], true);

    // Gone from the listing and from disk
    assert!(harness
        .store
        .list_files_by_owner(&harness.test_user_id)
        .unwrap()
        .is_empty());
    assert!(!std::path::Path::new(&location).exists());

    // Second delete fails silently
    let response = harness
        .server
        .delete(&format!("/v1/files/{file_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["deleted"], false);
}

#[tokio::test]
async fn delete_by_non_owner_fails_silently() {
    let harness = TestHarness::new();
    let file_id = upload_one(&harness, "keep.txt", b"keep").await;

    let response = harness
        .server
        .delete(&format!("/v1/files/{file_id}"))
        .add_header("authorization", TestHarness::auth_header_for(UserId::generate()))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["deleted"], false);

    // Still there for the owner
    assert_eq!(
        harness
            .store
            .list_files_by_owner(&harness.test_user_id)
            .unwrap()
            .len(),
        1
    );
}
