//! Verification Engine scenarios over the fake platform.

use proptest::prelude::*;

use upms_core::{permission, UriFlags};
use upms_engine::EngineConfig;
use upms_testkit::generators::path;
use upms_testkit::TestFixture;

const DIR: &str = "file://docs/storage/Users/shared?networkid=dev1";
const CHILD: &str = "file://docs/storage/Users/shared/sub/child.txt?networkid=dev1";

fn docs_fixture() -> TestFixture {
    let fx = TestFixture::new();
    fx.platform
        .grant_permission(fx.files_app.token, permission::FILE_ACCESS_MANAGER);
    fx
}

// ───────────────────────────────────────────────────────────────────────────
// verify_uri_permission
// ───────────────────────────────────────────────────────────────────────────

#[test]
fn test_verify_fails_closed_for_third_party_caller() {
    let fx = TestFixture::new();
    let uri = fx.files_app.file_uri("a.txt");
    fx.grant(&fx.files_app, &[uri.clone()], UriFlags::READ, &fx.viewer)
        .unwrap();

    assert!(!fx
        .manager
        .verify_uri_permission(&fx.viewer.ctx(), &uri, UriFlags::READ, fx.viewer.token));
}

#[test]
fn test_verify_invalid_flag_is_false() {
    let fx = TestFixture::new();
    let uri = fx.files_app.file_uri("a.txt");
    fx.grant(&fx.files_app, &[uri.clone()], UriFlags::READ, &fx.viewer)
        .unwrap();

    assert!(!fx.verify(&uri, UriFlags(0), &fx.viewer));
    assert!(!fx.verify(&uri, UriFlags::PERSISTABLE, &fx.viewer));
}

#[test]
fn test_verify_read_is_implicit() {
    let fx = TestFixture::new();
    let w = fx.files_app.file_uri("w.txt");
    let r = fx.files_app.file_uri("r.txt");
    fx.grant(&fx.files_app, &[w.clone()], UriFlags::WRITE, &fx.viewer)
        .unwrap();
    fx.grant(&fx.files_app, &[r.clone()], UriFlags::READ, &fx.viewer)
        .unwrap();

    assert!(fx.verify(&w, UriFlags::READ, &fx.viewer));
    assert!(fx.verify(&w, UriFlags::WRITE, &fx.viewer));
    assert!(fx.verify(&r, UriFlags::READ, &fx.viewer));
    assert!(!fx.verify(&r, UriFlags::WRITE, &fx.viewer));
    assert!(!fx.verify(&r, UriFlags::READ_WRITE, &fx.viewer));
}

#[test]
fn test_verify_is_per_grantee() {
    let fx = TestFixture::new();
    let other = fx.install("com.example.other");
    let uri = fx.files_app.file_uri("a.txt");
    fx.grant(&fx.files_app, &[uri.clone()], UriFlags::READ, &fx.viewer)
        .unwrap();

    assert!(!fx.verify(&uri, UriFlags::READ, &other));
}

#[test]
fn test_verify_never_answers_for_media_or_content() {
    let fx = TestFixture::new();
    let media = "file://media/Photo/1/IMG_1.jpg".to_string();
    fx.platform.media.seed(fx.viewer.token, &media, UriFlags::READ);

    assert!(!fx.verify(&media, UriFlags::READ, &fx.viewer));
    assert!(!fx.verify("content://com.example.provider/x", UriFlags::READ, &fx.viewer));
    assert!(!fx.verify("http://example.com/x", UriFlags::READ, &fx.viewer));
}

#[test]
fn test_native_caller_may_verify() {
    let fx = TestFixture::new();
    let uri = fx.files_app.file_uri("a.txt");
    fx.grant(&fx.files_app, &[uri.clone()], UriFlags::READ, &fx.viewer)
        .unwrap();

    assert!(fx.manager.verify_uri_permission(
        &fx.foundation.ctx(),
        &uri,
        UriFlags::READ,
        fx.viewer.token
    ));
}

// ───────────────────────────────────────────────────────────────────────────
// Distributed subdirectories
// ───────────────────────────────────────────────────────────────────────────

#[test]
fn test_directory_grant_covers_children_on_same_device() {
    let fx = docs_fixture();
    fx.grant(&fx.files_app, &[DIR.to_string()], UriFlags::READ, &fx.viewer)
        .unwrap();

    assert!(fx.verify(CHILD, UriFlags::READ, &fx.viewer));
    assert!(!fx.verify(
        "file://docs/storage/Users/shared/sub/child.txt?networkid=dev2",
        UriFlags::READ,
        &fx.viewer
    ));
    assert!(!fx.verify(
        "file://docs/storage/Users/sharedother/x.txt?networkid=dev1",
        UriFlags::READ,
        &fx.viewer
    ));
}

#[test]
fn test_directory_grant_respects_flag() {
    let fx = docs_fixture();
    fx.grant(&fx.files_app, &[DIR.to_string()], UriFlags::READ, &fx.viewer)
        .unwrap();

    assert!(!fx.verify(CHILD, UriFlags::WRITE, &fx.viewer));
}

#[test]
fn test_present_key_without_match_is_definitive() {
    let fx = docs_fixture();
    let other = fx.install("com.example.other");
    fx.grant(&fx.files_app, &[DIR.to_string()], UriFlags::READ, &fx.viewer)
        .unwrap();
    fx.grant(&fx.files_app, &[CHILD.to_string()], UriFlags::READ, &other)
        .unwrap();

    assert!(!fx.verify(CHILD, UriFlags::READ, &fx.viewer));
    assert!(fx.verify(CHILD, UriFlags::READ, &other));
}

#[test]
fn test_local_docs_have_no_subdirectory_fallback() {
    let fx = docs_fixture();
    fx.grant(
        &fx.files_app,
        &["file://docs/storage/Users/shared".to_string()],
        UriFlags::READ,
        &fx.viewer,
    )
    .unwrap();

    assert!(!fx.verify(
        "file://docs/storage/Users/shared/child.txt",
        UriFlags::READ,
        &fx.viewer
    ));
}

// ───────────────────────────────────────────────────────────────────────────
// check_uri_authorization
// ───────────────────────────────────────────────────────────────────────────

#[test]
fn test_authorization_answers_every_uri() {
    let fx = TestFixture::new();
    let batch = vec![
        fx.files_app.file_uri("own.txt"),
        fx.viewer.file_uri("foreign.txt"),
        "http://example.com/x".to_string(),
    ];

    let result = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &batch,
        UriFlags::READ,
        fx.files_app.token,
    );

    assert_eq!(result, vec![true, false, false]);
}

#[test]
fn test_authorization_rejected_caller_gets_all_false() {
    let fx = TestFixture::new();
    let batch = vec![fx.viewer.file_uri("own.txt"); 3];

    let result =
        fx.manager
            .check_uri_authorization(&fx.viewer.ctx(), &batch, UriFlags::READ, fx.viewer.token);

    assert_eq!(result, vec![false; 3]);
}

#[test]
fn test_authorization_invalid_flag_gets_all_false() {
    let fx = TestFixture::new();
    let batch = vec![fx.files_app.file_uri("own.txt")];

    let result = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &batch,
        UriFlags::PERSISTABLE,
        fx.files_app.token,
    );

    assert_eq!(result, vec![false]);
}

#[test]
fn test_authorization_over_bound_gets_all_false() {
    let config = EngineConfig {
        max_privileged_uri_count: 2,
        ..EngineConfig::default()
    };
    let fx = TestFixture::with_config(config);
    let batch = vec![fx.files_app.file_uri("own.txt"); 3];

    let result = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &batch,
        UriFlags::READ,
        fx.files_app.token,
    );

    assert_eq!(result, vec![false; 3]);
}

#[test]
fn test_self_authority_needs_no_service_call() {
    let fx = TestFixture::new();
    let uri = fx.files_app.file_uri("own.txt");

    let result = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &[uri],
        UriFlags::WRITE,
        fx.files_app.token,
    );

    assert_eq!(result, vec![true]);
    assert_eq!(fx.platform.storage.calls(), 0);
    assert_eq!(fx.platform.media.calls(), 0);
    assert_eq!(fx.platform.collaborator.calls(), 0);
}

#[test]
fn test_authorization_media_and_content() {
    let fx = TestFixture::new();
    let media = "content://media/Photo/2/IMG_2.jpg".to_string();
    let content = "content://com.example.provider/items/1".to_string();
    fx.platform.media.seed(fx.viewer.token, &media, UriFlags::READ);
    fx.platform.collaborator.authorize(fx.viewer.token, &content);

    let result = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &[media.clone(), content.clone()],
        UriFlags::READ,
        fx.viewer.token,
    );
    assert_eq!(result, vec![true, true]);

    let write = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &[media],
        UriFlags::WRITE,
        fx.viewer.token,
    );
    assert_eq!(write, vec![false]);
}

#[test]
fn test_foundation_holds_every_content_uri() {
    let fx = TestFixture::new();
    let content = "content://com.example.provider/items/1".to_string();

    let result = fx.manager.check_uri_authorization(
        &fx.foundation.ctx(),
        &[content],
        UriFlags::READ,
        fx.viewer.token,
    );

    assert_eq!(result, vec![true]);
    assert_eq!(fx.platform.collaborator.calls(), 0);
}

#[test]
fn test_proxy_authorization_consults_ledger() {
    let fx = TestFixture::new();
    let relay = fx.install_system_app_with(
        "com.example.relay",
        &[permission::PROXY_AUTHORIZATION_URI],
    );
    let granted = fx.files_app.file_uri("granted.txt");
    let other = fx.files_app.file_uri("other.txt");
    fx.grant(&fx.files_app, &[granted.clone()], UriFlags::READ, &relay)
        .unwrap();

    let result = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &[granted.clone(), other],
        UriFlags::READ,
        relay.token,
    );
    assert_eq!(result, vec![true, false]);

    let without = fx.manager.check_uri_authorization(
        &fx.files_app.ctx(),
        &[granted],
        UriFlags::READ,
        fx.viewer.token,
    );
    assert_eq!(without, vec![false]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_verify_follows_granted_flag(
        rel in path(),
        flag in prop_oneof![
            Just(UriFlags::READ),
            Just(UriFlags::WRITE),
            Just(UriFlags::READ_WRITE),
        ],
    ) {
        let fx = TestFixture::new();
        let third = fx.install("com.example.third");
        let uri = fx.files_app.file_uri(&rel);
        fx.grant(&fx.files_app, &[uri.clone()], flag, &fx.viewer).unwrap();

        prop_assert!(fx.verify(&uri, UriFlags::READ, &fx.viewer));
        prop_assert_eq!(
            fx.verify(&uri, UriFlags::WRITE, &fx.viewer),
            flag.contains(UriFlags::WRITE)
        );
        prop_assert!(!fx.verify(&uri, UriFlags::READ, &third));
    }
}
