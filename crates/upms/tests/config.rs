//! Loading configuration from disk and serving with it.

use std::io::Write;
use std::sync::Arc;

use upms::core::{UpmsError, UriFlags, DEFAULT_ABILITY_ID};
use upms::messages::encode;
use upms::{Reply, ReplyBody, Request, RequestFrame, ServiceConfig, ServiceError};
use upms::{UriPermissionService, UriPermissionStub};
use upms_testkit::FakePlatform;

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"{
            "engine": { "max_uri_count": 2, "report_grant_events": false },
            "request_queue_depth": 4
        }"#,
    );

    let config = ServiceConfig::from_file(file.path()).unwrap();

    assert_eq!(config.engine.max_uri_count, 2);
    assert!(!config.engine.report_grant_events);
    assert_eq!(config.engine.max_privileged_uri_count, 200_000);
    assert_eq!(config.request_queue_depth, 4);
    assert_eq!(
        config.max_raw_payload_bytes,
        ServiceConfig::default().max_raw_payload_bytes
    );
}

#[test]
fn test_malformed_file() {
    let file = write_config("{ \"engine\": ");

    let err = ServiceConfig::from_file(file.path()).unwrap_err();

    assert!(matches!(err, ServiceError::Config(_)));
}

#[test]
fn test_loaded_bound_applies_to_requests() {
    let file = write_config(r#"{ "engine": { "max_uri_count": 2 } }"#);
    let config = ServiceConfig::from_file(file.path()).unwrap();

    let fakes = FakePlatform::new();
    let service = Arc::new(UriPermissionService::new(config, fakes.platform()));
    service.init();
    let stub = UriPermissionStub::new(service);
    let owner = fakes.install_system_app("com.example.owner");
    fakes.install_app("com.example.reader", 0);

    let batch = |n: usize| {
        let frame = RequestFrame::new(Request::BatchGrantUriPermission {
            uris: (0..n).map(|i| owner.file_uri(&format!("f{i}"))).collect(),
            flag: UriFlags::READ,
            target_bundle: "com.example.reader".into(),
            app_index: 0,
            initiator: owner.token,
            ability_id: DEFAULT_ABILITY_ID,
        });
        encode(&frame).unwrap()
    };

    assert_eq!(
        stub.handle(&owner.ctx(), &batch(3)),
        Reply::error(UpmsError::UriListOutOfRange)
    );
    assert_eq!(
        stub.handle(&owner.ctx(), &batch(2)),
        Reply::ok(ReplyBody::Empty)
    );
}
