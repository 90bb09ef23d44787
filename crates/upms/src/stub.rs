//! RPC stub: turns request bytes into engine calls and engine results into
//! reply bytes.
//!
//! Every failure is answered with a code; nothing panics or escapes across
//! the IPC boundary.

use std::sync::Arc;

use bytes::Bytes;

use upms_core::{CallingContext, UpmsError};
use upms_engine::UriPermissionManager;

use crate::messages::{
    decode, encode, ListBound, Reply, ReplyBody, Request, RequestFrame, INTERFACE_DESCRIPTOR,
};
use crate::service::UriPermissionService;

/// Server side of the RPC interface.
pub struct UriPermissionStub {
    service: Arc<UriPermissionService>,
}

impl UriPermissionStub {
    pub fn new(service: Arc<UriPermissionService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<UriPermissionService> {
        &self.service
    }

    /// Handle one raw request from the peer identified by `ctx`.
    pub fn on_remote_request(&self, ctx: &CallingContext, data: &[u8]) -> Bytes {
        let reply = self.handle(ctx, data);
        match encode(&reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "encode reply failed");
                Bytes::new()
            }
        }
    }

    /// Decode, validate and dispatch one request.
    pub fn handle(&self, ctx: &CallingContext, data: &[u8]) -> Reply {
        let max = self.service.config().max_raw_payload_bytes;
        if data.len() > max {
            tracing::error!(len = data.len(), max, "request payload too large");
            return Reply::error(UpmsError::DeadObject);
        }

        let frame: RequestFrame = match decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "malformed request");
                return Reply::error(UpmsError::InvalidValue);
            }
        };
        if frame.descriptor != INTERFACE_DESCRIPTOR {
            tracing::error!(descriptor = %frame.descriptor, "interface descriptor mismatch");
            return Reply::error(UpmsError::InvalidValue);
        }
        if let Err(e) = self.check_list_bound(&frame.request) {
            return Reply::error(e);
        }

        let manager = match self.service.manager() {
            Ok(manager) => manager,
            Err(e) => {
                tracing::warn!(op = frame.request.name(), "request before service ready");
                return Reply::error(e);
            }
        };
        tracing::debug!(op = frame.request.name(), caller = %ctx.token_id, "dispatch request");
        dispatch(&manager, ctx, frame.request)
    }

    fn check_list_bound(&self, request: &Request) -> upms_core::Result<()> {
        let Some((len, bound)) = request.uri_list() else {
            return Ok(());
        };
        let engine = &self.service.config().engine;
        let max = match bound {
            ListBound::Basic => engine.max_uri_count,
            ListBound::Privileged | ListBound::Check => engine.max_privileged_uri_count,
        };
        if (len == 0 && !bound.allows_empty()) || len > max {
            tracing::error!(op = request.name(), len, max, "uri list out of range");
            return Err(UpmsError::UriListOutOfRange);
        }
        Ok(())
    }
}

fn dispatch(manager: &UriPermissionManager, ctx: &CallingContext, request: Request) -> Reply {
    match request {
        Request::GrantUriPermission {
            uri,
            flag,
            target_bundle,
            app_index,
            initiator,
            ability_id,
        } => Reply::from_result(manager.grant_uri_permission(
            ctx,
            &[uri],
            flag,
            &target_bundle,
            app_index,
            initiator,
            ability_id,
        )),
        Request::BatchGrantUriPermission {
            uris,
            flag,
            target_bundle,
            app_index,
            initiator,
            ability_id,
        } => Reply::from_result(manager.grant_uri_permission(
            ctx,
            &uris,
            flag,
            &target_bundle,
            app_index,
            initiator,
            ability_id,
        )),
        Request::GrantUriPermissionPrivileged {
            uris,
            flag,
            target_bundle,
            app_index,
        } => Reply::from_result(manager.grant_uri_permission_privileged(
            ctx,
            &uris,
            flag,
            &target_bundle,
            app_index,
        )),
        Request::GrantUriPermissionByKey { key, flag, target } => {
            Reply::from_result(manager.grant_uri_permission_by_key(ctx, &key, flag, target))
        }
        Request::GrantUriPermissionByKeyAsCaller {
            key,
            flag,
            caller,
            target,
        } => Reply::from_result(
            manager.grant_uri_permission_by_key_as_caller(ctx, &key, flag, caller, target),
        ),
        Request::RevokeUriPermission { token, ability_id } => {
            manager.revoke_uri_permission(ctx, token, ability_id);
            Reply::ok(ReplyBody::Empty)
        }
        Request::RevokeAllUriPermissions { token } => {
            Reply::from_result(manager.revoke_all_uri_permissions(ctx, token))
        }
        Request::RevokeUriPermissionManually {
            uri,
            bundle_name,
            app_index,
        } => Reply::from_result(manager.revoke_uri_permission_manually(
            ctx,
            &uri,
            &bundle_name,
            app_index,
        )),
        Request::VerifyUriPermission { uri, flag, token } => Reply::ok(ReplyBody::Bool(
            manager.verify_uri_permission(ctx, &uri, flag, token),
        )),
        Request::CheckUriAuthorization { uris, flag, token } => Reply::ok(ReplyBody::Bools(
            manager.check_uri_authorization(ctx, &uris, flag, token),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use upms_core::{TokenId, UriFlags};
    use upms_testkit::FakePlatform;

    fn stub(config: ServiceConfig) -> (Arc<FakePlatform>, UriPermissionStub) {
        let fakes = FakePlatform::new();
        let service = Arc::new(UriPermissionService::new(config, fakes.platform()));
        service.init();
        (fakes, UriPermissionStub::new(service))
    }

    fn verify_frame() -> RequestFrame {
        RequestFrame::new(Request::VerifyUriPermission {
            uri: "file://com.example.a/x".into(),
            flag: UriFlags::READ,
            token: TokenId(1),
        })
    }

    #[test]
    fn test_wrong_descriptor() {
        let (fakes, stub) = stub(ServiceConfig::default());
        let caller = fakes.install_system_app("com.example.sys");
        let mut frame = verify_frame();
        frame.descriptor = "ohos.aaFwk.IOther".into();

        let reply = stub.handle(&caller.ctx(), &encode(&frame).unwrap());

        assert_eq!(reply, Reply::error(UpmsError::InvalidValue));
    }

    #[test]
    fn test_undecodable_payload() {
        let (fakes, stub) = stub(ServiceConfig::default());
        let caller = fakes.install_system_app("com.example.sys");

        let reply = stub.handle(&caller.ctx(), b"not cbor at all");

        assert_eq!(reply.code, UpmsError::InvalidValue.code());
    }

    #[test]
    fn test_oversized_payload() {
        let config = ServiceConfig {
            max_raw_payload_bytes: 16,
            ..ServiceConfig::default()
        };
        let (fakes, stub) = stub(config);
        let caller = fakes.install_system_app("com.example.sys");

        let reply = stub.handle(&caller.ctx(), &[0u8; 17]);

        assert_eq!(reply, Reply::error(UpmsError::DeadObject));
    }

    #[test]
    fn test_list_bounds_checked_before_dispatch() {
        let (fakes, stub) = stub(ServiceConfig::default());
        let caller = fakes.install_system_app("com.example.sys");
        let frame = RequestFrame::new(Request::BatchGrantUriPermission {
            uris: vec!["file://com.example.sys/x".into(); 501],
            flag: UriFlags::READ,
            target_bundle: "com.example.sys".into(),
            app_index: 0,
            initiator: caller.token,
            ability_id: -1,
        });

        let reply = stub.handle(&caller.ctx(), &encode(&frame).unwrap());

        assert_eq!(reply, Reply::error(UpmsError::UriListOutOfRange));
        assert_eq!(fakes.lookups(), 0);
    }

    #[test]
    fn test_empty_check_answers_empty() {
        let (fakes, stub) = stub(ServiceConfig::default());
        let caller = fakes.install_system_app("com.example.sys");
        let frame = RequestFrame::new(Request::CheckUriAuthorization {
            uris: Vec::new(),
            flag: UriFlags::READ,
            token: caller.token,
        });

        let reply = stub.handle(&caller.ctx(), &encode(&frame).unwrap());

        assert_eq!(reply, Reply::ok(ReplyBody::Bools(Vec::new())));
    }

    #[test]
    fn test_not_ready() {
        let (fakes, stub) = stub(ServiceConfig::default());
        let caller = fakes.install_system_app("com.example.sys");
        stub.service().stop();

        let reply = stub.handle(&caller.ctx(), &encode(&verify_frame()).unwrap());

        assert_eq!(reply, Reply::error(UpmsError::ServiceNotReady));
    }

    #[test]
    fn test_revoke_ability_is_acknowledged_for_anyone() {
        let (fakes, stub) = stub(ServiceConfig::default());
        let caller = fakes.install_app("com.example.third", 0);
        let frame = RequestFrame::new(Request::RevokeUriPermission {
            token: TokenId(9),
            ability_id: 1,
        });

        let reply = stub.handle(&caller.ctx(), &encode(&frame).unwrap());

        assert_eq!(reply, Reply::ok(ReplyBody::Empty));
    }

    #[test]
    fn test_reply_bytes_decode() {
        let (fakes, stub) = stub(ServiceConfig::default());
        let caller = fakes.install_system_app("com.example.sys");

        let bytes = stub.on_remote_request(&caller.ctx(), &encode(&verify_frame()).unwrap());
        let reply: Reply = decode(&bytes).unwrap();

        assert_eq!(reply, Reply::ok(ReplyBody::Bool(false)));
    }
}
