//! Client proxy.
//!
//! Mirrors every service operation as an async method. Non-zero reply codes
//! come back as [`ServiceError::Permission`].

use upms_core::{TokenId, UriFlags};

use crate::error::{Result, ServiceError};
use crate::messages::{decode, encode, Reply, ReplyBody, Request, RequestFrame};
use crate::transport::RpcTransport;

/// Client side of the RPC interface.
pub struct UriPermissionProxy<T: RpcTransport> {
    transport: T,
}

impl<T: RpcTransport> UriPermissionProxy<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call(&self, request: Request) -> Result<ReplyBody> {
        let op = request.name();
        let data = encode(&RequestFrame::new(request))?;
        let raw = self.transport.transact(data).await?;
        let reply: Reply = decode(&raw)?;
        reply.into_result().map_err(|e| {
            tracing::debug!(op, code = e.code(), "request failed");
            ServiceError::Permission(e)
        })
    }

    async fn call_unit(&self, request: Request) -> Result<()> {
        let op = request.name();
        match self.call(request).await? {
            ReplyBody::Empty => Ok(()),
            _ => Err(ServiceError::UnexpectedReply(op)),
        }
    }

    /// Grant one URI.
    pub async fn grant_uri_permission(
        &self,
        uri: &str,
        flag: UriFlags,
        target_bundle: &str,
        app_index: i32,
        initiator: TokenId,
        ability_id: i32,
    ) -> Result<()> {
        self.call_unit(Request::GrantUriPermission {
            uri: uri.to_string(),
            flag,
            target_bundle: target_bundle.to_string(),
            app_index,
            initiator,
            ability_id,
        })
        .await
    }

    /// Grant a batch of URIs.
    pub async fn batch_grant_uri_permission(
        &self,
        uris: &[String],
        flag: UriFlags,
        target_bundle: &str,
        app_index: i32,
        initiator: TokenId,
        ability_id: i32,
    ) -> Result<()> {
        self.call_unit(Request::BatchGrantUriPermission {
            uris: uris.to_vec(),
            flag,
            target_bundle: target_bundle.to_string(),
            app_index,
            initiator,
            ability_id,
        })
        .await
    }

    pub async fn grant_uri_permission_privileged(
        &self,
        uris: &[String],
        flag: UriFlags,
        target_bundle: &str,
        app_index: i32,
    ) -> Result<()> {
        self.call_unit(Request::GrantUriPermissionPrivileged {
            uris: uris.to_vec(),
            flag,
            target_bundle: target_bundle.to_string(),
            app_index,
        })
        .await
    }

    pub async fn grant_uri_permission_by_key(
        &self,
        key: &str,
        flag: UriFlags,
        target: TokenId,
    ) -> Result<()> {
        self.call_unit(Request::GrantUriPermissionByKey {
            key: key.to_string(),
            flag,
            target,
        })
        .await
    }

    pub async fn grant_uri_permission_by_key_as_caller(
        &self,
        key: &str,
        flag: UriFlags,
        caller: TokenId,
        target: TokenId,
    ) -> Result<()> {
        self.call_unit(Request::GrantUriPermissionByKeyAsCaller {
            key: key.to_string(),
            flag,
            caller,
            target,
        })
        .await
    }

    /// Ability exit. The service acknowledges without a result.
    pub async fn revoke_uri_permission(&self, token: TokenId, ability_id: i32) -> Result<()> {
        self.call_unit(Request::RevokeUriPermission { token, ability_id })
            .await
    }

    pub async fn revoke_all_uri_permissions(&self, token: TokenId) -> Result<()> {
        self.call_unit(Request::RevokeAllUriPermissions { token })
            .await
    }

    pub async fn revoke_uri_permission_manually(
        &self,
        uri: &str,
        bundle_name: &str,
        app_index: i32,
    ) -> Result<()> {
        self.call_unit(Request::RevokeUriPermissionManually {
            uri: uri.to_string(),
            bundle_name: bundle_name.to_string(),
            app_index,
        })
        .await
    }

    pub async fn verify_uri_permission(
        &self,
        uri: &str,
        flag: UriFlags,
        token: TokenId,
    ) -> Result<bool> {
        match self
            .call(Request::VerifyUriPermission {
                uri: uri.to_string(),
                flag,
                token,
            })
            .await?
        {
            ReplyBody::Bool(granted) => Ok(granted),
            _ => Err(ServiceError::UnexpectedReply("VerifyUriPermission")),
        }
    }

    /// One answer per URI, in input order.
    pub async fn check_uri_authorization(
        &self,
        uris: &[String],
        flag: UriFlags,
        token: TokenId,
    ) -> Result<Vec<bool>> {
        match self
            .call(Request::CheckUriAuthorization {
                uris: uris.to_vec(),
                flag,
                token,
            })
            .await?
        {
            ReplyBody::Bools(result) if result.len() == uris.len() => Ok(result),
            _ => Err(ServiceError::UnexpectedReply("CheckUriAuthorization")),
        }
    }
}
