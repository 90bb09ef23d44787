//! RPC message types.
//!
//! A request travels as a CBOR-encoded [`RequestFrame`]: the interface
//! descriptor followed by one [`Request`]. Every request is answered with a
//! [`Reply`] whose `code` is `0` on success or an [`UpmsError`] code.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use upms_core::{TokenId, UpmsError, UriFlags};

use crate::error::{Result, ServiceError};

/// Interface token every request frame must carry.
pub const INTERFACE_DESCRIPTOR: &str = "ohos.aaFwk.IUriPermissionManager";

/// A request as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub descriptor: String,
    pub request: Request,
}

impl RequestFrame {
    /// Frame `request` with the service descriptor.
    pub fn new(request: Request) -> Self {
        Self {
            descriptor: INTERFACE_DESCRIPTOR.to_string(),
            request,
        }
    }
}

/// Operations exposed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    GrantUriPermission {
        uri: String,
        flag: UriFlags,
        target_bundle: String,
        app_index: i32,
        initiator: TokenId,
        ability_id: i32,
    },
    BatchGrantUriPermission {
        uris: Vec<String>,
        flag: UriFlags,
        target_bundle: String,
        app_index: i32,
        initiator: TokenId,
        ability_id: i32,
    },
    GrantUriPermissionPrivileged {
        uris: Vec<String>,
        flag: UriFlags,
        target_bundle: String,
        app_index: i32,
    },
    GrantUriPermissionByKey {
        key: String,
        flag: UriFlags,
        target: TokenId,
    },
    GrantUriPermissionByKeyAsCaller {
        key: String,
        flag: UriFlags,
        caller: TokenId,
        target: TokenId,
    },
    /// Acknowledged without a result code.
    RevokeUriPermission { token: TokenId, ability_id: i32 },
    RevokeAllUriPermissions { token: TokenId },
    RevokeUriPermissionManually {
        uri: String,
        bundle_name: String,
        app_index: i32,
    },
    VerifyUriPermission {
        uri: String,
        flag: UriFlags,
        token: TokenId,
    },
    CheckUriAuthorization {
        uris: Vec<String>,
        flag: UriFlags,
        token: TokenId,
    },
}

/// Which bound a URI list is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListBound {
    /// Basic grants.
    Basic,
    /// Privileged grants.
    Privileged,
    /// Authorization checks: the privileged bound, and an empty list is
    /// answered with an empty result.
    Check,
}

impl ListBound {
    pub fn allows_empty(&self) -> bool {
        matches!(self, ListBound::Check)
    }
}

impl Request {
    /// Operation name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::GrantUriPermission { .. } => "GrantUriPermission",
            Request::BatchGrantUriPermission { .. } => "BatchGrantUriPermission",
            Request::GrantUriPermissionPrivileged { .. } => "GrantUriPermissionPrivileged",
            Request::GrantUriPermissionByKey { .. } => "GrantUriPermissionByKey",
            Request::GrantUriPermissionByKeyAsCaller { .. } => "GrantUriPermissionByKeyAsCaller",
            Request::RevokeUriPermission { .. } => "RevokeUriPermission",
            Request::RevokeAllUriPermissions { .. } => "RevokeAllUriPermissions",
            Request::RevokeUriPermissionManually { .. } => "RevokeUriPermissionManually",
            Request::VerifyUriPermission { .. } => "VerifyUriPermission",
            Request::CheckUriAuthorization { .. } => "CheckUriAuthorization",
        }
    }

    /// The URI list carried by a bulk request and the bound it falls under.
    pub fn uri_list(&self) -> Option<(usize, ListBound)> {
        match self {
            Request::BatchGrantUriPermission { uris, .. } => Some((uris.len(), ListBound::Basic)),
            Request::GrantUriPermissionPrivileged { uris, .. } => {
                Some((uris.len(), ListBound::Privileged))
            }
            Request::CheckUriAuthorization { uris, .. } => Some((uris.len(), ListBound::Check)),
            _ => None,
        }
    }
}

/// Payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyBody {
    Empty,
    Bool(bool),
    Bools(Vec<bool>),
}

/// A reply as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub code: i32,
    pub body: ReplyBody,
}

impl Reply {
    pub fn ok(body: ReplyBody) -> Self {
        Self { code: 0, body }
    }

    pub fn error(err: UpmsError) -> Self {
        Self {
            code: err.code(),
            body: ReplyBody::Empty,
        }
    }

    /// Reply carrying the code of `result`.
    pub fn from_result(result: upms_core::Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(ReplyBody::Empty),
            Err(e) => Self::error(e),
        }
    }

    /// Split into the body or the error the code stands for.
    pub fn into_result(self) -> upms_core::Result<ReplyBody> {
        match UpmsError::from_code(self.code) {
            None => Ok(self.body),
            Some(e) => Err(e),
        }
    }
}

/// Encode a message as CBOR.
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf).map_err(|e| ServiceError::Codec(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a CBOR message.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| ServiceError::Codec(e.to_string()))
}
