//! Well-known authorities, permission names and process uids.

/// Authority of distributed and local document URIs.
pub const DOCS_AUTHORITY: &str = "docs";

/// Authority served by the media library.
pub const MEDIA_AUTHORITY: &str = "media";

/// Ability id used when a grant is not tied to a specific ability.
pub const DEFAULT_ABILITY_ID: i32 = -1;

/// Permission strings checked against the access-token kit.
pub mod permission {
    /// Grants URIs the caller does not itself hold.
    pub const GRANT_URI_PERMISSION_PRIVILEGED: &str =
        "ohos.permission.GRANT_URI_PERMISSION_PRIVILEGED";

    /// Key-based grant on behalf of another caller token.
    pub const GRANT_URI_PERMISSION_AS_CALLER: &str =
        "ohos.permission.GRANT_URI_PERMISSION_AS_CALLER";

    /// Access to every docs URI.
    pub const FILE_ACCESS_MANAGER: &str = "ohos.permission.FILE_ACCESS_MANAGER";

    /// Lets a caller re-share URIs it was itself granted.
    pub const PROXY_AUTHORIZATION_URI: &str = "ohos.permission.PROXY_AUTHORIZATION_URI";
}

/// Calling uids of trusted relay processes.
pub mod uid {
    /// The foundation process.
    pub const FOUNDATION: i32 = 5523;
    /// Unified data management framework.
    pub const UDMF: i32 = 3012;
    /// Pasteboard service.
    pub const PASTEBOARD: i32 = 3816;
    /// Pasteboard broker.
    pub const BROKER_PASTEBOARD: i32 = 5557;
}
