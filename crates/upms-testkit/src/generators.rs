//! Proptest generators for property-based testing.

use proptest::prelude::*;

use upms_core::{GrantRecord, TokenId, UriFlags, NETWORK_ID_MARK};

/// Generate a token id.
pub fn token_id() -> impl Strategy<Value = TokenId> {
    (1u32..=u32::MAX).prop_map(TokenId)
}

/// Generate a bundle name.
pub fn bundle_name() -> impl Strategy<Value = String> {
    "com\\.[a-z]{2,8}\\.[a-z]{2,8}".prop_map(String::from)
}

/// Generate a relative path of one to four segments.
pub fn path() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}(/[a-z0-9]{1,8}){0,3}".prop_map(String::from)
}

/// Generate a valid access flag, with or without PERSISTABLE.
pub fn access_flag() -> impl Strategy<Value = UriFlags> {
    (
        prop_oneof![
            Just(UriFlags::READ),
            Just(UriFlags::WRITE),
            Just(UriFlags::READ_WRITE),
        ],
        any::<bool>(),
    )
        .prop_map(|(flag, persist)| {
            if persist {
                flag | UriFlags::PERSISTABLE
            } else {
                flag
            }
        })
}

/// Generate any flag bits, valid or not.
pub fn raw_flag() -> impl Strategy<Value = UriFlags> {
    any::<u32>().prop_map(UriFlags)
}

/// Generate an application file URI.
pub fn bundle_uri() -> impl Strategy<Value = String> {
    (bundle_name(), path()).prop_map(|(b, p)| format!("file://{b}/{p}"))
}

/// Generate a distributed docs URI on one of a few devices.
pub fn docs_cloud_uri() -> impl Strategy<Value = String> {
    (path(), "[a-f0-9]{4}").prop_map(|(p, net)| format!("file://docs/{p}{NETWORK_ID_MARK}{net}"))
}

/// Generate a URI of any class, including unsupported ones.
pub fn any_uri() -> impl Strategy<Value = String> {
    prop_oneof![
        bundle_uri(),
        path().prop_map(|p| format!("file://docs/{p}")),
        docs_cloud_uri(),
        path().prop_map(|p| format!("file://media/{p}")),
        path().prop_map(|p| format!("content://media/{p}")),
        (bundle_name(), path()).prop_map(|(b, p)| format!("content://{b}/{p}")),
        path().prop_map(|p| format!("http://example.com/{p}")),
        "[a-z ]{0,12}".prop_map(String::from),
    ]
}

/// Parameters for generating a grant record.
#[derive(Debug, Clone)]
pub struct GrantParams {
    pub flag: UriFlags,
    pub from_token: TokenId,
    pub to_token: TokenId,
    pub ability_id: i32,
}

impl Arbitrary for GrantParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            access_flag(),
            1u32..=8u32, // small token space so pairs collide
            1u32..=8u32,
            -1i32..=4i32,
        )
            .prop_map(|(flag, from, to, ability_id)| GrantParams {
                flag: flag.access(),
                from_token: TokenId(from),
                to_token: TokenId(to),
                ability_id,
            })
            .boxed()
    }
}

/// Build a record from parameters.
pub fn record_from_params(params: &GrantParams) -> GrantRecord {
    GrantRecord::new(
        params.flag,
        params.from_token,
        params.to_token,
        params.ability_id,
    )
}
