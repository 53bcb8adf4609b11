//! Asset and platform rules.

pub mod asset;
pub mod platform;
pub mod protocols;

pub use asset::{
    AssetContext, AssetPayload, AssetView, create_asset, delete_asset, get_or_create_node,
    node_full_value,
};
pub use platform::{PlatformPayload, TypeConstraints, build_platform, constraints_for, create_platform};
pub use protocols::{ProtocolConstraints, ProtocolEntry, validate_protocols};
