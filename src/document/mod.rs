//! Mirrored documents
//!
//! Documents are opaque JSON copied verbatim from GitHub. The only structure
//! this crate imposes is the canonical identity used as the store key.

pub mod identity;
mod kind;

pub use identity::{
    collection_for_key, detect_collection, owner_and_repo, resolve, resolve_as, Identity,
    KEY_FIELD,
};
pub use kind::{Collection, DocType};
