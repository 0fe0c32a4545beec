//! Pack loading, inheritance merging, validation, and manifest generation.
//!
//! The decision pipeline consumes packs through [`PackSource`] and
//! [`load_merged_pack`]; validation and manifest generation are build-time
//! tools layered on the same types.

pub mod manifest;
pub mod merge;
pub mod source;
pub mod validate;

pub use manifest::{
    DEFAULT_SCHEMA_VERSION, ManifestBundle, ManifestEntry, ManifestOptions, SearchEntry,
    SearchIndex, build_manifest, sha256_hex, write_manifest,
};
pub use merge::{load_merged_pack, merge_entities, merge_packs};
pub use source::{FsPackStore, MemoryPackStore, PACK_FILE_NAME, PackSource, parse_pack};
pub use validate::{ValidationIssue, validate_pack, validate_references};
