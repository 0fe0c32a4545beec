//! Pack sources: where raw pack documents come from.
//!
//! The decision pipeline only needs [`PackSource::fetch_pack`]. The
//! filesystem store additionally lists packs and exposes raw bytes for
//! manifest hashing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use repath_shared::{Pack, RepathError, Result};

/// File name of a pack document inside its directory.
pub const PACK_FILE_NAME: &str = "pack.json";

/// Fetch capability for raw (unmerged) packs by identifier.
pub trait PackSource {
    /// Return the pack stored under `pack_id`, or [`RepathError::NotFound`].
    fn fetch_pack(&self, pack_id: &str) -> Result<Pack>;
}

impl<S: PackSource + ?Sized> PackSource for &S {
    fn fetch_pack(&self, pack_id: &str) -> Result<Pack> {
        (**self).fetch_pack(pack_id)
    }
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// Packs laid out as `<root>/<pack_id>/pack.json`.
#[derive(Debug, Clone)]
pub struct FsPackStore {
    root: PathBuf,
}

impl FsPackStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the pack directories.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `pack_id`, or `None` if the id cannot name a
    /// directory under the root.
    pub fn pack_path(&self, pack_id: &str) -> Option<PathBuf> {
        let id = pack_id.trim();
        let safe = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\']);
        safe.then(|| self.root.join(id).join(PACK_FILE_NAME))
    }

    /// Raw bytes of the pack document.
    pub fn read_raw(&self, pack_id: &str) -> Result<Vec<u8>> {
        let path = self
            .pack_path(pack_id)
            .filter(|p| p.is_file())
            .ok_or_else(|| RepathError::not_found(pack_id))?;
        std::fs::read(&path).map_err(|e| RepathError::io(&path, e))
    }

    /// Identifiers of every pack directory containing a document, sorted.
    pub fn list_pack_ids(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            debug!(root = %self.root.display(), "pack root does not exist");
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.root).map_err(|e| RepathError::io(&self.root, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RepathError::io(&self.root, e))?;
            let path = entry.path();
            if path.is_dir() && path.join(PACK_FILE_NAME).is_file() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl PackSource for FsPackStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn fetch_pack(&self, pack_id: &str) -> Result<Pack> {
        let raw = self.read_raw(pack_id)?;
        parse_pack(&raw).map_err(|e| {
            RepathError::parse(format!("{pack_id}/{PACK_FILE_NAME}: {e}"))
        })
    }
}

/// Parse a pack document from JSON bytes.
pub fn parse_pack(raw: &[u8]) -> std::result::Result<Pack, serde_json::Error> {
    serde_json::from_slice(raw)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Packs held in memory, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct MemoryPackStore {
    packs: HashMap<String, Pack>,
}

impl MemoryPackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `pack` under an explicit identifier.
    pub fn insert(&mut self, pack_id: impl Into<String>, pack: Pack) {
        self.packs.insert(pack_id.into(), pack);
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

/// Collect packs keyed by their own `pack_id`; packs without one are skipped.
impl FromIterator<Pack> for MemoryPackStore {
    fn from_iter<I: IntoIterator<Item = Pack>>(iter: I) -> Self {
        let packs = iter
            .into_iter()
            .filter_map(|pack| pack.id().map(str::to_string).map(|id| (id, pack)))
            .collect();
        Self { packs }
    }
}

impl PackSource for MemoryPackStore {
    fn fetch_pack(&self, pack_id: &str) -> Result<Pack> {
        self.packs
            .get(pack_id)
            .cloned()
            .ok_or_else(|| RepathError::not_found(pack_id))
    }
}
