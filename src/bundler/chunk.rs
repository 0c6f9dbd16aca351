//! The bundled form of one entry point

use crate::entry::EntryId;

/// A lowered module inside a chunk
#[derive(Debug, Clone)]
pub struct ChunkModule {
    /// Registry key, the project-relative path
    pub key: String,
    pub code: String,
}

/// Export surface of a chunk's entry module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkExports {
    /// Named exports, `export *` from local modules flattened
    pub names: Vec<String>,

    /// Outside keys re-exported wholesale (`export * from "vue"`)
    pub star_outside: Vec<String>,
}

/// A chunk is the entry module plus every local module it reaches
#[derive(Debug, Clone)]
pub struct Chunk {
    pub entry: EntryId,

    /// Registry key of the entry module
    pub entry_key: String,

    /// Modules in evaluation order, entry last
    pub modules: Vec<ChunkModule>,

    /// Keys supplied from outside the chunk: externals and sibling entries,
    /// in first-use order
    pub outside: Vec<String>,

    pub exports: ChunkExports,

    /// `(module key, css)` in evaluation order, for the extracted stylesheet
    pub css: Vec<(String, String)>,

    /// Whether any module injects styles at runtime
    pub injects_style: bool,
}

impl Chunk {
    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.modules.len()
    }
}
