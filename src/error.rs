//! Error types for the engraving core.
//!
//! Most rendering problems are recovered locally (a missing glyph is skipped,
//! an infeasible slur keeps its best partial shape). The variants below cover
//! the cases that must reach the caller.

use thiserror::Error;

use crate::model::MusicKind;

/// Top-level error type
#[derive(Debug, Error)]
pub enum EngraveError {
    /// Typed access on an element of another kind
    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch { expected: MusicKind, found: MusicKind },

    /// A glyph code is not present in the resource table
    #[error("glyph U+{0:04X} not found in font resources")]
    MissingGlyph(u32),

    /// Oblique ligature points requested without the following note
    #[error("oblique ligature note '{0}' has no following note")]
    MissingObliqueNeighbor(String),

    /// Font resource files are malformed or incomplete
    #[error("invalid font resource: {0}")]
    Resource(String),

    /// XML parsing failed
    #[error("XML parsing failed: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Options could not be parsed
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),

    /// Reading a resource file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngraveError>;
