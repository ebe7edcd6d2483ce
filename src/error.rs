//! Error types for the capacitance calculator.
//!
//! This module provides a unified error type [`CapError`] that covers
//! all error conditions that can occur while reading a configuration,
//! building the grid, relaxing the field and writing results.

use thiserror::Error;

use crate::geometry::V3i;

/// Result type alias using [`CapError`].
pub type Result<T> = std::result::Result<T, CapError>;

/// Unified error type for all capacitance operations.
#[derive(Error, Debug)]
pub enum CapError {
    // ============ Configuration Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Section of unknown kind
    #[error("Unknown section '{kind}' at line {line}")]
    UnknownSection { kind: String, line: usize },

    /// Required key absent from a section
    #[error("Missing key '{key}' in {section} '{name}'")]
    MissingKey {
        section: &'static str,
        name: String,
        key: &'static str,
    },

    /// Key present but with an unusable value
    #[error("Invalid value for '{key}' in '{name}' at line {line}: {message}")]
    InvalidValue {
        name: String,
        key: String,
        line: usize,
        message: String,
    },

    /// Reference to a material that was never defined
    #[error("Unknown material '{material}' referenced by '{owner}'")]
    UnknownMaterial { material: String, owner: String },

    /// Reference to an object that was never defined
    #[error("Unknown object '{object}' referenced by '{owner}'")]
    UnknownObject { object: String, owner: String },

    /// Reference to a layer that was never defined
    #[error("Unknown layer '{layer}' referenced by '{owner}'")]
    UnknownLayer { layer: String, owner: String },

    /// Two definitions of the same kind share a name
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    /// No space section was given
    #[error("Configuration defines no space")]
    MissingSpace,

    /// More than one space section was given
    #[error("Only one space can be defined (found second space '{name}')")]
    DuplicateSpace { name: String },

    // ============ Geometry Errors ============
    /// Absolute coordinate outside the loaded region
    #[error("Position {pos} is outside the loaded region")]
    OutOfBounds { pos: V3i },

    /// Block normalisation stepped off the edge of the lattice
    #[error("Block at {block} has no {direction} neighbour")]
    MissingNeighbour { block: V3i, direction: &'static str },

    /// A net without any objects
    #[error("Net '{net}' has no objects")]
    EmptyNet { net: String },

    /// Bitmap operation that needs at least one occupied cell
    #[error("Object '{object}' has an empty bitmap")]
    EmptyBitmap { object: String },

    /// Geometry that cannot be rasterised
    #[error("Invalid geometry for '{name}': {message}")]
    InvalidGeometry { name: String, message: String },

    /// Object accessed while its bitmap is not loaded
    #[error("Object '{object}' is not loaded")]
    ObjectNotLoaded { object: String },

    /// Space operation on a space without layers
    #[error("Space '{space}' has no layers")]
    NoLayers { space: String },

    /// Two layers claim the same z-order
    #[error("Layers '{first}' and '{second}' share z-order {z_order}")]
    DuplicateZOrder {
        first: String,
        second: String,
        z_order: i32,
    },

    /// Grid access on a space that has no loaded region
    #[error("Space '{space}' is not loaded")]
    SpaceNotLoaded { space: String },

    /// Structural change attempted while a region is loaded
    #[error("Space '{space}' must be unloaded first")]
    SpaceLoaded { space: String },

    // ============ Allocation Errors ============
    /// Dense array growth failed
    #[error("Failed to allocate {elements} elements for {what}")]
    Allocation { what: &'static str, elements: usize },

    // ============ Solver Errors ============
    /// Invalid run parameter
    #[error("Invalid solver parameter: {message}")]
    InvalidSolverParam { message: String },

    /// Restart state does not describe the configured nets
    #[error("Saved state does not match configuration: {message}")]
    StateMismatch { message: String },

    // ============ I/O Errors ============
    /// Error reading the configuration file
    #[error("Failed to read configuration file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error decoding an image object
    #[error("Failed to load image '{path}': {source}")]
    ImageError {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// Error reading or writing the restart state
    #[error("Restart state error for '{path}': {source}")]
    StateError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed restart state
    #[error("Malformed restart state '{path}': {source}")]
    StateFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Error writing results or dumps
    #[error("Output error for '{path}': {source}")]
    OutputError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CapError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        name: impl Into<String>,
        key: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name: name.into(),
            key: key.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an invalid geometry error
    pub fn invalid_geometry(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a solver parameter error
    pub fn solver_param(message: impl Into<String>) -> Self {
        Self::InvalidSolverParam {
            message: message.into(),
        }
    }
}

/// Allocate a vector of `len` copies of `value`, reporting failure instead of aborting.
pub(crate) fn try_filled<T: Clone>(what: &'static str, len: usize, value: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| CapError::Allocation { what, elements: len })?;
    v.resize(len, value);
    Ok(v)
}
