//! Parser for the sectioned geometry description.
//!
//! A description is a sequence of titled sections holding `key = value`
//! entries. Whitespace and newlines only separate tokens.
//!
//! # Grammar Overview
//!
//! ```text
//! config   = { section }
//! section  = kind string '{' { entry } '}'
//! kind     = "material" | "object" | "layer" | "space" | "net"
//! entry    = key '=' value
//! value    = string | number | '{' [ scalar { ',' scalar } ] '}'
//! scalar   = string | number
//!
//! key      = (letter | '_') { letter | digit | '_' | '-' }
//! string   = '"' { any_char | '\' any_char } '"'
//! number   = ['-'|'+'] digit* ['.' digit*] [('e'|'E') ['-'|'+'] digit+]
//! comment  = '#' ... newline | '//' ... newline | '/*' ... '*/'
//! ```
//!
//! # Sections
//!
//! | Section | Keys |
//! |---------|------|
//! | material | `type` (`metal`/`dielectric`), `permittivity`, `conductivity`, `permeability` |
//! | object | `position`, `material`, `type`, `size`, `radius`, `file`, `file-pos`, `role` |
//! | layer | `height`, `z-order`, `material`, `objects` |
//! | space | `step`, `layers` |
//! | net | `objects` |
//!
//! Object `type` is one of `rectangle`, `circle` or `image`; `role` is one of
//! `pin`, `net` or `none`.
//!
//! # Example
//!
//! ```text
//! material "air" { permittivity = 8.85e-12 }
//! material "copper" { type = "metal" }
//!
//! object "plate" {
//!     position = {10, 10}
//!     type = "rectangle"
//!     size = {100, 100}
//!     material = "copper"
//!     role = "net"
//! }
//!
//! layer "top" { height = 10 z-order = 1 material = "air" objects = {"plate"} }
//! space "board" { step = {1e-4, 1e-4, 1e-4} layers = {"top"} }
//! net "A" { objects = {"plate"} }
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;

use std::path::Path;

use crate::error::{CapError, Result};

/// Parse a configuration string into an AST.
pub fn parse(input: &str) -> Result<ConfigAst> {
    let mut parser = Parser::new(Lexer::new(input))?;
    parser.parse()
}

/// Parse a configuration file.
pub fn parse_file(path: &Path) -> Result<ConfigAst> {
    let content = std::fs::read_to_string(path).map_err(|e| CapError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
