//! Parser for the configuration language.

use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{CapError, Result};

/// Recursive-descent parser over a [`Lexer`].
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a parser and read the first token.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the whole input.
    pub fn parse(&mut self) -> Result<ConfigAst> {
        let mut ast = ConfigAst::new();
        while self.current.kind != TokenKind::Eof {
            ast.sections.push(self.parse_section()?);
        }
        Ok(ast)
    }

    fn advance(&mut self) -> Result<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.current.kind == kind {
            self.advance()
        } else {
            Err(CapError::parse(
                self.current.line,
                format!("expected {}, got {}", what, describe(&self.current)),
            ))
        }
    }

    fn parse_section(&mut self) -> Result<Section> {
        let keyword = self.expect(TokenKind::Identifier, "section keyword")?;
        let kind = SectionKind::from_keyword(&keyword.text).ok_or_else(|| {
            CapError::UnknownSection {
                kind: keyword.text.clone(),
                line: keyword.line,
            }
        })?;
        let title = self.expect(TokenKind::String, "section title")?;
        self.expect(TokenKind::OpenBrace, "'{'")?;

        let mut entries: Vec<Entry> = Vec::new();
        while self.current.kind != TokenKind::CloseBrace {
            let entry = self.parse_entry()?;
            if entries.iter().any(|e| e.key == entry.key) {
                return Err(CapError::parse(
                    entry.line,
                    format!("duplicate key '{}' in {} '{}'", entry.key, kind.keyword(), title.text),
                ));
            }
            entries.push(entry);
        }
        self.advance()?;

        Ok(Section {
            kind,
            title: title.text,
            entries,
            line: keyword.line,
        })
    }

    fn parse_entry(&mut self) -> Result<Entry> {
        let key = self.expect(TokenKind::Identifier, "key")?;
        self.expect(TokenKind::Equals, "'='")?;
        let value = self.parse_value()?;
        Ok(Entry {
            key: key.text,
            value,
            line: key.line,
        })
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.current.kind {
            TokenKind::String => Ok(Value::Str(self.advance()?.text)),
            TokenKind::Number => {
                let tok = self.advance()?;
                tok.text
                    .parse::<f64>()
                    .map(Value::Number)
                    .map_err(|_| {
                        CapError::parse(tok.line, format!("invalid number '{}'", tok.text))
                    })
            }
            TokenKind::OpenBrace => {
                self.advance()?;
                let mut items = Vec::new();
                if self.current.kind != TokenKind::CloseBrace {
                    loop {
                        let item = self.parse_value()?;
                        if let Value::List(_) = item {
                            return Err(CapError::parse(
                                self.current.line,
                                "nested lists are not allowed",
                            ));
                        }
                        items.push(item);
                        if self.current.kind == TokenKind::Comma {
                            self.advance()?;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::CloseBrace, "',' or '}'")?;
                Ok(Value::List(items))
            }
            _ => Err(CapError::parse(
                self.current.line,
                format!("expected value, got {}", describe(&self.current)),
            )),
        }
    }
}

fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::String => format!("string \"{}\"", tok.text),
        _ => format!("'{}'", tok.text),
    }
}
