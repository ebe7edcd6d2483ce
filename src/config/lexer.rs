//! Lexer (tokenizer) for the configuration language.

use crate::error::{CapError, Result};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text; string tokens hold the unquoted contents
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types of the configuration language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Section keyword or entry key; may contain '-'
    Identifier,
    /// Double-quoted string
    String,
    /// Integer or float with optional sign and exponent
    Number,
    /// Open brace '{'
    OpenBrace,
    /// Close brace '}'
    CloseBrace,
    /// Equals sign '='
    Equals,
    /// List separator ','
    Comma,
    /// End of input
    Eof,
}

/// Lexer for tokenizing configuration input.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments()?;

        let (line, column) = (self.line, self.column);
        let token = |kind, text: String| Token {
            kind,
            text,
            line,
            column,
        };

        let ch = match self.chars.peek().copied() {
            Some(ch) => ch,
            None => return Ok(token(TokenKind::Eof, String::new())),
        };

        let single = match ch {
            '{' => Some(TokenKind::OpenBrace),
            '}' => Some(TokenKind::CloseBrace),
            '=' => Some(TokenKind::Equals),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(token(kind, ch.to_string()));
        }

        match ch {
            '"' => {
                let text = self.read_string()?;
                Ok(token(TokenKind::String, text))
            }
            '-' | '+' | '.' | '0'..='9' => {
                let text = self.read_number();
                if text.parse::<f64>().is_err() {
                    return Err(CapError::lexer(
                        line,
                        column,
                        format!("malformed number '{}'", text),
                    ));
                }
                Ok(token(TokenKind::Number, text))
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                let text = self.read_identifier();
                Ok(token(TokenKind::Identifier, text))
            }
            _ => Err(CapError::lexer(
                line,
                column,
                format!("unexpected character '{}'", ch),
            )),
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                self.skip_line();
            } else if ch == '/' {
                let (line, column) = (self.line, self.column);
                self.advance();
                match self.chars.peek() {
                    Some('/') => self.skip_line(),
                    Some('*') => {
                        self.advance();
                        self.skip_block_comment(line, column)?;
                    }
                    _ => {
                        return Err(CapError::lexer(line, column, "unexpected character '/'"));
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn skip_line(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, line: usize, column: usize) -> Result<()> {
        let mut star = false;
        while let Some(c) = self.advance() {
            if star && c == '/' {
                return Ok(());
            }
            star = c == '*';
        }
        Err(CapError::lexer(line, column, "unterminated comment"))
    }

    fn read_string(&mut self) -> Result<String> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(text),
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c) => text.push(c),
                    None => break,
                },
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(CapError::lexer(line, column, "unterminated string"))
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    fn read_number(&mut self) -> String {
        let mut text = String::new();

        if let Some(&ch) = self.chars.peek() {
            if ch == '-' || ch == '+' {
                text.push(ch);
                self.advance();
            }
        }

        self.read_digits(&mut text);
        if let Some('.') = self.chars.peek() {
            text.push('.');
            self.advance();
            self.read_digits(&mut text);
        }

        if let Some(&ch) = self.chars.peek() {
            if ch == 'e' || ch == 'E' {
                text.push(ch);
                self.advance();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '-' || sign == '+' {
                        text.push(sign);
                        self.advance();
                    }
                }
                self.read_digits(&mut text);
            }
        }
        text
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            out.push(tok.kind);
            if tok.kind == TokenKind::Eof {
                return out;
            }
        }
    }

    #[test]
    fn test_lexer_section() {
        use TokenKind::*;
        assert_eq!(
            kinds(r#"layer "top" { z-order = 2 objects = {"a", "b"} }"#),
            vec![
                Identifier, String, OpenBrace, Identifier, Equals, Number, Identifier, Equals,
                OpenBrace, String, Comma, String, CloseBrace, CloseBrace, Eof
            ]
        );
    }

    #[test]
    fn test_lexer_token_text() {
        let mut lexer = Lexer::new("file-pos = -1.5e-3\n  \"a b\"");
        let key = lexer.next_token().unwrap();
        assert_eq!(key.text, "file-pos");
        lexer.next_token().unwrap();
        let num = lexer.next_token().unwrap();
        assert_eq!(num.text, "-1.5e-3");
        let s = lexer.next_token().unwrap();
        assert_eq!(s.text, "a b");
        assert_eq!((s.line, s.column), (2, 3));
    }

    #[test]
    fn test_lexer_comments() {
        use TokenKind::*;
        let input = "# hash\nnet // slashes\n/* block\n spanning */ \"n\"";
        assert_eq!(kinds(input), vec![Identifier, String, Eof]);
    }

    #[test]
    fn test_lexer_errors() {
        assert!(matches!(
            Lexer::new("\"open").next_token(),
            Err(CapError::LexerError { line: 1, column: 1, .. })
        ));
        assert!(Lexer::new("/* never closed").next_token().is_err());
        assert!(Lexer::new("  @").next_token().is_err());
        assert!(Lexer::new("-").next_token().is_err());
    }
}
