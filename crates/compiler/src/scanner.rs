//! Lexical scanner for ALAN-2022
//!
//! Converts the source character stream into a lazy sequence of tokens. The
//! parser pulls one token at a time with [`Scanner::get_token`]; nothing is
//! buffered beyond the single in-flight string literal.
//!
//! Lexical rules:
//! - Identifiers start with a letter or underscore and continue with
//!   letters, digits and underscores, at most [`MAX_ID_LENGTH`] characters.
//! - Numbers are decimal and must fit in a signed 32-bit integer; the value
//!   is accumulated with an overflow check on every digit.
//! - Strings are double-quoted, printable ASCII only. The accepted escapes
//!   `\n`, `\t`, `\"` and `\\` are stored verbatim (backslash plus letter)
//!   so the assembler interprets them inside `ldc` literals.
//! - Comments are `{ ... }` and nest recursively.

use crate::error::CompileError;
use crate::token::{lookup_reserved, Pos, Token, TokenKind};

/// Maximum identifier length in characters.
pub const MAX_ID_LENGTH: usize = 32;

/// The escape characters accepted inside string literals.
const STRING_ESCAPES: [u8; 4] = [b'n', b't', b'"', b'\\'];

fn is_printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

fn is_id_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_id_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// The lexical scanner. Owns the source bytes and the current position.
pub struct Scanner {
    src: Vec<u8>,
    index: usize,
    line: u32,
    col: u32,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            src: source.as_bytes().to_vec(),
            index: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.src.get(self.index + 1).copied()
    }

    /// Position of the character `peek` would return.
    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn advance(&mut self) {
        if let Some(b) = self.peek() {
            self.index += 1;
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    /// Advance to the next token, skipping whitespace and comments.
    pub fn get_token(&mut self) -> Result<Token, CompileError> {
        loop {
            match self.peek() {
                None => return Ok(Token::new(TokenKind::Eof, self.pos())),
                Some(b' ') | Some(b'\t') | Some(b'\n') => self.advance(),
                Some(b'{') => {
                    let open = self.pos();
                    self.skip_comment(open)?;
                }
                Some(b) if is_id_start(b) => return self.scan_word(),
                Some(b) if b.is_ascii_digit() => return self.scan_number(),
                Some(b'"') => return self.scan_string(),
                Some(b) => return self.scan_operator(b),
            }
        }
    }

    /// Skip a `{ ... }` comment, recursing on nested openers. `open` is the
    /// position of the outermost `{`, which is where an unclosed comment is
    /// reported.
    fn skip_comment(&mut self, open: Pos) -> Result<(), CompileError> {
        self.advance(); // consume '{'
        loop {
            match self.peek() {
                None => return Err(CompileError::at(open, "comment not closed")),
                Some(b'}') => {
                    self.advance();
                    return Ok(());
                }
                Some(b'{') => self.skip_comment(open)?,
                Some(_) => self.advance(),
            }
        }
    }

    /// Scan an identifier or reserved word.
    fn scan_word(&mut self) -> Result<Token, CompileError> {
        let start = self.pos();
        let mut lexeme = String::new();
        while let Some(b) = self.peek() {
            if !is_id_continue(b) {
                break;
            }
            lexeme.push(b as char);
            self.advance();
        }
        if lexeme.len() > MAX_ID_LENGTH {
            return Err(CompileError::at(start, "identifier too long"));
        }
        let kind = lookup_reserved(&lexeme).unwrap_or(TokenKind::Id(lexeme));
        Ok(Token::new(kind, start))
    }

    /// Scan a decimal number, checking for overflow on each digit.
    fn scan_number(&mut self) -> Result<Token, CompileError> {
        let start = self.pos();
        let mut value: i32 = 0;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            let digit = i32::from(b - b'0');
            if value > (i32::MAX - digit) / 10 {
                return Err(CompileError::at(start, "number too large"));
            }
            value = value * 10 + digit;
            self.advance();
        }
        Ok(Token::new(TokenKind::Num(value), start))
    }

    /// Scan a double-quoted string literal.
    fn scan_string(&mut self) -> Result<Token, CompileError> {
        let start = self.pos();
        self.advance(); // consume opening '"'
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(CompileError::at(start, "string not closed")),
                Some(b'"') => {
                    self.advance();
                    return Ok(Token::new(TokenKind::Str(text), start));
                }
                Some(b'\\') => {
                    let escape_pos = self.pos();
                    self.advance();
                    match self.peek() {
                        None => return Err(CompileError::at(start, "string not closed")),
                        Some(c) if STRING_ESCAPES.contains(&c) => {
                            text.push('\\');
                            text.push(c as char);
                            self.advance();
                        }
                        Some(c) => {
                            return Err(CompileError::at(
                                escape_pos,
                                format!("illegal escape code '\\{}' in string", c as char),
                            ));
                        }
                    }
                }
                Some(b) if is_printable(b) => {
                    text.push(b as char);
                    self.advance();
                }
                Some(b) => {
                    return Err(CompileError::at(
                        self.pos(),
                        format!("non-printable character (ASCII #{}) in string", b),
                    ));
                }
            }
        }
    }

    /// Scan punctuation and operators, applying the longest-match rule to
    /// the `<` and `>` families.
    fn scan_operator(&mut self, b: u8) -> Result<Token, CompileError> {
        let start = self.pos();
        let kind = match b {
            b'(' => TokenKind::LPar,
            b')' => TokenKind::RPar,
            b'[' => TokenKind::LBrack,
            b']' => TokenKind::RBrack,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Concat,
            b'=' => TokenKind::Eq,
            b':' => {
                if self.peek_next() == Some(b'=') {
                    self.advance();
                    TokenKind::Gets
                } else {
                    return Err(illegal_character(start, ':'));
                }
            }
            b'<' => match self.peek_next() {
                Some(b'=') => {
                    self.advance();
                    TokenKind::Le
                }
                Some(b'>') => {
                    self.advance();
                    TokenKind::Ne
                }
                _ => TokenKind::Lt,
            },
            b'>' => {
                if self.peek_next() == Some(b'=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            other => return Err(illegal_character(start, other as char)),
        };
        self.advance();
        Ok(Token::new(kind, start))
    }
}

fn illegal_character(pos: Pos, c: char) -> CompileError {
    CompileError::at(pos, format!("illegal character '{}' (ASCII #{})", c, c as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut kinds = Vec::new();
        loop {
            let token = scanner.get_token().unwrap();
            let done = token.kind == TokenKind::Eof;
            kinds.push(token.kind);
            if done {
                break;
            }
        }
        kinds
    }

    fn scan_err(source: &str) -> CompileError {
        let mut scanner = Scanner::new(source);
        loop {
            match scanner.get_token() {
                Ok(token) if token.kind == TokenKind::Eof => panic!("no error in {:?}", source),
                Ok(_) => continue,
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn test_every_reserved_word_tokenizes() {
        let source = "and array begin boolean call do else elsif end false \
                      function get if integer leave not or put relax rem \
                      source then to true while";
        let kinds = scan_all(source);
        assert_eq!(kinds.len(), 26); // 25 keywords + EOF
        assert_eq!(kinds[0], TokenKind::And);
        assert_eq!(kinds[24], TokenKind::While);
        assert!(!kinds.iter().any(|k| matches!(k, TokenKind::Id(_))));
    }

    #[test]
    fn test_identifiers_and_numbers() {
        let kinds = scan_all("x _tmp x2 42 0");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Id("x".into()),
                TokenKind::Id("_tmp".into()),
                TokenKind::Id("x2".into()),
                TokenKind::Num(42),
                TokenKind::Num(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_identifier_length_boundary() {
        let ok = "a".repeat(32);
        assert_eq!(scan_all(&ok)[0], TokenKind::Id(ok.clone()));

        let long = "a".repeat(33);
        let err = scan_err(&long);
        assert_eq!(err.message, "identifier too long");
    }

    #[test]
    fn test_number_overflow_boundary() {
        assert_eq!(scan_all("2147483647")[0], TokenKind::Num(i32::MAX));
        let err = scan_err("2147483648");
        assert_eq!(err.message, "number too large");
        assert_eq!(err.pos, Some(Pos::new(1, 1)));
    }

    #[test]
    fn test_relational_operators_tokenize_distinctly() {
        let kinds = scan_all("< <= <> > >= = :=");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Ne,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::Eq,
                TokenKind::Gets,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_stray_colon_is_illegal() {
        let err = scan_err("x : y");
        assert_eq!(err.message, "illegal character ':' (ASCII #58)");
        assert_eq!(err.pos, Some(Pos::new(1, 3)));
    }

    #[test]
    fn test_illegal_character() {
        let err = scan_err("x @ y");
        assert_eq!(err.message, "illegal character '@' (ASCII #64)");
    }

    #[test]
    fn test_string_with_accepted_escapes() {
        let kinds = scan_all(r#""a\nb\tc\"d\\e""#);
        assert_eq!(kinds[0], TokenKind::Str(r#"a\nb\tc\"d\\e"#.into()));
    }

    #[test]
    fn test_string_with_illegal_escapes() {
        for c in ['a', 'b', 'f', 'r', 'v', '\'', '?'] {
            let source = format!("\"x\\{}y\"", c);
            let err = scan_err(&source);
            assert_eq!(
                err.message,
                format!("illegal escape code '\\{}' in string", c)
            );
        }
    }

    #[test]
    fn test_string_not_closed() {
        let err = scan_err("\"abc");
        assert_eq!(err.message, "string not closed");
        assert_eq!(err.pos, Some(Pos::new(1, 1)));
    }

    #[test]
    fn test_string_with_non_printable() {
        let err = scan_err("\"a\x01b\"");
        assert_eq!(err.message, "non-printable character (ASCII #1) in string");
    }

    #[test]
    fn test_newline_in_string_is_non_printable() {
        let err = scan_err("\"a\nb\"");
        assert_eq!(err.message, "non-printable character (ASCII #10) in string");
    }

    #[test]
    fn test_comments_are_skipped() {
        let kinds = scan_all("x { a comment } y");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Id("x".into()),
                TokenKind::Id("y".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_comments_three_deep() {
        let kinds = scan_all("a { one { two { three } two } one } b");
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[1], TokenKind::Id("b".into()));
    }

    #[test]
    fn test_unclosed_comment_reports_outermost_brace() {
        let err = scan_err("x { outer { inner }");
        assert_eq!(err.message, "comment not closed");
        assert_eq!(err.pos, Some(Pos::new(1, 3)));
    }

    #[test]
    fn test_close_brace_outside_comment_is_illegal() {
        let err = scan_err("x } y");
        assert_eq!(err.message, "illegal character '}' (ASCII #125)");
    }

    #[test]
    fn test_positions_track_lines_and_columns() {
        let mut scanner = Scanner::new("ab\n  cd\ne");
        assert_eq!(scanner.get_token().unwrap().pos, Pos::new(1, 1));
        assert_eq!(scanner.get_token().unwrap().pos, Pos::new(2, 3));
        assert_eq!(scanner.get_token().unwrap().pos, Pos::new(3, 1));
        let eof = scanner.get_token().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.pos.line, 3);
    }

    #[test]
    fn test_line_count_matches_newlines_consumed() {
        let mut scanner = Scanner::new("a\nb\nc\n");
        while scanner.get_token().unwrap().kind != TokenKind::Eof {}
        assert_eq!(scanner.line, 4);
    }

    #[test]
    fn test_punctuation_sequence() {
        let kinds = scan_all("( ) [ ] + - * / ; , .");
        assert_eq!(
            kinds,
            vec![
                TokenKind::LPar,
                TokenKind::RPar,
                TokenKind::LBrack,
                TokenKind::RBrack,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Semicolon,
                TokenKind::Comma,
                TokenKind::Concat,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_adjacent_operators_longest_match() {
        // '<' directly followed by '=' is one token; '<' followed by
        // anything else stands alone.
        let kinds = scan_all("a<=b<c");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Id("a".into()),
                TokenKind::Le,
                TokenKind::Id("b".into()),
                TokenKind::Lt,
                TokenKind::Id("c".into()),
                TokenKind::Eof,
            ]
        );
    }
}
