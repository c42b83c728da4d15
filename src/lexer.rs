// パス: src/lexer.rs
// 役割: 木記法 `nil | <L.R>` の字句解析器とトークン定義を提供する
// 意図: 構文解析に必要な位置付きトークンを生成し、未知の文字列は即座に拒否する
// 関連ファイル: src/parser.rs, src/errors.rs, tests/tree_notation.rs
//! 字句解析モジュール
//!
//! - 認識するのは `<` `>` `.` と予約語 `nil` の 4 種類のみ。
//! - 空白の読み飛ばしは行わない（文法上、空白は現れない）。
//! - 綴りの崩れた予約語（`ni`, `nill` など）は英数字の連なり全体を名指しして失敗する。

use std::fmt;

use crate::errors::LexError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// 生成されたトークンとその位置情報を保持するレコード。
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 字句解析で識別されるトークンの分類。
pub enum TokenKind {
    OPEN,  // `<`
    CLOSE, // `>`
    DOT,   // `.`
    NIL,   // `nil`
}

impl TokenKind {
    /// ソース上の綴り。
    pub fn text(self) -> &'static str {
        match self {
            TokenKind::OPEN => "<",
            TokenKind::CLOSE => ">",
            TokenKind::DOT => ".",
            TokenKind::NIL => "nil",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

struct Lexer<'a> {
    src: &'a str,
    cursor: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            cursor: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.peek_char() {
            if self.try_symbol(ch) {
                continue;
            }
            if ch.is_ascii_alphabetic() {
                self.lex_keyword()?;
                continue;
            }
            return Err(self.err(ch.to_string(), self.cursor));
        }
        Ok(self.tokens)
    }

    fn try_symbol(&mut self, ch: char) -> bool {
        let kind = match ch {
            '<' => TokenKind::OPEN,
            '>' => TokenKind::CLOSE,
            '.' => TokenKind::DOT,
            _ => return false,
        };
        self.tokens.push(Token {
            kind,
            pos: self.cursor,
        });
        self.cursor += ch.len_utf8();
        true
    }

    fn lex_keyword(&mut self) -> Result<(), LexError> {
        let start = self.cursor;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphanumeric() {
                self.cursor += ch.len_utf8();
            } else {
                break;
            }
        }
        let word = &self.src[start..self.cursor];
        if word != "nil" {
            return Err(self.err(word.to_string(), start));
        }
        self.tokens.push(Token {
            kind: TokenKind::NIL,
            pos: start,
        });
        Ok(())
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.cursor..].chars().next()
    }

    fn err(&self, text: String, pos: usize) -> LexError {
        LexError::with_snippet(
            "LEX001",
            format!("unrecognized token {:?}", text),
            Some(pos),
            self.src,
        )
    }
}

/// 木記法の文字列をトークン列へ変換する。
pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).run()
}

#[cfg(test)]
mod tests {
    use super::{lex, TokenKind};

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_all_four_shapes_in_order() {
        use TokenKind::*;
        assert_eq!(kinds("<nil.nil>"), vec![OPEN, NIL, DOT, NIL, CLOSE]);
        assert_eq!(kinds(""), vec![]);
    }

    #[test]
    fn records_byte_positions() {
        let toks = lex("<nil.<nil.nil>>").unwrap();
        let pos: Vec<usize> = toks.iter().map(|t| t.pos).collect();
        assert_eq!(pos, vec![0, 1, 4, 5, 6, 9, 10, 13, 14]);
    }

    #[test]
    fn whitespace_is_not_tolerated() {
        let err = lex("<nil .nil>").unwrap_err();
        assert_eq!(err.0.pos, Some(4));
        assert!(err.0.msg.contains("\" \""));
    }

    #[test]
    fn overlong_keyword_is_named_whole() {
        let err = lex("<nill.nil>").unwrap_err();
        assert!(err.0.msg.contains("\"nill\""), "{}", err);
    }
}
