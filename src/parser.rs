// パス: src/parser.rs
// 役割: トークン列から二分木を組み立てるパーサ
// 意図: 応答行の値を厳密に読み、末尾のゴミや欠けた子を見逃さない
// 関連ファイル: src/lexer.rs, src/tree.rs, src/errors.rs
//! 構文解析モジュール
//!
//! 文法: `tree := NIL | OPEN tree DOT tree CLOSE`
//!
//! - トークンが尽きたら「unexpected end of statement」。
//! - 規則に合わないトークン（括弧内の余分な要素・欠けた子・完結後の残り）は
//!   「unexpected token」として当該トークンを名指しする。

use crate::errors::{SyntaxError, TreeError};
use crate::lexer::{lex, Token, TokenKind};
use crate::tree::BinaryTree;

/// 読みかけの `<` 節点。左部分木を待つか、左を得て右部分木を待つか。
enum Open {
    Left,
    Right(BinaryTree),
}

pub struct Parser {
    ts: Vec<Token>,
    i: usize,
}

impl Parser {
    /// トークン列から新しいパーサインスタンスを構築する。
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { ts: tokens, i: 0 }
    }

    /// 木を 1 つ読み、全トークンを消費したことを確認する。
    pub fn parse_complete(mut self) -> Result<BinaryTree, SyntaxError> {
        let tree = self.parse_tree()?;
        if let Some(t) = self.ts.get(self.i) {
            return Err(SyntaxError::unexpected_token(t.kind, t.pos));
        }
        Ok(tree)
    }

    /// `tree` 規則を 1 つ分だけ読む。残りのトークンは検査しない。
    ///
    /// 自然数の右スパインは応答次第でいくらでも深くなるので、再帰せず明示スタックで組み立てる。
    pub fn parse_tree(&mut self) -> Result<BinaryTree, SyntaxError> {
        let mut stack: Vec<Open> = Vec::new();
        loop {
            let t = self.pop_any()?;
            let mut done = match t.kind {
                TokenKind::NIL => BinaryTree::Nil,
                TokenKind::OPEN => {
                    stack.push(Open::Left);
                    continue;
                }
                other => return Err(SyntaxError::unexpected_token(other, t.pos)),
            };
            // 完成した部分木を、待っている節点へ畳み込む
            loop {
                match stack.pop() {
                    None => return Ok(done),
                    Some(Open::Left) => {
                        self.pop(TokenKind::DOT)?;
                        stack.push(Open::Right(done));
                        break;
                    }
                    Some(Open::Right(left)) => {
                        self.pop(TokenKind::CLOSE)?;
                        done = BinaryTree::node(left, done);
                    }
                }
            }
        }
    }

    fn pop_any(&mut self) -> Result<Token, SyntaxError> {
        let t = self
            .ts
            .get(self.i)
            .cloned()
            .ok_or_else(SyntaxError::unexpected_end)?;
        self.i += 1;
        Ok(t)
    }

    fn pop(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        let t = self.pop_any()?;
        if t.kind != kind {
            return Err(SyntaxError::unexpected_token(t.kind, t.pos));
        }
        Ok(t)
    }
}

/// 木記法の文字列を字句解析・構文解析して二分木を返す。
pub fn parse_tree(src: &str) -> Result<BinaryTree, TreeError> {
    let ts = lex(src)?;
    Ok(Parser::new(ts).parse_complete()?)
}

#[cfg(test)]
mod tests {
    use super::parse_tree;
    use crate::errors::{SyntaxErrorKind, TreeError};
    use crate::tree::BinaryTree;

    fn syntax_kind(src: &str) -> SyntaxErrorKind {
        match parse_tree(src) {
            Err(TreeError::Syntax(e)) => e.kind(),
            other => panic!("expected syntax error for {:?}, got {:?}", src, other),
        }
    }

    #[test]
    fn parses_nil_and_nested_nodes() {
        assert_eq!(parse_tree("nil").unwrap(), BinaryTree::Nil);
        let t = parse_tree("<<nil.nil>.nil>").unwrap();
        assert_eq!(
            t,
            BinaryTree::node(BinaryTree::node(BinaryTree::Nil, BinaryTree::Nil), BinaryTree::Nil)
        );
    }

    #[test]
    fn trailing_tokens_after_complete_tree_are_rejected() {
        assert_eq!(syntax_kind("nil.nil"), SyntaxErrorKind::UnexpectedToken);
        assert_eq!(syntax_kind("<nil.nil>>"), SyntaxErrorKind::UnexpectedToken);
        assert_eq!(syntax_kind("nil<"), SyntaxErrorKind::UnexpectedToken);
    }

    #[test]
    fn errors_inside_nested_nodes_keep_their_kind() {
        assert_eq!(syntax_kind("<<nil.nil>.<nil"), SyntaxErrorKind::UnexpectedEnd);
        assert_eq!(syntax_kind("<<nil>.nil>"), SyntaxErrorKind::UnexpectedToken);
        assert_eq!(syntax_kind("<nil.<nil.nil.nil>>"), SyntaxErrorKind::UnexpectedToken);
        match parse_tree("<nil.<nil.>>") {
            Err(TreeError::Syntax(e)) => assert_eq!(e.0.pos, Some(10)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn deep_left_nesting_parses() {
        let depth = 50_000;
        let src = format!("{}nil{}", "<".repeat(depth), ".nil>".repeat(depth));
        let mut t = &parse_tree(&src).unwrap();
        let mut n = 0;
        while let Some((l, r)) = t.children() {
            assert!(r.is_nil());
            t = l;
            n += 1;
        }
        assert_eq!(n, depth);
    }

    #[test]
    fn empty_input_is_unexpected_end() {
        assert_eq!(syntax_kind(""), SyntaxErrorKind::UnexpectedEnd);
        assert_eq!(syntax_kind("<nil."), SyntaxErrorKind::UnexpectedEnd);
    }
}
