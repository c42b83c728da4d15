// パス: src/lib.rs
// 役割: Crate root wiring modules and exports
// 意図: Expose the tree codec and the REPL session driver with a small API surface
// 関連ファイル: src/tree.rs, src/parser.rs, src/session/mod.rs, src/errors.rs
//! HWhile セッションドライバ ルートモジュール
//!
//! 目的:
//! - 外部の HWhile REPL をテキストプロトコルで操作し、応答を型付きの状態へ変換する。
//! - 応答に埋め込まれた値（二分木の記法 `nil | <L.R>`）の読み書きを提供する。
//!
//! 方針:
//! - コメント/ドキュメントは日本語、識別子は英語。
//! - 応答形式はバージョン依存の契約として扱い、合わなければ推測せず失敗させる。
//! - パブリックAPIは最小限。

pub mod config;
pub mod convert;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod session;
pub mod tree;

// 便利な再エクスポート（木・エラー・セッションのみ直接参照可）
pub use crate::config::SessionConfig;
pub use crate::errors::*;
pub use crate::parser::parse_tree;
pub use crate::session::{Cause, Outcome, Session, SessionState};
pub use crate::tree::BinaryTree;

/// 二分木を木記法の文字列へエンコードする。
///
/// # Examples
/// ```
/// let t = hwhile::convert::to_tree(2).unwrap();
/// assert_eq!(hwhile::encode_tree(&t), "<nil.<nil.nil>>");
/// assert_eq!(hwhile::parse_tree("<nil.<nil.nil>>").unwrap(), t);
/// ```
pub fn encode_tree(tree: &BinaryTree) -> String {
    tree.encode()
}
