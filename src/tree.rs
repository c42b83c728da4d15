// パス: src/tree.rs
// 役割: While 言語の値である二分木と、その木記法へのエンコーダを提供する
// 意図: 応答行に埋め込まれた値を不変の構造として扱い、表示・直列化を一箇所に集める
// 関連ファイル: src/parser.rs, src/convert.rs, src/session/state.rs
//! 二分木の値表現
//!
//! - `nil` か `<L.R>` のどちらか。構造的等価で比較する。
//! - 表示（`Display`）が木記法へのエンコーダを兼ねる。空白は一切挟まない。

use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BinaryTree {
    #[default]
    Nil,
    Node(Box<BinaryTree>, Box<BinaryTree>),
}

impl BinaryTree {
    /// 左右の部分木から節点を作る。
    pub fn node(left: BinaryTree, right: BinaryTree) -> Self {
        BinaryTree::Node(Box::new(left), Box::new(right))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, BinaryTree::Nil)
    }

    /// 節点なら (左, 右) を借用で返す。
    pub fn children(&self) -> Option<(&BinaryTree, &BinaryTree)> {
        match self {
            BinaryTree::Nil => None,
            BinaryTree::Node(l, r) => Some((l, r)),
        }
    }

    /// 木記法の文字列へ変換する（`to_string` と同じ）。
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl Drop for BinaryTree {
    // 既定の再帰的な解放は長いスパインでスタックを使い切るため、子を取り出して順に落とす。
    fn drop(&mut self) {
        let mut stack = Vec::new();
        if let BinaryTree::Node(l, r) = self {
            stack.push(std::mem::take(&mut **l));
            stack.push(std::mem::take(&mut **r));
        }
        while let Some(mut tree) = stack.pop() {
            if let BinaryTree::Node(l, r) = &mut tree {
                stack.push(std::mem::take(&mut **l));
                stack.push(std::mem::take(&mut **r));
            }
        }
    }
}

enum Emit<'a> {
    Tree(&'a BinaryTree),
    Text(&'static str),
}

impl fmt::Display for BinaryTree {
    // 自然数の右スパインは深くなりやすいので、再帰せず明示スタックで書き出す。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Emit::Tree(self)];
        while let Some(item) = stack.pop() {
            match item {
                Emit::Text(s) => f.write_str(s)?,
                Emit::Tree(BinaryTree::Nil) => f.write_str("nil")?,
                Emit::Tree(BinaryTree::Node(l, r)) => {
                    f.write_str("<")?;
                    stack.push(Emit::Text(">"));
                    stack.push(Emit::Tree(r));
                    stack.push(Emit::Text("."));
                    stack.push(Emit::Tree(l));
                }
            }
        }
        Ok(())
    }
}

impl Serialize for BinaryTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
