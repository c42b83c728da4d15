// パス: src/convert.rs
// 役割: 二分木と自然数・木のリスト・自然数のリストの相互変換
// 意図: 応答から読んだ木を呼び出し側が扱いやすい値へ写し、逆方向も提供する
// 関連ファイル: src/tree.rs, src/errors.rs, tests/tree_notation.rs
//! 値変換
//!
//! - 自然数 n は `Node(Nil, …)` を n 段重ねた右スパインで表す（単項表現）。
//! - 整数への読み取りは右スパインの長さを数えるだけで、左部分木は無視する。
//! - リストは右スパインを cons セルとみなし、各節点の左部分木を要素とする。

use crate::errors::DomainError;
use crate::tree::BinaryTree;

/// 右スパインの長さを自然数として読む。
pub fn to_integer(tree: &BinaryTree) -> u64 {
    let mut n = 0;
    let mut cur = tree;
    while let Some((_, r)) = cur.children() {
        n += 1;
        cur = r;
    }
    n
}

/// 自然数を単項表現の木にする。負数は値域外。
pub fn to_tree(n: i64) -> Result<BinaryTree, DomainError> {
    if n < 0 {
        return Err(DomainError::negative(n));
    }
    Ok(unary(n as u64))
}

fn unary(n: u64) -> BinaryTree {
    (0..n).fold(BinaryTree::Nil, |acc, _| BinaryTree::node(BinaryTree::Nil, acc))
}

/// 右スパインをたどり、各節点の左部分木を順に集める。
pub fn tree_to_list(tree: &BinaryTree) -> Vec<BinaryTree> {
    let mut items = Vec::new();
    let mut cur = tree;
    while let Some((head, tail)) = cur.children() {
        items.push(head.clone());
        cur = tail;
    }
    items
}

/// 要素列を右から畳み込み、`nil` で終わる cons 列を作る。
pub fn list_to_tree(items: &[BinaryTree]) -> BinaryTree {
    items
        .iter()
        .rev()
        .fold(BinaryTree::Nil, |acc, head| BinaryTree::node(head.clone(), acc))
}

/// cons 列の各要素を自然数として読む。
pub fn tree_to_int_list(tree: &BinaryTree) -> Vec<u64> {
    let mut items = Vec::new();
    let mut cur = tree;
    while let Some((head, tail)) = cur.children() {
        items.push(to_integer(head));
        cur = tail;
    }
    items
}

/// 自然数列を cons 列の木にする。負の要素があれば失敗する。
pub fn int_list_to_tree(items: &[i64]) -> Result<BinaryTree, DomainError> {
    let heads = items
        .iter()
        .map(|&n| to_tree(n))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(list_to_tree(&heads))
}
