// パス: src/session/state.rs
// 役割: セッション状態のスナップショットと、run/step が返す結果型を定義する
// 意図: 状態を遷移ごとに丸ごと置き換える不変値として扱い、呼び出し側へそのまま返す
// 関連ファイル: src/session/mod.rs, src/session/protocol.rs, src/repl/printer.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::tree::BinaryTree;

/// プログラム名 → (変数名 → 値)。
pub type Bindings = BTreeMap<String, BTreeMap<String, BinaryTree>>;
/// プログラム名 → 停止行の集合。
pub type BreakpointMap = BTreeMap<String, BTreeSet<u32>>;

/// セッションの局面。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loaded,
    Paused,
    Completed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// 読み込み済みのプログラム名。未読み込みなら `None`。
    pub program: Option<String>,
    /// 停止中の行。読み込み直後は 0、実行完了後は `None`。
    pub line: Option<u32>,
    pub done: bool,
    pub bindings: Bindings,
    pub breakpoints: BreakpointMap,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match (&self.program, self.done, self.line) {
            (None, _, _) => Phase::Idle,
            (Some(_), true, _) => Phase::Completed,
            (Some(_), false, Some(0)) => Phase::Loaded,
            (Some(_), false, _) => Phase::Paused,
        }
    }

    /// 新しいプログラムを読み込んだ直後の状態。当該プログラムの束縛は捨てる。
    pub fn loaded(&self, program: &str) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.remove(program);
        Self {
            program: Some(program.to_string()),
            line: Some(0),
            done: false,
            bindings,
            breakpoints: self.breakpoints.clone(),
        }
    }

    /// 指定プログラムの指定行で停止した状態。
    pub fn paused_at(&self, program: &str, line: u32) -> Self {
        Self {
            program: Some(program.to_string()),
            line: Some(line),
            ..self.clone()
        }
    }

    /// 実行を終えた状態。
    pub fn completed(&self) -> Self {
        Self {
            line: None,
            done: true,
            ..self.clone()
        }
    }

    pub fn with_bindings(&self, bindings: Bindings) -> Self {
        Self {
            bindings,
            ..self.clone()
        }
    }

    pub fn with_breakpoints(&self, breakpoints: BreakpointMap) -> Self {
        Self {
            breakpoints,
            ..self.clone()
        }
    }

    /// 1 行分のブレークポイントを追加（`on = true`）または削除した状態。
    /// 空になったプログラムはキーごと取り除く。
    pub fn with_breakpoint(&self, program: &str, line: u32, on: bool) -> Self {
        let mut breakpoints = self.breakpoints.clone();
        if on {
            breakpoints.entry(program.to_string()).or_default().insert(line);
        } else if let Some(lines) = breakpoints.get_mut(program) {
            lines.remove(&line);
            if lines.is_empty() {
                breakpoints.remove(program);
            }
        }
        self.with_breakpoints(breakpoints)
    }

    /// 現在のプログラムの変数束縛。
    pub fn variables(&self) -> Option<&BTreeMap<String, BinaryTree>> {
        self.program.as_ref().and_then(|p| self.bindings.get(p))
    }
}

/// run/step が止まった理由。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "kebab-case")]
pub enum Cause {
    /// 出力変数が書き出され、実行が完了した。
    Done { variable: String, value: BinaryTree },
    /// ブレークポイント（step では各行）で停止した。
    Breakpoint {
        line: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// 入力変数が読み込まれた（step のみ）。
    Start { variable: String, value: BinaryTree },
    /// while ループを飛ばした・抜けた（step のみ）。
    LoopExit,
}

/// 停止理由と、その時点の状態スナップショット。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    #[serde(flatten)]
    pub cause: Cause,
    pub state: SessionState,
}
