// パス: src/repl/printer.rs
// 役割: Helpers for rendering console help and session results
// 意図: Keep console messaging consistent across commands and output formats
// 関連ファイル: src/repl/cmd.rs, src/session/state.rs, src/convert.rs
//! コンソールで用いるヘルプメッセージと結果出力を集約したモジュール。
//! 表示形式（テキスト / JSON）を一箇所にまとめ、出力を統一する。

use std::io::{self, Write};

use serde::Serialize;

use super::cmd::ConsoleMsg;
use crate::convert::to_integer;
use crate::session::{Cause, Outcome, SessionState};
use crate::tree::BinaryTree;

const HELP_TEXT: &str = concat!(
    "利用可能なコマンド:\n",
    "  :help              ヘルプ（本メッセージ + インタプリタのヘルプ）\n",
    "  :load PROG EXPR    プログラムを入力 EXPR で読み込む\n",
    "  :run               次のブレークポイントか完了まで実行\n",
    "  :step              1 文だけ実行\n",
    "  :store             変数の束縛を表示\n",
    "  :break             ブレークポイント一覧\n",
    "  :break N [PROG]    ブレークポイントを追加\n",
    "  :delbreak N [PROG] ブレークポイントを削除\n",
    "  :cd DIR            インタプリタの作業ディレクトリを変更\n",
    "  :state             手元の状態スナップショットを表示\n",
    "  :quit              終了\n",
    "  それ以外の入力はそのままインタプリタへ送る\n",
);

/// 結果の書き出し形式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// ヘルプメッセージを任意のライターへ描画する。
pub(crate) fn render_help<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(HELP_TEXT.as_bytes())
}

/// 木を記法と整数読みの両方で表す。
fn describe_tree(value: &BinaryTree) -> String {
    format!("{} ({})", value, to_integer(value))
}

fn write_state<W: Write>(out: &mut W, state: &SessionState) -> io::Result<()> {
    let program = state.program.as_deref().unwrap_or("-");
    let line = state
        .line
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".into());
    writeln!(
        out,
        "  [{:?}] program={} line={} done={}",
        state.phase(),
        program,
        line,
        state.done
    )?;
    if let Some(vars) = state.variables() {
        for (name, value) in vars {
            writeln!(out, "    {} = {}", name, describe_tree(value))?;
        }
    }
    for (program, lines) in &state.breakpoints {
        let lines: Vec<String> = lines.iter().map(u32::to_string).collect();
        writeln!(out, "    break {}: {}", program, lines.join(", "))?;
    }
    Ok(())
}

fn write_outcome<W: Write>(out: &mut W, outcome: &Outcome) -> io::Result<()> {
    match &outcome.cause {
        Cause::Done { variable, value } => {
            writeln!(out, "done: {} = {}", variable, describe_tree(value))?
        }
        Cause::Breakpoint { line, note: None } => writeln!(out, "breakpoint: line {}", line)?,
        Cause::Breakpoint {
            line,
            note: Some(note),
        } => writeln!(out, "breakpoint: line {}: {}", line, note)?,
        Cause::Start { variable, value } => {
            writeln!(out, "start: {} = {}", variable, describe_tree(value))?
        }
        Cause::LoopExit => writeln!(out, "loop exit")?,
    }
    write_state(out, &outcome.state)
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    let text = serde_json::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writeln!(out, "{}", text)
}

/// メッセージを任意のライターへ書き出す。
pub(crate) fn write_msg<W: Write>(out: &mut W, msg: &ConsoleMsg, format: OutputFormat) -> io::Result<()> {
    if format == OutputFormat::Json {
        return match msg {
            ConsoleMsg::Lines(lines) => write_json(out, lines),
            ConsoleMsg::Outcome(o) => write_json(out, o),
            ConsoleMsg::State(s) => write_json(out, s),
            ConsoleMsg::Store(b) => write_json(out, b),
            ConsoleMsg::Breakpoints(m) => write_json(out, m),
            ConsoleMsg::Err(s) => write_json(out, &serde_json::json!({ "error": s })),
        };
    }
    match msg {
        ConsoleMsg::Err(s) => writeln!(out, "{}", s),
        ConsoleMsg::Lines(lines) => {
            for line in lines {
                writeln!(out, "{}", line)?;
            }
            Ok(())
        }
        ConsoleMsg::Outcome(o) => write_outcome(out, o),
        ConsoleMsg::State(s) => write_state(out, s),
        ConsoleMsg::Store(bindings) => {
            for (program, vars) in bindings {
                for (name, value) in vars {
                    writeln!(out, "({}) {} = {}", program, name, describe_tree(value))?;
                }
            }
            Ok(())
        }
        ConsoleMsg::Breakpoints(map) => {
            if map.is_empty() {
                return writeln!(out, "(ブレークポイントなし)");
            }
            for (program, lines) in map {
                for line in lines {
                    writeln!(out, "{}: line {}", program, line)?;
                }
            }
            Ok(())
        }
    }
}
