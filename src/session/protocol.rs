// パス: src/session/protocol.rs
// 役割: インタプリタの応答テキストを正規表現で読み、型付きの結果へ変換する
// 意図: 応答形式は特定バージョンの出力に結び付いた契約として扱い、合わなければ推測せず失敗する
// 関連ファイル: src/session/mod.rs, src/session/framer.rs, src/parser.rs
//! 応答デコーダ
//!
//! 各関数はエコー行を除いた応答行を受け取り、最初の有意な行から判定する。
//! どのパターンにも合わない場合は `ProtocolParse` にその行（行がなければ生テキスト）を載せて返す。

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::framer::Frame;
use super::state::Bindings;
use crate::errors::{SessionError, SessionResult};
use crate::parser::parse_tree;
use crate::tree::BinaryTree;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect("応答パターンは常に有効"));
    };
}

pattern!(LOADED, r"^Program '([^']+)' loaded");
pattern!(WROTE, r"(?:^|\s)wrote (\S+) = (\S+)$");
pattern!(READ, r"(?:^|\s)read (\S+) = (\S+)$");
pattern!(HIT_BREAKPOINT, r"^Hit breakpoint\.$");
pattern!(AT_LINE, r"^(\S+), line (\d+):\s*(.*)$");
pattern!(LOOP_EXIT, r"^Skipped or exited while-loop\.$");
pattern!(STORE_ENTRY, r"^\((\S+)\) (\S+) = (\S+)$");
pattern!(BREAK_ENTRY, r"^Program '([^']+)', line (\d+)\.$");
pattern!(BREAK_SET, r"^Breakpoint set in program (\S+) at line (\d+)\.$");
pattern!(BREAK_REMOVED, r"^Breakpoint removed from program (\S+) at line (\d+)\.$");

/// `:run` の応答。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunReply {
    Wrote { variable: String, value: BinaryTree },
    Breakpoint { program: String, line: u32 },
}

/// `:step` の応答。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepReply {
    Read { variable: String, value: BinaryTree },
    Wrote { variable: String, value: BinaryTree },
    AtLine { program: String, line: u32, note: String },
    LoopExit,
}

/// ブレークポイントの追加・削除のどちらの応答を読むか。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakpointEdit {
    Set,
    Removed,
}

fn first_line<'a>(command: &str, frame: &'a Frame) -> SessionResult<&'a str> {
    frame
        .reply_lines()
        .first()
        .map(String::as_str)
        .ok_or_else(|| SessionError::protocol(command, frame.raw.as_str()))
}

fn line_number(command: &str, digits: &str, line: &str) -> SessionResult<u32> {
    digits
        .parse()
        .map_err(|_| SessionError::protocol(command, line))
}

/// `:load P EXPR` の応答から読み込まれたプログラム名を返す。
pub fn decode_load(command: &str, frame: &Frame) -> SessionResult<String> {
    let line = first_line(command, frame)?;
    let caps = LOADED
        .captures(line)
        .ok_or_else(|| SessionError::protocol(command, line))?;
    Ok(caps[1].to_string())
}

pub fn decode_run(command: &str, frame: &Frame) -> SessionResult<RunReply> {
    let line = first_line(command, frame)?;
    if let Some(caps) = WROTE.captures(line) {
        return Ok(RunReply::Wrote {
            variable: caps[1].to_string(),
            value: parse_tree(&caps[2])?,
        });
    }
    if HIT_BREAKPOINT.is_match(line) {
        let next = frame
            .reply_lines()
            .get(1)
            .map(String::as_str)
            .ok_or_else(|| SessionError::protocol(command, frame.raw.as_str()))?;
        let caps = AT_LINE
            .captures(next)
            .ok_or_else(|| SessionError::protocol(command, next))?;
        return Ok(RunReply::Breakpoint {
            program: caps[1].to_string(),
            line: line_number(command, &caps[2], next)?,
        });
    }
    Err(SessionError::protocol(command, line))
}

pub fn decode_step(command: &str, frame: &Frame) -> SessionResult<StepReply> {
    let line = first_line(command, frame)?;
    if let Some(caps) = READ.captures(line) {
        return Ok(StepReply::Read {
            variable: caps[1].to_string(),
            value: parse_tree(&caps[2])?,
        });
    }
    if let Some(caps) = WROTE.captures(line) {
        return Ok(StepReply::Wrote {
            variable: caps[1].to_string(),
            value: parse_tree(&caps[2])?,
        });
    }
    if let Some(caps) = AT_LINE.captures(line) {
        return Ok(StepReply::AtLine {
            program: caps[1].to_string(),
            line: line_number(command, &caps[2], line)?,
            note: caps[3].to_string(),
        });
    }
    if LOOP_EXIT.is_match(line) {
        return Ok(StepReply::LoopExit);
    }
    Err(SessionError::protocol(command, line))
}

/// `:store` の応答（0 行以上の `(PROG) VAR = TREE`）を読む。
pub fn decode_store(command: &str, frame: &Frame) -> SessionResult<Bindings> {
    let mut store = Bindings::new();
    for line in frame.reply_lines() {
        let caps = STORE_ENTRY
            .captures(line)
            .ok_or_else(|| SessionError::protocol(command, line.as_str()))?;
        store
            .entry(caps[1].to_string())
            .or_default()
            .insert(caps[2].to_string(), parse_tree(&caps[3])?);
    }
    Ok(store)
}

/// `:break` の一覧を、プログラムごとに出現順の行番号列として読む。
pub fn decode_breakpoints(command: &str, frame: &Frame) -> SessionResult<BTreeMap<String, Vec<u32>>> {
    let mut map: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for line in frame.reply_lines() {
        let caps = BREAK_ENTRY
            .captures(line)
            .ok_or_else(|| SessionError::protocol(command, line.as_str()))?;
        let n = line_number(command, &caps[2], line)?;
        let lines = map.entry(caps[1].to_string()).or_default();
        if !lines.contains(&n) {
            lines.push(n);
        }
    }
    Ok(map)
}

/// `:break N P` / `:delbreak N P` の確認行から (プログラム, 行) を読む。
pub fn decode_breakpoint_edit(
    command: &str,
    frame: &Frame,
    edit: BreakpointEdit,
) -> SessionResult<(String, u32)> {
    let line = first_line(command, frame)?;
    let re = match edit {
        BreakpointEdit::Set => &BREAK_SET,
        BreakpointEdit::Removed => &BREAK_REMOVED,
    };
    let caps = re
        .captures(line)
        .ok_or_else(|| SessionError::protocol(command, line))?;
    Ok((caps[1].to_string(), line_number(command, &caps[2], line)?))
}

/// 補助コマンド（`:help`, `:cd`, 生の式）の応答は行をそのまま返す。
pub fn decode_verbatim(frame: &Frame) -> Vec<String> {
    frame.reply_lines().to_vec()
}
