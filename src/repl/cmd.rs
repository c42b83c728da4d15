// パス: src/repl/cmd.rs
// 役割: Console loop, command parsing, and session orchestration
// 意図: Let a user drive the interpreter session by hand and see typed results
// 関連ファイル: src/session/mod.rs, src/repl/printer.rs, src/bin/hwhile-session.rs
//! 手元のコンソールにおけるコマンド処理を担当するモジュール。
//! 利用者の入力をコマンドとして解釈し、セッションの派生操作へ橋渡しする。

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::printer::{render_help, write_msg, OutputFormat};
use crate::session::{Bindings, Echo, Outcome, Session, SessionState};

/// コンソールが解釈できるコマンドの集合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `:help` / `:h` で手元とインタプリタのヘルプを表示する。
    Help,
    /// `:quit` / `:q` でセッションを終了する。
    Quit,
    /// `:load PROG EXPR`
    Load { program: String, input: String },
    Run,
    Step,
    Store,
    /// 引数なしの `:break` はブレークポイント一覧。
    Breakpoints,
    Break { line: u32, program: Option<String> },
    DelBreak { line: u32, program: Option<String> },
    /// `:state` で手元の状態スナップショットを表示する。
    State,
    Cd(PathBuf),
    /// 既知のコマンドに該当しない入力はそのまま送る。
    Raw(String),
    /// シンタックスが認識できなかったコマンド入力。
    Invalid(String),
}

/// 生の入力文字列を `ConsoleCommand` 列挙に解析する。
pub fn parse_console_command(input: &str) -> ConsoleCommand {
    let s = input.trim();
    match s {
        ":help" | ":h" => return ConsoleCommand::Help,
        ":quit" | ":q" => return ConsoleCommand::Quit,
        ":run" => return ConsoleCommand::Run,
        ":step" => return ConsoleCommand::Step,
        ":store" => return ConsoleCommand::Store,
        ":break" => return ConsoleCommand::Breakpoints,
        ":state" => return ConsoleCommand::State,
        _ => {}
    }
    if let Some(rest) = s.strip_prefix(":load ") {
        let rest = rest.trim();
        return match rest.split_once(char::is_whitespace) {
            Some((program, input)) if !input.trim().is_empty() => ConsoleCommand::Load {
                program: program.to_string(),
                input: input.trim().to_string(),
            },
            _ => ConsoleCommand::Invalid(s.to_string()),
        };
    }
    if let Some(rest) = s.strip_prefix(":break ") {
        return match parse_line_and_program(rest) {
            Some((line, program)) => ConsoleCommand::Break { line, program },
            None => ConsoleCommand::Invalid(s.to_string()),
        };
    }
    if let Some(rest) = s.strip_prefix(":delbreak ") {
        return match parse_line_and_program(rest) {
            Some((line, program)) => ConsoleCommand::DelBreak { line, program },
            None => ConsoleCommand::Invalid(s.to_string()),
        };
    }
    if let Some(rest) = s.strip_prefix(":cd ") {
        let dir = rest.trim();
        if dir.is_empty() {
            return ConsoleCommand::Invalid(s.to_string());
        }
        return ConsoleCommand::Cd(PathBuf::from(dir));
    }
    if s == ":" {
        return ConsoleCommand::Invalid(s.to_string());
    }
    // 未知のメタコマンドや式はインタプリタへそのまま任せる
    ConsoleCommand::Raw(s.to_string())
}

/// `N [PROG]` を読む。
fn parse_line_and_program(rest: &str) -> Option<(u32, Option<String>)> {
    let mut parts = rest.split_whitespace();
    let line = parts.next()?.parse().ok()?;
    let program = parts.next().map(str::to_string);
    if parts.next().is_some() {
        return None;
    }
    Some((line, program))
}

/// 対話セッションがユーザーへ返す応答メッセージのカテゴリ。
#[derive(Debug)]
pub(crate) enum ConsoleMsg {
    Err(String),
    Lines(Vec<String>),
    Outcome(Outcome),
    State(SessionState),
    Store(Bindings),
    Breakpoints(BTreeMap<String, Vec<u32>>),
}

/// 解釈済みコマンドをセッションに適用し、出力メッセージを返す。
pub(crate) async fn handle_command(session: &mut Session, cmd: ConsoleCommand) -> Vec<ConsoleMsg> {
    use ConsoleCommand::*;
    let result = match cmd {
        Help => session.help().await.map(ConsoleMsg::Lines),
        Load { program, input } => session.load(&program, &input).await.map(ConsoleMsg::State),
        Run => session.run().await.map(ConsoleMsg::Outcome),
        Step => session.step().await.map(ConsoleMsg::Outcome),
        Store => session.store().await.map(ConsoleMsg::Store),
        Breakpoints => session.breakpoints_map().await.map(ConsoleMsg::Breakpoints),
        Break { line, program } => session
            .add_breakpoint(line, program.as_deref())
            .await
            .map(ConsoleMsg::State),
        DelBreak { line, program } => session
            .del_breakpoint(line, program.as_deref())
            .await
            .map(ConsoleMsg::State),
        State => Ok(ConsoleMsg::State(session.state().clone())),
        Cd(dir) => session.cd(&dir).await.map(ConsoleMsg::Lines),
        Raw(src) => session
            .execute(&src, Echo::Silent)
            .await
            .map(|frame| ConsoleMsg::Lines(frame.reply_lines().to_vec())),
        Quit => return Vec::new(),
        Invalid(s) => Ok(ConsoleMsg::Err(format!(
            "エラー: コマンド形式が不正です: {}",
            s
        ))),
    };
    match result {
        Ok(msg) => vec![msg],
        Err(e) => vec![ConsoleMsg::Err(format!("エラー: {}", e))],
    }
}

/// 入力が尽きるか `:quit` が来るまでコマンドを読み、結果を書き出す。
pub async fn run_console<R, W, E>(
    session: &mut Session,
    input: R,
    out: &mut W,
    err: &mut E,
    format: OutputFormat,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    E: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let cmd = parse_console_command(line);
        match cmd {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => {
                render_help(out)?;
                let msgs = handle_command(session, ConsoleCommand::Help).await;
                dispatch_messages(msgs, out, err, format)?;
            }
            other => {
                let msgs = handle_command(session, other).await;
                dispatch_messages(msgs, out, err, format)?;
            }
        }
        out.flush()?;
    }
    Ok(())
}

fn dispatch_messages<W: Write, E: Write>(
    msgs: Vec<ConsoleMsg>,
    out: &mut W,
    err: &mut E,
    format: OutputFormat,
) -> io::Result<()> {
    for msg in msgs {
        match msg {
            ConsoleMsg::Err(s) => writeln!(err, "{}", s)?,
            other => write_msg(out, &other, format)?,
        }
    }
    Ok(())
}
