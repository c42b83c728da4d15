// パス: src/repl/mod.rs
// 役割: Console module facade and re-exports
// 意図: Expose the interactive entry point without leaking internals
// 関連ファイル: src/repl/cmd.rs, src/repl/printer.rs, src/bin/hwhile-session.rs
//! 手元のコンソール（セッションを手で操作する対話環境）をまとめたファサード。
//!
//! - `cmd`: メインループとコマンド解釈
//! - `printer`: ユーザー向けの表示ロジック

pub mod cmd;
mod printer;

pub use cmd::{parse_console_command, run_console, ConsoleCommand};
pub use printer::OutputFormat;
