// パス: src/session/mod.rs
// 役割: HWhile REPL を駆動するセッションドライバ（派生操作と状態機械）
// 意図: コマンド送信・応答解読・状態更新を 1 か所にまとめ、呼び出し側へ型付きの結果を返す
// 関連ファイル: src/session/dispatch.rs, src/session/protocol.rs, src/session/state.rs
//! セッションドライバ
//!
//! 状態遷移: idle → load → loaded(line=0) → run/step → paused(line=N) → … → completed(done)。
//! - run/step は読み込み済みのプログラムが必要。完了後は次の load まで受け付けない。
//! - 状態は遷移ごとに新しい `SessionState` へ置き換え、結果にスナップショットとして添える。
//! - 応答が想定外でも失敗するのはその呼び出しだけで、セッションは引き続き使える。
//! - load/run/step 後の一覧・束縛の取り直しに失敗しても、主コマンドの結果は返す（取り直せなかった部分は直前のまま）。

mod dispatch;
mod framer;
mod protocol;
mod state;
mod transport;

use std::collections::BTreeMap;
use std::path::Path;

use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use dispatch::{Dispatcher, Echo, OutputEvent};
pub use framer::{Frame, Framer};
pub use protocol::{BreakpointEdit, RunReply, StepReply};
pub use state::{Bindings, BreakpointMap, Cause, Outcome, Phase, SessionState};
pub use transport::Transport;

use crate::config::SessionConfig;
use crate::errors::{SessionError, SessionResult};

pub struct Session {
    dispatcher: Dispatcher,
    state: SessionState,
    echo: Echo,
}

impl Session {
    /// 設定どおりにインタプリタを起動し、最初のプロンプトを待つ。
    pub async fn start(config: &SessionConfig) -> SessionResult<Self> {
        if config.prompt.trim().is_empty() {
            return Err(SessionError::usage("prompt must not be blank"));
        }
        let transport = Transport::spawn(config)?;
        Self::attach(transport, config).await
    }

    /// 既存の入出力路へ接続し、最初のプロンプトを待つ。
    pub async fn attach(transport: Transport, config: &SessionConfig) -> SessionResult<Self> {
        let dispatcher = Dispatcher::attach(transport, config);
        let greeting = dispatcher.ready().await?;
        debug!(lines = ?greeting.lines, "interpreter ready");
        Ok(Self {
            dispatcher,
            state: SessionState::default(),
            echo: config.echo_output.into(),
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// 同じキューを共有するディスパッチャの複製。並行に生コマンドを送るときに使う。
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.dispatcher.subscribe()
    }

    /// 生のコマンドを送り、応答フレームをそのまま返す。状態は変えない。
    pub async fn execute(&self, command: &str, echo: Echo) -> SessionResult<Frame> {
        self.dispatcher.execute(command, echo).await
    }

    async fn send(&self, command: &str) -> SessionResult<Frame> {
        self.dispatcher.execute(command, self.echo).await
    }

    /// `:load P EXPR` を送り、状態を読み込み直後へ戻してからブレークポイントと束縛を問い合わせる。
    pub async fn load(&mut self, program: &str, input: &str) -> SessionResult<SessionState> {
        let command = format!(":load {} {}", program, input.trim());
        let frame = self.send(&command).await?;
        let name = protocol::decode_load(&command, &frame)?;
        self.state = self.state.loaded(&name);
        if let Err(e) = self.breakpoints_map().await {
            warn!(command = %command, error = %e, "breakpoint refresh failed; keeping previous breakpoints");
        }
        self.refresh_bindings(&command).await;
        Ok(self.state.clone())
    }

    fn require_runnable(&self) -> SessionResult<()> {
        match self.state.phase() {
            Phase::Idle => Err(SessionError::usage("no program to run")),
            Phase::Completed => Err(SessionError::usage(format!(
                "program '{}' has already completed; load it again",
                self.state.program.as_deref().unwrap_or_default()
            ))),
            Phase::Loaded | Phase::Paused => Ok(()),
        }
    }

    /// 次のブレークポイントか完了まで実行する。
    pub async fn run(&mut self) -> SessionResult<Outcome> {
        self.require_runnable()?;
        let command = ":run";
        let frame = self.send(command).await?;
        let cause = match protocol::decode_run(command, &frame)? {
            RunReply::Wrote { variable, value } => {
                self.state = self.state.completed();
                Cause::Done { variable, value }
            }
            RunReply::Breakpoint { program, line } => {
                self.state = self.state.paused_at(&program, line);
                Cause::Breakpoint { line, note: None }
            }
        };
        self.refresh_bindings(command).await;
        Ok(Outcome {
            cause,
            state: self.state.clone(),
        })
    }

    /// 1 文だけ実行する。
    pub async fn step(&mut self) -> SessionResult<Outcome> {
        self.require_runnable()?;
        let command = ":step";
        let frame = self.send(command).await?;
        let cause = match protocol::decode_step(command, &frame)? {
            StepReply::Read { variable, value } => Cause::Start { variable, value },
            StepReply::Wrote { variable, value } => {
                self.state = self.state.completed();
                Cause::Done { variable, value }
            }
            StepReply::AtLine {
                program,
                line,
                note,
            } => {
                self.state = self.state.paused_at(&program, line);
                Cause::Breakpoint {
                    line,
                    note: Some(note),
                }
            }
            StepReply::LoopExit => Cause::LoopExit,
        };
        self.refresh_bindings(command).await;
        Ok(Outcome {
            cause,
            state: self.state.clone(),
        })
    }

    /// load/run/step の後に束縛を取り直す。失敗しても解読済みの結果は捨てず、直前の束縛を残す。
    async fn refresh_bindings(&mut self, after: &str) {
        if let Err(e) = self.store().await {
            warn!(command = after, error = %e, "binding refresh failed; keeping previous bindings");
        }
    }

    /// `:store` で全プログラムの変数束縛を取得し、状態の束縛も置き換える。
    pub async fn store(&mut self) -> SessionResult<Bindings> {
        let command = ":store";
        let frame = self.send(command).await?;
        let bindings = protocol::decode_store(command, &frame)?;
        self.state = self.state.with_bindings(bindings.clone());
        Ok(bindings)
    }

    /// `:break` で設定済みのブレークポイント一覧を取得し、状態の一覧も置き換える。
    pub async fn breakpoints_map(&mut self) -> SessionResult<BTreeMap<String, Vec<u32>>> {
        let command = ":break";
        let frame = self.send(command).await?;
        let listing = protocol::decode_breakpoints(command, &frame)?;
        let map: BreakpointMap = listing
            .iter()
            .map(|(p, lines)| (p.clone(), lines.iter().copied().collect()))
            .collect();
        self.state = self.state.with_breakpoints(map);
        Ok(listing)
    }

    fn breakpoint_target(&self, program: Option<&str>) -> SessionResult<String> {
        match program.or(self.state.program.as_deref()) {
            Some(p) => Ok(p.to_string()),
            None => Err(SessionError::usage(
                "no program loaded; name the program for the breakpoint",
            )),
        }
    }

    /// `:break N P` でブレークポイントを追加する。`program` 省略時は読み込み中のプログラム。
    pub async fn add_breakpoint(
        &mut self,
        line: u32,
        program: Option<&str>,
    ) -> SessionResult<SessionState> {
        let target = self.breakpoint_target(program)?;
        let command = format!(":break {} {}", line, target);
        let frame = self.send(&command).await?;
        let (p, n) = protocol::decode_breakpoint_edit(&command, &frame, BreakpointEdit::Set)?;
        self.state = self.state.with_breakpoint(&p, n, true);
        Ok(self.state.clone())
    }

    /// `:delbreak N P` でブレークポイントを削除する。
    pub async fn del_breakpoint(
        &mut self,
        line: u32,
        program: Option<&str>,
    ) -> SessionResult<SessionState> {
        let target = self.breakpoint_target(program)?;
        let command = format!(":delbreak {} {}", line, target);
        let frame = self.send(&command).await?;
        let (p, n) = protocol::decode_breakpoint_edit(&command, &frame, BreakpointEdit::Removed)?;
        self.state = self.state.with_breakpoint(&p, n, false);
        Ok(self.state.clone())
    }

    /// `:help` の本文。
    pub async fn help(&self) -> SessionResult<Vec<String>> {
        let frame = self.send(":help").await?;
        Ok(protocol::decode_verbatim(&frame))
    }

    /// `:cd DIR` でインタプリタ側の作業ディレクトリを移す。
    pub async fn cd(&self, dir: &Path) -> SessionResult<Vec<String>> {
        let frame = self.send(&format!(":cd {}", dir.display())).await?;
        Ok(protocol::decode_verbatim(&frame))
    }

    /// 生の式を評価させ、応答行をそのまま返す。
    pub async fn evaluate(&self, expr: &str) -> SessionResult<Vec<String>> {
        let frame = self.send(expr).await?;
        Ok(protocol::decode_verbatim(&frame))
    }

    /// プロセスを終了し、未解決の要求をすべて拒否する。以後の操作は `Transport` エラーになる。
    pub async fn stop(&mut self) -> SessionResult<()> {
        self.dispatcher.shutdown().await?;
        self.state = SessionState::default();
        Ok(())
    }
}
