// パス: src/session/dispatch.rs
// 役割: コマンド送信・保留要求の FIFO・応答の受け渡し・停止処理を担う
// 意図: 送信順と応答順の対応を内部で保証し、期限切れや停止でキューを壊さない
// 関連ファイル: src/session/framer.rs, src/session/transport.rs, src/session/mod.rs
//! コマンドディスパッチャ
//!
//! - 書き込み口は `tokio::sync::Mutex` で守り、前のターンが解決するまで次を書かない（内部キュー）。
//! - 保留要求（`PendingRequest`）は書き込み前に FIFO へ積む。速い応答が登録より先に届く競合を避ける。
//! - フレーマと保留 FIFO は同じ `std::sync::Mutex` の下で更新し、区切りと取り出しを不可分にする。
//! - 期限切れの要求は FIFO に残す。遅れて届いた応答はその要求が受け取って捨てる。
//! - 停止時・出力終了時は残った保留要求をすべて明示的に失敗させる。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, trace, warn};

use super::framer::{Frame, Framer};
use super::transport::{BoxedReader, BoxedWriter, Transport, Utf8Decoder};
use crate::config::SessionConfig;
use crate::errors::{SessionError, SessionResult};

const GREETING: &str = "<greeting>";
const OUTPUT_CAPACITY: usize = 64;
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// 1 ターン分の出力通知。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputEvent {
    pub text: String,
}

/// 呼び出しごとの出力通知の要否。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Echo {
    Publish,
    Silent,
}

impl From<bool> for Echo {
    fn from(publish: bool) -> Self {
        if publish {
            Echo::Publish
        } else {
            Echo::Silent
        }
    }
}

/// 送信済みコマンド 1 件の継続。フレーマの区切りで 1 度だけ消費される。
struct PendingRequest {
    command: String,
    tx: oneshot::Sender<SessionResult<Frame>>,
}

struct Exchange {
    framer: Framer,
    pending: VecDeque<PendingRequest>,
    closed: Option<String>,
}

struct Shared {
    exchange: Mutex<Exchange>,
    turn: tokio::sync::Mutex<Option<BoxedWriter>>,
    child: tokio::sync::Mutex<Option<Child>>,
    greeting: tokio::sync::Mutex<Option<oneshot::Receiver<SessionResult<Frame>>>>,
    output: broadcast::Sender<OutputEvent>,
    timeout: Option<Duration>,
}

impl Shared {
    fn exchange(&self) -> MutexGuard<'_, Exchange> {
        self.exchange.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// チャンクをフレーマへ流し、区切れたターンを古い保留要求から順に渡す。
    fn deliver(&self, chunk: &str) {
        let mut ex = self.exchange();
        for frame in ex.framer.feed(chunk) {
            match ex.pending.pop_front() {
                Some(p) => {
                    if p.tx.send(Ok(frame.echoed(&p.command))).is_err() {
                        debug!(command = %p.command, "late reply discarded");
                    }
                }
                None => warn!(lines = ?frame.lines, "reply without a pending request"),
            }
        }
    }

    /// 以後の送信を拒否し、残った保留要求をすべて失敗させる。
    fn close(&self, reason: &str, reject: impl Fn(&str) -> SessionError) {
        let mut ex = self.exchange();
        if ex.closed.is_none() {
            ex.closed = Some(reason.to_string());
        }
        for p in ex.pending.drain(..) {
            debug!(command = %p.command, reason, "rejecting pending request");
            let _ = p.tx.send(Err(reject(&p.command)));
        }
    }
}

/// インタプリタとの 1 本の対話路。複製しても同じキューを共有する。
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// 入出力路を引き取り、読み取りタスクを起動する。
    ///
    /// 起動直後の挨拶（最初のプロンプト）を受け取る保留要求を先に登録しておくので、
    /// `ready` を呼ぶ前に挨拶が届いても取りこぼさない。
    pub fn attach(transport: Transport, config: &SessionConfig) -> Self {
        let Transport {
            reader,
            writer,
            stderr,
            child,
        } = transport;
        let (greet_tx, greet_rx) = oneshot::channel();
        let mut pending = VecDeque::new();
        pending.push_back(PendingRequest {
            command: GREETING.into(),
            tx: greet_tx,
        });
        let (output, _) = broadcast::channel(OUTPUT_CAPACITY);
        let shared = Arc::new(Shared {
            exchange: Mutex::new(Exchange {
                framer: Framer::new(&config.prompt),
                pending,
                closed: None,
            }),
            turn: tokio::sync::Mutex::new(Some(writer)),
            child: tokio::sync::Mutex::new(child),
            greeting: tokio::sync::Mutex::new(Some(greet_rx)),
            output,
            timeout: config.command_timeout(),
        });
        tokio::spawn(pump(reader, Arc::downgrade(&shared)));
        if let Some(stderr) = stderr {
            tokio::spawn(drain_stderr(stderr));
        }
        Self { shared }
    }

    /// 挨拶のプロンプトが届くまで待つ。2 回目以降は即座に空のフレームを返す。
    pub async fn ready(&self) -> SessionResult<Frame> {
        let Some(rx) = self.shared.greeting.lock().await.take() else {
            return Ok(Frame::default());
        };
        self.await_reply(GREETING, rx).await
    }

    /// コマンドを 1 つ送り、対応する応答フレームを返す。
    ///
    /// 前のターンが解決（または期限切れ）するまで書き込みは待たされる。
    pub async fn execute(&self, command: &str, echo: Echo) -> SessionResult<Frame> {
        let command = command.trim().to_string();
        let mut turn = self.shared.turn.lock().await;
        let Some(writer) = turn.as_mut() else {
            return Err(SessionError::Transport(
                "no active interpreter (session stopped)".into(),
            ));
        };
        let rx = {
            let mut ex = self.shared.exchange();
            if let Some(reason) = &ex.closed {
                return Err(SessionError::Transport(format!(
                    "interpreter is gone: {}",
                    reason
                )));
            }
            let (tx, rx) = oneshot::channel();
            ex.pending.push_back(PendingRequest {
                command: command.clone(),
                tx,
            });
            ex.framer.begin_turn();
            rx
        };

        debug!(command = %command, "send");
        let line = format!("{}\n", command);
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            // 書き込めなかった要求は応答を受け取らないので取り下げる
            self.shared.exchange().pending.pop_back();
            return Err(SessionError::Transport(format!(
                "failed to write `{}`: {}",
                command, e
            )));
        }

        let frame = self.await_reply(&command, rx).await;
        drop(turn);
        let frame = frame?;
        if echo == Echo::Publish {
            let _ = self.shared.output.send(OutputEvent {
                text: frame.raw.clone(),
            });
        }
        Ok(frame)
    }

    async fn await_reply(
        &self,
        command: &str,
        rx: oneshot::Receiver<SessionResult<Frame>>,
    ) -> SessionResult<Frame> {
        let started = Instant::now();
        let received = match self.shared.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(r) => r,
                Err(_) => {
                    warn!(command, ?limit, "command timed out");
                    return Err(SessionError::Timeout {
                        command: command.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
            },
            None => rx.await,
        };
        received.unwrap_or_else(|_| Err(SessionError::Stopped(command.to_string())))
    }

    /// 出力通知の購読口を返す。
    pub fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.shared.output.subscribe()
    }

    /// 未解決の保留要求の数（期限切れで残っているものを含む）。
    pub fn pending_len(&self) -> usize {
        self.shared.exchange().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.exchange().closed.is_some()
    }

    /// 保留要求をすべて拒否し、標準入力を閉じてプロセスを終了させる。
    pub async fn shutdown(&self) -> SessionResult<()> {
        self.shared
            .close("session stopped", |cmd| SessionError::Stopped(cmd.to_string()));
        self.shared.turn.lock().await.take();
        let child = self.shared.child.lock().await.take();
        if let Some(mut child) = child {
            match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                Ok(status) => {
                    let status = status?;
                    info!(?status, "interpreter exited");
                }
                Err(_) => {
                    child.kill().await?;
                    info!("interpreter killed");
                }
            }
        }
        Ok(())
    }
}

async fn pump(mut reader: BoxedReader, shared: Weak<Shared>) {
    let mut buf = vec![0u8; 4096];
    let mut decoder = Utf8Decoder::default();
    loop {
        let read = reader.read(&mut buf).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match read {
            Ok(0) => {
                debug!("interpreter closed its output");
                let reason = "interpreter closed its output";
                shared.close(reason, |_| SessionError::Transport(reason.into()));
                return;
            }
            Ok(n) => {
                let chunk = decoder.decode(&buf[..n]);
                if chunk.is_empty() {
                    continue;
                }
                trace!(chunk = %chunk, "recv");
                shared.deliver(&chunk);
            }
            Err(e) => {
                let reason = format!("read failed: {}", e);
                warn!(%reason, "interpreter output");
                shared.close(&reason, |_| SessionError::Transport(reason.clone()));
                return;
            }
        }
    }
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(target: "hwhile::interpreter", "{}", line);
    }
}
