// パス: src/session/transport.rs
// 役割: インタプリタ子プロセス（または任意のストリーム対）の標準入出力を保持する
// 意図: 実プロセスとテスト用のインメモリストリームを同じ経路で扱えるようにする
// 関連ファイル: src/session/dispatch.rs, src/config.rs, tests/test_support.rs

use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, ChildStderr, Command};
use tracing::debug;

use crate::config::SessionConfig;
use crate::errors::{SessionError, SessionResult};

pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;
pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// インタプリタとの入出力路。`Dispatcher::attach` に渡すと所有権が移る。
pub struct Transport {
    pub(crate) reader: BoxedReader,
    pub(crate) writer: BoxedWriter,
    pub(crate) stderr: Option<ChildStderr>,
    pub(crate) child: Option<Child>,
}

impl Transport {
    /// 設定に従って子プロセスを起動する。tokio ランタイム内で呼ぶこと。
    pub fn spawn(config: &SessionConfig) -> SessionResult<Self> {
        let mut cmd = Command::new(&config.interpreter);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn().map_err(|e| {
            SessionError::Transport(format!("failed to start {}: {}", config.interpreter, e))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Transport("interpreter has no stdout".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Transport("interpreter has no stdin".into()))?;
        let stderr = child.stderr.take();
        debug!(interpreter = %config.interpreter, pid = ?child.id(), "interpreter started");
        Ok(Self {
            reader: Box::pin(stdout),
            writer: Box::pin(stdin),
            stderr,
            child: Some(child),
        })
    }

    /// 任意の読み書きストリームから構築する（プロセスを持たない）。
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            writer: Box::pin(writer),
            stderr: None,
            child: None,
        }
    }
}

/// バイト列を UTF-8 として読み、チャンク境界で割れた多バイト文字は次回へ持ち越す。
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.carry) {
            Ok(_) => self.carry.len(),
            // 末尾が途中で切れているだけなら、その手前までを確定させる
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                let text = String::from_utf8_lossy(&self.carry).into_owned();
                self.carry.clear();
                return text;
            }
        };
        let rest = self.carry.split_off(valid);
        let done = std::mem::replace(&mut self.carry, rest);
        String::from_utf8(done).unwrap_or_default()
    }
}
