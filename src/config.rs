// パス: src/config.rs
// 役割: インタプリタの起動方法とセッション挙動の設定値をまとめる
// 意図: 既定値・TOML ファイル・CLI 引数の 3 段で同じ構造体を埋められるようにする
// 関連ファイル: src/session/transport.rs, src/session/dispatch.rs, src/bin/hwhile-session.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ConfigError;

/// 既定のプロンプト（ターン境界の番兵）。
pub const DEFAULT_PROMPT: &str = "HWhile> ";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// 起動する実行ファイル。
    pub interpreter: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// 応答の終わりを示すプロンプト文字列。
    pub prompt: String,
    /// 1 コマンドあたりの待ち時間。0 で無制限。
    pub command_timeout_ms: u64,
    /// 派生操作（load/run/…）のターンを出力チャネルへ流すか。
    pub echo_output: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interpreter: "hwhile".into(),
            args: Vec::new(),
            working_dir: None,
            prompt: DEFAULT_PROMPT.into(),
            command_timeout_ms: 10_000,
            echo_output: true,
        }
    }
}

impl SessionConfig {
    /// TOML 文字列から読み込む。欠けた項目は既定値で埋める。
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    /// TOML ファイルから読み込む。
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.command_timeout_ms))
        }
    }
}
