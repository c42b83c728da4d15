// パス: src/errors.rs
// 役割: 木記法・値変換・セッション操作で共通に使うエラー型を定義する
// 意図: 失敗理由を呼び出し単位で返し、プロトコルのずれを原文付きで診断できるようにする
// 関連ファイル: src/lexer.rs, src/parser.rs, src/convert.rs, src/session/mod.rs
//! エラー型の定義（共通フォーマット: \[CODE\] メッセージ @pos）。
//!
//! - 木記法まわり（字句・構文・値域）は `ErrorInfo` を包む軽量な newtype。
//! - セッション操作は `SessionError`、設定の読み込みは `ConfigError` に集約し、`thiserror` で表示を組み立てる。

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub msg: String,
    pub pos: Option<usize>,      // バイトオフセット（任意）
    pub snippet: Option<String>, // 入力全体（任意、キャレット表示用）
}

impl ErrorInfo {
    pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
        Self {
            code,
            msg: msg.into(),
            pos,
            snippet: None,
        }
    }
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(p) => write!(f, "[{}] {} @pos={}", self.code, self.msg, p)?,
            None => write!(f, "[{}] {}", self.code, self.msg)?,
        }
        if let (Some(s), Some(p)) = (&self.snippet, self.pos) {
            let col = s.get(..p).map(|head| head.chars().count()).unwrap_or(0);
            write!(f, "\n{}\n{}^", s, " ".repeat(col))?;
        }
        Ok(())
    }
}

/// 木記法の字句解析エラー（未知の文字・綴りの崩れたキーワード）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError(pub ErrorInfo);
impl LexError {
    pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
        Self(ErrorInfo::new(code, msg, pos))
    }
    pub fn with_snippet(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        snippet: impl Into<String>,
    ) -> Self {
        Self(ErrorInfo::new(code, msg, pos).with_snippet(snippet))
    }
}

/// 構文エラーの下位分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnexpectedEnd,
    UnexpectedToken,
}

pub const SYN_UNEXPECTED_END: &str = "SYN001";
pub const SYN_UNEXPECTED_TOKEN: &str = "SYN002";

/// トークン列が木に還元できなかったことを表す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError(pub ErrorInfo);
impl SyntaxError {
    pub fn unexpected_end() -> Self {
        Self(ErrorInfo::new(
            SYN_UNEXPECTED_END,
            "unexpected end of statement",
            None,
        ))
    }
    pub fn unexpected_token(token: impl Display, pos: usize) -> Self {
        Self(ErrorInfo::new(
            SYN_UNEXPECTED_TOKEN,
            format!("unexpected token '{}'", token),
            Some(pos),
        ))
    }
    pub fn kind(&self) -> SyntaxErrorKind {
        if self.0.code == SYN_UNEXPECTED_END {
            SyntaxErrorKind::UnexpectedEnd
        } else {
            SyntaxErrorKind::UnexpectedToken
        }
    }
}

/// 整数→木変換に負数が渡された。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainError(pub ErrorInfo);
impl DomainError {
    pub fn negative(value: i64) -> Self {
        Self(ErrorInfo::new(
            "DOM001",
            format!("cannot encode negative integer {} as a tree", value),
            None,
        ))
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for LexError {}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for SyntaxError {}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for DomainError {}

/// 木記法の読み取り（字句 + 構文）で起こりうる失敗。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
}

/// セッション操作の失敗。いずれも該当する 1 回の呼び出しだけを失敗させる。
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("usage error: {0}")]
    Usage(String),
    #[error("unexpected reply to `{command}`: {raw:?}")]
    ProtocolParse { command: String, raw: String },
    #[error("`{command}` timed out after {elapsed:?}")]
    Timeout { command: String, elapsed: Duration },
    #[error("session stopped before `{0}` was answered")]
    Stopped(String),
    #[error("malformed tree in reply: {0}")]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 設定ファイルの読み込みの失敗。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("設定ファイルを開けません: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("設定の解析に失敗しました: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SessionError {
    pub fn protocol(command: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::ProtocolParse {
            command: command.into(),
            raw: raw.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

/// セッション操作の結果を表す型。
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_display_with_snippet_places_caret() {
        let e = ErrorInfo::new("LEX001", "bad", Some(4)).with_snippet("<nilx");
        assert_eq!(e.to_string(), "[LEX001] bad @pos=4\n<nilx\n    ^");
    }

    #[test]
    fn syntax_error_kind_follows_code() {
        assert_eq!(
            SyntaxError::unexpected_end().kind(),
            SyntaxErrorKind::UnexpectedEnd
        );
        let tok = SyntaxError::unexpected_token(">", 0);
        assert_eq!(tok.kind(), SyntaxErrorKind::UnexpectedToken);
        assert!(tok.to_string().contains("unexpected token '>'"));
    }

    #[test]
    fn protocol_error_keeps_raw_text() {
        let e = SessionError::protocol(":run", "Segmentation fault");
        assert!(e.to_string().contains("Segmentation fault"));
        assert!(e.to_string().contains(":run"));
    }
}
