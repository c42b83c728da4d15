// パス: src/session/framer.rs
// 役割: 任意に分割された出力チャンクから論理行を復元し、プロンプトでターンを区切る
// 意図: 1 つの応答の行が次のターンへ漏れないよう、区切りと同時にバッファを空にする
// 関連ファイル: src/session/dispatch.rs, src/session/protocol.rs, tests/framer.rs
//! 行・プロンプトのフレーマ
//!
//! - 改行（`\r?\n` と直後の空白）で区切り、最後の断片だけを「未完の行」として保持する。
//! - 断片全体がプロンプトと一致したらターン終了とみなし、溜めた行を `Frame` として吐き出す。
//! - 1 チャンクに複数のプロンプトが含まれても、1 つずつ区切って順に `Frame` を返す。
//!   通常の厳密な交互進行では起こらないが、落ちずに処理を続ける。

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n\s*").expect("改行パターンは常に有効"));

/// 1 ターン分の応答。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// 空行を除いた論理行。保留要求へ渡すときにコマンドのエコーが先頭に入る。
    pub lines: Vec<String>,
    /// このターンに届いた生テキスト（エコーしたコマンドを含む）。
    /// 1 チャンクで複数ターンが区切られた場合、チャンクの残りは最初のフレームに入る。
    pub raw: String,
}

impl Frame {
    /// 対応する保留要求のコマンドを先頭行（エコー）として添える。
    pub fn echoed(mut self, command: &str) -> Self {
        self.lines.insert(0, command.to_string());
        self.raw = format!("{}\n{}", command, self.raw);
        self
    }

    /// エコー行を除いた応答本文。
    pub fn reply_lines(&self) -> &[String] {
        self.lines.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug)]
pub struct Framer {
    marker: String,
    lines: Vec<String>,
    partial: Option<String>,
    raw: String,
}

impl Framer {
    /// `prompt` は末尾の空白を無視して照合する。
    pub fn new(prompt: &str) -> Self {
        Self {
            marker: prompt.trim_end().to_string(),
            lines: Vec::new(),
            partial: None,
            raw: String::new(),
        }
    }

    /// 新しいコマンドの送信に合わせ、未完の断片があれば行として確定させる。
    pub fn begin_turn(&mut self) {
        if let Some(p) = self.partial.take() {
            self.lines.push(p);
        }
    }

    /// 出力チャンクを 1 つ取り込み、区切れたターンを古い順に返す。
    pub fn feed(&mut self, chunk: &str) -> Vec<Frame> {
        self.raw.push_str(chunk);
        let mut pieces = LINE_BREAK.split(chunk);
        let head = pieces.next().unwrap_or("");
        let mut fragments: Vec<String> = Vec::new();
        let mut first = self.partial.take().unwrap_or_default();
        first.push_str(head);
        fragments.push(first);
        fragments.extend(pieces.map(str::to_string));

        let mut frames = Vec::new();
        let last = fragments.pop().unwrap_or_default();
        for line in fragments {
            let line = line.trim();
            match self.strip_prompt(line) {
                Some(rest) => {
                    let rest = rest.to_string();
                    frames.push(self.flush());
                    self.lines.push(rest);
                }
                None => self.lines.push(line.to_string()),
            }
        }

        let last = last.trim_start();
        match self.strip_prompt(last) {
            Some(rest) => {
                let rest = rest.to_string();
                frames.push(self.flush());
                if !rest.is_empty() {
                    self.partial = Some(rest);
                }
            }
            None if !last.is_empty() => self.partial = Some(last.to_string()),
            None => {}
        }
        frames
    }

    /// 未完の断片を持っているか。
    pub fn has_partial(&self) -> bool {
        self.partial.is_some()
    }

    fn strip_prompt<'a>(&self, fragment: &'a str) -> Option<&'a str> {
        let rest = fragment.strip_prefix(self.marker.as_str())?;
        if rest.is_empty() {
            return Some(rest);
        }
        if rest.starts_with(char::is_whitespace) {
            Some(rest.trim_start())
        } else {
            None
        }
    }

    fn flush(&mut self) -> Frame {
        let lines: Vec<String> = std::mem::take(&mut self.lines)
            .into_iter()
            .filter(|l| !l.is_empty())
            .collect();
        let raw = std::mem::take(&mut self.raw);
        trace!(lines = lines.len(), "framer flush");
        Frame { lines, raw }
    }
}

#[cfg(test)]
mod tests {
    use super::Framer;

    const PROMPT: &str = "HWhile> ";

    #[test]
    fn single_chunk_reply_flushes_once() {
        let mut f = Framer::new(PROMPT);
        f.begin_turn();
        let mut frames = f.feed("count wrote SUM = nil\nHWhile> ");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].lines, vec!["count wrote SUM = nil"]);
        let frame = frames.remove(0).echoed(":run");
        assert_eq!(frame.lines, vec![":run", "count wrote SUM = nil"]);
        assert_eq!(frame.reply_lines(), ["count wrote SUM = nil"]);
        assert_eq!(frame.raw, ":run\ncount wrote SUM = nil\nHWhile> ");
    }

    #[test]
    fn incomplete_line_waits_for_more_output() {
        let mut f = Framer::new(PROMPT);
        assert!(f.feed("Program 'count' lo").is_empty());
        assert!(f.has_partial());
        assert!(f.feed("aded.\n").is_empty());
        let frames = f.feed("HWhile> ");
        assert_eq!(frames[0].lines, vec!["Program 'count' loaded."]);
    }

    #[test]
    fn leading_whitespace_and_blank_lines_are_dropped() {
        let mut f = Framer::new(PROMPT);
        let frames = f.feed("a\r\n\n   b\nHWhile>   ");
        assert_eq!(frames[0].lines, vec!["a", "b"]);
    }

    #[test]
    fn prompt_text_inside_a_line_is_not_a_boundary() {
        let mut f = Framer::new(PROMPT);
        assert!(f.feed("echo HWhile> \n").is_empty());
        assert!(f.feed("HWhile>x").is_empty());
        let frames = f.feed("\nHWhile> ");
        assert_eq!(frames[0].lines, vec!["echo HWhile>", "HWhile>x"]);
    }

    #[test]
    fn two_prompts_in_one_chunk_yield_two_frames_in_order() {
        let mut f = Framer::new(PROMPT);
        let frames = f.feed("first\nHWhile> second\nHWhile> ");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].lines, vec!["first"]);
        assert_eq!(frames[1].lines, vec!["second"]);
        assert!(frames[1].raw.is_empty());
    }

    #[test]
    fn buffer_is_empty_after_flush() {
        let mut f = Framer::new(PROMPT);
        f.feed("one\nHWhile> ");
        let frames = f.feed("two\nHWhile> ");
        assert_eq!(frames[0].lines, vec!["two"]);
    }

    #[test]
    fn new_turn_commits_a_dangling_fragment() {
        let mut f = Framer::new(PROMPT);
        assert!(f.feed("HWhile> late").len() == 1);
        f.begin_turn();
        assert!(!f.has_partial());
        let frames = f.feed("reply\nHWhile> ");
        assert_eq!(frames[0].lines, vec!["late", "reply"]);
    }
}
