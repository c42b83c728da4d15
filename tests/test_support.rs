// パス: tests/test_support.rs
// 役割: 統合テスト共通の偽インタプリタと補助関数を提供する
// 意図: 実プロセスなしで HWhile REPL の応答を再現し、セッションの往復を決定的に検証する
// 関連ファイル: tests/session_scenarios.rs, tests/dispatch_queue.rs, tests/console.rs
#![allow(dead_code)]
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hwhile::convert::{int_list_to_tree, to_tree};
use hwhile::session::Transport;
use hwhile::{BinaryTree, Session, SessionConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

pub const PROMPT: &str = "HWhile> ";
/// `:slow` の応答が遅れる時間。
pub const SLOW_REPLY: Duration = Duration::from_millis(400);

/// 偽インタプリタが受け取ったコマンドの記録。
#[derive(Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    fn push(&self, command: &str) {
        self.0.lock().unwrap().push(command.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Debug)]
enum Event {
    Read(BinaryTree),
    At {
        line: u32,
        note: &'static str,
        assign: Option<(&'static str, BinaryTree)>,
    },
    LoopExit,
    Wrote(BinaryTree),
}

/// 入力リストの総和を SUM へ書き出すプログラムの実行トレース。
///
/// ```text
/// 1 count read X {
/// 2   SUM := 0;
/// 3   while X {
/// 4     N := hd X;
/// 5     X := tl X;
/// 7     SUM := SUM + N
///     }
///   } write SUM
/// ```
fn count_trace(input: &[i64]) -> Vec<Event> {
    let list = |xs: &[i64]| int_list_to_tree(xs).unwrap();
    let mut events = vec![
        Event::Read(list(input)),
        Event::At {
            line: 2,
            note: "SUM := 0",
            assign: Some(("SUM", BinaryTree::Nil)),
        },
    ];
    let mut sum = 0;
    for (i, &n) in input.iter().enumerate() {
        sum += n;
        events.push(Event::At {
            line: 3,
            note: "while X {",
            assign: None,
        });
        events.push(Event::At {
            line: 4,
            note: "N := hd X",
            assign: Some(("N", to_tree(n).unwrap())),
        });
        events.push(Event::At {
            line: 5,
            note: "X := tl X",
            assign: Some(("X", list(&input[i + 1..]))),
        });
        events.push(Event::At {
            line: 7,
            note: "SUM := SUM + N",
            assign: Some(("SUM", to_tree(sum).unwrap())),
        });
    }
    events.push(Event::At {
        line: 3,
        note: "while X {",
        assign: None,
    });
    events.push(Event::LoopExit);
    events.push(Event::Wrote(to_tree(sum).unwrap()));
    events
}

struct Program {
    events: Vec<Event>,
    pos: usize,
    vars: BTreeMap<String, BinaryTree>,
}

impl Program {
    fn advance(&mut self) -> Option<Event> {
        let ev = self.events.get(self.pos).cloned()?;
        self.pos += 1;
        match &ev {
            Event::Read(t) => {
                self.vars.insert("X".into(), t.clone());
            }
            Event::At {
                assign: Some((var, t)),
                ..
            } => {
                self.vars.insert(var.to_string(), t.clone());
            }
            _ => {}
        }
        Some(ev)
    }
}

enum Reply {
    Lines(Vec<String>),
    Delayed(Duration, Vec<String>),
    Hangup,
}

/// HWhile REPL の応答形式を真似る最小のインタプリタ。どのプログラム名も `count` と同じ動きをする。
#[derive(Default)]
struct FakeInterpreter {
    programs: BTreeMap<String, Program>,
    current: Option<String>,
    breakpoints: BTreeMap<String, Vec<u32>>,
    /// `:noise` 以降、`:store` の末尾に束縛でない行を混ぜる。
    store_noise: bool,
}

fn parse_int_list(src: &str) -> Option<Vec<i64>> {
    let body = src.trim().strip_prefix('[')?.strip_suffix(']')?;
    if body.trim().is_empty() {
        return Some(Vec::new());
    }
    body.split(',').map(|s| s.trim().parse().ok()).collect()
}

impl FakeInterpreter {
    fn respond(&mut self, command: &str) -> Reply {
        let words: Vec<&str> = command.split_whitespace().collect();
        let lines = match words.as_slice() {
            [":load", name, ..] => {
                let input = command.splitn(3, ' ').nth(2).unwrap_or("");
                self.load(name, input)
            }
            [":run"] => self.run(),
            [":step"] => self.step(),
            [":store"] => self.store(),
            [":break"] => self
                .breakpoints
                .iter()
                .flat_map(|(p, lines)| {
                    lines
                        .iter()
                        .map(move |n| format!("Program '{}', line {}.", p, n))
                })
                .collect(),
            [":break", n, p] => {
                let n: u32 = n.parse().unwrap();
                let lines = self.breakpoints.entry(p.to_string()).or_default();
                if !lines.contains(&n) {
                    lines.push(n);
                }
                vec![format!("Breakpoint set in program {} at line {}.", p, n)]
            }
            [":delbreak", n, p] => {
                let n: u32 = n.parse().unwrap();
                let removed = match self.breakpoints.get_mut(*p) {
                    Some(lines) if lines.contains(&n) => {
                        lines.retain(|&l| l != n);
                        true
                    }
                    _ => false,
                };
                if !removed {
                    return Reply::Lines(vec![format!(
                        "No breakpoint at line {} in program {}.",
                        n, p
                    )]);
                }
                if self.breakpoints.get(*p).map_or(false, Vec::is_empty) {
                    self.breakpoints.remove(*p);
                }
                vec![format!("Breakpoint removed from program {} at line {}.", p, n)]
            }
            [":help"] => vec![
                "Commands:".into(),
                "  :load PROG EXPR".into(),
                "  :run".into(),
            ],
            [":cd", dir] => vec![format!("Changed directory to {}.", dir)],
            [":echo", rest @ ..] => vec![rest.join(" ")],
            [":slow"] => return Reply::Delayed(SLOW_REPLY, vec!["slow reply".into()]),
            [":hangup"] => return Reply::Hangup,
            [":noise"] => {
                self.store_noise = true;
                vec!["noise on".into()]
            }
            ["cons", "nil", "nil"] => vec!["<nil.nil>".into()],
            _ => vec![format!("Unknown command: {}", command)],
        };
        Reply::Lines(lines)
    }

    fn load(&mut self, name: &str, input: &str) -> Vec<String> {
        if name == "missing" {
            return vec![format!("Error: could not find program '{}'.", name)];
        }
        let Some(xs) = parse_int_list(input) else {
            return vec![format!("Error: bad input {}", input)];
        };
        self.programs.insert(
            name.to_string(),
            Program {
                events: count_trace(&xs),
                pos: 0,
                vars: BTreeMap::new(),
            },
        );
        self.current = Some(name.to_string());
        vec![format!("Program '{}' loaded with input {}.", name, input)]
    }

    fn run(&mut self) -> Vec<String> {
        let Some(name) = self.current.clone() else {
            return vec!["No program loaded.".into()];
        };
        let stops = self.breakpoints.get(&name).cloned().unwrap_or_default();
        let Some(program) = self.programs.get_mut(&name) else {
            return vec!["No program loaded.".into()];
        };
        while let Some(ev) = program.advance() {
            match ev {
                Event::At { line, note, .. } if stops.contains(&line) => {
                    return vec![
                        "Hit breakpoint.".into(),
                        format!("{}, line {}: {}", name, line, note),
                    ];
                }
                Event::Wrote(t) => return vec![format!("{} wrote SUM = {}", name, t)],
                _ => {}
            }
        }
        vec!["Program has already finished.".into()]
    }

    fn step(&mut self) -> Vec<String> {
        let Some(name) = self.current.clone() else {
            return vec!["No program loaded.".into()];
        };
        let Some(program) = self.programs.get_mut(&name) else {
            return vec!["No program loaded.".into()];
        };
        match program.advance() {
            Some(Event::Read(t)) => vec![format!("{} read X = {}", name, t)],
            Some(Event::At { line, note, .. }) => vec![format!("{}, line {}: {}", name, line, note)],
            Some(Event::LoopExit) => vec!["Skipped or exited while-loop.".into()],
            Some(Event::Wrote(t)) => vec![format!("{} wrote SUM = {}", name, t)],
            None => vec!["Program has already finished.".into()],
        }
    }

    fn store(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .programs
            .iter()
            .flat_map(|(p, prog)| {
                prog.vars
                    .iter()
                    .map(move |(v, t)| format!("({}) {} = {}", p, v, t))
            })
            .collect();
        if self.store_noise {
            lines.push("Warning: something extra".into());
        }
        lines
    }

}

async fn write_reply(io: &mut tokio::io::WriteHalf<DuplexStream>, text: &str, chunk: usize) {
    let size = if chunk == 0 { text.len().max(1) } else { chunk };
    for piece in text.as_bytes().chunks(size) {
        io.write_all(piece).await.unwrap();
        io.flush().await.unwrap();
        if chunk > 0 {
            tokio::task::yield_now().await;
        }
    }
}

async fn serve(io: DuplexStream, log: CommandLog, chunk: usize) {
    let (reader, mut writer) = tokio::io::split(io);
    let mut fake = FakeInterpreter::default();
    let greeting = format!("HWhile interactive mode (fake)\n{}", PROMPT);
    write_reply(&mut writer, &greeting, chunk).await;
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = line.trim().to_string();
        log.push(&command);
        let (delay, reply) = match fake.respond(&command) {
            Reply::Lines(lines) => (None, lines),
            Reply::Delayed(d, lines) => (Some(d), lines),
            Reply::Hangup => return,
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let mut text = String::new();
        for line in reply {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str(PROMPT);
        write_reply(&mut writer, &text, chunk).await;
    }
}

/// 既定設定に待ち時間だけ差し替えたもの。
pub fn test_config(timeout_ms: u64) -> SessionConfig {
    SessionConfig {
        command_timeout_ms: timeout_ms,
        ..SessionConfig::default()
    }
}

/// 偽インタプリタへ接続したセッションを返す。`chunk` が 0 以外なら応答をその長さで刻んで送る。
pub async fn start_fake_with(config: &SessionConfig, chunk: usize) -> (Session, CommandLog) {
    let (client, server) = tokio::io::duplex(4096);
    let log = CommandLog::default();
    tokio::spawn(serve(server, log.clone(), chunk));
    let (reader, writer) = tokio::io::split(client);
    let session = Session::attach(Transport::from_io(reader, writer), config)
        .await
        .expect("attach fake interpreter");
    (session, log)
}

pub async fn start_fake() -> (Session, CommandLog) {
    start_fake_with(&test_config(2_000), 0).await
}

/// 単項表現の自然数。
pub fn nat(n: i64) -> BinaryTree {
    to_tree(n).unwrap()
}
