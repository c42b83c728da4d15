// パス: src/bin/hwhile-session.rs
// 役割: Binary entrypoint that starts an interpreter session and runs the console
// 意図: Offer a CLI executable for driving HWhile by hand with typed results
// 関連ファイル: src/repl/cmd.rs, src/config.rs, src/session/mod.rs
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use hwhile::repl::{run_console, OutputFormat};
use hwhile::{ConfigError, Session, SessionConfig};

/// HWhile の REPL を起動し、コマンドの結果を型付きで表示する。
#[derive(Debug, Parser)]
#[command(name = "hwhile-session", version)]
struct Cli {
    /// 設定ファイル（TOML）。CLI 引数が優先される。
    #[arg(long)]
    config: Option<PathBuf>,
    /// 起動するインタプリタ。
    #[arg(long)]
    interpreter: Option<String>,
    /// インタプリタへ渡す引数（複数可）。
    #[arg(long = "arg", value_name = "ARG")]
    args: Vec<String>,
    /// インタプリタの作業ディレクトリ。
    #[arg(long)]
    cwd: Option<PathBuf>,
    #[arg(long)]
    prompt: Option<String>,
    /// 1 コマンドあたりの待ち時間（ミリ秒、0 で無制限）。
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// 結果を 1 行 1 JSON で書き出す。
    #[arg(long)]
    json: bool,
    /// インタプリタの生出力を標準エラーへ写す。
    #[arg(long)]
    mirror: bool,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_toml_file(path)?,
            None => SessionConfig::default(),
        };
        if let Some(interpreter) = &self.interpreter {
            config.interpreter = interpreter.clone();
        }
        if !self.args.is_empty() {
            config.args = self.args.clone();
        }
        if let Some(dir) = &self.cwd {
            config.working_dir = Some(dir.clone());
        }
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.command_timeout_ms = ms;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match cli.session_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("エラー: {}", e);
            return ExitCode::from(2);
        }
    };
    let mut session = match Session::start(&config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("エラー: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.mirror {
        let mut events = session.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let mut err = std::io::stderr().lock();
                        let _ = err.write_all(event.text.as_bytes());
                        let _ = err.flush();
                    }
                    Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "mirror lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let stdin = BufReader::new(tokio::io::stdin());
    let mut out = std::io::stdout();
    let mut err = std::io::stderr();
    let console = run_console(&mut session, stdin, &mut out, &mut err, format).await;
    let stopped = session.stop().await;

    match (console, stopped) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        (Err(e), _) => {
            eprintln!("エラー: {}", e);
            ExitCode::FAILURE
        }
        (_, Err(e)) => {
            eprintln!("エラー: {}", e);
            ExitCode::FAILURE
        }
    }
}
