use anyhow::{bail, Context, Result};
use env_logger::{Env, Target};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;
use transcript_review::config::{Config, LogConfig};
use transcript_review::playback::AudioPlayer;
use transcript_review::record_store::RecordStore;
use transcript_review::session::ReviewSession;
use transcript_review::tui::TuiApp;

const USAGE: &str = "\
使い方:
  transcript-review <input.jsonl> [--output <path>] [--config <path>]
  transcript-review --generate-config [path]
  transcript-review --show-devices";

/// コマンドライン引数から決まる動作
#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// 出力デバイス一覧表示
    ShowDevices,
    /// 設定ファイル生成
    GenerateConfig(PathBuf),
    /// レビュー開始
    Review {
        input: PathBuf,
        output: Option<PathBuf>,
        config: PathBuf,
    },
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args.get(1).map(String::as_str) {
        Some("--show-devices") => return Ok(Command::ShowDevices),
        Some("--generate-config") => {
            let path = args.get(2).map(String::as_str).unwrap_or("config.toml");
            return Ok(Command::GenerateConfig(PathBuf::from(path)));
        }
        _ => {}
    }

    let mut input = None;
    let mut output = None;
    let mut config = PathBuf::from("config.toml");

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--output" => {
                let value = iter.next().context("--output にはパスが必要です")?;
                output = Some(PathBuf::from(value));
            }
            "--config" => {
                let value = iter.next().context("--config にはパスが必要です")?;
                config = PathBuf::from(value);
            }
            flag if flag.starts_with("--") => bail!("不明なオプション: {}\n{}", flag, USAGE),
            path => {
                if input.is_some() {
                    bail!("入力ファイルは1つだけ指定してください\n{}", USAGE);
                }
                input = Some(PathBuf::from(path));
            }
        }
    }

    let input = input.with_context(|| format!("入力ファイルが指定されていません\n{}", USAGE))?;
    Ok(Command::Review {
        input,
        output,
        config,
    })
}

/// ロガーを初期化（TUIが端末を使うためファイルに出力）
fn init_logger(config: &LogConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("ログファイルを開けません: {}", config.file))?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.level.as_str()))
        .format_timestamp_secs()
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run_review(input: &Path, output: Option<PathBuf>, config_path: &Path) -> Result<()> {
    // ログ出力先は設定で決まるので、警告はロガー初期化後に出す
    let loaded = Config::load_if_exists(config_path)?;
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();
    init_logger(&config.log)?;

    log::info!("transcript-review を起動します");
    if !config_found {
        log::warn!(
            "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
            config_path
        );
    }
    log::info!("設定: {:?}", config);

    let store = RecordStore::load_path(input)
        .with_context(|| format!("入力ファイルの読み込みに失敗: {:?}", input))?;

    // 保存先を指定しない場合は入力ファイルに書き戻す
    let output = output.unwrap_or_else(|| input.to_path_buf());
    log::info!("保存先: {:?}", output);

    let session = ReviewSession::new(store, output, config.review.default_filter)
        .with_backup(config.review.backup_before_first_save);

    let player = if config.playback.enabled {
        match AudioPlayer::new(config.playback.device()) {
            Ok(player) => Some(player),
            Err(e) => {
                log::warn!("音声出力を初期化できません。再生は無効になります: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let audio_base_dir = input
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf);

    let mut app = TuiApp::new(
        session,
        player,
        audio_base_dir,
        Duration::from_millis(config.ui.poll_interval_ms),
    );
    app.run()?;

    let snapshot = app.session().snapshot();
    println!(
        "完了 {}/{} ({:?})",
        snapshot.complete,
        snapshot.total,
        app.session().output_path()
    );
    log::info!("transcript-review を終了しました");

    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match parse_args(&args)? {
        Command::ShowDevices => AudioPlayer::list_devices(),
        Command::GenerateConfig(path) => {
            Config::write_default(&path)?;
            println!("設定ファイルを生成しました: {:?}", path);
            Ok(())
        }
        Command::Review {
            input,
            output,
            config,
        } => run_review(&input, output, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("transcript-review")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_review_defaults() {
        let command = parse_args(&args(&["batch.jsonl"])).unwrap();
        assert_eq!(
            command,
            Command::Review {
                input: PathBuf::from("batch.jsonl"),
                output: None,
                config: PathBuf::from("config.toml"),
            }
        );
    }

    #[test]
    fn test_parse_review_with_options() {
        let command = parse_args(&args(&[
            "--config",
            "review.toml",
            "batch.jsonl",
            "--output",
            "reviewed.jsonl",
        ]))
        .unwrap();
        assert_eq!(
            command,
            Command::Review {
                input: PathBuf::from("batch.jsonl"),
                output: Some(PathBuf::from("reviewed.jsonl")),
                config: PathBuf::from("review.toml"),
            }
        );
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            parse_args(&args(&["--show-devices"])).unwrap(),
            Command::ShowDevices
        );
        assert_eq!(
            parse_args(&args(&["--generate-config"])).unwrap(),
            Command::GenerateConfig(PathBuf::from("config.toml"))
        );
        assert_eq!(
            parse_args(&args(&["--generate-config", "custom.toml"])).unwrap(),
            Command::GenerateConfig(PathBuf::from("custom.toml"))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["a.jsonl", "b.jsonl"])).is_err());
        assert!(parse_args(&args(&["a.jsonl", "--output"])).is_err());
        assert!(parse_args(&args(&["a.jsonl", "--verbose"])).is_err());
    }
}
