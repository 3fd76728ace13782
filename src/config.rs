use crate::types::FilterStatus;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// レビュー設定
///
/// # デフォルト値
///
/// - `default_filter`: "incomplete" (未完了のみ表示して開始)
/// - `backup_before_first_save`: false
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewConfig {
    #[serde(default = "default_filter")]
    pub default_filter: FilterStatus,
    #[serde(default = "default_backup_before_first_save")]
    pub backup_before_first_save: bool,
}

/// 音声再生設定
///
/// # デフォルト値
///
/// - `enabled`: true
/// - `device_name`: "default" (システムのデフォルト出力デバイス)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_playback_enabled")]
    pub enabled: bool,
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

/// 画面設定
///
/// # デフォルト値
///
/// - `poll_interval_ms`: 200 ms
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UiConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// ログ設定
///
/// TUIが端末を占有するため、ログはファイルに書き出す。
///
/// # デフォルト値
///
/// - `level`: "info"
/// - `file`: "transcript-review.log"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: String,
}

// Default functions
fn default_filter() -> FilterStatus {
    FilterStatus::Incomplete
}

fn default_backup_before_first_save() -> bool {
    false
}

fn default_playback_enabled() -> bool {
    true
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "transcript-review.log".to_string()
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_filter: default_filter(),
            backup_before_first_save: default_backup_before_first_save(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: default_playback_enabled(),
            device_name: default_device_name(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl PlaybackConfig {
    /// 出力デバイス名（"default" の場合は None）
    pub fn device(&self) -> Option<&str> {
        if self.device_name == "default" {
            None
        } else {
            Some(self.device_name.as_str())
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use transcript_review::config::Config;
    /// let config = Config::from_file("review.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込む
    ///
    /// ファイルがなければ `None` を返す。ロガー初期化前に呼ばれるため、
    /// デフォルト設定を使う旨の警告は呼び出し側で出す。
    ///
    /// ```no_run
    /// # use transcript_review::config::Config;
    /// let config = Config::load_if_exists("config.toml").unwrap().unwrap_or_default();
    /// ```
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    pub fn load_if_exists<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        if path.as_ref().exists() {
            Self::from_file(path).map(Some)
        } else {
            Ok(None)
        }
    }
}
