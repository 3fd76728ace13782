use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// レビュー状態
///
/// `Incomplete` から `Complete` への一方向の遷移のみ存在する。
/// 完了済みのレコードを未完了に戻す手段はない。
///
/// # Examples
///
/// ```
/// # use transcript_review::types::Status;
/// assert_eq!(Status::Incomplete.complete(), Status::Complete);
/// assert_eq!(Status::Complete.complete(), Status::Complete);
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// 未完了
    Incomplete,
    /// 完了
    Complete,
}

impl Status {
    /// 完了状態への遷移
    pub fn complete(self) -> Self {
        Status::Complete
    }

    /// ファイル上の表記
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Incomplete => "incomplete",
            Status::Complete => "complete",
        }
    }
}

/// 表示対象を絞り込む条件
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterStatus {
    /// 全件
    All,
    /// 未完了のみ
    Incomplete,
    /// 完了のみ
    Complete,
}

impl FilterStatus {
    /// レコードの状態が条件に一致するか
    pub fn matches(&self, status: Status) -> bool {
        match self {
            FilterStatus::All => true,
            FilterStatus::Incomplete => status == Status::Incomplete,
            FilterStatus::Complete => status == Status::Complete,
        }
    }

    /// all → incomplete → complete → all の順に切り替え
    pub fn next(self) -> Self {
        match self {
            FilterStatus::All => FilterStatus::Incomplete,
            FilterStatus::Incomplete => FilterStatus::Complete,
            FilterStatus::Complete => FilterStatus::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStatus::All => "all",
            FilterStatus::Incomplete => "incomplete",
            FilterStatus::Complete => "complete",
        }
    }
}

/// カーソルの移動方向
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// 1件のアノテーションレコード
///
/// JSONLの1行に対応する。必須キーは `wav`, `txt`, `status`, `invalid_audio` の4つ。
/// それ以外のキーは `extra` にそのまま保持され、保存時に書き戻される。
///
/// # JSON例
///
/// ```json
/// {"wav": "clips/0001.wav", "txt": "こんにちは", "status": "incomplete", "invalid_audio": false}
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Record {
    /// 音声ファイルへの参照（存在確認はしない）
    #[serde(rename = "wav")]
    pub audio_ref: String,

    /// 文字起こしテキスト
    #[serde(rename = "txt")]
    pub text: String,

    /// レビュー状態
    pub status: Status,

    /// 音声が不正かどうか（読み書きするだけで変更しない）
    pub invalid_audio: bool,

    /// 未知のキー
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(audio_ref: impl Into<String>, text: impl Into<String>, status: Status) -> Self {
        Self {
            audio_ref: audio_ref.into(),
            text: text.into(),
            status,
            invalid_audio: false,
            extra: Map::new(),
        }
    }

    /// テキストを書き換えて完了にする
    pub fn complete_with(&mut self, text: String) {
        self.text = text;
        self.status = self.status.complete();
    }

    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }
}
