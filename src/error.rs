//! レコードストアとレビューセッションのエラー型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// レコードストアのエラー
#[derive(Error, Debug)]
pub enum StoreError {
    /// JSONとして解析できない行
    #[error("{line}行目: JSONとして解析できません: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// 必須キーの欠落、型の不一致、未知の status 値
    #[error("{line}行目: レコードの形式が不正です: {message}")]
    Schema { line: usize, message: String },

    /// 入力の読み込みに失敗
    #[error("入力の読み込みに失敗: {source}")]
    Read {
        #[source]
        source: io::Error,
    },

    /// 保存先に書き込めない
    #[error("書き込みに失敗: {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 表示中のビューの範囲外を指定した
    #[error("位置 {position} はビューの範囲外です (件数: {len})")]
    IndexOutOfRange { position: usize, len: usize },
}

impl StoreError {
    /// 入力ファイルの内容に起因するエラーか
    pub fn is_format_error(&self) -> bool {
        matches!(self, StoreError::Parse { .. } | StoreError::Schema { .. })
    }
}

/// レビューセッションのエラー
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 表示対象のレコードがない
    #[error("表示中のレコードがありません")]
    EmptyView,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
