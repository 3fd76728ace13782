//! transcript-review - 音声文字起こしデータのレビューツール
//!
//! JSONL形式の文字起こしバッチを読み込み、1件ずつ音声を聞きながら
//! テキストを修正して完了にする。編集をコミットするたびにバッチ全体を保存する。
//!
//! # 主な機能
//!
//! - **レコードストア**: JSONLの読み込み・保存、状態による絞り込み、1件単位の更新
//! - **レビューセッション**: 絞り込み条件とカーソルの管理、編集のコミット
//! - **TUI**: 端末上での閲覧・編集
//! - **音声再生**: WAVファイルの再生
//!
//! # アーキテクチャ
//!
//! ```text
//! [JSONL] → [RecordStore] ← [ReviewSession] ← [TuiApp] → [AudioPlayer]
//!               │                                             │
//!               ↓                                             ↓
//!           [JSONL (保存)]                               [出力デバイス]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use transcript_review::record_store::RecordStore;
//! use transcript_review::session::ReviewSession;
//! use transcript_review::types::FilterStatus;
//!
//! let store = RecordStore::load_path("batch.jsonl").unwrap();
//! let mut session = ReviewSession::new(store, "batch.jsonl", FilterStatus::Incomplete);
//! let result = session.commit_edit("修正後のテキスト".to_string()).unwrap();
//! println!("完了 {}/{}", result.complete, result.total);
//! ```

pub mod config;
pub mod editor;
pub mod error;
pub mod playback;
pub mod record_store;
pub mod session;
pub mod tui;
pub mod types;
