use crate::error::{SessionError, StoreError};
use crate::record_store::{FilteredView, RecordStore};
use crate::types::{Direction, FilterStatus, Record};
use std::fs;
use std::path::{Path, PathBuf};

/// コミット後の件数（表示用）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitResult {
    /// 全件数
    pub total: usize,
    /// 完了件数
    pub complete: usize,
}

/// 描画用のセッション状態
#[derive(Clone, Debug)]
pub struct Snapshot<'a> {
    pub filter: FilterStatus,
    /// ビュー内のカーソル位置
    pub cursor: usize,
    /// ビューの件数
    pub view_len: usize,
    pub total: usize,
    pub complete: usize,
    /// カーソル位置のレコード（ビューが空なら None）
    pub current: Option<&'a Record>,
}

/// 1つのバッチに対するレビューセッション
///
/// 表示中の絞り込み条件、ビュー、カーソルを保持し、
/// 編集のコミット時にはバッチ全体を保存先へ書き出す。
#[derive(Debug)]
pub struct ReviewSession {
    store: RecordStore,
    output_path: PathBuf,
    view: FilteredView,
    cursor: usize,
    backup_before_first_save: bool,
    backed_up: bool,
}

impl ReviewSession {
    /// 新しいセッションを作成
    ///
    /// # Arguments
    ///
    /// * `store` - 読み込み済みのバッチ
    /// * `output_path` - コミット時の保存先
    /// * `filter` - 初期の絞り込み条件
    pub fn new<P: Into<PathBuf>>(store: RecordStore, output_path: P, filter: FilterStatus) -> Self {
        let view = store.filter_by_status(filter);
        Self {
            store,
            output_path: output_path.into(),
            view,
            cursor: 0,
            backup_before_first_save: false,
            backed_up: false,
        }
    }

    /// 最初の保存の前に既存ファイルのバックアップを作るかどうか
    pub fn with_backup(mut self, enabled: bool) -> Self {
        self.backup_before_first_save = enabled;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn view(&self) -> &FilteredView {
        &self.view
    }

    pub fn filter(&self) -> FilterStatus {
        self.view.filter()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// カーソル位置のレコード
    pub fn current(&self) -> Option<&Record> {
        self.view.record(&self.store, self.cursor)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            filter: self.filter(),
            cursor: self.cursor,
            view_len: self.view.len(),
            total: self.store.len(),
            complete: self.store.complete_count(),
            current: self.current(),
        }
    }

    /// カーソルを前後に移動
    ///
    /// 先頭での Previous、末尾での Next、空のビューでは何もしない。
    pub fn navigate(&mut self, direction: Direction) {
        // 空のビューには移動先がない
        let last = match self.view.len().checked_sub(1) {
            Some(last) => last,
            None => return,
        };

        self.cursor = match direction {
            Direction::Previous => self.cursor.saturating_sub(1),
            Direction::Next => (self.cursor + 1).min(last),
        };
        log::debug!("カーソル移動: {:?} → {}", direction, self.cursor);
    }

    /// 絞り込み条件を変更
    ///
    /// カーソルは新しいビューの範囲内に収める。
    pub fn change_filter(&mut self, filter: FilterStatus) {
        self.view = self.store.filter_by_status(filter);
        // 旧カーソルが新しいビューの末尾を超える場合は末尾へ
        self.clamp_cursor();
        log::debug!(
            "絞り込み変更: {} ({} 件, カーソル {})",
            filter.as_str(),
            self.view.len(),
            self.cursor
        );
    }

    /// カーソル位置のレコードを更新して保存
    ///
    /// 保存に成功した場合のみ、ビューを同じ条件で作り直しカーソルを先頭に戻す。
    /// 保存に失敗した場合はレコードを元に戻し、ビューとカーソルも変更しない。
    ///
    /// # Errors
    ///
    /// - ビューが空: [`SessionError::EmptyView`]
    /// - 保存（またはバックアップ）の失敗: [`SessionError::Store`]
    pub fn commit_edit(&mut self, new_text: String) -> Result<CommitResult, SessionError> {
        let index = self.view.index_of(self.cursor).ok_or(SessionError::EmptyView)?;
        // 保存失敗時に戻すため、更新前のレコードを控えておく
        let previous = self
            .store
            .get(index)
            .cloned()
            .ok_or(SessionError::EmptyView)?;

        self.store.update_record(&self.view, self.cursor, new_text)?;

        if let Err(e) = self.persist() {
            log::error!("保存に失敗したため変更を取り消します: {}", e);
            self.store.restore(index, previous);
            return Err(e.into());
        }

        // 完了になったレコードはビューから外れうるので作り直す
        self.view = self.store.filter_by_status(self.view.filter());
        self.cursor = 0;

        let result = CommitResult {
            total: self.store.len(),
            complete: self.store.complete_count(),
        };
        log::info!(
            "レコード {} を更新しました (完了 {}/{})",
            index,
            result.complete,
            result.total
        );
        Ok(result)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        // バックアップはセッション中の最初の保存前に1回だけ
        if self.backup_before_first_save && !self.backed_up {
            backup_existing(&self.output_path)?;
            self.backed_up = true;
        }
        self.store.save(&self.output_path)
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.view.len().saturating_sub(1));
    }
}

/// 既存ファイルを `<名前>.<日時>.bak` にコピー
///
/// ファイルが存在しなければ何もしない。
fn backup_existing(path: &Path) -> Result<Option<PathBuf>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    // 例: out.jsonl → out.jsonl.20240101_120000.bak
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.bak", timestamp));
    let backup_path = path.with_file_name(name);

    fs::copy(path, &backup_path).map_err(|source| StoreError::Write {
        path: backup_path.clone(),
        source,
    })?;

    log::info!("バックアップを作成しました: {:?}", backup_path);
    Ok(Some(backup_path))
}
