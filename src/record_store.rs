use crate::error::{StoreError, StoreResult};
use crate::types::{FilterStatus, Record, Status};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// UTF-8 の BOM
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// アノテーションレコードのストア
///
/// 1つの入力ファイルから読み込んだレコード群（バッチ）を入力順のまま保持する。
/// レコードに固有IDはなく、バッチ内の位置で識別する。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

/// 状態で絞り込んだビュー
///
/// バッチ内のインデックスを入力順に並べたもの。レコード本体は持たず、
/// 参照時は元の [`RecordStore`] から取り出す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredView {
    filter: FilterStatus,
    indices: Vec<usize>,
}

impl FilteredView {
    /// 絞り込み条件
    pub fn filter(&self) -> FilterStatus {
        self.filter
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// ビュー内の位置に対応するバッチ内インデックス
    pub fn index_of(&self, position: usize) -> Option<usize> {
        self.indices.get(position).copied()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// ビュー内の位置のレコードを取得
    pub fn record<'a>(&self, store: &'a RecordStore, position: usize) -> Option<&'a Record> {
        self.index_of(position).and_then(|index| store.get(index))
    }
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// 改行区切りのJSONからバッチを読み込み
    ///
    /// 1行を1レコードとして入力順に解析する。最初の不正な行でエラーを返し、
    /// 不正な行を読み飛ばしたり既定値で補ったりはしない。
    ///
    /// # Errors
    ///
    /// - JSONとして解析できない行（空行を含む）: [`StoreError::Parse`]
    /// - オブジェクトでない、必須キーの欠落、型の不一致、未知の status: [`StoreError::Schema`]
    /// - 読み込み自体の失敗: [`StoreError::Read`]
    ///
    /// # Examples
    ///
    /// ```
    /// # use transcript_review::record_store::RecordStore;
    /// let input = r#"{"wav":"a.wav","txt":"hi","status":"incomplete","invalid_audio":false}"#;
    /// let store = RecordStore::load(input.as_bytes()).unwrap();
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn load<R: BufRead>(reader: R) -> StoreResult<Self> {
        let mut records = Vec::new();

        // UTF-8として不正なバイト列も行単位の解析エラーにするため、バイト列のまま分割する
        for (idx, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|source| StoreError::Read { source })?;
            let mut bytes = line.as_slice();

            // CRLF の CR を除去
            if let Some(stripped) = bytes.strip_suffix(b"\r") {
                bytes = stripped;
            }

            // 先頭行の BOM を除去
            if idx == 0 {
                if let Some(stripped) = bytes.strip_prefix(UTF8_BOM) {
                    bytes = stripped;
                }
            }

            records.push(parse_line(bytes, idx + 1)?);
        }

        log::info!("{} 件のレコードを読み込みました", records.len());
        Ok(Self { records })
    }

    /// ファイルからバッチを読み込み
    pub fn load_path<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let file = File::open(path.as_ref()).map_err(|source| StoreError::Read { source })?;
        log::info!("入力ファイル: {:?}", path.as_ref());
        Self::load(BufReader::new(file))
    }

    /// バッチ全体を保存
    ///
    /// 保存先と同じディレクトリに一時ファイルを書き出してから置き換えるため、
    /// 失敗しても既存のファイルは壊れない。メモリ上のバッチは変更しない。
    pub fn save<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        save_records(path, &self.records)
    }

    /// 状態で絞り込んだビューを作成
    pub fn filter_by_status(&self, filter: FilterStatus) -> FilteredView {
        let indices = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.matches(record.status))
            .map(|(index, _)| index)
            .collect();

        FilteredView { filter, indices }
    }

    /// ビュー内の位置のレコードを更新
    ///
    /// テキストを書き換え、状態を完了にする。レコードを変更できる唯一の経路。
    ///
    /// # Returns
    ///
    /// 更新したレコードのバッチ内インデックス
    pub fn update_record(
        &mut self,
        view: &FilteredView,
        position: usize,
        new_text: String,
    ) -> StoreResult<usize> {
        let index = view
            .index_of(position)
            .filter(|&index| index < self.records.len())
            .ok_or(StoreError::IndexOutOfRange {
                position,
                len: view.len(),
            })?;

        self.records[index].complete_with(new_text);
        Ok(index)
    }

    /// 保存に失敗した更新を取り消す
    pub(crate) fn restore(&mut self, index: usize, record: Record) {
        if let Some(slot) = self.records.get_mut(index) {
            *slot = record;
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 完了済みレコードの件数
    pub fn complete_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == Status::Complete)
            .count()
    }
}

/// 1行をレコードに変換
///
/// JSONとして解析できない行（不正なUTF-8を含む）は Parse、
/// 解析できてもレコードの形をしていない行は Schema とする。
fn parse_line(line: &[u8], line_no: usize) -> StoreResult<Record> {
    let value: Value = serde_json::from_slice(line).map_err(|source| StoreError::Parse {
        line: line_no,
        source,
    })?;

    // 配列や文字列などはJSONとしては正しいがレコードではない
    if !value.is_object() {
        return Err(StoreError::Schema {
            line: line_no,
            message: "JSONオブジェクトではありません".to_string(),
        });
    }

    // 必須キーの欠落・型の不一致・未知の status はここで検出される
    serde_json::from_value(value).map_err(|e| StoreError::Schema {
        line: line_no,
        message: e.to_string(),
    })
}

/// レコード列を改行区切りのJSONとして書き出し
fn write_records<W: Write>(writer: &mut W, records: &[Record]) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// レコード列をファイルに保存（既存の内容は全て置き換える）
///
/// 保存先がシンボリックリンクの場合はリンク先のファイルを置き換える。
pub fn save_records<P: AsRef<Path>>(path: P, records: &[Record]) -> StoreResult<()> {
    let path = path.as_ref();

    // シンボリックリンクを解決（存在しなければ指定されたパスのまま）
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    // 新規作成の場合は通常の作成と同じパーミッションにするため、先に空ファイルを作る
    let created = if target.exists() {
        false
    } else {
        File::create(&target).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        true
    };

    if let Err(source) = replace_file(&target, records) {
        // 作成した空ファイルは残さない
        if created {
            let _ = fs::remove_file(&target);
        }
        return Err(StoreError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    log::info!("{} 件のレコードを保存しました: {:?}", records.len(), target);
    Ok(())
}

/// 同じディレクトリの一時ファイルに書き出してから置き換える
fn replace_file(target: &Path, records: &[Record]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;

    // 既存ファイルのパーミッションを引き継ぐ
    let metadata = fs::metadata(target)?;
    tmp.as_file().set_permissions(metadata.permissions())?;

    // 全レコードを書き出してディスクに同期
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_records(&mut writer, records)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    // 一時ファイルを保存先にリネーム
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
