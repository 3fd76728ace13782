/// 文字起こしテキストの編集バッファ
///
/// キャレット位置は文字単位で保持する（バイト位置ではない）。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditBuffer {
    text: String,
    /// キャレット位置（文字数）
    caret: usize,
}

impl EditBuffer {
    /// 既存のテキストから作成（キャレットは末尾）
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            caret: text.chars().count(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    /// キャレット位置に1文字挿入
    pub fn insert(&mut self, c: char) {
        let at = self.byte_offset(self.caret);
        self.text.insert(at, c);
        self.caret += 1;
    }

    /// キャレットの前の1文字を削除
    pub fn backspace(&mut self) {
        if self.caret == 0 {
            return;
        }
        self.caret -= 1;
        let at = self.byte_offset(self.caret);
        self.text.remove(at);
    }

    /// キャレット位置の1文字を削除
    pub fn delete(&mut self) {
        if self.caret < self.char_len() {
            let at = self.byte_offset(self.caret);
            self.text.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.caret = self.caret.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.caret = (self.caret + 1).min(self.char_len());
    }

    pub fn move_home(&mut self) {
        self.caret = 0;
    }

    pub fn move_end(&mut self) {
        self.caret = self.char_len();
    }

    /// キャレットの前後でテキストを分割（描画用）
    pub fn split_at_caret(&self) -> (&str, &str) {
        self.text.split_at(self.byte_offset(self.caret))
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_offset(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(offset, _)| offset)
            .unwrap_or(self.text.len())
    }
}
