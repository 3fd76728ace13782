use crate::editor::EditBuffer;
use crate::playback::{resolve_audio_path, AudioPlayer};
use crate::session::{ReviewSession, Snapshot};
use crate::types::{Direction, Status};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// 操作モード
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// 閲覧
    Browse,
    /// テキスト編集中
    Edit(EditBuffer),
}

/// キー入力の結果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Suspend,
}

/// 音声再生の状態（ヘッダー表示用）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioState {
    /// プレイヤーなし
    Disabled,
    /// 停止中（再生終了を含む）
    Stopped,
    /// 再生中
    Playing,
}

/// フッターに表示するメッセージ
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Info(String),
    Error(String),
}

/// TUIアプリケーション
pub struct TuiApp {
    session: ReviewSession,
    mode: Mode,
    message: Option<Message>,
    player: Option<AudioPlayer>,
    /// 相対パスの音声参照を解決する基準ディレクトリ
    audio_base_dir: Option<PathBuf>,
    poll_interval: Duration,
}

impl TuiApp {
    pub fn new(
        session: ReviewSession,
        player: Option<AudioPlayer>,
        audio_base_dir: Option<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            mode: Mode::Browse,
            message: None,
            player,
            audio_base_dir,
            poll_interval,
        }
    }

    pub fn session(&self) -> &ReviewSession {
        &self.session
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// 音声再生の状態
    pub fn audio_state(&self) -> AudioState {
        match &self.player {
            None => AudioState::Disabled,
            Some(player) if player.is_playing() => AudioState::Playing,
            Some(_) => AudioState::Stopped,
        }
    }

    /// TUIを起動
    pub fn run(&mut self) -> Result<()> {
        // ターミナルを初期化
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // ターミナルをリストア
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;

            if !event::poll(self.poll_interval)? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match self.handle_key(key) {
                    Action::Quit => break,
                    Action::Suspend => {
                        Self::suspend()?;
                        terminal.clear()?;
                    }
                    Action::None => {}
                }
            }
        }

        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
        Ok(())
    }

    /// Ctrl+Z でプロセスを一時停止
    fn suspend() -> Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;

        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            let _ = signal::raise(Signal::SIGTSTP);
        }

        // 再開後にターミナルを再初期化
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(())
    }

    /// キー入力を処理
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return Action::Quit,
                KeyCode::Char('z') => return Action::Suspend,
                _ => return Action::None,
            }
        }

        match self.mode {
            Mode::Browse => self.handle_browse_key(key),
            Mode::Edit(_) => {
                self.handle_edit_key(key);
                Action::None
            }
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Left | KeyCode::Char('h') => self.navigate(Direction::Previous),
            KeyCode::Right | KeyCode::Char('l') => self.navigate(Direction::Next),
            KeyCode::Char('f') => {
                let filter = self.session.filter().next();
                self.stop_playback();
                self.session.change_filter(filter);
                self.message = Some(Message::Info(format!("絞り込み: {}", filter.as_str())));
            }
            KeyCode::Char('e') | KeyCode::Enter => match self.session.current() {
                Some(record) => {
                    self.mode = Mode::Edit(EditBuffer::new(&record.text));
                    self.message = None;
                }
                None => {
                    self.message = Some(Message::Error("表示中のレコードがありません".to_string()));
                }
            },
            KeyCode::Char('p') => self.play_current(),
            KeyCode::Char('s') => {
                self.stop_playback();
                self.message = Some(Message::Info("再生を停止しました".to_string()));
            }
            _ => {}
        }
        Action::None
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let buffer = match &mut self.mode {
            Mode::Edit(buffer) => buffer,
            Mode::Browse => return,
        };

        match key.code {
            KeyCode::Char(c) => buffer.insert(c),
            KeyCode::Backspace => buffer.backspace(),
            KeyCode::Delete => buffer.delete(),
            KeyCode::Left => buffer.move_left(),
            KeyCode::Right => buffer.move_right(),
            KeyCode::Home => buffer.move_home(),
            KeyCode::End => buffer.move_end(),
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.message = Some(Message::Info("編集を取り消しました".to_string()));
            }
            KeyCode::Enter => {
                let text = buffer.text().to_string();
                self.commit(text);
            }
            _ => {}
        }
    }

    /// 編集内容をコミット（失敗時は編集モードのまま）
    fn commit(&mut self, text: String) {
        match self.session.commit_edit(text) {
            Ok(result) => {
                self.stop_playback();
                self.mode = Mode::Browse;
                self.message = Some(Message::Info(format!(
                    "保存しました (完了 {}/{})",
                    result.complete, result.total
                )));
            }
            Err(e) => {
                log::error!("コミットに失敗: {}", e);
                self.message = Some(Message::Error(format!("保存に失敗: {}", e)));
            }
        }
    }

    fn navigate(&mut self, direction: Direction) {
        let before = self.session.cursor();
        self.session.navigate(direction);
        if self.session.cursor() != before {
            self.stop_playback();
        }
    }

    fn play_current(&mut self) {
        let audio_ref = match self.session.current() {
            Some(record) => record.audio_ref.clone(),
            None => {
                self.message = Some(Message::Error("表示中のレコードがありません".to_string()));
                return;
            }
        };

        let player = match self.player.as_mut() {
            Some(player) => player,
            None => {
                self.message = Some(Message::Error("音声再生は無効です".to_string()));
                return;
            }
        };

        let path = resolve_audio_path(&audio_ref, self.audio_base_dir.as_deref());
        self.message = Some(match player.play(&path) {
            Ok(duration) => Message::Info(format!("再生中: {} ({:.1}秒)", audio_ref, duration)),
            Err(e) => {
                log::warn!("再生に失敗: {:?}: {:#}", path, e);
                Message::Error(format!("再生に失敗: {:#}", e))
            }
        });
    }

    fn stop_playback(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
    }

    /// 画面を描画
    pub fn draw(&self, f: &mut Frame) {
        let snapshot = self.session.snapshot();

        let mut constraints = vec![
            Constraint::Length(3), // ヘッダー
            Constraint::Min(5),    // レコード
        ];
        if matches!(self.mode, Mode::Edit(_)) {
            constraints.push(Constraint::Length(6)); // 編集欄
        }
        constraints.push(Constraint::Length(4)); // フッター

        let chunks = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints(constraints)
            .split(f.area());

        self.draw_header(f, chunks[0], &snapshot);
        self.draw_record(f, chunks[1], &snapshot);

        if let Mode::Edit(buffer) = &self.mode {
            self.draw_editor(f, chunks[2], buffer);
        }

        if let Some(&area) = chunks.last() {
            self.draw_footer(f, area);
        }
    }

    /// 件数と絞り込み条件を描画
    fn draw_header(&self, f: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let position = if snapshot.current.is_some() {
            format!("{}/{}", snapshot.cursor + 1, snapshot.view_len)
        } else {
            "-".to_string()
        };

        // 再生状態
        let (audio_color, audio_text) = match self.audio_state() {
            AudioState::Disabled => (Color::Gray, "無効"),
            AudioState::Stopped => (Color::White, "停止"),
            AudioState::Playing => (Color::Blue, "再生中"),
        };

        let line = Line::from(vec![
            Span::styled("全件: ", Style::default().fg(Color::White)),
            Span::styled(
                snapshot.total.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("完了: ", Style::default().fg(Color::White)),
            Span::styled(
                snapshot.complete.to_string(),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("絞り込み: ", Style::default().fg(Color::White)),
            Span::styled(
                snapshot.filter.as_str(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("位置: ", Style::default().fg(Color::White)),
            Span::raw(position),
            Span::raw("  "),
            Span::styled("Audio: ", Style::default().fg(Color::White)),
            Span::styled(
                audio_text,
                Style::default().fg(audio_color).add_modifier(Modifier::BOLD),
            ),
        ]);

        let block = Block::default()
            .title("transcript-review")
            .borders(Borders::ALL);
        f.render_widget(Paragraph::new(line).block(block), area);
    }

    /// カーソル位置のレコードを描画
    fn draw_record(&self, f: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let block = Block::default().title("Record").borders(Borders::ALL);

        let record = match snapshot.current {
            Some(record) => record,
            None => {
                let paragraph = Paragraph::new("表示するレコードがありません")
                    .style(Style::default().fg(Color::Gray))
                    .block(block);
                f.render_widget(paragraph, area);
                return;
            }
        };

        let mut audio_line = vec![
            Span::styled("wav: ", Style::default().fg(Color::White)),
            Span::raw(record.audio_ref.as_str()),
        ];
        if record.invalid_audio {
            audio_line.push(Span::styled(
                "  [invalid_audio]",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }

        let status_color = match record.status {
            Status::Complete => Color::Green,
            Status::Incomplete => Color::Yellow,
        };

        let mut lines = vec![
            Line::from(audio_line),
            Line::from(vec![
                Span::styled("status: ", Style::default().fg(Color::White)),
                Span::styled(
                    record.status.as_str(),
                    Style::default()
                        .fg(status_color)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
        ];
        lines.extend(record.text.lines().map(|l| Line::from(l.to_string())));

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    /// 編集欄を描画（キャレット位置の文字を反転表示）
    fn draw_editor(&self, f: &mut Frame, area: Rect, buffer: &EditBuffer) {
        let (before, after) = buffer.split_at_caret();
        let mut rest = after.chars();
        let caret_char = rest.next().map(String::from).unwrap_or_else(|| " ".to_string());

        let line = Line::from(vec![
            Span::raw(before.to_string()),
            Span::styled(
                caret_char,
                Style::default().add_modifier(Modifier::REVERSED),
            ),
            Span::raw(rest.as_str().to_string()),
        ]);

        let block = Block::default()
            .title("Edit (Enter: 保存, Esc: 取消)")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Yellow));
        let paragraph = Paragraph::new(line)
            .block(block)
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    /// 操作説明とメッセージを描画
    fn draw_footer(&self, f: &mut Frame, area: Rect) {
        let help = match self.mode {
            Mode::Browse => "←/h: 前  →/l: 次  f: 絞り込み  e/Enter: 編集  p: 再生  s: 停止  q: 終了",
            Mode::Edit(_) => "Enter: 保存  Esc: 取消  ←/→/Home/End: 移動  Backspace/Delete: 削除",
        };

        let message_line = match &self.message {
            Some(Message::Info(text)) => Line::from(Span::styled(
                text.as_str(),
                Style::default().fg(Color::Green),
            )),
            Some(Message::Error(text)) => Line::from(Span::styled(
                text.as_str(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            None => Line::from(""),
        };

        let text = Text::from(vec![
            Line::from(Span::styled(help, Style::default().fg(Color::Gray))),
            message_line,
        ]);
        let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::TOP));
        f.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::RecordStore;
    use crate::types::FilterStatus;
    use ratatui::backend::TestBackend;
    use tempfile::TempDir;

    const TWO_RECORDS: &str = r#"{"wav":"a.wav","txt":"hi","status":"incomplete","invalid_audio":false}
{"wav":"b.wav","txt":"yo","status":"complete","invalid_audio":true}
"#;

    fn app_in(dir: &TempDir, filter: FilterStatus) -> TuiApp {
        let store = RecordStore::load(TWO_RECORDS.as_bytes()).unwrap();
        let session = ReviewSession::new(store, dir.path().join("out.jsonl"), filter);
        TuiApp::new(session, None, None, Duration::from_millis(10))
    }

    fn press(app: &mut TuiApp, code: KeyCode) -> Action {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn render(app: &TuiApp) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_quit_keys() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::All);

        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::Quit);
        assert_eq!(press(&mut app, KeyCode::Esc), Action::Quit);
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('z'), KeyModifiers::CONTROL)),
            Action::Suspend
        );
    }

    #[test]
    fn test_navigation_keys() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::All);

        press(&mut app, KeyCode::Right);
        assert_eq!(app.session().cursor(), 1);
        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.session().cursor(), 1);
        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.session().cursor(), 0);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.session().cursor(), 0);
    }

    #[test]
    fn test_filter_key_cycles_and_clamps() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::All);
        press(&mut app, KeyCode::Right);

        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.session().filter(), FilterStatus::Incomplete);
        assert_eq!(app.session().cursor(), 0);
        assert_eq!(app.session().current().unwrap().audio_ref, "a.wav");

        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.session().filter(), FilterStatus::Complete);
        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.session().filter(), FilterStatus::All);
    }

    #[test]
    fn test_edit_and_commit() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::Incomplete);

        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.mode(), &Mode::Edit(EditBuffer::new("hi")));

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "hello");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode(), &Mode::Browse);
        assert!(matches!(app.message(), Some(Message::Info(_))));

        let snapshot = app.session().snapshot();
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.complete, 2);
        assert_eq!(snapshot.view_len, 0);
        assert_eq!(app.session().store().records()[0].text, "hello");

        let saved = RecordStore::load_path(app.session().output_path()).unwrap();
        assert_eq!(saved.records()[0].text, "hello");
    }

    #[test]
    fn test_edit_keys_do_not_navigate() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::All);

        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "qfl");
        press(&mut app, KeyCode::Right);
        assert_eq!(app.session().cursor(), 0);
        assert_eq!(app.mode(), &Mode::Edit(EditBuffer::new("hiqfl")));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode(), &Mode::Browse);
        assert_eq!(app.session().store().records()[0].text, "hi");
        assert_eq!(app.session().filter(), FilterStatus::All);
    }

    #[test]
    fn test_failed_commit_stays_in_edit_mode() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::load(TWO_RECORDS.as_bytes()).unwrap();
        let output = temp_dir.path().join("missing").join("out.jsonl");
        let session = ReviewSession::new(store, output, FilterStatus::Incomplete);
        let mut app = TuiApp::new(session, None, None, Duration::from_millis(10));

        press(&mut app, KeyCode::Char('e'));
        type_text(&mut app, "!");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode(), &Mode::Edit(EditBuffer::new("hi!")));
        assert!(matches!(app.message(), Some(Message::Error(_))));
        assert_eq!(app.session().snapshot().complete, 1);
        assert_eq!(app.session().store().records()[0].text, "hi");
    }

    #[test]
    fn test_edit_and_play_on_empty_view() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::Incomplete);
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Enter);
        assert!(app.session().view().is_empty());

        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.mode(), &Mode::Browse);
        assert!(matches!(app.message(), Some(Message::Error(_))));

        press(&mut app, KeyCode::Char('p'));
        press(&mut app, KeyCode::Right);
        assert_eq!(app.session().cursor(), 0);
    }

    #[test]
    fn test_play_without_player() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::All);
        assert_eq!(app.audio_state(), AudioState::Disabled);

        press(&mut app, KeyCode::Char('p'));
        assert!(matches!(app.message(), Some(Message::Error(_))));
        assert_eq!(app.audio_state(), AudioState::Disabled);
        assert!(render(&app).contains("Audio:"));
    }

    #[test]
    fn test_render_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::All);

        let screen = render(&app);
        assert!(screen.contains("transcript-review"));
        assert!(screen.contains("a.wav"));
        assert!(screen.contains("incomplete"));
        assert!(screen.contains("1/2"));
        assert!(!screen.contains("[invalid_audio]"));

        press(&mut app, KeyCode::Right);
        let screen = render(&app);
        assert!(screen.contains("b.wav"));
        assert!(screen.contains("[invalid_audio]"));
        assert!(screen.contains("2/2"));
    }

    #[test]
    fn test_render_editor_and_empty_view() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir, FilterStatus::Incomplete);

        press(&mut app, KeyCode::Char('e'));
        type_text(&mut app, " there");
        let screen = render(&app);
        assert!(screen.contains("Edit"));
        assert!(screen.contains("hi there"));

        press(&mut app, KeyCode::Enter);
        let screen = render(&app);
        assert!(!screen.contains("Edit"));
        assert!(!screen.contains("a.wav"));
    }
}
