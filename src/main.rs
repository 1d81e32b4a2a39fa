mod commands;
mod logging;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use commands::{Command, Outcome};
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use rag::{Assistant, Config, Session};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = Config::from_env();
    logging::init(&cfg.log_dir);
    info!(data_dir = %cfg.data_dir.display(), "starting chronobot");
    let assistant = Arc::new(Assistant::open(cfg));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(assistant);
    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = %err, "terminal loop failed");
    }
    res
}

struct App {
    assistant: Arc<Assistant>,
    session: Session,
    input: String,
    /// Cursor position in characters.
    cursor: usize,
    answer: Option<String>,
    source: Option<String>,
    status: Option<Status>,
    output_focus: OutputFocus,
    answer_view: ScrollView,
    source_view: ScrollView,
    answer_follow: bool,
    is_loading: bool,
    spinner_idx: usize,
}

#[derive(Clone, Debug)]
enum Status {
    Info(String),
    Error(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFocus {
    Answer,
    Source,
}

/// Scroll state of one output pane, measured in lines.
#[derive(Clone, Copy, Debug, Default)]
struct ScrollView {
    offset: usize,
    content_len: usize,
    view_height: usize,
}

impl ScrollView {
    fn max_offset(&self) -> usize {
        self.content_len.saturating_sub(self.view_height)
    }

    fn up(&mut self, by: usize) {
        self.offset = self.offset.saturating_sub(by);
    }

    fn down(&mut self, by: usize) {
        self.offset = (self.offset + by).min(self.max_offset());
    }

    fn to_end(&mut self) {
        self.offset = self.max_offset();
    }

    /// Record the latest layout and keep the offset within it.
    fn measure(&mut self, text: &str, view_height: usize) {
        self.content_len = line_count(text);
        self.view_height = view_height;
        self.offset = self.offset.min(self.max_offset());
    }

    fn scrollbar(&self) -> ScrollbarState {
        ScrollbarState::new(self.content_len).position(self.offset)
    }
}

struct Response {
    session: Session,
    outcome: Outcome,
}

impl App {
    fn new(assistant: Arc<Assistant>) -> Self {
        Self {
            assistant,
            session: Session::default(),
            input: String::new(),
            cursor: 0,
            answer: None,
            source: None,
            status: None,
            output_focus: OutputFocus::Answer,
            answer_view: ScrollView::default(),
            source_view: ScrollView::default(),
            answer_follow: false,
            is_loading: false,
            spinner_idx: 0,
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_index();
        self.input.insert(at, c);
        self.cursor += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index();
        self.input.remove(at);
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    fn submit(&mut self, tx: mpsc::UnboundedSender<Response>) {
        if self.input.trim().is_empty() || self.is_loading {
            return;
        }
        let line = std::mem::take(&mut self.input);
        self.cursor = 0;

        let command = match commands::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                self.status = Some(Status::Error(message));
                return;
            }
        };
        if let Command::Ask(question) = &command {
            self.answer = Some(format!("Q: {}", question));
            self.source = None;
        }

        self.is_loading = true;
        self.answer_follow = true;
        self.status = None;
        let assistant = self.assistant.clone();
        let mut session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = commands::execute(&assistant, &mut session, command);
            let _ = tx.send(Response { session, outcome });
        });
    }

    fn apply(&mut self, response: Response) {
        self.session = response.session;
        match response.outcome {
            Outcome::Answer { question, answer } => {
                self.answer = Some(format!("Q: {}\n\n{}", question, answer.text));
                let mut source = answer
                    .source_label()
                    .unwrap_or_else(|| "No source available.".to_string());
                if !answer.candidates.is_empty() {
                    source.push_str("\n\nToo many matches. Options: ");
                    source.push_str(&answer.candidates.join(", "));
                }
                self.source = Some(source);
                self.source_view.offset = 0;
                self.answer_view.offset = 0;
                self.answer_follow = false;
            }
            Outcome::Listing { title, lines } => {
                let body = if lines.is_empty() {
                    "(nothing to show)".to_string()
                } else {
                    lines.join("\n")
                };
                self.answer = Some(format!("{}\n\n{}", title, body));
                self.answer_view.offset = 0;
                self.answer_follow = false;
            }
            Outcome::Info(message) => self.status = Some(Status::Info(message)),
            Outcome::Error(message) => self.status = Some(Status::Error(message)),
        }
    }

    fn focused_view(&mut self) -> &mut ScrollView {
        match self.output_focus {
            OutputFocus::Answer => &mut self.answer_view,
            OutputFocus::Source => &mut self.source_view,
        }
    }

    fn page(&mut self) -> usize {
        self.focused_view().view_height.max(1)
    }

    fn sidebar_text(&self) -> String {
        let mut text = String::new();
        match &self.session.user {
            Some(user) => text.push_str(&format!("Logged in: {} ({})\n", user.username, user.role)),
            None => text.push_str(&format!(
                "Not logged in\nSelected role: {}\n",
                self.session.selected_role
            )),
        }
        if self.session.admin {
            text.push_str("Admin mode\n");
        }
        text.push_str("\nRecent queries\n");
        if self.session.recent_queries.is_empty() {
            text.push_str("  (none yet)\n");
        }
        for query in &self.session.recent_queries {
            text.push_str(&format!("  - {}\n", query));
        }
        text
    }
}

fn inner_width(area: ratatui::layout::Rect) -> usize {
    area.width.saturating_sub(2) as usize
}

fn inner_height(area: ratatui::layout::Rect) -> usize {
    area.height.saturating_sub(2) as usize
}

fn view_start(len: usize, cursor: usize, max_width: usize) -> usize {
    if len <= max_width {
        return 0;
    }
    let cursor = cursor.min(len);
    let start = cursor.saturating_sub(max_width / 2);
    start.min(len - max_width)
}

fn truncate_input(input: &str, cursor: usize, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let len = input.chars().count();
    let start = view_start(len, cursor, max_width);
    input.chars().skip(start).take(max_width).collect()
}

fn cursor_x_in_view(input: &str, cursor: usize, max_width: usize) -> usize {
    if max_width == 0 {
        return 0;
    }
    let len = input.chars().count();
    let start = view_start(len, cursor, max_width);
    cursor.min(len).saturating_sub(start).min(max_width)
}

fn line_count(text: &str) -> usize {
    let count = text.lines().count();
    if count == 0 { 1 } else { count }
}

fn focus_marker(app: &App, pane: OutputFocus) -> &'static str {
    if app.output_focus == pane { " *" } else { "" }
}

fn draw_ui(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let spinner = ["|", "/", "-", "\\"];

    terminal.draw(|frame| {
        let title_style = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
        let info_border = Style::default().fg(Color::Black);
        let input_border = Style::default().fg(Color::DarkGray);
        let help_border = Style::default().fg(Color::DarkGray);
        let info_text_style = Style::default().fg(Color::Blue);
        let source_text_style = Style::default().fg(Color::Magenta);
        let help_text_style = Style::default().fg(Color::DarkGray);
        let input_text_style = Style::default().fg(Color::DarkGray);

        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(chunks[0]);
        let output_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(columns[0]);

        let answer_text = if app.is_loading {
            match &app.answer {
                Some(question) => format!("{}\n\nThinking...", question),
                None => "Working...".to_string(),
            }
        } else {
            app.answer
                .clone()
                .unwrap_or_else(|| "Welcome to ChronoBOT. Type /help to see what you can do.".to_string())
        };
        let source_text = app
            .source
            .clone()
            .unwrap_or_else(|| "The source of each answer appears here.".to_string());

        let answer_title = if app.is_loading {
            format!("Answer {}{}", spinner[app.spinner_idx], focus_marker(app, OutputFocus::Answer))
        } else {
            format!("Answer{}", focus_marker(app, OutputFocus::Answer))
        };
        let source_title = format!("Source{}", focus_marker(app, OutputFocus::Source));

        let answer_block = Block::bordered()
            .title(answer_title)
            .title_style(title_style)
            .border_style(info_border);
        let source_block = Block::bordered()
            .title(source_title)
            .title_style(title_style)
            .border_style(info_border);

        app.answer_view.measure(&answer_text, inner_height(output_chunks[0]));
        if app.answer_follow {
            app.answer_view.to_end();
            app.answer_follow = false;
        }
        app.source_view.measure(&source_text, inner_height(output_chunks[1]));

        let answer = Paragraph::new(answer_text)
            .style(info_text_style)
            .scroll((app.answer_view.offset as u16, 0))
            .wrap(Wrap { trim: true })
            .block(answer_block);
        frame.render_widget(answer, output_chunks[0]);

        let mut answer_scrollbar = app.answer_view.scrollbar();
        let answer_scrollbar_widget = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .track_style(Style::default().fg(Color::DarkGray))
            .thumb_style(Style::default().fg(Color::Blue));
        frame.render_stateful_widget(
            answer_scrollbar_widget,
            output_chunks[0].inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut answer_scrollbar,
        );

        let source = Paragraph::new(source_text)
            .style(source_text_style)
            .scroll((app.source_view.offset as u16, 0))
            .wrap(Wrap { trim: true })
            .block(source_block);
        frame.render_widget(source, output_chunks[1]);

        let sidebar = Paragraph::new(app.sidebar_text())
            .style(info_text_style)
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title("Session")
                    .title_style(title_style)
                    .border_style(info_border),
            );
        frame.render_widget(sidebar, columns[1]);

        let input_title = match app.session.user.as_ref() {
            Some(user) if user.role == rag::Role::Student => "Ask a question or type /help",
            _ => "Command (/help for the list)",
        };
        let input_block = Block::bordered()
            .title(input_title)
            .title_style(title_style)
            .border_style(input_border);
        let masked = commands::mask_secrets(&app.input);
        let input_view = truncate_input(&masked, app.cursor, inner_width(chunks[1]));
        let input = Paragraph::new(input_view)
            .style(input_text_style)
            .block(input_block)
            .wrap(Wrap { trim: false });
        frame.render_widget(input, chunks[1]);

        let cursor_x = cursor_x_in_view(&masked, app.cursor, inner_width(chunks[1]));
        let x = chunks[1].x + 1 + cursor_x as u16;
        let y = chunks[1].y + 1;
        frame.set_cursor_position((x, y));

        let (status_title, status_style) = match &app.status {
            Some(Status::Info(message)) => (message.clone(), Style::default().fg(Color::Green)),
            Some(Status::Error(message)) => (message.clone(), Style::default().fg(Color::Red)),
            None => ("Controls".to_string(), title_style),
        };
        let help_block = Block::bordered()
            .title(status_title)
            .title_style(status_style.add_modifier(Modifier::BOLD))
            .border_style(help_border);
        let help = Paragraph::new(
            "Enter: Submit | Tab: Focus | Up/Down/PgUp/PgDn/Home/End: Scroll | Esc/Ctrl+C: Quit",
        )
        .style(help_text_style)
        .wrap(Wrap { trim: true })
        .block(help_block);
        frame.render_widget(help, chunks[2]);
    })?;

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let mut events = EventStream::new();
    let mut spinner_tick = tokio::time::interval(Duration::from_millis(100));
    spinner_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    draw_ui(terminal, app)?;

    loop {
        tokio::select! {
            _ = spinner_tick.tick() => {
                if app.is_loading {
                    app.spinner_idx = (app.spinner_idx + 1) % 4;
                    draw_ui(terminal, app)?;
                }
            }
            maybe_result = rx.recv() => {
                if let Some(response) = maybe_result {
                    app.is_loading = false;
                    app.apply(response);
                    draw_ui(terminal, app)?;
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                            KeyCode::Esc => return Ok(()),
                            KeyCode::Enter => app.submit(tx.clone()),
                            KeyCode::Up => app.focused_view().up(1),
                            KeyCode::Down => app.focused_view().down(1),
                            KeyCode::PageUp => {
                                let page = app.page();
                                app.focused_view().up(page);
                            }
                            KeyCode::PageDown => {
                                let page = app.page();
                                app.focused_view().down(page);
                            }
                            KeyCode::Home => app.focused_view().offset = 0,
                            KeyCode::End => app.focused_view().to_end(),
                            KeyCode::Tab => {
                                app.output_focus = match app.output_focus {
                                    OutputFocus::Answer => OutputFocus::Source,
                                    OutputFocus::Source => OutputFocus::Answer,
                                };
                            }
                            KeyCode::Left => app.move_left(),
                            KeyCode::Right => app.move_right(),
                            KeyCode::Backspace => app.delete_char(),
                            KeyCode::Char(ch) => app.insert_char(ch),
                            _ => {}
                        }
                        draw_ui(terminal, app)?;
                    }
                    Some(Ok(Event::Resize(_, _))) => draw_ui(terminal, app)?,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {}
                    None => return Ok(()),
                }
            }
        }
    }
}
