//! Terminal form for building a report interactively.
//!
//! State transitions live on [`App`] and are plain functions of key events;
//! the [`run`] loop owns the terminal and the session.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{execute, terminal};
use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::error::Result;
use crate::export::ExportFormat;
use crate::report::{ImageAttachment, Priority, Report};
use crate::session::{ObservationDraft, ReportSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Description,
    ImagePath,
    Priority,
    Report,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Description => Focus::ImagePath,
            Focus::ImagePath => Focus::Priority,
            Focus::Priority => Focus::Report,
            Focus::Report => Focus::Description,
        }
    }

    fn previous(self) -> Self {
        match self {
            Focus::Description => Focus::Report,
            Focus::ImagePath => Focus::Description,
            Focus::Priority => Focus::ImagePath,
            Focus::Report => Focus::Priority,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Submit,
    RemoveSelected,
    Clear,
    Export(ExportFormat),
    Quit,
}

#[derive(Debug, Clone)]
pub struct App {
    pub description: String,
    pub image_path: String,
    pub priority: Priority,
    pub focus: Focus,
    pub selected: usize,
    pub status: (StatusKind, String),
}

impl Default for App {
    fn default() -> Self {
        Self {
            description: String::new(),
            image_path: String::new(),
            priority: Priority::default(),
            focus: Focus::Description,
            selected: 0,
            status: (
                StatusKind::Info,
                "Describe an observation and press Enter.".to_string(),
            ),
        }
    }
}

impl App {
    pub fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = (kind, text.into());
    }

    /// Maps a key press to an action, editing form state along the way.
    pub fn handle_key(&mut self, key: KeyEvent, report_len: usize) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return Action::Quit,
            KeyCode::Esc => return Action::Quit,
            KeyCode::F(2) => return Action::Export(ExportFormat::Csv),
            KeyCode::F(3) => return Action::Export(ExportFormat::Pdf),
            KeyCode::F(5) => return Action::Clear,
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return Action::None;
            }
            KeyCode::BackTab => {
                self.focus = self.focus.previous();
                return Action::None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Description | Focus::ImagePath => {
                let field = if self.focus == Focus::Description {
                    &mut self.description
                } else {
                    &mut self.image_path
                };
                match key.code {
                    KeyCode::Enter => Action::Submit,
                    KeyCode::Backspace => {
                        field.pop();
                        Action::None
                    }
                    KeyCode::Char(c) if !ctrl => {
                        field.push(c);
                        Action::None
                    }
                    _ => Action::None,
                }
            }
            Focus::Priority => match key.code {
                KeyCode::Enter => Action::Submit,
                KeyCode::Left => {
                    self.priority = self.priority.previous();
                    Action::None
                }
                KeyCode::Right | KeyCode::Char(' ') => {
                    self.priority = self.priority.next();
                    Action::None
                }
                KeyCode::Char('l') => {
                    self.priority = Priority::Low;
                    Action::None
                }
                KeyCode::Char('m') => {
                    self.priority = Priority::Medium;
                    Action::None
                }
                KeyCode::Char('h') => {
                    self.priority = Priority::High;
                    Action::None
                }
                _ => Action::None,
            },
            Focus::Report => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected = self.selected.saturating_sub(1);
                    Action::None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.selected + 1 < report_len {
                        self.selected += 1;
                    }
                    Action::None
                }
                KeyCode::Delete | KeyCode::Char('d') if report_len > 0 => Action::RemoveSelected,
                _ => Action::None,
            },
        }
    }

    /// Builds a draft from the form. Loading the image can fail before any
    /// recommendation is requested.
    pub fn draft(&self) -> Result<ObservationDraft> {
        let mut draft = ObservationDraft::new(self.description.clone()).with_priority(self.priority);
        let path = self.image_path.trim();
        if !path.is_empty() {
            draft = draft.with_image(ImageAttachment::from_path(path)?);
        }
        Ok(draft)
    }

    pub fn clear_form(&mut self) {
        self.description.clear();
        self.image_path.clear();
        self.priority = Priority::default();
        self.focus = Focus::Description;
    }

    pub fn clamp_selection(&mut self, report_len: usize) {
        if report_len == 0 {
            self.selected = 0;
        } else if self.selected >= report_len {
            self.selected = report_len - 1;
        }
    }
}

/// Runs the interactive form until the user quits.
pub async fn run(session: &mut ReportSession, output_dir: &Path) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut term = Terminal::new(backend)?;

    let result = event_loop(&mut term, session, output_dir).await;

    terminal::disable_raw_mode()?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen)?;
    result
}

async fn event_loop<B: Backend>(
    term: &mut Terminal<B>,
    session: &mut ReportSession,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let mut app = App::default();
    app.set_status(
        StatusKind::Info,
        format!(
            "Recommendations via {}. Describe an observation and press Enter.",
            session.recommender_name()
        ),
    );

    loop {
        term.draw(|f| ui(f, &app, session.list()))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key, session.list().len()) {
            Action::None => {}
            Action::Quit => break,
            Action::Submit => {
                let draft = match app.draft() {
                    Ok(draft) => draft,
                    Err(e) => {
                        app.set_status(StatusKind::Warning, e.to_string());
                        continue;
                    }
                };
                if draft.text.trim().is_empty() {
                    app.set_status(
                        StatusKind::Warning,
                        "Please provide a description for the observation.",
                    );
                    continue;
                }
                app.set_status(StatusKind::Info, "Generating recommendation... Please wait.");
                term.draw(|f| ui(f, &app, session.list()))?;
                match session.submit(draft).await {
                    Ok(_) => {
                        app.clear_form();
                        app.selected = 0;
                        app.set_status(StatusKind::Success, "Observation added successfully!");
                    }
                    Err(e) => app.set_status(StatusKind::Error, e.to_string()),
                }
            }
            Action::RemoveSelected => {
                if let Some(id) = session.list().get(app.selected).map(|o| o.id()) {
                    session.remove(id);
                    app.clamp_selection(session.list().len());
                    app.set_status(StatusKind::Info, "Observation removed.");
                }
            }
            Action::Clear => {
                session.clear();
                app.clamp_selection(0);
                app.set_status(StatusKind::Info, "Report cleared.");
            }
            Action::Export(format) => {
                if session.list().is_empty() {
                    app.set_status(StatusKind::Warning, "Nothing to export yet.");
                    continue;
                }
                match session.export_to_dir(format, output_dir) {
                    Ok(path) => app.set_status(
                        StatusKind::Success,
                        format!("Saved {}", display_path(&path)),
                    ),
                    Err(e) => app.set_status(StatusKind::Error, e.to_string()),
                }
            }
        }
    }
    Ok(())
}

fn display_path(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .display()
        .to_string()
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::Green,
        Priority::Medium => Color::Yellow,
        Priority::High => Color::Red,
    }
}

/// Cursor cell after `len` characters inside a bordered field, clamped to the
/// field's inner area.
fn cursor_position(area: Rect, len: usize, wrap: bool) -> (u16, u16) {
    let inner_width = usize::from(area.width.saturating_sub(2).max(1));
    let inner_height = usize::from(area.height.saturating_sub(2).max(1));
    let (col, row) = if wrap {
        (len % inner_width, len / inner_width)
    } else {
        (len, 0)
    };
    let col = col.min(inner_width - 1) as u16;
    let row = row.min(inner_height - 1) as u16;
    (
        area.x.saturating_add(1).saturating_add(col),
        area.y.saturating_add(1).saturating_add(row),
    )
}

fn ui(f: &mut Frame, app: &App, report: &Report) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(f.size());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Automated Report Generator",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::raw(format!("{} observation(s)", report.len())),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Audit Report"));
    f.render_widget(header, chunks[0]);

    // Form
    let form = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3)])
        .split(form[1]);

    let description = Paragraph::new(app.description.as_str())
        .wrap(Wrap { trim: false })
        .block(field_block(
            "Describe the Observation (Required)",
            app.focus == Focus::Description,
        ));
    f.render_widget(description, form[0]);

    let image = Paragraph::new(app.image_path.as_str()).block(field_block(
        "Image path (png/jpg/jpeg/webp, optional)",
        app.focus == Focus::ImagePath,
    ));
    f.render_widget(image, side[0]);

    let priority_spans: Vec<Span> = Priority::ALL
        .iter()
        .flat_map(|p| {
            let style = if *p == app.priority {
                Style::default()
                    .fg(priority_color(*p))
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            [Span::styled(format!(" {} ", p), style), Span::raw(" ")]
        })
        .collect();
    let priority = Paragraph::new(Line::from(priority_spans)).block(field_block(
        "Priority (Left/Right)",
        app.focus == Focus::Priority,
    ));
    f.render_widget(priority, side[1]);

    match app.focus {
        Focus::Description => {
            let (x, y) = cursor_position(form[0], app.description.chars().count(), true);
            f.set_cursor(x, y);
        }
        Focus::ImagePath => {
            let (x, y) = cursor_position(side[0], app.image_path.chars().count(), false);
            f.set_cursor(x, y);
        }
        _ => {}
    }

    // Status
    let (kind, text) = &app.status;
    let status_style = match kind {
        StatusKind::Info => Style::default().fg(Color::Cyan),
        StatusKind::Success => Style::default().fg(Color::Green),
        StatusKind::Warning => Style::default().fg(Color::Yellow),
        StatusKind::Error => Style::default().fg(Color::Red),
    };
    let status = Paragraph::new(Span::styled(text.as_str(), status_style))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);

    // Report
    let report_block = field_block(
        "Observations and Recommendations (Up/Down, d to remove)",
        app.focus == Focus::Report,
    );
    if report.is_empty() {
        let empty = Paragraph::new("Your report is currently empty. Add observations to begin.")
            .block(report_block);
        f.render_widget(empty, chunks[3]);
    } else {
        let items: Vec<ListItem> = report
            .numbered()
            .map(|(serial, obs)| {
                let mut lines = vec![Line::from(vec![
                    Span::styled(
                        format!("{:>3}. ", serial),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("[{}] ", obs.priority()),
                        Style::default().fg(priority_color(obs.priority())),
                    ),
                    Span::raw(if obs.image().is_some() {
                        "(image) "
                    } else {
                        "(no image) "
                    }),
                    Span::raw(obs.observation_text().to_string()),
                ])];
                lines.extend(
                    obs.recommendation()
                        .lines()
                        .map(|l| Line::raw(format!("     {}", l))),
                );
                lines.push(Line::raw(""));
                ListItem::new(lines)
            })
            .collect();
        let mut state = ListState::default();
        if app.focus == Focus::Report {
            state.select(Some(app.selected.min(report.len() - 1)));
        }
        let list = List::new(items)
            .block(report_block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        f.render_stateful_widget(list, chunks[3], &mut state);
    }

    let help = Paragraph::new(Line::raw(
        "Tab/Shift-Tab focus • Enter submit • F2 export CSV • F3 export PDF • F5 clear report • Esc quit",
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[4]);
}
