//! Interactive terminal form.
//!
//! Key handling lives on [`FormScreen`] and never touches the terminal, so the
//! screen can be driven from tests. [`run`] owns the terminal and runs
//! requests on the tokio runtime, feeding results back through a channel.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{execute, terminal};
use ratatui::prelude::*;
use ratatui::widgets::*;
use tokio::runtime::Handle;

use crate::client::{PredictionApi, PredictionInput};
use crate::error::PredictionFormError;
use crate::schema::ParamSchema;
use crate::submission::{FormSession, Submission};

const TITLE: &str = "NYC rolling sales prediction";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Submit,
    Reload,
}

#[derive(Debug)]
enum LoadState {
    Loading,
    Failed(String),
    Ready(FormSession),
}

enum Message {
    Loaded(Result<ParamSchema, PredictionFormError>),
    Predicted(Result<f64, PredictionFormError>),
}

#[derive(Debug)]
pub struct FormScreen {
    state: LoadState,
    focus: usize,
    buffers: Vec<String>,
    status: String,
}

impl Default for FormScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl FormScreen {
    pub fn new() -> Self {
        Self {
            state: LoadState::Loading,
            focus: 0,
            buffers: Vec::new(),
            status: "Loading parameters...".to_string(),
        }
    }

    pub fn session(&self) -> Option<&FormSession> {
        match &self.state {
            LoadState::Ready(session) => Some(session),
            _ => None,
        }
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn on_loaded(&mut self, result: Result<ParamSchema, PredictionFormError>) {
        match result {
            Ok(schema) => {
                let session = FormSession::new(schema);
                self.buffers = vec![String::new(); session.form().len()];
                self.focus = 0;
                self.status = "Fill every field and press Enter".to_string();
                self.state = LoadState::Ready(session);
            }
            Err(e) => {
                self.status = format!("Could not load parameters: {e} (press r to retry)");
                self.state = LoadState::Failed(e.to_string());
            }
        }
    }

    pub fn begin_reload(&mut self) {
        self.state = LoadState::Loading;
        self.status = "Loading parameters...".to_string();
    }

    /// Validate and return the body to send, if any
    pub fn begin_submit(&mut self) -> Option<PredictionInput> {
        let LoadState::Ready(session) = &mut self.state else {
            return None;
        };
        match session.prepare_submit() {
            Ok(Submission::Ready(input)) => {
                self.status = "Predicting...".to_string();
                Some(input)
            }
            Ok(Submission::Invalid(names)) => {
                self.status = format!("Required: {}", names.join(", "));
                None
            }
            Err(e) => {
                self.status = e.to_string();
                None
            }
        }
    }

    pub fn on_predicted(&mut self, result: Result<f64, PredictionFormError>) {
        let LoadState::Ready(session) = &mut self.state else {
            return;
        };
        self.status = match session.complete_submit(result) {
            Ok(prediction) => format!("Prediction: {prediction}"),
            Err(e) if e.is_retryable() => {
                format!("Prediction failed: {e} (press Enter to retry)")
            }
            Err(e) => format!("Prediction failed: {e}"),
        };
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action {
        if code == KeyCode::Esc
            || (code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL))
        {
            return Action::Quit;
        }

        let session = match &mut self.state {
            LoadState::Ready(session) => session,
            LoadState::Failed(_) if code == KeyCode::Char('r') => return Action::Reload,
            _ => return Action::None,
        };
        let count = self.buffers.len();

        match code {
            KeyCode::Enter => Action::Submit,
            KeyCode::Down | KeyCode::Tab if count > 0 => {
                self.focus = (self.focus + 1) % count;
                Action::None
            }
            KeyCode::Up | KeyCode::BackTab if count > 0 => {
                self.focus = (self.focus + count - 1) % count;
                Action::None
            }
            KeyCode::Char(c) if count > 0 => {
                self.buffers[self.focus].push(c);
                session
                    .form_mut()
                    .set_value_at(self.focus, self.buffers[self.focus].as_str());
                Action::None
            }
            KeyCode::Backspace if count > 0 => {
                self.buffers[self.focus].pop();
                session
                    .form_mut()
                    .set_value_at(self.focus, self.buffers[self.focus].as_str());
                Action::None
            }
            _ => Action::None,
        }
    }

    pub fn draw(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(f.size());

        let header = Paragraph::new(Line::from(Span::styled(
            TITLE,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(header, chunks[0]);

        let body = match &self.state {
            LoadState::Ready(session) => self.form_lines(session),
            LoadState::Loading => vec![Line::raw("Loading...")],
            LoadState::Failed(reason) => vec![Line::styled(
                reason.clone(),
                Style::default().fg(Color::Red),
            )],
        };
        let form = Paragraph::new(body)
            .block(Block::default().borders(Borders::ALL).title("Parameters"));
        f.render_widget(form, chunks[1]);

        let status = Paragraph::new(self.status.as_str())
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Result"));
        f.render_widget(status, chunks[2]);

        let help = Paragraph::new("↑/↓ move  Enter submit  r reload  Esc quit")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(help, chunks[3]);
    }

    fn form_lines(&self, session: &FormSession) -> Vec<Line<'static>> {
        session
            .form()
            .controls()
            .iter()
            .zip(&self.buffers)
            .enumerate()
            .map(|(i, (control, buffer))| {
                let marker = if i == self.focus { "> " } else { "  " };
                let mut spans = vec![
                    Span::raw(marker),
                    Span::styled(
                        format!("{:<32}", control.name()),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("[{}] ", control.field_type()),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(buffer.clone()),
                ];
                if control.shows_error() {
                    spans.push(Span::styled("  required", Style::default().fg(Color::Red)));
                }
                Line::from(spans)
            })
            .collect()
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen);
    }
}

fn spawn_load(handle: &Handle, api: Arc<dyn PredictionApi>, tx: Sender<Message>) {
    handle.spawn(async move {
        let _ = tx.send(Message::Loaded(api.fetch_params().await));
    });
}

fn spawn_predict(
    handle: &Handle,
    api: Arc<dyn PredictionApi>,
    input: PredictionInput,
    tx: Sender<Message>,
) {
    handle.spawn(async move {
        let _ = tx.send(Message::Predicted(api.predict(&input).await));
    });
}

fn drain(rx: &Receiver<Message>, screen: &mut FormScreen) {
    while let Ok(message) = rx.try_recv() {
        match message {
            Message::Loaded(result) => screen.on_loaded(result),
            Message::Predicted(result) => screen.on_predicted(result),
        }
    }
}

/// Runs the interactive form. Blocks the calling thread; requests run on `handle`.
pub fn run(api: Arc<dyn PredictionApi>, handle: Handle) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let (tx, rx) = mpsc::channel();
    let mut screen = FormScreen::new();
    spawn_load(&handle, api.clone(), tx.clone());

    loop {
        drain(&rx, &mut screen);
        terminal.draw(|f| screen.draw(f))?;

        if !event::poll(Duration::from_millis(120))? {
            continue;
        }
        let Event::Key(k) = event::read()? else {
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        match screen.handle_key(k.code, k.modifiers) {
            Action::Quit => break,
            Action::Submit => {
                if let Some(input) = screen.begin_submit() {
                    spawn_predict(&handle, api.clone(), input, tx.clone());
                }
            }
            Action::Reload => {
                screen.begin_reload();
                spawn_load(&handle, api.clone(), tx.clone());
            }
            Action::None => {}
        }
    }

    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn ready_screen() -> FormScreen {
        let mut screen = FormScreen::new();
        screen.on_loaded(Ok(ParamSchema::new([
            ("age".to_string(), FieldType::Int),
            ("city".to_string(), FieldType::Str),
        ])));
        screen
    }

    fn type_text(screen: &mut FormScreen, text: &str) {
        for c in text.chars() {
            screen.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    #[test]
    fn test_typing_fills_focused_control() {
        let mut screen = ready_screen();
        type_text(&mut screen, "30");
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE);
        type_text(&mut screen, "New Yorkx");
        screen.handle_key(KeyCode::Backspace, KeyModifiers::NONE);

        let form = screen.session().unwrap().form();
        assert_eq!(form.control("age").unwrap().value().unwrap().to_string(), "30");
        assert_eq!(
            form.control("city").unwrap().value().unwrap().to_string(),
            "New York"
        );
    }

    #[test]
    fn test_focus_wraps_around() {
        let mut screen = ready_screen();
        screen.handle_key(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(screen.focus(), 1);
        screen.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(screen.focus(), 0);
    }

    #[test]
    fn test_submit_with_empty_field_reports_required() {
        let mut screen = ready_screen();
        type_text(&mut screen, "30");
        assert_eq!(
            screen.handle_key(KeyCode::Enter, KeyModifiers::NONE),
            Action::Submit
        );
        assert!(screen.begin_submit().is_none());
        assert_eq!(screen.status(), "Required: city");
    }

    #[test]
    fn test_full_submit_cycle_shows_prediction() {
        let mut screen = ready_screen();
        type_text(&mut screen, "30");
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE);
        type_text(&mut screen, "New York");

        let input = screen.begin_submit().unwrap();
        assert_eq!(input["city"], "New_York");
        // second Enter while waiting is refused
        assert!(screen.begin_submit().is_none());

        screen.on_predicted(Ok(1.0));
        assert_eq!(screen.status(), "Prediction: 1");
    }

    #[test]
    fn test_malformed_response_offers_no_retry() {
        let mut screen = ready_screen();
        type_text(&mut screen, "30");
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE);
        type_text(&mut screen, "Queens");
        screen.begin_submit().unwrap();

        screen.on_predicted(Err(PredictionFormError::Response {
            message: "prediction array is empty".to_string(),
        }));
        assert!(screen.status().starts_with("Prediction failed"));
        assert!(!screen.status().contains("retry"));
    }

    #[test]
    fn test_network_failure_offers_retry() {
        let mut screen = ready_screen();
        type_text(&mut screen, "30");
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE);
        type_text(&mut screen, "Queens");
        screen.begin_submit().unwrap();

        screen.on_predicted(Err(PredictionFormError::Network {
            message: "connection refused".to_string(),
        }));
        assert!(screen.status().contains("press Enter to retry"));
    }

    #[test]
    fn test_failed_load_offers_reload() {
        let mut screen = FormScreen::new();
        screen.on_loaded(Err(PredictionFormError::Network {
            message: "connection refused".to_string(),
        }));
        assert!(screen.session().is_none());
        assert_eq!(
            screen.handle_key(KeyCode::Char('r'), KeyModifiers::NONE),
            Action::Reload
        );
        assert_eq!(
            screen.handle_key(KeyCode::Esc, KeyModifiers::NONE),
            Action::Quit
        );
    }
}
