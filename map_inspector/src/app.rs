use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use cemetery_core::{
    is_decorative, ClickOutcome, ExhumationDraft, MapController, PendingRefresh, PendingTomb,
    PlotSubscription, RepaintLoop, View,
};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode};
use plot_proto::{ExhumationRequest, ExhumationStatus, Plot, PlotPatch};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::command::{parse_command_line, InspectorCommand};
use crate::ui::{draw_ui, Retry, UiState};

/// Work handed to the async worker.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    FetchTomb(PendingTomb),
    Refresh(PendingRefresh),
    Edit { plot_id: String, patch: PlotPatch },
    Clear { plot_id: String },
    Submit(ExhumationDraft),
    ListRequests,
    Review { id: String, status: ExhumationStatus },
}

#[derive(Debug)]
pub enum WorkerReply {
    Tomb {
        pending: PendingTomb,
        result: std::result::Result<Option<Plot>, String>,
    },
    Refreshed {
        pending: PendingRefresh,
        result: std::result::Result<Vec<Plot>, String>,
    },
    Submitted(ExhumationRequest),
    Requests(Vec<ExhumationRequest>),
    Failed(String),
}

pub struct InspectorApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    controller: MapController,
    subscription: PlotSubscription,
    repaint: RepaintLoop,
    command_sender: UnboundedSender<ClientCommand>,
    reply_receiver: Receiver<WorkerReply>,
    shutdown_sender: Sender<()>,
    log_receiver: Receiver<String>,
}

impl InspectorApp {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        controller: MapController,
        subscription: PlotSubscription,
        repaint: RepaintLoop,
        ui_state: UiState,
        command_sender: UnboundedSender<ClientCommand>,
        reply_receiver: Receiver<WorkerReply>,
        shutdown_sender: Sender<()>,
        log_receiver: Receiver<String>,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state,
            controller,
            subscription,
            repaint,
            command_sender,
            reply_receiver,
            shutdown_sender,
            log_receiver,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now();
        self.refresh();

        loop {
            while let Ok(reply) = self.reply_receiver.try_recv() {
                self.handle_reply(reply);
            }

            for change in self.subscription.drain() {
                self.controller.apply_change(change);
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                self.ui_state.repaint_passes = self.repaint.passes();
                self.terminal
                    .draw(|frame| draw_ui(frame, &self.ui_state, &self.controller))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if self.ui_state.input.is_some() {
                        self.handle_input_key(key.code);
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') => break,
                        KeyCode::Esc | KeyCode::Backspace => {
                            self.controller.back();
                            self.ui_state.cursor = 0;
                        }
                        KeyCode::Up | KeyCode::Char('k') => self.ui_state.move_cursor(-1),
                        KeyCode::Down | KeyCode::Char('j') => self.ui_state.move_cursor(1),
                        KeyCode::Enter => self.activate_selection(),
                        KeyCode::Char(':') => self.ui_state.input = Some(String::new()),
                        KeyCode::Char('d') => {
                            if self.controller.overlays().directions.is_some() {
                                self.controller.hide_directions();
                            } else if self.controller.show_directions(None).is_none() {
                                self.ui_state.push_log("Select a section or tomb first");
                            }
                        }
                        KeyCode::Char('x') => {
                            let open = self.controller.toggle_exhumation_form();
                            if open && self.ui_state.draft.plot_id.is_empty() {
                                if let Some(tomb) = self.controller.tomb() {
                                    self.ui_state.draft.plot_id = tomb.plot.plot_id.clone();
                                }
                            }
                        }
                        KeyCode::Char('r') => self.retry(),
                        _ => {}
                    }
                }
            }
        }

        self.repaint.stop();
        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    fn send(&self, command: ClientCommand) {
        if let Err(err) = self.command_sender.send(command) {
            error!("Failed to reach worker: {}", err);
        }
    }

    fn refresh(&mut self) {
        let pending = self.controller.begin_refresh();
        self.send(ClientCommand::Refresh(pending));
    }

    fn click(&mut self, element_id: &str) {
        match self.controller.click_element(element_id) {
            ClickOutcome::Ignored => {
                debug!(element_id, "Ignored click on non-plot element");
            }
            ClickOutcome::SectionOpened { section, levels } => {
                self.ui_state.cursor = 0;
                info!("Opened section {} ({} levels)", section, levels);
            }
        }
    }

    fn choose_level(&mut self, level: u8) {
        match self.controller.choose_level(level) {
            Ok(()) => self.ui_state.cursor = 0,
            Err(err) => warn!("{}", err),
        }
    }

    fn open_tomb(&mut self, tomb_id: &str) {
        match self.controller.begin_tomb_selection(tomb_id) {
            Ok(pending) => {
                self.ui_state.retry = None;
                self.send(ClientCommand::FetchTomb(pending));
            }
            Err(err) => warn!("{}", err),
        }
    }

    fn activate_selection(&mut self) {
        let cursor = self.ui_state.cursor;
        match self.controller.view() {
            View::Overview => {
                let id = self
                    .controller
                    .document()
                    .lock()
                    .ok()
                    .and_then(|doc| doc.ids().nth(cursor).map(str::to_string));
                if let Some(id) = id {
                    self.click(&id);
                }
            }
            View::Section => {
                let level = u8::try_from(cursor + 1).unwrap_or(u8::MAX);
                self.choose_level(level);
            }
            View::Level => {
                let id = self
                    .controller
                    .level_tombs()
                    .get(cursor)
                    .map(|(tomb, _)| tomb.id.clone());
                if let Some(id) = id {
                    self.open_tomb(&id);
                }
            }
            View::Tomb => {}
        }
    }

    fn retry(&mut self) {
        match self.ui_state.retry.take() {
            Some(Retry::Tomb(id)) => self.open_tomb(&id),
            Some(Retry::Refresh) => self.refresh(),
            None => self.refresh(),
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        let Some(buffer) = self.ui_state.input.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.ui_state.input = None,
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(ch) => buffer.push(ch),
            KeyCode::Enter => {
                let line = self.ui_state.input.take().unwrap_or_default();
                match parse_command_line(&line) {
                    Ok(command) => self.execute(command),
                    Err(err) => self.ui_state.push_log(format!("{}: {}", line.trim(), err)),
                }
            }
            _ => {}
        }
    }

    fn execute(&mut self, command: InspectorCommand) {
        match command {
            InspectorCommand::Goto(id) => {
                if is_decorative(&id) {
                    self.ui_state.push_log(format!("{} is decorative", id));
                }
                self.click(&id);
            }
            InspectorCommand::Level(level) => self.choose_level(level),
            InspectorCommand::Open(id) => self.open_tomb(&id),
            InspectorCommand::Back => {
                self.controller.back();
            }
            InspectorCommand::Set { plot_id, patch } => {
                self.send(ClientCommand::Edit { plot_id, patch })
            }
            InspectorCommand::Clear(plot_id) => self.send(ClientCommand::Clear { plot_id }),
            InspectorCommand::Refresh => self.refresh(),
            InspectorCommand::Directions(target) => {
                self.controller.show_directions(target.as_deref());
            }
            InspectorCommand::Form { field, value } => {
                field.apply(&mut self.ui_state.draft, &value);
                self.ui_state.form_errors = self.ui_state.draft.validate().err();
            }
            InspectorCommand::Submit => match self.ui_state.draft.validate() {
                Ok(()) => {
                    self.ui_state.form_errors = None;
                    self.send(ClientCommand::Submit(self.ui_state.draft.clone()));
                }
                Err(errors) => {
                    self.ui_state.push_log(errors.to_string());
                    self.ui_state.form_errors = Some(errors);
                }
            },
            InspectorCommand::Requests => self.send(ClientCommand::ListRequests),
            InspectorCommand::Review { id, status } => {
                self.send(ClientCommand::Review { id, status })
            }
        }
    }

    fn handle_reply(&mut self, reply: WorkerReply) {
        match reply {
            WorkerReply::Tomb { pending, result } => match result {
                Ok(plot) => {
                    self.controller.finish_tomb_selection(pending, plot);
                }
                Err(err) => {
                    warn!("Failed to load plot {}: {}", pending.plot_id, err);
                    self.ui_state.retry = Some(Retry::Tomb(pending.plot_id));
                }
            },
            WorkerReply::Refreshed { pending, result } => match result {
                Ok(plots) => {
                    if let Some(report) = self.controller.finish_refresh(pending, plots) {
                        self.ui_state.last_report = Some(report);
                    }
                }
                Err(err) => {
                    warn!("Failed to load plots: {}", err);
                    self.ui_state.retry = Some(Retry::Refresh);
                }
            },
            WorkerReply::Submitted(request) => {
                self.ui_state
                    .push_log(format!("Request {} saved for {}", request.id, request.plot_id));
                self.ui_state.draft = ExhumationDraft::default();
                self.ui_state.form_errors = None;
                if self.controller.overlays().exhumation_form {
                    self.controller.toggle_exhumation_form();
                }
                self.ui_state.requests.insert(0, request);
            }
            WorkerReply::Requests(requests) => self.ui_state.requests = requests,
            WorkerReply::Failed(message) => self.ui_state.push_log(message),
        }
    }
}
