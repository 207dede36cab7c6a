use std::collections::VecDeque;

use cemetery_core::{
    generate_plot_grid, is_plot_element, painted_status, render_directions, resolve_status,
    AssetSource, ExhumationDraft, MapController, PaintReport, PlotGrid, ResolvedStatus,
    ValidationErrors, View,
};
use plot_proto::{ExhumationRequest, PlotStatus};
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

/// What `r` retries after a failed store read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retry {
    Tomb(String),
    Refresh,
}

pub struct UiState {
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    pub cursor: usize,
    /// Command line being typed after `:`.
    pub input: Option<String>,
    pub draft: ExhumationDraft,
    pub form_errors: Option<ValidationErrors>,
    pub requests: Vec<ExhumationRequest>,
    pub retry: Option<Retry>,
    pub last_report: Option<PaintReport>,
    pub map_source: AssetSource,
    pub repaint_passes: u64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            logs: VecDeque::new(),
            max_logs: 8,
            cursor: 0,
            input: None,
            draft: ExhumationDraft::default(),
            form_errors: None,
            requests: Vec::new(),
            retry: None,
            last_report: None,
            map_source: AssetSource::Empty,
            repaint_passes: 0,
        }
    }
}

impl UiState {
    pub fn with_map_source(map_source: AssetSource) -> Self {
        Self {
            map_source,
            ..Self::default()
        }
    }

    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        self.cursor = self.cursor.saturating_add_signed(delta);
    }
}

fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    let channel = |at: usize| {
        digits
            .get(at..at + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .unwrap_or(0)
    };
    Color::Rgb(channel(0), channel(2), channel(4))
}

fn status_style(resolved: ResolvedStatus) -> Style {
    Style::default().fg(hex_color(resolved.fill))
}

fn status_span(resolved: ResolvedStatus) -> Span<'static> {
    Span::styled(
        format!("{:<9}", resolved.status.as_str()),
        status_style(resolved),
    )
}

fn inner(area: Rect) -> Rect {
    area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn render_panel(frame: &mut Frame, area: Rect, title: &str, lines: Vec<Line>) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}

fn cursor_line(selected: bool, mut spans: Vec<Span<'static>>) -> Line<'static> {
    let marker = if selected {
        Span::styled(
            "> ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw("  ")
    };
    spans.insert(0, marker);
    Line::from(spans)
}

pub fn draw_ui(frame: &mut Frame, state: &UiState, controller: &MapController) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(3),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], state, controller);
    draw_commands(frame, chunks[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[2]);
    draw_navigation(frame, body[0], state, controller);
    draw_detail(frame, body[1], state, controller);

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);
    draw_logs(frame, lower[0], state);
    draw_overlay(frame, lower[1], state, controller);
    draw_input(frame, chunks[4], state);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &UiState, controller: &MapController) {
    let breadcrumb = match (controller.view(), controller.section(), controller.level()) {
        (View::Overview, _, _) => "Overview".to_string(),
        (View::Section, Some(section), _) => format!("Overview / {}", section.section),
        (_, Some(section), Some(level)) => match controller.tomb() {
            Some(tomb) => format!(
                "Overview / {} / Level {} / {}",
                section.section,
                level,
                tomb.plot.plot_id.to_ascii_uppercase()
            ),
            None => format!("Overview / {} / Level {}", section.section, level),
        },
        _ => "Overview".to_string(),
    };
    let source = match &state.map_source {
        AssetSource::Primary(path) => format!("map {}", path.display()),
        AssetSource::Fallback(path) => format!("fallback map {}", path.display()),
        AssetSource::Empty => "no map loaded".to_string(),
    };
    let source_style = match state.map_source {
        AssetSource::Primary(_) => Style::default().fg(Color::Green),
        AssetSource::Fallback(_) => Style::default().fg(Color::Yellow),
        AssetSource::Empty => Style::default().fg(Color::Red),
    };
    let line = Line::from(vec![
        Span::styled(breadcrumb, Style::default().fg(Color::Cyan)),
        Span::raw(" | "),
        Span::styled(source, source_style),
        Span::raw(format!(" | repaints {}", state.repaint_passes)),
        Span::raw(" | q to exit"),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Cemetery Map Inspector");
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(line).wrap(Wrap { trim: true }), inner(area));
}

fn draw_commands(frame: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let lines = vec![
        Line::from(vec![
            key("up/down"),
            Span::raw(" move  "),
            key("enter"),
            Span::raw(" select  "),
            key("esc"),
            Span::raw(" back"),
        ]),
        Line::from(vec![
            key("d"),
            Span::raw(" directions  "),
            key("x"),
            Span::raw(" exhumation form  "),
            key("r"),
            Span::raw(" retry / refresh"),
        ]),
        Line::from(vec![
            key(":"),
            Span::raw(" goto <id> | level <n> | open <tomb> | set <plot> <field> <value> | clear <plot>"),
        ]),
        Line::from(vec![
            key(":"),
            Span::raw(" form <field> <value> | submit | requests | approve|reject|complete <id>"),
        ]),
    ];
    render_panel(frame, area, "Commands", lines);
}

fn draw_navigation(frame: &mut Frame, area: Rect, state: &UiState, controller: &MapController) {
    match controller.view() {
        View::Overview => {
            let lines: Vec<Line> = match controller.document().lock() {
                Ok(doc) => doc
                    .ids()
                    .enumerate()
                    .map(|(index, id)| {
                        let selected = index == state.cursor;
                        let status = painted_status(&doc, id);
                        let spans = match status {
                            Some(status) if is_plot_element(id) => vec![
                                status_span(ResolvedStatus::from(status)),
                                Span::raw(id.to_string()),
                            ],
                            _ => vec![Span::styled(
                                id.to_string(),
                                Style::default().fg(Color::DarkGray),
                            )],
                        };
                        cursor_line(selected, spans)
                    })
                    .collect(),
                Err(_) => vec![Line::from("map document unavailable")],
            };
            render_panel(frame, area, "Map elements", lines);
        }
        View::Section => {
            let lines: Vec<Line> = controller
                .layout()
                .map(|layout| {
                    (1..=layout.levels)
                        .map(|level| {
                            let selected = usize::from(level - 1) == state.cursor;
                            cursor_line(
                                selected,
                                vec![Span::raw(format!(
                                    "Level {} ({} tombs)",
                                    level,
                                    layout.tombs_on_level(level).count()
                                ))],
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            render_panel(frame, area, "Levels", lines);
        }
        View::Level | View::Tomb => {
            let open = controller.tomb().map(|tomb| tomb.descriptor.id.clone());
            let lines: Vec<Line> = controller
                .level_tombs()
                .into_iter()
                .enumerate()
                .map(|(index, (tomb, resolved))| {
                    let selected = controller.view() == View::Level && index == state.cursor;
                    let marker = if open.as_deref() == Some(tomb.id.as_str()) { " *" } else { "" };
                    cursor_line(
                        selected,
                        vec![
                            Span::raw(format!("Tomb {}  ", tomb.letter())),
                            status_span(resolved),
                            Span::raw(format!("{}{}", tomb.id, marker)),
                        ],
                    )
                })
                .collect();
            render_panel(frame, area, "Tombs", lines);
        }
    }
}

fn grid_lines(grid: &PlotGrid) -> Vec<Line<'static>> {
    (0..grid.rows)
        .map(|row| {
            let spans: Vec<Span> = (0..grid.columns)
                .map(|column| match grid.cell_at(column, row) {
                    Some(cell) => Span::raw(format!("{:>4}", cell.label)),
                    None => Span::raw("    "),
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn draw_detail(frame: &mut Frame, area: Rect, state: &UiState, controller: &MapController) {
    if let Some(tomb) = controller.tomb() {
        let plot = &tomb.plot;
        let field = |label: &str, value: Option<String>| {
            Line::from(vec![
                Span::styled(format!("{:<14}", label), Style::default().fg(Color::Yellow)),
                Span::raw(value.unwrap_or_else(|| "-".to_string())),
            ])
        };
        let mut lines = vec![
            Line::from(vec![
                Span::raw(format!("{}  ", plot.plot_id.to_ascii_uppercase())),
                status_span(tomb.resolved),
            ]),
            field(
                "Occupant",
                Some(plot.occupant_name.clone()).filter(|name| !name.is_empty()),
            ),
            field("Interment", plot.date_of_interment.clone()),
            field("Age", plot.age.map(|age| age.to_string())),
            field("Religion", plot.religion.clone()),
            field("Next of kin", plot.next_of_kin.clone()),
            field("Contact", plot.contact_number.clone()),
            field("Notes", plot.notes.clone()),
        ];
        if tomb.placeholder {
            lines.push(Line::from(Span::styled(
                "No record on file",
                Style::default().fg(Color::DarkGray),
            )));
        }
        render_panel(frame, area, "Tomb", lines);
        return;
    }

    if let Some(section) = controller.section() {
        let grid = generate_plot_grid(&section.section);
        let mut lines = vec![Line::from(format!(
            "{:?} grid, {} x {}, {} plots",
            grid.kind,
            grid.columns,
            grid.rows,
            grid.cells.len()
        ))];
        lines.extend(grid_lines(&grid));
        render_panel(frame, area, "Section overview", lines);
        return;
    }

    let mut lines = Vec::new();
    if let Some(report) = &state.last_report {
        lines.push(Line::from(format!(
            "{} plot elements painted, {} with records",
            report.painted, report.with_record
        )));
        for status in PlotStatus::ALL {
            let resolved = ResolvedStatus::from(status);
            lines.push(Line::from(vec![
                status_span(resolved),
                Span::raw(format!("{:>5}", report.count(status))),
            ]));
        }
    }
    if let Ok(plots) = controller.plots().read() {
        let today = controller.today();
        let occupied = plots
            .iter()
            .filter(|plot| resolve_status(Some(*plot), today).status == PlotStatus::Occupied)
            .count();
        lines.push(Line::from(format!(
            "{} plot records, {} occupied",
            plots.len(),
            occupied
        )));
    }
    if let Some(retry) = &state.retry {
        lines.push(Line::from(Span::styled(
            format!("Load failed ({:?}); press r to retry", retry),
            Style::default().fg(Color::Red),
        )));
    }
    render_panel(frame, area, "Summary", lines);
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    render_panel(frame, area, "Logs", lines);
}

fn draw_overlay(frame: &mut Frame, area: Rect, state: &UiState, controller: &MapController) {
    let overlays = controller.overlays();
    if overlays.exhumation_form {
        let draft = &state.draft;
        let row = |name: &'static str, label: &str, value: &str| {
            let failed = state
                .form_errors
                .as_ref()
                .and_then(|errors| errors.errors.iter().find(|error| error.field == name));
            let mut spans = vec![
                Span::styled(format!("{:<13}", label), Style::default().fg(Color::Yellow)),
                Span::raw(value.to_string()),
            ];
            if let Some(error) = failed {
                spans.push(Span::styled(
                    format!("  {}", error.message),
                    Style::default().fg(Color::Red),
                ));
            }
            Line::from(spans)
        };
        let lines = vec![
            row("plot_id", "plot", &draft.plot_id),
            row("requester_name", "name", &draft.requester_name),
            row("requester_email", "email", &draft.requester_email),
            row("requester_phone", "phone", draft.requester_phone.as_deref().unwrap_or("")),
            row("relationship", "relationship", draft.relationship.as_deref().unwrap_or("")),
            row("reason", "reason", &draft.reason),
            row("destination_plot", "destination", draft.destination_plot.as_deref().unwrap_or("")),
            row("documents", "documents", &draft.documents.join(", ")),
        ];
        render_panel(frame, area, "Exhumation request", lines);
        return;
    }

    if let Some(steps) = &overlays.directions {
        let lines: Vec<Line> = render_directions(steps)
            .lines()
            .map(|line| Line::from(line.to_string()))
            .collect();
        render_panel(frame, area, "Directions", lines);
        return;
    }

    let lines: Vec<Line> = state
        .requests
        .iter()
        .map(|request| {
            let origin = match request.origin {
                plot_proto::RequestOrigin::Remote => "remote",
                plot_proto::RequestOrigin::LocalFallback => "local",
            };
            Line::from(vec![
                Span::styled(format!("{:<10}", request.status.as_str()), Style::default().fg(Color::Cyan)),
                Span::raw(format!("{} {} ({}) ", request.plot_id, request.requester_name, origin)),
                Span::styled(request.id.clone(), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();
    render_panel(frame, area, "Exhumation requests", lines);
}

fn draw_input(frame: &mut Frame, area: Rect, state: &UiState) {
    let line = match &state.input {
        Some(buffer) => Line::from(vec![
            Span::styled(":", Style::default().fg(Color::Yellow)),
            Span::raw(buffer.clone()),
        ]),
        None => Line::from(Span::styled(
            "press : to enter a command",
            Style::default().fg(Color::DarkGray),
        )),
    };
    render_panel(frame, area, "Command", vec![line]);
}
