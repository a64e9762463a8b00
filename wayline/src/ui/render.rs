//! Render orchestration for the presentation TUI

use std::time::Instant;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

use wayline_core::session::Snapshot;
use wayline_core::step::{media_kind, MediaKind, StepKind};
use wayline_core::{MediaStatus, NavMode};

use crate::app::App;

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let now = Instant::now();
    let snapshot = app.session.snapshot(now);

    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .split(frame.area());

    render_progress(frame, app, &snapshot, chunks[0]);
    render_main(frame, app, &snapshot, chunks[1]);
    render_status(frame, app, &snapshot, chunks[2]);
    render_hotkeys(frame, app, &snapshot, chunks[3]);
}

fn render_progress(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    let ratio = if snapshot.len <= 1 {
        1.0
    } else {
        snapshot.cursor as f64 / (snapshot.len - 1) as f64
    };
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.theme.border_style())
                .title(" wayline "),
        )
        .gauge_style(app.theme.accent_style())
        .label(format!("step {} / {}", snapshot.cursor + 1, snapshot.len))
        .ratio(ratio.clamp(0.0, 1.0));
    frame.render_widget(gauge, area);
}

fn render_main(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    match snapshot.mode {
        NavMode::AtStart => render_start(frame, app, snapshot, area),
        NavMode::AwaitingQuiz { advance_at } => {
            render_quiz(frame, app, snapshot, advance_at.is_some(), area)
        }
        NavMode::AwaitingChoice => render_choice(frame, app, snapshot, area),
        NavMode::AwaitingCrossroad { .. } => render_crossroad(frame, app, snapshot, area),
        NavMode::Idle => render_media(frame, app, snapshot, area),
        NavMode::ShowingSummary => render_summary(frame, app, area),
    }
}

fn render_start(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    let StepKind::Start(start) = snapshot.step.kind() else {
        return render_media(frame, app, snapshot, area);
    };
    let lines = vec![
        Line::from(Span::styled(start.title.clone(), app.theme.accent_style())),
        Line::raw(""),
        Line::from(Span::styled(start.subtitle.clone(), app.theme.text_style())),
        Line::raw(""),
        Line::from(Span::styled(
            format!("[Enter] {}", start.button_text),
            app.theme.accent_style(),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(bordered(app, " welcome ")),
        area,
    );
}

fn render_quiz(frame: &mut Frame, app: &App, snapshot: &Snapshot, answered: bool, area: Rect) {
    let Some(quiz) = snapshot.step.as_quiz() else {
        return;
    };
    let mut lines = vec![
        Line::from(Span::styled(quiz.question.clone(), app.theme.text_style())),
        Line::raw(""),
    ];
    for (i, option) in quiz.options.iter().enumerate() {
        lines.push(Line::from(Span::styled(
            format!("  [{}] {option}", i + 1),
            app.theme.text_style(),
        )));
    }
    if answered {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "Answer recorded, moving on...",
            app.theme.dim_style(),
        )));
    }
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(bordered(app, " quiz ")),
        area,
    );
}

fn render_choice(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    let Some(choice) = snapshot.step.as_choice() else {
        return;
    };
    let mut lines = vec![
        media_line(app, snapshot, &choice.background),
        Line::raw(""),
        Line::from(Span::styled("Pick one:", app.theme.text_style())),
    ];
    for (i, option) in choice.choices.iter().enumerate() {
        lines.push(Line::from(Span::styled(
            format!("  [{}] {} ({})", i + 1, option.id, option.image),
            app.theme.text_style(),
        )));
    }
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(bordered(app, " choice ")),
        area,
    );
}

fn render_crossroad(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    let mut lines = Vec::new();
    if let Some(path) = snapshot.step.media_path() {
        lines.push(media_line(app, snapshot, path));
        lines.push(Line::raw(""));
    }
    if let Some(crossroad) = snapshot.crossroad {
        lines.push(Line::from(Span::styled(
            crossroad.question.clone(),
            app.theme.text_style(),
        )));
        lines.push(Line::raw(""));
        let unlocked = snapshot.crossroad_unlocked.unwrap_or(false);
        let style = if unlocked {
            app.theme.accent_style()
        } else {
            Style::default().fg(app.theme.locked)
        };
        lines.push(Line::from(Span::styled(
            format!("  [n] {}    [p] {}", crossroad.next_text, crossroad.previous_text),
            style,
        )));
        if !unlocked {
            lines.push(Line::from(Span::styled(
                "  (unlocking...)",
                app.theme.dim_style(),
            )));
        }
    }
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(bordered(app, " crossroad ")),
        area,
    );
}

fn render_media(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    let lines = match snapshot.step.media_path() {
        Some(path) => vec![media_line(app, snapshot, path)],
        None => vec![Line::from(Span::styled("(empty step)", app.theme.dim_style()))],
    };
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(bordered(app, " media ")),
        area,
    );
}

fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let results = app.session.collected_results();
    let mut lines = vec![
        Line::from(Span::styled("Your picks", app.theme.accent_style())),
        Line::raw(""),
    ];
    if results.is_empty() {
        lines.push(Line::from(Span::styled(
            "No choices recorded.",
            app.theme.dim_style(),
        )));
    }
    for result in &results {
        lines.push(Line::from(Span::styled(
            format!("  {} -> {}", result.choice_id, result.image),
            app.theme.text_style(),
        )));
    }
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(bordered(app, " summary ")),
        area,
    );
}

/// One line describing a media identity and its cache state.
fn media_line<'a>(app: &App, snapshot: &Snapshot, path: &'a str) -> Line<'a> {
    let kind = match media_kind(path) {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
        MediaKind::Unknown => "file",
    };
    let (state, style) = match snapshot.media_status {
        Some(MediaStatus::Ready) => match &snapshot.media {
            Some(asset) if asset.placeholder => {
                ("unavailable (placeholder)", Style::default().fg(app.theme.failed))
            }
            _ => ("ready", Style::default().fg(app.theme.ready)),
        },
        Some(MediaStatus::InFlight) => ("loading...", Style::default().fg(app.theme.loading)),
        Some(MediaStatus::Failed) => ("retrying...", Style::default().fg(app.theme.loading)),
        Some(MediaStatus::NotRequested) | None => ("queued", Style::default().fg(app.theme.locked)),
    };
    Line::from(vec![
        Span::styled(format!("{path} "), app.theme.text_style()),
        Span::styled(format!("[{kind}] "), app.theme.dim_style()),
        Span::styled(state, style),
    ])
}

fn render_status(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    let sound = match (app.muted, snapshot.sound) {
        (true, _) => "sound: muted".to_string(),
        (false, Some(track)) => format!("sound: {track}"),
        (false, None) => "sound: -".to_string(),
    };
    let mut spans = vec![Span::styled(sound, app.theme.dim_style())];
    if let Some(message) = app.status() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(message.to_string(), app.theme.accent_style()));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(bordered(app, " status ")),
        area,
    );
}

fn render_hotkeys(frame: &mut Frame, app: &App, snapshot: &Snapshot, area: Rect) {
    let keys = match snapshot.mode {
        NavMode::AtStart => "Enter start | q quit",
        NavMode::Idle => "←/→ navigate | m mute | r restart | q quit",
        NavMode::AwaitingQuiz { .. } => "1-9 answer | q quit",
        NavMode::AwaitingChoice => "1-9 pick | q quit",
        NavMode::AwaitingCrossroad { .. } => "n continue | p go back | q quit",
        NavMode::ShowingSummary => "Enter finish | r restart | q quit",
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(keys, app.theme.dim_style()))),
        area,
    );
}

fn bordered(app: &App, title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(app.theme.border_style())
        .title(title)
}
