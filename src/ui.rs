pub mod map;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Frame,
};

use crate::app::App;
use crate::mode::Mode;
use crate::model::EntityKind;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_tabs(frame, app, chunks[0]);
    if app.tab == EntityKind::Itinerary {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(chunks[1]);
        render_list(frame, app, body[0]);
        map::render_map(frame, &app.map, body[1], app.pending_lookups());
    } else {
        render_list(frame, app, chunks[1]);
    }
    render_status_bar(frame, app, chunks[2]);
    render_command_line(frame, app, chunks[3]);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = EntityKind::ALL
        .iter()
        .map(|kind| {
            Line::from(format!(
                "F{} {} ({})",
                kind.index() + 1,
                kind.display_name(),
                app.collections.len(*kind)
            ))
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let kind = app.tab;
    let summaries = app.collections.summaries(kind);
    let row_num_width = summaries.len().to_string().len().max(2);

    let items: Vec<ListItem> = summaries
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:>width$} ", i + 1, width = row_num_width),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(s),
            ]))
        })
        .collect();
    let empty = items.is_empty();

    let mut block = Block::default().borders(Borders::ALL).title(kind.display_name());
    if kind == EntityKind::Itinerary {
        block = block.title_bottom(Line::from(app.collections.totals_display()).alignment(Alignment::Right));
    }

    if empty {
        let hint = Paragraph::new(Span::styled(empty_hint(kind), Style::default().fg(Color::DarkGray)))
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );
    let mut state = ListState::default().with_selected(Some(app.selected()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn empty_hint(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Itinerary => ":leg DATE | START | END | HOURS",
        EntityKind::Meals => ":meal DATE | DESCRIPTION",
        EntityKind::Pois => ":poi NAME | LOCATION [| NOTES]",
        EntityKind::Hotels => ":hotel CHECKIN | CHECKOUT | NAME | ADDRESS [| PHONE [| PRICE [| CONF]]]",
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_style = match app.mode {
        Mode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        Mode::Command => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let dirty_indicator = if app.dirty { "[not saved]" } else { "" };
    let undo_indicator = if app.history.can_undo() { "u:undo" } else { "" };
    let pending = match app.pending_lookups() {
        0 => String::new(),
        n => format!("locating {} ", n),
    };

    let len = app.collections.len(app.tab);
    let row = if len == 0 { 0 } else { app.selected() + 1 };
    let position = format!("{} {}/{} ", app.key_buffer_display(), row, len);

    let left = format!(" {} ", app.mode.display_name());
    let used = left.len() + pending.len() + undo_indicator.len() + dirty_indicator.len() + position.len() + 3;
    let status = Line::from(vec![
        Span::styled(left, mode_style.add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(pending, Style::default().fg(Color::Yellow)),
        Span::raw(undo_indicator),
        Span::raw(" "),
        Span::styled(dirty_indicator, Style::default().fg(Color::Red)),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::raw(position),
    ]);

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

fn render_command_line(frame: &mut Frame, app: &App, area: Rect) {
    let content = match app.mode {
        Mode::Command => format!(":{}", app.command_buffer()),
        Mode::Normal => app.message.clone().unwrap_or_default(),
    };

    let command_line = Paragraph::new(content);
    frame.render_widget(command_line, area);
}
