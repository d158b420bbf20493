use std::collections::HashMap;

use ratatui::{prelude::*, widgets::*};
use ratatui_image::{protocol::StatefulProtocol, StatefulImage};

use crate::app::{format_number, App, AppState, DetailFocus};
use crate::comments;
use crate::personal;
use crate::reader::ViewMode;

pub fn ui(f: &mut Frame, app: &mut App) {
    if app.state == AppState::Reading {
        render_reader(f, app, f.area());
        return;
    }

    let c = Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).split(f.area());
    let (main_area, bottom_area) = (c[0], c[1]);

    let theme = app.theme;
    let border = move |t: &str| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme))
            .title(Span::styled(format!(" {} ", t), Style::default().fg(theme)))
    };

    match &app.state {
        AppState::Home => {
            let who = match app.auth.user() {
                Some(user) => format!("Signed in as {}", user.username),
                None => "Not signed in".to_string(),
            };
            let t = vec![
                Line::from(vec![Span::styled(
                    "Welcome to rmanga",
                    Style::default().fg(app.theme).add_modifier(Modifier::BOLD),
                )]),
                Line::from(Span::styled(who, Style::default().fg(Color::DarkGray))),
                Line::from(""),
                Line::from("Controls"),
                Line::from("────────"),
                Line::from("  /      : Search by title"),
                Line::from("  b      : Browse catalog"),
                Line::from("  R      : Recommendations"),
                Line::from("  p      : Personal list"),
                Line::from("  Enter  : Open"),
                Line::from("  j / k  : Move"),
                Line::from("  q      : Quit"),
            ];
            f.render_widget(
                Paragraph::new(t).alignment(Alignment::Center).block(border("Home")),
                main_area,
            );
        }
        AppState::Searching => {
            f.render_widget(
                Paragraph::new(app.input.as_str())
                    .style(Style::default().fg(app.theme))
                    .block(border("Search Title")),
                bottom_area,
            );
            f.render_widget(
                Block::default()
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::DarkGray)),
                main_area,
            );
            return;
        }
        AppState::Loading => {
            f.render_widget(
                Paragraph::new("Fetching...")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(app.theme).add_modifier(Modifier::RAPID_BLINK)),
                main_area,
            );
        }
        AppState::ResultsList => {
            let items: Vec<ListItem> = app
                .mangas
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    let style = if i == app.selected_index {
                        Style::default().fg(Color::Black).bg(app.theme)
                    } else {
                        Style::default()
                    };
                    let kind = m.kind.as_deref().unwrap_or("");
                    let score = m.score.map(|s| format!("  ★ {s:.1}")).unwrap_or_default();
                    ListItem::new(format!(" {} {}{} ", m.title, kind, score)).style(style)
                })
                .collect();
            let heading = app.results_heading.clone();
            if items.is_empty() {
                f.render_widget(
                    Paragraph::new("No titles found")
                        .alignment(Alignment::Center)
                        .block(border(&heading)),
                    main_area,
                );
            } else {
                f.render_widget(List::new(items).block(border(&heading)), main_area);
            }
        }
        AppState::MangaDetail | AppState::Composing => render_detail(f, app, main_area, border),
        AppState::PersonalList => render_personal(f, app, main_area, border),
        AppState::Error(msg) => {
            f.render_widget(
                Paragraph::new(format!("Error: {}", msg))
                    .style(Style::default().fg(Color::Red))
                    .wrap(Wrap { trim: true })
                    .block(Block::default().borders(Borders::ALL)),
                main_area,
            );
        }
        AppState::Reading => {}
    }

    if app.state == AppState::Composing {
        let title = match app.reply_to {
            Some(id) => format!("Reply to #{id}"),
            None => "New Comment".to_string(),
        };
        f.render_widget(
            Paragraph::new(app.input.as_str())
                .style(Style::default().fg(Color::Cyan))
                .block(border(&title)),
            bottom_area,
        );
        return;
    }

    let help = match app.state {
        AppState::MangaDetail => {
            " [ Tab: Chapters/Comments ] [ Enter: Read ] [ n: Comment ] [ r: Reply ] [ l: Like ] [ x: Delete ] [ a: Add to list ] "
        }
        AppState::PersonalList => " [ Tab: Filter ] [ Enter: Open ] [ x: Remove ] [ Esc: Back ] ",
        _ => " [ /: Search ] [ b: Browse ] [ q: Quit ] [ Enter: Select ] ",
    };
    let text = match &app.notice {
        Some(notice) => format!(" {notice} "),
        None => help.to_string(),
    };
    f.render_widget(
        Paragraph::new(text).style(Style::default().bg(app.theme).fg(Color::Black)),
        bottom_area,
    );
}

fn render_detail<F>(f: &mut Frame, app: &mut App, area: Rect, border: F)
where
    F: Fn(&str) -> Block<'static>,
{
    let Some(manga) = app.manga.as_ref() else { return };
    let cols = Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).split(area);
    let left = Layout::vertical([Constraint::Length(9), Constraint::Min(0)]).split(cols[0]);

    let mut info = vec![
        Line::from(Span::styled(
            manga.title.clone(),
            Style::default().fg(app.theme).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Author: {}", manga.author.as_deref().unwrap_or("-"))),
        Line::from(format!(
            "{}  {}",
            manga.kind.as_deref().unwrap_or(""),
            manga.publication_status.as_deref().unwrap_or("")
        )),
    ];
    if !manga.genres.is_empty() {
        info.push(Line::from(manga.genres.join(", ")));
    }
    if let Some(score) = manga.score {
        info.push(Line::from(format!("Score: {score:.1}")));
    }
    let last_read = app
        .personal
        .iter()
        .find(|e| e.id == manga.id)
        .and_then(|e| e.last_read_chapter);
    if let Some(progress) = personal::reading_progress(&manga.chapters, last_read, manga.total_chapters) {
        info.push(Line::from(format!(
            "Read {} / {} ({}%)",
            progress.read,
            manga.total_chapters.unwrap_or(0),
            progress.percent
        )));
    }
    if let Some(desc) = manga.description.as_deref() {
        info.push(Line::from(Span::styled(desc.to_string(), Style::default().fg(Color::DarkGray))));
    }
    f.render_widget(
        Paragraph::new(info).wrap(Wrap { trim: true }).block(border("Manga")),
        left[0],
    );

    let focus_color = |focused: bool| if focused { Color::Cyan } else { app.theme };
    let chap_color = focus_color(app.detail_focus == DetailFocus::Chapters);
    let chap_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(chap_color))
        .title(Span::styled(
            format!(" Chapters ({}) ", manga.chapters.len()),
            Style::default().fg(chap_color),
        ));
    let chap_items: Vec<ListItem> = manga
        .chapters
        .iter()
        .map(|c| {
            let title = c.title.as_deref().map(|t| format!(" - {t}")).unwrap_or_default();
            ListItem::new(format!("Chapter {}{}", format_number(c.number), title))
        })
        .collect();
    let list = List::new(chap_items)
        .block(chap_block)
        .highlight_style(Style::default().bg(app.theme).fg(Color::Black));
    f.render_stateful_widget(list, left[1], &mut app.chapter_list_state);

    let com_color = focus_color(app.detail_focus == DetailFocus::Comments);
    let total = app.thread.as_ref().map_or(0, |t| t.total());
    let com_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(com_color))
        .title(Span::styled(format!(" Comments ({total}) "), Style::default().fg(com_color)));

    let signed_in = app.auth.is_signed_in();
    let rows = app.thread.as_ref().map(|t| t.rows()).unwrap_or_default();
    if rows.is_empty() {
        f.render_widget(
            Paragraph::new("No comments yet")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(com_block),
            cols[1],
        );
        return;
    }
    let width = cols[1].width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = rows
        .iter()
        .map(|(depth, node)| {
            let indent = "  ".repeat(*depth);
            let c = &node.comment;
            let mut header = vec![
                Span::raw(indent.clone()),
                Span::styled(c.author_name.clone(), Style::default().fg(app.theme).add_modifier(Modifier::BOLD)),
                Span::styled(format!("  {}", c.created_label()), Style::default().fg(Color::DarkGray)),
                Span::raw(format!("  👍 {}", c.like_count)),
            ];
            if app.auth.owns(c) {
                header.push(Span::styled("  [yours]", Style::default().fg(Color::Red)));
            }
            if signed_in && !comments::can_reply(*depth, signed_in) {
                header.push(Span::styled("  reply limit", Style::default().fg(Color::DarkGray)));
            }
            let mut lines = vec![Line::from(header)];
            for w in textwrap::wrap(&c.body, width.saturating_sub(indent.len()).max(10)) {
                lines.push(Line::from(format!("{indent}{w}")));
            }
            ListItem::new(lines)
        })
        .collect();
    let list = List::new(items)
        .block(com_block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, cols[1], &mut app.comment_list_state);
}

fn render_personal<F>(f: &mut Frame, app: &mut App, area: Rect, border: F)
where
    F: Fn(&str) -> Block<'static>,
{
    let c = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(area);
    let counts = personal::status_counts(&app.personal);
    let tabs: Vec<Span> = personal::FILTERS
        .iter()
        .enumerate()
        .map(|(i, filter)| {
            let label = match filter {
                Some(status) => format!(" {} ({}) ", status.label(), counts.get(status).unwrap_or(&0)),
                None => format!(" All ({}) ", app.personal.len()),
            };
            let style = if i == app.personal_filter {
                Style::default().fg(Color::Black).bg(app.theme)
            } else {
                Style::default()
            };
            Span::styled(label, style)
        })
        .collect();
    f.render_widget(Paragraph::new(Line::from(tabs)), c[0]);

    let items: Vec<ListItem> = app
        .visible_personal()
        .iter()
        .map(|e| {
            let status = e.status.map(|s| s.label()).unwrap_or("-");
            let score = e.score.map(|s| format!("{s:.1}")).unwrap_or_else(|| "-".into());
            let mut lines = vec![Line::from(format!(" {}  [{}]  score {}", e.title, status, score))];
            if let Some(note) = e.note.as_deref().filter(|n| !n.trim().is_empty()) {
                lines.push(Line::from(Span::styled(format!("   “{note}”"), Style::default().fg(Color::DarkGray))));
            }
            ListItem::new(lines)
        })
        .collect();
    let list = List::new(items)
        .block(border("Personal List"))
        .highlight_style(Style::default().bg(app.theme).fg(Color::Black));
    f.render_stateful_widget(list, c[1], &mut app.personal_list_state);
}

fn render_reader(f: &mut Frame, app: &mut App, area: Rect) {
    let theme = app.theme;
    let api_url = app.config.api_url.clone();
    let Some(reader) = app.reader.as_mut() else { return };

    let inner = if reader.controller.is_fullscreen() {
        area
    } else {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        f.render_widget(block, area);
        inner
    };
    reader.set_page_rows(inner.height);
    let ctl = &reader.controller;

    if ctl.page_count() == 0 {
        f.render_widget(
            Paragraph::new("No pages available")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray)),
            Rect::new(inner.x, inner.y + inner.height / 2, inner.width, 1),
        );
    } else {
        match ctl.view_mode() {
            ViewMode::Paginated => {
                if let Some(page) = ctl.current_page() {
                    let url = page.image_url(&api_url);
                    render_page(f, &mut app.image_protocols, &url, inner);
                }
            }
            ViewMode::Continuous => {
                let page_rows = i32::from(reader.page_rows());
                let scroll = reader.scroll_offset as i32;
                for (i, page) in ctl.pages().iter().enumerate() {
                    let top = i as i32 * page_rows - scroll;
                    if top + page_rows <= 0 {
                        continue;
                    }
                    if top >= inner.height as i32 {
                        break;
                    }
                    let y = top.max(0) as u16;
                    let height = (top + page_rows).min(inner.height as i32) as u16 - y;
                    let url = page.image_url(&api_url);
                    render_page(f, &mut app.image_protocols, &url, Rect::new(inner.x, inner.y + y, inner.width, height));
                }
            }
        }
    }

    if !ctl.controls_visible() || ctl.is_distraction_free() {
        return;
    }

    let bar = Style::default().bg(Color::Black).fg(theme);
    let mode = ctl.view_mode();
    let top = format!(
        " ✕ Esc  {}  [v] {}  [f] {}  [z] hide UI ",
        reader.title,
        mode.toggled().label(),
        if ctl.is_fullscreen() { "Exit fullscreen" } else { "Fullscreen" }
    );
    f.render_widget(Paragraph::new(top).style(bar), Rect::new(area.x, area.y, area.width, 1));

    if mode == ViewMode::Paginated && ctl.page_count() > 0 {
        let indicator = format!(" {} / {} ", ctl.current_page_index() + 1, ctl.page_count());
        let w = indicator.chars().count() as u16;
        let bottom = area.y + area.height.saturating_sub(1);
        f.render_widget(
            Paragraph::new(indicator).style(bar),
            Rect::new(area.x + area.width.saturating_sub(w) / 2, bottom, w.min(area.width), 1),
        );
        let mid = area.y + area.height / 2;
        if ctl.has_previous() {
            f.render_widget(Paragraph::new("◀").style(bar), Rect::new(area.x + 1, mid, 1, 1));
        }
        if ctl.has_next() && area.width > 2 {
            f.render_widget(Paragraph::new("▶").style(bar), Rect::new(area.x + area.width - 2, mid, 1, 1));
        }
    }
}

fn render_page(
    f: &mut Frame,
    protocols: &mut HashMap<String, StatefulProtocol>,
    url: &str,
    area: Rect,
) {
    if let Some(protocol) = protocols.get_mut(url) {
        f.render_stateful_widget(StatefulImage::default(), area, protocol);
    } else {
        f.render_widget(
            Paragraph::new("[Loading Page...]")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray)),
            area,
        );
    }
}
