//! TUI rendering for cigfinder.
//!
//! One screen: filter panel on the left, the map in the middle, and the place
//! list with the selected place's details on the right. Dialogs and the hover
//! tooltip are drawn last, on top of everything else.

use crate::app::{App, FilterRow, Focus, PlacesState};
use crate::dialogs::{CheckInStep, Dialog};
use crate::distance::distance_km;
use crate::hover::HoverState;
use crate::models::{catalog_name, Place, ACCESSORY_CATALOG, BRAND_CATALOG};
use crate::toast::ToastLevel;
use crate::viewport::Viewport;
use ratatui::{
    prelude::*,
    widgets::{canvas::*, *},
};

use ratatui::text::Line;

const MAX_REVIEWS_SHOWN: usize = 3;

/// Screen regions, shared with the mouse handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppLayout {
    pub filters: Rect,
    pub map: Rect,
    pub places: Rect,
    pub detail: Rect,
    pub status: Rect,
}

pub fn layout(area: Rect) -> AppLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(30),
            Constraint::Percentage(60),
            Constraint::Min(0),
        ])
        .split(rows[0]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(columns[2]);

    AppLayout {
        filters: columns[0],
        map: columns[1],
        places: side[0],
        detail: side[1],
        status: rows[1],
    }
}

/// Renders one frame of the TUI based on current application state.
pub fn render(f: &mut Frame, app: &App) {
    let areas = layout(f.size());

    render_filters(f, app, areas.filters);
    render_map(f, app, areas.map);
    render_places(f, app, areas.places);
    render_detail(f, app, areas.detail);
    render_status(f, app, areas.status);

    if let Some(dialog) = &app.dialog {
        render_dialog(f, app, dialog);
    }
}

fn panel(title: &str, focused: bool) -> Block<'_> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn highlight() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .bg(Color::Rgb(30, 30, 60))
        .add_modifier(Modifier::BOLD)
}

fn render_filters(f: &mut Frame, app: &App, area: Rect) {
    let selection = app.filters.selection();
    let focused = app.focus == Focus::Filters;

    let mut lines = Vec::with_capacity(FilterRow::count() + 2);
    for (i, row) in FilterRow::all().enumerate() {
        if row == FilterRow::Brand(0) {
            lines.push(Line::styled(" Brands", dim()));
        }
        if row == FilterRow::Accessory(0) {
            lines.push(Line::styled(" Accessories", dim()));
        }

        let (checked, label) = match row {
            FilterRow::OpenNow => (selection.open_now(), "Open now".to_string()),
            FilterRow::NearMe => {
                let label = if app.filters.is_locating() {
                    "Near me (locating...)".to_string()
                } else {
                    "Near me (5 km)".to_string()
                };
                (selection.near_me(), label)
            }
            FilterRow::Brand(b) => {
                let entry = BRAND_CATALOG[b];
                (selection.brands().contains(entry.id), entry.name.to_string())
            }
            FilterRow::Accessory(a) => {
                let entry = ACCESSORY_CATALOG[a];
                (selection.accessories().contains(entry.id), entry.name.to_string())
            }
        };

        let style = if focused && i == app.filter_cursor {
            highlight()
        } else if checked {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        let mark = if checked { "[x]" } else { "[ ]" };
        lines.push(Line::from(Span::styled(format!(" {} {}", mark, label), style)));
    }

    let title = if selection.is_active() { "Filters *" } else { "Filters" };
    f.render_widget(Paragraph::new(lines).block(panel(title, focused)), area);
}

fn render_map(f: &mut Frame, app: &App, area: Rect) {
    let block = panel("Map", false);
    let inner = block.inner(area);
    let view = Viewport::fit(
        inner,
        app.visible
            .iter()
            .map(Place::coordinates)
            .chain(app.filters.user_location()),
        app.filters.user_location().unwrap_or(crate::models::Coordinates::new(
            app.config.ui.default_lat,
            app.config.ui.default_lon,
        )),
    );

    let selected = app.selected_place().map(|p| p.place_id.as_str());
    let hovered = app.hover.state().place_id();
    let user = app.filters.user_location();

    let canvas = Canvas::default()
        .block(block)
        .marker(symbols::Marker::Braille)
        .x_bounds(view.x_bounds())
        .y_bounds(view.y_bounds())
        .paint(|ctx| {
            ctx.draw(&Map {
                color: Color::Rgb(50, 50, 50),
                resolution: MapResolution::High,
            });

            for place in &app.visible {
                let id = Some(place.place_id.as_str());
                let color = if id == selected || id == hovered {
                    Color::Yellow
                } else if place.is_open() {
                    Color::Green
                } else {
                    Color::Gray
                };
                ctx.print(
                    place.longitude,
                    place.latitude,
                    Span::styled("●", Style::default().fg(color).add_modifier(Modifier::BOLD)),
                );
            }

            if let Some(user) = user {
                ctx.print(
                    user.longitude,
                    user.latitude,
                    Span::styled("⌖", Style::default().fg(Color::Cyan)),
                );
            }
        });
    f.render_widget(canvas, area);

    match &app.places_state {
        PlacesState::Loading => overlay_message(f, inner, "Loading places...", Color::DarkGray),
        PlacesState::Failed(_) => {}
        PlacesState::Ready if app.visible.is_empty() && !app.scheduler.is_filtering() => {
            let text = if app.filters.selection().is_active() {
                "No places match the selected filters (x to reset)"
            } else {
                "No places to show"
            };
            overlay_message(f, inner, text, Color::Yellow)
        }
        PlacesState::Ready => {}
    }

    render_tooltip(f, app, &view);
}

fn overlay_message(f: &mut Frame, area: Rect, text: &str, color: Color) {
    let width = (text.chars().count() as u16 + 4).min(area.width);
    let rect = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height / 2,
        width,
        area.height.min(1),
    );
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(color)),
        rect,
    );
}

fn render_tooltip(f: &mut Frame, app: &App, view: &Viewport) {
    let (id, locked) = match app.hover.state() {
        HoverState::Hidden => return,
        HoverState::Visible(id) => (id, false),
        HoverState::VisibleLocked(id) => (id, true),
    };
    let Some(place) = app.visible.iter().find(|p| &p.place_id == id) else {
        return;
    };
    let Some(cell) = view.cell_of(place.coordinates()) else {
        return;
    };

    let rect = view.tooltip_rect(cell, place);
    let border = if locked { Color::Cyan } else { Color::DarkGray };
    let body = vec![
        Line::from(Span::styled(
            place.name.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(
                format!("★ {:.1}", place.google_rating),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  "),
            Span::styled(
                format!("cig {:.1}", place.cig_rating),
                Style::default().fg(Color::Magenta),
            ),
        ]),
    ];

    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(body).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        ),
        rect,
    );
}

fn render_places(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Places;
    let title = format!("Places ({}/{})", app.visible.len(), app.all_places.len());
    let block = panel(&title, focused);

    let message = match &app.places_state {
        PlacesState::Loading => Some(Line::from(Span::styled(
            "Loading places...",
            Style::default().fg(Color::DarkGray),
        ))),
        PlacesState::Failed(reason) => Some(Line::from(vec![
            Span::styled("Could not load places: ", Style::default().fg(Color::Red)),
            Span::raw(reason.as_str()),
            Span::styled("  (r to retry)", Style::default().fg(Color::DarkGray)),
        ])),
        PlacesState::Ready if app.visible.is_empty() && !app.scheduler.is_filtering() => {
            Some(Line::from(Span::styled(
                "Nothing here. Press x to reset filters.",
                Style::default().fg(Color::Yellow),
            )))
        }
        PlacesState::Ready => None,
    };
    if let Some(message) = message {
        f.render_widget(Paragraph::new(message).wrap(Wrap { trim: true }).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .visible
        .iter()
        .map(|p| {
            let status_color = if p.is_open() { Color::Green } else { Color::DarkGray };
            ListItem::new(Line::from(vec![
                Span::raw(format!(" {}", p.name)),
                Span::styled(
                    format!(" │ {}", p.open_status.label()),
                    Style::default().fg(status_color),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default().with_selected(Some(app.selected_index));
    let list = List::new(items)
        .block(block)
        .highlight_style(if focused { highlight() } else { Style::default().fg(Color::Yellow) });
    f.render_stateful_widget(list, area, &mut state);
}

fn label(text: &str) -> Span<'_> {
    Span::styled(text, Style::default().add_modifier(Modifier::BOLD))
}

fn render_detail(f: &mut Frame, app: &App, area: Rect) {
    let block = panel("Details", false).padding(Padding::horizontal(1));
    let Some(place) = app.selected_place() else {
        f.render_widget(block, area);
        return;
    };

    let brands = place
        .available_brands
        .iter()
        .map(|id| catalog_name(BRAND_CATALOG, id))
        .collect::<Vec<_>>()
        .join(", ");
    let accessories = place
        .available_accessories
        .iter()
        .map(|id| catalog_name(ACCESSORY_CATALOG, id))
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        Line::from(Span::styled(
            place.name.as_str(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(place.address.as_str(), Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from(vec![label("Status:      "), Span::raw(place.open_status.label())]),
        Line::from(vec![
            label("Ratings:     "),
            Span::raw(format!(
                "Google {:.1}  │  Cig {:.1}",
                place.google_rating, place.cig_rating
            )),
        ]),
        Line::from(vec![label("Brands:      "), Span::raw(or_dash(brands))]),
        Line::from(vec![label("Accessories: "), Span::raw(or_dash(accessories))]),
    ];

    if let Some(user) = app.filters.user_location() {
        let km = distance_km(user, place.coordinates());
        lines.push(Line::from(vec![label("Distance:    "), Span::raw(format!("{:.1} km", km))]));
    }
    lines.push(Line::from(vec![
        label("Directions:  "),
        Span::styled(place.directions_url(), Style::default().fg(Color::Blue)),
    ]));

    if !place.reviews.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(label("Reviews")));
        for review in place.reviews.iter().take(MAX_REVIEWS_SHOWN) {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} ", "★".repeat(review.rating.min(5) as usize)),
                    Style::default().fg(Color::Yellow),
                ),
                label(&review.user_name),
                Span::styled(format!("  {}", review.date), dim()),
            ]));
            lines.push(Line::from(format!("  {}", review.text)));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "c check in   s report stock   v rate   +/- like",
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

fn or_dash(s: String) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s
    }
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();

    if let Some(toast) = app.toasts.latest() {
        let color = match toast.level {
            ToastLevel::Info => Color::Cyan,
            ToastLevel::Success => Color::Green,
            ToastLevel::Error => Color::Red,
        };
        let style = Style::default().fg(Color::Black).bg(color);
        spans.push(Span::styled(format!(" {} ", toast.message), style));
    } else {
        spans.push(Span::styled(
            " Tab focus  ↑/↓ move  Space toggle  o open  n near me  x reset  q quit",
            Style::default().fg(Color::DarkGray),
        ));
    }

    if app.scheduler.show_indicator() {
        spans.push(Span::styled("  Filtering...", Style::default().fg(Color::Yellow)));
    }
    if app.filters.is_locating() {
        spans.push(Span::styled("  Locating...", Style::default().fg(Color::Cyan)));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn render_dialog(f: &mut Frame, app: &App, dialog: &Dialog) {
    let place_name = app
        .selected_place()
        .map(|p| p.name.as_str())
        .unwrap_or("this place");

    let (title, lines) = match dialog {
        Dialog::CheckIn(draft) => {
            let lines = match draft.step {
                CheckInStep::ConfirmOpen => vec![
                    Line::from(format!("Is {} open right now?", place_name)),
                    Line::from(""),
                    Line::from(Span::styled("y yes   n no", Style::default().fg(Color::DarkGray))),
                ],
                CheckInStep::PickBrands => {
                    let mut lines = vec![Line::from("Which brands did you see?"), Line::from("")];
                    lines.extend(BRAND_CATALOG.iter().enumerate().map(|(i, entry)| {
                        let mark = if draft.brands.contains(entry.id) { "[x]" } else { "[ ]" };
                        let style = if i == draft.cursor { highlight() } else { Style::default() };
                        Line::from(Span::styled(format!(" {} {}", mark, entry.name), style))
                    }));
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        "Space toggle   Enter next   ← back",
                        Style::default().fg(Color::DarkGray),
                    )));
                    lines
                }
                CheckInStep::Review => {
                    let brands = draft
                        .brands
                        .iter()
                        .map(|id| catalog_name(BRAND_CATALOG, id))
                        .collect::<Vec<_>>()
                        .join(", ");
                    vec![
                        Line::from(vec![
                            label("Open: "),
                            Span::raw(if draft.open_confirm { "yes" } else { "no" }),
                        ]),
                        Line::from(vec![label("Brands: "), Span::raw(or_dash(brands))]),
                        Line::from(""),
                        Line::from(Span::styled(
                            "Enter send   ← back   Esc cancel",
                            Style::default().fg(Color::DarkGray),
                        )),
                    ]
                }
            };
            ("Check in", lines)
        }
        Dialog::Stock(draft) => {
            let mut lines = vec![Line::from(format!("Stock at {}", place_name)), Line::from("")];
            lines.extend(BRAND_CATALOG.iter().enumerate().map(|(i, entry)| {
                let style = if i == draft.cursor { highlight() } else { Style::default() };
                Line::from(Span::styled(format!("  {}", entry.name), style))
            }));
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                label("In stock: "),
                Span::raw(if draft.has_stock { "yes" } else { "no" }),
            ]));
            lines.push(Line::from(Span::styled(
                "Space flip   Enter send   Esc cancel",
                Style::default().fg(Color::DarkGray),
            )));
            ("Report stock", lines)
        }
        Dialog::Rating(draft) => {
            let stars = format!(
                "{}{}",
                "★".repeat(draft.stars as usize),
                "☆".repeat(5 - draft.stars.min(5) as usize)
            );
            let lines = vec![
                Line::from(format!("Rate {}", place_name)),
                Line::from(""),
                Line::from(Span::styled(stars, Style::default().fg(Color::Yellow))),
                Line::from(""),
                Line::from(vec![label("Comment: "), Span::raw(format!("{}_", draft.comment))]),
                Line::from(""),
                Line::from(Span::styled(
                    "←/→ stars   type to comment   Enter send   Esc cancel",
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            ("Rate", lines)
        }
    };

    let height = lines.len() as u16 + 2;
    let rect = centered_rect(50, height, f.size());
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(panel(title, true)),
        rect,
    );
}
