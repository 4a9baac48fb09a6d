use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, row, scrollable, text};
use cosmic::Element;

use crate::components::card::card_view;
use crate::components::notification::notification_row;
use crate::core::board::{Board, Column};
use crate::core::task::TaskId;
use crate::message::Message;
use crate::sync::notify::Notification;

fn column_view<'a>(col: &'a Column, dragging: Option<&TaskId>) -> Element<'a, Message> {
    let mut content = column().spacing(8).width(Length::FillPortion(1));

    content = content.push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(text::title4(col.title.clone()).width(Length::Fill))
            .push(text::caption(col.cards.len().to_string())),
    );

    if col.cards.is_empty() {
        content = content.push(text::caption("No tasks"));
    }
    for card in &col.cards {
        content = content.push(card_view(card, &col.id, dragging));
    }

    if dragging.is_some() && col.accepts_drop {
        content = content.push(
            button::standard("Drop here")
                .on_press(Message::DropOnColumn(col.id.clone()))
                .width(Length::Fill),
        );
    }

    content.into()
}

/// Manual fetch trigger and the notifications background work has sent.
fn fetch_panel<'a>(notifications: &'a [Notification], fetching: bool) -> Element<'a, Message> {
    let mut fetch_btn = button::suggested(if fetching { "Fetching tasks..." } else { "Fetch Tasks Now" });
    // Disabled while a run is in flight
    if !fetching {
        fetch_btn = fetch_btn.on_press(Message::FetchTasksNow);
    }

    let mut header = row().spacing(8).align_y(Alignment::Center).push(fetch_btn);
    if !notifications.is_empty() {
        header = header.push(button::standard("Clear").on_press(Message::ClearNotifications));
    }

    let mut content = column().spacing(4).push(header);
    for notification in notifications {
        content = content.push(notification_row(notification));
    }
    content.into()
}

pub fn board_view<'a>(
    board: Option<&'a Board>,
    dragging: Option<&TaskId>,
    load_error: Option<&'a str>,
    notifications: &'a [Notification],
    fetching: bool,
) -> Element<'a, Message> {
    let mut content = column().spacing(16);
    content = content.push(fetch_panel(notifications, fetching));

    match board {
        Some(board) => {
            if dragging.is_some() {
                content = content.push(text::caption(
                    "Choose a card to drop in front of, or a column's drop target. Escape cancels.",
                ));
            }
            let mut columns = row().spacing(16);
            for col in &board.columns {
                columns = columns.push(column_view(col, dragging));
            }
            content = content.push(columns);
        }
        None => match load_error {
            Some(e) => {
                content = content.push(
                    row()
                        .spacing(8)
                        .align_y(Alignment::Center)
                        .push(text::body(format!("Failed to load board: {}", e)).width(Length::Fill))
                        .push(button::standard("Retry").on_press(Message::ReloadBoard)),
                );
            }
            None => {
                content = content.push(text::body("Loading board..."));
            }
        },
    }

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
