use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, icon, row, text};
use cosmic::{Element, theme};

use crate::core::board::Card;
use crate::core::task::TaskId;
use crate::message::Message;

/// Render one card. While another card is being dragged, pressing this one
/// drops the dragged card in front of it; pressing the dragged card cancels.
pub fn card_view<'a>(card: &'a Card, column_id: &str, dragging: Option<&TaskId>) -> Element<'a, Message> {
    let id = card.id().clone();
    let label = text::body(card.label().to_string()).width(Length::Fill);

    let (handle, body) = match dragging {
        Some(dragged) if *dragged == id => (
            button::icon(icon::from_name("process-stop-symbolic")).on_press(Message::DragCancel),
            button::custom(label)
                .class(theme::Button::Suggested)
                .on_press(Message::DragCancel),
        ),
        Some(_) => (
            button::icon(icon::from_name("go-down-symbolic")),
            button::custom(label)
                .class(theme::Button::Text)
                .on_press(Message::DropBefore(column_id.to_string(), id)),
        ),
        None => (
            button::icon(icon::from_name("list-drag-handle-symbolic"))
                .on_press(Message::DragStart(id.clone())),
            button::custom(label)
                .class(theme::Button::Standard)
                .on_press(Message::CardClicked(id)),
        ),
    };

    row()
        .spacing(4)
        .align_y(Alignment::Center)
        .push(handle)
        .push(body.width(Length::Fill))
        .into()
}
