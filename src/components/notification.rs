use cosmic::iced::{Alignment, Length};
use cosmic::widget::{icon, row, text};
use cosmic::Element;

use crate::message::Message;
use crate::sync::notify::{NoticeKind, Notification};

fn kind_icon(kind: NoticeKind) -> &'static str {
    match kind {
        NoticeKind::Info => "dialog-information-symbolic",
        NoticeKind::Success => "emblem-ok-symbolic",
        NoticeKind::Error => "dialog-error-symbolic",
    }
}

/// One line of the notification list, styled by kind.
pub fn notification_row(notification: &Notification) -> Element<'_, Message> {
    row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(icon::from_name(kind_icon(notification.kind)).size(16).icon())
        .push(text::caption(notification.at.format("%H:%M:%S").to_string()))
        .push(text::body(notification.text.clone()).width(Length::Fill))
        .into()
}
