pub mod card;
pub mod notification;
