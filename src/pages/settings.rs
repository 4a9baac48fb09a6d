use cosmic::iced::{Alignment, Length};
use cosmic::widget::{button, column, container, row, scrollable, text, text_input};
use cosmic::Element;

use crate::config::BoardConfig;
use crate::message::{ImapField, Message};

/// Text buffers behind the settings page. Numbers stay as typed until saved.
#[derive(Debug, Default)]
pub struct SettingsForm {
    pub limit_input: String,
    pub skip_input: String,
    pub options_status: Option<String>,
    pub imap_port_input: String,
    pub imap_password: String,
    pub imap_status: Option<Result<String, String>>,
}

fn labeled<'a>(label: &'a str, input: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    row()
        .spacing(8)
        .align_y(Alignment::Center)
        .push(text::body(label).width(Length::Fixed(160.0)))
        .push(input)
        .into()
}

pub fn settings_view<'a>(config: &'a BoardConfig, form: &'a SettingsForm) -> Element<'a, Message> {
    let mut content = column().spacing(12);

    // --- Fetch options ---
    content = content.push(text::title4("Fetch Options"));
    content = content.push(labeled(
        "Tasks per fetch",
        text_input::text_input("3", &form.limit_input)
            .on_input(Message::LimitInput)
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "Skip",
        text_input::text_input("0", &form.skip_input)
            .on_input(Message::SkipInput)
            .on_submit(|_| Message::SaveOptions)
            .width(Length::Fill),
    ));
    {
        let mut save_row = row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(button::suggested("Save").on_press(Message::SaveOptions));
        if let Some(status) = &form.options_status {
            save_row = save_row.push(text::body(status.clone()));
        }
        content = content.push(save_row);
    }

    // --- Board ---
    content = content.push(text::title4("Board"));
    content = content.push(labeled(
        "Card link",
        text_input::text_input("https://", &config.card_url)
            .on_input(Message::SetCardUrl)
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "Browser",
        text_input::text_input("xdg-open", &config.browser_command)
            .on_input(Message::SetBrowserCommand)
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "Task API",
        text_input::text_input(crate::config::DEFAULT_API_BASE_URL, &config.api_base_url)
            .on_input(Message::SetApiBaseUrl)
            .width(Length::Fill),
    ));
    content = content.push(
        button::standard("Reload board").on_press(Message::ReloadBoard),
    );

    // --- Mail ---
    content = content.push(text::title4("Mail Export"));
    content = content.push(labeled(
        "Folder",
        text_input::text_input(crate::config::DEFAULT_TASKS_FOLDER, &config.tasks_folder)
            .on_input(Message::SetTasksFolder)
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "IMAP host",
        text_input::text_input("imap.example.com", &config.imap.host)
            .on_input(|v| Message::SetImapField(ImapField::Host, v))
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "Port",
        text_input::text_input("993", &form.imap_port_input)
            .on_input(|v| Message::SetImapField(ImapField::Port, v))
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "Username",
        text_input::text_input("me@example.com", &config.imap.username)
            .on_input(|v| Message::SetImapField(ImapField::Username, v))
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "Sender address",
        text_input::text_input("Defaults to the username", &config.imap.identity_email)
            .on_input(|v| Message::SetImapField(ImapField::Identity, v))
            .width(Length::Fill),
    ));
    content = content.push(labeled(
        "Password",
        text_input::secure_input("App password", form.imap_password.clone(), None::<Message>, true)
            .on_input(Message::SetImapPassword)
            .width(Length::Fill),
    ));
    {
        let mut test_row = row().spacing(8).align_y(Alignment::Center);
        test_row = test_row.push(
            button::standard("Save and connect").on_press(Message::SaveImapAccount),
        );
        if let Some(ref result) = form.imap_status {
            match result {
                Ok(msg) => test_row = test_row.push(text::body(format!("✓ {}", msg))),
                Err(e) => test_row = test_row.push(text::body(format!("✗ {}", e))),
            }
        }
        content = content.push(test_row);
    }

    // --- Debug logging ---
    content = content.push(
        row()
            .spacing(8)
            .align_y(Alignment::Center)
            .push(text::body("Debug logging").width(Length::Fill))
            .push(
                cosmic::widget::toggler(config.debug_logging)
                    .on_toggle(|_| Message::ToggleDebugLogging),
            ),
    );

    container(scrollable(content.padding(16).width(Length::Fill)))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
