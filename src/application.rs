use std::time::{Duration, Instant};

use cosmic::app::{Core, Task as CosmicTask};
use cosmic::widget::{button, icon, row};
use cosmic::{Application, Element, executor};

use crate::config::BoardConfig;
use crate::core::board::{self, Board};
use crate::core::dnd::{Reconciler, SETTLE_DELAY};
use crate::core::task::TaskId;
use crate::mail::imap::ImapAccount;
use crate::message::{ImapField, Message, Page};
use crate::pages;
use crate::pages::settings::SettingsForm;
use crate::store;
use crate::sync::Services;
use crate::sync::background::Action;
use crate::sync::notify::{self, NoticeKind, Notification, NotificationReceiver};
use crate::sync::todos::FetchParams;

/// How long "Options saved successfully!" stays visible.
const OPTIONS_STATUS_TTL: Duration = Duration::from_secs(3);

pub struct Flags {
    pub config: BoardConfig,
    pub cosmic_config: cosmic::cosmic_config::Config,
}

pub struct TaskBoard {
    core: Core,
    config: BoardConfig,
    cosmic_config: cosmic::cosmic_config::Config,
    page: Page,

    services: Option<Services>,
    notifications_rx: Option<NotificationReceiver>,
    notifications: Vec<Notification>,
    fetching: bool,

    board: Option<Board>,
    load_error: Option<String>,
    reconciler: Reconciler,

    settings: SettingsForm,
    options_status_seq: u64,
}

impl Application for TaskBoard {
    type Executor = executor::Default;
    type Flags = Flags;
    type Message = Message;

    const APP_ID: &'static str = "dev.taskboard.app";

    fn core(&self) -> &Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    fn init(core: Core, flags: Self::Flags) -> (Self, CosmicTask<Self::Message>) {
        let settings = SettingsForm {
            imap_port_input: port_input(flags.config.imap.port),
            ..SettingsForm::default()
        };

        let app = TaskBoard {
            core,
            config: flags.config,
            cosmic_config: flags.cosmic_config,
            page: Page::Board,
            services: None,
            notifications_rx: None,
            notifications: Vec::new(),
            fetching: false,
            board: None,
            load_error: None,
            reconciler: Reconciler::new(),
            settings,
            options_status_seq: 0,
        };
        let task = app.start_services();

        (app, task)
    }

    fn header_end(&self) -> Vec<Element<'_, Message>> {
        let mut fetch_btn = button::icon(icon::from_name("mail-send-receive-symbolic"));
        if !self.fetching && self.services.is_some() {
            fetch_btn = fetch_btn.on_press(Message::FetchTasksNow);
        }

        let next_page = match self.page {
            Page::Board => Page::Settings,
            Page::Settings => Page::Board,
        };

        vec![
            row()
                .spacing(4)
                .push(fetch_btn)
                .push(
                    button::icon(icon::from_name("emblem-system-symbolic"))
                        .on_press(Message::ShowPage(next_page)),
                )
                .into(),
        ]
    }

    fn on_escape(&mut self) -> CosmicTask<Message> {
        if self.reconciler.payload().is_some() {
            return self.cancel_drag();
        }
        if self.page == Page::Settings {
            self.page = Page::Board;
        }
        CosmicTask::none()
    }

    fn update(&mut self, message: Message) -> CosmicTask<Message> {
        match message {
            Message::ServicesReady(Ok(services)) => {
                // Keep whatever the previous worker already reported.
                self.drain_notifications();
                self.notifications_rx = Some(services.notifier.subscribe());
                self.services = Some(services);
                self.reload_options_form();
                if self.board.is_none() {
                    return self.load_board();
                }
            }

            Message::ServicesReady(Err(e)) => {
                log::error!("Failed to start services: {}", e);
                self.load_error = Some(e);
            }

            Message::BoardLoaded(result) => {
                match result {
                    Ok(board) => {
                        self.board = Some(board);
                        self.load_error = None;
                    }
                    Err(e) => {
                        log::error!("Failed to load board: {}", e);
                        self.load_error = Some(e);
                    }
                }
                self.drain_notifications();
            }

            Message::ReloadBoard => {
                // Restart so API and browser changes take effect, then load again.
                if self.fetching {
                    return CosmicTask::none();
                }
                self.board = None;
                self.load_error = None;
                self.reconciler = Reconciler::new();
                self.page = Page::Board;
                return self.start_services();
            }

            Message::CardClicked(id) => {
                let Some(board) = &self.board else {
                    return CosmicTask::none();
                };
                if !self.reconciler.should_open(board, &id, Instant::now()) {
                    log::debug!("Ignoring click on card {} during drag", id);
                    return CosmicTask::none();
                }
                if let Some(services) = &self.services {
                    if let Err(e) = services.background.send(Action::OpenUrl(self.config.card_url.clone())) {
                        log::error!("Failed to open card link: {}", e);
                    }
                }
            }

            Message::DragStart(id) => {
                let Some(board) = self.board.as_mut() else {
                    return CosmicTask::none();
                };
                if let Some(previous) = self.reconciler.payload().cloned() {
                    self.reconciler.drag_end(board, &previous, Instant::now());
                }
                if !self.reconciler.drag_start(board, &id) {
                    log::warn!("Card {} is not on the board", id);
                }
            }

            Message::DragCancel => {
                return self.cancel_drag();
            }

            Message::DropOnColumn(column_id) => {
                return self.drop_card(&column_id, None);
            }

            Message::DropBefore(column_id, before) => {
                return self.drop_card(&column_id, Some(&before));
            }

            Message::DragSettled => {
                if let Some(board) = self.board.as_mut() {
                    self.reconciler.settle(board, Instant::now());
                }
            }

            Message::FetchTasksNow => {
                if self.fetching {
                    return CosmicTask::none();
                }
                let Some(services) = &self.services else {
                    return CosmicTask::none();
                };
                let request = services.background.request(Action::FetchTasks);
                self.fetching = true;
                self.push_notification(NoticeKind::Info, "Fetching tasks...");

                return CosmicTask::perform(request, |result| {
                    cosmic::Action::App(Message::ExportFinished(result))
                });
            }

            Message::ExportFinished(result) => {
                self.fetching = false;
                self.drain_notifications();
                if let Err(e) = result {
                    log::error!("Error sending fetch request: {}", e);
                    self.push_notification(NoticeKind::Error, "Failed to initiate task fetching.");
                }
                self.reload_options_form();
            }

            Message::ClearNotifications => {
                self.drain_notifications();
                self.notifications.clear();
            }

            Message::ShowPage(page) => {
                if page == Page::Settings {
                    self.reload_options_form();
                }
                self.page = page;
            }

            Message::LimitInput(value) => {
                self.settings.limit_input = value;
            }

            Message::SkipInput(value) => {
                self.settings.skip_input = value;
            }

            Message::SaveOptions => {
                return self.save_options();
            }

            Message::OptionsStatusExpired(seq) => {
                if seq == self.options_status_seq {
                    self.settings.options_status = None;
                }
            }

            Message::SetBrowserCommand(value) => {
                self.config.browser_command = value;
                self.save_config();
            }

            Message::SetCardUrl(value) => {
                self.config.card_url = value;
                self.save_config();
            }

            Message::SetApiBaseUrl(value) => {
                self.config.api_base_url = value;
                self.save_config();
            }

            Message::SetTasksFolder(value) => {
                self.config.tasks_folder = value;
                self.save_config();
            }

            Message::ToggleDebugLogging => {
                self.config.debug_logging = !self.config.debug_logging;
                taskboard::set_debug_logging(self.config.debug_logging);
                self.save_config();
            }

            Message::SetImapField(field, value) => {
                match field {
                    ImapField::Host => self.config.imap.host = value,
                    ImapField::Port => {
                        self.config.imap.port = value.trim().parse().unwrap_or(0);
                        self.settings.imap_port_input = value;
                    }
                    ImapField::Username => self.config.imap.username = value,
                    ImapField::Identity => self.config.imap.identity_email = value,
                }
                self.save_config();
            }

            Message::SetImapPassword(value) => {
                self.settings.imap_password = value;
            }

            Message::SaveImapAccount => {
                let settings = self.config.imap.clone();
                if settings.host.trim().is_empty() {
                    self.settings.imap_status = Some(Err("IMAP host is required".to_string()));
                    return CosmicTask::none();
                }
                if settings.username.trim().is_empty() {
                    self.settings.imap_status = Some(Err("Username is required".to_string()));
                    return CosmicTask::none();
                }
                let password = self.settings.imap_password.clone();
                self.settings.imap_status = None;

                return CosmicTask::perform(
                    async move {
                        if !password.is_empty() {
                            crate::sync::keyring::store_credentials(
                                &settings.keyring_key(),
                                settings.username.trim(),
                                &password,
                            )
                            .await?;
                        }
                        let account = ImapAccount::from_keyring(&settings)
                            .await?
                            .ok_or_else(|| "IMAP is not configured".to_string())?;
                        account.test_connection().await
                    },
                    |result| cosmic::Action::App(Message::ImapAccountSaved(result)),
                );
            }

            Message::ImapAccountSaved(result) => {
                let connected = result.is_ok();
                if let Err(e) = &result {
                    log::warn!("IMAP connection test failed: {}", e);
                }
                self.settings.imap_status = Some(result);
                if connected {
                    self.settings.imap_password.clear();
                    if !self.fetching {
                        return self.start_services();
                    }
                }
            }
        }

        CosmicTask::none()
    }

    fn view(&self) -> Element<'_, Message> {
        match self.page {
            Page::Board => pages::board::board_view(
                self.board.as_ref(),
                self.reconciler.payload(),
                self.load_error.as_deref(),
                &self.notifications,
                self.fetching,
            ),
            Page::Settings => pages::settings::settings_view(&self.config, &self.settings),
        }
    }
}

impl TaskBoard {
    /// (Re)build the service stack from the current config. Dropping the old
    /// handle lets the previous worker finish its queue and stop.
    fn start_services(&self) -> CosmicTask<Message> {
        let config = self.config.clone();
        CosmicTask::perform(
            async move { Services::start(&config).await },
            |result| cosmic::Action::App(Message::ServicesReady(result)),
        )
    }

    fn load_board(&self) -> CosmicTask<Message> {
        let Some(services) = &self.services else {
            return CosmicTask::none();
        };
        let specs = self.config.board_columns();
        let page_size = u64::from(self.config.board_page_size);
        let store = services.store.clone();
        let source = services.source.clone();
        let notifier = services.notifier.clone();

        CosmicTask::perform(
            async move {
                board::load_board(&specs, store.as_ref(), source.as_ref(), page_size, &notifier)
                    .await
                    .map_err(|e| e.to_string())
            },
            |result| cosmic::Action::App(Message::BoardLoaded(result)),
        )
    }

    fn drop_card(&mut self, column_id: &str, before: Option<&TaskId>) -> CosmicTask<Message> {
        let (Some(board), Some(services)) = (self.board.as_mut(), self.services.as_ref()) else {
            return CosmicTask::none();
        };
        let dragged = self.reconciler.payload().cloned();

        match self
            .reconciler
            .drop_on(board, column_id, before, services.store.as_ref())
        {
            Ok(true) => {}
            Ok(false) => log::debug!("Drop on '{}' moved nothing", column_id),
            Err(e) => log::error!("Failed to save board: {}", e),
        }

        if let Some(id) = dragged {
            self.reconciler.drag_end(board, &id, Instant::now());
        }
        settle_after_delay()
    }

    fn cancel_drag(&mut self) -> CosmicTask<Message> {
        let (Some(board), Some(id)) = (self.board.as_mut(), self.reconciler.payload().cloned()) else {
            return CosmicTask::none();
        };
        self.reconciler.drag_end(board, &id, Instant::now());
        settle_after_delay()
    }

    fn save_options(&mut self) -> CosmicTask<Message> {
        let Some(services) = &self.services else {
            return CosmicTask::none();
        };
        let limit = self.settings.limit_input.trim().parse::<u64>();
        let skip = self.settings.skip_input.trim().parse::<u64>();
        let status = match (limit, skip) {
            (Ok(limit), Ok(skip)) if limit > 0 => {
                match store::save_options(services.store.as_ref(), FetchParams { skip, limit }) {
                    Ok(()) => "Options saved successfully!".to_string(),
                    Err(e) => {
                        log::error!("Failed to save options: {}", e);
                        format!("Failed to save options: {}", e)
                    }
                }
            }
            _ => "Enter a limit of at least 1 and a skip of 0 or more.".to_string(),
        };

        self.settings.options_status = Some(status);
        self.options_status_seq += 1;
        let seq = self.options_status_seq;
        CosmicTask::perform(tokio::time::sleep(OPTIONS_STATUS_TTL), move |_| {
            cosmic::Action::App(Message::OptionsStatusExpired(seq))
        })
    }

    fn reload_options_form(&mut self) {
        let Some(services) = &self.services else {
            return;
        };
        match store::load_fetch_params(services.store.as_ref()) {
            Ok(params) => {
                self.settings.limit_input = params.limit.to_string();
                self.settings.skip_input = params.skip.to_string();
            }
            Err(e) => log::error!("Failed to load fetch options: {}", e),
        }
    }

    fn drain_notifications(&mut self) {
        if let Some(rx) = self.notifications_rx.as_mut() {
            self.notifications.extend(notify::drain(rx));
        }
    }

    fn push_notification(&mut self, kind: NoticeKind, text: &str) {
        self.notifications.push(Notification {
            kind,
            text: text.to_string(),
            at: chrono::Local::now().naive_local(),
        });
    }

    fn save_config(&self) {
        use cosmic::cosmic_config::CosmicConfigEntry;
        if let Err(e) = self.config.write_entry(&self.cosmic_config) {
            log::error!("Failed to save config: {:?}", e);
        }
    }
}

fn settle_after_delay() -> CosmicTask<Message> {
    CosmicTask::perform(tokio::time::sleep(SETTLE_DELAY), |_| {
        cosmic::Action::App(Message::DragSettled)
    })
}

fn port_input(port: u16) -> String {
    if port == 0 { String::new() } else { port.to_string() }
}
