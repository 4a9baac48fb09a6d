use cosmic::app::Settings;
use cosmic::cosmic_config::CosmicConfigEntry;
use cosmic::iced::Limits;

mod application;
mod components;
mod message;
mod pages;

use taskboard::config;
use taskboard::core;
use taskboard::mail;
use taskboard::store;
use taskboard::sync;

use application::{Flags, TaskBoard};
use config::{BoardConfig, CONFIG_VERSION};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cosmic_cfg = cosmic::cosmic_config::Config::new("dev.taskboard.app", CONFIG_VERSION)
        .expect("Failed to create cosmic config");
    let config = BoardConfig::get_entry(&cosmic_cfg).unwrap_or_else(|(errors, cfg)| {
        if !errors.is_empty() {
            eprintln!("taskboard: using defaults for invalid config entries: {:?}", errors);
        }
        cfg
    });

    // `journalctl --user -t taskboard -f`
    taskboard::logging::init("taskboard", config.debug_logging);

    let mut settings = Settings::default();
    settings = settings.size_limits(Limits::NONE.min_width(640.0).min_height(400.0));

    let flags = Flags { config, cosmic_config: cosmic_cfg };
    cosmic::app::run::<TaskBoard>(settings, flags)?;

    Ok(())
}
