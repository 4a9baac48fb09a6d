//! Run one mail export without the GUI and print what the worker reported.

use taskboard::config::{BoardConfig, CONFIG_VERSION};
use taskboard::sync::Services;
use taskboard::sync::background::Action;
use taskboard::sync::notify;

#[tokio::main]
async fn main() {
    let cosmic_cfg = cosmic::cosmic_config::Config::new("dev.taskboard.app", CONFIG_VERSION)
        .expect("Failed to load config");
    let config = <BoardConfig as cosmic::cosmic_config::CosmicConfigEntry>::get_entry(&cosmic_cfg)
        .unwrap_or_else(|(_, cfg)| cfg);

    taskboard::logging::init("taskboard-export", config.debug_logging);

    let services = match Services::start(&config).await {
        Ok(services) => services,
        Err(e) => {
            eprintln!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };
    let mut rx = services.notifier.subscribe();

    println!("Fetching tasks from {} ...", config.api_base_url);
    if let Err(e) = services.background.request(Action::FetchTasks).await {
        eprintln!("Failed to initiate task fetching: {}", e);
        std::process::exit(1);
    }

    let mut failed = false;
    for n in notify::drain(&mut rx) {
        failed |= n.kind == notify::NoticeKind::Error;
        println!("[{}] {}", n.kind.as_str(), n.text);
    }

    match taskboard::store::load_fetch_params(services.store.as_ref()) {
        Ok(params) => println!("Next run starts at skip {} (limit {})", params.skip, params.limit),
        Err(e) => eprintln!("Failed to read fetch options: {}", e),
    }

    if failed {
        std::process::exit(2);
    }
}
