//! Journal logging shared by the GUI and the headless runner
//! (`journalctl --user -t taskboard -f`).

/// Crate targets pass at Info (Debug when toggled); everything else at Warn.
struct FilteredJournal {
    inner: systemd_journal_logger::JournalLog,
}

impl log::Log for FilteredJournal {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        let target = metadata.target();
        if target.starts_with("taskboard") {
            let max = if crate::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            metadata.level() <= max
        } else {
            metadata.level() <= log::LevelFilter::Warn
        }
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the journal logger. Without a journal (containers, other OSes) the
/// process keeps running with logging disabled.
pub fn init(identifier: &str, debug: bool) {
    crate::set_debug_logging(debug);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(j) => j.with_syslog_identifier(identifier.to_string()),
        Err(e) => {
            eprintln!("{}: journal unavailable, logging disabled: {}", identifier, e);
            return;
        }
    };

    if let Err(e) = log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })) {
        eprintln!("{}: logger already installed: {}", identifier, e);
        return;
    }
    // Global max must be Debug so debug logs can pass through when toggled
    log::set_max_level(log::LevelFilter::Debug);
}
