use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serenity::model::id::GuildId;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once};

use crate::commands::{Choice, CommandPayload, Reply};
use crate::gateway::Gateway;
use crate::interaction::Interaction;

/// Gateway that records every call instead of talking to the platform.
#[derive(Default)]
pub struct RecordingGateway {
    pub replies: Mutex<Vec<Reply>>,
    pub defers: Mutex<Vec<bool>>,
    pub suggestions: Mutex<Vec<Vec<Choice>>>,
    pub published: Mutex<Vec<(Option<GuildId>, Vec<CommandPayload>)>>,
    pub upserts: Mutex<Vec<(Option<GuildId>, CommandPayload)>>,
    pub fail_publish: AtomicBool,
}

impl RecordingGateway {
    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<(Option<GuildId>, Vec<CommandPayload>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn reply(&self, _interaction: &Interaction, reply: Reply) -> Result<()> {
        self.replies.lock().unwrap().push(reply);
        Ok(())
    }

    async fn defer(&self, _interaction: &Interaction, ephemeral: bool) -> Result<()> {
        self.defers.lock().unwrap().push(ephemeral);
        Ok(())
    }

    async fn suggest(&self, _interaction: &Interaction, choices: Vec<Choice>) -> Result<()> {
        self.suggestions.lock().unwrap().push(choices);
        Ok(())
    }

    async fn replace_commands(&self, scope: Option<GuildId>, commands: Vec<CommandPayload>) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(anyhow!("publish rejected"));
        }
        self.published.lock().unwrap().push((scope, commands));
        Ok(())
    }

    async fn upsert_command(&self, scope: Option<GuildId>, command: CommandPayload) -> Result<()> {
        self.upserts.lock().unwrap().push((scope, command));
        Ok(())
    }
}

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

/// Logger that keeps records on the thread that emitted them, so parallel
/// tests never see each other's output.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Installs the capturing logger and clears this thread's records.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|records| records.borrow_mut().clear());
}

/// Records captured on this thread at `level` since [`capture_logs`].
pub fn logged(level: Level) -> Vec<String> {
    RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .filter(|(record_level, _)| *record_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    })
}
