//! Live project settings
//!
//! Wraps the current `ExportSettings` of a project and broadcasts a
//! settings-changed notification whenever they are replaced.

use super::schema::ExportSettings;
use parking_lot::RwLock;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

pub struct ProjectSettings {
    current: RwLock<ExportSettings>,
    changed_tx: broadcast::Sender<ExportSettings>,
}

impl ProjectSettings {
    pub fn new(settings: ExportSettings) -> Self {
        let (changed_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(settings),
            changed_tx,
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> ExportSettings {
        self.current.read().clone()
    }

    /// Replace the settings and notify subscribers
    pub fn replace(&self, settings: ExportSettings) {
        *self.current.write() = settings.clone();
        tracing::debug!(
            "Project settings changed: {}x{} {}/{}/{}",
            settings.videowidth,
            settings.videoheight,
            settings.vencoder,
            settings.aencoder,
            settings.muxer
        );
        // No subscribers is fine
        let _ = self.changed_tx.send(settings);
    }

    /// Edit the settings in place and notify subscribers
    pub fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut ExportSettings),
    {
        let mut settings = self.snapshot();
        edit(&mut settings);
        self.replace(settings);
    }

    /// Receive every future settings-changed notification
    pub fn subscribe(&self) -> broadcast::Receiver<ExportSettings> {
        self.changed_tx.subscribe()
    }
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self::new(ExportSettings::default())
    }
}
