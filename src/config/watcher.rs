//! Configuration file watcher for hot reload.
//!
//! Watches the directory holding the config file rather than the file itself:
//! editors and deploy tools often replace the file by renaming a new one over
//! it, which would drop a watch placed on the old inode.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GuardServerConfig;

/// Sends a freshly validated config every time the watched file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GuardServerConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GuardServerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Directory to watch; a bare file name means the working directory.
    fn watch_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let dir = self.watch_dir().to_path_buf();
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches_config(&event, &file_name) => {
                    tracing::info!(path = ?path, kind = ?event.kind, "Config file change detected, reloading");
                    match load_config(&path) {
                        Ok(new_config) => {
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

/// A create or modify (including rename-into-place) event naming the config file.
fn touches_config(event: &Event, file_name: &OsString) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};

    const INITIAL: &str = "[[guard.ranges]]\nlow = \"10.0.0.0\"\nhigh = \"10.0.0.255\"\n";
    const REPLACED: &str = "[[guard.ranges]]\nlow = \"10.9.0.0\"\nhigh = \"10.9.0.255\"\n[[guard.ranges]]\nlow = \"10.8.0.0\"\nhigh = \"10.8.0.255\"\n";

    #[test]
    fn test_touches_config_filters_by_name() {
        let name = OsString::from("guard.toml");

        let event = Event::new(EventKind::Create(CreateKind::File)).add_path("/etc/xg/guard.toml".into());
        assert!(touches_config(&event, &name));

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/etc/xg/.guard.toml.tmp".into())
            .add_path("/etc/xg/guard.toml".into());
        assert!(touches_config(&event, &name));

        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/etc/xg/other.toml".into());
        assert!(!touches_config(&event, &name));

        let event = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/etc/xg/guard.toml".into());
        assert!(!touches_config(&event, &name));
    }

    #[test]
    fn test_bare_file_name_watches_working_dir() {
        let (watcher, _rx) = ConfigWatcher::new(Path::new("guard.toml"));
        assert_eq!(watcher.watch_dir(), Path::new("."));

        let (watcher, _rx) = ConfigWatcher::new(Path::new("/etc/xg/guard.toml"));
        assert_eq!(watcher.watch_dir(), Path::new("/etc/xg"));
    }

    #[tokio::test]
    async fn test_reload_survives_atomic_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guard.toml");
        fs::write(&path, INITIAL).unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        // Replace the file the way editors and deploy tools do.
        let staged = dir.path().join(".guard.toml.tmp");
        fs::write(&staged, REPLACED).unwrap();
        fs::rename(&staged, &path).unwrap();

        let config = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no reload after rename")
            .expect("watcher channel closed");
        assert_eq!(config.guard.ranges.len(), 2);
        assert_eq!(config.guard.ranges[0].low, "10.9.0.0");

        // The watch must still be live for a second replacement.
        fs::write(&staged, INITIAL).unwrap();
        fs::rename(&staged, &path).unwrap();

        let config = loop {
            let next = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("no reload after second rename")
                .expect("watcher channel closed");
            if next.guard.ranges.len() == 1 {
                break next;
            }
        };
        assert_eq!(config.guard.ranges[0].low, "10.0.0.0");
    }

    #[tokio::test]
    async fn test_unrelated_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guard.toml");
        fs::write(&path, INITIAL).unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        fs::write(dir.path().join("other.toml"), REPLACED).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(result.is_err(), "update sent for an unrelated file");
    }
}
