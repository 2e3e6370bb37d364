use crate::core::engine::ChangeEvent;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, error, info};

const QUIET: Duration = Duration::from_millis(500);
const POLL: Duration = Duration::from_millis(100);

fn is_profile_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "toml")
}

/// Collapses a burst of file events into one, and drops bursts the daemon
/// already announced itself.
#[derive(Debug, Default)]
struct Debounce {
    pending_since: Option<Instant>,
    last_event: Option<Instant>,
    last_announce: Option<Instant>,
}

impl Debounce {
    fn file_event(&mut self, at: Instant) {
        self.pending_since.get_or_insert(at);
        self.last_event = Some(at);
    }

    fn announced(&mut self, at: Instant) {
        self.last_announce = Some(at);
    }

    /// True once the pending burst has been quiet for [`QUIET`] and nothing
    /// announced it.
    fn flush(&mut self, now: Instant) -> bool {
        let (Some(start), Some(last)) = (self.pending_since, self.last_event) else {
            return false;
        };
        if now.duration_since(last) < QUIET {
            return false;
        }
        self.pending_since = None;
        self.last_event = None;
        !self.last_announce.is_some_and(|a| a + QUIET >= start)
    }
}

/// Emit [`ChangeEvent::ProfilesChanged`] when saved profiles are edited on
/// disk behind the daemon's back.
pub fn start_profile_watcher(saved_dir: PathBuf, events: broadcast::Sender<ChangeEvent>) {
    std::thread::spawn(move || {
        let (file_tx, file_rx) = mpsc::channel::<Instant>();
        let mut watcher = match notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                    && event.paths.iter().any(|p| is_profile_file(p))
                {
                    debug!(target: "altscreen::daemon", "Saved profiles touched: {:?}", event.paths);
                    let _ = file_tx.send(Instant::now());
                }
            },
        ) {
            Ok(w) => w,
            Err(e) => {
                error!(target: "altscreen::daemon", "Failed to create profile watcher: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&saved_dir, RecursiveMode::NonRecursive) {
            error!(target: "altscreen::daemon", "Failed to watch {}: {}", saved_dir.display(), e);
            return;
        }

        info!(target: "altscreen::daemon", "Watching {}", saved_dir.display());
        let mut announcements = events.subscribe();
        let mut debounce = Debounce::default();
        let mut own_sent = 0usize;
        loop {
            match file_rx.recv_timeout(POLL) {
                Ok(at) => debounce.file_event(at),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }

            loop {
                match announcements.try_recv() {
                    Ok(ChangeEvent::ProfilesChanged) if own_sent > 0 => own_sent -= 1,
                    Ok(ChangeEvent::ProfilesChanged) | Err(TryRecvError::Lagged(_)) => {
                        debounce.announced(Instant::now())
                    }
                    Ok(_) => {}
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Closed) => return,
                }
            }

            if debounce.flush(Instant::now()) {
                debug!(target: "altscreen::daemon", "Saved profiles changed on disk");
                if events.send(ChangeEvent::ProfilesChanged).is_ok() {
                    own_sent += 1;
                }
            }
        }
    });
}
