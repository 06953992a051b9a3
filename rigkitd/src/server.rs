//! Listeners, the shared device handle, and the reopen policy.
//!
//! Exactly one [`Rig`] is shared by every connection, behind a single
//! async mutex. The lock is held only around a dispatch call (bounded by
//! the port timeout × retries), never around the socket read that
//! precedes it, so a slow client blocks others only for the duration of
//! an actual device transaction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rigkit::{Error, Phase, Result, Rig};

use crate::session;
use crate::settings::Settings;

/// The one shared device handle plus connection accounting.
pub struct SharedRig {
    rig: Mutex<Rig>,
    clients: AtomicUsize,
    settings: Settings,
}

impl SharedRig {
    /// Wrap an already-opened handle for serving.
    pub fn new(rig: Rig, settings: Settings) -> Arc<Self> {
        Arc::new(SharedRig {
            rig: Mutex::new(rig),
            clients: AtomicUsize::new(0),
            settings,
        })
    }

    /// The daemon settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Lock the device handle. Test-facing; sessions go through
    /// [`execute`](SharedRig::execute).
    pub async fn lock_rig(&self) -> MutexGuard<'_, Rig> {
        self.rig.lock().await
    }

    pub(crate) fn client_connected(&self) {
        self.clients.fetch_add(1, Ordering::SeqCst);
    }

    /// Account a disconnect; closes the device when idle policy says so.
    pub(crate) async fn client_disconnected(&self) {
        let remaining = self.clients.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.settings.close_on_idle {
            let mut rig = self.rig.lock().await;
            if rig.phase() == Phase::Opened {
                info!("last client gone, closing device");
                if let Err(e) = rig.close().await {
                    warn!(error = %e, "idle close failed");
                }
            }
        }
    }

    /// Run one command under the lock, applying idle-reopen first and
    /// the reopen-retry policy on hard errors.
    ///
    /// Returns the reply data lines (empty for a set command). The lock
    /// is held only for the duration of this call; socket reads happen
    /// outside it.
    pub async fn execute(
        &self,
        parsed: &rigkit::wire::ParsedCommand,
    ) -> Result<Vec<String>> {
        let mut rig = self.rig.lock().await;

        // Transparent reopen after an idle close.
        if rig.phase() == Phase::Closed {
            debug!("reopening idle-closed device");
            rig.open().await?;
        }

        match session::dispatch_command(&mut rig, parsed, &self.settings).await {
            Err(e) if e.is_hard() => {
                warn!(error = %e, "hard dispatch error, entering reopen cycle");
                self.reopen_and_retry(&mut rig, parsed, e).await
            }
            other => other,
        }
    }

    /// Close/reopen up to the configured retry count; after the first
    /// successful reopen the original command is retried exactly once
    /// and its result returned.
    async fn reopen_and_retry(
        &self,
        rig: &mut Rig,
        parsed: &rigkit::wire::ParsedCommand,
        original: Error,
    ) -> Result<Vec<String>> {
        for attempt in 1..=self.settings.reopen_retries {
            if rig.phase() == Phase::Opened {
                if let Err(e) = rig.close().await {
                    warn!(error = %e, "close during reopen cycle failed");
                }
            }
            tokio::time::sleep(self.settings.reopen_backoff).await;

            match rig.open().await {
                Ok(()) => {
                    info!(attempt, "device reopened, retrying command once");
                    return session::dispatch_command(rig, parsed, &self.settings).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reopen attempt failed");
                }
            }
        }
        Err(original)
    }
}

/// The accept loop(s) of the daemon.
pub struct Server {
    listeners: Vec<TcpListener>,
    shared: Arc<SharedRig>,
}

impl Server {
    /// Bind every address in `addrs` (dual-stack setups pass one v4 and
    /// one v6 address). Fails if any bind fails.
    pub async fn bind(addrs: &[String], shared: Arc<SharedRig>) -> Result<Self> {
        let mut listeners = Vec::new();
        for addr in addrs {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| Error::Io(format!("bind {addr}: {e}")))?;
            info!(addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(), "listening");
            listeners.push(listener);
        }
        if listeners.is_empty() {
            return Err(Error::InvalidArgument("no listen addresses".into()));
        }
        Ok(Server { listeners, shared })
    }

    /// Local addresses actually bound (useful with port 0).
    pub fn local_addrs(&self) -> Vec<std::net::SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }

    /// Accept connections until cancelled. Each accepted connection gets
    /// a detached task whose resources are reclaimed on exit.
    pub async fn run(self, cancel: CancellationToken) {
        let mut accept_tasks = Vec::new();
        for listener in self.listeners {
            let shared = self.shared.clone();
            let cancel = cancel.clone();
            accept_tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        accepted = listener.accept() => match accepted {
                            Ok((stream, peer)) => {
                                debug!(%peer, "client connected");
                                let shared = shared.clone();
                                tokio::spawn(session::run(stream, peer, shared));
                            }
                            Err(e) => {
                                warn!(error = %e, "accept failed");
                            }
                        },
                    }
                }
            }));
        }
        for task in accept_tasks {
            let _ = task.await;
        }
    }
}
