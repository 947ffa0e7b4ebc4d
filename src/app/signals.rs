//! Termination request sources.
//!
//! A [`TerminationSource`] is the single consumer of termination requests for
//! the process. Requests travel over a channel of capacity 1: a request sent
//! before anyone listens is kept, anything beyond the first pending request is
//! dropped.

use super::ShutdownReason;
use crate::error::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const REQUEST_CAPACITY: usize = 1;

/// Producer side of a manual termination source
#[derive(Debug, Clone)]
pub struct TerminationSender {
    sender: mpsc::Sender<ShutdownReason>,
}

impl TerminationSender {
    /// Request termination; returns false when the request was dropped
    pub fn request(&self, reason: ShutdownReason) -> bool {
        forward(&self.sender, reason)
    }
}

/// Consumer side of termination requests plus the listeners feeding it
pub struct TerminationSource {
    receiver: mpsc::Receiver<ShutdownReason>,
    listeners: Vec<JoinHandle<()>>,
}

impl TerminationSource {
    /// Register SIGINT and SIGTERM listeners for this process
    pub fn os_signals() -> Result<Self> {
        let (sender, receiver) = mpsc::channel(REQUEST_CAPACITY);

        #[cfg(unix)]
        let listeners = {
            use tokio::signal::unix::{signal, SignalKind};

            [
                (SignalKind::interrupt(), "SIGINT"),
                (SignalKind::terminate(), "SIGTERM"),
            ]
            .into_iter()
            .map(move |(kind, name)| -> Result<JoinHandle<()>> {
                let mut stream = signal(kind)?;
                let sender = sender.clone();
                Ok(tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        info!("Received {} signal", name);
                        forward(&sender, ShutdownReason::Signal(name.to_string()));
                    }
                }))
            })
        };

        #[cfg(not(unix))]
        let listeners = std::iter::once(Ok(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C");
                forward(&sender, ShutdownReason::Signal("SIGINT".to_string()));
            }
        })));

        let source = Self::with_listeners(receiver, listeners)?;
        debug!(
            "Registered {} termination signal listeners",
            source.listeners.len()
        );
        Ok(source)
    }

    /// Collect listeners one at a time; a failed registration aborts the
    /// listeners already running
    pub(super) fn with_listeners<I>(
        receiver: mpsc::Receiver<ShutdownReason>,
        listeners: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Result<JoinHandle<()>>>,
    {
        let mut source = Self {
            receiver,
            listeners: Vec::new(),
        };
        for listener in listeners {
            source.listeners.push(listener?);
        }
        Ok(source)
    }

    /// Source fed only through the returned sender
    pub fn manual() -> (Self, TerminationSender) {
        let (sender, receiver) = mpsc::channel(REQUEST_CAPACITY);
        (
            Self {
                receiver,
                listeners: Vec::new(),
            },
            TerminationSender { sender },
        )
    }

    /// Wait for the next request; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<ShutdownReason> {
        self.receiver.recv().await
    }

    /// Stop listening: abort signal listeners and refuse further requests
    pub fn deregister(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        self.receiver.close();
        debug!("Termination listeners deregistered");
    }
}

impl Drop for TerminationSource {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

fn forward(sender: &mpsc::Sender<ShutdownReason>, reason: ShutdownReason) -> bool {
    match sender.try_send(reason) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(reason)) => {
            debug!("Termination already pending, ignoring {}", reason);
            false
        }
        Err(mpsc::error::TrySendError::Closed(reason)) => {
            debug!("Shutdown already handled, ignoring {}", reason);
            false
        }
    }
}
