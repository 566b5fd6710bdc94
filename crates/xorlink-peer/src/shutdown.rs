use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;
use xorlink_transport::ListenerCloser;

/// Stops a [`PeerListener`](crate::PeerListener) from any thread.
///
/// Triggering closes the listening socket so a blocked accept returns.
/// Connections that were already handed to their own threads keep running
/// until their peers disconnect.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    triggered: AtomicBool,
    closer: ListenerCloser,
}

impl ShutdownHandle {
    pub(crate) fn new(closer: ListenerCloser) -> Self {
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                closer,
            }),
        }
    }

    /// Request shutdown. Only the first call has any effect.
    pub fn trigger(&self) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutdown requested; closing listener");
        self.inner.closer.close();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }
}
