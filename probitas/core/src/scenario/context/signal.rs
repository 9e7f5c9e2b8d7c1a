use std::{future, sync::Arc};

use tokio::sync::watch;

/// Cancellation token handed to every record through its context.
#[derive(Clone, Debug)]
pub struct Signal {
    receiver: watch::Receiver<bool>,
}

/// Owner side of a [`Signal`].
#[derive(Clone, Debug)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Creates a connected handle/signal pair.
#[must_use]
pub fn cancellation() -> (CancelHandle, Signal) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle {
            sender: Arc::new(sender),
        },
        Signal { receiver },
    )
}

impl Signal {
    /// A signal that never fires, for contexts built outside a runner.
    #[must_use]
    pub fn never() -> Self {
        let (_handle, signal) = cancellation();
        signal
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            future::pending::<()>().await;
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    #[must_use]
    pub fn signal(&self) -> Signal {
        Signal {
            receiver: self.sender.subscribe(),
        }
    }
}
