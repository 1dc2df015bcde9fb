// Shutdown signal shared between main and the relay loop.
//
// A watch channel carrying `true` once shutdown was requested. Every
// suspension point in the relay races its work against `Shutdown::wait`.

use tokio::sync::watch;

/// Sending half, held by whoever decides to stop (Ctrl-C handler, tests).
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, observed by the relay.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // No receivers left means nobody is running to stop.
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// A signal that never fires, for one-shot commands.
    pub fn never() -> Self {
        let (_trigger, shutdown) = channel();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested. If the trigger is dropped
    /// without firing, this never resolves.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
