//! A coalescing wake-up channel: repeated [`Sender::send`] calls before the
//! receiver polls only wake it once, so a burst of cache invalidations
//! doesn't queue up duplicate scheduler runs.
//!
//! Thin sugar over [`tokio::sync::mpsc::channel(1)`]: `send` never blocks
//! and never errors, and `recv` never resolves once every `Sender` has been
//! dropped (a dropped-channel wakeup would otherwise loop the caller).

use tokio::sync::mpsc;

pub fn channel() -> (Sender, Receiver) {
    let (tx, rx) = mpsc::channel(1);
    (Sender(tx), Receiver(rx))
}

#[derive(Clone)]
pub struct Sender(mpsc::Sender<()>);

pub struct Receiver(mpsc::Receiver<()>);

impl Sender {
    /// Wakes the receiver. Dropped or full (already-pending) sends are not
    /// errors — the receiver either already saw the signal or will next
    /// time it polls.
    pub fn send(&self) {
        let _ = self.0.try_send(());
    }
}

impl Receiver {
    /// Waits for a wake-up. If every [`Sender`] has been dropped this never
    /// resolves, so callers should always race it against a shutdown signal.
    pub async fn recv(&mut self) {
        match self.0.recv().await {
            Some(()) => (),
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn coalesces_bursts_into_one_wakeup() {
        let (tx, mut rx) = channel();
        tx.send();
        tx.send();
        tx.send();
        rx.recv().await;
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn recv_never_resolves_after_every_sender_drops() {
        let (tx, mut rx) = channel();
        drop(tx);
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv())
            .await
            .is_err());
    }
}
