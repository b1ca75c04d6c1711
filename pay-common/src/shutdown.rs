//! `ShutdownChannel`: cloneable, resubscribable after it already fired.
//! §5 requires every suspending core operation accept a cancellation
//! signal; this is that signal, threaded through `Monitor` (C6) and the
//! HTTP server's graceful-shutdown future alike.

use std::sync::Arc;

use tokio::sync::Semaphore;

#[derive(Clone, Debug)]
pub struct ShutdownChannel {
    inner: Arc<Semaphore>,
}

impl ShutdownChannel {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn send(&self) {
        self.inner.close();
    }

    pub async fn recv(&self) {
        self.inner
            .acquire()
            .await
            .map_err(|_| ())
            .expect_err("a closed semaphore never grants a permit");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_and_stays_fired_for_later_clones() {
        let first = ShutdownChannel::new();
        first.send();
        first.send(); // repeated sends do not panic

        time::timeout(Duration::from_nanos(1), first.recv())
            .await
            .expect("did not resolve immediately");

        let late_subscriber = first.clone();
        assert!(late_subscriber.is_shutdown());
        time::timeout(Duration::from_nanos(1), late_subscriber.recv())
            .await
            .expect("late clone did not resolve immediately");
    }
}
