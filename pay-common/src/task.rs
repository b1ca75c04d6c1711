//! A thin wrapper around [`tokio::task::JoinHandle`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::{JoinError, JoinHandle};

/// Wraps [`tokio::task::JoinHandle`] with the `#[must_use]` lint, so every
/// spawned task is either joined or explicitly dropped on purpose. Recurring
/// jobs and ad-hoc job workers are both spawned as [`PayTask`]s by the
/// scheduler (C6).
#[must_use]
pub struct PayTask<T>(JoinHandle<T>, &'static str);

impl<T: Send + 'static> PayTask<T> {
    #[allow(clippy::disallowed_methods)]
    pub fn spawn_named<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self(tokio::spawn(future), name)
    }

    pub fn name(&self) -> &'static str {
        self.1
    }
}

impl<T> Future for PayTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}
