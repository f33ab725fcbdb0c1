//! Handler registration surface.

use std::error::Error as StdError;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::event::FileEvent;

/// Error returned by a handler. Logged by the dispatch loop, never propagated.
pub type HandlerError = Box<dyn StdError + Send + Sync>;

/// Receives dispatched file events
#[async_trait]
pub trait FileEventHandler: Send + Sync {
    async fn handle(&self, event: &FileEvent) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into a [`FileEventHandler`].
pub struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> FileEventHandler for FnHandler<F, Fut>
where
    F: Fn(FileEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, event: &FileEvent) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn FileEventHandler>
where
    F: Fn(FileEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler {
        f,
        _marker: PhantomData,
    })
}
