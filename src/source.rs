// src/source.rs

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::FetchError;
use crate::model::{RawPayload, Ticker};

/// One upstream API able to return data for a single ticker.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Key used for rate limiting and logging.
    fn source_id(&self) -> &str;

    async fn fetch(&self, ticker: &Ticker) -> Result<RawPayload, FetchError>;
}

/// Adapts a closure into a [`SourceClient`].
pub struct FnSource<F> {
    source_id: String,
    fetch: F,
}

impl<F> FnSource<F>
where
    F: Fn(Ticker) -> BoxFuture<'static, Result<RawPayload, FetchError>> + Send + Sync,
{
    pub fn new(source_id: impl Into<String>, fetch: F) -> Self {
        FnSource {
            source_id: source_id.into(),
            fetch,
        }
    }
}

#[async_trait]
impl<F> SourceClient for FnSource<F>
where
    F: Fn(Ticker) -> BoxFuture<'static, Result<RawPayload, FetchError>> + Send + Sync,
{
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch(&self, ticker: &Ticker) -> Result<RawPayload, FetchError> {
        (self.fetch)(ticker.clone()).await
    }
}
