//! Record sources for rivven-bulk
//!
//! A load pulls records one at a time from a [`RecordSource`]. Two adapters
//! cover the common cases:
//! - [`IterSource`]: any in-memory iterator
//! - [`StreamSource`]: any `futures` stream of `Result<T>`
//!
//! Sources are single-pass. The writer calls [`RecordSource::close`] exactly
//! once when the load ends, whatever the outcome.

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::error::Result;

/// Forward-only source of records
#[async_trait]
pub trait RecordSource<T: Send>: Send {
    /// Next record, or `None` once the source is exhausted
    async fn next_record(&mut self) -> Result<Option<T>>;

    /// Release resources held by the source
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Source over an in-memory iterator
#[derive(Debug)]
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I> {
    /// Wrap an iterator
    pub fn new<C>(records: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: records.into_iter(),
        }
    }
}

#[async_trait]
impl<T, I> RecordSource<T> for IterSource<I>
where
    T: Send,
    I: Iterator<Item = T> + Send,
{
    async fn next_record(&mut self) -> Result<Option<T>> {
        Ok(self.iter.next())
    }
}

/// Source over an asynchronous stream
pub struct StreamSource<S> {
    stream: S,
    done: bool,
}

impl<S> StreamSource<S> {
    /// Wrap a stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            done: false,
        }
    }
}

#[async_trait]
impl<T, S> RecordSource<T> for StreamSource<S>
where
    T: Send,
    S: Stream<Item = Result<T>> + Send + Unpin,
{
    async fn next_record(&mut self) -> Result<Option<T>> {
        if self.done {
            return Ok(None);
        }
        match self.stream.next().await {
            Some(item) => item.map(Some),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

impl<S> std::fmt::Debug for StreamSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures::stream;

    #[tokio::test]
    async fn test_iter_source_drains_in_order() {
        let mut source = IterSource::new(vec![1, 2, 3]);
        let mut seen = Vec::new();
        while let Some(n) = source.next_record().await.unwrap() {
            seen.push(n);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(source.next_record().await.unwrap().is_none());
        source.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_source_propagates_errors() {
        let items = vec![Ok(1), Err(Error::query("read failed")), Ok(3)];
        let mut source = StreamSource::new(stream::iter(items));

        assert_eq!(source.next_record().await.unwrap(), Some(1));
        assert!(source.next_record().await.is_err());
        assert_eq!(source.next_record().await.unwrap(), Some(3));
        assert!(source.next_record().await.unwrap().is_none());
        assert!(source.next_record().await.unwrap().is_none());
    }
}
