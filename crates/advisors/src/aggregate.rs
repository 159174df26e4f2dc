//! Stream aggregation for advisors that need the whole response.
//!
//! [`aggregate`] re-emits every fragment unchanged and in order while folding
//! them into a [`ChatResponse`]. The completion callback runs exactly once,
//! after the final fragment has been pulled. It does not run if the stream
//! fails or if the consumer drops the stream before the end. A callback
//! error is yielded as the stream's last item.

use std::future::Future;

use futures::StreamExt;
use spindle_core::Result;
use spindle_core::error::ProviderError;
use spindle_core::provider::ChunkStream;
use spindle_core::request::{ChatRequest, ChatResponse, FragmentAggregator};

/// Wrap `stream` so that `on_complete` receives the aggregated response.
///
/// `request` supplies the model name and the advisor context carried into
/// the aggregated response.
pub fn aggregate<F, Fut>(request: &ChatRequest, stream: ChunkStream, on_complete: F) -> ChunkStream
where
    F: FnOnce(ChatResponse) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let model = request.options.model.clone().unwrap_or_default();
    let context = request.context.clone();

    Box::pin(async_stream::stream! {
        let mut upstream = stream;
        let mut aggregator = FragmentAggregator::new(model);
        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    aggregator.push(&chunk);
                    yield Ok(chunk);
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Err(e) = on_complete(aggregator.finish(context)).await {
            yield Err(ProviderError::Completion(e.to_string()));
        }
    })
}
