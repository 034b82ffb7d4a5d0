use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::providers::vertex::claude_types::extract_replies;
use crate::{Error, GenerationRequest, Progress, StreamSummary};

/// The call surface a chat framework drives.
///
/// Each call is independent; cancelling `cancel` ends it with [`Error::Aborted`].
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stream a response. `on_progress` receives text and fragments in arrival
    /// order, then exactly one [`Progress::Done`] when the call succeeds.
    async fn stream(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<StreamSummary, Error>;

    /// Single-shot call returning the whole response document.
    async fn complete(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, Error>;

    /// Reply text of every candidate in a single-shot response.
    fn parse_replies(&self, response: &Value) -> Result<Vec<String>, Error> {
        extract_replies(response)
    }
}
