//! Newline-delimited JSON consumer.
//!
//! Each non-blank line is one crawled record:
//!
//! ```json
//! {"url": "https://example.com/", "content": "<html>...", "metadata": {"parse.title": ["Home"]}}
//! ```

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::messages::StreamMessage;
use crate::errors::PipelineError;
use crawl_indexer_shared::{Metadata, Record};

/// Wire shape of one line.
#[derive(Debug, Deserialize)]
struct RecordLine {
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

/// Consumer reading one JSON record per line from an async reader.
pub struct JsonLinesConsumer<R> {
    reader: R,
    source: String,
}

impl<R> JsonLinesConsumer<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Create a consumer over `reader`; `source` names it in logs.
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader,
            source: source.into(),
        }
    }

    /// Parse one line into a record.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The line is blank
    /// * `Ok(Some(Record))` - A record with a non-empty url
    /// * `Err(PipelineError::ParseError)` - Malformed JSON
    /// * `Err(PipelineError::InvalidRecord)` - The url is empty
    pub fn parse_line(line: &str) -> Result<Option<Record>, PipelineError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let parsed: RecordLine = serde_json::from_str(line)
            .map_err(|e| PipelineError::parse(format!("Malformed record line: {}", e)))?;

        if parsed.url.trim().is_empty() {
            return Err(PipelineError::invalid_record("record line has an empty url"));
        }

        let record = match parsed.content {
            Some(content) => Record::new(parsed.url, content, parsed.metadata),
            None => Record::empty(parsed.url, parsed.metadata),
        };
        Ok(Some(record))
    }

    /// Read lines until the reader is exhausted or shutdown is signalled.
    ///
    /// Always ends by sending [`StreamMessage::End`], unless the receiver is gone.
    ///
    /// # Arguments
    ///
    /// * `sender` - Channel to send messages to
    /// * `shutdown` - Shutdown signal receiver
    #[instrument(skip(self, sender, shutdown), fields(source = %self.source))]
    pub async fn run(
        self,
        sender: mpsc::Sender<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        let mut lines = LinesStream::new(self.reader.lines());
        let mut line_number: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    break;
                }
                line = lines.next() => {
                    match line {
                        Some(Ok(line)) => {
                            line_number += 1;
                            let message = match Self::parse_line(&line) {
                                Ok(Some(record)) => {
                                    debug!(line = line_number, url = %record.url, "Read record");
                                    StreamMessage::Record(record)
                                }
                                Ok(None) => continue,
                                Err(e) => {
                                    warn!(line = line_number, error = %e, "Skipping unreadable line");
                                    StreamMessage::Error(format!("line {}: {}", line_number, e))
                                }
                            };

                            if sender.send(message).await.is_err() {
                                warn!("Receiver dropped, stopping consumer");
                                return Ok(());
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Failed to read from source");
                            let _ = sender.send(StreamMessage::End).await;
                            return Err(PipelineError::consumer(e.to_string()));
                        }
                        None => {
                            info!(lines = line_number, "Source exhausted");
                            break;
                        }
                    }
                }
            }
        }

        let _ = sender.send(StreamMessage::End).await;
        Ok(())
    }
}
