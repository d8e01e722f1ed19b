// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed access to logs through a codec.
//
// `CodecAppender` encodes messages into records tagged with the codec name;
// `CodecTailer` checks the tag and decodes. Records without a tag predate
// tagging and are decoded as-is.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use tributary_codec::Codec;

use crate::error::{LogError, LogResult};
use crate::manager::{LogAppender, LogTailer};
use crate::name::Name;
use crate::offset::{LogOffset, LogPartition, LogRecord};
use crate::record::Record;

/// Record header carrying the name of the codec that produced the payload.
pub const CODEC_HEADER: &str = "codec";

/// A decoded message with the key it was appended under.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<T> {
    pub key: String,
    pub watermark: i64,
    pub value: T,
}

/// Appends typed messages through a codec.
pub struct CodecAppender<T: Send + Sync> {
    inner: Arc<dyn LogAppender>,
    codec: Arc<dyn Codec<T>>,
}

impl<T: Send + Sync> CodecAppender<T> {
    pub fn new(inner: Arc<dyn LogAppender>, codec: Arc<dyn Codec<T>>) -> Self {
        Self { inner, codec }
    }

    pub fn name(&self) -> &Name {
        self.inner.name()
    }

    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }

    /// The untyped appender underneath.
    pub fn inner(&self) -> &Arc<dyn LogAppender> {
        &self.inner
    }

    pub async fn append(&self, key: &str, message: &T) -> LogResult<LogOffset> {
        let record = self.encode(key, message).await?;
        self.inner.append(key, record).await
    }

    pub async fn append_to(&self, partition: u32, key: &str, message: &T) -> LogResult<LogOffset> {
        let record = self.encode(key, message).await?;
        self.inner.append_to(partition, record).await
    }

    pub async fn wait_for(&self, offset: &LogOffset, group: &Name, timeout: Duration) -> LogResult<bool> {
        self.inner.wait_for(offset, group, timeout).await
    }

    async fn encode(&self, key: &str, message: &T) -> LogResult<Record> {
        let data = self.codec.encode(message).await?;
        Ok(Record::of(key, data).header(CODEC_HEADER, self.codec.name()))
    }
}

/// Reads typed messages through a codec.
///
/// A record that fails the codec tag check or decoding is still consumed:
/// the position moves past it and the next commit persists that. Callers
/// that would rather retry it seek back to [`CodecTailer::rejected`].
pub struct CodecTailer<T: Send + Sync> {
    inner: Box<dyn LogTailer>,
    codec: Arc<dyn Codec<T>>,
    rejected: Option<LogOffset>,
}

impl<T: Send + Sync> CodecTailer<T> {
    pub fn new(inner: Box<dyn LogTailer>, codec: Arc<dyn Codec<T>>) -> Self {
        Self {
            inner,
            codec,
            rejected: None,
        }
    }

    /// Offset of the record the last read failed on, if it failed.
    pub fn rejected(&self) -> Option<&LogOffset> {
        self.rejected.as_ref()
    }

    pub fn group(&self) -> &Name {
        self.inner.group()
    }

    pub fn assignments(&self) -> &[LogPartition] {
        self.inner.assignments()
    }

    pub fn closed(&self) -> bool {
        self.inner.closed()
    }

    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }

    /// The next decoded message, or `None` on timeout.
    pub async fn read(&mut self, timeout: Duration) -> LogResult<Option<LogRecord<T>>> {
        Ok(self.read_keyed(timeout).await?.map(|record| record.map(|keyed| keyed.value)))
    }

    /// The next decoded message together with its key and watermark.
    ///
    /// On a codec mismatch or decode error the record is skipped, as
    /// described on [`CodecTailer`].
    pub async fn read_keyed(&mut self, timeout: Duration) -> LogResult<Option<LogRecord<Keyed<T>>>> {
        self.rejected = None;
        let Some(record) = self.inner.read(timeout).await? else {
            return Ok(None);
        };
        let LogRecord { message, offset } = record;
        let value = match self.decode(&message, &offset).await {
            Ok(value) => value,
            Err(error) => {
                self.rejected = Some(offset);
                return Err(error);
            }
        };
        Ok(Some(LogRecord::new(
            Keyed {
                key: message.key,
                watermark: message.watermark,
                value,
            },
            offset,
        )))
    }

    async fn decode(&self, record: &Record, offset: &LogOffset) -> LogResult<T> {
        self.check_codec(record, offset)?;
        Ok(self.codec.decode(&record.data).await?)
    }

    fn check_codec(&self, record: &Record, offset: &LogOffset) -> LogResult<()> {
        let Some(tag) = record.get_header(CODEC_HEADER) else {
            return Ok(());
        };
        let actual = String::from_utf8_lossy(tag);
        if actual != self.codec.name() {
            warn!(
                offset = %offset,
                expected = self.codec.name(),
                actual = %actual,
                "Record was written with a different codec"
            );
            return Err(LogError::CodecMismatch {
                expected: self.codec.name().to_string(),
                actual: actual.into_owned(),
            });
        }
        Ok(())
    }

    pub async fn commit(&mut self) -> LogResult<Vec<LogOffset>> {
        self.inner.commit().await
    }

    pub async fn commit_partition(&mut self, partition: &LogPartition) -> LogResult<Option<LogOffset>> {
        self.inner.commit_partition(partition).await
    }

    pub async fn to_start(&mut self) -> LogResult<()> {
        self.inner.to_start().await
    }

    pub async fn to_end(&mut self) -> LogResult<()> {
        self.inner.to_end().await
    }

    pub async fn to_last_committed(&mut self) -> LogResult<()> {
        self.inner.to_last_committed().await
    }

    pub async fn seek(&mut self, offset: &LogOffset) -> LogResult<()> {
        self.inner.seek(offset).await
    }

    pub async fn reset(&mut self) -> LogResult<()> {
        self.inner.reset().await
    }

    pub async fn seek_to_timestamp(&mut self, timestamp_ms: i64) -> LogResult<()> {
        self.inner.seek_to_timestamp(timestamp_ms).await
    }

    pub async fn close(&mut self) -> LogResult<()> {
        self.inner.close().await
    }

    /// The untyped tailer underneath.
    pub fn into_inner(self) -> Box<dyn LogTailer> {
        self.inner
    }
}
