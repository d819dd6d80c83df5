//! Line-oriented stream driver.
//!
//! Reads a dump line by line, hands each line to the [`Rewriter`] and writes
//! the results. The order of the output depends on the [`ProcessingMode`]:
//!
//! - `sequential` and `ordered` write lines in input order.
//! - `unordered` writes each line as soon as it is masked, so lines of the
//!   output may appear in a different order than in the input.
//!
//! The parallel modes never hold more than `workers` lines in flight.

use std::sync::Arc;

use dumpmask_core::{MaskSettings, ProcessingMode};
use futures::stream::{self, Stream, TryStreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::MaskError;
use crate::rewriter::{LineOutput, Rewriter};
use crate::rules::MaskingRules;

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Lines written to the output.
    pub lines_written: u64,
    /// Lines that produced no output.
    pub lines_dropped: u64,
    /// Lines whose statement was masked.
    pub lines_masked: u64,
}

impl StreamStats {
    /// Lines consumed from the input.
    pub fn lines_read(&self) -> u64 {
        self.lines_written + self.lines_dropped
    }

    fn record(&mut self, output: &LineOutput) {
        if output.bytes.is_some() {
            self.lines_written += 1;
        } else {
            self.lines_dropped += 1;
        }
        if output.masked {
            self.lines_masked += 1;
        }
    }
}

/// Drives a dump through the rewriter.
pub struct StreamDriver {
    rewriter: Arc<Rewriter>,
    settings: MaskSettings,
}

impl StreamDriver {
    pub fn new(rules: Arc<MaskingRules>, settings: MaskSettings) -> Result<Self, MaskError> {
        settings.validate()?;
        Ok(Self {
            rewriter: Arc::new(Rewriter::new(rules)),
            settings,
        })
    }

    /// Mask every line of `reader` into `writer` until end of input.
    ///
    /// Stops at the first fatal error (oversized line, I/O failure, hashing
    /// failure); output written before the error is flushed.
    pub async fn run<R, W>(&self, reader: R, writer: W) -> Result<StreamStats, MaskError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            mode = %self.settings.mode,
            ordered = self.settings.mode.preserves_order(),
            workers = self.settings.workers,
            max_line_bytes = self.settings.max_line_bytes,
            "Masking stream"
        );

        let mut writer = BufWriter::new(writer);
        let mut stats = StreamStats::default();
        let lines = read_lines(reader, self.settings.max_line_bytes);

        let result = match self.settings.mode {
            ProcessingMode::Sequential => {
                let mut lines = std::pin::pin!(lines);
                self.run_sequential(&mut lines, &mut writer, &mut stats)
                    .await
            }
            ProcessingMode::Ordered => {
                let outputs = std::pin::pin!(self
                    .dispatch(lines)
                    .try_buffered(self.settings.workers));
                drain(outputs, &mut writer, &mut stats).await
            }
            ProcessingMode::Unordered => {
                let outputs = std::pin::pin!(self
                    .dispatch(lines)
                    .try_buffer_unordered(self.settings.workers));
                drain(outputs, &mut writer, &mut stats).await
            }
        };

        writer.flush().await?;
        result.map(|()| stats)
    }

    async fn run_sequential<S, W>(
        &self,
        lines: &mut S,
        writer: &mut W,
        stats: &mut StreamStats,
    ) -> Result<(), MaskError>
    where
        S: Stream<Item = Result<Vec<u8>, MaskError>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(line) = lines.try_next().await? {
            let output = self.rewriter.rewrite_bytes(line)?;
            emit(writer, output, stats).await?;
        }
        Ok(())
    }

    /// Turn each line into a masking job on the blocking pool.
    fn dispatch<S>(
        &self,
        lines: S,
    ) -> impl Stream<
        Item = Result<
            impl std::future::Future<Output = Result<LineOutput, MaskError>>,
            MaskError,
        >,
    >
    where
        S: Stream<Item = Result<Vec<u8>, MaskError>>,
    {
        let rewriter = Arc::clone(&self.rewriter);
        lines.map_ok(move |line| {
            let rewriter = Arc::clone(&rewriter);
            async move {
                let output =
                    tokio::task::spawn_blocking(move || rewriter.rewrite_bytes(line)).await??;
                Ok::<_, MaskError>(output)
            }
        })
    }
}

async fn drain<S, W>(mut outputs: S, writer: &mut W, stats: &mut StreamStats) -> Result<(), MaskError>
where
    S: Stream<Item = Result<LineOutput, MaskError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(output) = outputs.try_next().await? {
        emit(writer, output, stats).await?;
    }
    Ok(())
}

async fn emit<W>(writer: &mut W, output: LineOutput, stats: &mut StreamStats) -> Result<(), MaskError>
where
    W: AsyncWrite + Unpin,
{
    stats.record(&output);
    if let Some(mut bytes) = output.bytes {
        bytes.push(b'\n');
        writer.write_all(&bytes).await?;
    }
    Ok(())
}

/// Split `reader` into lines without their `\n` (or `\r\n`) terminator.
///
/// A line longer than `max_bytes` ends the stream with
/// [`MaskError::LineTooLong`].
fn read_lines<R>(reader: R, max_bytes: usize) -> impl Stream<Item = Result<Vec<u8>, MaskError>>
where
    R: AsyncBufRead + Unpin,
{
    stream::try_unfold((reader, 0u64), move |(reader, line_no)| {
        next_line(reader, line_no, max_bytes)
    })
}

async fn next_line<R>(
    mut reader: R,
    line_no: u64,
    max_bytes: usize,
) -> Result<Option<(Vec<u8>, (R, u64))>, MaskError>
where
    R: AsyncBufRead + Unpin,
{
    // The ceiling applies to the content; room is left for a `\r\n`
    // terminator plus one byte to tell an oversized line from one that fits.
    let limit = (max_bytes as u64).saturating_add(2);
    let mut line = Vec::new();
    let read = (&mut reader)
        .take(limit)
        .read_until(b'\n', &mut line)
        .await?;
    if read == 0 {
        return Ok(None);
    }

    let line_no = line_no + 1;
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    if line.len() > max_bytes {
        return Err(MaskError::LineTooLong {
            line: line_no,
            max_bytes,
        });
    }

    Ok(Some((line, (reader, line_no))))
}
