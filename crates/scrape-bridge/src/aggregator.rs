//! Stream aggregation for a running worker.
//!
//! stdout is buffered in arrival order for the translator. stderr is routed
//! to the log and never reaches the caller.

use std::process::ExitStatus;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, BytesCodec, FramedRead};
use uuid::Uuid;

use crate::worker::WorkerHandle;

/// Everything a terminated worker left behind.
#[derive(Debug)]
pub struct CollectedOutput {
    pub status: ExitStatus,
    pub primary: Vec<u8>,
}

/// Drain both channels and wait for exit.
///
/// Resolves once stdout and stderr hit EOF and the process has exited.
/// The buffer is unbounded.
pub async fn collect(handle: &mut WorkerHandle) -> std::io::Result<CollectedOutput> {
    let invocation_id = handle.invocation_id();
    let stdout = handle.take_stdout();
    let stderr = handle.take_stderr();

    let primary = async move {
        match stdout {
            Some(s) => read_primary(s).await,
            None => Ok(Vec::new()),
        }
    };
    let diagnostics = async move {
        if let Some(s) = stderr {
            forward_diagnostics(invocation_id, s).await;
        }
    };

    let (primary, (), status) = tokio::join!(primary, diagnostics, handle.wait());
    let status = status?;
    let primary = primary?;

    tracing::debug!(
        %invocation_id,
        code = ?status.code(),
        bytes = primary.len(),
        "Worker exited"
    );

    Ok(CollectedOutput { status, primary })
}

async fn read_primary<R>(reader: R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, BytesCodec::new());
    let mut buffer = Vec::new();
    while let Some(chunk) = frames.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer)
}

async fn forward_diagnostics<R>(invocation_id: Uuid, reader: R)
where
    R: AsyncRead + Unpin,
{
    let result = for_each_line(reader, |line| {
        tracing::info!(target: "scrape_bridge::worker", %invocation_id, "{}", line);
    })
    .await;

    if let Err(e) = result {
        tracing::warn!(%invocation_id, error = %e, "Worker stderr read failed");
    }
}

/// Call `on_line` for every non-blank line, however the bytes were chunked.
///
/// Lines are framed on `\n` before decoding, so a character split across
/// reads is decoded whole. Invalid UTF-8 is replaced, not rejected. A final
/// line without a newline is still delivered at EOF.
async fn for_each_line<R, F>(reader: R, mut on_line: F) -> Result<(), AnyDelimiterCodecError>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let codec = AnyDelimiterCodec::new(b"\n".to_vec(), Vec::new());
    let mut frames = FramedRead::new(reader, codec);
    while let Some(frame) = frames.next().await {
        let bytes = frame?;
        let text = String::from_utf8_lossy(&bytes);
        let line = text.trim_end();
        if !line.is_empty() {
            on_line(line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn primary_preserves_chunk_order() {
        let (mut tx, rx) = tokio::io::duplex(8);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let parts: [&[u8]; 3] = [b"{\"a\":", b"[1,2,", b"3]}"];
            for part in parts {
                tx.write_all(part).await.unwrap();
            }
        });

        let buffer = read_primary(rx).await.unwrap();
        writer.await.unwrap();
        assert_eq!(buffer, br#"{"a":[1,2,3]}"#);
    }

    async fn lines_of(parts: &[&[u8]]) -> Vec<String> {
        let parts: Vec<Vec<u8>> = parts.iter().map(|p| p.to_vec()).collect();
        let (mut tx, rx) = tokio::io::duplex(4);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for part in parts {
                tx.write_all(&part).await.unwrap();
                tx.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let mut lines = Vec::new();
        for_each_line(rx, |line| lines.push(line.to_string()))
            .await
            .unwrap();
        writer.await.unwrap();
        lines
    }

    #[tokio::test]
    async fn diagnostics_tolerate_invalid_utf8() {
        let input: &[u8] = b"loading\n\xff\xfe partial\n";
        forward_diagnostics(Uuid::new_v4(), input).await;

        let lines = lines_of(&[input]).await;
        assert_eq!(lines, ["loading", "\u{FFFD}\u{FFFD} partial"]);
    }

    #[tokio::test]
    async fn diagnostics_reassemble_lines_split_across_reads() {
        // "é" is 0xC3 0xA9; the split lands between its two bytes.
        let parts: [&[u8]; 4] = [
            b"Loading web",
            b"page...\r\nfound caf\xC3",
            b"\xA9 menu\n\n",
            b"no trailing newline",
        ];
        let lines = lines_of(&parts).await;

        assert_eq!(
            lines,
            ["Loading webpage...", "found café menu", "no trailing newline"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collect_separates_channels() {
        use crate::config::WorkerCommand;
        use crate::request::ScrapeRequest;
        use crate::worker::{CommandSpawner, WorkerSpawner};

        let spawner = CommandSpawner::new(WorkerCommand::new("sh").with_args([
            "-c",
            "echo 'Loading webpage...' >&2; printf '[1,'; printf '2]'; exit 7",
            "worker",
        ]));
        let mut handle = spawner
            .spawn(Uuid::new_v4(), &ScrapeRequest::new("u", "q"))
            .unwrap();

        let out = collect(&mut handle).await.unwrap();
        assert_eq!(out.primary, b"[1,2]");
        assert_eq!(out.status.code(), Some(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collect_handles_large_output() {
        use crate::config::WorkerCommand;
        use crate::request::ScrapeRequest;
        use crate::worker::{CommandSpawner, WorkerSpawner};

        // Larger than a pipe buffer, so stdout must be drained while waiting.
        let spawner = CommandSpawner::new(WorkerCommand::new("sh").with_args([
            "-c",
            "head -c 200000 /dev/zero | tr '\\0' 'a'",
            "worker",
        ]));
        let mut handle = spawner
            .spawn(Uuid::new_v4(), &ScrapeRequest::new("u", "q"))
            .unwrap();

        let out = collect(&mut handle).await.unwrap();
        assert_eq!(out.primary.len(), 200_000);
        assert!(out.status.success());
    }
}
