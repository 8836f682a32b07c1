//! JSON-lines input backend
//!
//! Reads one [`InputEvent`] per line from standard input. Blank lines and
//! lines starting with `#` are skipped. Events without a timestamp are
//! stamped with the time since the backend started.

use std::time::Instant;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::input::{InputBackend, InputEvent};

/// Backend reading scripted events from stdin
#[derive(Debug, Default)]
pub struct StdinBackend {
    started: bool,
}

impl StdinBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputBackend for StdinBackend {
    fn start(&mut self, tx: mpsc::UnboundedSender<InputEvent>) -> Result<()> {
        if self.started {
            return Ok(()); // Already reading
        }
        self.started = true;

        tokio::spawn(async move {
            let reader = BufReader::new(tokio::io::stdin());
            let count = forward_lines(reader, Instant::now(), &tx).await;
            info!("stdin input ended after {} events", count);
        });
        Ok(())
    }
}

/// Parse one line, returning None for blank and comment lines
pub fn parse_line(line: &str, started: Instant) -> Option<Result<InputEvent, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str::<InputEvent>(trimmed).map(|mut event| {
        if event.timestamp_us == 0 {
            event.timestamp_us = started.elapsed().as_micros() as u64;
        }
        event
    }))
}

async fn forward_lines<R>(
    reader: R,
    started: Instant,
    tx: &mpsc::UnboundedSender<InputEvent>,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut count = 0;

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read input line: {}", e);
                break;
            }
        };

        match parse_line(&line, started) {
            None => continue,
            Some(Ok(event)) => {
                count += 1;
                if let Err(e) = tx.send(event) {
                    debug!("Failed to send input event: {}", e);
                    break;
                }
            }
            Some(Err(e)) => warn!("Skipping malformed input line {:?}: {}", line, e),
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{EventType, KeyEvent};

    #[test]
    fn test_parse_line_skips_comments_and_blanks() {
        let now = Instant::now();
        assert!(parse_line("", now).is_none());
        assert!(parse_line("   # add a screen", now).is_none());
        assert!(parse_line("{not json", now).unwrap().is_err());
    }

    #[test]
    fn test_parse_line_keeps_explicit_timestamp() {
        let line = r#"{"timestamp_us":42,"event":{"type":"KeyRelease","data":{"code":"KeyS","key":"s"}}}"#;
        let event = parse_line(line, Instant::now()).unwrap().unwrap();
        assert_eq!(event.timestamp_us, 42);
        assert_eq!(event.event, EventType::KeyRelease(KeyEvent::typed('s')));
    }

    #[tokio::test]
    async fn test_forward_lines_sends_valid_events_in_order() {
        let script = concat!(
            "# chord\n",
            "{\"event\":{\"type\":\"KeyRelease\",\"data\":{\"code\":\"Equal\",\"key\":\"+\"}}}\n",
            "garbage\n",
            "{\"event\":{\"type\":\"KeyRelease\",\"data\":{\"code\":\"KeyS\",\"key\":\"s\"}}}\n",
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let count = forward_lines(script.as_bytes(), Instant::now(), &tx).await;
        drop(tx);

        assert_eq!(count, 2);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, EventType::KeyRelease(KeyEvent::typed('+')));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, EventType::KeyRelease(KeyEvent::typed('s')));
        assert!(rx.recv().await.is_none());
    }
}
