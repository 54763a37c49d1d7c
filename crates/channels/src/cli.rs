//! Line input: interactive terminal chat.
//!
//! Reads one user message per line. Blank lines are skipped; `exit`,
//! `quit`, `/exit`, `/quit` and `:q` end the input, as does EOF (Ctrl+D).

use async_trait::async_trait;
use parley_core::channel::{InputChannel, InputOrigin, UserInput};
use parley_core::error::ChannelError;
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Reads user messages from any line-oriented async reader.
pub struct LineInput<R> {
    reader: Mutex<Option<R>>,
    origin: InputOrigin,
}

impl LineInput<BufReader<Stdin>> {
    /// Read from the process's stdin.
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> LineInput<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            origin: InputOrigin::Typed,
        }
    }

    /// Tag lines as speech transcripts (voice-mode demos).
    pub fn as_speech(mut self) -> Self {
        self.origin = InputOrigin::Speech;
        self
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

#[async_trait]
impl<R> InputChannel for LineInput<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        "stdin"
    }

    async fn start(&self) -> Result<mpsc::Receiver<UserInput>, ChannelError> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| ChannelError::ConnectionLost("input lock poisoned".into()))?
            .take()
            .ok_or_else(|| ChannelError::NotConfigured("line input already started".into()))?;

        let (tx, rx) = mpsc::channel(32);
        let origin = self.origin;

        tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if is_exit(line) {
                            debug!("Exit command received");
                            break;
                        }
                        let input = UserInput {
                            text: line.to_string(),
                            origin,
                        };
                        if tx.send(input).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Input stream failed");
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_lines_until_exit() {
        let script: &[u8] = b"hello\n\n   \nwho owns John Kim?\nquit\nnever read\n";
        let input = LineInput::from_reader(script);
        let mut rx = input.start().await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), UserInput::typed("hello"));
        assert_eq!(rx.recv().await.unwrap(), UserInput::typed("who owns John Kim?"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn speech_lines_are_tagged() {
        let script: &[u8] = b"status please";
        let input = LineInput::from_reader(script).as_speech();
        let mut rx = input.start().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().origin, InputOrigin::Speech);
    }

    #[tokio::test]
    async fn second_start_is_refused() {
        let script: &[u8] = b"";
        let input = LineInput::from_reader(script);
        assert_eq!(input.name(), "stdin");
        input.start().await.unwrap();
        assert!(matches!(
            input.start().await,
            Err(ChannelError::NotConfigured(_))
        ));
    }
}
