//! Console speaker: prints replies to stdout.
//!
//! With playback simulation on, `speak` resolves only after the time it
//! would take to say the text aloud, so a session stays in `Speaking` for a
//! realistic stretch.

use async_trait::async_trait;
use parley_config::PlaybackConfig;
use parley_core::channel::OutputChannel;
use parley_core::error::ChannelError;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct ConsoleSpeaker {
    speaker: String,
    playback: PlaybackConfig,
}

impl ConsoleSpeaker {
    /// `speaker` prefixes each printed line, e.g. `"Max"`.
    pub fn new(speaker: impl Into<String>, playback: PlaybackConfig) -> Self {
        Self {
            speaker: speaker.into(),
            playback,
        }
    }

    pub fn line_for(&self, text: &str) -> String {
        format!("{}: {}\n", self.speaker, text)
    }
}

#[async_trait]
impl OutputChannel for ConsoleSpeaker {
    fn name(&self) -> &str {
        "console"
    }

    async fn speak(&self, text: &str) -> Result<(), ChannelError> {
        let line = self.line_for(text);
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| output_failed(&e))?;
        stdout.flush().await.map_err(|e| output_failed(&e))?;

        if self.playback.simulate {
            let duration = self.playback.duration_for(text);
            debug!(ms = duration.as_millis() as u64, "Simulating playback");
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }
}

fn output_failed(e: &std::io::Error) -> ChannelError {
    ChannelError::OutputFailed {
        channel: "console".into(),
        reason: e.to_string(),
    }
}
