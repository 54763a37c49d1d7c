//! Response Normalizer: turns raw generated text into a short spoken reply.
//!
//! Order matters:
//! 1. trim surrounding whitespace;
//! 2. cut at the earliest stop marker that is not at position 0;
//! 3. if still longer than `max_length` characters, hard-cut there, then
//!    back up to the last `.`, `!` or `?` if it sits past half of
//!    `max_length`.

use parley_config::{ResponseConfig, default_stop_markers};

/// Longest reply, in characters, when nothing is configured.
pub const DEFAULT_MAX_LENGTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseNormalizer {
    max_length: usize,
    stop_markers: Vec<String>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH, default_stop_markers())
    }
}

impl ResponseNormalizer {
    pub fn new(max_length: usize, stop_markers: Vec<String>) -> Self {
        Self { max_length, stop_markers }
    }

    pub fn from_config(config: &ResponseConfig) -> Self {
        Self::new(config.max_length, config.stop_markers.clone())
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn normalize(&self, raw: &str) -> String {
        normalize(raw, self.max_length, &self.stop_markers)
    }
}

/// Clean `raw` for speech. See the module docs for the exact steps.
pub fn normalize(raw: &str, max_length: usize, stop_markers: &[String]) -> String {
    let mut text = raw.trim();

    let earliest = stop_markers
        .iter()
        .filter(|m| !m.is_empty())
        .filter_map(|m| text.find(m.as_str()))
        .filter(|&at| at > 0)
        .min();
    if let Some(at) = earliest {
        text = text[..at].trim_end();
    }

    let hard_cut = match text.char_indices().nth(max_length) {
        Some((byte, _)) => &text[..byte],
        None => return text.to_string(),
    };

    let floor = max_length / 2;
    let sentence_end = hard_cut
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| matches!(c, '.' | '!' | '?'))
        .last()
        .filter(|(char_pos, _)| *char_pos > floor)
        .map(|(_, (byte, c))| byte + c.len_utf8());

    match sentence_end {
        Some(end) => hard_cut[..end].to_string(),
        None => hard_cut.trim_end().to_string(),
    }
}
