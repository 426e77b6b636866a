//! Token-smoothing transform for free-text streams.
//!
//! Providers often emit bursty multi-word deltas. This transform re-chunks
//! each text delta at word boundaries so callers observe a steadier cadence.
//! Deltas that already fit inside one word pass through unchanged, and
//! non-text chunks are never touched.

use crate::types::chunk::StreamChunk;
use crate::ChunkStream;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::time::Duration;

// A word plus the whitespace that follows it.
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+\s*").expect("static regex"));

#[derive(Debug, Clone)]
pub struct SmoothConfig {
    /// Pause inserted between the pieces of a split delta.
    pub delay: Duration,
}

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(10),
        }
    }
}

impl SmoothConfig {
    /// No artificial pacing; used by tests and latency-sensitive callers.
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

fn split_delta(text: &str) -> Vec<String> {
    let pieces: Vec<String> = WORD.find_iter(text).map(|m| m.as_str().to_string()).collect();
    if pieces.is_empty() {
        // Whitespace-only delta; keep it as-is.
        vec![text.to_string()]
    } else {
        pieces
    }
}

/// Apply word-boundary smoothing to a chunk stream.
pub fn smooth(input: ChunkStream, config: SmoothConfig) -> ChunkStream {
    struct State {
        input: ChunkStream,
        pending: VecDeque<StreamChunk>,
        split_in_flight: bool,
        delay: Duration,
    }

    let state = State {
        input,
        pending: VecDeque::new(),
        split_in_flight: false,
        delay: config.delay,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.pending.pop_front() {
                if st.split_in_flight && !st.delay.is_zero() {
                    tokio::time::sleep(st.delay).await;
                }
                st.split_in_flight = !st.pending.is_empty();
                return Some((chunk, st));
            }
            st.split_in_flight = false;

            match st.input.next().await {
                Some(StreamChunk::TextDelta { text }) => {
                    for piece in split_delta(&text) {
                        st.pending.push_back(StreamChunk::TextDelta { text: piece });
                    }
                }
                Some(other) => return Some((other, st)),
                None => return None,
            }
        }
    }))
}
