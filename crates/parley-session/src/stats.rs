//! Token counts and timing for generations.

use std::time::{Duration, Instant};

/// Summary of one finished generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStats {
    /// Token events appended to the assistant entry.
    pub tokens: u64,
    pub elapsed: Duration,
}

impl GenerationStats {
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.tokens as f64 / secs
        } else {
            0.0
        }
    }
}

/// Tracks the running generation and cumulative totals for the session.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    current: Option<(Instant, u64)>,
    last: Option<GenerationStats>,
    total_tokens: u64,
    generations: u64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.current = Some((Instant::now(), 0));
    }

    pub fn record_token(&mut self) {
        if let Some((_, ref mut tokens)) = self.current {
            *tokens += 1;
        }
    }

    /// Close the running generation. Returns `None` if none was started.
    pub fn finish(&mut self) -> Option<GenerationStats> {
        let (started, tokens) = self.current.take()?;
        let stats = GenerationStats {
            tokens,
            elapsed: started.elapsed(),
        };
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        self.generations += 1;
        self.last = Some(stats);
        Some(stats)
    }

    pub fn last(&self) -> Option<GenerationStats> {
        self.last
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn generations(&self) -> u64 {
        self.generations
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
