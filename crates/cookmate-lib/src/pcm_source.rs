//! rodio `Source` fed with PCM blocks from the Kokoro fetcher.
//!
//! The fetcher creates the source only once it holds the first block, so
//! the sink never starts on an empty source. Afterwards a short receive
//! timeout yields silence instead of stalling the output. Dropping the
//! sender ends the source.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use rodio::Source;

const BLOCK_WAIT: Duration = Duration::from_millis(10);

pub struct PcmSource {
    blocks: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    channels: u16,
    sample_rate: u32,
    ended: bool,
}

impl PcmSource {
    pub fn new(blocks: Receiver<Vec<i16>>, channels: u16, sample_rate: u32) -> Self {
        Self {
            blocks,
            pending: VecDeque::with_capacity(8192),
            channels,
            sample_rate,
            ended: false,
        }
    }

    fn refill(&mut self) {
        while let Ok(block) = self.blocks.try_recv() {
            self.pending.extend(block);
        }
        if !self.pending.is_empty() {
            return;
        }
        match self.blocks.recv_timeout(BLOCK_WAIT) {
            Ok(block) => self.pending.extend(block),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.ended = true,
        }
    }
}

impl Iterator for PcmSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.pending.is_empty() && !self.ended {
            self.refill();
        }
        match self.pending.pop_front() {
            Some(sample) => Some(sample),
            None if self.ended => None,
            // Underrun: keep the output alive with silence.
            None => Some(0),
        }
    }
}

impl Source for PcmSource {
    fn current_frame_len(&self) -> Option<usize> {
        match (self.pending.len(), self.ended) {
            (0, true) => Some(0),
            (0, false) => Some(1),
            (n, _) => Some(n),
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
