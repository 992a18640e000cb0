// Copyright (c) 2025 The TCP-NewCWV Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A windowed maximum filter over recent pipeACK samples.
//!
//! The sampler keeps a small circular buffer of delivery-amount samples,
//! binned no finer than a quarter of the sampling period to smooth
//! burstiness, and reports the maximum over the last full sampling period.
//! It approximates a decaying delivery-rate ceiling with constant space and
//! constant work per call, without storing raw per-ACK history.

use std::cmp;
use std::time::Duration;
use std::time::Instant;

/// Number of bins in the sample buffer.
const SAMPLE_BINS: usize = 4;

fn next_bin(k: usize) -> usize {
    (k + 1) & (SAMPLE_BINS - 1)
}

fn prev_bin(k: usize) -> usize {
    k.wrapping_sub(1) & (SAMPLE_BINS - 1)
}

/// Maximum filter over the pipeACK samples of the last sampling period.
///
/// A bin holding `None` is undefined: it carries no information and is never
/// read as a live sample until overwritten.
pub struct PipeAckSampler {
    /// Circular buffer of delivery-amount samples in bytes.
    samples: [Option<u64>; SAMPLE_BINS],

    /// Creation time of each bin.
    timestamps: [Instant; SAMPLE_BINS],

    /// Index of the most recently written bin.
    head: usize,

    /// The pipeACK sampling period: both the filter lookback window and the
    /// minimum spacing between new bins. Derived from the smoothed RTT,
    /// never below `min_period`.
    sampling_period: Duration,

    /// Lower bound for the sampling period.
    min_period: Duration,
}

impl PipeAckSampler {
    pub fn new(now: Instant, min_period: Duration) -> Self {
        Self {
            samples: [None; SAMPLE_BINS],
            timestamps: [now; SAMPLE_BINS],
            head: 0,
            sampling_period: min_period,
            min_period,
        }
    }

    /// Restart the filter from a single undefined bin.
    pub fn reset(&mut self, now: Instant) {
        self.samples = [None; SAMPLE_BINS];
        self.timestamps = [now; SAMPLE_BINS];
        self.head = 0;
    }

    /// Recompute the sampling period as three times the smoothed RTT,
    /// floored so that it is never zero.
    pub fn update_period(&mut self, smoothed_rtt: Duration) {
        self.sampling_period = cmp::max(3 * smoothed_rtt, self.min_period);
    }

    /// The current sampling period.
    pub fn sampling_period(&self) -> Duration {
        self.sampling_period
    }

    /// Record a new delivery-amount sample.
    ///
    /// If at least a quarter of the sampling period has passed since the head
    /// bin was created, a new bin is opened and the oldest one overwritten.
    /// Otherwise the sample merges into the head bin, keeping the maximum.
    pub fn add_sample(&mut self, value: u64, now: Instant) {
        let spacing = self.sampling_period / 4;
        if now.saturating_duration_since(self.timestamps[self.head]) >= spacing {
            self.head = next_bin(self.head);
            self.samples[self.head] = Some(value);
            self.timestamps[self.head] = now;
        } else {
            self.samples[self.head] = Some(match self.samples[self.head] {
                Some(cur) => cmp::max(cur, value),
                None => value,
            });
        }
    }

    /// Compute the filtered pipeACK estimate: the maximum live sample of the
    /// last sampling period, or `None` if the buffer holds no samples.
    ///
    /// Expiry is lazy: at most one bin older than the sampling period is
    /// dropped per call. An expiring bin still counts toward the returned
    /// maximum one last time before it is discarded.
    pub fn filtered_max(&mut self, now: Instant) -> Option<u64> {
        let mut best: Option<u64> = None;
        let mut k = self.head;

        loop {
            let v = match self.samples[k] {
                Some(v) => v,
                None => break,
            };
            let candidate = best.map_or(v, |b| cmp::max(b, v));

            if now.saturating_duration_since(self.timestamps[k]) > self.sampling_period {
                self.samples[k] = None;
                return Some(candidate);
            }
            best = Some(candidate);

            k = prev_bin(k);
            if k == self.head {
                break;
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(period: Duration) -> (PipeAckSampler, Instant) {
        let now = Instant::now();
        (PipeAckSampler::new(now, period), now)
    }

    #[test]
    fn empty_buffer() {
        let (mut s, now) = sampler(Duration::from_millis(100));
        assert_eq!(s.filtered_max(now), None);
        assert_eq!(s.filtered_max(now + Duration::from_secs(10)), None);
    }

    #[test]
    fn merge_then_open_new_bin() {
        // Sampling period 100ms, so new bins may open every 25ms.
        let (mut s, t0) = sampler(Duration::from_millis(100));

        // First sample lands in the initial undefined bin.
        s.add_sample(50, t0);
        assert_eq!(s.head, 0);
        assert_eq!(s.filtered_max(t0), Some(50));

        // Within a quarter period: merges into the same bin, keeping the max.
        s.add_sample(80, t0 + Duration::from_millis(10));
        assert_eq!(s.head, 0);
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(10)), Some(80));

        // A smaller merge does not shrink the bin.
        s.add_sample(10, t0 + Duration::from_millis(20));
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(20)), Some(80));

        // Past a quarter period: a new bin opens, the old one is retained.
        s.add_sample(90, t0 + Duration::from_millis(40));
        assert_eq!(s.head, 1);
        assert_eq!(s.samples[0], Some(80));
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(50)), Some(90));
    }

    #[test]
    fn lazy_expiry() {
        let (mut s, t0) = sampler(Duration::from_millis(100));
        s.add_sample(80, t0);
        s.add_sample(90, t0 + Duration::from_millis(40));

        // At t=130 the first bin (t=0) is beyond the period. It is dropped,
        // but still counts toward this call's result.
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(130)), Some(90));
        assert_eq!(s.samples[0], None);

        // Only the head bin remains live.
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(130)), Some(90));

        // At t=150 the head bin itself (t=40) expires; its value is the
        // final candidate before the buffer goes empty.
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(150)), Some(90));
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(150)), None);
    }

    #[test]
    fn expired_bin_never_resurrects() {
        let (mut s, t0) = sampler(Duration::from_millis(100));
        s.add_sample(80, t0);
        s.add_sample(90, t0 + Duration::from_millis(40));

        // Far past the window the head bin expires on the first call; the
        // older bin is then unreachable (the walk stops at an undefined
        // bin), so the buffer reads as empty from there on.
        let late = t0 + Duration::from_secs(5);
        assert_eq!(s.filtered_max(late), Some(90));
        assert_eq!(s.filtered_max(late), None);
        assert_eq!(s.filtered_max(late), None);
    }

    #[test]
    fn buffer_wraps_at_four_bins() {
        let (mut s, t0) = sampler(Duration::from_millis(100));
        for i in 0..6u64 {
            s.add_sample(i + 1, t0 + Duration::from_millis(30 * i as u64));
        }

        // Six bins were opened; the buffer holds only the last four.
        assert_eq!(s.head, 1);
        let live: Vec<_> = s.samples.iter().flatten().copied().collect();
        assert_eq!(live.len(), SAMPLE_BINS);
        assert_eq!(
            s.filtered_max(t0 + Duration::from_millis(150)),
            Some(6)
        );
    }

    #[test]
    fn reset_clears_samples() {
        let (mut s, t0) = sampler(Duration::from_millis(100));
        s.add_sample(80, t0);
        s.add_sample(90, t0 + Duration::from_millis(40));

        s.reset(t0 + Duration::from_millis(50));
        assert_eq!(s.head, 0);
        assert_eq!(s.filtered_max(t0 + Duration::from_millis(50)), None);
    }

    #[test]
    fn period_floored_at_min() {
        let (mut s, _) = sampler(Duration::from_secs(1));
        s.update_period(Duration::from_millis(10));
        assert_eq!(s.sampling_period(), Duration::from_secs(1));

        s.update_period(Duration::from_millis(500));
        assert_eq!(s.sampling_period(), Duration::from_millis(1500));

        s.update_period(Duration::ZERO);
        assert_eq!(s.sampling_period(), Duration::from_secs(1));
    }
}
