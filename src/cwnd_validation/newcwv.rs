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

//! NewCWV congestion window validation.
//!
//! A sender that is application-limited does not exercise its congestion
//! window, so the window may grow far beyond what the path has demonstrated
//! it can deliver. NewCWV measures the delivered amount per round trip
//! (pipeACK), classifies the connection as validated or non-validated by
//! comparing the window against that measurement, decays a window that
//! stays non-validated, and recomputes the window from measured delivery
//! when loss recovery ends.
//!
//! See <https://datatracker.ietf.org/doc/html/draft-ietf-tcpm-newcwv-05>.

use std::cmp;
use std::time::Instant;

use enumflags2::BitFlags;
use log::*;

use super::pipeack::PipeAckSampler;
use super::reno;
use super::AckEventFlags;
use super::CongestionController;
use super::CongestionEvent;
use super::CwvConfig;
use crate::connection::CaState;
use crate::connection::TransportState;

/// Divide, treating a zero divisor as "no information" rather than a fault.
fn divide_or_zero(dividend: u64, divisor: u64) -> u64 {
    if divisor == 0 {
        0
    } else {
        dividend / divisor
    }
}

/// Is the congestion window justified by the measured pipeACK?
///
/// An undefined pipeACK carries no evidence of limitation and classifies as
/// validated. Otherwise the window is validated while the measured delivery
/// is within a factor of two of the window size.
fn in_validated_phase(conn: &TransportState, pipeack: Option<u64>) -> bool {
    match pipeack {
        None => true,
        Some(pa) => pa.saturating_mul(2) >= conn.cwnd_in_bytes(),
    }
}

/// NewCWV congestion control.
///
/// One instance per connection, driven synchronously by the connection's
/// event processing.
pub struct NewCwv {
    /// Configuration.
    config: CwvConfig,

    /// Max filter over recent pipeACK samples.
    sampler: PipeAckSampler,

    /// The filtered pipeACK estimate in bytes, or `None` when the sample
    /// buffer holds no information.
    pipeack: Option<u64>,

    /// Whether the current window is considered validated by the pipeACK.
    validated: bool,

    /// Whether a recovery reduction is in progress.
    in_recovery: bool,

    /// Segments in flight at the start of the last congestion avoidance
    /// decision, used for the recovery window reduction.
    prior_in_flight: u32,

    /// Total retransmissions at the start of the last congestion avoidance
    /// decision, used to discount retransmitted data at recovery end.
    prior_retrans: u32,

    /// `snd_una` when the last pipeACK sample was recorded.
    prev_snd_una: u64,

    /// `snd_nxt` when the last pipeACK sample was recorded. A cumulative
    /// acknowledgment at or above this covers a full round trip of new data.
    prev_snd_nxt: u64,

    /// The last time the window was found validated.
    last_validated: Instant,
}

impl NewCwv {
    pub fn new(config: CwvConfig) -> Self {
        let now = Instant::now();
        Self {
            sampler: PipeAckSampler::new(now, config.min_sampling_period),
            pipeack: None,
            validated: true,
            in_recovery: false,
            prior_in_flight: 0,
            prior_retrans: 0,
            prev_snd_una: 0,
            prev_snd_nxt: 0,
            last_validated: now,
            config,
        }
    }

    /// The filtered pipeACK estimate in whole segments.
    fn pipeack_segments(&self, conn: &TransportState) -> u32 {
        divide_or_zero(self.pipeack.unwrap_or(0), conn.mss as u64) as u32
    }

    /// Reduce the window of a connection that has stayed non-validated:
    /// one halving (and a ssthresh raise) per whole inactivity window
    /// elapsed since the window was last found validated. The window never
    /// drops below the initial window.
    fn datalim_closedown(&mut self, conn: &mut TransportState, now: Instant) {
        let window = self.config.inactivity_window;
        if window.is_zero() {
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_validated);
        let windows = elapsed.as_nanos() / window.as_nanos();
        for _ in 0..windows {
            self.last_validated += window;
            conn.snd_ssthresh =
                cmp::max((conn.snd_cwnd as u64 * 3 / 4) as u32, conn.snd_ssthresh);
            conn.snd_cwnd = cmp::max(
                conn.snd_cwnd / 2,
                self.config.initial_congestion_window,
            );
            debug!(
                "{} non-validated for {:?}, cwnd reduced to {} ssthresh {}",
                self.name(),
                window,
                conn.snd_cwnd,
                conn.snd_ssthresh
            );
        }
    }

    /// Refresh the pipeACK estimate from the current acknowledgment state
    /// and reclassify the validation phase.
    fn update_pipeack(&mut self, conn: &mut TransportState, now: Instant) {
        self.sampler.update_period(conn.rtt.smoothed_rtt());

        if conn.snd_una >= self.prev_snd_nxt {
            // The acknowledgment covers everything outstanding at the last
            // record: a full round trip of data has been delivered.
            let sample = conn.snd_una.saturating_sub(self.prev_snd_una);
            self.prev_snd_una = conn.snd_una;
            self.prev_snd_nxt = conn.snd_nxt;
            self.sampler.add_sample(sample, now);
        }

        self.pipeack = self.sampler.filtered_max(now);

        if in_validated_phase(conn, self.pipeack) {
            self.validated = true;
            self.last_validated = now;
        } else {
            if self.validated {
                trace!(
                    "{} left the validated phase, pipeack {:?} cwnd {} segments",
                    self.name(),
                    self.pipeack,
                    conn.snd_cwnd
                );
            }
            self.validated = false;
            self.datalim_closedown(conn, now);
        }
    }

    /// Begin the recovery window reduction: halve the window down to the
    /// larger of the measured pipeACK and the prior in-flight amount.
    fn enter_recovery(&mut self, conn: &mut TransportState) {
        self.in_recovery = true;

        let pipeack = self.pipeack_segments(conn);
        conn.snd_cwnd = cmp::max(cmp::max(pipeack, self.prior_in_flight) / 2, 1);
        debug!(
            "{} entered recovery, pipeack {} prior_in_flight {} cwnd {}",
            self.name(),
            pipeack,
            self.prior_in_flight,
            conn.snd_cwnd
        );
    }

    /// Finish a recovery episode: recompute the window from the measured
    /// pipeACK, discounting retransmissions, and restart the validation
    /// machine from a clean baseline.
    fn end_recovery(&mut self, conn: &mut TransportState, now: Instant) {
        let pipeack = self.pipeack_segments(conn);
        let retrans = conn.total_retrans.saturating_sub(self.prior_retrans);

        conn.snd_cwnd = cmp::max(
            cmp::max(pipeack, self.prior_in_flight).saturating_sub(retrans) / 2,
            self.config.restart_window,
        );
        conn.snd_ssthresh = conn.snd_cwnd;
        self.in_recovery = false;
        debug!(
            "{} ended recovery, retrans delta {} cwnd {} ssthresh {}",
            self.name(),
            retrans,
            conn.snd_cwnd,
            conn.snd_ssthresh
        );

        self.init(conn, now);
    }
}

impl CongestionController for NewCwv {
    fn name(&self) -> &str {
        "NEWCWV"
    }

    fn init(&mut self, conn: &mut TransportState, now: Instant) {
        self.prev_snd_una = conn.snd_una;
        self.prev_snd_nxt = conn.snd_nxt;
        self.last_validated = now;
        self.validated = true;
        self.in_recovery = false;
        self.pipeack = None;
        self.sampler.reset(now);
        self.sampler.update_period(conn.rtt.smoothed_rtt());
        trace!(
            "{} initialized, sampling period {:?}",
            self.name(),
            self.sampler.sampling_period()
        );
    }

    fn cong_avoid(&mut self, conn: &mut TransportState, now: Instant, ack: u64, acked: u32) {
        self.prior_in_flight = conn.packets_in_flight();
        self.prior_retrans = conn.total_retrans;

        self.update_pipeack(conn, now);

        // A non-validated window that is not the actual limit on sending
        // must not grow.
        if !self.validated && !conn.is_cwnd_limited {
            return;
        }

        if conn.snd_cwnd <= conn.snd_ssthresh {
            reno::slow_start(conn, acked);
        } else {
            reno::cong_avoid_ai(conn, conn.snd_cwnd, acked);
        }
    }

    fn cwnd_event(&mut self, conn: &mut TransportState, now: Instant, event: CongestionEvent) {
        match event {
            CongestionEvent::RestartAfterIdle => {
                // Catch up on inactivity windows that elapsed while idle.
                self.datalim_closedown(conn, now);
            }
            CongestionEvent::RecoveryCompleted => {
                if !self.validated {
                    self.end_recovery(conn, now);
                }
            }
            CongestionEvent::Loss => {
                self.init(conn, now);
            }
            CongestionEvent::WindowRestart => (),
        }
    }

    fn in_ack_event(
        &mut self,
        conn: &mut TransportState,
        now: Instant,
        flags: BitFlags<AckEventFlags>,
    ) {
        if !flags.contains(AckEventFlags::SlowPath) {
            return;
        }

        // Recovery entry is tied to the narrow case where the host reports
        // loss recovery while neither the validated nor the recovery flag
        // is set.
        if conn.ca_state == CaState::Recovery && !self.validated && !self.in_recovery {
            self.enter_recovery(conn);
        }
    }

    fn ssthresh(&self, conn: &TransportState) -> u32 {
        cmp::max(conn.packets_in_flight() / 2, 2)
    }

    fn undo_cwnd(&self, conn: &TransportState) -> u32 {
        // Restore the larger of the current and prior window, but never
        // below half the slow start threshold.
        cmp::max(
            cmp::max(conn.snd_cwnd, conn.prior_cwnd),
            conn.snd_ssthresh / 2,
        )
    }
}
