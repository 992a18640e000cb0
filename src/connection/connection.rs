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

//! The connection state consumed and mutated by the congestion controllers.
//!
//! The crate does not own a socket. The host maintains one `TransportState`
//! per connection, keeps its counters up to date from its own ACK/loss
//! processing, and hands it to the controller together with each event.

use std::time::Duration;

use crate::connection::rtt::RttEstimator;

/// Congestion control state classification of a connection, as tracked by
/// the host's ACK processing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CaState {
    /// Normal state, no dubious events.
    #[default]
    Open,

    /// Reordering suspected but no loss declared yet.
    Disorder,

    /// Loss recovery is in progress.
    Recovery,
}

/// Per-connection transport state shared with a congestion controller.
///
/// Window fields are in segments, sequence fields in bytes. `snd_cwnd` and
/// `snd_ssthresh` are owned by the connection but mutated by the controller.
pub struct TransportState {
    /// Congestion window in segments.
    pub snd_cwnd: u32,

    /// Slow start threshold in segments.
    pub snd_ssthresh: u32,

    /// Congestion window at the time of the last window reduction, used for
    /// undoing a spurious reduction.
    pub prior_cwnd: u32,

    /// Linear increase counter: segments acked since the window last grew
    /// during congestion avoidance.
    pub snd_cwnd_cnt: u32,

    /// Upper bound the congestion window may never exceed.
    pub snd_cwnd_clamp: u32,

    /// Maximum segment size in bytes.
    pub mss: u32,

    /// First byte not yet cumulatively acknowledged.
    pub snd_una: u64,

    /// Next byte to be sent.
    pub snd_nxt: u64,

    /// Segments currently sent and not yet acknowledged.
    pub packets_out: u32,

    /// Segments reported received via selective acknowledgment.
    pub sacked_out: u32,

    /// Segments declared lost.
    pub lost_out: u32,

    /// Segments retransmitted and still outstanding.
    pub retrans_out: u32,

    /// Total retransmissions over the lifetime of the connection.
    pub total_retrans: u32,

    /// Congestion state classification.
    pub ca_state: CaState,

    /// Whether the congestion window, rather than the application, is what
    /// limits sending. A sender that runs out of data to send is
    /// application-limited and must not grow its window.
    pub is_cwnd_limited: bool,

    /// Round-trip time estimation.
    pub rtt: RttEstimator,
}

impl TransportState {
    pub fn new(mss: u32, initial_rtt: Duration) -> Self {
        Self {
            snd_cwnd: crate::INITIAL_WINDOW,
            snd_ssthresh: u32::MAX,
            prior_cwnd: 0,
            snd_cwnd_cnt: 0,
            snd_cwnd_clamp: u32::MAX,
            mss,
            snd_una: 0,
            snd_nxt: 0,
            packets_out: 0,
            sacked_out: 0,
            lost_out: 0,
            retrans_out: 0,
            total_retrans: 0,
            ca_state: CaState::Open,
            is_cwnd_limited: true,
            rtt: RttEstimator::new(initial_rtt),
        }
    }

    /// Segments considered in flight on the network: sent but neither
    /// SACKed nor declared lost, plus outstanding retransmissions.
    pub fn packets_in_flight(&self) -> u32 {
        self.packets_out
            .saturating_sub(self.sacked_out)
            .saturating_sub(self.lost_out)
            .saturating_add(self.retrans_out)
    }

    /// Congestion window in bytes.
    pub fn cwnd_in_bytes(&self) -> u64 {
        self.snd_cwnd as u64 * self.mss as u64
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MSS, crate::INITIAL_RTT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let conn = TransportState::default();
        assert_eq!(conn.snd_cwnd, crate::INITIAL_WINDOW);
        assert_eq!(conn.snd_ssthresh, u32::MAX);
        assert_eq!(conn.mss, crate::DEFAULT_MSS);
        assert_eq!(conn.ca_state, CaState::Open);
        assert_eq!(conn.packets_in_flight(), 0);
        assert_eq!(
            conn.cwnd_in_bytes(),
            crate::INITIAL_WINDOW as u64 * crate::DEFAULT_MSS as u64
        );
    }

    #[test]
    fn packets_in_flight() {
        let mut conn = TransportState::default();
        conn.packets_out = 10;
        conn.sacked_out = 2;
        conn.lost_out = 1;
        conn.retrans_out = 3;
        assert_eq!(conn.packets_in_flight(), 10);

        // Counters are never allowed to drive the estimate negative.
        conn.sacked_out = 15;
        conn.retrans_out = 0;
        assert_eq!(conn.packets_in_flight(), 0);
    }
}

pub mod rtt;
