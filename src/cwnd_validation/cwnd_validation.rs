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

#![allow(unused_variables)]

use core::str::FromStr;
use std::fmt;
use std::time::Duration;
use std::time::Instant;

use enumflags2::bitflags;
use enumflags2::BitFlags;

use crate::connection::TransportState;
use crate::Error;
use crate::Result;
pub use newcwv::NewCwv;
pub use reno::Reno;

/// Available congestion control algorithm
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum CongestionControlAlgorithm {
    /// NewCWV extends the standard Reno behaviour with congestion window
    /// validation: the achieved delivery rate is measured from acknowledgment
    /// arrivals (pipeACK) and used to decide whether the current window is
    /// actually exercised by the data in flight. A window that stays
    /// unvalidated is progressively reduced, and after loss recovery the
    /// window is restored from measured delivery rather than from the
    /// pre-loss window.
    #[default]
    NewCwv,

    /// Standard Reno additive-increase/multiplicative-decrease behaviour
    /// without window validation.
    Reno,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        if algor.eq_ignore_ascii_case("newcwv") {
            Ok(CongestionControlAlgorithm::NewCwv)
        } else if algor.eq_ignore_ascii_case("reno") {
            Ok(CongestionControlAlgorithm::Reno)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// Congestion events reported by the host connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CongestionEvent {
    /// Transmission resumed after an idle period.
    RestartAfterIdle,

    /// A loss recovery episode has completed.
    RecoveryCompleted,

    /// Segment loss was detected.
    Loss,

    /// The congestion window is being restarted.
    WindowRestart,
}

/// Flags describing how an acknowledgment was processed by the host.
#[bitflags]
#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AckEventFlags {
    /// The acknowledgment was handled on the slow (non-fast) path.
    SlowPath = 1 << 0,

    /// The acknowledgment updated the send window.
    WindowUpdate = 1 << 1,
}

/// Congestion control configuration.
#[derive(Debug, Clone)]
pub struct CwvConfig {
    /// The congestion control algorithm used for a connection.
    congestion_control_algorithm: CongestionControlAlgorithm,

    /// The initial congestion window in segments.
    /// See RFC 6928.
    initial_congestion_window: u32,

    /// The minimum congestion window after a recovery episode, in segments.
    restart_window: u32,

    /// Lower bound for the pipeACK sampling period, so that the period is
    /// never zero even when the smoothed RTT is tiny.
    min_sampling_period: Duration,

    /// How long a connection may stay non-validated before its window is
    /// halved, once per elapsed window.
    inactivity_window: Duration,
}

impl CwvConfig {
    /// Update the congestion control algorithm.
    pub fn set_congestion_control_algorithm(
        &mut self,
        algor: CongestionControlAlgorithm,
    ) -> &mut Self {
        self.congestion_control_algorithm = algor;
        self
    }

    /// Update the initial congestion window in segments.
    pub fn set_initial_congestion_window(&mut self, initial_congestion_window: u32) -> &mut Self {
        self.initial_congestion_window = initial_congestion_window;
        self
    }

    /// Update the restart window in segments.
    pub fn set_restart_window(&mut self, restart_window: u32) -> &mut Self {
        self.restart_window = restart_window;
        self
    }

    /// Update the lower bound for the pipeACK sampling period.
    pub fn set_min_sampling_period(&mut self, min_sampling_period: Duration) -> &mut Self {
        self.min_sampling_period = min_sampling_period;
        self
    }

    /// Update the non-validated inactivity window.
    pub fn set_inactivity_window(&mut self, inactivity_window: Duration) -> &mut Self {
        self.inactivity_window = inactivity_window;
        self
    }
}

impl Default for CwvConfig {
    fn default() -> Self {
        Self {
            congestion_control_algorithm: CongestionControlAlgorithm::NewCwv,
            initial_congestion_window: crate::INITIAL_WINDOW,
            restart_window: crate::RESTART_WINDOW,
            min_sampling_period: crate::MIN_SAMPLING_PERIOD,
            inactivity_window: crate::INACTIVITY_WINDOW,
        }
    }
}

/// Congestion control interfaces shared by different algorithms.
///
/// This is the TCP congestion-ops hook table as a trait: the host invokes
/// each operation from its own serialized per-connection event processing
/// and passes in the current time explicitly. No operation blocks or
/// allocates; every call is a finite deterministic computation.
pub trait CongestionController {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Establish the baseline state for a connection. Also invoked
    /// internally after loss and at the end of a recovery episode.
    fn init(&mut self, conn: &mut TransportState, now: Instant);

    /// Standard per-ACK entry point: refresh the controller state for the
    /// cumulative acknowledgment `ack` covering `acked` segments, then grow
    /// the congestion window if growth is warranted.
    fn cong_avoid(&mut self, conn: &mut TransportState, now: Instant, ack: u64, acked: u32);

    /// Notification of a congestion event.
    fn cwnd_event(&mut self, conn: &mut TransportState, now: Instant, event: CongestionEvent) {}

    /// Notification of an acknowledgment arrival with processing flags.
    fn in_ack_event(
        &mut self,
        conn: &mut TransportState,
        now: Instant,
        flags: BitFlags<AckEventFlags>,
    ) {
    }

    /// Slow start threshold to adopt after loss, in segments.
    fn ssthresh(&self, conn: &TransportState) -> u32;

    /// Congestion window to adopt when undoing a spurious reduction,
    /// in segments.
    fn undo_cwnd(&self, conn: &TransportState) -> u32;
}

impl fmt::Debug for dyn CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller.")
    }
}

/// Build a congestion controller.
pub fn build_congestion_controller(conf: &CwvConfig) -> Box<dyn CongestionController> {
    match conf.congestion_control_algorithm {
        CongestionControlAlgorithm::NewCwv => Box::new(NewCwv::new(conf.clone())),
        CongestionControlAlgorithm::Reno => Box::new(Reno::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::CaState;

    #[test]
    fn congestion_control_name() {
        let cases = [
            ("newcwv", Ok(CongestionControlAlgorithm::NewCwv)),
            ("NewCwv", Ok(CongestionControlAlgorithm::NewCwv)),
            ("NEWCWV", Ok(CongestionControlAlgorithm::NewCwv)),
            ("reno", Ok(CongestionControlAlgorithm::Reno)),
            ("Reno", Ok(CongestionControlAlgorithm::Reno)),
            ("RENO", Ok(CongestionControlAlgorithm::Reno)),
            ("newcvw", Err(Error::InvalidConfig("unknown".into()))),
        ];

        for (name, algor) in cases {
            assert_eq!(CongestionControlAlgorithm::from_str(name), algor);
        }
    }

    #[test]
    fn config_setters() {
        let mut conf = CwvConfig::default();
        assert_eq!(
            conf.congestion_control_algorithm,
            CongestionControlAlgorithm::NewCwv
        );
        assert_eq!(conf.initial_congestion_window, crate::INITIAL_WINDOW);
        assert_eq!(conf.restart_window, crate::RESTART_WINDOW);

        conf.set_congestion_control_algorithm(CongestionControlAlgorithm::Reno)
            .set_initial_congestion_window(4)
            .set_restart_window(2)
            .set_min_sampling_period(Duration::from_millis(500))
            .set_inactivity_window(Duration::from_secs(60));
        assert_eq!(
            conf.congestion_control_algorithm,
            CongestionControlAlgorithm::Reno
        );
        assert_eq!(conf.initial_congestion_window, 4);
        assert_eq!(conf.restart_window, 2);
        assert_eq!(conf.min_sampling_period, Duration::from_millis(500));
        assert_eq!(conf.inactivity_window, Duration::from_secs(60));
    }

    #[test]
    fn build_controller() {
        let mut conf = CwvConfig::default();
        let cc = build_congestion_controller(&conf);
        assert_eq!(cc.name(), "NEWCWV");

        conf.set_congestion_control_algorithm(CongestionControlAlgorithm::Reno);
        let cc = build_congestion_controller(&conf);
        assert_eq!(cc.name(), "RENO");
    }

    #[test]
    fn newcwv_lifecycle() {
        let _ = env_logger::builder().is_test(true).try_init();

        let conf = CwvConfig::default();
        let mut cc = build_congestion_controller(&conf);
        let mut conn = TransportState::new(1000, Duration::from_millis(100));
        let now = Instant::now();
        cc.init(&mut conn, now);

        // A full window of ten segments is delivered over one round trip:
        // the window is validated and slow start doubles it.
        conn.snd_una = 10_000;
        conn.snd_nxt = 20_000;
        conn.packets_out = 10;
        let now = now + Duration::from_millis(100);
        let ack = conn.snd_una;
        cc.cong_avoid(&mut conn, now, ack, 10);
        assert_eq!(conn.snd_cwnd, 20);

        // Loss: the host asks for a new ssthresh and reports the event.
        assert_eq!(cc.ssthresh(&conn), 5);
        cc.cwnd_event(&mut conn, now, CongestionEvent::Loss);

        // Right after a reset the controller considers itself validated, so
        // a slow-path acknowledgment during recovery does not re-enter the
        // recovery reduction.
        conn.ca_state = CaState::Recovery;
        cc.in_ack_event(&mut conn, now, AckEventFlags::SlowPath.into());
        assert_eq!(conn.snd_cwnd, 20);
    }
}

mod newcwv;
mod pipeack;
mod reno;
