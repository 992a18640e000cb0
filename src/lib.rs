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

//! An implementation of TCP congestion window validation (NewCWV).
//!
//! A sender that is application-limited sends less than its congestion
//! window allows, so acknowledgments stop being evidence that the window is
//! appropriate for the path. NewCWV measures the amount of data actually
//! delivered per round trip (the pipeACK), classifies the window as
//! validated or non-validated against that measurement, progressively
//! reduces a window that stays non-validated, and restores the window from
//! measured delivery at the end of loss recovery.
//!
//! The crate is a pure in-process algorithmic extension point: it owns no
//! socket and performs no I/O. The host keeps one [`connection::TransportState`]
//! per connection up to date from its own ACK and loss processing and drives
//! a [`CongestionController`] with explicit events and timestamps.
//!
//! ```
//! use std::time::Instant;
//!
//! use tcp_newcwv::build_congestion_controller;
//! use tcp_newcwv::connection::TransportState;
//! use tcp_newcwv::CongestionController;
//! use tcp_newcwv::CwvConfig;
//!
//! let conf = CwvConfig::default();
//! let mut cc = build_congestion_controller(&conf);
//!
//! let mut conn = TransportState::default();
//! let now = Instant::now();
//! cc.init(&mut conn, now);
//! let ack = conn.snd_una;
//! cc.cong_avoid(&mut conn, now, ack, 1);
//! ```
//!
//! See <https://datatracker.ietf.org/doc/html/draft-ietf-tcpm-newcwv-05>.

use std::time::Duration;

/// The initial congestion window in segments.
/// See RFC 6928.
pub const INITIAL_WINDOW: u32 = 10;

/// The minimum congestion window after a recovery episode, in segments.
pub const RESTART_WINDOW: u32 = 1;

/// Default maximum segment size in bytes.
pub const DEFAULT_MSS: u32 = 1460;

/// The initial smoothed RTT used before any sample has been taken.
pub const INITIAL_RTT: Duration = Duration::from_millis(333);

/// Lower bound for the pipeACK sampling period. The period is derived from
/// the smoothed RTT and must never be zero.
pub const MIN_SAMPLING_PERIOD: Duration = Duration::from_secs(1);

/// How long a connection may remain non-validated before its congestion
/// window is halved, once per elapsed window.
pub const INACTIVITY_WINDOW: Duration = Duration::from_secs(300);

/// Result type for congestion control operations.
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::cwnd_validation::build_congestion_controller;
pub use crate::cwnd_validation::AckEventFlags;
pub use crate::cwnd_validation::CongestionControlAlgorithm;
pub use crate::cwnd_validation::CongestionController;
pub use crate::cwnd_validation::CongestionEvent;
pub use crate::cwnd_validation::CwvConfig;
pub use crate::cwnd_validation::NewCwv;
pub use crate::cwnd_validation::Reno;
pub use crate::error::Error;

#[path = "connection/connection.rs"]
pub mod connection;

#[path = "cwnd_validation/cwnd_validation.rs"]
mod cwnd_validation;

pub mod error;
