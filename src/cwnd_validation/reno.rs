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

//! The standard window growth primitives and the plain Reno controller.
//!
//! See RFC 5681.

use std::cmp;
use std::time::Instant;

use super::CongestionController;
use crate::connection::TransportState;

/// Exponential growth: raise the window by one segment per acked segment,
/// up to the slow start threshold. Returns the acked segments left over
/// once the threshold is reached.
pub fn slow_start(conn: &mut TransportState, acked: u32) -> u32 {
    let cwnd = cmp::min(conn.snd_cwnd.saturating_add(acked), conn.snd_ssthresh);
    let used = cwnd - conn.snd_cwnd;
    conn.snd_cwnd = cmp::min(cwnd, conn.snd_cwnd_clamp);
    acked - used
}

/// Linear growth: raise the window by one segment for every `w` acked
/// segments, accumulating partial credit in `snd_cwnd_cnt`.
pub fn cong_avoid_ai(conn: &mut TransportState, w: u32, acked: u32) {
    let w = cmp::max(w, 1);

    if conn.snd_cwnd_cnt >= w {
        conn.snd_cwnd_cnt = 0;
        conn.snd_cwnd = conn.snd_cwnd.saturating_add(1);
    }

    conn.snd_cwnd_cnt = conn.snd_cwnd_cnt.saturating_add(acked);
    if conn.snd_cwnd_cnt >= w {
        let delta = conn.snd_cwnd_cnt / w;
        conn.snd_cwnd_cnt -= delta * w;
        conn.snd_cwnd = conn.snd_cwnd.saturating_add(delta);
    }

    conn.snd_cwnd = cmp::min(conn.snd_cwnd, conn.snd_cwnd_clamp);
}

/// Plain Reno congestion control, without window validation.
///
/// Reno keeps no private state of its own: everything it needs lives in the
/// shared transport state.
#[derive(Default)]
pub struct Reno;

impl Reno {
    pub fn new() -> Self {
        Self
    }
}

impl CongestionController for Reno {
    fn name(&self) -> &str {
        "RENO"
    }

    fn init(&mut self, conn: &mut TransportState, now: Instant) {
        // Reno keeps no private state.
    }

    fn cong_avoid(&mut self, conn: &mut TransportState, now: Instant, ack: u64, acked: u32) {
        if !conn.is_cwnd_limited {
            return;
        }

        let mut acked = acked;
        if conn.snd_cwnd < conn.snd_ssthresh {
            acked = slow_start(conn, acked);
            if acked == 0 {
                return;
            }
        }
        cong_avoid_ai(conn, conn.snd_cwnd, acked);
    }

    fn ssthresh(&self, conn: &TransportState) -> u32 {
        cmp::max(conn.snd_cwnd / 2, 2)
    }

    fn undo_cwnd(&self, conn: &TransportState) -> u32 {
        cmp::max(conn.snd_cwnd, conn.prior_cwnd)
    }
}
