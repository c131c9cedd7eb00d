//! Per-draw combination-request quota bookkeeping.

use crate::dao::models::DrawInfo;

/// Tracks how many combination requests a user has consumed against the
/// server-assigned limit for one draw.
///
/// The server is authoritative for the used-count: [`Quota::record_request`]
/// mirrors the value returned by the request-combination call and never
/// increments locally, so concurrent use from another device cannot drift the
/// local view upward past reality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Server-assigned request limit, when known.
    pub limit: Option<u32>,
    /// Requests consumed so far, when known.
    pub used: Option<u32>,
}

impl Quota {
    /// Build a tracker from a cached draw-info row.
    pub fn from_draw_info(info: &DrawInfo) -> Self {
        Self {
            limit: info.request_limit,
            used: info.requests_used,
        }
    }

    /// Remaining allowance, clamped at zero; unknown values count as zero.
    pub fn remaining(&self) -> u32 {
        self.limit.unwrap_or(0).saturating_sub(self.used.unwrap_or(0))
    }

    /// Whether the user can still request a combination. Unknown limits do
    /// not block; the server will enforce the real quota.
    pub fn exhausted(&self) -> bool {
        self.limit.is_some() && self.remaining() == 0
    }

    /// Mirror the authoritative post-request used-count from the server.
    pub fn record_request(&mut self, server_used_count: u32) {
        self.used = Some(server_used_count);
    }
}
