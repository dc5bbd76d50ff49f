//! Tunables the controller is configured with.
//!
//! The original implementation reads several of these from weak symbols or
//! `#ifdef NDEBUG` static globals so test harnesses can override them in
//! debug builds (spec §9, "Two global debuggable functions"). Here they are
//! plain fields on [`Config`] passed into [`crate::Controller::new`] instead
//! — an explicit seam rather than build-flag-controlled linkage.

use quic_core::time::Duration;

/// Numbering style for the packet-number allocator (spec §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberingStyle {
    /// First packet number issued is 0.
    Ietf,
    /// First packet number issued is 1.
    Legacy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// FACK reordering threshold: an unacked packet this far behind the
    /// largest acked packet number is declared lost (spec §4.4).
    pub n_nacks_before_retx: u64,

    /// Cap on the OTHER_PRIO buffered-priority bucket (spec §4.8).
    pub max_bpq_count: usize,

    /// Minimum retransmission alarm delay, any mode (spec §4.5).
    pub min_rto: Duration,

    /// Maximum retransmission alarm delay, any mode (spec §4.5).
    pub max_rto: Duration,

    /// Default delay used for the first RTO when no RTT sample exists yet.
    pub default_retx_delay: Duration,

    /// Packets sendable during the post-RTO verification window (spec §4.9).
    pub max_resubmitted_on_rto: u32,

    /// Cap on RTO exponential backoff shifts (spec §4.5).
    pub max_rto_backoffs: u32,

    /// Consecutive TLP fires before the alarm escalates to RTO (spec §4.5).
    pub max_tlps: u32,

    /// Fail `retry` (spec §4.10) after this many attempts.
    pub max_retries: u32,

    /// IETF-style packet numbers start at 0; legacy-style start at 1.
    pub numbering_style: NumberingStyle,

    /// Whether ECN marking is attempted on this connection.
    pub ecn_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n_nacks_before_retx: 3,
            max_bpq_count: 10,
            min_rto: Duration::from_secs(1),
            max_rto: Duration::from_secs(60),
            default_retx_delay: Duration::from_millis(500),
            max_resubmitted_on_rto: 2,
            max_rto_backoffs: 10,
            max_tlps: 2,
            max_retries: 3,
            numbering_style: NumberingStyle::Ietf,
            ecn_enabled: true,
        }
    }
}
