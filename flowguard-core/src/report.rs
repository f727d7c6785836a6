//! Report trigger
//!
//! Decides once per cycle whether the current state goes to the collector.
//! A report is due when ANY rule holds, checked in this order:
//!
//! | # | Rule             | Condition                                           |
//! |---|------------------|-----------------------------------------------------|
//! | 1 | Periodic         | `now - last_report_time > interval`                 |
//! | 2 | Rate change      | `|rate - last_rate| > last_rate × threshold`         |
//! | 3 | Volume milestone | `|volume - last_volume| >= milestone`               |
//! | 4 | Aux change       | `|aux - last_aux| >= aux_threshold` (if configured) |
//!
//! With a zero baseline rate, rule 2 fires for any non-zero rate: the first
//! flow after an idle spell is always reported.
//!
//! ## Baselines move only on delivery
//!
//! Each delivered report re-baselines every rule, so a slow drift cannot
//! cross the same threshold twice. A report the transport did not accept
//! leaves the baselines alone; otherwise the change it carried would be lost
//! and the next comparison would start from a value the collector never saw.

use crate::config::ReportConfig;
use crate::flow::FlowSample;
use crate::time::{elapsed_ms, Timestamp};
use crate::transport::Transport;

/// State handed to the transport
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlowReport {
    /// Flow rate (L/min by default)
    pub rate: f32,
    /// Lifetime volume (litres)
    pub volume_total: f64,
    /// Auxiliary value, e.g. battery percent
    pub aux: Option<u8>,
    /// When the report was assembled
    pub timestamp: Timestamp,
}

/// Rule that made a report due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReportReason {
    /// Report interval elapsed
    Periodic,
    /// Rate moved by more than the relative threshold
    RateChange,
    /// Volume crossed a milestone
    VolumeMilestone,
    /// Auxiliary value moved by the threshold
    AuxChange,
}

impl ReportReason {
    /// Short label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::RateChange => "rate change",
            Self::VolumeMilestone => "volume milestone",
            Self::AuxChange => "aux change",
        }
    }
}

/// Result of evaluating the rules against current state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportDecision {
    /// At least one rule holds
    pub should_report: bool,
    /// First rule that holds, in priority order
    pub reason: Option<ReportReason>,
    /// What would be sent
    pub payload: FlowReport,
}

/// What happened to the report this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// No rule held
    Quiet,
    /// Link down; nothing evaluated or sent
    Disconnected,
    /// Sent and acknowledged; baselines moved
    Delivered(ReportReason),
    /// Send failed; baselines unchanged
    Failed(ReportReason),
}

/// Values as of the last delivered report
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReportState {
    /// Rate in the last delivered report
    pub last_reported_rate: f32,
    /// Volume in the last delivered report
    pub last_reported_volume: f64,
    /// Aux value in the last delivered report (0 before the first)
    pub last_reported_aux: u8,
    /// When the last delivered report was assembled
    pub last_report_time: Timestamp,
}

/// Multi-rule report policy
#[derive(Debug, Clone)]
pub struct ReportTrigger {
    interval_ms: u64,
    rate_change_threshold: f32,
    volume_milestone: f64,
    aux_change_threshold: Option<u8>,
    state: ReportState,
}

impl ReportTrigger {
    /// Trigger whose periodic clock starts at `now`, with zero baselines
    pub fn new(config: &ReportConfig, now: Timestamp) -> Self {
        Self {
            interval_ms: config.interval_ms,
            rate_change_threshold: config.rate_change_threshold,
            volume_milestone: config.volume_milestone,
            aux_change_threshold: config.aux_change_threshold,
            state: ReportState {
                last_report_time: now,
                ..ReportState::default()
            },
        }
    }

    /// Baselines as of the last delivered report
    pub fn state(&self) -> &ReportState {
        &self.state
    }

    /// Check the rules without touching any state
    pub fn evaluate(
        &self,
        rate: f32,
        volume_total: f64,
        aux: Option<u8>,
        now: Timestamp,
    ) -> ReportDecision {
        let reason = self.due_reason(rate, volume_total, aux, now);
        ReportDecision {
            should_report: reason.is_some(),
            reason,
            payload: FlowReport {
                rate,
                volume_total,
                aux,
                timestamp: now,
            },
        }
    }

    fn due_reason(
        &self,
        rate: f32,
        volume_total: f64,
        aux: Option<u8>,
        now: Timestamp,
    ) -> Option<ReportReason> {
        let s = &self.state;

        if elapsed_ms(s.last_report_time, now) > self.interval_ms {
            return Some(ReportReason::Periodic);
        }

        let rate_delta = libm::fabsf(rate - s.last_reported_rate);
        if rate_delta > s.last_reported_rate * self.rate_change_threshold {
            return Some(ReportReason::RateChange);
        }

        if libm::fabs(volume_total - s.last_reported_volume) >= self.volume_milestone {
            return Some(ReportReason::VolumeMilestone);
        }

        if let (Some(threshold), Some(aux)) = (self.aux_change_threshold, aux) {
            if aux.abs_diff(s.last_reported_aux) >= threshold {
                return Some(ReportReason::AuxChange);
            }
        }

        None
    }

    /// Move every baseline to a payload the collector acknowledged
    pub fn confirm_delivery(&mut self, payload: &FlowReport) {
        self.state.last_reported_rate = payload.rate;
        self.state.last_reported_volume = payload.volume_total;
        if let Some(aux) = payload.aux {
            self.state.last_reported_aux = aux;
        }
        self.state.last_report_time = payload.timestamp;
    }

    /// Evaluate a flow sample and send it if due
    ///
    /// Skips everything while the link is down. Baselines move only when
    /// `send` succeeds.
    pub fn report<T: Transport>(
        &mut self,
        sample: &FlowSample,
        aux: Option<u8>,
        now: Timestamp,
        transport: &mut T,
    ) -> ReportOutcome {
        if !transport.is_connected() {
            return ReportOutcome::Disconnected;
        }

        let decision = self.evaluate(sample.rate, sample.volume_total, aux, now);
        let Some(reason) = decision.reason else {
            return ReportOutcome::Quiet;
        };

        match transport.send(&decision.payload) {
            Ok(()) => {
                self.confirm_delivery(&decision.payload);
                log_info!(
                    "Report ({}): {} L/min, {} L",
                    reason.as_str(),
                    decision.payload.rate,
                    decision.payload.volume_total
                );
                ReportOutcome::Delivered(reason)
            }
            Err(_) => {
                log_warn!("Report ({}) not delivered, will retry", reason.as_str());
                ReportOutcome::Failed(reason)
            }
        }
    }
}
