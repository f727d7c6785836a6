//! Outbound transport boundary
//!
//! The node does not implement a radio protocol. Whatever carries reports to
//! the collector (a Zigbee attribute report, an MQTT publish, a serial frame)
//! sits behind this trait and tells the core two things: whether the link is
//! up, and whether a given report was delivered.
//!
//! There is no queue on this side. While the link is down the
//! node simply does not report; on reconnection the next cycle that meets a
//! trigger sends the latest state.

use heapless::Vec;

use crate::errors::TransportError;
use crate::report::FlowReport;

/// Carrier for flow reports
pub trait Transport {
    /// Transport-specific failure
    type Error;

    /// Link to the collector is up
    fn is_connected(&self) -> bool;

    /// Deliver one report; `Ok` means the collector has it
    fn send(&mut self, report: &FlowReport) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, report: &FlowReport) -> Result<(), Self::Error> {
        (**self).send(report)
    }
}

/// In-memory transport keeping the last `N` delivered reports
///
/// Used by tests and host simulations. Connectivity can be toggled and the
/// next sends can be made to fail.
///
/// ```rust
/// use flowguard_core::transport::{LoopbackTransport, Transport};
/// use flowguard_core::FlowReport;
///
/// let mut link = LoopbackTransport::<4>::connected();
/// let report = FlowReport { rate: 1.0, volume_total: 2.0, aux: None, timestamp: 0 };
/// link.send(&report).unwrap();
/// assert_eq!(link.last(), Some(&report));
/// ```
#[derive(Debug, Clone)]
pub struct LoopbackTransport<const N: usize> {
    connected: bool,
    fail_next: u32,
    delivered: Vec<FlowReport, N>,
    attempts: u32,
}

impl<const N: usize> LoopbackTransport<N> {
    /// Transport with the link up
    pub fn connected() -> Self {
        Self {
            connected: true,
            fail_next: 0,
            delivered: Vec::new(),
            attempts: 0,
        }
    }

    /// Transport with the link down
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::connected()
        }
    }

    /// Bring the link up or down
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Make the next `count` sends time out
    pub fn fail_next(&mut self, count: u32) {
        self.fail_next = count;
    }

    /// Reports delivered so far, oldest first (at most `N`)
    pub fn delivered(&self) -> &[FlowReport] {
        &self.delivered
    }

    /// Most recent delivered report
    pub fn last(&self) -> Option<&FlowReport> {
        self.delivered.last()
    }

    /// Send attempts, delivered or not
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<const N: usize> Transport for LoopbackTransport<N> {
    type Error = TransportError;

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, report: &FlowReport) -> Result<(), Self::Error> {
        self.attempts += 1;
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(TransportError::Timeout);
        }
        if self.delivered.is_full() && N > 0 {
            self.delivered.remove(0);
        }
        // Only fails for N == 0, where nothing is kept anyway
        let _ = self.delivered.push(*report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(volume_total: f64) -> FlowReport {
        FlowReport { rate: 0.0, volume_total, aux: None, timestamp: 0 }
    }

    #[test]
    fn keeps_most_recent_reports() {
        let mut link = LoopbackTransport::<2>::connected();
        for v in [1.0, 2.0, 3.0] {
            link.send(&report(v)).unwrap();
        }
        let kept: std::vec::Vec<f64> = link.delivered().iter().map(|r| r.volume_total).collect();
        assert_eq!(kept, [2.0, 3.0]);
        assert_eq!(link.attempts(), 3);
    }

    #[test]
    fn disconnected_refuses() {
        let mut link = LoopbackTransport::<2>::disconnected();
        assert!(!link.is_connected());
        assert_eq!(link.send(&report(1.0)), Err(TransportError::NotConnected));
        assert!(link.delivered().is_empty());
    }

    #[test]
    fn injected_failures_then_recovery() {
        let mut link = LoopbackTransport::<4>::connected();
        link.fail_next(2);
        assert_eq!(link.send(&report(1.0)), Err(TransportError::Timeout));
        assert_eq!(link.send(&report(1.0)), Err(TransportError::Timeout));
        assert!(link.send(&report(1.0)).is_ok());
        assert_eq!(link.delivered().len(), 1);
    }
}
