//! Page performance metrics.
//!
//! The host feeds raw timing entries; the monitor reduces them to the
//! metrics attached to page-view and performance events.

use serde::{Deserialize, Serialize};

/// Maximum gap between layout shifts of one session window (ms).
pub const DEFAULT_SESSION_GAP_MS: f64 = 1000.0;
/// Maximum length of one session window (ms).
pub const DEFAULT_SESSION_WINDOW_MS: f64 = 5000.0;

/// Reduced page metrics. Times are milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_parse_time: Option<f64>,
    /// First contentful paint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcp: Option<f64>,
    /// Largest contentful paint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcp: Option<f64>,
    /// First input delay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fid: Option<f64>,
    /// Cumulative layout shift.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cls: Option<f64>,
}

/// Navigation timing marks, as absolute milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NavigationTiming {
    pub navigation_start: f64,
    pub dom_loading: f64,
    pub dom_complete: f64,
    pub load_event_end: f64,
}

/// One layout-shift entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutShift {
    pub start_time: f64,
    pub value: f64,
    /// Shifts right after user input do not count.
    pub had_recent_input: bool,
}

/// Accumulates timing entries into [`PerformanceMetrics`].
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    metrics: PerformanceMetrics,
    session_gap_ms: f64,
    session_window_ms: f64,
    session: Vec<LayoutShift>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::with_session_window(DEFAULT_SESSION_GAP_MS, DEFAULT_SESSION_WINDOW_MS)
    }

    pub fn with_session_window(session_gap_ms: f64, session_window_ms: f64) -> Self {
        Self {
            metrics: PerformanceMetrics::default(),
            session_gap_ms,
            session_window_ms,
            session: Vec::new(),
        }
    }

    /// First paint entry wins.
    pub fn record_first_paint(&mut self, start_time: f64) {
        self.metrics.fcp.get_or_insert(start_time);
    }

    /// Latest candidate wins.
    pub fn record_largest_paint(&mut self, start_time: f64) {
        self.metrics.lcp = Some(start_time);
    }

    /// Only the first input counts.
    pub fn record_first_input(&mut self, start_time: f64, processing_start: f64) {
        self.metrics.fid.get_or_insert(processing_start - start_time);
    }

    /// Add a layout shift. CLS is the largest sum over session windows: shifts
    /// less than `session_gap_ms` apart and within `session_window_ms` of the
    /// window's first shift.
    pub fn record_layout_shift(&mut self, shift: LayoutShift) {
        if shift.had_recent_input {
            return;
        }

        let continues_session = match (self.session.first(), self.session.last()) {
            (Some(first), Some(last)) => {
                shift.start_time - last.start_time < self.session_gap_ms
                    && shift.start_time - first.start_time < self.session_window_ms
            }
            _ => false,
        };
        if !continues_session {
            self.session.clear();
        }
        self.session.push(shift);

        let session_value: f64 = self.session.iter().map(|s| s.value).sum();
        let cls = self.metrics.cls.unwrap_or(0.0).max(session_value);
        self.metrics.cls = Some(cls);
    }

    /// Derive load and DOM parse times. Non-positive durations are left unset.
    pub fn record_navigation(&mut self, timing: NavigationTiming) {
        let load_time = timing.load_event_end - timing.navigation_start;
        let dom_parse_time = timing.dom_complete - timing.dom_loading;
        self.metrics.load_time = (load_time > 0.0).then_some(load_time);
        self.metrics.dom_parse_time = (dom_parse_time > 0.0).then_some(dom_parse_time);
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start_time: f64, value: f64) -> LayoutShift {
        LayoutShift {
            start_time,
            value,
            had_recent_input: false,
        }
    }

    #[test]
    fn test_first_paint_and_input_are_sticky() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_first_paint(120.0);
        monitor.record_first_paint(300.0);
        monitor.record_first_input(1000.0, 1016.0);
        monitor.record_first_input(2000.0, 2100.0);

        let metrics = monitor.metrics();
        assert_eq!(metrics.fcp, Some(120.0));
        assert_eq!(metrics.fid, Some(16.0));
    }

    #[test]
    fn test_largest_paint_takes_latest() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_largest_paint(400.0);
        monitor.record_largest_paint(900.0);
        assert_eq!(monitor.metrics().lcp, Some(900.0));
    }

    #[test]
    fn test_cls_sums_within_session() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_layout_shift(shift(100.0, 0.1));
        monitor.record_layout_shift(shift(600.0, 0.05));
        assert!((monitor.metrics().cls.unwrap() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_cls_gap_starts_new_session_and_keeps_max() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_layout_shift(shift(100.0, 0.2));
        monitor.record_layout_shift(shift(200.0, 0.1));
        // More than a second later: new window
        monitor.record_layout_shift(shift(1500.0, 0.05));
        assert!((monitor.metrics().cls.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_cls_window_is_capped() {
        let mut monitor = PerformanceMonitor::with_session_window(1000.0, 2000.0);
        for i in 0..5 {
            monitor.record_layout_shift(shift(i as f64 * 900.0, 0.1));
        }
        // Windows: [0, 900, 1800] then [2700, 3600]
        assert!((monitor.metrics().cls.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_cls_ignores_recent_input() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_layout_shift(LayoutShift {
            start_time: 10.0,
            value: 0.5,
            had_recent_input: true,
        });
        assert_eq!(monitor.metrics().cls, None);
    }

    #[test]
    fn test_navigation_timing() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_navigation(NavigationTiming {
            navigation_start: 1000.0,
            dom_loading: 1100.0,
            dom_complete: 1600.0,
            load_event_end: 1800.0,
        });
        let metrics = monitor.metrics();
        assert_eq!(metrics.load_time, Some(800.0));
        assert_eq!(metrics.dom_parse_time, Some(500.0));

        // Load not finished yet
        monitor.record_navigation(NavigationTiming {
            navigation_start: 1000.0,
            dom_loading: 1100.0,
            dom_complete: 0.0,
            load_event_end: 0.0,
        });
        assert_eq!(monitor.metrics().load_time, None);
        assert_eq!(monitor.metrics().dom_parse_time, None);
    }

    #[test]
    fn test_wire_shape_skips_unset() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_first_paint(50.0);
        let value = serde_json::to_value(monitor.metrics()).unwrap();
        assert_eq!(value, serde_json::json!({"fcp": 50.0}));
    }
}
