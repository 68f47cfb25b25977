use std::time::Duration;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, proto::MetricFamily,
};

use remind_core::{SweepMetrics, SweepReport};

/// Sweep telemetry backed by a Prometheus registry.
#[derive(Clone)]
pub struct PrometheusSweepMetrics {
    registry: Registry,
    sweeps: IntCounterVec,
    examined: IntCounter,
    notifications: IntCounterVec,
    duration: Histogram,
}

impl PrometheusSweepMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register the sweep metrics in an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let sweeps = IntCounterVec::new(
            Opts::new("remind_sweeps_total", "Reminder sweeps run, by outcome"),
            &["outcome"],
        )?;
        let examined = IntCounter::new(
            "remind_tasks_examined_total",
            "Unnotified tasks visited by sweeps",
        )?;
        let notifications = IntCounterVec::new(
            Opts::new(
                "remind_notifications_total",
                "Reminder delivery attempts, by outcome",
            ),
            &["outcome"],
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "remind_sweep_duration_seconds",
            "Wall-clock duration of completed sweeps",
        ))?;

        registry.register(Box::new(sweeps.clone()))?;
        registry.register(Box::new(examined.clone()))?;
        registry.register(Box::new(notifications.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            sweeps,
            examined,
            notifications,
            duration,
        })
    }

    /// Snapshot all registered metric families for encoding.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

impl SweepMetrics for PrometheusSweepMetrics {
    fn observe_sweep(&self, report: &SweepReport, elapsed: Duration) {
        self.sweeps.with_label_values(&["completed"]).inc();
        self.examined.inc_by(report.examined as u64);
        self.notifications
            .with_label_values(&["delivered"])
            .inc_by(report.notified as u64);
        self.notifications
            .with_label_values(&["failed"])
            .inc_by(report.failed() as u64);
        self.notifications
            .with_label_values(&["lost_race"])
            .inc_by(report.lost_race as u64);
        self.duration.observe(elapsed.as_secs_f64());
    }

    fn observe_aborted_sweep(&self) {
        self.sweeps.with_label_values(&["aborted"]).inc();
    }
}
