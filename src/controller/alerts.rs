//! # Deviation Alerting
//!
//! Compares measured against predicted output for each building and raises
//! an alert when the gap crosses a severity tier. The engine keeps a bounded,
//! newest-first log in process; persistence is the orchestrator's job.
//!
//! Per building the lifecycle is: no alert -> alert at severity S ->
//! acknowledged. Tiers are independent: a new unacknowledged alert at another
//! severity can be raised while one is still open. Repeats of the same
//! building and severity inside the dedup window are suppressed.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Alert, AlertFactors, AlertFilter, AlertStats, AlertType, Severity};

/// Below this predicted output (kW) deviations are not meaningful (night, dusk).
pub const MIN_PREDICTED_KW: f64 = 10.0;
/// Oldest entries are dropped beyond this many alerts.
pub const ALERT_LOG_CAPACITY: usize = 100;
/// Suppression window for repeat alerts of the same building and severity.
pub const DEDUP_WINDOW_SECS: i64 = 3600;

/// Fractional deviation at which each tier starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low: 0.10,
            medium: 0.20,
            high: 0.30,
            critical: 0.50,
        }
    }
}

impl AlertThresholds {
    pub fn severity(&self, difference_percentage: f64) -> Severity {
        if difference_percentage >= self.critical {
            Severity::Critical
        } else if difference_percentage >= self.high {
            Severity::High
        } else if difference_percentage >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Severity for a reading, or `None` when no alert is due.
    ///
    /// Deviations under the low tier are ignored in either direction. An
    /// overshoot past it is classified like an undershoot.
    pub fn classify(&self, actual_kw: f64, predicted_kw: f64) -> Option<Severity> {
        if !(predicted_kw >= MIN_PREDICTED_KW) {
            return None;
        }
        let difference_percentage = (actual_kw - predicted_kw).abs() / predicted_kw;
        if !(difference_percentage >= self.low) {
            return None;
        }
        Some(self.severity(difference_percentage))
    }
}

fn alert_title(severity: Severity, difference: f64, difference_percentage: f64) -> String {
    let percentage = (difference_percentage * 100.0).round();
    let direction = if difference < 0.0 { "Below" } else { "Above" };
    let label = match severity {
        Severity::Critical => "Critical Performance Issue",
        Severity::High => "High Performance Deviation",
        Severity::Medium => "Performance Warning",
        Severity::Low => "Minor Performance Deviation",
    };
    format!("{label} - {percentage}% {direction} Expected")
}

fn alert_message(
    building_name: &str,
    actual_kw: f64,
    predicted_kw: f64,
    difference: f64,
    difference_percentage: f64,
    factors: Option<&AlertFactors>,
) -> String {
    let percentage = (difference_percentage * 100.0).round();
    let direction = if difference < 0.0 { "below" } else { "above" };
    let mut message = format!(
        "{building_name} is generating {actual_kw:.1} kW, which is {:.1} kW ({percentage}%) {direction} \
         the predicted output of {predicted_kw:.1} kW.",
        difference.abs()
    );

    if let Some(factors) = factors {
        message.push_str("\n\nPossible causes:");
        for cause in factors.possible_causes() {
            message.push_str("\n- ");
            message.push_str(cause);
        }
    }
    message
}

fn new_alert_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("alert-{}-{}", now.timestamp_millis(), &suffix[..9])
}

/// Stateful alert log. Shared between concurrent batches behind a mutex.
#[derive(Debug)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
    dedup_window: Duration,
    capacity: usize,
    log: Mutex<VecDeque<Alert>>,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertEngine {
    pub fn new() -> Self {
        Self {
            thresholds: AlertThresholds::default(),
            dedup_window: Duration::seconds(DEDUP_WINDOW_SECS),
            capacity: ALERT_LOG_CAPACITY,
            log: Mutex::new(VecDeque::with_capacity(ALERT_LOG_CAPACITY)),
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn analyze(
        &self,
        building_id: &str,
        building_name: &str,
        actual_kw: f64,
        predicted_kw: f64,
        factors: Option<AlertFactors>,
    ) -> Option<Alert> {
        self.analyze_at(Utc::now(), building_id, building_name, actual_kw, predicted_kw, factors)
    }

    /// Returns the newly logged alert, or `None` when nothing was raised or
    /// the alert was suppressed as a repeat.
    pub fn analyze_at(
        &self,
        now: DateTime<Utc>,
        building_id: &str,
        building_name: &str,
        actual_kw: f64,
        predicted_kw: f64,
        factors: Option<AlertFactors>,
    ) -> Option<Alert> {
        let severity = self.thresholds.classify(actual_kw, predicted_kw)?;

        let mut log = self.log.lock();
        let duplicate = log.iter().any(|a| {
            a.building_id == building_id
                && a.severity == severity
                && !a.acknowledged
                && now - a.timestamp < self.dedup_window
        });
        if duplicate {
            debug!(building_id, %severity, "suppressing repeat alert");
            return None;
        }

        let difference = actual_kw - predicted_kw;
        let difference_percentage = difference.abs() / predicted_kw;
        let alert = Alert {
            id: new_alert_id(now),
            building_id: building_id.to_string(),
            building_name: building_name.to_string(),
            alert_type: factors.as_ref().map_or(AlertType::Performance, AlertFactors::classify),
            severity,
            title: alert_title(severity, difference, difference_percentage),
            message: alert_message(
                building_name,
                actual_kw,
                predicted_kw,
                difference,
                difference_percentage,
                factors.as_ref(),
            ),
            actual_kw,
            predicted_kw,
            difference,
            difference_percentage,
            timestamp: now,
            acknowledged: false,
            acknowledged_at: None,
            factors,
        };

        log.push_front(alert.clone());
        log.truncate(self.capacity);

        info!(
            building_id,
            alert_id = %alert.id,
            %severity,
            alert_type = %alert.alert_type,
            difference_percentage,
            "performance alert raised"
        );
        Some(alert)
    }

    pub fn acknowledge(&self, alert_id: &str) -> bool {
        self.acknowledge_at(alert_id, Utc::now())
    }

    /// True when the alert is in the log. Acknowledging twice changes nothing.
    pub fn acknowledge_at(&self, alert_id: &str, at: DateTime<Utc>) -> bool {
        let mut log = self.log.lock();
        match log.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                if !alert.acknowledged {
                    alert.acknowledged = true;
                    alert.acknowledged_at = Some(at);
                    info!(alert_id, "alert acknowledged");
                }
                true
            }
            None => false,
        }
    }

    /// Drops an alert from the log, e.g. when it could not be stored, so a
    /// later reading for the same building is not suppressed as a repeat.
    pub fn retract(&self, alert_id: &str) -> bool {
        let mut log = self.log.lock();
        match log.iter().position(|a| a.id == alert_id) {
            Some(index) => {
                log.remove(index);
                debug!(alert_id, "alert retracted");
                true
            }
            None => false,
        }
    }

    /// Matching alerts, newest first.
    pub fn alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        let mut alerts: Vec<_> = self.log.lock().iter().filter(|a| filter.matches(a)).cloned().collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts
    }

    /// Unacknowledged critical alerts.
    pub fn critical_alerts(&self) -> Vec<Alert> {
        self.alerts(&AlertFilter {
            acknowledged: Some(false),
            severity: Some(Severity::Critical),
            ..Default::default()
        })
    }

    pub fn stats(&self) -> AlertStats {
        AlertStats::from_alerts(self.log.lock().iter())
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }
}
