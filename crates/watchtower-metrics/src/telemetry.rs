use prometheus::{Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

/// 引擎自身的运行指标
pub struct EngineTelemetry {
    // 采集指标
    samples_total: CounterVec,
    collection_errors_total: CounterVec,
    skipped_ticks_total: CounterVec,

    // 告警指标
    alerts_total: CounterVec,
    emergencies_total: CounterVec,

    // 通知指标
    notifications_total: CounterVec,
    dead_letters_total: Counter,
    notification_queue_depth: Gauge,

    // 健康指标
    health_score: GaugeVec,

    registry: Registry,
}

impl EngineTelemetry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("watchtower".to_string()), None)?;

        let samples_total = CounterVec::new(
            Opts::new("samples_total", "Total number of metric samples stored"),
            &["system"],
        )?;
        registry.register(Box::new(samples_total.clone()))?;

        let collection_errors_total = CounterVec::new(
            Opts::new("collection_errors_total", "Total number of failed collections"),
            &["system"],
        )?;
        registry.register(Box::new(collection_errors_total.clone()))?;

        let skipped_ticks_total = CounterVec::new(
            Opts::new("skipped_ticks_total", "Poll ticks skipped because the previous probe was still running"),
            &["system"],
        )?;
        registry.register(Box::new(skipped_ticks_total.clone()))?;

        let alerts_total = CounterVec::new(
            Opts::new("alerts_total", "Total number of alerts raised"),
            &["level"],
        )?;
        registry.register(Box::new(alerts_total.clone()))?;

        let emergencies_total = CounterVec::new(
            Opts::new("emergencies_total", "Total number of emergency events"),
            &["kind"],
        )?;
        registry.register(Box::new(emergencies_total.clone()))?;

        let notifications_total = CounterVec::new(
            Opts::new("notifications_total", "Notification deliveries per channel"),
            &["channel", "outcome"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let dead_letters_total = Counter::new("dead_letters_total", "Notifications dropped after exhausting retries")?;
        registry.register(Box::new(dead_letters_total.clone()))?;

        let notification_queue_depth = Gauge::new("notification_queue_depth", "Pending notification tasks")?;
        registry.register(Box::new(notification_queue_depth.clone()))?;

        let health_score = GaugeVec::new(
            Opts::new("health_score", "Health score per monitored system (0-100)"),
            &["system"],
        )?;
        registry.register(Box::new(health_score.clone()))?;

        Ok(Self {
            samples_total,
            collection_errors_total,
            skipped_ticks_total,
            alerts_total,
            emergencies_total,
            notifications_total,
            dead_letters_total,
            notification_queue_depth,
            health_score,
            registry,
        })
    }

    pub fn record_samples(&self, system: &str, count: usize) {
        self.samples_total
            .with_label_values(&[system])
            .inc_by(count as f64);
    }

    pub fn record_collection_error(&self, system: &str) {
        self.collection_errors_total.with_label_values(&[system]).inc();
    }

    pub fn record_skipped_tick(&self, system: &str) {
        self.skipped_ticks_total.with_label_values(&[system]).inc();
    }

    pub fn record_alert(&self, level: &str) {
        self.alerts_total.with_label_values(&[level]).inc();
    }

    pub fn record_emergency(&self, kind: &str) {
        self.emergencies_total.with_label_values(&[kind]).inc();
    }

    pub fn record_delivery(&self, channel: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.notifications_total
            .with_label_values(&[channel, outcome])
            .inc();
    }

    pub fn record_dead_letter(&self) {
        self.dead_letters_total.inc();
    }

    pub fn dead_letters(&self) -> u64 {
        self.dead_letters_total.get() as u64
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.notification_queue_depth.set(depth as f64);
    }

    pub fn set_health(&self, system: &str, score: u8) {
        self.health_score
            .with_label_values(&[system])
            .set(score as f64);
    }

    /// Prometheus 文本格式导出
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_creation() {
        let telemetry = EngineTelemetry::new().unwrap();
        telemetry.record_dead_letter();
        let exported = telemetry.export().unwrap();
        assert!(exported.contains("watchtower_dead_letters_total 1"));
    }

    #[test]
    fn test_collection_and_alert_metrics() {
        let telemetry = EngineTelemetry::new().unwrap();

        telemetry.record_samples("performance", 8);
        telemetry.record_collection_error("database");
        telemetry.record_skipped_tick("database");
        telemetry.record_alert("critical");
        telemetry.set_health("performance", 92);

        let exported = telemetry.export().unwrap();
        assert!(exported.contains("watchtower_samples_total{system=\"performance\"} 8"));
        assert!(exported.contains("watchtower_collection_errors_total"));
        assert!(exported.contains("watchtower_alerts_total{level=\"critical\"} 1"));
        assert!(exported.contains("watchtower_health_score{system=\"performance\"} 92"));
    }

    #[test]
    fn test_notification_metrics() {
        let telemetry = EngineTelemetry::new().unwrap();

        telemetry.record_delivery("slack", true);
        telemetry.record_delivery("email", false);
        telemetry.set_queue_depth(3);

        let exported = telemetry.export().unwrap();
        assert!(exported.contains("watchtower_notifications_total{channel=\"email\",outcome=\"failure\"} 1"));
        assert!(exported.contains("watchtower_notification_queue_depth 3"));
        assert_eq!(telemetry.dead_letters(), 0);
    }
}
