use crate::model::MetricSample;
use serde::{Deserialize, Serialize};

/// 窗口统计（仪表盘与自动恢复使用）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub current: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl WindowStats {
    /// 按时间顺序的采样计算统计，空切片返回 None
    pub fn from_samples(samples: &[MetricSample]) -> Option<Self> {
        let last = samples.last()?;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for sample in samples {
            sum += sample.value;
            min = min.min(sample.value);
            max = max.max(sample.value);
        }

        Some(Self {
            current: last.value,
            average: sum / samples.len() as f64,
            min,
            max,
            count: samples.len(),
        })
    }
}

/// 最近窗口查询结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentWindow {
    pub samples: Vec<MetricSample>,
    pub stats: Option<WindowStats>,
}

impl RecentWindow {
    pub fn new(samples: Vec<MetricSample>) -> Self {
        let stats = WindowStats::from_samples(&samples);
        Self { samples, stats }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn current(&self) -> Option<f64> {
        self.stats.map(|s| s.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_stats() {
        let samples: Vec<MetricSample> = [10.0, 30.0, 20.0]
            .iter()
            .map(|v| MetricSample::new("performance", "cpu_usage", *v))
            .collect();

        let stats = WindowStats::from_samples(&samples).unwrap();
        assert_eq!(stats.current, 20.0);
        assert_eq!(stats.average, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn test_empty_window() {
        let window = RecentWindow::new(Vec::new());
        assert!(window.is_empty());
        assert!(window.current().is_none());
    }
}
