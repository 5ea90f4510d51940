use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;

use crate::error::BackendError;

/// Live traffic gauges shown next to the row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LiveMetrics {
    pub total_visitors: u64,
    pub active_users: u64,
    pub page_views: u64,
}

/// Where traffic gauges come from. Swap in a real analytics backend here.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self) -> Result<LiveMetrics, BackendError>;
}

/// Random placeholder gauges. There is no traffic telemetry behind these.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedMetrics;

#[async_trait]
impl MetricsSource for SimulatedMetrics {
    async fn sample(&self) -> Result<LiveMetrics, BackendError> {
        let mut rng = rand::thread_rng();
        Ok(LiveMetrics {
            total_visitors: rng.gen_range(50..150),
            active_users: rng.gen_range(1..11),
            page_views: rng.gen_range(200..700),
        })
    }
}

/// Fixed gauges, for tests and offline demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMetrics(pub LiveMetrics);

#[async_trait]
impl MetricsSource for FixedMetrics {
    async fn sample(&self) -> Result<LiveMetrics, BackendError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_ranges() {
        for _ in 0..50 {
            let m = SimulatedMetrics.sample().await.unwrap();
            assert!((50..150).contains(&m.total_visitors));
            assert!((1..11).contains(&m.active_users));
            assert!((200..700).contains(&m.page_views));
        }
    }
}
