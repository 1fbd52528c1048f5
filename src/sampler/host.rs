/// Host metadata sampler.
///
/// Samples slow-moving host identity facts (hostname, OS, architecture,
/// agent version) into the `metadata` inventory category. Hardware and
/// kernel counter acquisition belongs to platform integrations; this
/// sampler only covers what the standard library can answer.
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use tokio::fs;

use crate::error::AgentResult;
use crate::sampler::{Sample, Sampler};

/// Sampler for host identity metadata.
#[derive(Debug)]
pub struct HostInfoSampler {
    interval: Duration,
}

impl HostInfoSampler {
    /// Sampler ticking at `interval`.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    async fn hostname() -> Option<String> {
        if let Ok(name) = std::env::var("HOSTNAME") {
            if !name.is_empty() {
                return Some(name);
            }
        }
        fs::read_to_string("/etc/hostname")
            .await
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl Sampler for HostInfoSampler {
    fn name(&self) -> &str {
        "host_info"
    }

    fn category(&self) -> &str {
        "metadata"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn sample(&self) -> AgentResult<Vec<Sample>> {
        let mut facts = Map::new();
        facts.insert("entityKey".into(), JsonValue::from("host"));
        facts.insert("eventType".into(), JsonValue::from("HostInfoSample"));
        if let Some(hostname) = Self::hostname().await {
            facts.insert("hostname".into(), JsonValue::from(hostname));
        }
        facts.insert("operatingSystem".into(), JsonValue::from(std::env::consts::OS));
        facts.insert("architecture".into(), JsonValue::from(std::env::consts::ARCH));
        facts.insert(
            "agentVersion".into(),
            JsonValue::from(env!("CARGO_PKG_VERSION")),
        );
        Ok(vec![Sample::Flat(facts)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_one_metadata_sample() {
        let sampler = HostInfoSampler::new(Duration::from_secs(60));
        let samples = sampler.sample().await.unwrap();
        assert_eq!(samples.len(), 1);

        let Sample::Flat(map) = &samples[0] else {
            panic!("expected a flat sample");
        };
        assert_eq!(map["entityKey"], "host");
        assert!(map.contains_key("operatingSystem"));
        assert!(!samples[0].is_process());
    }
}
