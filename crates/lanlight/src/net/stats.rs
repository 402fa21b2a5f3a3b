use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Datagrams that failed header validation.
    pub packets_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub timeouts: u64,
    pub rtt_ms: f32,
    pub rtt_variance: f32,
}

impl NetworkStats {
    pub fn record_rtt(&mut self, elapsed: Duration) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let rtt = elapsed.as_secs_f32() * 1000.0;
        if self.rtt_ms == 0.0 {
            self.rtt_ms = rtt;
            self.rtt_variance = rtt / 2.0;
            return;
        }

        let diff = (rtt - self.rtt_ms).abs();
        self.rtt_variance = (1.0 - BETA) * self.rtt_variance + BETA * diff;
        self.rtt_ms = (1.0 - ALPHA) * self.rtt_ms + ALPHA * rtt;
    }

    /// Share of requests that ended in a timeout rather than a reply.
    pub fn timeout_percent(&self) -> f32 {
        let settled = self.timeouts + self.packets_received;
        if settled == 0 {
            return 0.0;
        }
        self.timeouts as f32 / settled as f32 * 100.0
    }
}

pub fn rand_u64() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hash, Hasher};
    use std::time::Instant;

    let mut hasher = RandomState::new().build_hasher();
    Instant::now().hash(&mut hasher);
    hasher.finish()
}

/// Random non-zero id used as the client source.
pub fn rand_source() -> u32 {
    loop {
        let value = rand_u64();
        let source = (value ^ (value >> 32)) as u32;
        if source != 0 {
            return source;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_rtt_sample_seeds_estimate() {
        let mut stats = NetworkStats::default();
        stats.record_rtt(Duration::from_millis(40));
        assert!((stats.rtt_ms - 40.0).abs() < 0.01);

        stats.record_rtt(Duration::from_millis(80));
        assert!((stats.rtt_ms - 45.0).abs() < 0.01);
    }

    #[test]
    fn test_source_is_never_zero() {
        for _ in 0..64 {
            assert_ne!(rand_source(), 0);
        }
    }

    #[test]
    fn test_timeout_percent() {
        let stats = NetworkStats {
            packets_received: 3,
            timeouts: 1,
            ..Default::default()
        };
        assert!((stats.timeout_percent() - 25.0).abs() < 0.01);
        assert_eq!(NetworkStats::default().timeout_percent(), 0.0);
    }
}
