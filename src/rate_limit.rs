// ====================================================================================
// src/rate_limit.rs - 每连接令牌桶限流
// ====================================================================================
use dashmap::DashMap;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct RateBucket {
    pub last_refill: Instant,
    pub tokens: f64,
}

// 容量与每秒补充速率相同，连续补充
pub struct RateLimiter {
    rate: f64,
    buckets: DashMap<Uuid, RateBucket>,
}

impl RateLimiter {
    pub fn new(rate: f64) -> Self {
        Self { rate, buckets: DashMap::new() }
    }

    pub fn allow(&self, conn_id: Uuid) -> bool {
        self.allow_at(conn_id, Instant::now())
    }

    pub fn allow_at(&self, conn_id: Uuid, now: Instant) -> bool {
        // 首次出现的连接以满桶初始化
        let mut bucket = self
            .buckets
            .entry(conn_id)
            .or_insert(RateBucket { last_refill: now, tokens: self.rate });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.rate);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn forget(&self, conn_id: Uuid) {
        self.buckets.remove(&conn_id);
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn burst_is_capped_at_capacity() {
        let limiter = RateLimiter::new(10.0);
        let conn = Uuid::new_v4();
        let t0 = Instant::now();

        let accepted = (0..20).filter(|_| limiter.allow_at(conn, t0)).count();
        assert_eq!(accepted, 10);

        assert!(limiter.allow_at(conn, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn refill_is_continuous_and_capped() {
        let limiter = RateLimiter::new(10.0);
        let conn = Uuid::new_v4();
        let t0 = Instant::now();
        for _ in 0..10 {
            assert!(limiter.allow_at(conn, t0));
        }
        assert!(!limiter.allow_at(conn, t0));

        // 100ms 补充一个令牌
        let t1 = t0 + Duration::from_millis(100);
        assert!(limiter.allow_at(conn, t1));
        assert!(!limiter.allow_at(conn, t1));

        // 长时间空闲后也只有满桶
        let t2 = t1 + Duration::from_secs(60);
        let accepted = (0..30).filter(|_| limiter.allow_at(conn, t2)).count();
        assert_eq!(accepted, 10);
    }

    #[test]
    fn connections_have_independent_buckets() {
        let limiter = RateLimiter::new(2.0);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let t0 = Instant::now();
        assert!(limiter.allow_at(a, t0));
        assert!(limiter.allow_at(a, t0));
        assert!(!limiter.allow_at(a, t0));
        assert!(limiter.allow_at(b, t0));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn forget_discards_bucket() {
        let limiter = RateLimiter::new(1.0);
        let conn = Uuid::new_v4();
        let t0 = Instant::now();
        assert!(limiter.allow_at(conn, t0));
        assert!(!limiter.allow_at(conn, t0));
        limiter.forget(conn);
        assert_eq!(limiter.tracked(), 0);
        assert!(limiter.allow_at(conn, t0));
    }
}
