//! The engine context (spec §6): the handful of shared services every
//! session and operation reaches through rather than threading as
//! separate parameters.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::options::ConfigOracle;
use crate::rate_limiter::RateLimiter;

/// Shared, process-wide services available to every session. Cheap to
/// clone: everything inside is an `Arc`.
#[derive(Clone)]
pub struct EngineContext {
    config: Arc<dyn ConfigOracle>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl EngineContext {
    pub fn new(config: Arc<dyn ConfigOracle>) -> Self {
        let now = Instant::now();
        let rate_limiter = RateLimiter::new(
            config.rate_limit(crate::command::TransferDirection::Download),
            config.rate_limit(crate::command::TransferDirection::Upload),
            now,
        );
        Self {
            config,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
        }
    }

    pub fn config(&self) -> &dyn ConfigOracle {
        self.config.as_ref()
    }

    /// Locks and returns the shared rate limiter. Held only for the
    /// duration of a single `try_consume`/`set_rate` call by convention;
    /// never held across an I/O await point.
    pub fn rate_limiter(&self) -> std::sync::MutexGuard<'_, RateLimiter> {
        self.rate_limiter.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StaticConfig;

    #[test]
    fn context_shares_rate_limiter_across_clones() {
        let ctx = EngineContext::new(Arc::new(StaticConfig::default()));
        let cloned = ctx.clone();
        {
            let mut limiter = ctx.rate_limiter();
            let _ = limiter.try_consume(
                crate::command::TransferDirection::Download,
                0,
                Instant::now(),
            );
        }
        // Same underlying Arc<Mutex<_>>, so this must not deadlock.
        let _ = cloned.rate_limiter();
    }
}
