//! Idle-disconnect sweeping (spec §4.6): slots sitting unused past the
//! configured timeout are disconnected so their connection slot doesn't
//! sit open forever against a server's connection limit.

use std::time::{Duration, Instant};

use crate::engine_pool::{EnginePool, SlotId};

/// Disconnects every slot that has been idle for at least `timeout`,
/// returning their ids so the caller can tear down the underlying
/// connection (send `QUIT`, close the subprocess, etc).
pub fn sweep_idle(pool: &mut EnginePool, now: Instant, timeout: Duration) -> Vec<SlotId> {
    let idle = pool.idle_since_before(now, timeout);
    for &id in &idle {
        pool.disconnect_slot(id);
    }
    idle
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::server::{Encoding, LogonType, Protocol, Server};

    fn server() -> Server {
        Server {
            protocol: Protocol::Ftp,
            host: "a".into(),
            port: 21,
            user: "u".into(),
            logon_type: LogonType::Normal,
            encoding: Encoding::Auto,
            timezone_offset_minutes: None,
            max_connections: 1,
            post_login_commands: vec![],
            bypass_proxy: false,
            name: None,
        }
    }

    #[test]
    fn sweep_disconnects_only_slots_past_timeout() {
        let mut pool = EnginePool::new(2);
        let s = server();
        let slot = pool.acquire_for_transfer(&s, 2, None).unwrap();
        let base = Instant::now();
        pool.release_after_transfer(slot, base);
        let later = base + Duration::from_secs(61);
        let swept = sweep_idle(&mut pool, later, Duration::from_secs(60));
        assert_eq!(swept, vec![slot]);
        assert!(pool.slot(slot).unwrap().server.is_none());
    }

    #[test]
    fn sweep_leaves_recently_idle_slots_connected() {
        let mut pool = EnginePool::new(1);
        let s = server();
        let slot = pool.acquire_for_transfer(&s, 2, None).unwrap();
        let base = Instant::now();
        pool.release_after_transfer(slot, base);
        let soon = base + Duration::from_secs(5);
        let swept = sweep_idle(&mut pool, soon, Duration::from_secs(60));
        assert!(swept.is_empty());
    }
}
