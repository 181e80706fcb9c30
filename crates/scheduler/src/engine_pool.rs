//! The bounded pool of engine slots transfers are dispatched onto (spec
//! §4.6). A slot is a logical connection: it may be unbound (no server),
//! bound and idle, bound and busy running a transfer, or bound and held
//! by an interactive session (directory browsing) that queued transfers
//! may *borrow* for the duration of a single operation when the pool is
//! saturated.

use std::time::Instant;

use xfer_core::command::TransferDirection;
use xfer_core::server::Server;

pub type SlotId = usize;

/// Identifies the interactive (non-queue) session that owns a slot, so a
/// borrowed slot can be handed back to its rightful owner rather than
/// being claimed outright by the transfer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InteractiveSessionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    /// No session holds this slot; it is free to be bound to any server.
    Unbound,
    /// A queued transfer is actively using this slot.
    Transfer,
    /// An interactive session owns this slot. `borrowed` is set while a
    /// queued transfer is temporarily using it; the slot reverts to
    /// `Interactive` (not `Unbound`) the moment the borrower finishes.
    Interactive { session: InteractiveSessionId, borrowed: bool },
}

#[derive(Debug, Clone)]
pub struct EngineSlot {
    pub id: SlotId,
    pub server: Option<Server>,
    owner: Owner,
    pub connected: bool,
    pub idle_since: Option<Instant>,
    /// Set while a file transfer is running on this slot, so the pool
    /// can report how many slots are busy in each direction for
    /// `concurrent_download_limit`/`concurrent_upload_limit` gating.
    pub active_direction: Option<TransferDirection>,
}

impl EngineSlot {
    fn new(id: SlotId) -> Self {
        Self {
            id,
            server: None,
            owner: Owner::Unbound,
            connected: false,
            idle_since: None,
            active_direction: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.owner, Owner::Unbound) || matches!(self.owner, Owner::Interactive { borrowed: false, .. })
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self.owner, Owner::Interactive { borrowed: true, .. })
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.owner, Owner::Interactive { .. })
    }
}

/// A fixed-size pool of engine slots, sized by
/// `ConfigOracle::max_simultaneous_transfers`.
pub struct EnginePool {
    slots: Vec<EngineSlot>,
}

impl EnginePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(EngineSlot::new).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, id: SlotId) -> Option<&EngineSlot> {
        self.slots.get(id)
    }

    /// How many slots are currently bound to `server` and not idle-and-
    /// free, i.e. count toward that server's connection cap.
    pub fn connections_to(&self, server: &Server) -> usize {
        self.slots
            .iter()
            .filter(|s| s.server.as_ref() == Some(server) && !matches!(s.owner, Owner::Unbound))
            .count()
    }

    /// How many slots are currently running a transfer in `direction`,
    /// for `ConfigOracle::concurrent_download_limit`/
    /// `concurrent_upload_limit` gating.
    pub fn count_active_direction(&self, direction: TransferDirection) -> usize {
        self.slots.iter().filter(|s| s.active_direction == Some(direction)).count()
    }

    /// Picks a slot for a queued transfer targeting `server`, in order
    /// of preference: an idle slot already bound to the server (reuse
    /// the connection), then an unbound slot if the server has not yet
    /// hit `max_connections`, then — only if the pool has no free
    /// capacity at all — an idle interactive slot bound to that server,
    /// which is *borrowed* rather than claimed. `direction` is recorded
    /// so `count_active_direction` can report per-direction usage; pass
    /// `None` for commands that aren't file transfers.
    pub fn acquire_for_transfer(
        &mut self,
        server: &Server,
        max_connections: usize,
        direction: Option<TransferDirection>,
    ) -> Option<SlotId> {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.server.as_ref() == Some(server) && matches!(s.owner, Owner::Unbound))
        {
            slot.owner = Owner::Transfer;
            slot.idle_since = None;
            slot.active_direction = direction;
            return Some(slot.id);
        }

        let connected = self.connections_to(server);
        if connected < max_connections {
            if let Some(slot) = self.slots.iter_mut().find(|s| matches!(s.owner, Owner::Unbound) && s.server.is_none())
            {
                slot.server = Some(server.clone());
                slot.owner = Owner::Transfer;
                slot.idle_since = None;
                slot.active_direction = direction;
                return Some(slot.id);
            }
        }

        if let Some(slot) = self.slots.iter_mut().find(|s| {
            s.server.as_ref() == Some(server) && matches!(s.owner, Owner::Interactive { borrowed: false, .. })
        }) {
            if let Owner::Interactive { borrowed, .. } = &mut slot.owner {
                *borrowed = true;
            }
            slot.idle_since = None;
            slot.active_direction = direction;
            return Some(slot.id);
        }

        None
    }

    /// Releases a slot after a transfer finishes. A borrowed slot
    /// reverts to its interactive owner rather than becoming unbound.
    pub fn release_after_transfer(&mut self, id: SlotId, now: Instant) {
        if let Some(slot) = self.slots.get_mut(id) {
            match &mut slot.owner {
                Owner::Interactive { borrowed, .. } => *borrowed = false,
                Owner::Transfer => slot.owner = Owner::Unbound,
                Owner::Unbound => {}
            }
            slot.idle_since = Some(now);
            slot.active_direction = None;
        }
    }

    pub fn claim_for_interactive(&mut self, server: Server, session: InteractiveSessionId) -> Option<SlotId> {
        let slot = self.slots.iter_mut().find(|s| matches!(s.owner, Owner::Unbound))?;
        slot.server = Some(server);
        slot.owner = Owner::Interactive { session, borrowed: false };
        slot.idle_since = None;
        Some(slot.id)
    }

    pub fn release_interactive(&mut self, id: SlotId, now: Instant) {
        if let Some(slot) = self.slots.get_mut(id) {
            if matches!(slot.owner, Owner::Interactive { .. }) {
                slot.owner = Owner::Unbound;
                slot.server = None;
                slot.idle_since = Some(now);
            }
        }
    }

    /// Slots idle (unbound or non-borrowed interactive) for at least
    /// `timeout`, candidates for `crates/scheduler`'s idle-disconnect
    /// sweep.
    pub fn idle_since_before(&self, now: Instant, timeout: std::time::Duration) -> Vec<SlotId> {
        self.slots
            .iter()
            .filter(|s| s.is_idle() && s.server.is_some())
            .filter(|s| s.idle_since.is_some_and(|since| now.duration_since(since) >= timeout))
            .map(|s| s.id)
            .collect()
    }

    pub fn disconnect_slot(&mut self, id: SlotId) {
        if let Some(slot) = self.slots.get_mut(id) {
            slot.server = None;
            slot.owner = Owner::Unbound;
            slot.connected = false;
            slot.idle_since = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use xfer_core::server::{Encoding, LogonType, Protocol};

    fn server(host: &str) -> Server {
        Server {
            protocol: Protocol::Ftp,
            host: host.into(),
            port: 21,
            user: "u".into(),
            logon_type: LogonType::Normal,
            encoding: Encoding::Auto,
            timezone_offset_minutes: None,
            max_connections: 2,
            post_login_commands: vec![],
            bypass_proxy: false,
            name: None,
        }
    }

    #[test]
    fn acquire_binds_an_unbound_slot_first() {
        let mut pool = EnginePool::new(2);
        let s = server("a");
        let slot = pool.acquire_for_transfer(&s, 2, None).unwrap();
        assert_eq!(pool.slot(slot).unwrap().server, Some(s));
    }

    #[test]
    fn connection_cap_blocks_a_third_slot() {
        let mut pool = EnginePool::new(3);
        let s = server("a");
        pool.acquire_for_transfer(&s, 2, None).unwrap();
        pool.acquire_for_transfer(&s, 2, None).unwrap();
        assert!(pool.acquire_for_transfer(&s, 2, None).is_none());
    }

    #[test]
    fn released_slot_can_be_reacquired_for_the_same_server() {
        let mut pool = EnginePool::new(1);
        let s = server("a");
        let slot = pool.acquire_for_transfer(&s, 2, None).unwrap();
        pool.release_after_transfer(slot, Instant::now());
        let again = pool.acquire_for_transfer(&s, 2, None).unwrap();
        assert_eq!(slot, again);
    }

    #[test]
    fn transfer_can_borrow_an_idle_interactive_slot_when_saturated() {
        let mut pool = EnginePool::new(1);
        let s = server("a");
        let session = InteractiveSessionId(1);
        let slot = pool.claim_for_interactive(s.clone(), session).unwrap();
        let borrowed = pool.acquire_for_transfer(&s, 2, None).unwrap();
        assert_eq!(slot, borrowed);
        assert!(pool.slot(slot).unwrap().is_borrowed());
        pool.release_after_transfer(borrowed, Instant::now());
        assert!(pool.slot(slot).unwrap().is_interactive());
        assert!(!pool.slot(slot).unwrap().is_borrowed());
    }

    #[test]
    fn idle_slots_past_timeout_are_reported() {
        let mut pool = EnginePool::new(1);
        let s = server("a");
        let slot = pool.acquire_for_transfer(&s, 2, None).unwrap();
        let later = Instant::now() + Duration::from_secs(120);
        pool.release_after_transfer(slot, later - Duration::from_secs(90));
        let idle = pool.idle_since_before(later, Duration::from_secs(60));
        assert_eq!(idle, vec![slot]);
    }
}
