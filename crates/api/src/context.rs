use tallybook_core::UserId;

/// Acting-user context for a request.
///
/// The outer layer owns authentication; this carries only the already
/// authenticated actor id for audit fields. Immutable, and required for all
/// ledger routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: UserId,
}

impl ActorContext {
    pub fn new(actor_id: UserId) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> UserId {
        self.actor_id
    }
}
