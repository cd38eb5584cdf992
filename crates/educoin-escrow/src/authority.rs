//! Capability checks, evaluated once at the engine boundary.

use std::sync::Arc;

use educoin_ledger::Roster;
use educoin_types::{Capability, EducoinError, Result, UserId};
use tracing::debug;

pub struct Authority {
    roster: Arc<dyn Roster>,
}

impl Authority {
    #[must_use]
    pub fn new(roster: Arc<dyn Roster>) -> Self {
        Self { roster }
    }

    #[must_use]
    pub fn allows(&self, actor: UserId, capability: Capability) -> bool {
        match capability {
            Capability::CreateAuction { group } => {
                self.roster.teacher_of(group) == Some(actor) || self.roster.is_admin(actor)
            }
            Capability::ManageAuction { creator } => {
                actor == creator || self.roster.is_admin(actor)
            }
            Capability::PlaceBidAs { student, group } => {
                actor == student || self.roster.teacher_of(group) == Some(actor)
            }
        }
    }

    pub fn require(&self, actor: UserId, capability: Capability) -> Result<()> {
        if self.allows(actor, capability) {
            return Ok(());
        }
        debug!(actor = %actor, capability = %capability, "Permission denied");
        Err(EducoinError::PermissionDenied {
            actor,
            capability: capability.to_string(),
        })
    }
}
