//! Capabilities checked before a privileged operation runs.
//!
//! The engine never decides on its own who is a teacher or an admin: it
//! asks the roster whether an actor holds a [`Capability`] and refuses with
//! `PermissionDenied` otherwise.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GroupId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Open a new auction for a group. Held by the group's teacher and admins.
    CreateAuction { group: GroupId },
    /// Edit, close or delete an auction. Held by its creator and by admins.
    ManageAuction { creator: UserId },
    /// Place or raise a bid on behalf of `student` in `group`. Held by the
    /// student and by the group's teacher.
    PlaceBidAs { student: UserId, group: GroupId },
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateAuction { group } => write!(f, "create_auction({group})"),
            Self::ManageAuction { creator } => write!(f, "manage_auction({creator})"),
            Self::PlaceBidAs { student, group } => write!(f, "place_bid_as({student}, {group})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_capability() {
        let group = GroupId::from_bytes([1u8; 16]);
        let cap = Capability::CreateAuction { group };
        assert!(cap.to_string().starts_with("create_auction(group:"));
        let student = UserId::new();
        assert!(
            Capability::PlaceBidAs { student, group }
                .to_string()
                .contains(&student.to_string())
        );
    }
}
