//! Group membership lookup.
//!
//! Rosters belong to the surrounding application; the ledger only asks
//! questions about them. [`InMemoryRoster`] is the reference
//! implementation used by tests and embedders without their own store.

use std::collections::{BTreeSet, HashMap, HashSet};

use educoin_types::{EducoinError, GroupId, Result, UserId};
use parking_lot::RwLock;

pub trait Roster: Send + Sync {
    /// Whether `user` is a student of `group`.
    fn is_member(&self, group: GroupId, user: UserId) -> bool;
    /// Every student of `group`, in a stable order.
    fn members(&self, group: GroupId) -> Vec<UserId>;
    /// The teacher owning `group`.
    fn teacher_of(&self, group: GroupId) -> Option<UserId>;
    fn is_admin(&self, user: UserId) -> bool;
}

#[derive(Debug)]
struct GroupRoster {
    teacher: UserId,
    students: BTreeSet<UserId>,
}

#[derive(Debug, Default)]
struct RosterState {
    groups: HashMap<GroupId, GroupRoster>,
    admins: HashSet<UserId>,
}

#[derive(Debug, Default)]
pub struct InMemoryRoster {
    state: RwLock<RosterState>,
}

impl InMemoryRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group and its teacher. Re-registering replaces the teacher
    /// and keeps the students.
    pub fn add_group(&self, group: GroupId, teacher: UserId) {
        let mut state = self.state.write();
        state
            .groups
            .entry(group)
            .and_modify(|g| g.teacher = teacher)
            .or_insert_with(|| GroupRoster {
                teacher,
                students: BTreeSet::new(),
            });
    }

    pub fn add_member(&self, group: GroupId, student: UserId) -> Result<()> {
        let mut state = self.state.write();
        let roster = state
            .groups
            .get_mut(&group)
            .ok_or_else(|| EducoinError::not_found("group", group))?;
        roster.students.insert(student);
        Ok(())
    }

    /// Returns whether the student was on the roster.
    pub fn remove_member(&self, group: GroupId, student: UserId) -> bool {
        self.state
            .write()
            .groups
            .get_mut(&group)
            .is_some_and(|g| g.students.remove(&student))
    }

    pub fn add_admin(&self, user: UserId) {
        self.state.write().admins.insert(user);
    }
}

impl Roster for InMemoryRoster {
    fn is_member(&self, group: GroupId, user: UserId) -> bool {
        self.state
            .read()
            .groups
            .get(&group)
            .is_some_and(|g| g.students.contains(&user))
    }

    fn members(&self, group: GroupId) -> Vec<UserId> {
        self.state
            .read()
            .groups
            .get(&group)
            .map(|g| g.students.iter().copied().collect())
            .unwrap_or_default()
    }

    fn teacher_of(&self, group: GroupId) -> Option<UserId> {
        self.state.read().groups.get(&group).map(|g| g.teacher)
    }

    fn is_admin(&self, user: UserId) -> bool {
        self.state.read().admins.contains(&user)
    }
}
