use serde::Serialize;

use crate::{GroupId, NetGroupId};

/// Identity shared by all slot groups of one net.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NetGroupKey {
    /// Slot group name.
    pub name: String,
    /// Network number.
    pub network: u32,
    /// Transmission security crypto variable.
    pub tsec: u32,
}

/// Slot groups sharing a channel. The first member owns the generated slot table.
#[derive(Debug, Clone, Serialize)]
pub struct NetGroup {
    key: NetGroupKey,
    members: Vec<GroupId>,
}

impl NetGroup {
    /// Identity of the net group.
    #[must_use]
    pub fn key(&self) -> &NetGroupKey {
        &self.key
    }

    /// Members in the order they joined.
    #[must_use]
    pub fn members(&self) -> &[GroupId] {
        &self.members
    }

    /// The member that joined first.
    #[must_use]
    pub fn first(&self) -> Option<GroupId> {
        self.members.first().copied()
    }
}

/// All net groups of one simulation run.
///
/// Index 0 is a reserved entry that no group ever joins; a group reporting
/// [`NetGroupId::UNATTACHED`] is not a member of any net.
#[derive(Debug, Clone, Serialize)]
pub struct NetGroupRegistry {
    groups: Vec<NetGroup>,
}

impl Default for NetGroupRegistry {
    fn default() -> Self {
        Self {
            groups: vec![Self::sentinel()],
        }
    }
}

impl NetGroupRegistry {
    fn sentinel() -> NetGroup {
        NetGroup {
            key: NetGroupKey {
                name: String::new(),
                network: 0,
                tsec: 0,
            },
            members: Vec::new(),
        }
    }

    /// Looks up the net group with the given key.
    #[must_use]
    pub fn find(&self, key: &NetGroupKey) -> Option<NetGroupId> {
        self.groups
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, group)| &group.key == key)
            .map(|(index, _)| NetGroupId::from(index))
    }

    /// Adds `group` to the net group identified by `key`, creating the net group if needed.
    ///
    /// Returns the net group's ID and whether the group was newly added; joining a net twice
    /// leaves the membership unchanged.
    pub fn join(&mut self, key: &NetGroupKey, group: GroupId) -> (NetGroupId, bool) {
        let id = self.find(key).unwrap_or_else(|| {
            self.groups.push(NetGroup {
                key: key.clone(),
                members: Vec::new(),
            });
            NetGroupId::from(self.groups.len() - 1)
        });
        let members = &mut self.groups[usize::from(id)].members;
        if members.contains(&group) {
            (id, false)
        } else {
            members.push(group);
            (id, true)
        }
    }

    /// Removes `group` from the net group `id`. Returns `false` if it was not a member.
    pub fn leave(&mut self, id: NetGroupId, group: GroupId) -> bool {
        if !id.is_attached() {
            return false;
        }
        match self.groups.get_mut(usize::from(id)) {
            Some(net) => match net.members.iter().position(|&member| member == group) {
                Some(position) => {
                    net.members.remove(position);
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// The net group with the given ID. The sentinel is never returned.
    #[must_use]
    pub fn get(&self, id: NetGroupId) -> Option<&NetGroup> {
        if id.is_attached() {
            self.groups.get(usize::from(id))
        } else {
            None
        }
    }

    /// Members of the net group, or an empty list for an unknown or sentinel ID.
    #[must_use]
    pub fn members(&self, id: NetGroupId) -> &[GroupId] {
        match self.get(id) {
            Some(group) => group.members(),
            None => &[],
        }
    }

    /// Iterates over real net groups with their IDs.
    pub fn iter(&self) -> impl Iterator<Item = (NetGroupId, &NetGroup)> {
        self.groups
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, group)| (NetGroupId::from(index), group))
    }

    /// Number of net groups, not counting the sentinel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len() - 1
    }

    /// Whether no net group was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all net groups, leaving only the sentinel.
    pub fn clear(&mut self) {
        self.groups.truncate(1);
        self.groups[0] = Self::sentinel();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(name: &str, network: u32, tsec: u32) -> NetGroupKey {
        NetGroupKey {
            name: name.to_string(),
            network,
            tsec,
        }
    }

    #[test]
    fn test_join_creates_and_reuses() {
        let mut registry = NetGroupRegistry::default();
        assert!(registry.is_empty());
        let (a, added) = registry.join(&key("ppli", 1, 2), GroupId::from(0));
        assert!(added);
        assert!(a.is_attached());
        let (b, added) = registry.join(&key("ppli", 1, 2), GroupId::from(3));
        assert!(added);
        assert_eq!(a, b);
        let (c, _) = registry.join(&key("ppli", 1, 3), GroupId::from(4));
        assert_ne!(a, c);
        let (d, _) = registry.join(&key("ppli", 2, 2), GroupId::from(5));
        assert_ne!(a, d);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.members(a), &[GroupId::from(0), GroupId::from(3)]);
        assert_eq!(registry.get(a).and_then(NetGroup::first), Some(GroupId::from(0)));
    }

    #[test]
    fn test_duplicate_join_is_ignored() {
        let mut registry = NetGroupRegistry::default();
        let (id, _) = registry.join(&key("voice", 0, 0), GroupId::from(1));
        assert_eq!(registry.join(&key("voice", 0, 0), GroupId::from(1)), (id, false));
        assert_eq!(registry.members(id).len(), 1);
    }

    #[test]
    fn test_leave() {
        let mut registry = NetGroupRegistry::default();
        let (id, _) = registry.join(&key("voice", 0, 0), GroupId::from(1));
        registry.join(&key("voice", 0, 0), GroupId::from(2));
        assert!(registry.leave(id, GroupId::from(1)));
        assert!(!registry.leave(id, GroupId::from(1)));
        assert!(!registry.leave(NetGroupId::UNATTACHED, GroupId::from(2)));
        assert_eq!(registry.members(id), &[GroupId::from(2)]);
        assert_eq!(registry.get(id).and_then(NetGroup::first), Some(GroupId::from(2)));
    }

    #[test]
    fn test_sentinel_is_hidden() {
        let registry = NetGroupRegistry::default();
        assert!(registry.get(NetGroupId::UNATTACHED).is_none());
        assert!(registry.members(NetGroupId::UNATTACHED).is_empty());
        assert_eq!(registry.iter().count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut registry = NetGroupRegistry::default();
        registry.join(&key("a", 0, 0), GroupId::from(1));
        registry.join(&key("b", 0, 0), GroupId::from(2));
        registry.clear();
        assert!(registry.is_empty());
        let (id, _) = registry.join(&key("b", 0, 0), GroupId::from(2));
        assert_eq!(id, NetGroupId::from(1));
    }
}
