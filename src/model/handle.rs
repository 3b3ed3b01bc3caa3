//! Handle groups
//!
//! Every remote object handle received during a pause is pinned to that
//! pause's group. Invalidating the group makes every dependent handle stale
//! at once.

use crate::protocol::ids::RemoteObjectId;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Server-side object group, client-side validity token
#[derive(Debug)]
pub struct HandleGroup {
    name: String,
    valid: AtomicBool,
}

impl HandleGroup {
    /// New group named `<prefix>-<uuid>`
    pub fn new(prefix: &str) -> Arc<Self> {
        Arc::new(Self {
            name: format!("{}-{}", prefix, Uuid::new_v4()),
            valid: AtomicBool::new(true),
        })
    }

    /// Object group name sent to the backend
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Returns true if this call invalidated the group
    pub fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }

    /// Fail with `StaleHandle` once invalidated
    pub fn check(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::stale_handle(format!("object group {} was released", self.name)))
        }
    }
}

/// Remote object handle tagged with its group
#[derive(Debug, Clone)]
pub struct RemoteHandle {
    id: RemoteObjectId,
    group: Arc<HandleGroup>,
}

impl RemoteHandle {
    pub fn new(id: RemoteObjectId, group: Arc<HandleGroup>) -> Self {
        Self { id, group }
    }

    /// The object id, if the group is still valid
    pub fn id(&self) -> Result<&RemoteObjectId> {
        self.group.check()?;
        Ok(&self.id)
    }

    pub fn group(&self) -> &Arc<HandleGroup> {
        &self.group
    }

    pub fn is_stale(&self) -> bool {
        !self.group.is_valid()
    }
}

/// Two handles are equal iff their ids are equal
impl PartialEq for RemoteHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RemoteHandle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_invalidation() {
        let group = HandleGroup::new("pause");
        assert!(group.name().starts_with("pause-"));

        let handle = RemoteHandle::new(RemoteObjectId::new("o:1"), Arc::clone(&group));
        assert_eq!(handle.id().unwrap().as_str(), "o:1");

        assert!(group.invalidate());
        assert!(!group.invalidate());
        assert!(handle.is_stale());
        assert!(matches!(handle.id(), Err(Error::StaleHandle(_))));
    }

    #[test]
    fn test_handle_equality_by_id() {
        let first = RemoteHandle::new(RemoteObjectId::new("o:1"), HandleGroup::new("a"));
        let second = RemoteHandle::new(RemoteObjectId::new("o:1"), HandleGroup::new("b"));
        let third = RemoteHandle::new(RemoteObjectId::new("o:2"), HandleGroup::new("a"));
        assert_eq!(first, second);
        assert_ne!(first, third);
    }
}
