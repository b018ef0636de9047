//! Hierarchical access control for property objects.
//!
//! Each [`PropertyObject`](crate::PropertyObject) carries a
//! [`PermissionManager`]. A manager without locally assigned permissions
//! inherits the effective permissions of its parent; the parent link follows
//! value containment (a child object's manager is parented to the owner's when
//! the child becomes an object property's default value).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// Maximum number of parent hops followed when computing effective permissions.
const MAX_PARENT_DEPTH: usize = 64;

/// Single permission bit checked by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Read property values.
    Read,
    /// Write or clear property values.
    Write,
    /// Call function and procedure properties.
    Execute,
}

/// Permission set of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Read.
    pub read: bool,
    /// Write.
    pub write: bool,
    /// Execute.
    pub execute: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            read: true,
            write: true,
            execute: true,
        }
    }
}

impl Permissions {
    /// Read and execute, no write.
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            execute: false,
        }
    }

    /// True if `permission` is granted.
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Read => self.read,
            Permission::Write => self.write,
            Permission::Execute => self.execute,
        }
    }
}

struct ManagerInner {
    local: RwLock<Option<Permissions>>,
    parent: RwLock<Option<Weak<ManagerInner>>>,
}

/// Parent-linked permission holder (shared handle).
#[derive(Clone)]
pub struct PermissionManager {
    inner: Arc<ManagerInner>,
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                local: RwLock::new(None),
                parent: RwLock::new(None),
            }),
        }
    }
}

impl fmt::Debug for PermissionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionManager")
            .field("local", &*self.inner.local.read())
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}

impl PermissionManager {
    /// Manager with no local permissions and no parent (everything allowed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set local permissions, overriding the parent.
    pub fn set_permissions(&self, permissions: Permissions) {
        *self.inner.local.write() = Some(permissions);
    }

    /// Drop local permissions so the parent's apply again.
    pub fn clear_permissions(&self) {
        *self.inner.local.write() = None;
    }

    /// Local permissions.
    pub fn local_permissions(&self) -> Option<Permissions> {
        *self.inner.local.read()
    }

    /// Inherit from `parent` when no local permissions are set.
    pub fn set_parent(&self, parent: &PermissionManager) {
        if Arc::ptr_eq(&self.inner, &parent.inner) {
            return;
        }
        *self.inner.parent.write() = Some(Arc::downgrade(&parent.inner));
    }

    /// Detach from the parent manager.
    pub fn clear_parent(&self) {
        *self.inner.parent.write() = None;
    }

    /// Parent manager, if linked.
    pub fn parent(&self) -> Option<PermissionManager> {
        self.inner
            .parent
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| PermissionManager { inner })
    }

    /// Local permissions, else the nearest ancestor's, else everything allowed.
    pub fn effective(&self) -> Permissions {
        let mut current = Some(self.clone());
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(manager) = current else { break };
            if let Some(local) = manager.local_permissions() {
                return local;
            }
            current = manager.parent();
        }
        Permissions::default()
    }

    /// Local permissions if set, else the parent chain, else allowed.
    pub fn is_allowed(&self, permission: Permission) -> bool {
        self.effective().allows(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_everything() {
        let manager = PermissionManager::new();
        assert!(manager.is_allowed(Permission::Read));
        assert!(manager.is_allowed(Permission::Write));
        assert!(manager.is_allowed(Permission::Execute));
    }

    #[test]
    fn test_inherits_from_parent_until_overridden() {
        let parent = PermissionManager::new();
        let child = PermissionManager::new();
        child.set_parent(&parent);

        parent.set_permissions(Permissions::read_only());
        assert!(!child.is_allowed(Permission::Write));

        child.set_permissions(Permissions::default());
        assert!(child.is_allowed(Permission::Write));

        child.clear_permissions();
        assert_eq!(child.effective(), Permissions::read_only());
    }

    #[test]
    fn test_parent_link_is_weak() {
        let child = PermissionManager::new();
        {
            let parent = PermissionManager::new();
            parent.set_permissions(Permissions::read_only());
            child.set_parent(&parent);
            assert!(!child.is_allowed(Permission::Write));
        }
        assert!(child.parent().is_none());
        assert!(child.is_allowed(Permission::Write));
    }

    #[test]
    fn test_cycle_terminates() {
        let a = PermissionManager::new();
        let b = PermissionManager::new();
        a.set_parent(&b);
        b.set_parent(&a);
        assert_eq!(a.effective(), Permissions::default());
    }
}
