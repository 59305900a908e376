//! Test doubles for the collaborator traits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use tessera_core::{ProjectId, UserId};

use crate::directory::{
    MembershipDirectory, NewUser, ProjectMembership, StoreError, UserDirectory, UserRecord, UserStatus,
};
use crate::{GlobalRole, ProjectRole};

#[derive(Default)]
pub(crate) struct FakeUsers {
    users: Mutex<Vec<UserRecord>>,
    pub(crate) down: std::sync::atomic::AtomicBool,
}

impl FakeUsers {
    pub(crate) fn insert(&self, email: &str, role: GlobalRole, password_hash: Option<String>) -> UserRecord {
        let user = UserRecord {
            id: UserId::new(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            role,
            status: UserStatus::Active,
            password_hash,
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub(crate) fn set_status(&self, id: &UserId, status: UserStatus) {
        for u in self.users.lock().unwrap().iter_mut() {
            if &u.id == id {
                u.status = status;
            }
        }
    }

    pub(crate) fn remove(&self, id: &UserId) {
        self.users.lock().unwrap().retain(|u| &u.id != id);
    }

    fn ensure_up(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.ensure_up()?;
        Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        self.ensure_up()?;
        Ok(self.users.lock().unwrap().iter().find(|u| &u.id == id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        self.ensure_up()?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email".into()));
        }
        let record = UserRecord {
            id: UserId::new(),
            email: user.email,
            name: user.name,
            role: user.role,
            status: UserStatus::Active,
            password_hash: Some(user.password_hash),
            created_at: Utc::now(),
        };
        users.push(record.clone());
        Ok(record)
    }
}

/// Membership directory that counts lookups and can be made slow or failing.
#[derive(Default)]
pub(crate) struct CountingMemberships {
    pub(crate) rows: Mutex<HashMap<(UserId, ProjectId), ProjectRole>>,
    pub(crate) calls: AtomicUsize,
    pub(crate) delay: Option<Duration>,
    pub(crate) fail: bool,
}

impl CountingMemberships {
    pub(crate) fn with(mut self, user: &UserId, project: &ProjectId, role: ProjectRole) -> Self {
        self.rows
            .get_mut()
            .unwrap()
            .insert((user.clone(), project.clone()), role);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipDirectory for CountingMemberships {
    async fn find_membership(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Option<ProjectMembership>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(StoreError::Unavailable("membership store down".into()));
        }
        let role = self
            .rows
            .lock()
            .unwrap()
            .get(&(user_id.clone(), project_id.clone()))
            .copied();
        Ok(role.map(|role| ProjectMembership {
            project_id: project_id.clone(),
            user_id: user_id.clone(),
            role,
        }))
    }
}
