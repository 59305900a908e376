use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use tessera_auth::{
    MembershipDirectory, NewUser, ProjectMembership, ProjectRole, StoreError, UserDirectory, UserRecord,
    UserStatus,
};
use tessera_core::{ProjectId, UserId};

use super::{NewProject, Project, ProjectRegistry, RegistryError};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    user_ids_by_email: HashMap<String, UserId>,
    projects: HashMap<ProjectId, Project>,
    memberships: HashMap<(UserId, ProjectId), ProjectRole>,
}

/// In-memory workspace store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    state: RwLock<State>,
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed record (seeding, tests). Replaces any user with
    /// the same id.
    pub fn insert_user(&self, user: UserRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if let Some(existing) = state.user_ids_by_email.get(&user.email) {
            if existing != &user.id {
                return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
            }
        }
        let email = user.email.clone();
        state.user_ids_by_email.insert(email.clone(), user.id.clone());
        if let Some(previous) = state.users.insert(user.id.clone(), user) {
            if previous.email != email {
                state.user_ids_by_email.remove(&previous.email);
            }
        }
        Ok(())
    }

    pub fn set_user_status(&self, id: &UserId, status: UserStatus) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        Ok(match state.users.get_mut(id) {
            Some(user) => {
                user.status = status;
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl UserDirectory for InMemoryWorkspace {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .user_ids_by_email
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.users.get(id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if state.user_ids_by_email.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
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
        state.user_ids_by_email.insert(record.email.clone(), record.id.clone());
        state.users.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryWorkspace {
    async fn find_membership(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Option<ProjectMembership>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .memberships
            .get(&(user_id.clone(), project_id.clone()))
            .map(|role| ProjectMembership {
                project_id: project_id.clone(),
                user_id: user_id.clone(),
                role: *role,
            }))
    }
}

#[async_trait]
impl ProjectRegistry for InMemoryWorkspace {
    async fn create_project(&self, project: NewProject, owner: &UserId) -> Result<Project, RegistryError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.users.contains_key(owner) {
            return Err(RegistryError::UserNotFound);
        }

        let project = Project {
            id: ProjectId::new(),
            name: project.name,
            description: project.description,
            created_at: Utc::now(),
        };
        state.projects.insert(project.id.clone(), project.clone());
        state
            .memberships
            .insert((owner.clone(), project.id.clone()), ProjectRole::Owner);
        Ok(project)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, RegistryError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.projects.get(id).cloned())
    }

    async fn list_projects_for_user(&self, user_id: &UserId) -> Result<Vec<Project>, RegistryError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut projects: Vec<Project> = state
            .memberships
            .keys()
            .filter(|(uid, _)| uid == user_id)
            .filter_map(|(_, pid)| state.projects.get(pid).cloned())
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    async fn upsert_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        role: ProjectRole,
    ) -> Result<ProjectMembership, RegistryError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.projects.contains_key(project_id) {
            return Err(RegistryError::ProjectNotFound);
        }
        if !state.users.contains_key(user_id) {
            return Err(RegistryError::UserNotFound);
        }

        state
            .memberships
            .insert((user_id.clone(), project_id.clone()), role);
        Ok(ProjectMembership {
            project_id: project_id.clone(),
            user_id: user_id.clone(),
            role,
        })
    }

    async fn remove_member(&self, project_id: &ProjectId, user_id: &UserId) -> Result<bool, RegistryError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.projects.contains_key(project_id) {
            return Err(RegistryError::ProjectNotFound);
        }
        Ok(state
            .memberships
            .remove(&(user_id.clone(), project_id.clone()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_auth::GlobalRole;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test".to_string(),
            role: GlobalRole::Employee,
            password_hash: "$2b$04$placeholder".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let ws = InMemoryWorkspace::new();
        let created = ws.create_user(new_user("a@example.com")).await.unwrap();

        let by_email = ws.find_user_by_email("a@example.com").await.unwrap().unwrap();
        let by_id = ws.find_user_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_email, created);
        assert_eq!(by_id, created);
        assert!(ws.find_user_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reinserting_a_user_moves_its_email() {
        let ws = InMemoryWorkspace::new();
        let mut user = ws.create_user(new_user("old@example.com")).await.unwrap();

        user.email = "new@example.com".to_string();
        ws.insert_user(user.clone()).unwrap();

        assert!(ws.find_user_by_email("old@example.com").await.unwrap().is_none());
        assert_eq!(ws.find_user_by_email("new@example.com").await.unwrap(), Some(user.clone()));

        // The freed address can be taken by someone else.
        ws.create_user(new_user("old@example.com")).await.unwrap();
        ws.insert_user(user).unwrap();
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let ws = InMemoryWorkspace::new();
        ws.create_user(new_user("a@example.com")).await.unwrap();

        let err = ws.create_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn creator_becomes_owner() {
        let ws = InMemoryWorkspace::new();
        let owner = ws.create_user(new_user("owner@example.com")).await.unwrap();

        let project = ws
            .create_project(
                NewProject {
                    name: "Apollo".into(),
                    description: None,
                },
                &owner.id,
            )
            .await
            .unwrap();

        let m = ws.find_membership(&owner.id, &project.id).await.unwrap().unwrap();
        assert_eq!(m.role, ProjectRole::Owner);
        assert_eq!(ws.list_projects_for_user(&owner.id).await.unwrap(), vec![project]);
    }

    #[tokio::test]
    async fn membership_is_unique_per_user_and_project() {
        let ws = InMemoryWorkspace::new();
        let owner = ws.create_user(new_user("owner@example.com")).await.unwrap();
        let member = ws.create_user(new_user("member@example.com")).await.unwrap();
        let project = ws
            .create_project(
                NewProject {
                    name: "Apollo".into(),
                    description: Some("moon".into()),
                },
                &owner.id,
            )
            .await
            .unwrap();

        ws.upsert_member(&project.id, &member.id, ProjectRole::Viewer).await.unwrap();
        ws.upsert_member(&project.id, &member.id, ProjectRole::Editor).await.unwrap();

        let m = ws.find_membership(&member.id, &project.id).await.unwrap().unwrap();
        assert_eq!(m.role, ProjectRole::Editor);
        assert_eq!(ws.list_projects_for_user(&member.id).await.unwrap().len(), 1);

        assert!(ws.remove_member(&project.id, &member.id).await.unwrap());
        assert!(!ws.remove_member(&project.id, &member.id).await.unwrap());
        assert!(ws.find_membership(&member.id, &project.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn membership_writes_require_existing_rows() {
        let ws = InMemoryWorkspace::new();
        let user = ws.create_user(new_user("u@example.com")).await.unwrap();
        let missing = ProjectId::parse("missing").unwrap();

        assert_eq!(
            ws.upsert_member(&missing, &user.id, ProjectRole::Viewer).await,
            Err(RegistryError::ProjectNotFound)
        );
        assert_eq!(
            ws.create_project(
                NewProject {
                    name: "x".into(),
                    description: None
                },
                &UserId::parse("ghost").unwrap()
            )
            .await,
            Err(RegistryError::UserNotFound)
        );
    }
}
