//! Infrastructure layer: persistence for identities, projects and memberships.
//!
//! Both stores implement the read-only collaborator traits from
//! `tessera-auth` plus the project-management writes in [`workspace`].

pub mod workspace;

pub use workspace::{
    InMemoryWorkspace, NewProject, PostgresWorkspace, Project, ProjectRegistry, RegistryError,
};
