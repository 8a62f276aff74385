use serde::{Deserialize, Serialize};
use synced_rust::Resource;

/// Fixture resource used across the integration suites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Resource)]
#[resource(type_name = "tasks")]
pub struct Task {
    #[resource(key)]
    pub id: String,
    pub owner: String,
    pub title: String,
    pub created_at: u64,
    pub completed: bool,
}

impl Task {
    pub fn new(id: &str, owner: &str, title: &str, created_at: u64) -> Self {
        Task {
            id: id.into(),
            owner: owner.into(),
            title: title.into(),
            created_at,
            completed: false,
        }
    }
}
