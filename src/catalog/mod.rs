//! Saved component catalog.
//!
//! Persistence of user-saved component snippets goes through the injected
//! [`ComponentStore`] port rather than any ambient global storage, so the
//! backing medium can be swapped without touching callers. Two providers
//! ship with the app, selected by configuration: [`MemoryStore`] and
//! [`JsonFileStore`].
//!
//! A small set of built-in starter components is always visible; deleting a
//! built-in records a tombstone instead of mutating the seed list.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved component snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// The snippet source code.
    pub code: String,
    /// Author attribution.
    pub author: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time, if ever updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Download counter.
    #[serde(default)]
    pub downloads: u32,
    /// Like counter.
    #[serde(default)]
    pub likes: u32,
}

/// Fields supplied when saving a new component.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComponent {
    /// Display name. May be left empty; the server derives one from the code.
    #[serde(default)]
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// The snippet source code.
    pub code: String,
    /// Author attribution.
    pub author: String,
}

impl NewComponent {
    fn into_record(self) -> ComponentRecord {
        ComponentRecord {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            description: self.description,
            code: self.code,
            author: self.author,
            created_at: Utc::now(),
            updated_at: None,
            downloads: 0,
            likes: 0,
        }
    }
}

/// Persistence port for saved components.
#[async_trait]
pub trait ComponentStore: Send + Sync + std::fmt::Debug {
    /// List all visible components: built-ins (minus tombstoned ones)
    /// followed by user-saved records.
    async fn list(&self) -> Result<Vec<ComponentRecord>>;

    /// Get a component by id.
    async fn get(&self, id: &str) -> Result<Option<ComponentRecord>>;

    /// Save a new component and return the stored record.
    async fn save(&self, component: NewComponent) -> Result<ComponentRecord>;

    /// Delete a component by id.
    ///
    /// Returns `false` when no visible component has that id. Deleting a
    /// built-in records a tombstone.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Shared catalog state: user-saved records plus built-in tombstones.
///
/// Both providers operate on this structure; the file provider also uses it
/// as the on-disk document format.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct CatalogState {
    #[serde(default)]
    saved: Vec<ComponentRecord>,
    #[serde(default)]
    deleted_builtins: Vec<String>,
}

impl CatalogState {
    fn visible(&self) -> Vec<ComponentRecord> {
        builtin_components()
            .into_iter()
            .filter(|c| !self.deleted_builtins.contains(&c.id))
            .chain(self.saved.iter().cloned())
            .collect()
    }

    fn find(&self, id: &str) -> Option<ComponentRecord> {
        self.visible().into_iter().find(|c| c.id == id)
    }

    fn insert(&mut self, record: ComponentRecord) {
        self.saved.push(record);
    }

    fn remove(&mut self, id: &str) -> bool {
        if let Some(pos) = self.saved.iter().position(|c| c.id == id) {
            self.saved.remove(pos);
            return true;
        }

        let is_live_builtin = builtin_components().iter().any(|c| c.id == id)
            && !self.deleted_builtins.iter().any(|d| d == id);
        if is_live_builtin {
            self.deleted_builtins.push(id.to_string());
            return true;
        }

        false
    }
}

/// Built-in starter components shown alongside user-saved ones.
#[must_use]
pub fn builtin_components() -> Vec<ComponentRecord> {
    let seeded_at = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
        .unwrap()
        .with_timezone(&Utc);

    vec![
        ComponentRecord {
            id: "starter-user-card".to_string(),
            name: "User card".to_string(),
            description: "Card showing a user's avatar, name and role".to_string(),
            code: r#"export default function UserCard({ user }) {
  return (
    <div className="p-6 bg-white rounded-lg shadow-lg">
      <div className="flex items-center space-x-4">
        <img className="w-12 h-12 rounded-full" src={user.avatar} alt={user.name} />
        <div>
          <h3 className="text-lg font-semibold">{user.name}</h3>
          <p className="text-gray-600">{user.role}</p>
        </div>
      </div>
    </div>
  )
}"#
            .to_string(),
            author: "Starter Library".to_string(),
            created_at: seeded_at,
            updated_at: None,
            downloads: 156,
            likes: 23,
        },
        ComponentRecord {
            id: "starter-login-form".to_string(),
            name: "Login form".to_string(),
            description: "Simple login form with username, password and submit".to_string(),
            code: r#"export default function LoginForm() {
  return (
    <form className="space-y-4 p-6 bg-white rounded-lg shadow-lg">
      <input type="text" placeholder="Username" className="block w-full px-3 py-2 border rounded-md" />
      <input type="password" placeholder="Password" className="block w-full px-3 py-2 border rounded-md" />
      <button type="submit" className="w-full bg-blue-600 text-white py-2 px-4 rounded-md">
        Sign in
      </button>
    </form>
  )
}"#
            .to_string(),
            author: "Starter Library".to_string(),
            created_at: seeded_at,
            updated_at: None,
            downloads: 89,
            likes: 12,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_merges_builtins_and_saved() {
        let mut state = CatalogState::default();
        state.insert(
            NewComponent {
                name: "Badge".to_string(),
                description: "A badge".to_string(),
                code: "function Badge() { return <span/> }".to_string(),
                author: "me".to_string(),
            }
            .into_record(),
        );

        let visible = state.visible();
        assert_eq!(visible.len(), builtin_components().len() + 1);
        assert_eq!(visible.last().unwrap().name, "Badge");
    }

    #[test]
    fn test_remove_builtin_records_tombstone() {
        let mut state = CatalogState::default();
        assert!(state.remove("starter-user-card"));
        assert!(state.find("starter-user-card").is_none());

        // A second delete of the same builtin reports not-found.
        assert!(!state.remove("starter-user-card"));
    }

    #[test]
    fn test_remove_unknown_id() {
        let mut state = CatalogState::default();
        assert!(!state.remove("nope"));
    }

    #[test]
    fn test_new_component_record_defaults() {
        let record = NewComponent {
            name: "Badge".to_string(),
            description: String::new(),
            code: "function Badge() { return <span/> }".to_string(),
            author: "me".to_string(),
        }
        .into_record();

        assert_eq!(record.downloads, 0);
        assert_eq!(record.likes, 0);
        assert!(record.updated_at.is_none());
        assert!(!record.id.is_empty());
    }
}
