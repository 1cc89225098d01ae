use std::collections::HashMap;

use normalizer::{Repository, RepositoryScoped};

/// Keys of the repositories that survived their table's path. Issue and pull
/// request rows may reference a repository by `id` or by `full_name`.
#[derive(Debug, Default)]
pub struct RepositoryIndex {
    ids: HashMap<String, String>,
    full_names: HashMap<String, String>,
}

impl RepositoryIndex {
    pub fn new(repos: &[Repository]) -> Self {
        let mut index = Self::default();
        // A repository without an id cannot be referenced.
        for repo in repos.iter().filter(|repo| !repo.id.is_empty()) {
            index.ids.insert(repo.id.clone(), repo.id.clone());
            if !repo.full_name.is_empty() {
                index
                    .full_names
                    .insert(repo.full_name.to_lowercase(), repo.id.clone());
            }
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Canonical repository id for a reference, if it names a surviving repository.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        if reference.trim().is_empty() {
            return None;
        }
        self.ids
            .get(reference)
            .or_else(|| self.full_names.get(&reference.to_lowercase()))
            .map(String::as_str)
    }

    /// Rewrites every row's reference to the canonical id and drops rows whose
    /// repository is unknown. Returns the kept rows and the number dropped.
    pub fn retain_known<T: RepositoryScoped>(&self, rows: Vec<T>) -> (Vec<T>, usize) {
        let before = rows.len();
        let kept: Vec<T> = rows
            .into_iter()
            .filter_map(|mut row| {
                let id = self.resolve(row.repository())?.to_string();
                row.set_repository(id);
                Some(row)
            })
            .collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }
}
