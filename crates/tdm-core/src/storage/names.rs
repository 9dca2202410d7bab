//! Artifact name reservation.
//!
//! Two transfers that resolve to the same name must not land on the same file.
//! A name is free when no live reservation holds it and nothing exists under
//! it on disk; otherwise ` (1)`, ` (2)`, ... is inserted before the extension.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Names currently claimed by running transfers. Cloning shares the set.
#[derive(Debug, Clone, Default)]
pub struct NameReservations {
    held: Arc<Mutex<HashSet<String>>>,
}

impl NameReservations {
    /// Claims the first free variant of `wanted` in `dir`. The claim lasts
    /// until the returned guard is dropped.
    pub fn reserve(&self, dir: &Path, wanted: &str) -> ReservedName {
        let mut held = self.held.lock().unwrap();
        let name = (0..)
            .map(|n| numbered(wanted, n))
            .find(|candidate| !held.contains(candidate) && !dir.join(candidate).exists())
            .unwrap_or_else(|| wanted.to_string());
        held.insert(name.clone());
        ReservedName {
            name,
            held: Arc::clone(&self.held),
        }
    }

    #[cfg(test)]
    fn is_held(&self, name: &str) -> bool {
        self.held.lock().unwrap().contains(name)
    }
}

/// A claimed artifact name; released on drop.
#[derive(Debug)]
pub struct ReservedName {
    name: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl ReservedName {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ReservedName {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.name);
        }
    }
}

/// `movie.mkv` -> `movie (n).mkv`; `n == 0` is the name itself.
fn numbered(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({}){}", &name[..dot], n, &name[dot..]),
        _ => format!("{} ({})", name, n),
    }
}
