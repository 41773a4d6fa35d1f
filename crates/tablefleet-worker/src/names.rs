//! Display-name candidates for login.

use rand::seq::IndexedRandom;
use tablefleet_types::{NamePool, WorkerId};

/// Produces display names of the form `<base><id>`, cut to fit the table's
/// name limit with the id kept visible.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    pool: NamePool,
}

impl NameGenerator {
    pub fn new(pool: NamePool) -> Self {
        Self { pool }
    }

    /// Number of candidates tried per login.
    pub fn attempts(&self) -> usize {
        self.pool.base_names.len().max(1)
    }

    /// One name built from a random base.
    pub fn candidate(&self, id: WorkerId) -> String {
        let base = self
            .pool
            .base_names
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or("Player");
        compose(base, id, self.pool.max_len)
    }

    /// A full round of candidates for one login.
    pub fn candidates(&self, id: WorkerId) -> Vec<String> {
        (0..self.attempts()).map(|_| self.candidate(id)).collect()
    }
}

/// Join `base` and `id`, truncating `base` so the result has at most
/// `max_len` characters.
pub fn compose(base: &str, id: WorkerId, max_len: usize) -> String {
    let suffix = id.to_string();
    if suffix.len() >= max_len {
        return suffix.chars().take(max_len).collect();
    }
    let keep = max_len - suffix.len();
    let mut name: String = base.chars().take(keep).collect();
    name.push_str(&suffix);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_keep_their_base() {
        assert_eq!(compose("River", WorkerId(7), 12), "River7");
    }

    #[test]
    fn long_bases_are_cut_to_show_the_id() {
        let name = compose("Gutshotter", WorkerId(123), 12);
        assert_eq!(name, "Gutshotte123");
        assert_eq!(compose("Ace", WorkerId(1234567890), 8), "12345678");
    }

    #[test]
    fn candidates_come_from_the_pool() {
        let pool = NamePool {
            base_names: vec!["Ace".into(), "Nuts".into()],
            max_len: 12,
        };
        let names = NameGenerator::new(pool);
        let candidates = names.candidates(WorkerId(4));
        assert_eq!(candidates.len(), 2);
        for c in candidates {
            assert!(c == "Ace4" || c == "Nuts4", "unexpected {c}");
        }
    }
}
