//! Unique identifiers for resource names

use rand::Rng;

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of ids from [`unique_id`]
pub const UNIQUE_ID_LEN: usize = 6;

/// Short random base-62 id, e.g. `a3ZkQ9`.
///
/// Six characters keep names readable while making collisions between
/// concurrent runs unlikely.
pub fn unique_id() -> String {
    let mut rng = rand::thread_rng();
    (0..UNIQUE_ID_LEN)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

/// `prefix-<unique id>`, lowercased so it is valid in DNS labels
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, unique_id()).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_id_shape() {
        let id = unique_id();
        assert_eq!(id.len(), UNIQUE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unique_ids_differ() {
        let ids: HashSet<String> = (0..100).map(|_| unique_id()).collect();
        assert!(ids.len() > 95);
    }

    #[test]
    fn test_unique_name() {
        let name = unique_name("deso");
        assert!(name.starts_with("deso-"));
        assert_eq!(name.len(), "deso-".len() + UNIQUE_ID_LEN);
        assert_eq!(name, name.to_ascii_lowercase());
    }
}
