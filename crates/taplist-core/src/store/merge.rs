use std::collections::HashSet;

use crate::models::Beer;

/// Combine an existing catalog with freshly fetched beers.
///
/// Incoming entries replace existing ones with the same id (the later fetch is
/// authoritative), and duplicate ids within `incoming` resolve to the last
/// occurrence. The result is sorted by name with a stable sort, so equal names
/// keep the order of `existing` followed by `incoming`.
pub fn merge(existing: &[Beer], incoming: impl IntoIterator<Item = Beer>) -> Vec<Beer> {
    let incoming: Vec<Beer> = incoming.into_iter().collect();

    // Last occurrence wins inside `incoming`
    let mut seen: HashSet<u64> = HashSet::with_capacity(incoming.len());
    let mut fresh: Vec<Beer> = Vec::with_capacity(incoming.len());
    for beer in incoming.into_iter().rev() {
        if seen.insert(beer.id) {
            fresh.push(beer);
        }
    }
    fresh.reverse();

    let mut merged: Vec<Beer> = existing
        .iter()
        .filter(|beer| !seen.contains(&beer.id))
        .cloned()
        .collect();
    merged.extend(fresh);
    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beer(id: u64, name: &str) -> Beer {
        Beer::new(id, name)
    }

    fn ids(beers: &[Beer]) -> Vec<u64> {
        beers.iter().map(|b| b.id).collect()
    }

    fn assert_sorted_unique(beers: &[Beer]) {
        for pair in beers.windows(2) {
            assert!(pair[0].name <= pair[1].name, "{} > {}", pair[0].name, pair[1].name);
        }
        let unique: HashSet<u64> = beers.iter().map(|b| b.id).collect();
        assert_eq!(unique.len(), beers.len());
    }

    #[test]
    fn test_merge_into_empty_sorts_by_name() {
        let merged = merge(&[], vec![beer(2, "Trashy Blonde"), beer(1, "Buzz"), beer(3, "Berliner Weisse")]);
        assert_eq!(ids(&merged), vec![3, 1, 2]);
        assert_sorted_unique(&merged);
    }

    #[test]
    fn test_incoming_overwrites_existing() {
        let existing = merge(&[], vec![beer(1, "Buzz").with_attribute("abv", 4.5), beer(2, "Trashy Blonde")]);
        let merged = merge(&existing, vec![beer(1, "Buzz").with_attribute("abv", 5.0)]);

        assert_eq!(merged.len(), 2);
        let buzz = merged.iter().find(|b| b.id == 1).unwrap();
        assert_eq!(buzz.attribute("abv"), Some(&serde_json::Value::from(5.0)));
        assert_sorted_unique(&merged);
    }

    #[test]
    fn test_overwrite_can_move_entry() {
        let existing = merge(&[], vec![beer(1, "Alpha"), beer(2, "Beta")]);
        let merged = merge(&existing, vec![beer(1, "Gamma")]);
        assert_eq!(ids(&merged), vec![2, 1]);
    }

    #[test]
    fn test_duplicates_within_incoming_last_wins() {
        let merged = merge(&[], vec![beer(5, "Old Name"), beer(6, "Punk IPA"), beer(5, "New Name")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.iter().find(|b| b.id == 5).unwrap().name, "New Name");
    }

    #[test]
    fn test_equal_names_are_stable() {
        let existing = merge(&[], vec![beer(10, "Same"), beer(11, "Same")]);
        let merged = merge(&existing, vec![beer(12, "Same"), beer(1, "Aaa")]);
        assert_eq!(ids(&merged), vec![1, 10, 11, 12]);
    }

    #[test]
    fn test_sort_is_case_sensitive() {
        let merged = merge(&[], vec![beer(1, "abc"), beer(2, "Abd"), beer(3, "ABC")]);
        assert_eq!(ids(&merged), vec![3, 2, 1]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let catalog = merge(&[], vec![beer(1, "Buzz"), beer(2, "Trashy Blonde"), beer(4, "Same")]);
        let incoming = vec![beer(2, "Trashy Blonde v2"), beer(7, "Same"), beer(3, "Alpha Dog"), beer(3, "Alpha Dog")];

        let once = merge(&catalog, incoming.clone());
        let twice = merge(&once, incoming);
        assert_eq!(once, twice);
        assert_sorted_unique(&once);
    }

    #[test]
    fn test_merge_empty_incoming_keeps_catalog() {
        let catalog = merge(&[], vec![beer(1, "Buzz"), beer(2, "Trashy Blonde")]);
        assert_eq!(merge(&catalog, Vec::new()), catalog);
    }
}
