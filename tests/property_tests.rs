//! Property-based tests for history walks and the sync cache.
//!
//! Histories are built in the in-memory backend, so thousands of shapes
//! can be checked without touching git.

use proptest::prelude::*;

use naforo_agent::core::cache::SyncCache;
use naforo_agent::core::types::{BranchName, Oid};
use naforo_agent::engine::history::{walk, WalkBounds};
use naforo_agent::git::mock::MockBackend;

/// Strategy for generating valid branch name characters.
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('/'),
    ]
}

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..30).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            let bad = name.starts_with('-')
                || name.starts_with('/')
                || name.ends_with('/')
                || name.contains("//");
            (!bad).then_some(name)
        },
    )
}

/// Linear history of `n` commits, oldest first.
fn linear(backend: &MockBackend, n: usize) -> Vec<Oid> {
    let mut ids: Vec<Oid> = Vec::new();
    for i in 0..n {
        let contents = format!("line {}\n", i);
        let parents: Vec<&Oid> = ids.last().into_iter().collect();
        ids.push(backend.add_commit(&parents, &[("log.txt", contents.as_str())], "commit"));
    }
    ids
}

fn master() -> BranchName {
    BranchName::new("master").unwrap()
}

proptest! {
    /// A walk inspects the newest commits above the stop commit, up to the
    /// cap, and yields all of them except the root.
    #[test]
    fn linear_walk_matches_model(
        n in 1usize..60,
        cap in 0usize..70,
        stop in proptest::option::of(0usize..60),
    ) {
        let backend = MockBackend::new();
        let ids = linear(&backend, n);
        let branch = master();
        backend.set_branch(&branch, &ids[n - 1]);

        let stop = stop.filter(|s| *s < n);
        let lowest = stop.map_or(0, |s| s + 1);
        let candidates: Vec<Oid> = ids[lowest..].iter().rev().cloned().collect();
        let inspected: Vec<Oid> = candidates.into_iter().take(cap).collect();
        let expected: Vec<Oid> = inspected
            .iter()
            .filter(|oid| **oid != ids[0])
            .cloned()
            .collect();

        let mut history = walk(&backend, &branch, WalkBounds {
            cap,
            boundary: None,
            stop_at: stop.map(|s| ids[s].clone()),
        });
        let records: Vec<Oid> = history
            .by_ref()
            .map(|r| r.map(|record| record.sha))
            .collect::<Result<_, _>>()
            .unwrap();

        prop_assert_eq!(records, expected);
        prop_assert_eq!(history.inspected(), inspected.len());
    }

    /// Nothing at or below the boundary is ever yielded from a branch.
    #[test]
    fn boundary_is_never_crossed(
        trunk in 1usize..20,
        fork_at in 0usize..20,
        own in 0usize..20,
        cap in 1usize..60,
    ) {
        let backend = MockBackend::new();
        let ids = linear(&backend, trunk);
        let fork_at = fork_at % trunk;

        let mut tip = ids[fork_at].clone();
        let mut own_ids = Vec::new();
        for i in 0..own {
            let contents = format!("feature {}\n", i);
            tip = backend.add_commit(&[&tip], &[("feature.txt", contents.as_str())], "feature");
            own_ids.push(tip.clone());
        }
        let feature = BranchName::new("feature").unwrap();
        backend.set_branch(&feature, &tip);

        let records: Vec<Oid> = walk(&backend, &feature, WalkBounds {
            cap,
            boundary: Some(ids[fork_at].clone()),
            stop_at: None,
        })
        .map(|r| r.map(|record| record.sha))
        .collect::<Result<_, _>>()
        .unwrap();

        prop_assert!(records.iter().all(|oid| own_ids.contains(oid)));
        prop_assert_eq!(records.len(), own.min(cap));
    }

    /// A persisted cache loads back with the same entries.
    #[test]
    fn cache_survives_persist(names in prop::collection::btree_set(valid_branch_name(), 0..10)) {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("repository.json");

        let mut cache = SyncCache::new();
        for (i, name) in names.iter().enumerate() {
            let oid = Oid::new(format!("{:040x}", i + 1)).unwrap();
            cache.insert(BranchName::new(name.as_str()).unwrap(), oid);
        }
        cache.persist(&path).unwrap();

        let loaded = SyncCache::load(&path).unwrap();
        prop_assert_eq!(loaded.len(), names.len());
        for (branch, oid) in cache.iter() {
            prop_assert_eq!(loaded.get(branch), Some(oid));
        }
        prop_assert!(!temp.path().join("repository.json.tmp").exists());
    }
}
