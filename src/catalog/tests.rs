// FILE: src/catalog/tests.rs
use std::collections::HashSet;

use proptest::prelude::*;

use super::*;
use crate::core::node::{NodeKind, SongState};
use crate::error::CatalogError;

const BEATLES: &[u8] = b"Artist: The Beatles\nAlbum: Abbey Road\nTitle: Come Together\n<data>";
const MOBY: &[u8] = b"Artist: Moby\nAlbum: Play\nTitle: Porcelain\n\x00\x01\x02";

fn catalog() -> Catalog {
    Catalog::new(Identity::fixed(1000, 1000), StatfsConfig::default())
}

fn names(catalog: &Catalog, path: &str) -> HashSet<String> {
    catalog
        .readdir(path)
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect()
}

fn add_song(catalog: &mut Catalog, name: &str, content: &[u8]) -> String {
    let path = format!("/ALL/{}", name);
    catalog.create(&path).unwrap();
    catalog.write(&path, content, 0).unwrap();
    path
}

fn read_all(catalog: &Catalog, path: &str) -> Vec<u8> {
    catalog.read(path, usize::MAX, 0).unwrap().to_vec()
}

#[test]
fn test_fresh_catalog_layout() {
    let catalog = catalog();
    assert_eq!(names(&catalog, "/"), HashSet::from([".".into(), "..".into(), "ALL".into()]));
    assert!(!catalog.has_category_roots());
    assert_eq!(catalog.getattr("/").unwrap().kind(), NodeKind::Directory);
    assert_eq!(catalog.getattr("/ALL").unwrap().perm(), 0o777);
}

#[test]
fn test_scenario_a_projection_matches_canonical() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", BEATLES);

    let canonical = read_all(&catalog, "/ALL/song1");
    assert_eq!(canonical, BEATLES);
    assert_eq!(read_all(&catalog, "/by Artist/B/Beatles/song1"), canonical);
    assert_eq!(read_all(&catalog, "/by Album/A/Abbey Road/song1"), canonical);
    assert_eq!(read_all(&catalog, "/by Title/e/e Together/song1"), canonical);

    assert_eq!(
        catalog.paths_of("/ALL/song1").unwrap(),
        &[
            "/by Artist/B/Beatles".to_string(),
            "/by Album/A/Abbey Road".to_string(),
            "/by Title/e/e Together".to_string(),
            "/ALL".to_string(),
        ]
    );
}

#[test]
fn test_projection_tracks_later_writes() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    catalog.write("/ALL/song1", b"tail", MOBY.len() as u64).unwrap();

    let canonical = read_all(&catalog, "/ALL/song1");
    assert!(canonical.ends_with(b"tail"));
    for dir in catalog.paths_of("/ALL/song1").unwrap().to_vec() {
        assert_eq!(read_all(&catalog, &format!("{}/song1", dir)), canonical);
        let attrs = catalog.getattr(&format!("{}/song1", dir)).unwrap();
        assert_eq!(attrs.size, canonical.len() as u64);
    }
}

#[test]
fn test_scenario_b_rewrite_forks_new_song() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", BEATLES);

    catalog.truncate("/ALL/song1", 0).unwrap();
    assert_eq!(read_all(&catalog, "/ALL/song1"), BEATLES);

    let outcome = catalog.write("/ALL/song1", MOBY, 0).unwrap();
    assert_eq!(
        outcome,
        WriteOutcome { written: MOBY.len(), path: "/ALL/song1_2".into(), dropped: Vec::new() }
    );

    assert_eq!(read_all(&catalog, "/ALL/song1"), BEATLES);
    assert_eq!(read_all(&catalog, "/ALL/song1_2"), MOBY);
    assert_eq!(read_all(&catalog, "/by Artist/M/Moby/song1_2"), MOBY);
    assert_eq!(read_all(&catalog, "/by Artist/B/Beatles/song1"), BEATLES);

    // The flag is consumed: the next write edits song1 in place.
    let outcome = catalog.write("/ALL/song1", b"X", 0).unwrap();
    assert_eq!(outcome.path, "/ALL/song1");
    assert_eq!(catalog.song_count(), 2);
}

#[test]
fn test_rewrite_suffix_skips_taken_names() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", BEATLES);
    add_song(&mut catalog, "song1_2", BEATLES);
    add_song(&mut catalog, "song1_3", BEATLES);

    catalog.truncate("/ALL/song1", 0).unwrap();
    let outcome = catalog.write("/ALL/song1", MOBY, 0).unwrap();
    assert_eq!(outcome.path, "/ALL/song1_4");

    catalog.truncate("/ALL/song1", 0).unwrap();
    let outcome = catalog.write("/ALL/song1", MOBY, 0).unwrap();
    assert_eq!(outcome.path, "/ALL/song1_5");
}

#[test]
fn test_truncate_empty_song_does_not_flag() {
    let mut catalog = catalog();
    catalog.create("/ALL/song1").unwrap();
    catalog.truncate("/ALL/song1", 0).unwrap();

    let outcome = catalog.write("/ALL/song1", MOBY, 0).unwrap();
    assert_eq!(outcome.path, "/ALL/song1");
}

#[test]
fn test_truncate_shrinks_every_view() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);

    catalog.truncate("/ALL/song1", 5).unwrap();

    assert_eq!(read_all(&catalog, "/ALL/song1"), b"Artis");
    assert_eq!(read_all(&catalog, "/by Title/P/Porcelain/song1"), b"Artis");
    assert_eq!(catalog.getattr("/by Album/P/Play/song1").unwrap().size, 5);
}

#[test]
fn test_scenario_c_unlink_last_song_tears_down() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", BEATLES);
    assert!(names(&catalog, "/").contains("by Artist"));

    let removed = catalog.unlink("/ALL/song1").unwrap();
    assert_eq!(removed.len(), 4);

    let root = names(&catalog, "/");
    for category in CATEGORY_ROOTS {
        assert!(!root.contains(category));
        assert!(matches!(catalog.getattr(&format!("/{}", category)), Err(CatalogError::NotFound(_))));
    }
    assert!(!catalog.has_category_roots());
    assert_eq!(catalog.song_count(), 0);
    assert_eq!(catalog.getattr("/").unwrap().nlink, 3);
}

#[test]
fn test_categories_recreated_after_teardown() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", BEATLES);
    catalog.unlink("/ALL/song1").unwrap();

    add_song(&mut catalog, "song2", MOBY);

    assert!(catalog.has_category_roots());
    assert_eq!(names(&catalog, "/by Artist"), HashSet::from([".".into(), "..".into(), "M".into()]));
    assert_eq!(read_all(&catalog, "/by Artist/M/Moby/song2"), MOBY);
}

#[test]
fn test_unlink_keeps_other_songs_projections() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    add_song(&mut catalog, "song2", MOBY);

    catalog.unlink("/ALL/song1").unwrap();

    assert!(catalog.has_category_roots());
    assert_eq!(names(&catalog, "/by Artist/M/Moby"), HashSet::from([".".into(), "..".into(), "song2".into()]));
    assert!(catalog.read("/by Artist/M/Moby/song1", 10, 0).is_err());
}

#[test]
fn test_scenario_d_malformed_header_stays_uncategorized() {
    let mut catalog = catalog();
    let content = b"Artist: Moby\nAlbum: Play\n";
    add_song(&mut catalog, "song1", content);

    assert_eq!(read_all(&catalog, "/ALL/song1"), content);
    assert_eq!(catalog.paths_of("/ALL/song1").unwrap(), &["/ALL".to_string()]);
    assert!(!catalog.has_category_roots());
}

#[test]
fn test_header_turning_malformed_drops_projections() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);

    catalog.write("/ALL/song1", b"Artist Moby", 0).unwrap();

    assert_eq!(catalog.paths_of("/ALL/song1").unwrap(), &["/ALL".to_string()]);
    assert!(catalog.read("/by Artist/M/Moby/song1", 10, 0).is_err());
    // Emptied directories are not pruned.
    assert!(catalog.getattr("/by Artist/M/Moby").is_ok());
}

#[test]
fn test_header_change_moves_projection() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", b"Artist: Moby\nAlbum: Play\nTitle: Porcelain\n");
    catalog.write("/ALL/song1", b"Artist: Beck\n", 0).unwrap();

    assert!(catalog.read("/by Artist/M/Moby/song1", 1, 0).is_err());
    assert!(catalog.read("/by Artist/B/Beck/song1", 1, 0).is_ok());
    assert!(catalog.read("/by Album/P/Play/song1", 1, 0).is_ok());
    assert_eq!(catalog.paths_of("/ALL/song1").unwrap().len(), 4);
}

#[test]
fn test_create_outside_inbox_is_read_only() {
    let mut catalog = catalog();
    assert!(matches!(catalog.create("/song1"), Err(CatalogError::ReadOnlyViolation(_))));

    add_song(&mut catalog, "song1", MOBY);
    assert!(matches!(
        catalog.create("/by Artist/M/Moby/song9"),
        Err(CatalogError::ReadOnlyViolation(_))
    ));
    assert!(matches!(
        catalog.write("/by Artist/M/Moby/song1", b"x", 0),
        Err(CatalogError::ReadOnlyViolation(_))
    ));
    assert!(matches!(
        catalog.unlink("/by Artist/M/Moby/song1"),
        Err(CatalogError::ReadOnlyViolation(_))
    ));
}

#[test]
fn test_create_existing_keeps_content() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    let first = catalog.open("/ALL/song1").unwrap();
    let second = catalog.create("/ALL/song1").unwrap();

    assert!(second > first);
    assert_eq!(read_all(&catalog, "/ALL/song1"), MOBY);
    assert_eq!(catalog.song_count(), 1);
}

#[test]
fn test_write_requires_existing_entry() {
    let mut catalog = catalog();
    assert!(matches!(catalog.write("/ALL/ghost", b"x", 0), Err(CatalogError::NotFound(_))));
    assert!(matches!(catalog.open("/ALL/ghost"), Err(CatalogError::NotFound(_))));
    assert!(matches!(catalog.getattr("/ALL/ghost"), Err(CatalogError::NotFound(_))));
}

#[test]
fn test_read_out_of_range_is_empty() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    assert!(catalog.read("/ALL/song1", 16, 10_000).unwrap().is_empty());
    assert_eq!(catalog.read("/ALL/song1", 6, 0).unwrap(), b"Artist");
}

#[test]
fn test_rename_moves_every_view() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);

    let moved = catalog.rename("/ALL/song1", "/ALL/porcelain").unwrap();
    assert_eq!(moved.len(), 4);
    assert!(moved.contains(&("/ALL/song1".to_string(), "/ALL/porcelain".to_string())));

    assert!(catalog.read("/ALL/song1", 1, 0).is_err());
    assert_eq!(read_all(&catalog, "/ALL/porcelain"), MOBY);
    assert_eq!(read_all(&catalog, "/by Title/P/Porcelain/porcelain"), MOBY);
    assert!(catalog.read("/by Title/P/Porcelain/song1", 1, 0).is_err());

    // Later writes project under the new name.
    catalog.write("/ALL/porcelain", b"!", MOBY.len() as u64).unwrap();
    assert_eq!(names(&catalog, "/by Album/P/Play"), HashSet::from([".".into(), "..".into(), "porcelain".into()]));
}

#[test]
fn test_rename_over_existing_song_replaces_it() {
    let mut catalog = catalog();
    add_song(&mut catalog, "a", MOBY);
    add_song(&mut catalog, "b", BEATLES);

    catalog.rename("/ALL/a", "/ALL/b").unwrap();

    assert_eq!(catalog.song_count(), 1);
    assert_eq!(read_all(&catalog, "/ALL/b"), MOBY);
    assert!(catalog.read("/by Artist/B/Beatles/b", 1, 0).is_err());
}

#[test]
fn test_rename_outside_inbox_is_read_only() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    assert!(matches!(
        catalog.rename("/ALL/song1", "/by Artist/song1"),
        Err(CatalogError::ReadOnlyViolation(_))
    ));
}

#[test]
fn test_readdir_is_idempotent() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    add_song(&mut catalog, "song2", BEATLES);

    let first = names(&catalog, "/ALL");
    let second = names(&catalog, "/ALL");
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
}

#[test]
fn test_readdir_on_missing_dir() {
    let catalog = catalog();
    assert!(matches!(catalog.readdir("/by Artist"), Err(CatalogError::NotFound(_))));
}

#[test]
fn test_aggregate_size_is_cumulative() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    catalog.write("/ALL/song1", MOBY, 0).unwrap();

    let expected = 2 * MOBY.len() as u64;
    assert_eq!(catalog.getattr("/ALL").unwrap().size, expected);
    assert_eq!(catalog.getattr("/").unwrap().size, expected);
    assert_eq!(catalog.getattr("/ALL/song1").unwrap().size, MOBY.len() as u64);
}

#[test]
fn test_category_directories_are_read_only() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    for dir in ["/by Artist", "/by Artist/M", "/by Artist/M/Moby"] {
        assert_eq!(catalog.getattr(dir).unwrap().perm(), 0o555);
    }
    assert_eq!(catalog.getattr("/ALL/song1").unwrap().perm(), 0o666);
}

#[test]
fn test_state_machine_transitions() {
    let mut catalog = catalog();
    catalog.create("/ALL/song1").unwrap();
    let state = |c: &Catalog| {
        let id = c.canonical_song("song1").unwrap();
        c.songs.get(id).unwrap().state
    };
    assert_eq!(state(&catalog), SongState::Created);

    catalog.write("/ALL/song1", MOBY, 0).unwrap();
    assert_eq!(state(&catalog), SongState::Stable);

    catalog.truncate("/ALL/song1", 0).unwrap();
    assert_eq!(state(&catalog), SongState::PendingRewrite);

    catalog.write("/ALL/song1", BEATLES, 0).unwrap();
    assert_eq!(state(&catalog), SongState::Stable);
}

#[test]
fn test_xattrs_are_per_node() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);

    assert!(catalog.getxattr("/ALL/song1", "user.rating").unwrap().is_empty());
    catalog.setxattr("/ALL/song1", "user.rating", b"5").unwrap();
    catalog.setxattr("/ALL", "user.note", b"inbox").unwrap();

    assert_eq!(catalog.getxattr("/ALL/song1", "user.rating").unwrap(), b"5");
    assert!(catalog.getxattr("/by Artist/M/Moby/song1", "user.rating").unwrap().is_empty());
    assert_eq!(catalog.listxattr("/ALL").unwrap(), vec!["user.note".to_string()]);

    catalog.removexattr("/ALL/song1", "user.rating").unwrap();
    catalog.removexattr("/ALL/song1", "user.rating").unwrap();
    assert!(catalog.listxattr("/ALL/song1").unwrap().is_empty());

    assert!(matches!(catalog.setxattr("/ALL/ghost", "a", b"b"), Err(CatalogError::NotFound(_))));
}

#[test]
fn test_readlink_returns_content() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);
    assert_eq!(catalog.readlink("/ALL/song1").unwrap(), MOBY);
}

#[test]
fn test_statfs_is_static() {
    let catalog = catalog();
    assert_eq!(catalog.statfs(), StatfsConfig { block_size: 512, blocks: 20_000, available: 10_000 });
}

#[test]
fn test_write_past_max_file_size_is_rejected() {
    let mut catalog = catalog().with_max_file_size(64);
    add_song(&mut catalog, "song1", MOBY);
    let inbox_size = catalog.getattr("/ALL").unwrap().size;

    let err = catalog.write("/ALL/song1", b"x", (1 << 63) - 2).unwrap_err();
    assert!(matches!(err, CatalogError::TooLarge(_)));
    assert_eq!(err.errno(), libc::EFBIG);
    assert!(matches!(catalog.write("/ALL/song1", b"xy", u64::MAX - 1), Err(CatalogError::TooLarge(_))));
    assert!(matches!(catalog.write("/ALL/song1", b"x", 64), Err(CatalogError::TooLarge(_))));

    assert_eq!(read_all(&catalog, "/ALL/song1"), MOBY);
    assert_eq!(catalog.getattr("/ALL").unwrap().size, inbox_size);

    catalog.write("/ALL/song1", b"x", 63).unwrap();
    assert_eq!(catalog.getattr("/ALL/song1").unwrap().size, 64);
}

#[test]
fn test_truncate_past_max_file_size_is_rejected() {
    let mut catalog = catalog().with_max_file_size(64);
    add_song(&mut catalog, "song1", MOBY);

    let err = catalog.truncate("/ALL/song1", 1 << 62).unwrap_err();
    assert!(matches!(err, CatalogError::TooLarge(_)));
    assert!(matches!(catalog.truncate("/ALL/song1", 65), Err(CatalogError::TooLarge(_))));
    assert_eq!(read_all(&catalog, "/ALL/song1"), MOBY);

    catalog.truncate("/ALL/song1", 64).unwrap();
    assert_eq!(catalog.getattr("/ALL/song1").unwrap().size, 64);
}

#[test]
fn test_header_change_reports_dropped_entries() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);

    let outcome = catalog.write("/ALL/song1", BEATLES, 0).unwrap();
    assert_eq!(
        outcome.dropped,
        vec![
            "/by Artist/M/Moby/song1".to_string(),
            "/by Album/P/Play/song1".to_string(),
            "/by Title/P/Porcelain/song1".to_string(),
        ]
    );

    let outcome = catalog.write("/ALL/song1", b"no header", 0).unwrap();
    assert_eq!(outcome.dropped.len(), 3);
    assert_eq!(catalog.paths_of("/ALL/song1").unwrap(), &["/ALL".to_string()]);
}

#[test]
fn test_dot_values_stay_uncategorized() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", b"Artist: ..\nAlbum: .\nTitle: x\n");

    assert_eq!(catalog.paths_of("/ALL/song1").unwrap(), &["/ALL".to_string()]);
    assert!(!catalog.has_category_roots());
}

#[test]
fn test_canonical_names_are_never_reused() {
    let mut catalog = catalog();
    add_song(&mut catalog, "song1", MOBY);

    let err = catalog.insert_canonical("song1").unwrap_err();
    assert!(matches!(err, CatalogError::NameCollision(_)));
    assert_eq!(err.errno(), libc::EEXIST);
    assert_eq!(catalog.song_count(), 1);
    assert_eq!(read_all(&catalog, "/ALL/song1"), MOBY);
}

proptest! {
    #[test]
    fn prop_write_then_read_round_trips(data in proptest::collection::vec(any::<u8>(), 0..2048), offset in 0u64..512) {
        let mut catalog = catalog();
        catalog.create("/ALL/blob").unwrap();
        catalog.write("/ALL/blob", &data, offset).unwrap();
        prop_assert_eq!(catalog.read("/ALL/blob", data.len(), offset).unwrap(), data.as_slice());
    }

    #[test]
    fn prop_projections_match_canonical(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut catalog = catalog();
        let mut content = MOBY.to_vec();
        content.extend_from_slice(&payload);
        add_song(&mut catalog, "song", &content);

        let canonical = read_all(&catalog, "/ALL/song");
        for dir in catalog.paths_of("/ALL/song").unwrap().to_vec() {
            prop_assert_eq!(read_all(&catalog, &format!("{}/song", dir)), canonical.clone());
        }
    }
}
