use proptest::prelude::*;
use std::path::Path;
use webpcache::engine::Reaper;
use webpcache::fingerprint::fingerprint;
use webpcache::paths::{self, PathMapper};
use webpcache::store::{ByteStore, MemoryStore};

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

proptest! {
    #[test]
    fn test_fingerprint_determinism(bytes in prop::collection::vec(any::<u8>(), 0..4096), len in 0usize..80) {
        let a = fingerprint(&bytes, len);
        let b = fingerprint(&bytes, len);

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.len(), len.min(64));
        prop_assert!(a.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn test_fingerprint_prefix_stable(bytes in prop::collection::vec(any::<u8>(), 0..512), len in 1usize..64) {
        let long = fingerprint(&bytes, 64);
        prop_assert!(long.starts_with(&fingerprint(&bytes, len)));
    }

    #[test]
    fn test_mapper_round_trip(dirs in prop::collection::vec(segment(), 0..4), stem in segment(), ext in "\\.(png|jpg|jpeg)") {
        let mapper = PathMapper::default();
        let mut path = dirs.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(&stem);
        let real = format!("{path}{ext}");

        let virt = mapper.derive_virtual_artifact_path(&real).unwrap();
        prop_assert!(mapper.is_virtual(&virt));
        prop_assert_eq!(mapper.strip_virtual_extension(&virt), path.as_str());
        prop_assert_eq!(mapper.with_real_extension(&virt, &ext).unwrap(), real.clone());
        prop_assert_eq!(paths::file_stem_of(&real).unwrap(), stem.as_str());
    }

    #[test]
    fn test_content_tag_preserves_extension(stem in segment(), fp in "[0-9a-f]{6}") {
        let mapper = PathMapper::default();
        let tagged = mapper.with_content_tag(&format!("{stem}.webp"), &fp).unwrap();

        prop_assert_eq!(&tagged, &format!("{stem}.{fp}.webp"));
        prop_assert!(mapper.is_virtual(&tagged));
        prop_assert_eq!(paths::file_stem_of(&tagged).unwrap(), format!("{stem}.{fp}"));
    }

    #[test]
    fn test_reaper_only_touches_its_stem(
        stem in segment(),
        other in segment(),
        hashes in prop::collection::vec("[0-9a-f]{6}", 1..5),
    ) {
        prop_assume!(stem != other);
        let store = MemoryStore::new();
        let mapper = PathMapper::default();
        for h in &hashes {
            store.insert(format!("/img/{stem}.{h}.webp"), vec![0u8]);
            store.insert(format!("/img/{other}.{h}.webp"), vec![0u8]);
        }
        store.insert(format!("/img/{stem}.png"), vec![0u8]);

        let removed = Reaper::new(&store, &mapper)
            .reclaim(Path::new("/img"), &stem, 6)
            .unwrap();

        let mut unique = hashes.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(removed, unique.len());
        let source_path = format!("/img/{stem}.png");
        prop_assert!(store.exists(Path::new(&source_path)));
        for h in &unique {
            let other_path = format!("/img/{other}.{h}.webp");
            prop_assert!(store.exists(Path::new(&other_path)));
        }
    }
}
