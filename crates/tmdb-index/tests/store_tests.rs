use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use tmdb_core::config::{ConsistencyMode, IndexConfig, SearchConfig, TmConfig};
use tmdb_core::traits::{TmSeeker, TmWriter};
use tmdb_core::{Error, MetadataKind, TextFragment, TranslationUnit, TranslationUnitVariant};
use tmdb_index::{NgramAnalyzer, RawScoring, Snapshot, SnapshotManager, TantivySeeker, TantivyWriter, TmIndex};

fn tu(source: &str, target: &str) -> TranslationUnit {
    TranslationUnit::new(TranslationUnitVariant::new("en", source), TranslationUnitVariant::new("fr", target))
}

fn exact_targets(seeker: &TantivySeeker, source: &str) -> Vec<String> {
    let mut targets: Vec<_> = seeker
        .search_exact(&TextFragment::from_text(source), None)
        .unwrap()
        .into_iter()
        .map(|h| h.tu.target.content.text())
        .collect();
    targets.sort();
    targets
}

fn ram_store() -> (Arc<TantivyWriter>, TantivySeeker) {
    let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
    let writer = Arc::new(index.writer(50_000_000).unwrap());
    let seeker = TantivySeeker::open(index).unwrap();
    (writer, seeker)
}

#[test]
fn snapshot_mode_sees_commits_only_after_refresh() {
    let (writer, seeker) = ram_store();
    writer.add_document(&tu("Open the file", "Ouvrir le fichier")).unwrap();
    writer.commit().unwrap();
    assert!(exact_targets(&seeker, "Open the file").is_empty());

    seeker.refresh().unwrap();
    assert_eq!(exact_targets(&seeker, "Open the file"), vec!["Ouvrir le fichier"]);
}

#[test]
fn near_real_time_sees_uncommitted_adds() {
    let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
    let writer = Arc::new(index.writer(50_000_000).unwrap());
    let manager = SnapshotManager::new(index, ConsistencyMode::NearRealTime, Some(writer.clone())).unwrap();
    assert_eq!(manager.mode(), ConsistencyMode::NearRealTime);
    let seeker = TantivySeeker::new(manager, SearchConfig::default());

    writer.add_document(&tu("Open the file", "Ouvrir le fichier")).unwrap();
    assert!(writer.has_pending_changes());
    assert_eq!(exact_targets(&seeker, "Open the file"), vec!["Ouvrir le fichier"]);
    assert!(!writer.has_pending_changes());

    writer.add_document(&tu("Close the file", "Fermer le fichier")).unwrap();
    assert_eq!(seeker.translation_units().unwrap().len(), 2);

    seeker.close().unwrap();
    assert!(writer.is_closed());
    assert!(matches!(writer.add_document(&tu("late", "tard")), Err(Error::IndexClosed)));
}

#[test]
fn near_real_time_needs_a_writer() {
    let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
    assert!(matches!(
        SnapshotManager::new(index, ConsistencyMode::NearRealTime, None),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn overwrite_replaces_same_source() {
    let (writer, seeker) = ram_store();
    writer.index_translation_unit(&tu("Hello", "Bonjour"), false).unwrap();
    writer.index_translation_unit(&tu("Hello", "Allo"), false).unwrap();
    writer.commit().unwrap();
    seeker.refresh().unwrap();
    assert_eq!(exact_targets(&seeker, "Hello"), vec!["Allo", "Bonjour"]);

    writer.index_translation_unit(&tu("Hello", "Salut"), true).unwrap();
    writer.commit().unwrap();
    seeker.refresh().unwrap();
    assert_eq!(exact_targets(&seeker, "Hello"), vec!["Salut"]);
}

#[test]
fn delete_and_update_by_id() {
    let (writer, seeker) = ram_store();
    writer.add_document(&tu("Cut", "Couper").with_metadata(MetadataKind::Id, "a")).unwrap();
    writer.add_document(&tu("Copy", "Copier").with_metadata(MetadataKind::Id, "b")).unwrap();
    writer.commit().unwrap();

    TmWriter::delete(writer.as_ref(), "a").unwrap();
    writer.update(&tu("Copy", "Dupliquer").with_metadata(MetadataKind::Id, "b")).unwrap();
    writer.commit().unwrap();
    seeker.refresh().unwrap();

    assert!(exact_targets(&seeker, "Cut").is_empty());
    assert_eq!(exact_targets(&seeker, "Copy"), vec!["Dupliquer"]);
    assert_eq!(seeker.translation_units().unwrap().len(), 1);
}

#[test]
fn empty_source_is_not_indexed() {
    let (writer, seeker) = ram_store();
    assert_eq!(writer.add_document(&tu("", "rien")).unwrap(), None);
    assert!(writer.add_document(&tu("Something", "Quelque chose")).unwrap().is_some());
    writer.commit().unwrap();
    seeker.refresh().unwrap();
    assert_eq!(seeker.translation_units().unwrap().len(), 1);
}

#[test]
fn units_come_back_in_index_order() {
    let (writer, seeker) = ram_store();
    let units: Vec<_> = ["first", "second", "third", "fourth"]
        .iter()
        .enumerate()
        .map(|(i, s)| tu(s, "x").with_metadata(MetadataKind::Id, i.to_string()))
        .collect();
    for unit in &units {
        writer.add_document(unit).unwrap();
    }
    writer.delete("2").unwrap();
    writer.commit().unwrap();
    seeker.refresh().unwrap();

    let listed = seeker.translation_units().unwrap();
    let sources: Vec<_> = listed.iter().map(|u| u.source.content.text()).collect();
    assert_eq!(sources, vec!["first", "second", "fourth"]);
    assert_eq!(listed[0], units[0]);
}

#[test]
fn open_missing_index_fails() {
    let tmp = TempDir::new().unwrap();
    let err = TmIndex::open_in_dir(&tmp.path().join("nothing"), NgramAnalyzer::default()).err().unwrap();
    assert!(matches!(err, Error::IndexNotFound(_)));
}

#[test]
fn on_disk_index_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tm");
    {
        let index = TmIndex::create_in_dir(&path, NgramAnalyzer::default()).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        writer.add_document(&tu("Print the page", "Imprimer la page")).unwrap();
        writer.close().unwrap();
    }
    let index = TmIndex::open_in_dir(&path, NgramAnalyzer::default()).unwrap();
    assert_eq!(index.path(), Some(path.as_path()));
    let seeker = TantivySeeker::open(index).unwrap();
    let hits = seeker.search_fuzzy(&"Print the pages".into(), 80.0, 5, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].tu.target.content.text(), "Imprimer la page");

    let reopened = TmIndex::open_or_create_in_dir(&path, NgramAnalyzer::default()).unwrap();
    let snapshot = SnapshotManager::snapshot_mode(reopened).unwrap().snapshot().unwrap();
    assert_eq!(snapshot.num_docs(), 1);
    assert_eq!(snapshot.document(0).unwrap().source_text, "Print the page");
}

#[test]
fn create_in_dir_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tm");
    {
        let index = TmIndex::create_in_dir(&path, NgramAnalyzer::default()).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        writer.add_document(&tu("old", "vieux")).unwrap();
        writer.close().unwrap();
    }
    let index = TmIndex::create_in_dir(&path, NgramAnalyzer::default()).unwrap();
    let seeker = TantivySeeker::open(index).unwrap();
    assert!(seeker.translation_units().unwrap().is_empty());
}

#[test]
fn reopening_with_another_analyzer_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tm");
    {
        let index = TmIndex::create_in_dir(&path, NgramAnalyzer::default()).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        writer.add_document(&tu("watch out for the killer rabbit", "t")).unwrap();
        writer.close().unwrap();
    }
    for other in [NgramAnalyzer::new(3), NgramAnalyzer::default().with_fold_case(true)] {
        assert!(matches!(TmIndex::open_in_dir(&path, other.clone()), Err(Error::Config(_))));
        assert!(matches!(TmIndex::open_or_create_in_dir(&path, other), Err(Error::Config(_))));
    }

    let seeker = TantivySeeker::open(TmIndex::open_in_dir(&path, NgramAnalyzer::default()).unwrap()).unwrap();
    let hits = seeker.search_fuzzy(&"watch out for the killer rabbit".into(), 0.0, 5, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, 100.0);
}

#[test]
fn failed_close_keeps_writer_open() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tm");
    let index = TmIndex::create_in_dir(&path, NgramAnalyzer::default()).unwrap();
    let writer = Arc::new(index.writer(50_000_000).unwrap());
    let manager = SnapshotManager::near_real_time(writer.clone()).unwrap();
    writer.add_document(&tu("Save the file", "Enregistrer le fichier")).unwrap();

    std::fs::remove_dir_all(&path).unwrap();
    assert!(matches!(manager.close(), Err(Error::IndexIo { .. })));
    assert!(!manager.is_closed());
    assert!(!writer.is_closed());
    assert!(writer.has_pending_changes());
    assert!(writer.close().is_err());
    assert!(!writer.is_closed());
}

#[test]
fn consistency_mode_comes_from_config() {
    let tmp = TempDir::new().unwrap();
    let mut config = TmConfig::default();
    config.index.path = tmp.path().join("tm").to_string_lossy().into_owned();
    config.index.mode = ConsistencyMode::NearRealTime;

    let seeker = TantivySeeker::from_config(TmIndex::from_config(&config).unwrap(), &config).unwrap();
    assert_eq!(seeker.manager().mode(), ConsistencyMode::NearRealTime);
    let writer = seeker.manager().writer().unwrap().clone();
    writer.add_document(&tu("Open the file", "Ouvrir le fichier")).unwrap();
    assert_eq!(exact_targets(&seeker, "Open the file"), vec!["Ouvrir le fichier"]);
    writer.add_document(&tu("Close the file", "Fermer le fichier")).unwrap();
    seeker.close().unwrap();
    drop(writer);

    config.index.mode = ConsistencyMode::Snapshot;
    let reopened = TantivySeeker::from_config(TmIndex::from_config(&config).unwrap(), &config).unwrap();
    assert!(reopened.manager().writer().is_none());
    assert_eq!(reopened.translation_units().unwrap().len(), 2);
}

#[test]
fn snapshot_mode_config_needs_no_writer() {
    let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
    let manager = SnapshotManager::from_config(index, &IndexConfig::default()).unwrap();
    assert_eq!(manager.mode(), ConsistencyMode::Snapshot);
    assert!(manager.writer().is_none());
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn search_types_are_shareable_across_threads() {
    assert_send_sync::<Snapshot>();
    assert_send_sync::<SnapshotManager>();
    assert_send_sync::<TantivySeeker>();
    assert_send_sync::<TantivyWriter>();
}

#[test]
fn readers_keep_a_stable_view_while_writer_adds() {
    let (writer, seeker) = ram_store();
    for i in 0..50 {
        writer.add_document(&tu(&format!("print page number {i:03}"), "t")).unwrap();
    }
    writer.commit().unwrap();
    seeker.refresh().unwrap();

    let snapshot = seeker.manager().snapshot().unwrap();
    let bag = snapshot.analyzer().bag("print page number 007");
    let expected = snapshot.ngram_candidates(&bag, RawScoring::Dice, 50.0, None, usize::MAX).unwrap();
    let expected_hits = seeker.search_fuzzy(&"print page number 007".into(), 50.0, 100, None).unwrap();
    assert_eq!(expected.len(), 50);

    thread::scope(|scope| {
        for _ in 0..4 {
            let snapshot = snapshot.clone();
            let (bag, expected, expected_hits, seeker) = (&bag, &expected, &expected_hits, &seeker);
            scope.spawn(move || {
                for _ in 0..20 {
                    assert_eq!(snapshot.num_docs(), 50);
                    let found = snapshot.ngram_candidates(bag, RawScoring::Dice, 50.0, None, usize::MAX).unwrap();
                    assert_eq!(&found, expected);
                    let hits = seeker.search_fuzzy(&"print page number 007".into(), 50.0, 100, None).unwrap();
                    assert_eq!(&hits, expected_hits);
                }
            });
        }
        scope.spawn(|| {
            for i in 50..100 {
                writer.add_document(&tu(&format!("print page number {i:03}"), "t")).unwrap();
                if i % 10 == 0 {
                    writer.commit().unwrap();
                }
            }
            writer.commit().unwrap();
        });
    });

    assert_eq!(snapshot.num_docs(), 50);
    seeker.refresh().unwrap();
    assert_eq!(seeker.manager().snapshot().unwrap().num_docs(), 100);
}
