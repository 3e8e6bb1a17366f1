//! Integration tests for the view cache (ViewManager + UnitOfWork + InMemoryAdapter).


use model::{by_group, in_group, manager, seed, sorted_ids, store, Tally, TallyView};
use view_cache::{CommitStats, OptimisticConflict, PersistenceAdapter, View, ViewError};

#[test]
fn persisted_view_can_be_required_later() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["t-1"]);

    let mut uow = manager.begin();
    let view = uow.require("t-1").unwrap();
    assert_eq!(view.borrow().group_id, "G");
    assert_eq!(view.borrow_mut().count(), 0);
    assert_eq!(view.borrow().version(), 0);
}

#[test]
fn update_bumps_version_once() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["t-1"]);

    let stats = manager
        .transaction(|uow| {
            let view = uow.require("t-1")?;
            view.borrow_mut().increment();
            view.borrow_mut().increment();
            Ok::<_, ViewError>(())
        })
        .and_then(|_| {
            let mut uow = manager.begin();
            uow.require("t-1")?.borrow_mut().increment();
            uow.flush()
        })
        .unwrap();
    assert_eq!(stats.updated, 1);

    let mut uow = manager.begin();
    let view = uow.require("t-1").unwrap();
    assert_eq!(view.borrow_mut().count(), 3);
    assert_eq!(view.borrow().version(), 2);
}

#[test]
fn removed_view_is_gone_after_flush() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["t-1"]);

    let mut uow = manager.begin();
    uow.remove("t-1");
    assert_eq!(
        uow.flush().unwrap(),
        CommitStats {
            deleted: 1,
            ..Default::default()
        }
    );

    let mut uow = manager.begin();
    assert!(uow.require("t-1").unwrap_err().is_not_found());
    assert!(store.is_empty().unwrap());
}

#[test]
fn find_by_group_returns_stored_views() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["t-1", "t-2"]);
    seed(&manager, "H", &["t-3"]);

    let mut uow = manager.begin();
    let found = uow.find_by(&by_group("G"), in_group("G")).unwrap();
    assert_eq!(sorted_ids(&found), ["t-1", "t-2"]);
}

#[test]
fn identity_map_hands_out_the_same_view() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["t-1"]);

    let mut uow = manager.begin();
    let first = uow.require("t-1").unwrap();
    let second = uow.require("t-1").unwrap();
    let loaded = uow.load("t-1").unwrap().unwrap();
    let found = uow.find_by(&by_group("G"), in_group("G")).unwrap();

    assert!(first.ptr_eq(&second));
    assert!(first.ptr_eq(&loaded));
    assert!(first.ptr_eq(&found[0]));

    first.borrow_mut().increment();
    assert_eq!(second.borrow_mut().count(), 1);
}

#[test]
fn regrouped_view_leaves_the_group_within_the_session() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a", "b"]);

    let mut uow = manager.begin();
    let a = uow.require("a").unwrap();
    a.borrow_mut().group_id = "H".into();

    let in_g = uow.find_by(&by_group("G"), in_group("G")).unwrap();
    assert_eq!(sorted_ids(&in_g), ["b"]);

    let in_h = uow.find_by(&by_group("H"), in_group("H")).unwrap();
    assert_eq!(in_h.len(), 1);
    assert!(in_h[0].ptr_eq(&a));

    uow.remove("b");
    assert!(uow.find_by(&by_group("G"), in_group("G")).unwrap().is_empty());
}

#[test]
fn edits_to_views_found_by_group_are_flushed() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a", "b"]);

    manager
        .transaction(|uow| {
            for view in uow.find_by(&by_group("G"), in_group("G"))? {
                view.borrow_mut().increment();
            }
            Ok::<_, ViewError>(())
        })
        .unwrap();

    for id in ["a", "b"] {
        let row = store.select(id).unwrap().unwrap();
        assert_eq!(row.version, 1);
        let tally: Tally = serde_json::from_slice(row.data.as_deref().unwrap()).unwrap();
        assert_eq!(tally.count, 1);
    }
}

#[test]
fn removal_is_visible_before_flush() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["t-1"]);

    let mut uow = manager.begin();
    uow.require("t-1").unwrap();
    uow.remove("t-1");

    assert!(uow.require("t-1").unwrap_err().is_not_found());
    assert!(uow.load("t-1").unwrap().is_none());
    assert!(uow.find_by(&by_group("G"), in_group("G")).unwrap().is_empty());
    assert!(store.select("t-1").unwrap().is_some());
}

#[test]
fn recreating_a_removed_id_replaces_the_row() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["t-1"]);
    {
        let mut uow = manager.begin();
        uow.require("t-1").unwrap().borrow_mut().increment();
        uow.flush().unwrap();
    }

    let mut uow = manager.begin();
    uow.require("t-1").unwrap();
    uow.remove("t-1");
    let replacement = uow.persist(TallyView::new("t-1", "H")).unwrap();
    assert!(uow.require("t-1").unwrap().ptr_eq(&replacement));

    let stats = uow.flush().unwrap();
    assert_eq!((stats.deleted, stats.updated, stats.inserted), (1, 0, 1));

    let mut uow = manager.begin();
    let view = uow.require("t-1").unwrap();
    assert_eq!(view.borrow().group_id, "H");
    assert_eq!(view.borrow().version(), 0);
    assert_eq!(view.borrow_mut().count(), 0);
}

#[test]
fn persisting_a_new_id_then_removing_leaves_no_row() {
    let store = store();
    let manager = manager(&store);

    let mut uow = manager.begin();
    uow.persist(TallyView::new("t-1", "G")).unwrap();
    uow.remove("t-1");

    assert!(uow.flush().unwrap().is_empty());
    assert!(store.is_empty().unwrap());
}

#[test]
fn replaced_then_removed_view_is_deleted() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["x"]);

    let mut uow = manager.begin();
    uow.require("x").unwrap();
    uow.persist(TallyView::new("x", "H")).unwrap();
    uow.remove("x");

    assert_eq!(
        uow.flush().unwrap(),
        CommitStats {
            deleted: 1,
            ..Default::default()
        }
    );
    assert!(store.select("x").unwrap().is_none());
}

#[test]
fn persisting_over_an_unread_row_then_removing_deletes_it() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["y", "z"]);

    let mut uow = manager.begin();
    uow.persist(TallyView::new("y", "G")).unwrap();
    uow.remove("y");

    assert_eq!(uow.flush().unwrap().deleted, 1);
    assert_eq!(store.ids().unwrap(), ["z"]);
}

#[test]
fn create_builds_the_view_from_a_payload() {
    let store = store();
    let manager = manager(&store);

    let created = manager.transaction(|uow| {
        let view = uow.create(
            "t-1",
            Tally {
                count: 7,
                label: "created".into(),
            },
        )?;
        let group = view.borrow().group_id.clone();
        Ok::<_, ViewError>(group)
    });
    assert_eq!(created, Ok(String::new()));

    let mut uow = manager.begin();
    assert_eq!(uow.require("t-1").unwrap().borrow_mut().count(), 7);
}

#[test]
fn delete_all_bypasses_sessions() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a", "b"]);

    manager.delete_all().unwrap();
    assert!(store.is_empty().unwrap());

    let mut uow = manager.begin();
    assert!(uow.load("a").unwrap().is_none());
}

#[test]
fn removing_an_unknown_id_conflicts_at_flush() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a"]);

    let mut uow = manager.begin();
    uow.remove("a");
    uow.remove("ghost");
    let err = uow.flush().unwrap_err();

    assert!(matches!(
        err,
        ViewError::OptimisticConflict(OptimisticConflict::DeleteCount {
            expected: 2,
            affected: 1,
            ..
        })
    ));
    assert!(store.select("a").unwrap().is_some());
}

#[test]
fn dropped_unit_of_work_writes_nothing() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a"]);

    {
        let mut uow = manager.begin();
        uow.require("a").unwrap().borrow_mut().increment();
        uow.persist(TallyView::new("b", "G")).unwrap();
    }

    assert_eq!(store.ids().unwrap(), ["a"]);
    assert_eq!(store.select("a").unwrap().unwrap().version, 0);
}

#[test]
fn unmodified_views_are_not_written() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a", "b"]);

    let mut uow = manager.begin();
    let a = uow.require("a").unwrap();
    assert_eq!(a.borrow_mut().count(), 0);
    uow.find_by(&by_group("G"), in_group("G")).unwrap();

    assert!(uow.flush().unwrap().is_empty());
    assert_eq!(store.select("a").unwrap().unwrap().version, 0);
}

#[test]
fn index_only_changes_are_written() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a"]);

    let mut uow = manager.begin();
    uow.require("a").unwrap().borrow_mut().group_id = "H".into();
    assert_eq!(uow.flush().unwrap().updated, 1);

    let mut uow = manager.begin();
    let in_h = uow.find_by(&by_group("H"), in_group("H")).unwrap();
    assert_eq!(sorted_ids(&in_h), ["a"]);
    assert_eq!(store.select("a").unwrap().unwrap().version, 1);
}

#[test]
fn written_payload_is_visible_to_later_reads() {
    let store = store();
    let manager = manager(&store);
    seed(&manager, "G", &["a"]);

    let mut uow = manager.begin();
    let a = uow.require("a").unwrap();
    a.borrow_mut().increment();
    let snapshot = a.borrow_mut().document_mut().serialize().unwrap().unwrap();
    a.borrow_mut().increment();

    let first: Tally = serde_json::from_slice(&snapshot).unwrap();
    assert_eq!(first.count, 1);
    assert_eq!(uow.require("a").unwrap().borrow_mut().count(), 2);
    assert!(a.borrow().document().is_dirty());

    uow.flush().unwrap();
    let row = store.select("a").unwrap().unwrap();
    let stored: Tally = serde_json::from_slice(row.data.as_deref().unwrap()).unwrap();
    assert_eq!(stored.count, 2);
}

#[cfg(feature = "bitcode")]
#[test]
fn bitcode_codec_round_trips_payloads() {
    use view_cache::{BitcodeCodec, ViewManager};

    let store = store();
    let manager: ViewManager<TallyView> = ViewManager::new(store.clone(), BitcodeCodec);
    seed(&manager, "G", &["a"]);

    let mut uow = manager.begin();
    uow.require("a").unwrap().borrow_mut().increment();
    uow.flush().unwrap();

    let mut uow = manager.begin();
    assert_eq!(uow.require("a").unwrap().borrow_mut().count(), 1);
    assert!(serde_json::from_slice::<Tally>(
        store.select("a").unwrap().unwrap().data.as_deref().unwrap()
    )
    .is_err());
}

#[test]
fn derived_table_and_index_columns() {
    assert_eq!(TallyView::TABLE, "tallies");

    let view = TallyView::new("a", "G");
    assert_eq!(view.index().get_str("group_id"), Some("G"));
    assert_eq!(view.id(), "a");
}
