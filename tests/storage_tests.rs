use chrono::{NaiveDate, TimeZone, Utc};
use choreboard::ledger::PointsLedger;
use choreboard::models::{QuestInstance, QuestStatus, QuestTemplate, RecurrenceRule};
use choreboard::storage::{JsonStore, MemoryStore, QuestStore};
use choreboard::StoreError;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn template(id: &str, family: &str, rule: RecurrenceRule) -> QuestTemplate {
    QuestTemplate {
        id: id.into(),
        family_id: family.into(),
        title: id.into(),
        category: None,
        points: 1,
        created_by: "alex".into(),
        default_assignee: None,
        rule,
        last_notified_at: None,
    }
}

fn instance(template_id: Option<&str>, date: Option<NaiveDate>) -> QuestInstance {
    QuestInstance {
        id: 0,
        family_id: "home".into(),
        template_id: template_id.map(String::from),
        occurrence_date: date,
        title: "chore".into(),
        category: None,
        points: 1,
        status: QuestStatus::Pending,
        assigned_to: Some("sam".into()),
        due_at: None,
        created_at: Utc.with_ymd_and_hms(2025, 1, 8, 8, 0, 0).unwrap(),
        started_at: None,
        completed_at: None,
        approved_at: None,
        pending_award: None,
    }
}

/// Checks shared by every store implementation.
fn exercise(store: &dyn QuestStore) {
    store
        .insert_template(template("trash", "home", RecurrenceRule::daily(d(2025, 1, 1))))
        .unwrap();
    store
        .insert_template(template("old", "home", RecurrenceRule::daily(d(2024, 1, 1)).until(d(2024, 12, 31))))
        .unwrap();
    store
        .insert_template(template("other", "smiths", RecurrenceRule::daily(d(2025, 1, 1))))
        .unwrap();
    assert!(matches!(
        store.insert_template(template("trash", "home", RecurrenceRule::daily(d(2025, 1, 1)))),
        Err(StoreError::TemplateExists(_))
    ));

    assert_eq!(store.list_templates("home").unwrap().len(), 2);
    let active = store.list_active_templates("home", d(2025, 1, 8)).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "trash");

    // Conditional create keyed by (template, date).
    let first = store
        .create_instance_if_absent(instance(Some("trash"), Some(d(2025, 1, 8))))
        .unwrap();
    assert_eq!(first.id, 1);
    assert!(matches!(
        store.create_instance_if_absent(instance(Some("trash"), Some(d(2025, 1, 8)))),
        Err(StoreError::Exists { ref template_id, date }) if template_id == "trash" && date == d(2025, 1, 8)
    ));
    let next_day = store
        .create_instance_if_absent(instance(Some("trash"), Some(d(2025, 1, 9))))
        .unwrap();
    assert_eq!(next_day.id, 2);

    // One-offs have no natural key and always insert.
    let a = store.create_instance_if_absent(instance(None, None)).unwrap();
    let b = store.create_instance_if_absent(instance(None, None)).unwrap();
    assert_ne!(a.id, b.id);

    assert_eq!(
        store.find_instance("trash", d(2025, 1, 8)).unwrap().map(|i| i.id),
        Some(first.id)
    );
    assert!(store.find_instance("trash", d(2025, 1, 10)).unwrap().is_none());

    // Optimistic update.
    let mut started = first.clone();
    started.status = QuestStatus::InProgress;
    store.update_instance(&started, QuestStatus::Pending).unwrap();
    assert!(matches!(
        store.update_instance(&started, QuestStatus::Pending),
        Err(StoreError::Conflict {
            expected: QuestStatus::Pending,
            actual: QuestStatus::InProgress,
            ..
        })
    ));
    let mut ghost = started.clone();
    ghost.id = 42;
    assert!(matches!(
        store.update_instance(&ghost, QuestStatus::InProgress),
        Err(StoreError::NotFound(42))
    ));

    // Board for a date: that day's occurrences plus open one-offs.
    let mut approved = b.clone();
    approved.status = QuestStatus::Approved;
    store.update_instance(&approved, QuestStatus::Pending).unwrap();
    let mut ids: Vec<u64> = store
        .list_instances("home", d(2025, 1, 8))
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec![first.id, a.id]);
    assert!(store.list_instances("smiths", d(2025, 1, 8)).unwrap().is_empty());
}

#[test]
fn test_memory_store() {
    exercise(&MemoryStore::new());
}

#[test]
fn test_json_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = JsonStore::open(dir.path().join("data")).unwrap();
    exercise(&store);
}

#[test]
fn test_json_store_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let store = JsonStore::open(dir.path()).unwrap();
        store
            .insert_template(template("trash", "home", RecurrenceRule::weekly(d(2025, 1, 6), [1, 3])))
            .unwrap();
        let mut owed = instance(Some("trash"), Some(d(2025, 1, 8)));
        owed.status = QuestStatus::Approved;
        owed.pending_award = Some(4);
        store.create_instance_if_absent(owed).unwrap();
        store.award("sam", 5).unwrap();
        store.award("sam", 3).unwrap();
    }
    {
        let store = JsonStore::open(dir.path()).unwrap();
        let t = store.get_template("trash").unwrap().unwrap();
        assert_eq!(t.rule.weekdays.iter().copied().collect::<Vec<u8>>(), vec![1, 3]);
        let owed = store.find_instance("trash", d(2025, 1, 8)).unwrap().unwrap();
        assert_eq!(owed.pending_award, Some(4));
        assert_eq!(store.balance("sam").unwrap(), 8);
        assert_eq!(store.balance("kim").unwrap(), 0);

        store.reset().unwrap();
        assert!(store.get_template("trash").unwrap().is_none());
        assert_eq!(store.balance("sam").unwrap(), 0);
    }
}

#[test]
fn test_json_store_reports_corrupt_files() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("templates.json"), "{ not json").unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    assert!(matches!(store.list_templates("home"), Err(StoreError::Serde(_))));
}
