use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use choreboard::models::{Instance, QuestInstance, QuestStatus, VirtualInstance};
use choreboard::urgency::{classify, sort_by_urgency, Urgency};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap()
}

fn persisted(id: u64, due_at: Option<DateTime<Utc>>) -> Instance {
    Instance::Persisted(QuestInstance {
        id,
        family_id: "home".into(),
        template_id: None,
        occurrence_date: None,
        title: format!("quest {id}"),
        category: None,
        points: 1,
        status: QuestStatus::Pending,
        assigned_to: None,
        due_at,
        created_at: now(),
        started_at: None,
        completed_at: None,
        approved_at: None,
        pending_award: None,
    })
}

fn virtual_for(template: &str, due_at: Option<DateTime<Utc>>) -> Instance {
    Instance::Virtual(VirtualInstance {
        family_id: "home".into(),
        template_id: template.into(),
        occurrence_date: NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
        title: template.into(),
        category: None,
        points: 1,
        assigned_to: None,
        due_at,
    })
}

#[test]
fn test_undated_is_medium() {
    assert_eq!(classify(None, now()), Urgency::Medium);
}

#[test]
fn test_overdue_is_critical() {
    assert_eq!(classify(Some(now() - Duration::seconds(1)), now()), Urgency::Critical);
    assert_eq!(classify(Some(now() - Duration::days(3)), now()), Urgency::Critical);
}

#[test]
fn test_due_exactly_now_is_high() {
    assert_eq!(classify(Some(now()), now()), Urgency::High);
}

#[test]
fn test_two_hour_boundary() {
    let n = now();
    assert_eq!(classify(Some(n + Duration::hours(2)), n), Urgency::Medium);
    assert_eq!(classify(Some(n + Duration::hours(2) - Duration::seconds(1)), n), Urgency::High);
}

#[test]
fn test_six_hour_boundary() {
    let n = now();
    assert_eq!(classify(Some(n + Duration::hours(6)), n), Urgency::Medium);
    assert_eq!(classify(Some(n + Duration::hours(6) + Duration::seconds(1)), n), Urgency::Low);
    assert_eq!(classify(Some(n + Duration::days(2)), n), Urgency::Low);
}

#[test]
fn test_sort_puts_earliest_first_and_undated_last() {
    let n = now();
    let mut items = vec![
        persisted(1, None),
        persisted(2, Some(n + Duration::hours(5))),
        virtual_for("trash", Some(n - Duration::hours(1))),
        persisted(3, Some(n + Duration::hours(1))),
    ];
    sort_by_urgency(&mut items);
    let titles: Vec<&str> = items.iter().map(|i| i.title()).collect();
    assert_eq!(titles, vec!["trash", "quest 3", "quest 2", "quest 1"]);
}

#[test]
fn test_sort_is_stable() {
    let due = Some(now() + Duration::hours(3));
    let mut items = vec![
        persisted(7, due),
        persisted(1, None),
        virtual_for("dishes", due),
        persisted(4, due),
        persisted(2, None),
    ];
    sort_by_urgency(&mut items);
    let titles: Vec<&str> = items.iter().map(|i| i.title()).collect();
    assert_eq!(titles, vec!["quest 7", "dishes", "quest 4", "quest 1", "quest 2"]);

    // Sorting an already sorted board changes nothing.
    let before = items.clone();
    sort_by_urgency(&mut items);
    assert_eq!(items, before);
}
