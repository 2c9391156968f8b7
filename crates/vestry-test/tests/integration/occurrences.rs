#![allow(clippy::expect_used)]

use chrono::Weekday;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use uuid::Uuid;
use vestry_db::db::query::event as event_query;
use vestry_db::db::query::event::occurrence as occurrence_query;
use vestry_db::db::schema::event as event_table;
use vestry_db::model::event::RecurrencePattern;
use vestry_service::clock::FixedClock;
use vestry_service::error::ServiceError;
use vestry_service::events::generate::{
    GenerateRequest, generate_for_event, generate_in_transaction, generate_upcoming,
};
use vestry_service::events::rule::{RecurrenceRule, weekday_index};
use vestry_service::events::schedule::{
    OccurrenceEdit, add_manual_occurrence, edit_occurrence, month_schedule,
};
use vestry_test::{date, window};

#[test_log::test(tokio::test)]
async fn generation_is_idempotent_in_postgres() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Sunday Worship",
            RecurrencePattern::Weekly,
            Some(weekday_index(Weekday::Sun)),
            date(2024, 1, 1),
            None,
        )
        .await
        .expect("event");
    let mut conn = db.conn().await.expect("conn");
    let june = GenerateRequest::for_window(window(date(2024, 6, 1), date(2024, 6, 30)));

    let first = generate_for_event(&mut conn, event.id, june).await.expect("first");
    let second = generate_for_event(&mut conn, event.id, june).await.expect("second");

    assert_eq!(first, 5);
    assert_eq!(second, 0);
    let rows = occurrence_query::list_in_window(&mut conn, event.id, window(date(2024, 6, 1), date(2024, 6, 30)))
        .await
        .expect("list");
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|row| row.day_name() == "Sunday"));
}

#[test_log::test(tokio::test)]
async fn leader_edit_survives_regeneration() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Bible Study",
            RecurrencePattern::Weekly,
            Some(weekday_index(Weekday::Wed)),
            date(2024, 6, 3),
            Some(date(2024, 12, 31)),
        )
        .await
        .expect("event");
    let mut conn = db.conn().await.expect("conn");
    let clock = FixedClock::from_unix(1_718_000_000);
    let june = GenerateRequest::for_window(window(date(2024, 6, 1), date(2024, 6, 30)));
    generate_for_event(&mut conn, event.id, june).await.expect("generate");

    let first = occurrence_query::get_by_date(&mut conn, event.id, date(2024, 6, 5))
        .await
        .expect("query")
        .expect("first Wednesday");
    let leader = Uuid::new_v4();
    edit_occurrence(
        &mut conn,
        first.id,
        OccurrenceEdit {
            leader_id: Some(Some(leader)),
            notes: Some("Romans 8".to_string()),
            ..OccurrenceEdit::default()
        },
        &clock,
    )
    .await
    .expect("edit");

    generate_for_event(&mut conn, event.id, june).await.expect("regenerate");

    let after = occurrence_query::get(&mut conn, first.id)
        .await
        .expect("query")
        .expect("still there");
    assert_eq!(after.leader_id, Some(leader));
    assert_eq!(after.notes, "Romans 8");
}

#[test_log::test(tokio::test)]
async fn replace_existing_only_clears_window() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Choir Practice",
            RecurrencePattern::Daily,
            None,
            date(2024, 3, 1),
            None,
        )
        .await
        .expect("event");
    let mut conn = db.conn().await.expect("conn");
    let march = GenerateRequest::for_window(window(date(2024, 3, 1), date(2024, 3, 31)));
    generate_for_event(&mut conn, event.id, march).await.expect("seed");

    let middle = GenerateRequest::for_window(window(date(2024, 3, 10), date(2024, 3, 12)));
    let recreated = generate_for_event(&mut conn, event.id, middle.replacing())
        .await
        .expect("replace");

    assert_eq!(recreated, 3);
    let all = occurrence_query::list_in_window(&mut conn, event.id, window(date(2024, 3, 1), date(2024, 3, 31)))
        .await
        .expect("list");
    assert_eq!(all.len(), 31);
}

#[test_log::test(tokio::test)]
async fn unknown_event_is_not_found() {
    let db = test_db_or_skip!();
    let mut conn = db.conn().await.expect("conn");
    let result = generate_for_event(&mut conn, Uuid::new_v4(), GenerateRequest::default()).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[test_log::test(tokio::test)]
async fn month_schedule_generates_and_filters() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Youth Group",
            RecurrencePattern::Biweekly,
            Some(weekday_index(Weekday::Fri)),
            date(2024, 1, 1),
            Some(date(2024, 12, 31)),
        )
        .await
        .expect("event");
    let mut conn = db.conn().await.expect("conn");

    let schedule = month_schedule(&mut conn, event.id, Some("2024-02"))
        .await
        .expect("schedule");
    let dates: Vec<_> = schedule.occurrences.iter().map(|o| o.occurrence_date).collect();
    assert_eq!(schedule.month, window(date(2024, 2, 1), date(2024, 2, 29)));
    assert_eq!(schedule.created, 2);
    assert_eq!(dates, [date(2024, 2, 2), date(2024, 2, 16)]);

    let fallback = month_schedule(&mut conn, event.id, Some("February"))
        .await
        .expect("fallback");
    assert_eq!(fallback.month, window(date(2024, 1, 1), date(2024, 1, 31)));
    assert_eq!(fallback.occurrences.len(), 2);
}

#[test_log::test(tokio::test)]
async fn manual_occurrence_rules() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Prayer Meeting",
            RecurrencePattern::Weekly,
            Some(weekday_index(Weekday::Tue)),
            date(2024, 6, 1),
            Some(date(2024, 8, 31)),
        )
        .await
        .expect("event");
    let mut conn = db.conn().await.expect("conn");

    let extra = add_manual_occurrence(&mut conn, event.id, date(2024, 7, 5))
        .await
        .expect("add");
    assert_eq!(extra.start_time, event.start_time);

    let duplicate = add_manual_occurrence(&mut conn, event.id, date(2024, 7, 5)).await;
    assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

    let too_late = add_manual_occurrence(&mut conn, event.id, date(2024, 9, 3)).await;
    assert!(matches!(too_late, Err(ServiceError::ValidationError(_))));

    let other = add_manual_occurrence(&mut conn, event.id, date(2024, 7, 9))
        .await
        .expect("add second");
    let clash = edit_occurrence(
        &mut conn,
        other.id,
        OccurrenceEdit {
            occurrence_date: Some(date(2024, 7, 5)),
            ..OccurrenceEdit::default()
        },
        &FixedClock::from_unix(1_720_000_000),
    )
    .await;
    assert!(matches!(clash, Err(ServiceError::Conflict(_))));
}

#[test_log::test(tokio::test)]
async fn upcoming_batch_and_cascade_delete() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Men's Breakfast",
            RecurrencePattern::Monthly,
            None,
            date(2021, 1, 31),
            None,
        )
        .await
        .expect("event");
    let mut conn = db.conn().await.expect("conn");

    let created = generate_upcoming(&mut conn, date(2024, 6, 15), 3)
        .await
        .expect("upcoming");
    assert_eq!(created, 3);

    let summer = window(date(2024, 6, 1), date(2024, 8, 31));
    let dates: Vec<_> = occurrence_query::list_in_window(&mut conn, event.id, summer)
        .await
        .expect("list")
        .into_iter()
        .map(|o| o.occurrence_date)
        .collect();
    assert_eq!(dates, [date(2024, 6, 30), date(2024, 7, 31), date(2024, 8, 31)]);

    assert!(event_query::delete(&mut conn, event.id).await.expect("delete"));
    let orphans = occurrence_query::list_in_window(&mut conn, event.id, summer)
        .await
        .expect("list");
    assert!(orphans.is_empty());
}

#[test_log::test(tokio::test)]
async fn concurrent_generation_inserts_each_date_once() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Evening Prayer",
            RecurrencePattern::Daily,
            None,
            date(2024, 9, 1),
            None,
        )
        .await
        .expect("event");
    let rule = RecurrenceRule::from_event(&event).expect("rule");
    let september = window(date(2024, 9, 1), date(2024, 9, 30));
    let overlapping = window(date(2024, 9, 10), date(2024, 10, 15));

    let mut first_conn = db.conn().await.expect("first conn");
    let mut second_conn = db.conn().await.expect("second conn");
    let (first, second) = tokio::join!(
        generate_in_transaction(&mut first_conn, &rule, GenerateRequest::for_window(september)),
        generate_in_transaction(&mut second_conn, &rule, GenerateRequest::for_window(overlapping)),
    );
    drop(first_conn);
    drop(second_conn);

    let first = first.expect("first writer");
    let second = second.expect("second writer");
    let expected = usize::try_from(window(date(2024, 9, 1), date(2024, 10, 15)).len_days())
        .expect("day count");
    assert_eq!(first + second, expected);

    let mut conn = db.conn().await.expect("conn");
    let rows = occurrence_query::list_in_window(&mut conn, event.id, window(date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .expect("list");
    assert_eq!(rows.len(), expected);
}

#[test_log::test(tokio::test)]
async fn edit_revalidates_unchanged_date_against_shortened_recurrence() {
    let db = test_db_or_skip!();
    let event = db
        .recurring_event(
            "Advent Vespers",
            RecurrencePattern::Weekly,
            Some(weekday_index(Weekday::Wed)),
            date(2024, 11, 1),
            Some(date(2024, 12, 31)),
        )
        .await
        .expect("event");
    let mut conn = db.conn().await.expect("conn");
    let clock = FixedClock::from_unix(1_733_000_000);
    let december = GenerateRequest::for_window(window(date(2024, 12, 1), date(2024, 12, 31)));
    generate_for_event(&mut conn, event.id, december).await.expect("generate");

    diesel::update(event_table::table.filter(event_table::id.eq(event.id)))
        .set(event_table::recurrence_until.eq(date(2024, 12, 15)))
        .execute(&mut conn)
        .await
        .expect("shorten recurrence");

    let late = occurrence_query::get_by_date(&mut conn, event.id, date(2024, 12, 25))
        .await
        .expect("query")
        .expect("Christmas Day row");
    let notes_only = OccurrenceEdit {
        notes: Some("Carols".to_string()),
        ..OccurrenceEdit::default()
    };
    let rejected = edit_occurrence(&mut conn, late.id, notes_only.clone(), &clock).await;
    assert!(matches!(rejected, Err(ServiceError::ValidationError(_))));

    let early = occurrence_query::get_by_date(&mut conn, event.id, date(2024, 12, 11))
        .await
        .expect("query")
        .expect("row inside bounds");
    let edited = edit_occurrence(&mut conn, early.id, notes_only, &clock)
        .await
        .expect("edit inside bounds");
    assert_eq!(edited.notes, "Carols");
}
