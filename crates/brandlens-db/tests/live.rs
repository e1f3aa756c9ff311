//! Live integration tests for brandlens-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/brandlens-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use brandlens_core::{Plan, TeamRole};
use brandlens_db::{
    accept_invite, apply_subscription_change, count_checks_since, count_trackers_for_user,
    create_integration, create_invite, create_team, create_tracker, delete_tracker,
    get_tracker_for_user, insert_mention, latest_mention_for_tracker, link_stripe_customer,
    forget_stripe_event, get_invite_by_token, list_active_webhooks_for, list_contacts, list_due_trackers, list_members,
    list_trackers_for_user, mark_stripe_event_processed, mark_tracker_checked, member_role,
    plan_for_user, recent_source_urls, record_delivery_failure, record_delivery_success,
    remove_member, update_tracker, upsert_contact, upsert_profile, DbError, IntegrationRow,
    NewContact, NewIntegration, NewMention, NewTracker, TrackerUpdate,
    INTEGRATION_ERROR_THRESHOLD,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_tracker<'a>(user_id: Uuid, brand: &'a str) -> NewTracker<'a> {
    NewTracker {
        user_id,
        user_email: "owner@smallbiz.io",
        team_id: None,
        brand,
        query: "best project management tools",
        interval_minutes: 60,
    }
}

async fn insert_test_integration(pool: &sqlx::PgPool, user_id: Uuid) -> IntegrationRow {
    let filters = serde_json::json!({});
    create_integration(
        pool,
        &NewIntegration {
            user_id,
            team_id: None,
            name: "Relay",
            webhook_url: "https://hooks.smallbiz.io/in",
            webhook_method: "POST",
            webhook_secret: None,
            webhook_auth_header: None,
            event_filters: &filters,
            payload_template: None,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_integration failed: {e}"))
}

async fn insert_test_mention(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    tracker_id: Option<Uuid>,
    mentioned: bool,
    urls: &[String],
) {
    let raw = serde_json::json!({});
    insert_mention(
        pool,
        &NewMention {
            user_id,
            user_email: "owner@smallbiz.io",
            team_id: None,
            tracker_id,
            brand: "Acme",
            query: "best anvils",
            mentioned,
            evidence: if mentioned { "1. Acme anvils" } else { "No mention found" },
            position: mentioned.then_some(1),
            raw_output: &raw,
            source_urls: urls,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("insert_mention failed: {e}"));
}

// ---------------------------------------------------------------------------
// Trackers
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn new_trackers_are_due_until_checked(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let tracker = create_tracker(&pool, &new_tracker(user, "Acme"))
        .await
        .expect("create tracker");

    let due = list_due_trackers(&pool).await.expect("list due");
    assert!(due.iter().any(|t| t.id == tracker.id));

    mark_tracker_checked(&pool, tracker.id)
        .await
        .expect("mark checked");

    let due = list_due_trackers(&pool).await.expect("list due");
    assert!(due.iter().all(|t| t.id != tracker.id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn paused_trackers_are_never_due(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let tracker = create_tracker(&pool, &new_tracker(user, "Acme"))
        .await
        .expect("create tracker");

    let updated = update_tracker(
        &pool,
        tracker.id,
        &TrackerUpdate {
            active: Some(false),
            ..TrackerUpdate::default()
        },
    )
    .await
    .expect("pause tracker");
    assert!(!updated.active);
    assert_eq!(updated.brand, "Acme");

    let due = list_due_trackers(&pool).await.expect("list due");
    assert!(due.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn team_members_see_team_trackers(pool: sqlx::PgPool) {
    let owner = Uuid::new_v4();
    let teammate = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let team = create_team(&pool, "Growth", owner, "owner@smallbiz.io")
        .await
        .expect("create team");
    let invite = create_invite(
        &pool,
        team.id,
        "Mate@SmallBiz.io",
        TeamRole::Member,
        "tok-123",
        owner,
    )
    .await
    .expect("create invite");
    assert_eq!(invite.email, "mate@smallbiz.io");
    accept_invite(&pool, "tok-123", teammate, "mate@smallbiz.io")
        .await
        .expect("accept invite");

    let mut tracker = new_tracker(owner, "Acme");
    tracker.team_id = Some(team.id);
    let tracker = create_tracker(&pool, &tracker).await.expect("create");

    let visible = list_trackers_for_user(&pool, teammate).await.expect("list");
    assert_eq!(visible.len(), 1);
    assert!(get_tracker_for_user(&pool, tracker.id, stranger)
        .await
        .expect("get")
        .is_none());

    // Only the owner's own trackers count against their plan.
    assert_eq!(count_trackers_for_user(&pool, owner).await.expect("count"), 1);
    assert_eq!(count_trackers_for_user(&pool, teammate).await.expect("count"), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn deleting_tracker_keeps_mention_history(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let tracker = create_tracker(&pool, &new_tracker(user, "Acme"))
        .await
        .expect("create tracker");
    insert_test_mention(&pool, user, Some(tracker.id), true, &[]).await;

    delete_tracker(&pool, tracker.id).await.expect("delete");
    assert!(matches!(
        delete_tracker(&pool, tracker.id).await,
        Err(DbError::NotFound)
    ));

    let since = Utc::now() - Duration::days(1);
    assert_eq!(count_checks_since(&pool, user, since).await.expect("count"), 1);
}

// ---------------------------------------------------------------------------
// Mentions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn latest_mention_is_most_recent_per_tracker(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let tracker = create_tracker(&pool, &new_tracker(user, "Acme"))
        .await
        .expect("create tracker");

    assert!(latest_mention_for_tracker(&pool, tracker.id)
        .await
        .expect("latest")
        .is_none());

    insert_test_mention(&pool, user, Some(tracker.id), true, &[]).await;
    insert_test_mention(&pool, user, Some(tracker.id), false, &[]).await;

    let latest = latest_mention_for_tracker(&pool, tracker.id)
        .await
        .expect("latest")
        .expect("some mention");
    assert!(!latest.mentioned);
}

#[sqlx::test(migrations = "../../migrations")]
async fn recent_source_urls_are_distinct(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let a = "https://a.example.net/post".to_string();
    let b = "https://b.example.net/post".to_string();
    insert_test_mention(&pool, user, None, true, &[a.clone(), b.clone()]).await;
    insert_test_mention(&pool, user, None, true, &[a.clone()]).await;

    let urls = recent_source_urls(&pool, user, 10).await.expect("urls");
    assert_eq!(urls.len(), 2);
    assert!(urls.contains(&a));
    assert!(urls.contains(&b));
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn contact_upsert_dedupes_and_keeps_max_confidence(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let mut contact = NewContact {
        user_id: user,
        source_url: "https://smallbiz.io/blog/post",
        domain: "smallbiz.io",
        email: Some("jane.doe@smallbiz.io"),
        phone: None,
        linkedin_url: None,
        twitter_url: None,
        facebook_url: None,
        instagram_url: None,
        author_name: Some("Jane Doe"),
        company_name: None,
        extraction_method: "direct",
        confidence: 85,
    };

    let first = upsert_contact(&pool, &contact).await.expect("first upsert");
    contact.confidence = 60;
    contact.company_name = Some("SmallBiz");
    let second = upsert_contact(&pool, &contact).await.expect("second upsert");
    assert_eq!(first, second);

    let rows = list_contacts(&pool, user, 0, None, 50).await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].confidence, 85);
    assert_eq!(rows[0].company_name.as_deref(), Some("SmallBiz"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn contacts_without_email_or_phone_still_dedupe(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let contact = NewContact {
        user_id: user,
        source_url: "https://smallbiz.io/about",
        domain: "smallbiz.io",
        email: None,
        phone: None,
        linkedin_url: Some("https://www.linkedin.com/in/janedoe"),
        twitter_url: None,
        facebook_url: None,
        instagram_url: None,
        author_name: None,
        company_name: None,
        extraction_method: "contact_page",
        confidence: 30,
    };

    upsert_contact(&pool, &contact).await.expect("first upsert");
    upsert_contact(&pool, &contact).await.expect("second upsert");

    let rows = list_contacts(&pool, user, 0, Some("SmallBiz.io"), 50)
        .await
        .expect("list");
    assert_eq!(rows.len(), 1);
    assert!(list_contacts(&pool, user, 31, None, 50)
        .await
        .expect("list")
        .is_empty());
}

// ---------------------------------------------------------------------------
// Integrations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn five_failures_park_integration_until_next_success(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    let integration = insert_test_integration(&pool, user).await;

    for attempt in 1..=INTEGRATION_ERROR_THRESHOLD {
        let count = record_delivery_failure(&pool, integration.id, "HTTP 500")
            .await
            .expect("record failure");
        assert_eq!(count, attempt);
    }

    let status: String = sqlx::query_scalar("SELECT status FROM integrations WHERE id = $1")
        .bind(integration.id)
        .fetch_one(&pool)
        .await
        .expect("status");
    assert_eq!(status, "error");
    assert!(list_active_webhooks_for(&pool, user, None)
        .await
        .expect("active")
        .is_empty());

    record_delivery_success(&pool, integration.id)
        .await
        .expect("record success");

    let (status, error_count, last_error): (String, i32, Option<String>) = sqlx::query_as(
        "SELECT status, error_count, last_error FROM integrations WHERE id = $1",
    )
    .bind(integration.id)
    .fetch_one(&pool)
    .await
    .expect("row");
    assert_eq!(status, "active");
    assert_eq!(error_count, 0);
    assert!(last_error.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn team_webhooks_only_load_with_team_id(pool: sqlx::PgPool) {
    let owner = Uuid::new_v4();
    let team = create_team(&pool, "Growth", owner, "owner@smallbiz.io")
        .await
        .expect("create team");
    let filters = serde_json::json!({});
    create_integration(
        &pool,
        &NewIntegration {
            user_id: Uuid::new_v4(),
            team_id: Some(team.id),
            name: "Team relay",
            webhook_url: "https://hooks.smallbiz.io/team",
            webhook_method: "POST",
            webhook_secret: None,
            webhook_auth_header: None,
            event_filters: &filters,
            payload_template: None,
        },
    )
    .await
    .expect("create");

    assert!(list_active_webhooks_for(&pool, owner, None)
        .await
        .expect("list")
        .is_empty());
    assert_eq!(
        list_active_webhooks_for(&pool, owner, Some(team.id))
            .await
            .expect("list")
            .len(),
        1
    );
}

// ---------------------------------------------------------------------------
// Teams & profiles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn invites_are_single_use_and_owner_cannot_be_removed(pool: sqlx::PgPool) {
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let team = create_team(&pool, "Growth", owner, "owner@smallbiz.io")
        .await
        .expect("create team");
    create_invite(&pool, team.id, "m@smallbiz.io", TeamRole::Admin, "tok-1", owner)
        .await
        .expect("invite");

    accept_invite(&pool, "tok-1", member, "m@smallbiz.io")
        .await
        .expect("accept");
    let used = get_invite_by_token(&pool, "tok-1")
        .await
        .expect("lookup")
        .expect("invite exists");
    assert_eq!(used.status, "accepted");
    assert!(matches!(
        accept_invite(&pool, "tok-1", member, "m@smallbiz.io").await,
        Err(DbError::InviteUnavailable)
    ));
    assert_eq!(
        member_role(&pool, team.id, member).await.expect("role"),
        Some(TeamRole::Admin)
    );

    assert!(matches!(
        remove_member(&pool, team.id, owner).await,
        Err(DbError::NotFound)
    ));
    remove_member(&pool, team.id, member).await.expect("remove");
    assert_eq!(list_members(&pool, team.id).await.expect("members").len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn subscription_changes_follow_stripe_customer(pool: sqlx::PgPool) {
    let user = Uuid::new_v4();
    upsert_profile(&pool, user, "jane@smallbiz.io", Some("Jane"))
        .await
        .expect("upsert");
    assert_eq!(plan_for_user(&pool, user).await.expect("plan"), Plan::Free);

    link_stripe_customer(&pool, user, "cus_123").await.expect("link");
    apply_subscription_change(&pool, "cus_123", Plan::Pro, Some("sub_1"), "active")
        .await
        .expect("apply");
    assert_eq!(plan_for_user(&pool, user).await.expect("plan"), Plan::Pro);

    // A later login refreshes the email but never touches the plan.
    let profile = upsert_profile(&pool, user, "jane.doe@smallbiz.io", None)
        .await
        .expect("upsert");
    assert_eq!(profile.plan(), Plan::Pro);
    assert_eq!(profile.full_name.as_deref(), Some("Jane"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn stripe_events_are_processed_once(pool: sqlx::PgPool) {
    assert!(mark_stripe_event_processed(&pool, "evt_1", "checkout.session.completed")
        .await
        .expect("first"));
    assert!(!mark_stripe_event_processed(&pool, "evt_1", "checkout.session.completed")
        .await
        .expect("second"));

    forget_stripe_event(&pool, "evt_1").await.expect("forget");
    assert!(mark_stripe_event_processed(&pool, "evt_1", "checkout.session.completed")
        .await
        .expect("after forget"));
}
