//! End-to-end scenarios over an on-disk database.

use anifeed_core::comments::CommentRef;
use anifeed_core::config::FeedConfig;
use anifeed_core::core::sources::ReviewInput;
use anifeed_core::core::{CoreError, ErrorKind, FeedContext, FeedServices};
use anifeed_core::domain::{
    ActivityKey, ActivityTarget, ActivityType, CharacterRole, ItemKind, Language,
};
use anifeed_core::feed::FeedQuery;
use anifeed_core::projection::{get_activity_by_key, list_activities, list_promotions, Activity};
use anifeed_core::stats::get_stats;
use anifeed_core::store::catalog::{AnimeRecord, CharacterLink, CharacterRecord};
use anifeed_core::store::users::{NewUser, ProfileChange};
use rusqlite::params;
use tempfile::TempDir;

const AOT: i64 = 16498;
const LEVI: i64 = 40;

struct Fixture {
    _dir: TempDir,
    services: FeedServices,
    author: i64,
    viewer: i64,
}

fn anime(id: i64, title: &str) -> AnimeRecord {
    AnimeRecord {
        id,
        title: title.to_string(),
        title_korean: None,
        title_japanese: None,
        image_url: None,
        episodes: Some(25),
        duration: Some(24),
        start_date: None,
        popularity: None,
        genres: vec!["Action".to_string()],
    }
}

fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.to_string(),
        email: format!("{name}@example.com"),
        password_hash: "hash".to_string(),
        display_name: None,
        avatar_url: None,
        preferred_language: Language::En,
    }
}

fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = FeedConfig::default().with_db_path(dir.path().join("feed.db"));
    let services = FeedContext::new(config).open().unwrap();

    services.catalog().upsert_anime(&anime(AOT, "Attack on Titan")).unwrap();
    let author = services.users().create(new_user("mika")).unwrap().id;
    let viewer = services.users().create(new_user("eren")).unwrap().id;

    Fixture {
        _dir: dir,
        services,
        author,
        viewer,
    }
}

fn score(services: &FeedServices, user_id: i64) -> i64 {
    services.stats().get(user_id).unwrap().stats.otaku_score
}

fn count(services: &FeedServices, sql: &str, id: i64) -> i64 {
    services
        .db()
        .conn()
        .query_row(sql, params![id], |row| row.get(0))
        .unwrap()
}

fn aot_key(author: i64) -> ActivityKey {
    ActivityKey::rating(ItemKind::Anime, author, AOT)
}

fn review_input(title: &str) -> ReviewInput {
    ReviewInput {
        title: Some(title.to_string()),
        content: "Still holds up.".to_string(),
        is_spoiler: false,
        rating: None,
    }
}

fn without_updated_at(mut activities: Vec<Activity>) -> Vec<Activity> {
    for activity in &mut activities {
        activity.updated_at.clear();
    }
    activities
}

#[test]
fn rating_creates_activity_and_scores() {
    let f = setup();
    let before = score(&f.services, f.author);

    let activity = f
        .services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap()
        .unwrap();

    assert_eq!(activity.activity_type, ActivityType::AnimeRating);
    assert_eq!(activity.item_id, Some(AOT));
    assert_eq!(activity.rating, Some(4.5));
    assert_eq!(activity.review_content, None);
    assert_eq!(activity.item_title.as_deref(), Some("Attack on Titan"));
    assert_eq!(score(&f.services, f.author), before + 2);
}

#[test]
fn review_merges_into_rating_activity() {
    let f = setup();
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap();
    let before = score(&f.services, f.author);

    let review = f
        .services
        .reviews()
        .write(f.author, ItemKind::Anime, AOT, review_input("Great"))
        .unwrap();

    let item = f
        .services
        .feed()
        .query(&FeedQuery::for_item(ActivityType::AnimeRating, AOT), None)
        .unwrap();
    assert_eq!(item.total, 1);
    let activity = &item.items[0].activity;
    assert_eq!(activity.review_title.as_deref(), Some("Great"));
    assert_eq!(activity.review_content.as_deref(), Some("Still holds up."));
    assert_eq!(activity.activity_time, review.created_at);
    assert_eq!(score(&f.services, f.author), before + 5);
}

#[test]
fn like_on_reviewed_activity_lands_on_review() {
    let f = setup();
    f.services
        .reviews()
        .write(
            f.author,
            ItemKind::Anime,
            AOT,
            ReviewInput {
                rating: Some(4.5),
                ..review_input("Great")
            },
        )
        .unwrap();
    let review = f.services.reviews().get(f.author, ItemKind::Anime, AOT).unwrap();

    let engagement = f
        .services
        .engagement()
        .like(f.viewer, aot_key(f.author).into())
        .unwrap();

    assert_eq!(engagement.likes_count, 1);
    assert!(engagement.user_liked);
    let stored = f
        .services
        .db()
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM review_likes WHERE review_id = ?1 AND user_id = ?2",
            params![review.id, f.viewer],
            |row| row.get::<_, i64>(0),
        )
        .unwrap();
    assert_eq!(stored, 1);
    assert_eq!(
        count(&f.services, "SELECT COUNT(*) FROM activity_likes WHERE user_id = ?", f.viewer),
        0
    );
}

#[test]
fn deleting_rating_cascades_everything() {
    let f = setup();
    let activity = f
        .services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap()
        .unwrap();

    // Legacy like in the activity branch, then a review switches branches.
    f.services
        .engagement()
        .like(f.viewer, ActivityTarget::Id(activity.id))
        .unwrap();
    f.services
        .reviews()
        .write(f.author, ItemKind::Anime, AOT, review_input("Great"))
        .unwrap();
    f.services
        .engagement()
        .like(f.viewer, ActivityTarget::Id(activity.id))
        .unwrap();
    f.services
        .comments()
        .add(f.viewer, ActivityTarget::Id(activity.id), "agreed", None)
        .unwrap();
    let before = score(&f.services, f.author);

    f.services.ratings().delete(f.author, ItemKind::Anime, AOT).unwrap();

    let conn = f.services.db().conn();
    assert!(anifeed_core::projection::get_activity(conn, activity.id).unwrap().is_none());
    assert_eq!(count(&f.services, "SELECT COUNT(*) FROM review_likes WHERE user_id = ?", f.viewer), 0);
    assert_eq!(count(&f.services, "SELECT COUNT(*) FROM activity_likes WHERE user_id = ?", f.viewer), 0);
    assert_eq!(count(&f.services, "SELECT COUNT(*) FROM review_comments WHERE user_id = ?", f.viewer), 0);
    assert_eq!(score(&f.services, f.author), before - 7);
}

#[test]
fn crossing_threshold_writes_one_promotion() {
    let f = setup();
    for id in 1..=24 {
        f.services.catalog().upsert_anime(&anime(id, &format!("Show {id}"))).unwrap();
        f.services
            .ratings()
            .rate(f.author, ItemKind::Anime, id, Some(3.0), "RATED")
            .unwrap();
    }
    assert_eq!(score(&f.services, f.author), 48);
    let conn = f.services.db().conn();
    assert!(list_promotions(conn, f.author).unwrap().is_empty());

    let review = f
        .services
        .reviews()
        .write(f.author, ItemKind::Anime, 24, review_input("Fine"))
        .unwrap();

    let promotions = list_promotions(conn, f.author).unwrap();
    assert_eq!(promotions.len(), 1);
    let promotion = &promotions[0];
    assert_eq!(promotion.promotion_threshold, Some(50));
    assert_eq!(promotion.activity_time, review.created_at);
    let metadata = promotion.metadata.unwrap();
    assert_eq!((metadata.old_level, metadata.new_level), (1, 2));
    assert_eq!(metadata.otaku_score, 53);

    // Falling back under the threshold leaves the promotion in place.
    f.services.reviews().delete(f.author, ItemKind::Anime, 24).unwrap();
    assert_eq!(list_promotions(conn, f.author).unwrap().len(), 1);
}

#[test]
fn following_feed_shows_followed_users_only() {
    let f = setup();
    let stranger = f.services.users().create(new_user("levi")).unwrap().id;
    f.services.users().follow(f.viewer, f.author).unwrap();

    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap();
    f.services
        .reviews()
        .write(f.author, ItemKind::Anime, AOT, review_input("Great"))
        .unwrap();
    f.services
        .engagement()
        .like(f.viewer, aot_key(f.author).into())
        .unwrap();
    f.services.posts().create(stranger, "unrelated").unwrap();

    let page = f
        .services
        .feed()
        .query(&FeedQuery::default().following(), Some(f.viewer))
        .unwrap();

    assert_eq!(page.total, 1);
    let item = &page.items[0];
    assert_eq!(item.activity.key(), aot_key(f.author));
    assert_eq!(item.activity.review_title.as_deref(), Some("Great"));
    assert!(!item.is_my_activity);
    assert!(item.user_liked);
    assert_eq!(item.likes_count, 1);

    let err = f
        .services
        .feed()
        .query(&FeedQuery::default().following(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn every_rated_row_has_exactly_one_activity() {
    let f = setup();
    f.services.catalog().upsert_anime(&anime(1, "Mushishi")).unwrap();
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap();
    let none = f
        .services
        .ratings()
        .rate(f.author, ItemKind::Anime, 1, None, "WANT_TO_WATCH")
        .unwrap();
    assert!(none.is_none());

    let conn = f.services.db().conn();
    let ratings: Vec<_> = list_activities(conn)
        .unwrap()
        .into_iter()
        .filter(|a| a.activity_type == ActivityType::AnimeRating)
        .collect();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].item_id, Some(AOT));

    // Downgrading to a non-rated status removes the activity.
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, None, "PASS")
        .unwrap();
    assert!(list_activities(conn)
        .unwrap()
        .iter()
        .all(|a| a.activity_type != ActivityType::AnimeRating));
}

#[test]
fn score_matches_weighted_totals() {
    let f = setup();
    f.services.catalog().upsert_anime(&anime(1, "Mushishi")).unwrap();
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap();
    f.services
        .reviews()
        .write(
            f.author,
            ItemKind::Anime,
            1,
            ReviewInput {
                rating: Some(5.0),
                ..review_input("Calm")
            },
        )
        .unwrap();

    let view = f.services.stats().get(f.author).unwrap();
    let stats = view.stats;
    assert_eq!(stats.total_rated, 2);
    assert_eq!(stats.total_reviews, 1);
    assert_eq!(
        stats.otaku_score,
        2 * stats.total_rated + stats.total_character_ratings + 5 * stats.total_reviews
    );
    assert_eq!(stats.total_watch_time_minutes, 2 * 25 * 24);
    assert_eq!(view.rank.level, 1);
}

#[test]
fn replaying_log_reproduces_derived_state() {
    let f = setup();
    f.services.users().follow(f.viewer, f.author).unwrap();
    for id in 1..=25 {
        f.services.catalog().upsert_anime(&anime(id, &format!("Show {id}"))).unwrap();
        f.services
            .ratings()
            .rate(f.author, ItemKind::Anime, id, Some(4.0), "RATED")
            .unwrap();
    }
    f.services
        .reviews()
        .write(f.author, ItemKind::Anime, 3, review_input("Third"))
        .unwrap();
    let post = f.services.posts().create(f.viewer, "hello").unwrap();
    f.services.posts().edit(f.viewer, post.id, "hello again").unwrap();
    let comment = f
        .services
        .comments()
        .add(
            f.author,
            ActivityKey::post(f.viewer, post.id).into(),
            "welcome",
            None,
        )
        .unwrap();
    f.services
        .engagement()
        .like(f.author, ActivityKey::post(f.viewer, post.id).into())
        .unwrap();
    f.services.ratings().delete(f.author, ItemKind::Anime, 7).unwrap();

    let conn = f.services.db().conn();
    let activities_before = without_updated_at(list_activities(conn).unwrap());
    let mut stats_before = get_stats(conn, f.author).unwrap().unwrap();

    let replayed = f.services.recovery().rebuild_from_log().unwrap();
    assert!(replayed > 25);

    let activities_after = without_updated_at(list_activities(conn).unwrap());
    let mut stats_after = get_stats(conn, f.author).unwrap().unwrap();
    stats_before.updated_at.clear();
    stats_after.updated_at.clear();

    assert_eq!(activities_before, activities_after);
    assert_eq!(stats_before, stats_after);
    let thread = f
        .services
        .comments()
        .list(ActivityKey::post(f.viewer, post.id).into(), None)
        .unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].id, comment.id);
}

#[test]
fn pages_are_newest_first_without_overlap() {
    let f = setup();
    for n in 0..5 {
        f.services.posts().create(f.author, &format!("post {n}")).unwrap();
    }

    let feed = f.services.feed();
    let all = feed.query(&FeedQuery::default(), None).unwrap();
    let first = feed.query(&FeedQuery::default().page(2, 0), None).unwrap();
    let second = feed.query(&FeedQuery::default().page(2, 2), None).unwrap();
    let third = feed.query(&FeedQuery::default().page(2, 4), None).unwrap();

    assert_eq!(all.total, 5);
    assert_eq!(first.total, 5);
    let paged: Vec<i64> = [first, second, third]
        .iter()
        .flat_map(|page| page.items.iter().map(|item| item.activity.id))
        .collect();
    let expected: Vec<i64> = all.items.iter().map(|item| item.activity.id).collect();
    assert_eq!(paged, expected);

    for pair in all.items.windows(2) {
        let (a, b) = (&pair[0].activity, &pair[1].activity);
        assert!((a.activity_time.as_str(), a.id) > (b.activity_time.as_str(), b.id));
    }
}

#[test]
fn like_unlike_round_trip_and_double_like() {
    let f = setup();
    let post = f.services.posts().create(f.author, "hello").unwrap();
    let target: ActivityTarget = ActivityKey::post(f.author, post.id).into();
    let engagement = f.services.engagement();

    assert_eq!(engagement.get(target, None).unwrap().likes_count, 0);
    engagement.like(f.viewer, target).unwrap();
    let err = engagement.like(f.viewer, target).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let after = engagement.unlike(f.viewer, target).unwrap();
    assert_eq!(after.likes_count, 0);
    assert!(!after.user_liked);
    assert_eq!(
        engagement.unlike(f.viewer, target).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn reply_to_reply_is_rejected() {
    let f = setup();
    let post = f.services.posts().create(f.author, "hello").unwrap();
    let target: ActivityTarget = ActivityKey::post(f.author, post.id).into();
    let comments = f.services.comments();

    let root = comments.add(f.viewer, target, "first", None).unwrap();
    let reply = comments.add(f.author, target, "thanks", Some(root.id)).unwrap();
    assert_eq!(reply.depth, 2);

    let err = comments.add(f.viewer, target, "deeper", Some(reply.id)).unwrap_err();
    assert!(matches!(err, CoreError::InvalidDepth { parent_comment_id } if parent_comment_id == reply.id));

    // Only the author may delete; deleting the root takes the reply with it.
    let denied = comments.delete(f.author, root.comment_ref()).unwrap_err();
    assert_eq!(denied.kind(), ErrorKind::NotAuthorized);
    comments.delete(f.viewer, root.comment_ref()).unwrap();
    assert!(comments.list(target, None).unwrap().is_empty());
    let missing = comments
        .delete(
            f.author,
            CommentRef {
                source: reply.source,
                id: reply.id,
            },
        )
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[test]
fn notifications_track_engagement_on_own_activities() {
    let f = setup();
    let post = f.services.posts().create(f.author, "hello").unwrap();
    let target: ActivityTarget = ActivityKey::post(f.author, post.id).into();
    f.services.engagement().like(f.viewer, target).unwrap();
    f.services.comments().add(f.viewer, target, "hi", None).unwrap();
    // Own engagement does not notify.
    f.services.comments().add(f.author, target, "hey", None).unwrap();

    let notifications = f.services.notifications();
    let list = notifications.list(f.author, 50).unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|n| n.actor_id == Some(f.viewer) && n.is_new));
    assert_eq!(notifications.unread_count(f.author).unwrap(), 2);

    notifications.mark_checked(f.author).unwrap();
    assert_eq!(notifications.unread_count(f.author).unwrap(), 0);
    assert_eq!(
        notifications.list(f.author, 0).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[test]
fn rating_unknown_anime_is_catalog_missing() {
    let f = setup();
    let err = f
        .services
        .ratings()
        .rate(f.author, ItemKind::Anime, 999_999, Some(3.0), "RATED")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CatalogMissing);
    assert!(f
        .services
        .ratings()
        .list_for_user(f.author, ItemKind::Anime)
        .unwrap()
        .is_empty());
}

#[test]
fn backfill_on_consistent_store_changes_nothing() {
    let f = setup();
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap();
    f.services.posts().create(f.viewer, "hello").unwrap();
    let conn = f.services.db().conn();
    let before = without_updated_at(list_activities(conn).unwrap());

    let report = f.services.recovery().backfill().unwrap();
    assert_eq!(report.activities_inserted, 0);
    assert_eq!(report.activities_updated, 0);
    assert_eq!(report.activities_deleted, 0);
    assert_eq!(report.promotions_written, 0);
    assert_eq!(without_updated_at(list_activities(conn).unwrap()), before);
}

fn add_levi(services: &FeedServices) {
    services
        .catalog()
        .upsert_character(&CharacterRecord {
            id: LEVI,
            name: "Levi".to_string(),
            name_korean: None,
            name_japanese: None,
            image_url: None,
        })
        .unwrap();
    services
        .catalog()
        .link_character(CharacterLink {
            anime_id: AOT,
            character_id: LEVI,
            role: CharacterRole::Main,
        })
        .unwrap();
}

#[test]
fn activity_score_tracks_author_stats() {
    let f = setup();
    let activity = f
        .services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.0), "RATED")
        .unwrap()
        .unwrap();
    assert_eq!(activity.otaku_score, 2);

    f.services
        .reviews()
        .write(f.author, ItemKind::Anime, AOT, review_input("Great"))
        .unwrap();
    let post = f.services.posts().create(f.author, "hello").unwrap();

    let conn = f.services.db().conn();
    for key in [aot_key(f.author), ActivityKey::post(f.author, post.id)] {
        let stored = get_activity_by_key(conn, &key).unwrap().unwrap();
        assert_eq!(stored.otaku_score, 7, "{key}");
    }

    let report = f.services.recovery().backfill().unwrap();
    assert_eq!(report.activities_updated, 0);
}

#[test]
fn review_with_inline_rating_promotes_once_at_final_score() {
    let f = setup();
    for id in 1..=25 {
        f.services.catalog().upsert_anime(&anime(id, &format!("Show {id}"))).unwrap();
    }
    for id in 1..=24 {
        f.services
            .ratings()
            .rate(f.author, ItemKind::Anime, id, Some(3.0), "RATED")
            .unwrap();
    }
    assert_eq!(score(&f.services, f.author), 48);

    let review = f
        .services
        .reviews()
        .write(
            f.author,
            ItemKind::Anime,
            25,
            ReviewInput {
                rating: Some(4.0),
                ..review_input("Late pick")
            },
        )
        .unwrap();

    assert_eq!(score(&f.services, f.author), 55);
    let conn = f.services.db().conn();
    let promotions = list_promotions(conn, f.author).unwrap();
    assert_eq!(promotions.len(), 1);
    assert_eq!(promotions[0].activity_time, review.created_at);
    let metadata = promotions[0].metadata.unwrap();
    assert_eq!((metadata.old_level, metadata.new_level, metadata.otaku_score), (1, 2, 55));

    let logged = |event_type: &str| -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE actor = ?1 AND event_type = ?2",
            params![f.author, event_type],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(logged("RatingSet"), 24);
    assert_eq!(logged("ReviewWritten"), 1);

    // Replay attributes the promotion the same way.
    f.services.recovery().rebuild_from_log().unwrap();
    let replayed = list_promotions(conn, f.author).unwrap();
    assert_eq!(replayed[0].metadata, Some(metadata));
    assert_eq!(replayed[0].activity_time, review.created_at);
}

#[test]
fn replay_keeps_catalog_values_seen_at_write_time() {
    let f = setup();
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.0), "RATED")
        .unwrap();
    f.services
        .catalog()
        .set_anime_korean_title(AOT, Some("진격의 거인"))
        .unwrap();

    let conn = f.services.db().conn();
    let before = get_activity_by_key(conn, &aot_key(f.author)).unwrap().unwrap();
    assert_eq!(before.item_title_korean, None);

    f.services.recovery().rebuild_from_log().unwrap();
    let after = get_activity_by_key(conn, &aot_key(f.author)).unwrap().unwrap();
    assert_eq!(after.item_title_korean, None);

    // The next write of the rating picks up the edit, and replay keeps it.
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.5), "RATED")
        .unwrap();
    let before = without_updated_at(list_activities(conn).unwrap());
    assert_eq!(before[0].item_title_korean.as_deref(), Some("진격의 거인"));
    f.services.recovery().rebuild_from_log().unwrap();
    assert_eq!(without_updated_at(list_activities(conn).unwrap()), before);
}

#[test]
fn character_rating_review_like_and_cascade() {
    let f = setup();
    add_levi(&f.services);

    let activity = f
        .services
        .ratings()
        .rate(f.author, ItemKind::Character, LEVI, Some(5.0), "RATED")
        .unwrap()
        .unwrap();
    assert_eq!(activity.activity_type, ActivityType::CharacterRating);
    assert_eq!(activity.item_title.as_deref(), Some("Levi"));
    assert_eq!(activity.anime_id, Some(AOT));
    assert_eq!(activity.anime_title.as_deref(), Some("Attack on Titan"));
    assert_eq!(score(&f.services, f.author), 1);

    let review = f
        .services
        .reviews()
        .write(f.author, ItemKind::Character, LEVI, review_input("Captain"))
        .unwrap();
    assert_eq!(score(&f.services, f.author), 6);

    let target: ActivityTarget = ActivityKey::character(f.author, LEVI).into();
    let engagement = f.services.engagement().like(f.viewer, target).unwrap();
    assert_eq!(engagement.likes_count, 1);
    f.services.comments().add(f.viewer, target, "tch", None).unwrap();

    let conn = f.services.db().conn();
    let review_likes = |review_type: &str| -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM review_likes WHERE review_type = ?1 AND review_id = ?2",
            params![review_type, review.id],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(review_likes("character"), 1);
    assert_eq!(review_likes("anime"), 0);
    assert_eq!(count(&f.services, "SELECT COUNT(*) FROM activity_likes WHERE user_id = ?", f.viewer), 0);

    f.services
        .ratings()
        .delete(f.author, ItemKind::Character, LEVI)
        .unwrap();

    assert!(get_activity_by_key(conn, &ActivityKey::character(f.author, LEVI))
        .unwrap()
        .is_none());
    assert_eq!(review_likes("character"), 0);
    assert_eq!(count(&f.services, "SELECT COUNT(*) FROM review_comments WHERE user_id = ?", f.viewer), 0);
    assert_eq!(count(&f.services, "SELECT COUNT(*) FROM character_reviews WHERE user_id = ?", f.author), 0);
    assert_eq!(score(&f.services, f.author), 0);
}

#[test]
fn profile_update_reaches_existing_activities() {
    let f = setup();
    f.services
        .ratings()
        .rate(f.author, ItemKind::Anime, AOT, Some(4.0), "RATED")
        .unwrap();
    f.services.posts().create(f.author, "hello").unwrap();
    f.services.posts().create(f.viewer, "unrelated").unwrap();

    f.services
        .users()
        .update_profile(
            f.author,
            ProfileChange {
                display_name: Some("Mikasa".to_string()),
                avatar_url: Some("https://img/mikasa.png".to_string()),
                ..ProfileChange::default()
            },
        )
        .unwrap();

    let page = f
        .services
        .feed()
        .query(&FeedQuery::for_user(f.author), None)
        .unwrap();
    assert_eq!(page.total, 2);
    for item in &page.items {
        assert_eq!(item.activity.username, "mika");
        assert_eq!(item.activity.display_name.as_deref(), Some("Mikasa"));
        assert_eq!(item.activity.avatar_url.as_deref(), Some("https://img/mikasa.png"));
    }
    let others = f
        .services
        .feed()
        .query(&FeedQuery::for_user(f.viewer), None)
        .unwrap();
    assert_eq!(others.items[0].activity.display_name, None);

    let report = f.services.recovery().backfill().unwrap();
    assert_eq!(report.activities_updated, 0);
}
