//! Schema SQL, applied as an ordered list of additive migrations.

/// A single additive schema step.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// All migrations in application order. Never edit an entry once released;
/// append a new one instead.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial",
        sql: INITIAL_SQL,
    },
    Migration {
        version: 2,
        name: "notification_indexes",
        sql: NOTIFICATION_INDEXES_SQL,
    },
];

pub const MIGRATIONS_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
";

const INITIAL_SQL: &str = r"
-- USERS
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    display_name TEXT,
    avatar_url TEXT,
    preferred_language TEXT NOT NULL DEFAULT 'en'
        CHECK (preferred_language IN ('en', 'ko', 'ja', 'zh')),
    last_notification_check TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_follows (
    follower_id INTEGER NOT NULL REFERENCES users(id),
    following_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL,
    PRIMARY KEY (follower_id, following_id),
    CHECK (follower_id <> following_id)
);

CREATE INDEX IF NOT EXISTS idx_follows_following ON user_follows(following_id);

-- CATALOG
CREATE TABLE IF NOT EXISTS anime (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    title_korean TEXT,
    title_japanese TEXT,
    image_url TEXT,
    episodes INTEGER,
    duration INTEGER,
    start_date TEXT,
    popularity INTEGER
);

CREATE TABLE IF NOT EXISTS anime_genres (
    anime_id INTEGER NOT NULL REFERENCES anime(id),
    genre TEXT NOT NULL,
    PRIMARY KEY (anime_id, genre)
);

CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    name_korean TEXT,
    name_japanese TEXT,
    image_url TEXT
);

CREATE TABLE IF NOT EXISTS anime_character (
    anime_id INTEGER NOT NULL REFERENCES anime(id),
    character_id INTEGER NOT NULL REFERENCES characters(id),
    role TEXT NOT NULL CHECK (role IN ('MAIN', 'SUPPORTING', 'BACKGROUND')),
    PRIMARY KEY (anime_id, character_id)
);

CREATE INDEX IF NOT EXISTS idx_anime_character_character ON anime_character(character_id);

-- SOURCES
CREATE TABLE IF NOT EXISTS user_ratings (
    user_id INTEGER NOT NULL REFERENCES users(id),
    anime_id INTEGER NOT NULL REFERENCES anime(id),
    rating REAL CHECK (rating IS NULL OR (rating >= 0.5 AND rating <= 5.0)),
    status TEXT NOT NULL CHECK (status IN ('RATED', 'WANT_TO_WATCH', 'PASS')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, anime_id),
    CHECK ((status = 'RATED') = (rating IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS character_ratings (
    user_id INTEGER NOT NULL REFERENCES users(id),
    character_id INTEGER NOT NULL REFERENCES characters(id),
    rating REAL CHECK (rating IS NULL OR (rating >= 0.5 AND rating <= 5.0)),
    status TEXT NOT NULL CHECK (status IN ('RATED', 'WANT_TO_KNOW', 'NOT_INTERESTED')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, character_id),
    CHECK ((status = 'RATED') = (rating IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS user_reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    anime_id INTEGER NOT NULL REFERENCES anime(id),
    title TEXT,
    content TEXT NOT NULL,
    is_spoiler INTEGER NOT NULL DEFAULT 0,
    likes_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, anime_id)
);

CREATE TABLE IF NOT EXISTS character_reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    character_id INTEGER NOT NULL REFERENCES characters(id),
    title TEXT,
    content TEXT NOT NULL,
    is_spoiler INTEGER NOT NULL DEFAULT 0,
    likes_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, character_id)
);

CREATE TABLE IF NOT EXISTS user_posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_user ON user_posts(user_id);

-- PROJECTION
CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    activity_type TEXT NOT NULL
        CHECK (activity_type IN ('anime_rating', 'character_rating', 'user_post', 'rank_promotion')),
    user_id INTEGER NOT NULL REFERENCES users(id),
    item_id INTEGER,
    username TEXT NOT NULL,
    display_name TEXT,
    avatar_url TEXT,
    otaku_score INTEGER NOT NULL DEFAULT 0,
    item_title TEXT,
    item_title_korean TEXT,
    item_image TEXT,
    rating REAL,
    review_title TEXT,
    review_content TEXT,
    is_spoiler INTEGER,
    anime_id INTEGER,
    anime_title TEXT,
    promotion_threshold INTEGER,
    metadata TEXT,
    activity_time TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (activity_type, user_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_activities_feed ON activities(activity_time DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_activities_user ON activities(user_id, activity_time DESC);
CREATE INDEX IF NOT EXISTS idx_activities_item ON activities(activity_type, item_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_activities_promotion
    ON activities(user_id, promotion_threshold)
    WHERE activity_type = 'rank_promotion';

-- ENGAGEMENT (activity-bound; legacy rows may carry only the key)
CREATE TABLE IF NOT EXISTS activity_likes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    activity_id INTEGER,
    activity_type TEXT NOT NULL,
    activity_user_id INTEGER NOT NULL,
    item_id INTEGER,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, activity_type, activity_user_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_activity_likes_key
    ON activity_likes(activity_type, activity_user_id, item_id);
CREATE INDEX IF NOT EXISTS idx_activity_likes_activity ON activity_likes(activity_id);

CREATE TABLE IF NOT EXISTS activity_comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    activity_id INTEGER,
    activity_type TEXT NOT NULL,
    activity_user_id INTEGER NOT NULL,
    item_id INTEGER,
    parent_comment_id INTEGER REFERENCES activity_comments(id) ON DELETE CASCADE,
    depth INTEGER NOT NULL CHECK (depth IN (1, 2)),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_comments_key
    ON activity_comments(activity_type, activity_user_id, item_id);
CREATE INDEX IF NOT EXISTS idx_activity_comments_parent ON activity_comments(parent_comment_id);

-- ENGAGEMENT (review-bound)
CREATE TABLE IF NOT EXISTS review_likes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    review_type TEXT NOT NULL CHECK (review_type IN ('anime', 'character')),
    review_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL,
    UNIQUE (review_type, review_id, user_id)
);

CREATE TABLE IF NOT EXISTS review_comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    review_type TEXT NOT NULL CHECK (review_type IN ('anime', 'character')),
    review_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    parent_comment_id INTEGER REFERENCES review_comments(id) ON DELETE CASCADE,
    depth INTEGER NOT NULL CHECK (depth IN (1, 2)),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_review_comments_review ON review_comments(review_type, review_id);
CREATE INDEX IF NOT EXISTS idx_review_comments_parent ON review_comments(parent_comment_id);

-- STATS
CREATE TABLE IF NOT EXISTS user_stats (
    user_id INTEGER PRIMARY KEY REFERENCES users(id),
    total_rated INTEGER NOT NULL DEFAULT 0,
    total_character_ratings INTEGER NOT NULL DEFAULT 0,
    total_reviews INTEGER NOT NULL DEFAULT 0,
    total_watch_time_minutes INTEGER NOT NULL DEFAULT 0,
    otaku_score INTEGER NOT NULL DEFAULT 0,
    favorite_genre TEXT,
    updated_at TEXT NOT NULL
);

-- EVENT LOG
CREATE TABLE IF NOT EXISTS event_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    actor INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_event_log_actor ON event_log(actor, seq);
";

const NOTIFICATION_INDEXES_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_activity_likes_created ON activity_likes(created_at);
CREATE INDEX IF NOT EXISTS idx_review_likes_review ON review_likes(review_type, review_id);
CREATE INDEX IF NOT EXISTS idx_activity_comments_activity ON activity_comments(activity_id);
";
