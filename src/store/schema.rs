//! SQL schema.

/// Schema v1.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Catalog (synchronised from configuration, read-only to the engine
-- except for current_participants)
-- ============================================================

CREATE TABLE IF NOT EXISTS challenges (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    challenge_type TEXT NOT NULL,
    verification_method TEXT NOT NULL,
    recruitment_start TEXT NOT NULL,
    recruitment_end TEXT NOT NULL,
    operation_start TEXT NOT NULL,
    operation_end TEXT NOT NULL,
    challenge_duration_days INTEGER NOT NULL CHECK (challenge_duration_days > 0),
    daily_verification_count INTEGER NOT NULL CHECK (daily_verification_count > 0),
    time_slots TEXT NOT NULL DEFAULT '[]',
    max_participants INTEGER,
    current_participants INTEGER NOT NULL DEFAULT 0 CHECK (current_participants >= 0),
    total_stamp_count INTEGER NOT NULL DEFAULT 0,
    reward TEXT
);

CREATE TABLE IF NOT EXISTS quizzes (
    id INTEGER PRIMARY KEY,
    challenge_id INTEGER NOT NULL REFERENCES challenges(id),
    quiz_type TEXT NOT NULL,
    question TEXT NOT NULL,
    options TEXT NOT NULL DEFAULT '[]',
    correct_answers TEXT NOT NULL,
    hint TEXT
);

CREATE TABLE IF NOT EXISTS roulette_settings (
    challenge_id INTEGER PRIMARY KEY REFERENCES challenges(id),
    segments TEXT NOT NULL
);

-- ============================================================
-- Users (display names supplied by the identity provider)
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- ============================================================
-- Participation state
-- ============================================================

CREATE TABLE IF NOT EXISTS participations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    challenge_id INTEGER NOT NULL REFERENCES challenges(id),
    user_id TEXT NOT NULL,
    status TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    total_required_count INTEGER NOT NULL,
    total_verification_count INTEGER NOT NULL DEFAULT 0,
    today_verification_count INTEGER NOT NULL DEFAULT 0,
    achievement_rate REAL NOT NULL DEFAULT 0 CHECK (achievement_rate >= 0 AND achievement_rate <= 100),
    last_verification_date TEXT,
    is_reward_claimed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (challenge_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_participations_user_status
    ON participations(user_id, status);

CREATE TABLE IF NOT EXISTS verifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    participation_id INTEGER NOT NULL REFERENCES participations(id) ON DELETE CASCADE,
    verification_date TEXT NOT NULL,
    verification_time TEXT NOT NULL,
    verification_slot INTEGER NOT NULL CHECK (verification_slot >= 1),
    verification_data TEXT NOT NULL,
    is_verified INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    UNIQUE (participation_id, verification_date, verification_slot)
);

CREATE TABLE IF NOT EXISTS stamps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    participation_id INTEGER NOT NULL REFERENCES participations(id) ON DELETE CASCADE,
    stamp_number INTEGER NOT NULL CHECK (stamp_number >= 1),
    is_achieved INTEGER NOT NULL DEFAULT 0,
    achieved_date TEXT,
    UNIQUE (participation_id, stamp_number)
);

CREATE TABLE IF NOT EXISTS quiz_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL REFERENCES quizzes(id),
    participation_id INTEGER NOT NULL REFERENCES participations(id) ON DELETE CASCADE,
    attempt_date TEXT NOT NULL,
    selected_answer TEXT NOT NULL,
    is_correct INTEGER NOT NULL,
    attempt_count INTEGER NOT NULL CHECK (attempt_count >= 1),
    created_at TEXT NOT NULL,
    UNIQUE (quiz_id, participation_id, attempt_date, attempt_count)
);

CREATE TABLE IF NOT EXISTS roulette_spins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    challenge_id INTEGER NOT NULL REFERENCES challenges(id),
    user_id TEXT NOT NULL,
    participation_id INTEGER NOT NULL REFERENCES participations(id),
    spin_date TEXT NOT NULL,
    won_index INTEGER NOT NULL,
    won_segment TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (challenge_id, user_id, spin_date)
);

-- ============================================================
-- Leaderboard projection
-- ============================================================

CREATE TABLE IF NOT EXISTS rankings (
    challenge_id INTEGER NOT NULL REFERENCES challenges(id),
    user_id TEXT NOT NULL,
    achievement_rate REAL NOT NULL DEFAULT 0,
    completed_at TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (challenge_id, user_id)
);

-- ============================================================
-- Local point ledger (also the outbox for a remote ledger)
-- ============================================================

CREATE TABLE IF NOT EXISTS point_balances (
    user_id TEXT PRIMARY KEY,
    balance INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS point_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    amount INTEGER NOT NULL,
    reason TEXT NOT NULL,
    idempotency_key TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_point_history_user
    ON point_history(user_id, created_at);
"#;
