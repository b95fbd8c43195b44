//! v001 -- Initial schema creation.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT NOT NULL,
    avatar_url TEXT NOT NULL DEFAULT '',
    bio        TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL                 -- RFC-3339
);

-- ----------------------------------------------------------------
-- Friend groups (a user's private folders for friends)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_groups (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_friend_groups_user ON friend_groups(user_id);

-- ----------------------------------------------------------------
-- Friendships (directed edges, status-tagged)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    friend_id  INTEGER NOT NULL,
    status     TEXT NOT NULL DEFAULT 'pending',   -- pending | accepted | rejected
    group_id   INTEGER,                           -- FK -> friend_groups(id), owned by user_id
    remark     TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (user_id)   REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (friend_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (group_id)  REFERENCES friend_groups(id) ON DELETE SET NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_friendships_edge ON friendships(user_id, friend_id);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id   INTEGER NOT NULL,
    receiver_id INTEGER NOT NULL,
    kind        TEXT NOT NULL DEFAULT 'friend_request',
    status      TEXT NOT NULL DEFAULT 'pending',
    is_read     INTEGER NOT NULL DEFAULT 0,       -- boolean 0/1
    content     TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (sender_id)   REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (receiver_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notifications_receiver ON notifications(receiver_id);
CREATE INDEX IF NOT EXISTS idx_notifications_sender ON notifications(sender_id);

-- ----------------------------------------------------------------
-- Chat groups and their members
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_groups (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    owner_id   INTEGER NOT NULL,
    avatar_url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id  INTEGER NOT NULL,
    user_id   INTEGER NOT NULL,
    role      TEXT NOT NULL DEFAULT 'member',     -- owner | admin | member
    nickname  TEXT NOT NULL DEFAULT '',
    joined_at TEXT NOT NULL,

    PRIMARY KEY (group_id, user_id),
    FOREIGN KEY (group_id) REFERENCES chat_groups(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)  REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id);

-- ----------------------------------------------------------------
-- Messages (append-only; receiver is a user XOR a group)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id         INTEGER NOT NULL,
    receiver_user_id  INTEGER,
    receiver_group_id INTEGER,
    content           TEXT NOT NULL,
    client_id         TEXT,                      -- client correlation id, JSON-encoded
    created_at        TEXT NOT NULL,

    CHECK ((receiver_user_id IS NULL) <> (receiver_group_id IS NULL)),
    FOREIGN KEY (sender_id)         REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (receiver_user_id)  REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (receiver_group_id) REFERENCES chat_groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_private
    ON messages(sender_id, receiver_user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_group
    ON messages(receiver_group_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
