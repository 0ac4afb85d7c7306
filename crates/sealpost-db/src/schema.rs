//! SQL schema definitions.

/// Complete schema for the Sealpost v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Identity
-- ============================================================

CREATE TABLE IF NOT EXISTS person (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    date_added INTEGER NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    date_verified INTEGER,
    enabled INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS public_key (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES person(id),
    key TEXT NOT NULL,
    nickname TEXT,
    source TEXT,
    date_added INTEGER NOT NULL,
    UNIQUE (person_id, key)
);

CREATE INDEX IF NOT EXISTS idx_public_key_person ON public_key(person_id);

-- ============================================================
-- Sessions
-- ============================================================

CREATE TABLE IF NOT EXISTS session (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES person(id),
    session_code TEXT NOT NULL UNIQUE,
    date_created INTEGER NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    date_verified INTEGER,
    date_expires INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_person ON session(person_id);
CREATE INDEX IF NOT EXISTS idx_session_expires ON session(date_expires);

-- ============================================================
-- Messages
-- ============================================================

CREATE TABLE IF NOT EXISTS message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES person(id),
    message TEXT NOT NULL,
    date_posted INTEGER NOT NULL,
    date_expires INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_message_author ON message(person_id);
CREATE INDEX IF NOT EXISTS idx_message_posted ON message(date_posted DESC, id);
CREATE INDEX IF NOT EXISTS idx_message_expires ON message(date_expires);

-- No cascade: recipient rows must be removed before their message.
CREATE TABLE IF NOT EXISTS message_recipient (
    message_id INTEGER NOT NULL REFERENCES message(id),
    person_id INTEGER NOT NULL REFERENCES person(id),
    PRIMARY KEY (message_id, person_id)
);

CREATE INDEX IF NOT EXISTS idx_recipient_person ON message_recipient(person_id);
"#;

/// v2: every code ever handed out, kept after its session is swept so the
/// same code is never issued twice.
pub const SCHEMA_V2: &str = r#"
CREATE TABLE IF NOT EXISTS issued_code (
    code TEXT PRIMARY KEY,
    person_id INTEGER NOT NULL,
    date_issued INTEGER NOT NULL
);

INSERT OR IGNORE INTO issued_code (code, person_id, date_issued)
    SELECT session_code, person_id, date_created FROM session;
"#;
