//! Table definitions. Creation is idempotent and runs on every open.

pub(super) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS locks (
    key            TEXT PRIMARY KEY,
    session        TEXT NOT NULL,
    kind           TEXT NOT NULL,
    target         TEXT NOT NULL,
    lock_file_path TEXT NOT NULL,
    created_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_locks_session ON locks(session);

CREATE TABLE IF NOT EXISTS queue (
    ticket     INTEGER PRIMARY KEY AUTOINCREMENT,
    key        TEXT NOT NULL,
    session    TEXT NOT NULL,
    kind       TEXT NOT NULL,
    target     TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_queue_key_ticket ON queue(key, ticket);
CREATE INDEX IF NOT EXISTS idx_queue_session ON queue(session);
";
