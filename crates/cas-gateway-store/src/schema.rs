// SPDX-License-Identifier: Apache-2.0
//! Idempotent schema upgrade: plain `CREATE TABLE IF NOT EXISTS` statements
//! run at startup, safe to re-run against an already-initialized database
//! file.

pub(crate) const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS buckets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    owner_id TEXT NOT NULL,
    public INTEGER NOT NULL DEFAULT 0,
    quota_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS objects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bucket_id INTEGER NOT NULL REFERENCES buckets(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    content_type TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(bucket_id, key)
);

CREATE INDEX IF NOT EXISTS idx_buckets_owner_id ON buckets(owner_id);
CREATE INDEX IF NOT EXISTS idx_buckets_name ON buckets(name);
CREATE INDEX IF NOT EXISTS idx_objects_bucket_id ON objects(bucket_id);
CREATE INDEX IF NOT EXISTS idx_objects_hash ON objects(hash);
CREATE INDEX IF NOT EXISTS idx_objects_bucket_key ON objects(bucket_id, key);
";
