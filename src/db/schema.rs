//! Database schema and migrations for the matter store.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded. There are no foreign keys between matters and the tables
//! that reference them; those links are maintained by the repositories.

/// Database migrations.
///
/// Each migration is a SQL script executed in order. The schema_version
/// table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Matter tree
    r#"
CREATE TABLE matters (
    uuid         TEXT PRIMARY KEY,
    puuid        TEXT NOT NULL,                 -- parent uuid or 'root'
    user_uuid    TEXT NOT NULL,
    space_uuid   TEXT NOT NULL,
    name         TEXT NOT NULL,
    dir          INTEGER NOT NULL DEFAULT 0,
    size         INTEGER NOT NULL DEFAULT 0 CHECK (size >= 0),
    path         TEXT NOT NULL,                 -- '/a/b/c.txt'
    sort         INTEGER NOT NULL,              -- monotonic creation order
    times        INTEGER NOT NULL DEFAULT 0,
    visit_time   TEXT,
    deleted      INTEGER NOT NULL DEFAULT 0,
    delete_time  TEXT,
    create_time  TEXT NOT NULL,
    update_time  TEXT NOT NULL
);

CREATE INDEX idx_matters_puuid ON matters(puuid);
CREATE INDEX idx_matters_user_path ON matters(user_uuid, path);
CREATE INDEX idx_matters_space ON matters(space_uuid);
CREATE INDEX idx_matters_deleted ON matters(deleted, delete_time);
"#,
    // v2: Labels and label assignments
    r#"
CREATE TABLE labels (
    uuid         TEXT PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    label_type   TEXT NOT NULL,
    create_time  TEXT NOT NULL
);

CREATE TABLE labeled (
    uuid         TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    target       TEXT NOT NULL,                 -- matter uuid
    value        INTEGER NOT NULL DEFAULT 0,
    create_time  TEXT NOT NULL
);

CREATE INDEX idx_labeled_target ON labeled(target);
CREATE INDEX idx_labeled_name ON labeled(name);
"#,
    // v3: Shares and bridges
    r#"
CREATE TABLE shares (
    uuid             TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    share_type       TEXT NOT NULL,             -- 'file', 'directory', 'mixed'
    user_uuid        TEXT NOT NULL,
    space_uuid       TEXT NOT NULL,
    code             TEXT NOT NULL,
    expire_infinity  INTEGER NOT NULL DEFAULT 1,
    expire_time      TEXT,
    download_times   INTEGER NOT NULL DEFAULT 0,
    create_time      TEXT NOT NULL,
    update_time      TEXT NOT NULL
);

CREATE INDEX idx_shares_user ON shares(user_uuid);

CREATE TABLE bridges (
    uuid         TEXT PRIMARY KEY,
    share_uuid   TEXT NOT NULL,
    matter_uuid  TEXT NOT NULL,
    create_time  TEXT NOT NULL,
    UNIQUE(share_uuid, matter_uuid)
);

CREATE INDEX idx_bridges_matter ON bridges(matter_uuid);
"#,
    // v4: Collaborator tables (image cache, submissions, profiles)
    r#"
CREATE TABLE image_caches (
    uuid         TEXT PRIMARY KEY,
    matter_uuid  TEXT NOT NULL,
    mode         TEXT NOT NULL,
    path         TEXT NOT NULL,
    size         INTEGER NOT NULL DEFAULT 0,
    create_time  TEXT NOT NULL
);

CREATE INDEX idx_image_caches_matter ON image_caches(matter_uuid);

CREATE TABLE user_profiles (
    user_uuid    TEXT PRIMARY KEY,
    member_code  TEXT NOT NULL UNIQUE,
    unit         TEXT NOT NULL
);

CREATE TABLE submissions (
    uuid         TEXT PRIMARY KEY,
    matter_uuid  TEXT NOT NULL,
    author_code  TEXT NOT NULL,                 -- user_profiles.member_code
    recommended  INTEGER NOT NULL DEFAULT 0,
    create_time  TEXT NOT NULL
);

CREATE INDEX idx_submissions_author ON submissions(author_code);
"#,
];
