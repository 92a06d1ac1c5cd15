//! Idempotent schema bootstrap, applied in order by [`super::pool::migrate`].

pub(crate) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stored_files (
        content_hash TEXT PRIMARY KEY NOT NULL,
        display_name TEXT NOT NULL,
        relative_path TEXT NOT NULL,
        remote_bucket TEXT,
        remote_key TEXT,
        created_by TEXT,
        created_at TEXT NOT NULL,
        CHECK ((remote_bucket IS NULL) = (remote_key IS NULL))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS datasets (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        owner TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dataset_videos (
        id BLOB PRIMARY KEY NOT NULL,
        dataset_id BLOB NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        video_hash TEXT NOT NULL REFERENCES stored_files(content_hash),
        audio_hash TEXT REFERENCES stored_files(content_hash),
        subtitles_hash TEXT REFERENCES stored_files(content_hash),
        cut_intervals TEXT NOT NULL DEFAULT '[]',
        is_segmented INTEGER NOT NULL DEFAULT 0,
        messages TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        UNIQUE (dataset_id, video_hash)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS segments (
        id BLOB PRIMARY KEY NOT NULL,
        dataset_video_id BLOB NOT NULL REFERENCES dataset_videos(id) ON DELETE CASCADE,
        video_hash TEXT NOT NULL REFERENCES stored_files(content_hash),
        subtitles_hash TEXT REFERENCES stored_files(content_hash),
        start_secs REAL NOT NULL,
        end_secs REAL,
        position INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_segments_dataset_video ON segments(dataset_video_id, position)",
    "CREATE INDEX IF NOT EXISTS idx_segments_video_hash ON segments(video_hash)",
    "CREATE INDEX IF NOT EXISTS idx_segments_subtitles_hash ON segments(subtitles_hash)",
    "CREATE INDEX IF NOT EXISTS idx_dataset_videos_video_hash ON dataset_videos(video_hash)",
    "CREATE INDEX IF NOT EXISTS idx_dataset_videos_audio_hash ON dataset_videos(audio_hash)",
    "CREATE INDEX IF NOT EXISTS idx_dataset_videos_subtitles_hash ON dataset_videos(subtitles_hash)",
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id BLOB PRIMARY KEY NOT NULL,
        dataset_id BLOB NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        hit_settings TEXT NOT NULL,
        worker_identity TEXT NOT NULL DEFAULT 'anonymous',
        is_busy INTEGER NOT NULL DEFAULT 0,
        is_started INTEGER NOT NULL DEFAULT 0,
        batch_id TEXT,
        messages TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS submission_tasks (
        id BLOB PRIMARY KEY NOT NULL,
        project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        segment_id BLOB NOT NULL REFERENCES segments(id) ON DELETE CASCADE,
        remote_job_id TEXT,
        collected_at TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (project_id, segment_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_workers (
        project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        remote_worker_id TEXT NOT NULL,
        number INTEGER NOT NULL,
        PRIMARY KEY (project_id, remote_worker_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assignments (
        id BLOB PRIMARY KEY NOT NULL,
        task_id BLOB NOT NULL REFERENCES submission_tasks(id) ON DELETE CASCADE,
        remote_assignment_id TEXT NOT NULL,
        worker_label TEXT,
        is_approved INTEGER,
        result TEXT NOT NULL DEFAULT 'null',
        created_at TEXT NOT NULL,
        UNIQUE (task_id, remote_assignment_id)
    )
    "#,
];
