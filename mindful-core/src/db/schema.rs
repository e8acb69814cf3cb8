pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('admin', 'researcher', 'participant')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS researcher_profiles (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participant_profiles (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS programs (
    id TEXT PRIMARY KEY,
    researcher_id TEXT NOT NULL REFERENCES researcher_profiles(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    context_type TEXT NOT NULL,
    methodology TEXT NOT NULL,
    target_population TEXT NOT NULL,
    duration_weeks INTEGER NOT NULL CHECK (duration_weeks > 0),
    state TEXT NOT NULL DEFAULT 'draft' CHECK (state IN ('draft', 'published')),
    pre_questionnaire_id TEXT REFERENCES questionnaires(id) ON DELETE SET NULL,
    post_questionnaire_id TEXT REFERENCES questionnaires(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    published_at TEXT
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    week_number INTEGER NOT NULL CHECK (week_number > 0),
    estimated_minutes INTEGER NOT NULL,
    practice_type TEXT NOT NULL,
    content_type TEXT NOT NULL CHECK (content_type IN ('timer', 'link', 'audio', 'video')),
    content_payload TEXT NOT NULL,
    background_media TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (program_id, week_number)
);

CREATE TABLE IF NOT EXISTS questionnaires (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
    moment TEXT NOT NULL CHECK (moment IN ('pre', 'post')),
    kind TEXT NOT NULL CHECK (kind IN ('custom', 'likert', 'predefined')),
    title TEXT NOT NULL,
    description TEXT,
    form JSON NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (program_id, moment)
);

CREATE TABLE IF NOT EXISTS enrollments (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
    participant_id TEXT NOT NULL REFERENCES participant_profiles(id) ON DELETE CASCADE,
    state TEXT NOT NULL DEFAULT 'in_progress' CHECK (state IN ('in_progress', 'completed', 'abandoned')),
    start_time TEXT NOT NULL,
    end_time TEXT,
    completed_at TEXT,
    UNIQUE (program_id, participant_id)
);

CREATE TABLE IF NOT EXISTS diary_entries (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    participant_id TEXT NOT NULL REFERENCES participant_profiles(id) ON DELETE CASCADE,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (participant_id, session_id)
);

CREATE TABLE IF NOT EXISTS questionnaire_responses (
    id TEXT PRIMARY KEY,
    questionnaire_id TEXT NOT NULL REFERENCES questionnaires(id) ON DELETE CASCADE,
    participant_id TEXT NOT NULL REFERENCES participant_profiles(id) ON DELETE CASCADE,
    answers JSON NOT NULL,
    submitted_at TEXT NOT NULL,
    UNIQUE (questionnaire_id, participant_id)
);

CREATE INDEX IF NOT EXISTS idx_programs_researcher ON programs(researcher_id);
CREATE INDEX IF NOT EXISTS idx_sessions_program ON sessions(program_id);
CREATE INDEX IF NOT EXISTS idx_questionnaires_program ON questionnaires(program_id);
CREATE INDEX IF NOT EXISTS idx_enrollments_participant ON enrollments(participant_id);
CREATE INDEX IF NOT EXISTS idx_diary_session ON diary_entries(session_id);
CREATE INDEX IF NOT EXISTS idx_responses_questionnaire ON questionnaire_responses(questionnaire_id);

-- Only one in-progress enrollment per participant at a time
CREATE UNIQUE INDEX IF NOT EXISTS idx_one_in_progress_enrollment
    ON enrollments(participant_id) WHERE state = 'in_progress';
"#;
