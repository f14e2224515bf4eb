//! Database Schema
//!
//! SQLite 테이블 스키마 정의

/// 데이터베이스 스키마 생성 SQL
pub const CREATE_SCHEMA: &str = r#"
-- 사용자 시크릿 테이블
CREATE TABLE IF NOT EXISTS user_secrets (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    secret_type TEXT NOT NULL,
    encrypted_value TEXT NOT NULL,  -- base64 암호문 (레거시 레코드는 평문)
    nonce TEXT,                     -- base64, 레거시 레코드는 NULL
    format_version INTEGER NOT NULL DEFAULT 0 CHECK (format_version IN (0, 1)),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (user_id, secret_type)
);

-- 사용자별 조회 인덱스
CREATE INDEX IF NOT EXISTS idx_user_secrets_user ON user_secrets(user_id);
"#;
