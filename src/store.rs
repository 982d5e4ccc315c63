use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceResult;

/// A lecture: one uploaded PDF plus its derived metadata
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lecture {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub pdf_url: String,
    pub total_pages: i32,
    pub created_at: DateTime<Utc>,
}

/// One page of a lecture with its extracted text and, once generated, the
/// spoken-lecture audio reference
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Page {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub page_number: i32,
    pub content: String,
    pub audio_url: Option<String>,
}

/// Fields required to create a lecture row. The id is chosen by the caller
/// because stored artifacts are named after it before the row exists.
pub struct NewLecture {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub pdf_url: String,
    pub total_pages: i32,
}

/// Relational persistence for lectures and pages
#[derive(Clone)]
pub struct LectureStore {
    pool: PgPool,
}

impl LectureStore {
    /// Connect to Postgres with a small pool
    pub async fn connect(database_url: &str) -> ServiceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;

        Ok(LectureStore { pool })
    }

    /// Create the schema when absent. Pages cascade on lecture deletion and
    /// are unique per (lecture, page number).
    pub async fn init_schema(&self) -> ServiceResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lectures (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                pdf_url TEXT NOT NULL,
                total_pages INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id UUID PRIMARY KEY,
                lecture_id UUID NOT NULL REFERENCES lectures(id) ON DELETE CASCADE,
                page_number INTEGER NOT NULL,
                content TEXT NOT NULL,
                audio_url TEXT,
                UNIQUE (lecture_id, page_number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_lecture(&self, new: NewLecture) -> ServiceResult<Lecture> {
        let lecture = sqlx::query_as::<_, Lecture>(
            r#"
            INSERT INTO lectures (id, title, description, pdf_url, total_pages)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, description, pdf_url, total_pages, created_at
            "#,
        )
        .bind(new.id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.pdf_url)
        .bind(new.total_pages)
        .fetch_one(&self.pool)
        .await?;

        Ok(lecture)
    }

    pub async fn insert_page(
        &self,
        lecture_id: Uuid,
        page_number: i32,
        content: &str,
    ) -> ServiceResult<Page> {
        let page = sqlx::query_as::<_, Page>(
            r#"
            INSERT INTO pages (id, lecture_id, page_number, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, lecture_id, page_number, content, audio_url
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lecture_id)
        .bind(page_number)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(page)
    }

    pub async fn list_lectures(&self) -> ServiceResult<Vec<Lecture>> {
        let lectures = sqlx::query_as::<_, Lecture>(
            "SELECT id, title, description, pdf_url, total_pages, created_at \
             FROM lectures ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(lectures)
    }

    pub async fn get_lecture(&self, id: Uuid) -> ServiceResult<Option<Lecture>> {
        let lecture = sqlx::query_as::<_, Lecture>(
            "SELECT id, title, description, pdf_url, total_pages, created_at \
             FROM lectures WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lecture)
    }

    pub async fn lecture_pages(&self, lecture_id: Uuid) -> ServiceResult<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>(
            "SELECT id, lecture_id, page_number, content, audio_url \
             FROM pages WHERE lecture_id = $1 ORDER BY page_number",
        )
        .bind(lecture_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pages)
    }

    pub async fn get_page(
        &self,
        lecture_id: Uuid,
        page_number: i32,
    ) -> ServiceResult<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(
            "SELECT id, lecture_id, page_number, content, audio_url \
             FROM pages WHERE lecture_id = $1 AND page_number = $2",
        )
        .bind(lecture_id)
        .bind(page_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(page)
    }

    /// Record a page's audio reference once generation has succeeded
    pub async fn set_page_audio(&self, page_id: Uuid, audio_url: &str) -> ServiceResult<()> {
        sqlx::query("UPDATE pages SET audio_url = $1 WHERE id = $2")
            .bind(audio_url)
            .bind(page_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete a lecture; its pages go with it via the FK cascade.
    /// Returns false when no such lecture existed.
    pub async fn delete_lecture(&self, id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM lectures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
