//! Books repository

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::AppResult,
    models::book::{Book, BookLoanDetails},
};

/// Shared SELECT for the catalog searches: each matching book joined with
/// its open loans so the desk sees who holds a copy and when it is due.
const SEARCH_SELECT: &str = r#"
    SELECT b.id, b.title, b.author, b.subject, b.description,
           b.total_copies, b.available_copies, b.shelf_location,
           l.subscriber_id AS holder_id, l.due_date
    FROM books b
    LEFT JOIN loans l ON l.book_id = b.id AND l.actual_return_date IS NULL
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    /// List the whole catalog
    pub async fn list_all(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Exact-title search.
    pub async fn search_by_title(&self, title: &str) -> AppResult<Vec<BookLoanDetails>> {
        self.search("WHERE b.title = $1", title.to_string()).await
    }

    /// Exact-subject search.
    pub async fn search_by_subject(&self, subject: &str) -> AppResult<Vec<BookLoanDetails>> {
        self.search("WHERE b.subject = $1", subject.to_string()).await
    }

    /// Substring search on the author column.
    pub async fn search_by_author(&self, author: &str) -> AppResult<Vec<BookLoanDetails>> {
        self.search("WHERE b.author LIKE $1", like_pattern(author)).await
    }

    /// Substring search on the description column.
    pub async fn search_by_description(&self, text: &str) -> AppResult<Vec<BookLoanDetails>> {
        self.search("WHERE b.description LIKE $1", like_pattern(text))
            .await
    }

    async fn search(&self, clause: &str, pattern: String) -> AppResult<Vec<BookLoanDetails>> {
        let sql = format!("{SEARCH_SELECT} {clause} ORDER BY b.title, b.id, l.due_date");
        let rows = sqlx::query_as::<_, BookLoanDetails>(&sql)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Fetch a book row with a row lock, serializing concurrent mutations of
    /// its copy counters for the rest of the transaction.
    pub async fn fetch_for_update(conn: &mut PgConnection, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(book)
    }

    pub async fn set_available(conn: &mut PgConnection, id: i32, available: i32) -> AppResult<()> {
        sqlx::query("UPDATE books SET available_copies = $1 WHERE id = $2")
            .bind(available)
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Release one copy back into circulation.
    pub async fn increment_available(conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE books SET available_copies = available_copies + 1 WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn set_total(conn: &mut PgConnection, id: i32, total: i32) -> AppResult<()> {
        sqlx::query("UPDATE books SET total_copies = $1 WHERE id = $2")
            .bind(total)
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// Match anywhere in the column.
fn like_pattern(needle: &str) -> String {
    format!("%{needle}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_matches_substrings() {
        assert_eq!(like_pattern("Herbert"), "%Herbert%");
        assert_eq!(like_pattern(""), "%%");
    }
}
