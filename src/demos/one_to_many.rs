//! One-to-many: a user has many books, each book belongs to at most one
//! user through a nullable foreign key.

use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::{Condition, Filter};
use crate::relation::RelationDef;
use crate::schema::{ColumnDefinition, DataType, Schema, TableDefinition};
use crate::store::{self, Database};
use crate::value::Params;

use super::AssociationDemo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub user_id: Option<i64>,
}

pub fn book_relation() -> RelationDef {
    RelationDef::has_many("users", "books", "user_id")
}

pub fn schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new("users")
                .column(ColumnDefinition::id())
                .column(ColumnDefinition::new("name", DataType::Text).not_null()),
        )
        .add_table(
            TableDefinition::new("books")
                .column(ColumnDefinition::id())
                .column(ColumnDefinition::new("title", DataType::Text).not_null())
                .column(ColumnDefinition::new("price", DataType::Real).not_null()),
        )
        .relation(&book_relation())
}

pub fn create_user(conn: &Connection, name: &str) -> Result<User> {
    let id = store::insert_row(conn, "users", &Params::new().with_value("name", name))?;
    Ok(User {
        id,
        name: name.to_string(),
    })
}

/// Insert a book already associated with its owner.
pub fn create_book_for_user(
    conn: &Connection,
    user_id: i64,
    title: &str,
    price: f64,
) -> Result<Book> {
    let id = store::insert_row(
        conn,
        "books",
        &Params::new()
            .with_value("title", title)
            .with_value("price", price)
            .with_value("user_id", user_id),
    )?;
    Ok(Book {
        id,
        title: title.to_string(),
        price,
        user_id: Some(user_id),
    })
}

/// Insert a user together with their books in one call.
pub fn create_user_with_books(
    conn: &Connection,
    name: &str,
    books: &[(&str, f64)],
) -> Result<User> {
    let user = create_user(conn, name)?;
    for (title, price) in books {
        create_book_for_user(conn, user.id, title, *price)?;
    }
    Ok(user)
}

pub fn find_user_by_name(conn: &Connection, name: &str) -> Result<Option<User>> {
    let (where_sql, params) = Filter::new()
        .with_condition("name", Condition::eq(name))
        .to_sql();
    let sql = format!("SELECT id, name FROM users{where_sql}");
    store::query_one_named(conn, &sql, &params, |row| {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
}

pub fn find_book_by_title(conn: &Connection, title: &str) -> Result<Option<Book>> {
    let (where_sql, params) = Filter::new()
        .with_condition("title", Condition::eq(title))
        .to_sql();
    let sql = format!("SELECT id, title, price, user_id FROM books{where_sql}");
    store::query_one_named(conn, &sql, &params, map_book)
}

/// Lazily load the books of one user.
pub fn books_of_user(conn: &Connection, user_id: i64) -> Result<Vec<Book>> {
    let sql = book_relation().related_sql(&["id", "title", "price", "user_id"]);
    store::query_map_named(
        conn,
        &sql,
        &Params::new().with_value("id", user_id),
        map_book,
    )
}

/// Lazily load the owning user of one book.
pub fn user_of_book(conn: &Connection, book_id: i64) -> Result<Option<User>> {
    let sql = book_relation().rev().related_sql(&["id", "name"]);
    store::query_one_named(
        conn,
        &sql,
        &Params::new().with_value("id", book_id),
        |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
}

fn map_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        price: row.get(2)?,
        user_id: row.get(3)?,
    })
}

pub struct OneToMany;

#[async_trait]
impl AssociationDemo for OneToMany {
    fn name(&self) -> &'static str {
        "one-to-many"
    }

    async fn run(&self, db: &Database) -> Result<()> {
        db.sync(&schema(), true).await?;

        db.with_transaction(|conn| {
            create_user_with_books(conn, "ali", &[("Math", 200.0), ("Physics", 250.0)])
        })
        .await?;

        db.with_conn(|conn| {
            let user = find_user_by_name(conn, "ali")?
                .ok_or_else(|| Error::NotFound("users".to_string()))?;

            let books = books_of_user(conn, user.id)?;
            for book in &books {
                tracing::info!("user {} => book {} ({})", user.name, book.title, book.price);
            }

            // Add a book, then dissociate it again; the row survives with a
            // null foreign key.
            let chemistry = create_book_for_user(conn, user.id, "Chemistry", 150.0)?;
            let books = books_of_user(conn, user.id)?;
            tracing::info!("user {} now has {} books", user.name, books.len());

            book_relation().unlink(conn, user.id, chemistry.id)?;
            let books = books_of_user(conn, user.id)?;
            tracing::info!("user {} is back to {} books", user.name, books.len());

            let math = find_book_by_title(conn, "Math")?
                .ok_or_else(|| Error::NotFound("books".to_string()))?;
            let owner = user_of_book(conn, math.id)?
                .ok_or_else(|| Error::NotFound("users".to_string()))?;
            tracing::info!("book {} => user {}", math.title, owner.name);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        store::sync_schema(&conn, &schema(), true).unwrap();
        conn
    }

    #[test]
    fn nested_create_attaches_books() {
        let conn = demo_conn();
        let ali =
            create_user_with_books(&conn, "ali", &[("Math", 200.0), ("Physics", 250.0)]).unwrap();

        let books = books_of_user(&conn, ali.id).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "Math");
        assert_eq!(books[0].price, 200.0);
        assert_eq!(books[1].title, "Physics");
    }

    #[test]
    fn add_then_unlink_restores_count() {
        let conn = demo_conn();
        let ali =
            create_user_with_books(&conn, "ali", &[("Math", 200.0), ("Physics", 250.0)]).unwrap();

        let chemistry = create_book_for_user(&conn, ali.id, "Chemistry", 150.0).unwrap();
        assert_eq!(books_of_user(&conn, ali.id).unwrap().len(), 3);

        book_relation().unlink(&conn, ali.id, chemistry.id).unwrap();
        assert_eq!(books_of_user(&conn, ali.id).unwrap().len(), 2);

        // The dissociated book survives as an orphan.
        let orphan = find_book_by_title(&conn, "Chemistry").unwrap().unwrap();
        assert_eq!(orphan.user_id, None);
    }

    #[test]
    fn book_resolves_its_owner() {
        let conn = demo_conn();
        let ali = create_user_with_books(&conn, "ali", &[("Math", 200.0)]).unwrap();
        let math = find_book_by_title(&conn, "Math").unwrap().unwrap();

        let owner = user_of_book(&conn, math.id).unwrap().unwrap();
        assert_eq!(owner, ali);
    }

    #[test]
    fn orphan_book_has_no_owner() {
        let conn = demo_conn();
        let id = store::insert_row(
            &conn,
            "books",
            &Params::new()
                .with_value("title", "Drafts")
                .with_value("price", 10.0),
        )
        .unwrap();
        assert!(user_of_book(&conn, id).unwrap().is_none());
    }
}
