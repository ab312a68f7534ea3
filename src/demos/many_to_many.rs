//! Many-to-many: users and projects linked through the `user_projects` join
//! table. Either side can be reached from the other.

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
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// Projects-to-users direction; reverse with [`RelationDef::rev`] for the
/// users-to-projects direction. The join table is declared once, here.
pub fn project_users_relation() -> RelationDef {
    RelationDef::many_to_many("projects", "users", "user_projects", "project_id", "user_id")
}

pub fn schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new("users")
                .column(ColumnDefinition::id())
                .column(ColumnDefinition::new("name", DataType::Text).not_null()),
        )
        .add_table(
            TableDefinition::new("projects")
                .column(ColumnDefinition::id())
                .column(ColumnDefinition::new("name", DataType::Text).not_null()),
        )
        .relation(&project_users_relation())
}

pub fn create_user(conn: &Connection, name: &str) -> Result<User> {
    let id = store::insert_row(conn, "users", &Params::new().with_value("name", name))?;
    Ok(User {
        id,
        name: name.to_string(),
    })
}

pub fn create_project(conn: &Connection, name: &str) -> Result<Project> {
    let id = store::insert_row(conn, "projects", &Params::new().with_value("name", name))?;
    Ok(Project {
        id,
        name: name.to_string(),
    })
}

/// Insert a project together with freshly created member users in one call.
pub fn create_project_with_users(
    conn: &Connection,
    name: &str,
    user_names: &[&str],
) -> Result<Project> {
    let project = create_project(conn, name)?;
    for user_name in user_names {
        create_user_in_project(conn, project.id, user_name)?;
    }
    Ok(project)
}

/// Create a user and link them to the project in one call.
pub fn create_user_in_project(conn: &Connection, project_id: i64, name: &str) -> Result<User> {
    let user = create_user(conn, name)?;
    project_users_relation().link(conn, project_id, user.id)?;
    Ok(user)
}

pub fn find_user_by_name(conn: &Connection, name: &str) -> Result<Option<User>> {
    let (where_sql, params) = Filter::new()
        .with_condition("name", Condition::eq(name))
        .to_sql();
    let sql = format!("SELECT id, name FROM users{where_sql}");
    store::query_one_named(conn, &sql, &params, map_user)
}

pub fn find_project_by_name(conn: &Connection, name: &str) -> Result<Option<Project>> {
    let (where_sql, params) = Filter::new()
        .with_condition("name", Condition::eq(name))
        .to_sql();
    let sql = format!("SELECT id, name FROM projects{where_sql}");
    store::query_one_named(conn, &sql, &params, |row| {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
}

/// Lazily load the members of one project.
pub fn users_of_project(conn: &Connection, project_id: i64) -> Result<Vec<User>> {
    let sql = project_users_relation().related_sql(&["id", "name"]);
    store::query_map_named(
        conn,
        &sql,
        &Params::new().with_value("id", project_id),
        map_user,
    )
}

/// Lazily load the projects one user belongs to.
pub fn projects_of_user(conn: &Connection, user_id: i64) -> Result<Vec<Project>> {
    let sql = project_users_relation().rev().related_sql(&["id", "name"]);
    store::query_map_named(
        conn,
        &sql,
        &Params::new().with_value("id", user_id),
        |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
}

/// Fetch a user with their projects eagerly loaded in a single SELECT.
///
/// The join fans out to one row per project; the rows are folded back into
/// one user and a project list. A user with no projects still comes back,
/// with an empty list.
pub fn find_user_with_projects(
    conn: &Connection,
    name: &str,
) -> Result<Option<(User, Vec<Project>)>> {
    let sql = format!(
        "SELECT users.id, users.name, projects.id, projects.name \
         FROM users {} WHERE users.name = :name ORDER BY projects.id",
        project_users_relation().rev().join_clause()
    );
    let rows = store::query_map_named(
        conn,
        &sql,
        &Params::new().with_value("name", name),
        |row| {
            let user = User {
                id: row.get(0)?,
                name: row.get(1)?,
            };
            let project = match row.get::<_, Option<i64>>(2)? {
                Some(id) => Some(Project {
                    id,
                    name: row.get(3)?,
                }),
                None => None,
            };
            Ok((user, project))
        },
    )?;

    let mut rows = rows.into_iter();
    let Some((user, first)) = rows.next() else {
        return Ok(None);
    };
    let mut projects: Vec<Project> = first.into_iter().collect();
    projects.extend(rows.filter_map(|(_, project)| project));
    Ok(Some((user, projects)))
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

pub struct ManyToMany;

#[async_trait]
impl AssociationDemo for ManyToMany {
    fn name(&self) -> &'static str {
        "many-to-many"
    }

    async fn run(&self, db: &Database) -> Result<()> {
        db.sync(&schema(), true).await?;

        let relation = project_users_relation();

        let node_js = db
            .with_transaction(|conn| create_project_with_users(conn, "nodeJS", &["ali", "zahra"]))
            .await?;

        let golang = db
            .with_conn(|conn| {
                create_user_in_project(conn, node_js.id, "farhad")?;

                let sepideh = create_user(conn, "sepideh")?;
                let shahin = create_user(conn, "shahin")?;
                relation.link(conn, node_js.id, sepideh.id)?;

                let golang = create_project(conn, "golang")?;
                relation.link(conn, golang.id, sepideh.id)?;
                relation.link(conn, golang.id, shahin.id)?;
                let ali = find_user_by_name(conn, "ali")?
                    .ok_or_else(|| Error::NotFound("users".to_string()))?;
                relation.link(conn, golang.id, ali.id)?;
                Ok(golang)
            })
            .await?;

        db.with_conn(|conn| {
            for project in [&node_js, &golang] {
                for user in users_of_project(conn, project.id)? {
                    tracing::info!("project {} => user {}", project.name, user.name);
                }
            }

            let sepideh = find_user_by_name(conn, "sepideh")?
                .ok_or_else(|| Error::NotFound("users".to_string()))?;
            for project in projects_of_user(conn, sepideh.id)? {
                tracing::info!("user {} => project {}", sepideh.name, project.name);
            }

            let (shahin, projects) = find_user_with_projects(conn, "shahin")?
                .ok_or_else(|| Error::NotFound("users".to_string()))?;
            for project in &projects {
                tracing::info!("user {} => project {}", shahin.name, project.name);
            }
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
    fn nested_create_links_members() {
        let conn = demo_conn();
        let project = create_project_with_users(&conn, "nodeJS", &["ali", "zahra"]).unwrap();

        let members = users_of_project(&conn, project.id).unwrap();
        let names: Vec<&str> = members.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["ali", "zahra"]);
    }

    #[test]
    fn user_can_join_several_projects() {
        let conn = demo_conn();
        let node_js = create_project(&conn, "nodeJS").unwrap();
        let golang = create_project(&conn, "golang").unwrap();
        let sepideh = create_user(&conn, "sepideh").unwrap();

        let relation = project_users_relation();
        relation.link(&conn, node_js.id, sepideh.id).unwrap();
        relation.link(&conn, golang.id, sepideh.id).unwrap();

        let projects = projects_of_user(&conn, sepideh.id).unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["nodeJS", "golang"]);
    }

    #[test]
    fn eager_load_folds_join_rows() {
        let conn = demo_conn();
        let golang = create_project(&conn, "golang").unwrap();
        let shahin = create_user(&conn, "shahin").unwrap();
        project_users_relation()
            .link(&conn, golang.id, shahin.id)
            .unwrap();

        let (user, projects) = find_user_with_projects(&conn, "shahin").unwrap().unwrap();
        assert_eq!(user, shahin);
        assert_eq!(projects, vec![golang]);
    }

    #[test]
    fn eager_load_without_projects_is_empty() {
        let conn = demo_conn();
        create_user(&conn, "sepideh").unwrap();
        let (_, projects) = find_user_with_projects(&conn, "sepideh").unwrap().unwrap();
        assert!(projects.is_empty());
    }

    #[test]
    fn unlink_removes_membership_only() {
        let conn = demo_conn();
        let project = create_project_with_users(&conn, "nodeJS", &["ali"]).unwrap();
        let ali = find_user_by_name(&conn, "ali").unwrap().unwrap();

        project_users_relation()
            .unlink(&conn, project.id, ali.id)
            .unwrap();
        assert!(users_of_project(&conn, project.id).unwrap().is_empty());
        // The user row itself is untouched.
        assert!(find_user_by_name(&conn, "ali").unwrap().is_some());
    }
}
