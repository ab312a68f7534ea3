//! One-to-one: a mobile has at most one charger, a charger belongs to at
//! most one mobile. The foreign key lives on the charger side.

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
pub struct Mobile {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charger {
    pub id: i64,
    pub name: String,
    pub mobile_id: Option<i64>,
}

pub fn charger_relation() -> RelationDef {
    RelationDef::has_one("mobiles", "chargers", "mobile_id")
}

pub fn schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new("mobiles")
                .column(ColumnDefinition::id())
                .column(ColumnDefinition::new("name", DataType::Text).not_null()),
        )
        .add_table(
            TableDefinition::new("chargers")
                .column(ColumnDefinition::id())
                .column(ColumnDefinition::new("name", DataType::Text).not_null()),
        )
        .relation(&charger_relation())
}

pub fn create_mobile(conn: &Connection, name: &str) -> Result<Mobile> {
    let id = store::insert_row(conn, "mobiles", &Params::new().with_value("name", name))?;
    Ok(Mobile {
        id,
        name: name.to_string(),
    })
}

pub fn create_charger(conn: &Connection, name: &str) -> Result<Charger> {
    let id = store::insert_row(conn, "chargers", &Params::new().with_value("name", name))?;
    Ok(Charger {
        id,
        name: name.to_string(),
        mobile_id: None,
    })
}

/// Insert a mobile together with its charger in one call.
pub fn create_mobile_with_charger(
    conn: &Connection,
    mobile_name: &str,
    charger_name: &str,
) -> Result<(Mobile, Charger)> {
    let mobile = create_mobile(conn, mobile_name)?;
    let id = store::insert_row(
        conn,
        "chargers",
        &Params::new()
            .with_value("name", charger_name)
            .with_value("mobile_id", mobile.id),
    )?;
    let charger = Charger {
        id,
        name: charger_name.to_string(),
        mobile_id: Some(mobile.id),
    };
    Ok((mobile, charger))
}

pub fn find_mobile_by_name(conn: &Connection, name: &str) -> Result<Option<Mobile>> {
    let (where_sql, params) = Filter::new()
        .with_condition("name", Condition::eq(name))
        .to_sql();
    let sql = format!("SELECT id, name FROM mobiles{where_sql}");
    store::query_one_named(conn, &sql, &params, |row| {
        Ok(Mobile {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
}

/// Fetch a mobile with its charger eagerly loaded.
pub fn find_mobile_with_charger(
    conn: &Connection,
    name: &str,
) -> Result<Option<(Mobile, Option<Charger>)>> {
    let sql = format!(
        "SELECT mobiles.id, mobiles.name, chargers.id, chargers.name, chargers.mobile_id \
         FROM mobiles {} WHERE mobiles.name = :name",
        charger_relation().join_clause()
    );
    store::query_one_named(
        conn,
        &sql,
        &Params::new().with_value("name", name),
        |row| {
            let mobile = Mobile {
                id: row.get(0)?,
                name: row.get(1)?,
            };
            let charger = match row.get::<_, Option<i64>>(2)? {
                Some(id) => Some(Charger {
                    id,
                    name: row.get(3)?,
                    mobile_id: row.get(4)?,
                }),
                None => None,
            };
            Ok((mobile, charger))
        },
    )
}

/// Fetch a charger with its mobile eagerly loaded.
pub fn find_charger_with_mobile(
    conn: &Connection,
    name: &str,
) -> Result<Option<(Charger, Option<Mobile>)>> {
    let sql = format!(
        "SELECT chargers.id, chargers.name, chargers.mobile_id, mobiles.id, mobiles.name \
         FROM chargers {} WHERE chargers.name = :name",
        charger_relation().rev().join_clause()
    );
    store::query_one_named(
        conn,
        &sql,
        &Params::new().with_value("name", name),
        |row| {
            let charger = Charger {
                id: row.get(0)?,
                name: row.get(1)?,
                mobile_id: row.get(2)?,
            };
            let mobile = match row.get::<_, Option<i64>>(3)? {
                Some(id) => Some(Mobile {
                    id,
                    name: row.get(4)?,
                }),
                None => None,
            };
            Ok((charger, mobile))
        },
    )
}

pub struct OneToOne;

#[async_trait]
impl AssociationDemo for OneToOne {
    fn name(&self) -> &'static str {
        "one-to-one"
    }

    async fn run(&self, db: &Database) -> Result<()> {
        db.sync(&schema(), true).await?;

        // Mobile and charger created together.
        db.with_transaction(|conn| create_mobile_with_charger(conn, "Samsung S22", "25W Adaptor"))
            .await?;

        // Mobile and charger created independently, then linked.
        db.with_conn(|conn| {
            let iphone = create_mobile(conn, "iPhone")?;
            let adaptor = create_charger(conn, "20W Adaptor")?;
            charger_relation().link(conn, iphone.id, adaptor.id)?;
            Ok(())
        })
        .await?;

        db.with_conn(|conn| {
            let (mobile, charger) = find_mobile_with_charger(conn, "iPhone")?
                .ok_or_else(|| Error::NotFound("mobiles".to_string()))?;
            let charger = charger.ok_or_else(|| Error::NotFound("chargers".to_string()))?;
            tracing::info!("{} {}", mobile.name, charger.name);

            let (charger, mobile) = find_charger_with_mobile(conn, "20W Adaptor")?
                .ok_or_else(|| Error::NotFound("chargers".to_string()))?;
            let mobile = mobile.ok_or_else(|| Error::NotFound("mobiles".to_string()))?;
            tracing::info!("{} {}", charger.name, mobile.name);
            Ok(())
        })
        .await
    }
}
