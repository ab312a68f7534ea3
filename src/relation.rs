//! Association metadata between two tables.
//!
//! A [`RelationDef`] records which side owns the relationship and where the
//! foreign key lives. From that single description it contributes schema
//! (via [`crate::schema::Schema::relation`]), builds lazy-load queries and
//! eager join clauses, and executes link/unlink statements.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::schema::{
    ColumnDefinition, DataType, ForeignKey, ForeignKeyAction, TableDefinition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// One related row at most; foreign key on the related table.
    HasOne,
    /// Many related rows; foreign key on the related table.
    HasMany,
    /// The reverse of has-one/has-many; foreign key on the owning table.
    BelongsTo,
    /// Linked through a join table holding a foreign key to each side.
    ManyToMany,
}

/// A directed relationship from `from_table` to `to_table`.
///
/// Foreign-key and join-table names are explicit; there is no pluralization
/// magic. For `HasOne`/`HasMany`, `fk_column` lives on `to_table` and
/// references `from_table.id`. For `BelongsTo` it lives on `from_table`.
/// For `ManyToMany`, `fk_column`/`to_fk_column` are the two columns of the
/// `through` join table.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    pub kind: RelationKind,
    pub from_table: String,
    pub to_table: String,
    pub fk_column: String,
    pub to_fk_column: Option<String>,
    pub through: Option<String>,
}

impl RelationDef {
    pub fn has_one(from_table: &str, to_table: &str, fk_column: &str) -> Self {
        Self {
            kind: RelationKind::HasOne,
            from_table: from_table.to_string(),
            to_table: to_table.to_string(),
            fk_column: fk_column.to_string(),
            to_fk_column: None,
            through: None,
        }
    }

    pub fn has_many(from_table: &str, to_table: &str, fk_column: &str) -> Self {
        Self {
            kind: RelationKind::HasMany,
            ..Self::has_one(from_table, to_table, fk_column)
        }
    }

    pub fn many_to_many(
        from_table: &str,
        to_table: &str,
        through: &str,
        from_fk: &str,
        to_fk: &str,
    ) -> Self {
        Self {
            kind: RelationKind::ManyToMany,
            from_table: from_table.to_string(),
            to_table: to_table.to_string(),
            fk_column: from_fk.to_string(),
            to_fk_column: Some(to_fk.to_string()),
            through: Some(through.to_string()),
        }
    }

    /// Reverse the direction: the related side becomes the starting point.
    ///
    /// Has-one and has-many reverse to belongs-to; belongs-to reverses to
    /// has-many; many-to-many stays many-to-many with the foreign keys
    /// swapped.
    pub fn rev(self) -> Self {
        let kind = match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => RelationKind::BelongsTo,
            RelationKind::BelongsTo => RelationKind::HasMany,
            RelationKind::ManyToMany => RelationKind::ManyToMany,
        };
        let (fk_column, to_fk_column) = match self.kind {
            RelationKind::ManyToMany => {
                let to_fk = self.to_fk_column.unwrap_or_default();
                (to_fk, Some(self.fk_column))
            }
            _ => (self.fk_column, self.to_fk_column),
        };
        Self {
            kind,
            from_table: self.to_table,
            to_table: self.from_table,
            fk_column,
            to_fk_column,
            through: self.through,
        }
    }

    pub(crate) fn fk_index_name(&self) -> String {
        format!("idx_{}_{}", self.to_table, self.fk_column)
    }

    /// The join table definition for a many-to-many relation.
    ///
    /// Composite primary key over both foreign keys; deleting either side
    /// cascades into the join rows.
    pub fn join_table(&self) -> Option<TableDefinition> {
        let through = self.through.as_deref()?;
        let to_fk = self.to_fk_column.as_deref()?;
        Some(
            TableDefinition::new(through)
                .column(ColumnDefinition::new(&self.fk_column, DataType::Integer).not_null())
                .column(ColumnDefinition::new(to_fk, DataType::Integer).not_null())
                .primary_key(&[self.fk_column.as_str(), to_fk])
                .foreign_key(
                    ForeignKey::new(&self.fk_column, &self.from_table, "id")
                        .on_delete(ForeignKeyAction::Cascade)
                        .on_update(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::new(to_fk, &self.to_table, "id")
                        .on_delete(ForeignKeyAction::Cascade)
                        .on_update(ForeignKeyAction::Cascade),
                ),
        )
    }

    /// SELECT for the related rows of one owning row (lazy loading).
    ///
    /// `columns` are unqualified column names of `to_table`; the owning row
    /// id binds to `:id`. Results are ordered by the related table's id.
    pub fn related_sql(&self, columns: &[&str]) -> String {
        let to = &self.to_table;
        let cols: Vec<String> = columns.iter().map(|c| format!("{to}.{c}")).collect();
        let cols = cols.join(", ");
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => format!(
                "SELECT {cols} FROM {to} WHERE {to}.{fk} = :id ORDER BY {to}.id",
                fk = self.fk_column
            ),
            RelationKind::BelongsTo => format!(
                "SELECT {cols} FROM {to} JOIN {from} ON {from}.{fk} = {to}.id \
                 WHERE {from}.id = :id",
                from = self.from_table,
                fk = self.fk_column
            ),
            RelationKind::ManyToMany => {
                let through = self.through.as_deref().unwrap_or_default();
                let to_fk = self.to_fk_column.as_deref().unwrap_or_default();
                format!(
                    "SELECT {cols} FROM {to} JOIN {through} ON {through}.{to_fk} = {to}.id \
                     WHERE {through}.{from_fk} = :id ORDER BY {to}.id",
                    from_fk = self.fk_column
                )
            }
        }
    }

    /// JOIN clause for fetching a `from_table` row with its relation eagerly
    /// loaded in a single SELECT. Left joins, so rows without a related side
    /// still come back.
    pub fn join_clause(&self) -> String {
        let from = &self.from_table;
        let to = &self.to_table;
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => format!(
                "LEFT JOIN {to} ON {to}.{fk} = {from}.id",
                fk = self.fk_column
            ),
            RelationKind::BelongsTo => format!(
                "LEFT JOIN {to} ON {from}.{fk} = {to}.id",
                fk = self.fk_column
            ),
            RelationKind::ManyToMany => {
                let through = self.through.as_deref().unwrap_or_default();
                let to_fk = self.to_fk_column.as_deref().unwrap_or_default();
                format!(
                    "LEFT JOIN {through} ON {through}.{from_fk} = {from}.id \
                     LEFT JOIN {to} ON {to}.id = {through}.{to_fk}",
                    from_fk = self.fk_column
                )
            }
        }
    }

    /// Associate an existing related row with an owning row.
    ///
    /// Sets the foreign key for has-one/has-many/belongs-to; inserts a join
    /// row for many-to-many. Linking twice is a no-op.
    pub fn link(&self, conn: &Connection, owner_id: i64, related_id: i64) -> Result<()> {
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => {
                let sql = format!(
                    "UPDATE {} SET {} = ?1 WHERE id = ?2",
                    self.to_table, self.fk_column
                );
                conn.execute(&sql, params![owner_id, related_id])?;
            }
            RelationKind::BelongsTo => {
                let sql = format!(
                    "UPDATE {} SET {} = ?1 WHERE id = ?2",
                    self.from_table, self.fk_column
                );
                conn.execute(&sql, params![related_id, owner_id])?;
            }
            RelationKind::ManyToMany => {
                let sql = format!(
                    "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                    self.through.as_deref().unwrap_or_default(),
                    self.fk_column,
                    self.to_fk_column.as_deref().unwrap_or_default()
                );
                conn.execute(&sql, params![owner_id, related_id])?;
            }
        }
        Ok(())
    }

    /// Dissociate a related row from an owning row.
    ///
    /// Nulls the foreign key for has-one/has-many/belongs-to (the related row
    /// itself survives); deletes the join row for many-to-many.
    pub fn unlink(&self, conn: &Connection, owner_id: i64, related_id: i64) -> Result<()> {
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => {
                let sql = format!(
                    "UPDATE {} SET {fk} = NULL WHERE id = ?1 AND {fk} = ?2",
                    self.to_table,
                    fk = self.fk_column
                );
                conn.execute(&sql, params![related_id, owner_id])?;
            }
            RelationKind::BelongsTo => {
                let sql = format!(
                    "UPDATE {} SET {fk} = NULL WHERE id = ?1 AND {fk} = ?2",
                    self.from_table,
                    fk = self.fk_column
                );
                conn.execute(&sql, params![owner_id, related_id])?;
            }
            RelationKind::ManyToMany => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                    self.through.as_deref().unwrap_or_default(),
                    self.fk_column,
                    self.to_fk_column.as_deref().unwrap_or_default()
                );
                conn.execute(&sql, params![owner_id, related_id])?;
            }
        }
        Ok(())
    }
}
