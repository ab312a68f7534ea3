//! Declarative schema definitions and DDL rendering.
//!
//! Tables are declared up front and synced destructively: a force sync drops
//! every declared table and recreates it. Relations contribute foreign-key
//! columns and join tables via [`Schema::relation`].

use crate::relation::{RelationDef, RelationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    fn sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
        }
    }

    /// The conventional `id INTEGER PRIMARY KEY AUTOINCREMENT` column.
    pub fn id() -> Self {
        Self::new("id", DataType::Integer).primary_key()
    }

    pub fn primary_key(mut self) -> Self {
        self.constraints.push(ColumnConstraint::PrimaryKey);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.constraints.push(ColumnConstraint::NotNull);
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraints.push(ColumnConstraint::Unique);
        self
    }

    fn sql(&self) -> String {
        let mut parts = vec![self.name.clone(), self.data_type.sql().to_string()];
        for constraint in &self.constraints {
            match constraint {
                // AUTOINCREMENT is only valid on INTEGER primary keys.
                ColumnConstraint::PrimaryKey if self.data_type == DataType::Integer => {
                    parts.push("PRIMARY KEY AUTOINCREMENT".to_string())
                }
                ColumnConstraint::PrimaryKey => parts.push("PRIMARY KEY".to_string()),
                ColumnConstraint::NotNull => parts.push("NOT NULL".to_string()),
                ColumnConstraint::Unique => parts.push("UNIQUE".to_string()),
            }
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

impl ForeignKeyAction {
    fn sql(self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    pub fn new(column: &str, foreign_table: &str, foreign_column: &str) -> Self {
        Self {
            column: column.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    fn sql(&self) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.column, self.foreign_table, self.foreign_column
        );
        if self.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(&format!(" ON DELETE {}", self.on_delete.sql()));
        }
        if self.on_update != ForeignKeyAction::NoAction {
            sql.push_str(&format!(" ON UPDATE {}", self.on_update.sql()));
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn create_sql(&self, table: &str) -> String {
        let kind = if self.unique { "UNIQUE INDEX" } else { "INDEX" };
        format!(
            "CREATE {} IF NOT EXISTS {} ON {} ({})",
            kind,
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Composite primary key; empty when a column carries its own PRIMARY KEY.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn create_sql(&self) -> String {
        let mut items: Vec<String> = self.columns.iter().map(ColumnDefinition::sql).collect();
        if !self.primary_key.is_empty() {
            items.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        items.extend(self.foreign_keys.iter().map(ForeignKey::sql));
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.name,
            items.join(", ")
        )
    }

    /// The table plus its indexes, as an executable batch.
    pub fn create_script(&self) -> String {
        let mut script = format!("{};\n", self.create_sql());
        for index in &self.indexes {
            script.push_str(&format!("{};\n", index.create_sql(&self.name)));
        }
        script
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.name)
    }
}

/// An ordered set of table definitions.
///
/// Declaration order matters: parents before children, so that a destructive
/// sync can drop in reverse order without tripping foreign-key checks.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// Fold a relation into the schema.
    ///
    /// Has-one/has-many add the foreign-key column, constraint, and index to
    /// the related table, which must already be declared. Many-to-many appends
    /// the join table. Reversed (belongs-to) relations contribute nothing:
    /// foreign keys come from the owning side.
    pub fn relation(mut self, rel: &RelationDef) -> Self {
        match rel.kind {
            RelationKind::HasOne | RelationKind::HasMany => {
                let unique = rel.kind == RelationKind::HasOne;
                if let Some(table) = self.tables.iter_mut().find(|t| t.name == rel.to_table) {
                    table
                        .columns
                        .push(ColumnDefinition::new(&rel.fk_column, DataType::Integer));
                    table
                        .foreign_keys
                        .push(ForeignKey::new(&rel.fk_column, &rel.from_table, "id"));
                    let index =
                        IndexDefinition::new(&rel.fk_index_name(), &[rel.fk_column.as_str()]);
                    table
                        .indexes
                        .push(if unique { index.unique() } else { index });
                } else {
                    debug_assert!(false, "relation target {} not declared", rel.to_table);
                }
            }
            RelationKind::ManyToMany => {
                if let Some(table) = rel.join_table() {
                    self.tables.push(table);
                }
            }
            RelationKind::BelongsTo => {}
        }
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_sql_renders_constraints() {
        let id = ColumnDefinition::id();
        assert_eq!(id.sql(), "id INTEGER PRIMARY KEY AUTOINCREMENT");

        let name = ColumnDefinition::new("name", DataType::Text).not_null();
        assert_eq!(name.sql(), "name TEXT NOT NULL");

        let email = ColumnDefinition::new("email", DataType::Text).unique();
        assert_eq!(email.sql(), "email TEXT UNIQUE");

        // Non-integer primary keys must not get AUTOINCREMENT.
        let code = ColumnDefinition::new("code", DataType::Text).primary_key();
        assert_eq!(code.sql(), "code TEXT PRIMARY KEY");
    }

    #[test]
    fn table_sql_includes_composite_key_and_foreign_keys() {
        let table = TableDefinition::new("user_projects")
            .column(ColumnDefinition::new("user_id", DataType::Integer).not_null())
            .column(ColumnDefinition::new("project_id", DataType::Integer).not_null())
            .primary_key(&["user_id", "project_id"])
            .foreign_key(
                ForeignKey::new("user_id", "users", "id").on_delete(ForeignKeyAction::Cascade),
            );

        let sql = table.create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS user_projects ("));
        assert!(sql.contains("PRIMARY KEY (user_id, project_id)"));
        assert!(sql.contains("FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE"));
    }

    #[test]
    fn create_script_appends_indexes() {
        let table = TableDefinition::new("books")
            .column(ColumnDefinition::id())
            .column(ColumnDefinition::new("title", DataType::Text).not_null())
            .index(IndexDefinition::new("idx_books_title", &["title"]));

        let script = table.create_script();
        assert!(script.contains("CREATE TABLE IF NOT EXISTS books"));
        assert!(script.contains("CREATE INDEX IF NOT EXISTS idx_books_title ON books (title);"));
    }

    #[test]
    fn drop_sql_is_idempotent() {
        let table = TableDefinition::new("mobiles");
        assert_eq!(table.drop_sql(), "DROP TABLE IF EXISTS mobiles;");
    }

    #[test]
    fn has_one_relation_adds_unique_foreign_key_column() {
        let schema = Schema::new()
            .add_table(TableDefinition::new("mobiles").column(ColumnDefinition::id()))
            .add_table(TableDefinition::new("chargers").column(ColumnDefinition::id()))
            .relation(&RelationDef::has_one("mobiles", "chargers", "mobile_id"));

        let chargers = schema.table("chargers").expect("declared");
        assert!(chargers.columns.iter().any(|c| c.name == "mobile_id"));
        assert_eq!(chargers.foreign_keys.len(), 1);
        assert_eq!(chargers.foreign_keys[0].foreign_table, "mobiles");
        assert_eq!(chargers.indexes.len(), 1);
        assert!(chargers.indexes[0].unique);
    }

    #[test]
    fn many_to_many_relation_appends_join_table() {
        let schema = Schema::new()
            .add_table(TableDefinition::new("users").column(ColumnDefinition::id()))
            .add_table(TableDefinition::new("projects").column(ColumnDefinition::id()))
            .relation(&RelationDef::many_to_many(
                "users",
                "projects",
                "user_projects",
                "user_id",
                "project_id",
            ));

        assert_eq!(schema.tables.len(), 3);
        let join = schema.table("user_projects").expect("appended");
        assert_eq!(join.primary_key, vec!["user_id", "project_id"]);
    }
}
