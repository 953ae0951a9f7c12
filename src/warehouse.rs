//! Warehouse loading.
//!
//! Each run replaces every warehouse table wholesale from the CSV
//! extracts. Column schemas are derived from the entity registry, so
//! the warehouse layout always tracks the store layout.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::error::Result;
use crate::netfile::model::{EntityDef, FieldKind};

/// Warehouse-side column types. Timestamps load as epoch seconds and
/// decimals as exact numeric strings, matching the extract encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarehouseType {
    String,
    Int64,
    Bool,
    Numeric,
}

pub fn warehouse_type(kind: FieldKind) -> WarehouseType {
    match kind {
        FieldKind::Id | FieldKind::Text => WarehouseType::String,
        FieldKind::Integer | FieldKind::Timestamp => WarehouseType::Int64,
        FieldKind::Boolean => WarehouseType::Bool,
        FieldKind::Decimal => WarehouseType::Numeric,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: WarehouseType,
    pub nullable: bool,
}

/// Warehouse column schema for an entity, in declared field order —
/// the same order the CSV extract's columns are written in.
pub fn schema_for(entity: &EntityDef) -> Vec<ColumnSpec> {
    entity
        .fields
        .iter()
        .map(|f| ColumnSpec {
            name: f.name,
            column_type: warehouse_type(f.kind),
            nullable: f.nullable,
        })
        .collect()
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Cheap reachability probe, run once before the store is rebuilt
    /// so an unreachable warehouse fails the run before any work.
    async fn is_connected(&self) -> bool;

    /// Drops and reloads one table from its CSV extract (header row
    /// included; the implementation skips it).
    async fn refresh_table(&self, entity: &EntityDef, extract: &str) -> Result<()>;
}

/// Directory-backed warehouse: each refresh writes the table's column
/// schema as JSON next to its data rows. Stands in for a remote
/// warehouse in local runs and tests.
pub struct LocalWarehouse {
    root: PathBuf,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Warehouse for LocalWarehouse {
    async fn is_connected(&self) -> bool {
        tokio::fs::create_dir_all(&self.root).await.is_ok()
    }

    async fn refresh_table(&self, entity: &EntityDef, extract: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        let schema = schema_for(entity);
        let schema_json = serde_json::to_string_pretty(&schema)?;
        tokio::fs::write(
            self.root.join(format!("{}.schema.json", entity.table)),
            schema_json,
        )
        .await?;

        // Drop the header; the schema file already names the columns.
        let rows = match extract.split_once('\n') {
            Some((_header, rows)) => rows,
            None => "",
        };
        tokio::fs::write(self.root.join(format!("{}.csv", entity.table)), rows).await?;

        let row_count = rows.lines().count();
        info!(table = entity.table, rows = row_count, "refreshed warehouse table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netfile::model::SCHEDULE_C2;
    use tempfile::tempdir;

    #[test]
    fn decimal_columns_map_to_numeric() {
        let schema = schema_for(&SCHEDULE_C2);
        let interest_rate = schema
            .iter()
            .find(|c| c.name == "interest_rate")
            .unwrap();
        assert_eq!(interest_rate.column_type, WarehouseType::Numeric);
        assert!(interest_rate.nullable);

        let has_rate = schema
            .iter()
            .find(|c| c.name == "has_interest_rate")
            .unwrap();
        assert_eq!(has_rate.column_type, WarehouseType::Bool);
        assert!(!has_rate.nullable);
    }

    #[test]
    fn schema_follows_declared_field_order() {
        let schema = schema_for(&SCHEDULE_C2);
        let names: Vec<_> = schema.iter().map(|c| c.name).collect();
        let declared: Vec<_> = SCHEDULE_C2.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, declared);
    }

    #[tokio::test]
    async fn local_warehouse_strips_the_header_row() {
        let dir = tempdir().unwrap();
        let warehouse = LocalWarehouse::new(dir.path());
        assert!(warehouse.is_connected().await);

        let extract = "\"id\",\"filing\"\n\"abc\",\"100\"\n";
        warehouse
            .refresh_table(&SCHEDULE_C2, extract)
            .await
            .unwrap();

        let rows = std::fs::read_to_string(
            dir.path().join(format!("{}.csv", SCHEDULE_C2.table)),
        )
        .unwrap();
        assert_eq!(rows, "\"abc\",\"100\"\n");
        assert!(dir
            .path()
            .join(format!("{}.schema.json", SCHEDULE_C2.table))
            .exists());
    }
}
