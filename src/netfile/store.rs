//! Per-run relational store.
//!
//! The store is an explicit handle owned by the transform stage; there
//! is no process-wide connection. Every run starts with [`Store::rebuild`],
//! which deletes the underlying database file and recreates every table,
//! so a run is always a full rebuild from its own set of source
//! documents.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::netfile::model::{EntityDef, FilingForest, Gift, IncomeSource, ENTITIES};
use crate::netfile::vocab::CodedChoice;

const SCHEMA: &str = r#"
CREATE TABLE filings (
    id                      TEXT PRIMARY KEY,
    report_year             INTEGER NOT NULL,
    filer_id                TEXT,
    amends                  TEXT REFERENCES filings (id),
    date_signed             INTEGER,
    first_name              TEXT,
    middle_name             TEXT,
    last_name               TEXT,
    comments_schedule_a1    TEXT,
    comments_schedule_a2    TEXT,
    comments_schedule_b     TEXT,
    comments_schedule_c     TEXT,
    comments_schedule_d     TEXT,
    comments_schedule_e     TEXT
);

CREATE TABLE offices (
    id                      TEXT PRIMARY KEY,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    agency                  TEXT,
    division_board_district TEXT,
    position                TEXT,
    is_primary              INTEGER NOT NULL,
    election_date           INTEGER,
    assuming_date           INTEGER,
    leaving_date            INTEGER
);

CREATE TABLE schedule_a1_attachments (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    date_acquired           INTEGER,
    date_disposed           INTEGER,
    name_of_business_entity TEXT,
    description             TEXT,
    fair_market_value       TEXT,
    nature_of_investment    TEXT,
    nature_of_investment_other_description TEXT,
    partnership_amount      TEXT,
    UNIQUE (id, filing)
);

CREATE TABLE schedule_a2_attachments (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    address_city            TEXT,
    address_state           TEXT,
    address_zip             TEXT,
    business_position       TEXT,
    date_acquired           INTEGER,
    date_disposed           INTEGER,
    description             TEXT,
    entity_name             TEXT,
    fair_market_value       TEXT,
    gross_income_received   TEXT,
    nature_of_investment    TEXT,
    nature_of_investment_other_description TEXT,
    UNIQUE (id, filing)
);

CREATE TABLE schedule_b_attachments (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    city                    TEXT,
    date_acquired           INTEGER,
    date_disposed           INTEGER,
    fair_market_value       TEXT,
    gross_income_received   TEXT,
    nature_of_interest      TEXT,
    parcel_or_address       TEXT,
    UNIQUE (id, filing)
);

CREATE TABLE schedule_b_income_sources (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    schedule                INTEGER NOT NULL REFERENCES schedule_b_attachments (internal_id),
    name                    TEXT
);

CREATE TABLE schedule_c1_attachments (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    address_city            TEXT,
    address_state           TEXT,
    address_zip             TEXT,
    business_activity       TEXT,
    business_position       TEXT,
    gross_income_received   TEXT,
    name_of_income_source   TEXT,
    reason_for_income       TEXT,
    reason_for_income_other TEXT,
    UNIQUE (id, filing)
);

CREATE TABLE schedule_c1_income_sources (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    schedule                INTEGER NOT NULL REFERENCES schedule_c1_attachments (internal_id),
    name                    TEXT
);

CREATE TABLE schedule_c2_attachments (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    address_city            TEXT,
    address_state           TEXT,
    address_zip             TEXT,
    business_activity       TEXT,
    has_interest_rate       INTEGER NOT NULL,
    highest_balance         TEXT,
    interest_rate           TEXT,
    interest_rate_raw       TEXT,
    loan_security           TEXT,
    loan_security_real_property_address_city  TEXT,
    loan_security_real_property_address_state TEXT,
    loan_security_real_property_address_zip   TEXT,
    name_of_lender          TEXT,
    term                    INTEGER,
    term_type               TEXT,
    UNIQUE (id, filing)
);

CREATE TABLE schedule_d_attachments (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    address_city            TEXT,
    address_state           TEXT,
    address_zip             TEXT,
    business_activity       TEXT,
    name_of_source          TEXT,
    UNIQUE (id, filing)
);

CREATE TABLE schedule_d_gifts (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    schedule                INTEGER NOT NULL REFERENCES schedule_d_attachments (internal_id),
    amount                  TEXT,
    description             TEXT,
    gift_date               INTEGER
);

CREATE TABLE schedule_e_attachments (
    internal_id             INTEGER PRIMARY KEY,
    id                      TEXT NOT NULL,
    filing                  TEXT NOT NULL REFERENCES filings (id),
    address_city            TEXT,
    address_state           TEXT,
    address_zip             TEXT,
    amount                  TEXT,
    business_activity       TEXT,
    end_date                INTEGER,
    is_nonprofit            INTEGER NOT NULL,
    is_other                INTEGER NOT NULL,
    made_speech             INTEGER NOT NULL,
    name_of_source          TEXT,
    other_description       TEXT,
    start_date              INTEGER,
    travel_description      TEXT,
    type_of_payment         TEXT,
    UNIQUE (id, filing)
);
"#;

fn choice_label<C: CodedChoice>(choice: &Option<C>) -> Option<&'static str> {
    choice.as_ref().map(|c| c.as_str())
}

/// Handle to the per-run SQLite store with an explicit open/close
/// lifecycle scoped to one run.
pub struct Store {
    path: PathBuf,
    conn: Option<Connection>,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let conn = Connection::open(&self.path)?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }

    pub fn close(&mut self) {
        self.conn = None;
    }

    /// Destroys and recreates the store: closes any open connection,
    /// deletes the database file if present, and recreates every table
    /// with foreign-key enforcement on. Must run before any filing is
    /// parsed in a run.
    pub fn rebuild(&mut self) -> Result<()> {
        self.close();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!(database = %self.path.display(), "deleted database");
        } else {
            info!(
                database = %self.path.display(),
                "database not deleted since it does not exist"
            );
        }
        self.connection()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Commits one filing's record forest in a single transaction:
    /// the Filing row first, then Offices, then each schedule's
    /// attachment rows, then each schedule's nested child rows. Any
    /// failure rolls the whole filing back.
    pub fn commit_forest(&mut self, forest: &FilingForest) -> Result<()> {
        let conn = self.connection()?;
        let tx = conn.transaction()?;

        insert_filing(&tx, forest)?;
        insert_offices(&tx, forest)?;
        let b_rowids = insert_schedule_b(&tx, forest)?;
        let c1_rowids = insert_schedule_c1(&tx, forest)?;
        let d_rowids = insert_schedule_d(&tx, forest)?;
        insert_schedule_a1(&tx, forest)?;
        insert_schedule_a2(&tx, forest)?;
        insert_schedule_c2(&tx, forest)?;
        insert_schedule_e(&tx, forest)?;

        for (schedule, rowid) in forest.schedule_b.iter().zip(&b_rowids) {
            insert_income_sources(
                &tx,
                "schedule_b_income_sources",
                *rowid,
                &schedule.income_sources,
            )?;
        }
        for (schedule, rowid) in forest.schedule_c1.iter().zip(&c1_rowids) {
            insert_income_sources(
                &tx,
                "schedule_c1_income_sources",
                *rowid,
                &schedule.income_sources,
            )?;
        }
        for (schedule, rowid) in forest.schedule_d.iter().zip(&d_rowids) {
            insert_gifts(&tx, *rowid, &schedule.gifts)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Produces one fully quoted CSV extract per entity table, in the
    /// declared column order, paired with the entity definition so the
    /// caller can route each extract.
    ///
    /// Requires exclusive access: the write connection is closed and a
    /// fresh one opened, so this must only run after every filing in
    /// the batch has been parsed.
    pub fn export_all(&mut self) -> Result<Vec<(&'static EntityDef, String)>> {
        self.close();
        let conn = self.connection()?;

        let mut exports = Vec::with_capacity(ENTITIES.len());
        for entity in ENTITIES {
            let extract = export_table(conn, entity)?;
            exports.push((*entity, extract));
        }
        Ok(exports)
    }

    /// Number of rows currently in `table`.
    pub fn count(&mut self, table: &str) -> Result<i64> {
        let conn = self.connection()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}

fn insert_filing(tx: &Transaction<'_>, forest: &FilingForest) -> Result<()> {
    let f = &forest.filing;
    tx.execute(
        "INSERT INTO filings (
            id, report_year, filer_id, amends, date_signed,
            first_name, middle_name, last_name,
            comments_schedule_a1, comments_schedule_a2, comments_schedule_b,
            comments_schedule_c, comments_schedule_d, comments_schedule_e
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            f.id,
            f.report_year,
            f.filer_id,
            f.amends,
            f.date_signed,
            f.first_name,
            f.middle_name,
            f.last_name,
            f.comments_schedule_a1,
            f.comments_schedule_a2,
            f.comments_schedule_b,
            f.comments_schedule_c,
            f.comments_schedule_d,
            f.comments_schedule_e,
        ],
    )?;
    Ok(())
}

fn insert_offices(tx: &Transaction<'_>, forest: &FilingForest) -> Result<()> {
    for office in &forest.offices {
        let id = office.id.to_string();

        // Offices are sometimes repeated verbatim across amendment
        // chains; an office that already exists is skipped, never
        // updated.
        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM offices WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_some() {
            debug!(office_id = %id, "skipping duplicate office");
            continue;
        }

        tx.execute(
            "INSERT INTO offices (
                id, filing, agency, division_board_district, position,
                is_primary, election_date, assuming_date, leaving_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                forest.filing.id,
                office.agency,
                office.division_board_district,
                office.position,
                office.is_primary,
                office.election_date,
                office.assuming_date,
                office.leaving_date,
            ],
        )?;
    }
    Ok(())
}

fn insert_schedule_a1(tx: &Transaction<'_>, forest: &FilingForest) -> Result<()> {
    for row in &forest.schedule_a1 {
        tx.execute(
            "INSERT INTO schedule_a1_attachments (
                id, filing, date_acquired, date_disposed,
                name_of_business_entity, description, fair_market_value,
                nature_of_investment, nature_of_investment_other_description,
                partnership_amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.id.to_string(),
                forest.filing.id,
                row.date_acquired,
                row.date_disposed,
                row.name_of_business_entity,
                row.description,
                choice_label(&row.fair_market_value),
                choice_label(&row.nature_of_investment),
                row.nature_of_investment_other_description,
                choice_label(&row.partnership_amount),
            ],
        )?;
    }
    Ok(())
}

fn insert_schedule_a2(tx: &Transaction<'_>, forest: &FilingForest) -> Result<()> {
    for row in &forest.schedule_a2 {
        tx.execute(
            "INSERT INTO schedule_a2_attachments (
                id, filing, address_city, address_state, address_zip,
                business_position, date_acquired, date_disposed, description,
                entity_name, fair_market_value, gross_income_received,
                nature_of_investment, nature_of_investment_other_description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                row.id.to_string(),
                forest.filing.id,
                row.address_city,
                row.address_state,
                row.address_zip,
                row.business_position,
                row.date_acquired,
                row.date_disposed,
                row.description,
                row.entity_name,
                choice_label(&row.fair_market_value),
                choice_label(&row.gross_income_received),
                choice_label(&row.nature_of_investment),
                row.nature_of_investment_other_description,
            ],
        )?;
    }
    Ok(())
}

fn insert_schedule_b(tx: &Transaction<'_>, forest: &FilingForest) -> Result<Vec<i64>> {
    let mut rowids = Vec::with_capacity(forest.schedule_b.len());
    for row in &forest.schedule_b {
        tx.execute(
            "INSERT INTO schedule_b_attachments (
                id, filing, city, date_acquired, date_disposed,
                fair_market_value, gross_income_received, nature_of_interest,
                parcel_or_address
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.id.to_string(),
                forest.filing.id,
                row.city,
                row.date_acquired,
                row.date_disposed,
                choice_label(&row.fair_market_value),
                choice_label(&row.gross_income_received),
                choice_label(&row.nature_of_interest),
                row.parcel_or_address,
            ],
        )?;
        rowids.push(tx.last_insert_rowid());
    }
    Ok(rowids)
}

fn insert_schedule_c1(tx: &Transaction<'_>, forest: &FilingForest) -> Result<Vec<i64>> {
    let mut rowids = Vec::with_capacity(forest.schedule_c1.len());
    for row in &forest.schedule_c1 {
        tx.execute(
            "INSERT INTO schedule_c1_attachments (
                id, filing, address_city, address_state, address_zip,
                business_activity, business_position, gross_income_received,
                name_of_income_source, reason_for_income, reason_for_income_other
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id.to_string(),
                forest.filing.id,
                row.address_city,
                row.address_state,
                row.address_zip,
                row.business_activity,
                row.business_position,
                choice_label(&row.gross_income_received),
                row.name_of_income_source,
                choice_label(&row.reason_for_income),
                row.reason_for_income_other,
            ],
        )?;
        rowids.push(tx.last_insert_rowid());
    }
    Ok(rowids)
}

fn insert_schedule_c2(tx: &Transaction<'_>, forest: &FilingForest) -> Result<()> {
    for row in &forest.schedule_c2 {
        tx.execute(
            "INSERT INTO schedule_c2_attachments (
                id, filing, address_city, address_state, address_zip,
                business_activity, has_interest_rate, highest_balance,
                interest_rate, interest_rate_raw, loan_security,
                loan_security_real_property_address_city,
                loan_security_real_property_address_state,
                loan_security_real_property_address_zip,
                name_of_lender, term, term_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                row.id.to_string(),
                forest.filing.id,
                row.address_city,
                row.address_state,
                row.address_zip,
                row.business_activity,
                row.has_interest_rate,
                choice_label(&row.highest_balance),
                row.interest_rate.map(|d| d.to_string()),
                row.interest_rate_raw,
                choice_label(&row.loan_security),
                row.loan_security_real_property_address_city,
                row.loan_security_real_property_address_state,
                row.loan_security_real_property_address_zip,
                row.name_of_lender,
                row.term,
                row.term_type,
            ],
        )?;
    }
    Ok(())
}

fn insert_schedule_d(tx: &Transaction<'_>, forest: &FilingForest) -> Result<Vec<i64>> {
    let mut rowids = Vec::with_capacity(forest.schedule_d.len());
    for row in &forest.schedule_d {
        tx.execute(
            "INSERT INTO schedule_d_attachments (
                id, filing, address_city, address_state, address_zip,
                business_activity, name_of_source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id.to_string(),
                forest.filing.id,
                row.address_city,
                row.address_state,
                row.address_zip,
                row.business_activity,
                row.name_of_source,
            ],
        )?;
        rowids.push(tx.last_insert_rowid());
    }
    Ok(rowids)
}

fn insert_schedule_e(tx: &Transaction<'_>, forest: &FilingForest) -> Result<()> {
    for row in &forest.schedule_e {
        tx.execute(
            "INSERT INTO schedule_e_attachments (
                id, filing, address_city, address_state, address_zip, amount,
                business_activity, end_date, is_nonprofit, is_other,
                made_speech, name_of_source, other_description, start_date,
                travel_description, type_of_payment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                row.id.to_string(),
                forest.filing.id,
                row.address_city,
                row.address_state,
                row.address_zip,
                row.amount.map(|d| d.to_string()),
                row.business_activity,
                row.end_date,
                row.is_nonprofit,
                row.is_other,
                row.made_speech,
                row.name_of_source,
                row.other_description,
                row.start_date,
                row.travel_description,
                choice_label(&row.type_of_payment),
            ],
        )?;
    }
    Ok(())
}

fn insert_income_sources(
    tx: &Transaction<'_>,
    table: &str,
    schedule_rowid: i64,
    sources: &[IncomeSource],
) -> Result<()> {
    for source in sources {
        tx.execute(
            &format!("INSERT INTO {table} (id, schedule, name) VALUES (?1, ?2, ?3)"),
            params![source.id.to_string(), schedule_rowid, source.name],
        )?;
    }
    Ok(())
}

fn insert_gifts(tx: &Transaction<'_>, schedule_rowid: i64, gifts: &[Gift]) -> Result<()> {
    for gift in gifts {
        tx.execute(
            "INSERT INTO schedule_d_gifts (id, schedule, amount, description, gift_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                gift.id.to_string(),
                schedule_rowid,
                gift.amount.map(|d| d.to_string()),
                gift.description,
                gift.gift_date,
            ],
        )?;
    }
    Ok(())
}

fn export_table(conn: &Connection, entity: &EntityDef) -> Result<String> {
    let columns = entity
        .fields
        .iter()
        .map(|f| f.name)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("SELECT {columns} FROM {} ORDER BY rowid", entity.table);

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(entity.fields.iter().map(|f| f.name))?;

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(entity.fields.len());
        for index in 0..entity.fields.len() {
            let value = match row.get_ref(index)? {
                rusqlite::types::ValueRef::Null => String::new(),
                rusqlite::types::ValueRef::Integer(i) => i.to_string(),
                rusqlite::types::ValueRef::Real(f) => f.to_string(),
                rusqlite::types::ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
                rusqlite::types::ValueRef::Blob(_) => String::new(),
            };
            record.push(value);
        }
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
