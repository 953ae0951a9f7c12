//! Relational schema for parsed Form 700 filings.
//!
//! Each entity is a plain struct plus a static [`EntityDef`] describing
//! its table and per-field column types. The defs are the single source
//! of truth for store creation, extract column order, and the warehouse
//! schema translation; there is no runtime reflection over "all entity
//! types".

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::netfile::vocab::{
    A1FairMarketValue, A1NatureOfInvestment, A1PartnershipAmount, A2FairMarketValue,
    A2GrossIncomeReceived, A2NatureOfInvestment, BFairMarketValue, BGrossIncomeReceived,
    BNatureOfInterest, C1GrossIncomeReceived, C1ReasonForIncome, C2HighestBalance,
    C2LoanSecurity, ETypeOfPayment,
};

/// Semantic column type, consumed by both the store schema and the
/// warehouse schema translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Registry-assigned identifier or UUID, stored as text.
    Id,
    Text,
    Integer,
    Boolean,
    /// Exact decimal, stored as text to avoid floating-point drift.
    Decimal,
    /// Whole UTC seconds since the epoch.
    Timestamp,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EntityDef {
    /// Storage table name; also the warehouse destination table and the
    /// extract file stem.
    pub table: &'static str,
    pub fields: &'static [FieldDef],
}

const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind, nullable: false }
}

const fn nullable(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind, nullable: true }
}

/// One disclosure document.
#[derive(Debug, Clone, PartialEq)]
pub struct Filing {
    pub id: String,
    pub report_year: i64,
    pub filer_id: Option<String>,
    /// Raw id of the superseded filing; never resolved eagerly.
    pub amends: Option<String>,
    pub date_signed: Option<i64>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub comments_schedule_a1: Option<String>,
    pub comments_schedule_a2: Option<String>,
    pub comments_schedule_b: Option<String>,
    pub comments_schedule_c: Option<String>,
    pub comments_schedule_d: Option<String>,
    pub comments_schedule_e: Option<String>,
}

pub const FILING: EntityDef = EntityDef {
    table: "filings",
    fields: &[
        field("id", FieldKind::Id),
        field("report_year", FieldKind::Integer),
        nullable("filer_id", FieldKind::Text),
        nullable("amends", FieldKind::Id),
        nullable("date_signed", FieldKind::Timestamp),
        nullable("first_name", FieldKind::Text),
        nullable("middle_name", FieldKind::Text),
        nullable("last_name", FieldKind::Text),
        nullable("comments_schedule_a1", FieldKind::Text),
        nullable("comments_schedule_a2", FieldKind::Text),
        nullable("comments_schedule_b", FieldKind::Text),
        nullable("comments_schedule_c", FieldKind::Text),
        nullable("comments_schedule_d", FieldKind::Text),
        nullable("comments_schedule_e", FieldKind::Text),
    ],
};

/// An elected or appointed position disclosed on the cover page.
#[derive(Debug, Clone, PartialEq)]
pub struct Office {
    pub id: Uuid,
    pub agency: Option<String>,
    pub division_board_district: Option<String>,
    pub position: Option<String>,
    pub is_primary: bool,
    pub election_date: Option<i64>,
    pub assuming_date: Option<i64>,
    pub leaving_date: Option<i64>,
}

pub const OFFICE: EntityDef = EntityDef {
    table: "offices",
    fields: &[
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("agency", FieldKind::Text),
        nullable("division_board_district", FieldKind::Text),
        nullable("position", FieldKind::Text),
        field("is_primary", FieldKind::Boolean),
        nullable("election_date", FieldKind::Timestamp),
        nullable("assuming_date", FieldKind::Timestamp),
        nullable("leaving_date", FieldKind::Timestamp),
    ],
};

/// Investments in stocks, bonds, and other interests; ownership < 10%.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleA1 {
    pub id: Uuid,
    pub date_acquired: Option<i64>,
    pub date_disposed: Option<i64>,
    pub name_of_business_entity: Option<String>,
    pub description: Option<String>,
    pub fair_market_value: Option<A1FairMarketValue>,
    pub nature_of_investment: Option<A1NatureOfInvestment>,
    pub nature_of_investment_other_description: Option<String>,
    pub partnership_amount: Option<A1PartnershipAmount>,
}

pub const SCHEDULE_A1: EntityDef = EntityDef {
    table: "schedule_a1_attachments",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("date_acquired", FieldKind::Timestamp),
        nullable("date_disposed", FieldKind::Timestamp),
        nullable("name_of_business_entity", FieldKind::Text),
        nullable("description", FieldKind::Text),
        nullable("fair_market_value", FieldKind::Text),
        nullable("nature_of_investment", FieldKind::Text),
        nullable("nature_of_investment_other_description", FieldKind::Text),
        nullable("partnership_amount", FieldKind::Text),
    ],
};

/// Investments, income, and assets of business entities/trusts;
/// ownership 10% or greater.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleA2 {
    pub id: Uuid,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub business_position: Option<String>,
    pub date_acquired: Option<i64>,
    pub date_disposed: Option<i64>,
    pub description: Option<String>,
    pub entity_name: Option<String>,
    pub fair_market_value: Option<A2FairMarketValue>,
    pub gross_income_received: Option<A2GrossIncomeReceived>,
    pub nature_of_investment: Option<A2NatureOfInvestment>,
    pub nature_of_investment_other_description: Option<String>,
}

pub const SCHEDULE_A2: EntityDef = EntityDef {
    table: "schedule_a2_attachments",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("address_city", FieldKind::Text),
        nullable("address_state", FieldKind::Text),
        nullable("address_zip", FieldKind::Text),
        nullable("business_position", FieldKind::Text),
        nullable("date_acquired", FieldKind::Timestamp),
        nullable("date_disposed", FieldKind::Timestamp),
        nullable("description", FieldKind::Text),
        nullable("entity_name", FieldKind::Text),
        nullable("fair_market_value", FieldKind::Text),
        nullable("gross_income_received", FieldKind::Text),
        nullable("nature_of_investment", FieldKind::Text),
        nullable("nature_of_investment_other_description", FieldKind::Text),
    ],
};

/// Interests in real property, including rental income.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleB {
    pub id: Uuid,
    pub city: Option<String>,
    pub date_acquired: Option<i64>,
    pub date_disposed: Option<i64>,
    pub fair_market_value: Option<BFairMarketValue>,
    pub gross_income_received: Option<BGrossIncomeReceived>,
    pub nature_of_interest: Option<BNatureOfInterest>,
    pub parcel_or_address: Option<String>,
    pub income_sources: Vec<IncomeSource>,
}

pub const SCHEDULE_B: EntityDef = EntityDef {
    table: "schedule_b_attachments",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("city", FieldKind::Text),
        nullable("date_acquired", FieldKind::Timestamp),
        nullable("date_disposed", FieldKind::Timestamp),
        nullable("fair_market_value", FieldKind::Text),
        nullable("gross_income_received", FieldKind::Text),
        nullable("nature_of_interest", FieldKind::Text),
        nullable("parcel_or_address", FieldKind::Text),
    ],
};

/// A named income source nested under a Schedule B or C-1 attachment.
/// Names are sometimes redacted down to nothing in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeSource {
    pub id: Uuid,
    pub name: Option<String>,
}

pub const SCHEDULE_B_INCOME_SOURCE: EntityDef = EntityDef {
    table: "schedule_b_income_sources",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("schedule", FieldKind::Integer),
        nullable("name", FieldKind::Text),
    ],
};

/// Income received.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleC1 {
    pub id: Uuid,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub business_activity: Option<String>,
    pub business_position: Option<String>,
    pub gross_income_received: Option<C1GrossIncomeReceived>,
    pub name_of_income_source: Option<String>,
    pub reason_for_income: Option<C1ReasonForIncome>,
    pub reason_for_income_other: Option<String>,
    pub income_sources: Vec<IncomeSource>,
}

pub const SCHEDULE_C1: EntityDef = EntityDef {
    table: "schedule_c1_attachments",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("address_city", FieldKind::Text),
        nullable("address_state", FieldKind::Text),
        nullable("address_zip", FieldKind::Text),
        nullable("business_activity", FieldKind::Text),
        nullable("business_position", FieldKind::Text),
        nullable("gross_income_received", FieldKind::Text),
        nullable("name_of_income_source", FieldKind::Text),
        nullable("reason_for_income", FieldKind::Text),
        nullable("reason_for_income_other", FieldKind::Text),
    ],
};

pub const SCHEDULE_C1_INCOME_SOURCE: EntityDef = EntityDef {
    table: "schedule_c1_income_sources",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("schedule", FieldKind::Integer),
        nullable("name", FieldKind::Text),
    ],
};

/// Loans received.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleC2 {
    pub id: Uuid,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub business_activity: Option<String>,
    pub has_interest_rate: bool,
    pub highest_balance: Option<C2HighestBalance>,
    /// Exact numeric prefix of the raw interest-rate text.
    pub interest_rate: Option<Decimal>,
    /// Raw interest-rate text as disclosed, e.g. `"3.25%"`.
    pub interest_rate_raw: Option<String>,
    pub loan_security: Option<C2LoanSecurity>,
    pub loan_security_real_property_address_city: Option<String>,
    pub loan_security_real_property_address_state: Option<String>,
    pub loan_security_real_property_address_zip: Option<String>,
    pub name_of_lender: Option<String>,
    pub term: Option<i64>,
    pub term_type: Option<String>,
}

pub const SCHEDULE_C2: EntityDef = EntityDef {
    table: "schedule_c2_attachments",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("address_city", FieldKind::Text),
        nullable("address_state", FieldKind::Text),
        nullable("address_zip", FieldKind::Text),
        nullable("business_activity", FieldKind::Text),
        field("has_interest_rate", FieldKind::Boolean),
        nullable("highest_balance", FieldKind::Text),
        nullable("interest_rate", FieldKind::Decimal),
        nullable("interest_rate_raw", FieldKind::Text),
        nullable("loan_security", FieldKind::Text),
        nullable("loan_security_real_property_address_city", FieldKind::Text),
        nullable("loan_security_real_property_address_state", FieldKind::Text),
        nullable("loan_security_real_property_address_zip", FieldKind::Text),
        nullable("name_of_lender", FieldKind::Text),
        nullable("term", FieldKind::Integer),
        nullable("term_type", FieldKind::Text),
    ],
};

/// Gifts.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleD {
    pub id: Uuid,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub business_activity: Option<String>,
    pub name_of_source: Option<String>,
    pub gifts: Vec<Gift>,
}

pub const SCHEDULE_D: EntityDef = EntityDef {
    table: "schedule_d_attachments",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("address_city", FieldKind::Text),
        nullable("address_state", FieldKind::Text),
        nullable("address_zip", FieldKind::Text),
        nullable("business_activity", FieldKind::Text),
        nullable("name_of_source", FieldKind::Text),
    ],
};

/// One gift nested under a Schedule D attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Gift {
    pub id: Uuid,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub gift_date: Option<i64>,
}

pub const SCHEDULE_D_GIFT: EntityDef = EntityDef {
    table: "schedule_d_gifts",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("schedule", FieldKind::Integer),
        nullable("amount", FieldKind::Decimal),
        nullable("description", FieldKind::Text),
        nullable("gift_date", FieldKind::Timestamp),
    ],
};

/// Income from gifts, travel payments, advances, and reimbursements.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleE {
    pub id: Uuid,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub amount: Option<Decimal>,
    pub business_activity: Option<String>,
    pub end_date: Option<i64>,
    pub is_nonprofit: bool,
    pub is_other: bool,
    pub made_speech: bool,
    pub name_of_source: Option<String>,
    pub other_description: Option<String>,
    pub start_date: Option<i64>,
    pub travel_description: Option<String>,
    pub type_of_payment: Option<ETypeOfPayment>,
}

pub const SCHEDULE_E: EntityDef = EntityDef {
    table: "schedule_e_attachments",
    fields: &[
        field("internal_id", FieldKind::Integer),
        field("id", FieldKind::Id),
        field("filing", FieldKind::Id),
        nullable("address_city", FieldKind::Text),
        nullable("address_state", FieldKind::Text),
        nullable("address_zip", FieldKind::Text),
        nullable("amount", FieldKind::Decimal),
        nullable("business_activity", FieldKind::Text),
        nullable("end_date", FieldKind::Timestamp),
        field("is_nonprofit", FieldKind::Boolean),
        field("is_other", FieldKind::Boolean),
        field("made_speech", FieldKind::Boolean),
        nullable("name_of_source", FieldKind::Text),
        nullable("other_description", FieldKind::Text),
        nullable("start_date", FieldKind::Timestamp),
        nullable("travel_description", FieldKind::Text),
        nullable("type_of_payment", FieldKind::Text),
    ],
};

/// Every exportable entity, in export order. This list is the explicit
/// replacement for discovering entity types at runtime: adding a table
/// means adding it here.
pub const ENTITIES: &[&EntityDef] = &[
    &FILING,
    &OFFICE,
    &SCHEDULE_A1,
    &SCHEDULE_A2,
    &SCHEDULE_B,
    &SCHEDULE_B_INCOME_SOURCE,
    &SCHEDULE_C1,
    &SCHEDULE_C1_INCOME_SOURCE,
    &SCHEDULE_C2,
    &SCHEDULE_D,
    &SCHEDULE_D_GIFT,
    &SCHEDULE_E,
];

/// The full record forest parsed from one filing document, committed in
/// a single transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingForest {
    pub filing: Filing,
    pub offices: Vec<Office>,
    pub schedule_a1: Vec<ScheduleA1>,
    pub schedule_a2: Vec<ScheduleA2>,
    pub schedule_b: Vec<ScheduleB>,
    pub schedule_c1: Vec<ScheduleC1>,
    pub schedule_c2: Vec<ScheduleC2>,
    pub schedule_d: Vec<ScheduleD>,
    pub schedule_e: Vec<ScheduleE>,
}

impl Default for Filing {
    fn default() -> Self {
        Self {
            id: String::new(),
            report_year: 0,
            filer_id: None,
            amends: None,
            date_signed: None,
            first_name: None,
            middle_name: None,
            last_name: None,
            comments_schedule_a1: None,
            comments_schedule_a2: None,
            comments_schedule_b: None,
            comments_schedule_c: None,
            comments_schedule_d: None,
            comments_schedule_e: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_declares_its_key_columns_first() {
        for entity in ENTITIES {
            assert!(!entity.fields.is_empty(), "{} has no fields", entity.table);
            let first = entity.fields[0];
            assert!(
                first.name == "id" || first.name == "internal_id",
                "{} does not lead with a key column",
                entity.table
            );
        }
    }

    #[test]
    fn table_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entity in ENTITIES {
            assert!(seen.insert(entity.table), "duplicate table {}", entity.table);
        }
    }
}
