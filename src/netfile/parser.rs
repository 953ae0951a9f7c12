//! Form 700 filing parser.
//!
//! [`parse_filing_document`] walks one XML document and produces the
//! typed record forest for that filing. The raw document shapes below
//! mirror the registry's element tree, so every nested record is
//! resolved relative to its parent element and sibling sections with
//! similar tag names cannot cross-contaminate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::netfile::clean::{
    clean_boolean, clean_choice, clean_datetime, clean_decimal, clean_integer, clean_string,
};
use crate::netfile::model::{
    Filing, FilingForest, Gift, IncomeSource, Office, ScheduleA1, ScheduleA2, ScheduleB,
    ScheduleC1, ScheduleC2, ScheduleD, ScheduleE,
};

/// Numeric prefix of a raw interest-rate disclosure like `"3.25%"`.
static RATE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9.]+)").unwrap());

// ---------------------------------------------------------------------
// Raw document shapes (registry XML schema)
// ---------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFiling {
    report_year: Option<String>,
    filing_information: RawFilingInformation,
    cover: Option<RawCover>,
    comments_schedule_a1: Option<String>,
    comments_schedule_a2: Option<String>,
    comments_schedule_b: Option<String>,
    comments_schedule_c: Option<String>,
    comments_schedule_d: Option<String>,
    comments_schedule_e: Option<String>,
    schedule_a_1s: RawScheduleA1List,
    schedule_a_2s: RawScheduleA2List,
    schedule_bs: RawScheduleBList,
    schedule_c_1s: RawScheduleC1List,
    schedule_c_2s: RawScheduleC2List,
    schedule_ds: RawScheduleDList,
    schedule_es: RawScheduleEList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFilingInformation {
    filer_id: Option<String>,
    amendment_superceded_filing_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCover {
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    offices: RawOfficeList,
    verification: RawVerification,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVerification {
    date_signed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOfficeList {
    office: Vec<RawOffice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOffice {
    id: Option<String>,
    agency: Option<String>,
    division_board_district: Option<String>,
    position: Option<String>,
    is_primary: Option<String>,
    election_date: Option<String>,
    assuming_date: Option<String>,
    leaving_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAddress {
    city: Option<String>,
    state: Option<String>,
    zip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleA1List {
    schedule_a_1: Vec<RawScheduleA1>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleA1 {
    id: Option<String>,
    date_acquired: Option<String>,
    date_disposed: Option<String>,
    description: Option<String>,
    name_of_business_entity: Option<String>,
    fair_market_value: Option<String>,
    nature_of_investment: Option<String>,
    nature_of_investment_other_description: Option<String>,
    partnership_amount: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleA2List {
    schedule_a_2: Vec<RawScheduleA2>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleA2 {
    id: Option<String>,
    address: RawAddress,
    business_position: Option<String>,
    date_acquired: Option<String>,
    date_disposed: Option<String>,
    description: Option<String>,
    entity_name: Option<String>,
    /// The registry disambiguates this tag from the A-1 field itself.
    fair_market_value_schedule_a_2: Option<String>,
    gross_income_received: Option<String>,
    nature_of_investment: Option<String>,
    nature_of_investment_other_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleBList {
    schedule_b: Vec<RawScheduleB>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleB {
    id: Option<String>,
    city: Option<String>,
    date_acquired: Option<String>,
    date_disposed: Option<String>,
    fair_market_value: Option<String>,
    gross_income_received: Option<String>,
    nature_of_interest: Option<String>,
    parcel_or_address: Option<String>,
    income_sources: RawIncomeSourceList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIncomeSourceList {
    source: Vec<RawIncomeSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIncomeSource {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleC1List {
    schedule_c_1: Vec<RawScheduleC1>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleC1 {
    id: Option<String>,
    address: RawAddress,
    business_activity: Option<String>,
    business_position: Option<String>,
    gross_income_received_schedule_c_1: Option<String>,
    name_of_income_source: Option<String>,
    reason_for_income: Option<String>,
    reason_for_income_other: Option<String>,
    income_sources: RawIncomeSourceList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleC2List {
    schedule_c_2: Vec<RawScheduleC2>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleC2 {
    id: Option<String>,
    loan: RawLoan,
    loan_security: Option<String>,
    loan_security_real_property_address: Option<RawAddress>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLoan {
    address: RawAddress,
    business_activity: Option<String>,
    has_no_interest_rate: Option<String>,
    highest_balance: Option<String>,
    interest_rate: Option<String>,
    name_of_lender: Option<String>,
    term: Option<String>,
    term_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleDList {
    schedule_d: Vec<RawScheduleD>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleD {
    id: Option<String>,
    address: RawAddress,
    business_activity: Option<String>,
    name_of_source: Option<String>,
    gifts: RawGiftList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGiftList {
    gift: Vec<RawGift>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGift {
    id: Option<String>,
    amount: Option<String>,
    description: Option<String>,
    gift_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleEList {
    schedule_e: Vec<RawScheduleE>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawScheduleE {
    id: Option<String>,
    address: RawAddress,
    amount: Option<String>,
    business_activity: Option<String>,
    end_date: Option<String>,
    is_nonprofit: Option<String>,
    is_other: Option<String>,
    made_speech: Option<String>,
    name_of_source: Option<String>,
    other_description: Option<String>,
    start_date: Option<String>,
    travel_description: Option<String>,
    type_of_payment: Option<String>,
}

// ---------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------

fn text(raw: &Option<String>) -> Option<String> {
    clean_string(raw.as_deref())
}

fn filing_error(filing_id: &str, message: impl Into<String>) -> PipelineError {
    PipelineError::Filing {
        filing_id: filing_id.to_string(),
        message: message.into(),
    }
}

/// Parses a record UUID; a missing or malformed id is fatal to the
/// filing since every dependent row hangs off it.
fn record_id(raw: &Option<String>, what: &str, filing_id: &str) -> Result<Uuid> {
    let cleaned = text(raw)
        .ok_or_else(|| filing_error(filing_id, format!("{what} is missing an id")))?;
    Uuid::parse_str(&cleaned)
        .map_err(|e| filing_error(filing_id, format!("{what} has a malformed id: {e}")))
}

/// Parses one filing document into its record forest.
///
/// Fatal conditions (malformed XML, missing `cover`, missing
/// `report_year`, malformed record ids, out-of-range coded choices)
/// return an error; the caller logs it and moves on to the next filing.
pub fn parse_filing_document(filing_id: &str, raw_xml: &str) -> Result<FilingForest> {
    let raw: RawFiling = quick_xml::de::from_str(raw_xml)?;

    let filing = parse_cover(filing_id, &raw)?;
    let offices = parse_offices(filing_id, &raw)?;
    let schedule_a1 = parse_schedule_a1(filing_id, &raw.schedule_a_1s.schedule_a_1)?;
    let schedule_a2 = parse_schedule_a2(filing_id, &raw.schedule_a_2s.schedule_a_2)?;
    let schedule_b = parse_schedule_b(filing_id, &raw.schedule_bs.schedule_b)?;
    let schedule_c1 = parse_schedule_c1(filing_id, &raw.schedule_c_1s.schedule_c_1)?;
    let schedule_c2 = parse_schedule_c2(filing_id, &raw.schedule_c_2s.schedule_c_2)?;
    let schedule_d = parse_schedule_d(filing_id, &raw.schedule_ds.schedule_d)?;
    let schedule_e = parse_schedule_e(filing_id, &raw.schedule_es.schedule_e)?;

    Ok(FilingForest {
        filing,
        offices,
        schedule_a1,
        schedule_a2,
        schedule_b,
        schedule_c1,
        schedule_c2,
        schedule_d,
        schedule_e,
    })
}

fn parse_cover(filing_id: &str, raw: &RawFiling) -> Result<Filing> {
    let report_year = text(&raw.report_year)
        .ok_or_else(|| filing_error(filing_id, "report_year is missing"))?
        .parse::<i64>()
        .map_err(|e| filing_error(filing_id, format!("report_year is malformed: {e}")))?;

    let cover = raw
        .cover
        .as_ref()
        .ok_or_else(|| filing_error(filing_id, "cover element is missing"))?;

    Ok(Filing {
        id: filing_id.to_string(),
        report_year,
        filer_id: text(&raw.filing_information.filer_id),
        amends: text(&raw.filing_information.amendment_superceded_filing_id),
        date_signed: clean_datetime(text(&cover.verification.date_signed).as_deref()),
        first_name: text(&cover.first_name),
        middle_name: text(&cover.middle_name),
        last_name: text(&cover.last_name),
        comments_schedule_a1: text(&raw.comments_schedule_a1),
        comments_schedule_a2: text(&raw.comments_schedule_a2),
        comments_schedule_b: text(&raw.comments_schedule_b),
        comments_schedule_c: text(&raw.comments_schedule_c),
        comments_schedule_d: text(&raw.comments_schedule_d),
        comments_schedule_e: text(&raw.comments_schedule_e),
    })
}

fn parse_offices(filing_id: &str, raw: &RawFiling) -> Result<Vec<Office>> {
    let elements = match &raw.cover {
        Some(cover) => &cover.offices.office,
        None => return Ok(Vec::new()),
    };

    elements
        .iter()
        .map(|element| {
            Ok(Office {
                id: record_id(&element.id, "office", filing_id)?,
                agency: text(&element.agency),
                division_board_district: text(&element.division_board_district),
                position: text(&element.position),
                is_primary: clean_boolean(text(&element.is_primary).as_deref()),
                election_date: clean_datetime(text(&element.election_date).as_deref()),
                assuming_date: clean_datetime(text(&element.assuming_date).as_deref()),
                leaving_date: clean_datetime(text(&element.leaving_date).as_deref()),
            })
        })
        .collect()
}

fn parse_schedule_a1(filing_id: &str, elements: &[RawScheduleA1]) -> Result<Vec<ScheduleA1>> {
    elements
        .iter()
        .map(|element| {
            Ok(ScheduleA1 {
                id: record_id(&element.id, "schedule_a_1", filing_id)?,
                date_acquired: clean_datetime(text(&element.date_acquired).as_deref()),
                date_disposed: clean_datetime(text(&element.date_disposed).as_deref()),
                name_of_business_entity: text(&element.name_of_business_entity),
                description: text(&element.description),
                fair_market_value: clean_choice(text(&element.fair_market_value).as_deref())?,
                nature_of_investment: clean_choice(text(&element.nature_of_investment).as_deref())?,
                nature_of_investment_other_description: text(
                    &element.nature_of_investment_other_description,
                ),
                partnership_amount: clean_choice(text(&element.partnership_amount).as_deref())?,
            })
        })
        .collect()
}

fn parse_schedule_a2(filing_id: &str, elements: &[RawScheduleA2]) -> Result<Vec<ScheduleA2>> {
    elements
        .iter()
        .map(|element| {
            Ok(ScheduleA2 {
                id: record_id(&element.id, "schedule_a_2", filing_id)?,
                address_city: text(&element.address.city),
                address_state: text(&element.address.state),
                address_zip: text(&element.address.zip),
                business_position: text(&element.business_position),
                date_acquired: clean_datetime(text(&element.date_acquired).as_deref()),
                date_disposed: clean_datetime(text(&element.date_disposed).as_deref()),
                description: text(&element.description),
                entity_name: text(&element.entity_name),
                fair_market_value: clean_choice(
                    text(&element.fair_market_value_schedule_a_2).as_deref(),
                )?,
                gross_income_received: clean_choice(
                    text(&element.gross_income_received).as_deref(),
                )?,
                nature_of_investment: clean_choice(text(&element.nature_of_investment).as_deref())?,
                nature_of_investment_other_description: text(
                    &element.nature_of_investment_other_description,
                ),
            })
        })
        .collect()
}

fn parse_income_sources(
    filing_id: &str,
    elements: &[RawIncomeSource],
) -> Result<Vec<IncomeSource>> {
    elements
        .iter()
        .map(|element| {
            Ok(IncomeSource {
                id: record_id(&element.id, "income source", filing_id)?,
                name: text(&element.name),
            })
        })
        .collect()
}

fn parse_schedule_b(filing_id: &str, elements: &[RawScheduleB]) -> Result<Vec<ScheduleB>> {
    elements
        .iter()
        .map(|element| {
            Ok(ScheduleB {
                id: record_id(&element.id, "schedule_b", filing_id)?,
                city: text(&element.city),
                date_acquired: clean_datetime(text(&element.date_acquired).as_deref()),
                date_disposed: clean_datetime(text(&element.date_disposed).as_deref()),
                fair_market_value: clean_choice(text(&element.fair_market_value).as_deref())?,
                gross_income_received: clean_choice(
                    text(&element.gross_income_received).as_deref(),
                )?,
                nature_of_interest: clean_choice(text(&element.nature_of_interest).as_deref())?,
                parcel_or_address: text(&element.parcel_or_address),
                income_sources: parse_income_sources(filing_id, &element.income_sources.source)?,
            })
        })
        .collect()
}

fn parse_schedule_c1(filing_id: &str, elements: &[RawScheduleC1]) -> Result<Vec<ScheduleC1>> {
    elements
        .iter()
        .map(|element| {
            Ok(ScheduleC1 {
                id: record_id(&element.id, "schedule_c_1", filing_id)?,
                address_city: text(&element.address.city),
                address_state: text(&element.address.state),
                address_zip: text(&element.address.zip),
                business_activity: text(&element.business_activity),
                business_position: text(&element.business_position),
                gross_income_received: clean_choice(
                    text(&element.gross_income_received_schedule_c_1).as_deref(),
                )?,
                name_of_income_source: text(&element.name_of_income_source),
                reason_for_income: clean_choice(text(&element.reason_for_income).as_deref())?,
                reason_for_income_other: text(&element.reason_for_income_other),
                income_sources: parse_income_sources(filing_id, &element.income_sources.source)?,
            })
        })
        .collect()
}

fn parse_schedule_c2(filing_id: &str, elements: &[RawScheduleC2]) -> Result<Vec<ScheduleC2>> {
    elements
        .iter()
        .map(|element| {
            let loan = &element.loan;

            let interest_rate_raw = text(&loan.interest_rate);
            let interest_rate = match interest_rate_raw.as_deref() {
                Some(raw) => {
                    let numeric = RATE_PREFIX
                        .captures(raw)
                        .and_then(|caps| caps.get(1))
                        .ok_or_else(|| {
                            filing_error(
                                filing_id,
                                format!("interest rate {raw:?} has no numeric prefix"),
                            )
                        })?;
                    clean_decimal(clean_string(Some(numeric.as_str())).as_deref())
                }
                None => None,
            };

            let property_address = element
                .loan_security_real_property_address
                .as_ref()
                .ok_or_else(|| {
                    filing_error(
                        filing_id,
                        "loan_security_real_property_address element is missing",
                    )
                })?;

            Ok(ScheduleC2 {
                id: record_id(&element.id, "schedule_c_2", filing_id)?,
                address_city: text(&loan.address.city),
                address_state: text(&loan.address.state),
                address_zip: text(&loan.address.zip),
                business_activity: text(&loan.business_activity),
                has_interest_rate: !clean_boolean(text(&loan.has_no_interest_rate).as_deref()),
                highest_balance: clean_choice(text(&loan.highest_balance).as_deref())?,
                interest_rate,
                interest_rate_raw,
                loan_security: clean_choice(text(&element.loan_security).as_deref())?,
                loan_security_real_property_address_city: text(&property_address.city),
                loan_security_real_property_address_state: text(&property_address.state),
                loan_security_real_property_address_zip: text(&property_address.zip),
                name_of_lender: text(&loan.name_of_lender),
                term: clean_integer(text(&loan.term).as_deref()),
                term_type: text(&loan.term_type).map(|t| t.to_lowercase()),
            })
        })
        .collect()
}

fn parse_schedule_d(filing_id: &str, elements: &[RawScheduleD]) -> Result<Vec<ScheduleD>> {
    elements
        .iter()
        .map(|element| {
            let gifts = element
                .gifts
                .gift
                .iter()
                .map(|gift| {
                    Ok(Gift {
                        id: record_id(&gift.id, "gift", filing_id)?,
                        amount: clean_decimal(text(&gift.amount).as_deref()),
                        description: text(&gift.description),
                        gift_date: clean_datetime(text(&gift.gift_date).as_deref()),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(ScheduleD {
                id: record_id(&element.id, "schedule_d", filing_id)?,
                address_city: text(&element.address.city),
                address_state: text(&element.address.state),
                address_zip: text(&element.address.zip),
                business_activity: text(&element.business_activity),
                name_of_source: text(&element.name_of_source),
                gifts,
            })
        })
        .collect()
}

fn parse_schedule_e(filing_id: &str, elements: &[RawScheduleE]) -> Result<Vec<ScheduleE>> {
    elements
        .iter()
        .map(|element| {
            Ok(ScheduleE {
                id: record_id(&element.id, "schedule_e", filing_id)?,
                address_city: text(&element.address.city),
                address_state: text(&element.address.state),
                address_zip: text(&element.address.zip),
                amount: clean_decimal(text(&element.amount).as_deref()),
                business_activity: text(&element.business_activity),
                end_date: clean_datetime(text(&element.end_date).as_deref()),
                is_nonprofit: clean_boolean(text(&element.is_nonprofit).as_deref()),
                is_other: clean_boolean(text(&element.is_other).as_deref()),
                made_speech: clean_boolean(text(&element.made_speech).as_deref()),
                name_of_source: text(&element.name_of_source),
                other_description: text(&element.other_description),
                start_date: clean_datetime(text(&element.start_date).as_deref()),
                travel_description: text(&element.travel_description),
                type_of_payment: clean_choice(text(&element.type_of_payment).as_deref())?,
            })
        })
        .collect()
}
