use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;
use tempfile::tempdir;

use sei_pipeline::manifest;
use sei_pipeline::netfile::model::ENTITIES;
use sei_pipeline::netfile::parser::parse_filing_document;
use sei_pipeline::netfile::store::Store;
use sei_pipeline::storage::{BlobStorage, InMemoryStorage};
use sei_pipeline::tasks::{self, QueueDispatcher, Task};
use sei_pipeline::warehouse::LocalWarehouse;

const BROOKS_FILING: &str = r#"
<form700_filing>
  <report_year>2019</report_year>
  <filing_information>
    <filer_id>148091</filer_id>
  </filing_information>
  <cover>
    <first_name>Desley</first_name>
    <last_name>Brooks</last_name>
    <offices>
      <office>
        <id>97574a2f-3303-4680-b96b-6266c7d88804</id>
        <agency>City of Oakland</agency>
        <division_board_district>00611 - District Six Unit</division_board_district>
        <position>Council Member</position>
        <is_primary>true</is_primary>
      </office>
    </offices>
    <verification>
      <date_signed>8/12/2019 5:20:48 PM</date_signed>
    </verification>
  </cover>
  <schedule_a_1s>
    <schedule_a_1>
      <id>2fcdab47-276c-477a-82cc-5dcbeb1e8bf8</id>
      <description>Equipment and Technologies</description>
      <name_of_business_entity>Applied Materials</name_of_business_entity>
      <fair_market_value>1</fair_market_value>
      <nature_of_investment>1</nature_of_investment>
    </schedule_a_1>
    <schedule_a_1>
      <id>5a8a4a2e-46a4-4a0a-9a61-111111111111</id>
      <description>Pharmaceuticals</description>
      <name_of_business_entity>Pfizer</name_of_business_entity>
      <fair_market_value>1</fair_market_value>
      <nature_of_investment>1</nature_of_investment>
    </schedule_a_1>
    <schedule_a_1>
      <id>5a8a4a2e-46a4-4a0a-9a61-222222222222</id>
      <description>Banking</description>
      <name_of_business_entity>Wells Fargo</name_of_business_entity>
      <fair_market_value>2</fair_market_value>
      <nature_of_investment>1</nature_of_investment>
    </schedule_a_1>
    <schedule_a_1>
      <id>cc56f9e3-35bc-49f8-9b77-c50c0c8045c4</id>
      <description>Retail</description>
      <name_of_business_entity>Costco</name_of_business_entity>
      <fair_market_value>2</fair_market_value>
      <nature_of_investment>1</nature_of_investment>
    </schedule_a_1>
    <schedule_a_1>
      <id>5a8a4a2e-46a4-4a0a-9a61-333333333333</id>
      <description>Technology</description>
      <name_of_business_entity>Apple</name_of_business_entity>
      <fair_market_value>2</fair_market_value>
      <nature_of_investment>1</nature_of_investment>
    </schedule_a_1>
    <schedule_a_1>
      <id>5a8a4a2e-46a4-4a0a-9a61-444444444444</id>
      <description>Energy</description>
      <name_of_business_entity>Chevron</name_of_business_entity>
      <fair_market_value>3</fair_market_value>
      <nature_of_investment>1</nature_of_investment>
    </schedule_a_1>
  </schedule_a_1s>
</form700_filing>
"#;

const LOAN_FILING: &str = r#"
<form700_filing>
  <report_year>2018</report_year>
  <filing_information>
    <filer_id>148092</filer_id>
  </filing_information>
  <cover>
    <first_name>Sheng</first_name>
    <last_name>Thao</last_name>
  </cover>
  <schedule_c_2s>
    <schedule_c_2>
      <id>d48e2404-38a0-4a5c-aa15-16b556027f0c</id>
      <loan>
        <address>
          <city>walnut creek</city>
          <state>ca</state>
          <zip>94596</zip>
        </address>
        <has_no_interest_rate>false</has_no_interest_rate>
        <highest_balance>4</highest_balance>
        <interest_rate>3.25%</interest_rate>
        <name_of_lender>Chase</name_of_lender>
        <term>10</term>
        <term_type>Year</term_type>
      </loan>
      <loan_security>3</loan_security>
      <loan_security_real_property_address>
        <city>castro valley</city>
        <state>ca</state>
        <zip>94552</zip>
      </loan_security_real_property_address>
    </schedule_c_2>
  </schedule_c_2s>
</form700_filing>
"#;

fn amendment_filing(amends: Option<&str>) -> String {
    let amendment_element = match amends {
        Some(id) => format!("<amendment_superceded_filing_id>{id}</amendment_superceded_filing_id>"),
        None => String::new(),
    };
    format!(
        r#"
<form700_filing>
  <report_year>2018</report_year>
  <filing_information>
    <filer_id>148093</filer_id>
    {amendment_element}
  </filing_information>
  <cover>
    <first_name>Rebecca</first_name>
    <last_name>Kaplan</last_name>
    <offices>
      <office>
        <id>11111111-2222-3333-4444-555555555555</id>
        <agency>City of Oakland</agency>
        <position>Council Member At-Large</position>
        <is_primary>true</is_primary>
      </office>
    </offices>
  </cover>
</form700_filing>
"#
    )
}

fn csv_rows(extract: &str) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_reader(extract.as_bytes());
    reader.records().map(|r| r.unwrap()).collect()
}

fn column_index(extract: &str, name: &str) -> usize {
    let mut reader = csv::Reader::from_reader(extract.as_bytes());
    reader
        .headers()
        .unwrap()
        .iter()
        .position(|h| h == name)
        .unwrap()
}

#[test]
fn parses_and_stores_a_complete_filing() {
    let dir = tempdir().unwrap();
    let mut store = Store::new(dir.path().join("reporting.db"));
    store.rebuild().unwrap();

    let forest = parse_filing_document("182305528", BROOKS_FILING).unwrap();
    assert_eq!(forest.filing.first_name.as_deref(), Some("Desley"));
    assert_eq!(forest.filing.last_name.as_deref(), Some("Brooks"));
    assert_eq!(forest.offices.len(), 1);
    assert_eq!(forest.schedule_a1.len(), 6);

    // 5:20:48 PM Pacific on 2019-08-12 is 00:20:48 UTC the next day.
    let expected_signed = NaiveDate::from_ymd_opt(2019, 8, 13)
        .unwrap()
        .and_hms_opt(0, 20, 48)
        .unwrap()
        .and_utc()
        .timestamp();
    assert_eq!(forest.filing.date_signed, Some(expected_signed));

    store.commit_forest(&forest).unwrap();
    assert_eq!(store.count("filings").unwrap(), 1);
    assert_eq!(store.count("offices").unwrap(), 1);
    assert_eq!(store.count("schedule_a1_attachments").unwrap(), 6);

    let exports = store.export_all().unwrap();
    let (_, a1_extract) = exports
        .iter()
        .find(|(entity, _)| entity.table == "schedule_a1_attachments")
        .unwrap();

    let rows = csv_rows(a1_extract);
    assert_eq!(rows.len(), 6);

    let id_col = column_index(a1_extract, "id");
    let description_col = column_index(a1_extract, "description");
    let fmv_col = column_index(a1_extract, "fair_market_value");
    let nature_col = column_index(a1_extract, "nature_of_investment");
    let acquired_col = column_index(a1_extract, "date_acquired");

    assert_eq!(&rows[0][id_col], "2fcdab47-276c-477a-82cc-5dcbeb1e8bf8");
    assert_eq!(&rows[0][description_col], "Equipment and Technologies");
    assert_eq!(&rows[0][fmv_col], "2000-10000");
    assert_eq!(&rows[0][nature_col], "stock");
    assert_eq!(&rows[0][acquired_col], "");
    assert_eq!(&rows[3][description_col], "Retail");
    assert_eq!(&rows[3][fmv_col], "10001-100000");
}

#[test]
fn extracts_quote_every_field() {
    let dir = tempdir().unwrap();
    let mut store = Store::new(dir.path().join("reporting.db"));
    store.rebuild().unwrap();

    let forest = parse_filing_document("182305528", BROOKS_FILING).unwrap();
    store.commit_forest(&forest).unwrap();

    let exports = store.export_all().unwrap();
    let (_, offices_extract) = exports
        .iter()
        .find(|(entity, _)| entity.table == "offices")
        .unwrap();

    for line in offices_extract.lines() {
        assert!(line.starts_with('"'), "unquoted line: {line}");
        assert!(line.ends_with('"'), "unquoted line: {line}");
    }

    // Booleans export as 0/1, absent values as empty strings.
    let rows = csv_rows(offices_extract);
    let primary_col = column_index(offices_extract, "is_primary");
    let election_col = column_index(offices_extract, "election_date");
    assert_eq!(&rows[0][primary_col], "1");
    assert_eq!(&rows[0][election_col], "");
}

#[test]
fn amendments_link_to_the_filing_they_supersede() {
    let dir = tempdir().unwrap();
    let mut store = Store::new(dir.path().join("reporting.db"));
    store.rebuild().unwrap();

    let original = parse_filing_document("177692551", &amendment_filing(None)).unwrap();
    let amendment =
        parse_filing_document("181517263", &amendment_filing(Some("177692551"))).unwrap();
    assert_eq!(amendment.filing.amends.as_deref(), Some("177692551"));

    store.commit_forest(&original).unwrap();
    store.commit_forest(&amendment).unwrap();
    assert_eq!(store.count("filings").unwrap(), 2);

    let exports = store.export_all().unwrap();
    let (_, filings_extract) = exports
        .iter()
        .find(|(entity, _)| entity.table == "filings")
        .unwrap();
    let rows = csv_rows(filings_extract);
    let id_col = column_index(filings_extract, "id");
    let amends_col = column_index(filings_extract, "amends");

    let amendment_row = rows.iter().find(|r| &r[id_col] == "181517263").unwrap();
    assert_eq!(&amendment_row[amends_col], "177692551");
}

#[test]
fn repeated_offices_are_stored_once() {
    let dir = tempdir().unwrap();
    let mut store = Store::new(dir.path().join("reporting.db"));
    store.rebuild().unwrap();

    // An amendment repeats the original filing's office verbatim.
    let original = parse_filing_document("177692551", &amendment_filing(None)).unwrap();
    let amendment =
        parse_filing_document("181517263", &amendment_filing(Some("177692551"))).unwrap();

    store.commit_forest(&original).unwrap();
    store.commit_forest(&amendment).unwrap();

    assert_eq!(store.count("filings").unwrap(), 2);
    assert_eq!(store.count("offices").unwrap(), 1);
}

#[test]
fn loan_interest_rates_keep_exact_value_and_raw_text() {
    let forest = parse_filing_document("177423011", LOAN_FILING).unwrap();
    assert_eq!(forest.schedule_c2.len(), 1);

    let loan = &forest.schedule_c2[0];
    assert!(loan.has_interest_rate);
    assert_eq!(loan.interest_rate, Some(Decimal::from_str("3.25").unwrap()));
    assert_eq!(loan.interest_rate_raw.as_deref(), Some("3.25%"));
    assert_eq!(loan.highest_balance.map(|c| {
        use sei_pipeline::netfile::vocab::CodedChoice;
        c.as_str()
    }), Some("100000+"));
    assert_eq!(loan.name_of_lender.as_deref(), Some("Chase"));
    assert_eq!(loan.term, Some(10));
    assert_eq!(loan.term_type.as_deref(), Some("year"));
    assert_eq!(loan.loan_security_real_property_address_city.as_deref(), Some("castro valley"));

    let dir = tempdir().unwrap();
    let mut store = Store::new(dir.path().join("reporting.db"));
    store.rebuild().unwrap();
    store.commit_forest(&forest).unwrap();

    let exports = store.export_all().unwrap();
    let (_, c2_extract) = exports
        .iter()
        .find(|(entity, _)| entity.table == "schedule_c2_attachments")
        .unwrap();
    let rows = csv_rows(c2_extract);
    let rate_col = column_index(c2_extract, "interest_rate");
    let raw_col = column_index(c2_extract, "interest_rate_raw");
    assert_eq!(&rows[0][rate_col], "3.25");
    assert_eq!(&rows[0][raw_col], "3.25%");
}

#[tokio::test]
async fn transform_triggers_only_when_the_manifest_is_satisfied() {
    let storage = InMemoryStorage::new();
    let (dispatcher, mut receiver) = QueueDispatcher::new();

    let ids: BTreeSet<String> = ["101", "102", "103"].iter().map(|s| s.to_string()).collect();
    manifest::write_manifest(&storage, "run-1", &ids).await.unwrap();

    storage
        .put(&manifest::xml_key("run-1", "101"), b"<a/>", "text/xml")
        .await
        .unwrap();
    storage
        .put(&manifest::xml_key("run-1", "102"), b"<b/>", "text/xml")
        .await
        .unwrap();
    assert!(!manifest::is_complete(&storage, "run-1").await.unwrap());

    storage
        .put(&manifest::xml_key("run-1", "103"), b"<c/>", "text/xml")
        .await
        .unwrap();
    assert!(manifest::is_complete(&storage, "run-1").await.unwrap());

    // The download handler would dispatch the transform at this point.
    use sei_pipeline::tasks::TaskDispatcher;
    dispatcher.dispatch_transform("run-1").await.unwrap();
    assert_eq!(
        receiver.recv().await,
        Some(Task::Transform {
            run_id: "run-1".to_string()
        })
    );
}

#[tokio::test]
async fn process_run_loads_the_warehouse_end_to_end() {
    let storage = InMemoryStorage::new();
    let ids: BTreeSet<String> = ["182305528", "177423011"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    manifest::write_manifest(&storage, "run-1", &ids).await.unwrap();
    storage
        .put(
            &manifest::xml_key("run-1", "182305528"),
            BROOKS_FILING.as_bytes(),
            "text/xml",
        )
        .await
        .unwrap();
    storage
        .put(
            &manifest::xml_key("run-1", "177423011"),
            LOAN_FILING.as_bytes(),
            "text/xml",
        )
        .await
        .unwrap();

    let dir = tempdir().unwrap();
    let warehouse = LocalWarehouse::new(dir.path().join("warehouse"));
    let mut store = Store::new(dir.path().join("reporting.db"));

    let summary = tasks::process_run(&storage, &warehouse, &mut store, "run-1")
        .await
        .unwrap();
    assert_eq!(summary.parsed, 2);
    assert_eq!(summary.failed_filings, 0);
    assert_eq!(summary.exported_tables, ENTITIES.len());
    assert_eq!(summary.failed_tables, 0);

    // Every table's extract lands in blob storage and the warehouse.
    for entity in ENTITIES {
        let extract = storage
            .get(&manifest::csv_key("run-1", entity.table))
            .await
            .unwrap();
        assert!(extract.is_some(), "missing extract for {}", entity.table);
        assert!(
            dir.path()
                .join("warehouse")
                .join(format!("{}.schema.json", entity.table))
                .exists(),
            "missing schema for {}",
            entity.table
        );
    }

    let filings_csv = storage
        .get(&manifest::csv_key("run-1", "filings"))
        .await
        .unwrap()
        .unwrap();
    let filings_csv = String::from_utf8(filings_csv).unwrap();
    assert_eq!(csv_rows(&filings_csv).len(), 2);
}

#[tokio::test]
async fn process_run_skips_broken_filings_but_keeps_the_rest() {
    let storage = InMemoryStorage::new();
    let ids: BTreeSet<String> = ["182305528", "555"].iter().map(|s| s.to_string()).collect();
    manifest::write_manifest(&storage, "run-1", &ids).await.unwrap();
    storage
        .put(
            &manifest::xml_key("run-1", "182305528"),
            BROOKS_FILING.as_bytes(),
            "text/xml",
        )
        .await
        .unwrap();
    // No report_year, which is fatal to this filing only.
    storage
        .put(
            &manifest::xml_key("run-1", "555"),
            b"<form700_filing><cover><first_name>A</first_name></cover></form700_filing>",
            "text/xml",
        )
        .await
        .unwrap();

    let dir = tempdir().unwrap();
    let warehouse = LocalWarehouse::new(dir.path().join("warehouse"));
    let mut store = Store::new(dir.path().join("reporting.db"));

    let summary = tasks::process_run(&storage, &warehouse, &mut store, "run-1")
        .await
        .unwrap();
    assert_eq!(summary.parsed, 1);
    assert_eq!(summary.failed_filings, 1);
    assert_eq!(store.count("filings").unwrap(), 1);
}
