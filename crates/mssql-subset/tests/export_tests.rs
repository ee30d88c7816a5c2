//! End-to-end export tests against the in-memory provider.
//!
//! Each test writes a profile to a temp directory, runs a full export and
//! checks the generated script.

use std::collections::HashSet;
use std::path::PathBuf;

use mssql_subset::{
    ExportEngine, ExportError, ExportOutcome, ExportRequest, ExportSummary, MemoryProvider,
    MemoryTable, Profile, SqlValue,
};
use tempfile::TempDir;

struct Run {
    _dir: TempDir,
    output_path: PathBuf,
    profile_path: PathBuf,
    result: mssql_subset::Result<ExportOutcome>,
}

async fn run(provider: MemoryProvider, profile: Option<&str>, id: &str, dummy_files: bool) -> Run {
    let dir = TempDir::new().unwrap();
    let profile_path = dir.path().join("profile.json");
    if let Some(profile) = profile {
        std::fs::write(&profile_path, profile).unwrap();
    }
    let output_path = dir.path().join("export.sql");

    let request = ExportRequest {
        output_path: output_path.clone(),
        profile_path: profile_path.clone(),
        entry_point_id: id.to_string(),
        dummy_files,
    };
    let result = ExportEngine::new(provider).export(&request).await;

    Run {
        _dir: dir,
        output_path,
        profile_path,
        result,
    }
}

fn completed(run: &Run) -> (&ExportSummary, String) {
    match &run.result {
        Ok(ExportOutcome::Completed(summary)) => {
            let script = std::fs::read_to_string(&run.output_path).unwrap();
            (summary, script)
        }
        other => panic!("expected a completed export, got {other:?}"),
    }
}

/// INSERT statements of a script, one string per statement.
fn inserts(script: &str) -> Vec<String> {
    let lines: Vec<&str> = script.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with("INSERT INTO"))
        .map(|(i, l)| format!("{}\n{}", l, lines[i + 1]))
        .collect()
}

/// Assert every variable used by an INSERT was defined by an earlier INSERT
/// (or is the statement's own variable).
fn assert_dependency_sound(script: &str) {
    let mut defined: HashSet<String> = HashSet::new();
    for statement in inserts(script) {
        let values = statement.split("VALUES (").nth(1).unwrap();
        let vars: Vec<&str> = values
            .split(|c: char| c == ',' || c == ')' || c == ' ' || c == ';')
            .filter(|t| t.starts_with('@'))
            .collect();
        let own = vars[0].to_string();
        for var in &vars[1..] {
            assert!(
                *var == own || defined.contains(*var),
                "{var} used before it was inserted in:\n{statement}"
            );
        }
        defined.insert(own);
    }
}

// =============================================================================
// Graph walking
// =============================================================================

#[tokio::test]
async fn test_cycle_terminates_with_one_statement_per_row() {
    let provider = MemoryProvider::new()
        .with_table(
            MemoryTable::new("hr", "Employee")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("BuddyId", "varchar")
                .row(vec!["E1".into(), "E2".into()])
                .row(vec!["E2".into(), "E1".into()]),
        )
        .with_foreign_key("[hr].[Employee].[BuddyId]", "[hr].[Employee].[Id]");
    let profile = r#"{
        "Tables": [ { "Name": "[hr].[Employee]", "IsEntryPoint": true, "Export": true } ],
        "ForeignKeys": [ { "Name": "[hr].[Employee].[BuddyId]", "Follow": true, "GoToParent": true } ]
    }"#;

    let run = run(provider, Some(profile), "E1", false).await;
    let (summary, script) = completed(&run);

    assert_eq!(summary.rows_exported, 2);
    assert_eq!(summary.variables_declared, 2);
    assert_eq!(inserts(&script).len(), 2);
    assert!(script.contains("VALUES (@employee0, @employee1);"));
    assert!(script.contains("VALUES (@employee1, @employee0);"));
    // a genuine two-row cycle cannot be fully ordered
    assert_eq!(summary.unresolved_rows, 1);
}

fn shop() -> MemoryProvider {
    MemoryProvider::new()
        .with_table(
            MemoryTable::new("dbo", "Customer")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("Name", "nvarchar")
                .row(vec!["C1".into(), "O'Brien".into()])
                .row(vec!["C2".into(), "Smith".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Order")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CustomerId", "varchar")
                .column("ReferredById", "varchar")
                .row(vec!["A1".into(), "C1".into(), SqlValue::Null])
                .row(vec!["A2".into(), "C2".into(), "C1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "OrderLine")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("OrderId", "varchar")
                .column("ProductId", "varchar")
                .column("Quantity", "int")
                .row(vec!["L1".into(), "A1".into(), "P1".into(), 2.into()])
                .row(vec!["L2".into(), "A1".into(), "P1".into(), 5.into()])
                .row(vec!["L3".into(), "A2".into(), "P1".into(), 1.into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Product")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("Sku", "varchar")
                .row(vec!["P1".into(), "SKU-1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Note")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CustomerId", "varchar")
                .column("Text", "nvarchar")
                .row(vec!["N1".into(), "C1".into(), "call back".into()])
                .row(vec!["N2".into(), "C2".into(), "vip".into()]),
        )
        .with_foreign_key("[dbo].[Order].[CustomerId]", "[dbo].[Customer].[Id]")
        .with_foreign_key("[dbo].[Order].[ReferredById]", "[dbo].[Customer].[Id]")
        .with_foreign_key("[dbo].[OrderLine].[OrderId]", "[dbo].[Order].[Id]")
        .with_foreign_key("[dbo].[OrderLine].[ProductId]", "[dbo].[Product].[Id]")
        .with_foreign_key("[dbo].[Note].[CustomerId]", "[dbo].[Customer].[Id]")
}

const SHOP_PROFILE: &str = r#"{
    "Tables": [
        { "Name": "[dbo].[Order]", "IsEntryPoint": true, "Export": true },
        { "Name": "[dbo].[Customer]", "Export": true },
        { "Name": "[dbo].[OrderLine]", "Export": true },
        { "Name": "[dbo].[Product]", "Export": true },
        { "Name": "[dbo].[Note]", "Export": true }
    ],
    "ForeignKeys": [
        { "Name": "[dbo].[Order].[CustomerId]", "Follow": true, "GoToParent": true },
        { "Name": "[dbo].[Order].[ReferredById]", "Follow": true, "GoToParent": false },
        { "Name": "[dbo].[OrderLine].[OrderId]", "Follow": true, "GoToParent": false },
        { "Name": "[dbo].[OrderLine].[ProductId]", "Follow": true, "GoToParent": true },
        { "Name": "[dbo].[Note].[CustomerId]", "Follow": true, "GoToParent": false }
    ]
}"#;

#[tokio::test]
async fn test_shared_parent_is_exported_once() {
    let run = run(shop(), Some(SHOP_PROFILE), "A1", false).await;
    let (summary, script) = completed(&run);

    let product_inserts = inserts(&script)
        .into_iter()
        .filter(|s| s.starts_with("INSERT INTO [dbo].[Product]"))
        .count();
    assert_eq!(product_inserts, 1);
    assert_eq!(script.matches("declare @product0 ").count(), 1);
    assert!(script.contains("VALUES (@orderLine0, @order0, @product0, 2);"));
    assert!(script.contains("VALUES (@orderLine1, @order0, @product0, 5);"));
    assert_eq!(summary.unresolved_rows, 0);
}

#[tokio::test]
async fn test_children_follow_inbound_keys_but_not_into_entry_table() {
    let run = run(shop(), Some(SHOP_PROFILE), "A1", false).await;
    let (summary, script) = completed(&run);

    // customer C1, order A1, lines L1 and L2, product P1, note N1
    assert_eq!(summary.rows_exported, 6);
    assert!(script.contains("'call back'"));
    assert!(!script.contains("'vip'"));
    // A2 is referred by C1 but belongs to the entry table
    assert!(!script.contains("-- formerly: 'A2'"));
    assert!(!script.contains("-- formerly: 'L3'"));
    assert!(script.contains("VALUES (@customer0, 'O''Brien');"));
    assert_dependency_sound(&script);
}

#[tokio::test]
async fn test_statements_are_reordered_after_their_dependencies() {
    // Entering from the customer reaches the line (through its own key to
    // the customer) before the order it belongs to.
    let provider = MemoryProvider::new()
        .with_table(
            MemoryTable::new("dbo", "Customer")
                .primary_key("Id")
                .column("Id", "varchar")
                .row(vec!["C1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Line")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CustomerId", "varchar")
                .column("OrderId", "varchar")
                .row(vec!["L1".into(), "C1".into(), "A1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Order")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CustomerId", "varchar")
                .row(vec!["A1".into(), "C1".into()]),
        )
        .with_foreign_key("[dbo].[Line].[CustomerId]", "[dbo].[Customer].[Id]")
        .with_foreign_key("[dbo].[Line].[OrderId]", "[dbo].[Order].[Id]")
        .with_foreign_key("[dbo].[Order].[CustomerId]", "[dbo].[Customer].[Id]");
    let profile = r#"{
        "Tables": [
            { "Name": "[dbo].[Customer]", "IsEntryPoint": true, "Export": true },
            { "Name": "[dbo].[Line]", "Export": true },
            { "Name": "[dbo].[Order]", "Export": true }
        ],
        "ForeignKeys": [
            { "Name": "[dbo].[Line].[CustomerId]", "Follow": true, "GoToParent": false },
            { "Name": "[dbo].[Line].[OrderId]", "Follow": true, "GoToParent": false },
            { "Name": "[dbo].[Order].[CustomerId]", "Follow": true, "GoToParent": false }
        ]
    }"#;

    let run = run(provider, Some(profile), "C1", false).await;
    let (summary, script) = completed(&run);

    assert_eq!(summary.rows_exported, 3);
    assert_eq!(summary.unresolved_rows, 0);
    let order = inserts(&script);
    assert!(order[0].starts_with("INSERT INTO [dbo].[Customer]"));
    assert!(order[1].starts_with("INSERT INTO [dbo].[Order]"));
    assert!(order[2].starts_with("INSERT INTO [dbo].[Line]"));
    assert!(!script.contains("-- Warning"));
    assert_dependency_sound(&script);
}

// =============================================================================
// Encoding
// =============================================================================

#[tokio::test]
async fn test_lookup_table_is_referenced_by_subquery() {
    let provider = MemoryProvider::new()
        .with_table(
            MemoryTable::new("dbo", "Invoice")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CurrencyId", "varchar")
                .column("IssuedAt", "datetime2")
                .column("Paid", "bit")
                .row(vec![
                    "I1".into(),
                    "CUR-9".into(),
                    chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                        .unwrap()
                        .and_hms_opt(8, 30, 0)
                        .unwrap()
                        .into(),
                    true.into(),
                ]),
        )
        .with_table(
            MemoryTable::new("dbo", "Currency")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("IsoCode", "varchar")
                .row(vec!["CUR-9".into(), "EUR".into()]),
        )
        .with_foreign_key("[dbo].[Invoice].[CurrencyId]", "[dbo].[Currency].[Id]");
    let profile = r#"{
        "Tables": [
            { "Name": "[dbo].[Invoice]", "IsEntryPoint": true, "Export": true },
            { "Name": "[dbo].[Currency]", "Export": false, "LookupProperty": "IsoCode" }
        ],
        "ForeignKeys": [
            { "Name": "[dbo].[Invoice].[CurrencyId]", "Follow": true, "GoToParent": true }
        ]
    }"#;

    let run = run(provider, Some(profile), "I1", false).await;
    let (summary, script) = completed(&run);

    assert_eq!(summary.rows_exported, 1);
    assert_eq!(
        inserts(&script)[0],
        "INSERT INTO [dbo].[Invoice] ([Id], [CurrencyId], [IssuedAt], [Paid])\n  \
         VALUES (@invoice0, (select [Id] from [dbo].[Currency] where [IsoCode] = 'EUR'), \
         (select convert(datetime2, '2024-03-01T08:30:00')), 1);"
    );
    assert!(!script.contains("CUR-9"));
}

#[tokio::test]
async fn test_lookup_miss_keeps_literal_value() {
    let provider = MemoryProvider::new()
        .with_table(
            MemoryTable::new("dbo", "Invoice")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CurrencyId", "varchar")
                .row(vec!["I1".into(), "CUR-404".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Currency")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("IsoCode", "varchar")
                .row(vec!["CUR-9".into(), "EUR".into()]),
        )
        .with_foreign_key("[dbo].[Invoice].[CurrencyId]", "[dbo].[Currency].[Id]");
    let profile = r#"{
        "Tables": [
            { "Name": "[dbo].[Invoice]", "IsEntryPoint": true, "Export": true },
            { "Name": "[dbo].[Currency]", "Export": false, "LookupProperty": "IsoCode" }
        ],
        "ForeignKeys": [
            { "Name": "[dbo].[Invoice].[CurrencyId]", "Follow": true, "GoToParent": true }
        ]
    }"#;

    let run = run(provider, Some(profile), "I1", false).await;
    let (summary, script) = completed(&run);

    assert_eq!(summary.rows_exported, 1);
    assert_eq!(
        inserts(&script)[0],
        "INSERT INTO [dbo].[Invoice] ([Id], [CurrencyId])\n  VALUES (@invoice0, 'CUR-404');"
    );
    assert!(!script.contains("select [Id] from [dbo].[Currency]"));
}

#[tokio::test]
async fn test_dummy_files_replace_jpeg_content() {
    let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0xAB, 0xCD];
    let provider = || {
        MemoryProvider::new().with_table(
            MemoryTable::new("dbo", "Photo")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("Content", "varbinary")
                .row(vec!["F1".into(), jpeg.clone().into()]),
        )
    };
    let profile = r#"{ "Tables": [ { "Name": "[dbo].[Photo]", "IsEntryPoint": true, "Export": true } ] }"#;

    let plain = run(provider(), Some(profile), "F1", false).await;
    let (_, script) = completed(&plain);
    assert!(script.contains("VALUES (@photo0, 0xFFD8FFE0ABCD);"));

    let dummy = run(provider(), Some(profile), "F1", true).await;
    let (_, script) = completed(&dummy);
    assert!(!script.contains("0xFFD8FFE0ABCD"));
    assert!(script.contains("VALUES (@photo0, 0xFFD8FFE000104A464946"));
    assert!(script.contains("FFD9);"));
}

// =============================================================================
// Unresolved dependencies and failures
// =============================================================================

#[tokio::test]
async fn test_unfollowed_parent_is_reported_as_missing_dependency() {
    let provider = MemoryProvider::new()
        .with_table(
            MemoryTable::new("dbo", "Customer")
                .primary_key("Id")
                .column("Id", "varchar")
                .row(vec!["C1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Order")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CustomerId", "varchar")
                .row(vec!["A1".into(), "C1".into()]),
        )
        .with_foreign_key("[dbo].[Order].[CustomerId]", "[dbo].[Customer].[Id]");
    let profile = r#"{
        "Tables": [
            { "Name": "[dbo].[Order]", "IsEntryPoint": true, "Export": true },
            { "Name": "[dbo].[Customer]", "Export": true }
        ],
        "ForeignKeys": [
            { "Name": "[dbo].[Order].[CustomerId]", "Follow": false, "GoToParent": true }
        ]
    }"#;

    let run = run(provider, Some(profile), "A1", false).await;
    let (summary, script) = completed(&run);

    assert_eq!(summary.rows_exported, 1);
    assert_eq!(summary.unresolved_rows, 1);
    assert_eq!(summary.variables_declared, 2);
    assert!(script.contains("-- formerly: 'C1'"));

    let lines: Vec<&str> = script.lines().collect();
    let warning = lines
        .iter()
        .position(|l| *l == "-- Warning: Missing dependency: @customer0")
        .expect("warning comment");
    assert_eq!(lines[warning + 1], "INSERT INTO [dbo].[Order] ([Id], [CustomerId])");
    assert_eq!(lines.last(), Some(&"END"));
}

#[tokio::test]
async fn test_blocked_parent_is_forced_before_children_waiting_on_it() {
    // The order's rep is exported but its key is not followed, so the order
    // can never be fully satisfied. The line waits only on the order.
    let provider = MemoryProvider::new()
        .with_table(
            MemoryTable::new("dbo", "Customer")
                .primary_key("Id")
                .column("Id", "varchar")
                .row(vec!["C1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Rep")
                .primary_key("Id")
                .column("Id", "varchar")
                .row(vec!["R1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Line")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CustomerId", "varchar")
                .column("OrderId", "varchar")
                .row(vec!["L1".into(), "C1".into(), "A1".into()]),
        )
        .with_table(
            MemoryTable::new("dbo", "Order")
                .primary_key("Id")
                .column("Id", "varchar")
                .column("CustomerId", "varchar")
                .column("RepId", "varchar")
                .row(vec!["A1".into(), "C1".into(), "R1".into()]),
        )
        .with_foreign_key("[dbo].[Line].[CustomerId]", "[dbo].[Customer].[Id]")
        .with_foreign_key("[dbo].[Line].[OrderId]", "[dbo].[Order].[Id]")
        .with_foreign_key("[dbo].[Order].[CustomerId]", "[dbo].[Customer].[Id]")
        .with_foreign_key("[dbo].[Order].[RepId]", "[dbo].[Rep].[Id]");
    let profile = r#"{
        "Tables": [
            { "Name": "[dbo].[Customer]", "IsEntryPoint": true, "Export": true },
            { "Name": "[dbo].[Rep]", "Export": true },
            { "Name": "[dbo].[Line]", "Export": true },
            { "Name": "[dbo].[Order]", "Export": true }
        ],
        "ForeignKeys": [
            { "Name": "[dbo].[Line].[CustomerId]", "Follow": true, "GoToParent": false },
            { "Name": "[dbo].[Line].[OrderId]", "Follow": true, "GoToParent": false },
            { "Name": "[dbo].[Order].[CustomerId]", "Follow": true, "GoToParent": false },
            { "Name": "[dbo].[Order].[RepId]", "Follow": false, "GoToParent": true }
        ]
    }"#;

    let run = run(provider, Some(profile), "C1", false).await;
    let (summary, script) = completed(&run);

    assert_eq!(summary.rows_exported, 3);
    assert_eq!(summary.unresolved_rows, 1);

    let order = inserts(&script);
    assert!(order[0].starts_with("INSERT INTO [dbo].[Customer]"));
    assert!(order[1].starts_with("INSERT INTO [dbo].[Order]"));
    assert!(order[2].starts_with("INSERT INTO [dbo].[Line]"));

    let warnings: Vec<&str> = script
        .lines()
        .filter(|l| l.starts_with("-- Warning"))
        .collect();
    assert_eq!(warnings, vec!["-- Warning: Missing dependency: @rep0"]);
}

#[tokio::test]
async fn test_unsupported_column_type_writes_nothing() {
    let provider = MemoryProvider::new().with_table(
        MemoryTable::new("dbo", "Doc")
            .primary_key("Id")
            .column("Id", "varchar")
            .column("Body", "xml")
            .row(vec!["D1".into(), "<a/>".into()]),
    );
    let profile = r#"{ "Tables": [ { "Name": "[dbo].[Doc]", "IsEntryPoint": true, "Export": true } ] }"#;

    let run = run(provider, Some(profile), "D1", false).await;
    match &run.result {
        Err(ExportError::UnsupportedColumnType {
            column, data_type, ..
        }) => {
            assert_eq!(column, "Body");
            assert_eq!(data_type, "xml");
        }
        other => panic!("expected UnsupportedColumnType, got {other:?}"),
    }
    assert!(!run.output_path.exists());
}

#[tokio::test]
async fn test_invalid_profile_fails_before_export() {
    let profile = r#"{ "Tables": [ { "Name": "[dbo].[Order]", "Export": true } ] }"#;
    let run = run(shop(), Some(profile), "A1", false).await;

    assert!(matches!(run.result, Err(ExportError::Config(_))));
    assert!(!run.output_path.exists());
}

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test]
async fn test_missing_profile_is_bootstrapped() {
    let run = run(shop(), None, "A1", false).await;

    match &run.result {
        Ok(ExportOutcome::NeedsConfiguration {
            tables,
            foreign_keys,
            ..
        }) => {
            assert_eq!(*tables, 5);
            assert_eq!(*foreign_keys, 5);
        }
        other => panic!("expected NeedsConfiguration, got {other:?}"),
    }
    assert!(!run.output_path.exists());

    let content = std::fs::read_to_string(&run.profile_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    let tables = json["Tables"].as_array().unwrap();
    assert_eq!(tables.len(), 5);
    assert!(tables.iter().all(|t| t["Export"] == false && t["IsEntryPoint"] == false));
    let fks = json["ForeignKeys"].as_array().unwrap();
    assert!(fks
        .iter()
        .all(|fk| fk["Follow"] == true && fk["GoToParent"] == false));
    assert!(fks
        .iter()
        .any(|fk| fk["Name"] == "[dbo].[OrderLine].[ProductId]"));

    // no entry point yet, so the bootstrap profile is not runnable as is
    assert!(Profile::load(&run.profile_path).is_err());
}
