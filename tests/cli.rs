mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;

fn tabload() -> Command {
    let mut cmd = Command::cargo_bin("tabload").expect("binary exists");
    cmd.env_remove("TABLOAD_DATABASE_URL")
        .env_remove("TABLOAD_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn probe_prints_column_types_and_ddl() {
    let ws = TestWorkspace::new();
    let path = ws.write("orders.csv", "id,amount,label\n1,2.50,alpha\n2,,beta\n");

    tabload()
        .args(["probe", "-i", path.to_str().unwrap(), "-t", "orders"])
        .assert()
        .success()
        .stdout(contains("DECIMAL(18,2)"))
        .stdout(contains("2 data row(s)"))
        .stdout(contains("CREATE TABLE `orders`"));
}

#[test]
fn probe_json_is_machine_readable() {
    let ws = TestWorkspace::new();
    let path = ws.write("orders.csv", "id,label\n1,alpha\n");

    let output = tabload()
        .args(["probe", "-i", path.to_str().unwrap(), "--json"])
        .output()
        .expect("run probe");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(report["table"], "imported");
    assert_eq!(report["rows"], 1);
    assert_eq!(report["columns"][0]["name"], "id");
    assert_eq!(report["columns"][0]["inferred"]["kind"], "integer");
}

#[test]
fn sheets_lists_workbook_sheets_in_order() {
    let ws = TestWorkspace::new();
    let path = ws.write_workbook("book.xlsx", |wb| {
        wb.add_worksheet().set_name("Orders").unwrap();
        wb.add_worksheet().set_name("Customers").unwrap();
    });

    tabload()
        .args(["sheets", "-i", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("Orders\nCustomers\n");
}

#[test]
fn dry_run_import_reports_the_summary() {
    let ws = TestWorkspace::new();
    let path = ws.write("people.csv", "id,name\n1,Ada\n2,Grace\n3,Linus\n");

    tabload()
        .args([
            "import",
            "-i",
            path.to_str().unwrap(),
            "-t",
            "people",
            "--batch-size",
            "2",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(contains("Import completed: 3 of 3 row(s) imported into people"))
        .stdout(contains("2 commit(s)"));
}

#[test]
fn dry_run_import_json_summary() {
    let ws = TestWorkspace::new();
    let path = ws.write("people.csv", "id,name\n1,Ada\n");

    let output = tabload()
        .args([
            "import",
            "-i",
            path.to_str().unwrap(),
            "-t",
            "people",
            "--dry-run",
            "--json",
        ])
        .output()
        .expect("run import");
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["load"]["succeeded"], 1);
    assert_eq!(summary["action"], "create");
}

#[test]
fn settings_file_supplies_the_table_name() {
    let ws = TestWorkspace::new();
    let path = ws.write("people.csv", "id\n1\n");
    let settings = ws.write("import.yml", "table_name: staff\nbatch_size: 10\n");

    tabload()
        .args([
            "import",
            "-i",
            path.to_str().unwrap(),
            "--settings",
            settings.to_str().unwrap(),
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(contains("imported into staff"));
}

#[test]
fn invalid_column_names_fail_the_import() {
    let ws = TestWorkspace::new();
    let path = ws.write("bad.csv", "id,first name\n1,Ada\n");

    tabload()
        .args(["import", "-i", path.to_str().unwrap(), "-t", "people", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("invalid identifier 'first name'"));
}

#[test]
fn normalized_headers_make_names_valid() {
    let ws = TestWorkspace::new();
    let path = ws.write("bad.csv", "id,First Name\n1,Ada\n");

    tabload()
        .args([
            "import",
            "-i",
            path.to_str().unwrap(),
            "-t",
            "people",
            "--normalize-headers",
            "--dry-run",
        ])
        .assert()
        .success();
}

#[test]
fn unsupported_formats_are_rejected() {
    let ws = TestWorkspace::new();
    let path = ws.write("notes.pdf", "id\n1\n");

    tabload()
        .args(["probe", "-i", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("unsupported input format"));
}

#[test]
fn import_without_a_database_needs_connection_details() {
    let ws = TestWorkspace::new();
    let path = ws.write("people.csv", "id\n1\n");

    tabload()
        .args(["import", "-i", path.to_str().unwrap(), "-t", "people"])
        .assert()
        .failure();
}
