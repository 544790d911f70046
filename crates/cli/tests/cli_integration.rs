use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const RUN_SCHEMA: &str = r#"{
    "name": "tool",
    "global": [
        { "kind": "flag", "names": ["-y", "--yes"] }
    ],
    "commands": [
        {
            "name": "run",
            "aliases": ["r"],
            "options": [
                { "kind": "flag", "names": ["-v", "--verbose"] },
                { "kind": "key", "names": ["-n", "--times"], "type": "integer",
                  "validators": [{ "greater-than": 0 }] }
            ],
            "params": [{ "name": "executable" }],
            "collected": { "name": "args" }
        },
        {
            "name": "log",
            "options": [
                { "kind": "counter", "names": ["-v"] },
                { "kind": "key", "names": ["-f", "--file"], "variadic": true },
                { "kind": "flag", "names": ["--json"] },
                { "kind": "flag", "names": ["--plain"] }
            ],
            "groups": [
                { "name": "format", "kind": "at-most-one", "members": ["--json", "--plain"] }
            ]
        }
    ]
}"#;

fn optmatch_cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_optmatch-cli"))
}

fn write_schema(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("schema.json");
    fs::write(&path, content).expect("failed to write schema");
    path
}

fn run_match(schema: &Path, extra: &[&str], args: &[&str]) -> Output {
    optmatch_cli()
        .arg("match")
        .arg("--schema")
        .arg(schema)
        .args(extra)
        .arg("--")
        .args(args)
        .output()
        .expect("failed to run optmatch-cli match")
}

fn report(out: &Output) -> Value {
    assert!(
        out.status.success(),
        "optmatch-cli match failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    serde_json::from_slice(&out.stdout).expect("stdout is not JSON")
}

#[test]
fn help_works() {
    let out = optmatch_cli()
        .arg("--help")
        .output()
        .expect("failed to run optmatch-cli --help");
    assert!(
        out.status.success(),
        "optmatch-cli --help failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("match") && stdout.contains("check"),
        "unexpected help output:\n{stdout}"
    );
}

#[test]
fn match_prints_bound_values() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let schema = write_schema(&dir, RUN_SCHEMA);

    let out = run_match(&schema, &[], &["-y", "r", "-v", "-n", "3", "cli", "-x", "arg"]);
    let json = report(&out);
    assert_eq!(json["command"], "run");
    assert_eq!(json["global"]["--yes"], true);
    assert_eq!(json["options"]["--verbose"], true);
    assert_eq!(json["options"]["--times"], 3);
    assert_eq!(json["options"]["executable"], "cli");
    assert_eq!(json["options"]["args"], serde_json::json!(["-x", "arg"]));
}

#[test]
fn options_after_collected_switch() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let schema = write_schema(&dir, RUN_SCHEMA);

    let json = report(&run_match(&schema, &[], &["run", "cli", "-v", "arg"]));
    assert_eq!(json["options"]["--verbose"], false);
    assert_eq!(json["options"]["args"], serde_json::json!(["-v", "arg"]));

    let json = report(&run_match(
        &schema,
        &["--options-after-collected"],
        &["run", "cli", "-v", "arg"],
    ));
    assert_eq!(json["options"]["--verbose"], true);
    assert_eq!(json["options"]["args"], serde_json::json!(["arg"]));
}

#[test]
fn counters_and_variadic_keys() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let schema = write_schema(&dir, RUN_SCHEMA);

    let json = report(&run_match(
        &schema,
        &[],
        &["log", "-vv", "-f", "a.log", "--file=b.log", "-v"],
    ));
    assert_eq!(json["options"]["-v"], 3);
    assert_eq!(json["options"]["--file"], serde_json::json!(["a.log", "b.log"]));
    assert_eq!(json["options"]["--json"], false);
}

#[test]
fn parse_errors_exit_with_status_two() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let schema = write_schema(&dir, RUN_SCHEMA);

    let cases: [(&[&str], &str); 5] = [
        (&["run", "-q", "cli"], "unrecognized option: -q"),
        (&["run", "-n"], "expected a value after -n"),
        (&["run", "-n", "0", "cli"], "must be greater than 0"),
        (&["run"], "missing required argument: <executable>"),
        (&["log", "--json", "--plain"], "group 'format'"),
    ];
    for (args, expected) in cases {
        let out = run_match(&schema, &[], args);
        assert_eq!(out.status.code(), Some(2), "{args:?}");
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(stderr.contains(expected), "{args:?}: unexpected stderr:\n{stderr}");
        assert!(out.stdout.is_empty(), "{args:?}: nothing is printed on failure");
    }
}

#[test]
fn check_lists_commands() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let schema = write_schema(&dir, RUN_SCHEMA);

    let out = optmatch_cli()
        .arg("check")
        .arg("--schema")
        .arg(&schema)
        .output()
        .expect("failed to run optmatch-cli check");
    assert!(
        out.status.success(),
        "optmatch-cli check failed:\nstderr:\n{}",
        String::from_utf8_lossy(&out.stderr),
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("run -v --verbose -n --times"), "{stdout}");
    assert!(stdout.contains("log -v -f --file --json --plain"), "{stdout}");
}

#[test]
fn check_rejects_bad_declarations() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let schema = write_schema(
        &dir,
        r#"{ "name": "tool", "commands": [
            { "name": "run", "options": [{ "kind": "flag", "names": ["verbose"] }] }
        ] }"#,
    );

    let out = optmatch_cli()
        .arg("check")
        .arg("--schema")
        .arg(&schema)
        .output()
        .expect("failed to run optmatch-cli check");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid option identifier 'verbose'"), "{stderr}");
}
