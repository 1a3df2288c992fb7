// Regression tests: the CLI surfaces, driven through the real binary.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

#[test]
fn calc_evaluates_with_precedence_and_exits() {
    let mut cmd = Command::cargo_bin("weft").unwrap();
    cmd.arg("calc").write_stdin("3 + 5 * 2\n(3 + 5) * 2\nq\n");
    cmd.assert()
        .success()
        .stdout(contains("13").and(contains("16")));
}

#[test]
fn check_reports_compiled_rule_counts() {
    let path = "tests/tmp_check.tokens";
    fs::write(path, "word = {'a'..'z'}+; root = word;").unwrap();

    let mut cmd = Command::cargo_bin("weft").unwrap();
    cmd.arg("check").arg(path);
    cmd.assert().success().stdout(contains("ok"));

    let _ = fs::remove_file(path);
}

#[test]
fn check_renders_miette_diagnostics_on_bad_scripts() {
    let path = "tests/tmp_bad.tokens";
    fs::write(path, "word = 'unterminated;").unwrap();

    let mut cmd = Command::cargo_bin("weft").unwrap();
    cmd.arg("check").arg(path);
    cmd.assert().failure().stderr(contains("weft::compile"));

    let _ = fs::remove_file(path);
}

#[test]
fn tokens_dumps_a_stream_as_json() {
    let tokens = "tests/tmp_dump.tokens";
    let input = "tests/tmp_dump.txt";
    fs::write(
        tokens,
        "-a ws = ' '+; word = {'a'..'z'}+; root = ws | word;",
    )
    .unwrap();
    fs::write(input, "hello world").unwrap();

    let mut cmd = Command::cargo_bin("weft").unwrap();
    cmd.arg("tokens").arg(tokens).arg(input).arg("--json");
    cmd.assert()
        .success()
        .stdout(contains("\"name\": \"word\"").and(contains("\"text\": \"hello\"")));

    let _ = fs::remove_file(tokens);
    let _ = fs::remove_file(input);
}

#[test]
fn parse_prints_the_annotation_tree() {
    let tokens = "tests/tmp_parse.tokens";
    let grammar = "tests/tmp_parse.grammar";
    let input = "tests/tmp_parse.txt";
    fs::write(
        tokens,
        "-a ws = ' '+; word = {'a'..'z'}+; eq = '='; root = ws | word | eq;",
    )
    .unwrap();
    fs::write(grammar, "root = word, '=', word;").unwrap();
    fs::write(input, "left = right").unwrap();

    let mut cmd = Command::cargo_bin("weft").unwrap();
    cmd.arg("parse").arg(tokens).arg(grammar).arg(input);
    cmd.assert().success().stdout(contains("root"));

    let _ = fs::remove_file(tokens);
    let _ = fs::remove_file(grammar);
    let _ = fs::remove_file(input);
}

#[test]
fn codegen_emits_rule_id_constants() {
    let tokens = "tests/tmp_gen.tokens";
    let grammar = "tests/tmp_gen.grammar";
    fs::write(tokens, "num = {'0'..'9'}+; root = num;").unwrap();
    fs::write(grammar, "root = num, num;").unwrap();

    let mut cmd = Command::cargo_bin("weft").unwrap();
    cmd.arg("codegen").arg(tokens).arg(grammar);
    cmd.assert()
        .success()
        .stdout(contains("pub mod syntax_ids").and(contains("pub const NUM: usize =")));

    let _ = fs::remove_file(tokens);
    let _ = fs::remove_file(grammar);
}
