use crate::helpers::execute;
use insta::assert_snapshot;

#[test]
fn two_branch_conditional_works() {
    let source = r#"IF 3 > 5 THEN
    PRINT(TRUE)
ELSE
    PRINT(FALSE)
END"#;
    let output = execute(source);
    assert_snapshot!(output, @r###"
    0
    "###);
}

#[test]
fn single_line_conditional_is_an_expression() {
    assert_eq!(execute(r#"IF 5 > 2 THEN "yes" ELSE "no""#), "yes");
    assert_eq!(execute(r#"IF 0 THEN "yes""#), "Execution completed with no explicit output.");
}

#[test]
fn elif_chain_picks_the_first_true_branch() {
    let source = r#"VAR grade = 75
IF grade >= 90 THEN
    PRINT("A")
ELIF grade >= 70 THEN
    PRINT("B")
ELSE
    PRINT("C")
END"#;
    let output = execute(source);
    // `VAR` evaluates to the assigned value, which shows up as the program's result.
    assert_snapshot!(output, @r###"
    B

    75
    "###);
}

#[test]
fn while_works() {
    let source = r#"VAR i = 0
WHILE i < 2 THEN
    PRINT(i)
    VAR i = i + 1
END"#;
    let output = execute(source);
    assert_snapshot!(output, @r###"
    0
    1

    0
    "###);
}

#[test]
fn single_line_loops_collect_their_values() {
    assert_eq!(execute("FOR i = 0 TO 5 THEN i * 2"), "0, 2, 4, 6, 8");
    assert_eq!(execute("FOR i = 3 TO 0 STEP -1 THEN i"), "3, 2, 1");
    assert_eq!(execute("VAR n = 0; WHILE n < 3 THEN VAR n = n + 1"), "0, 1, 2, 3");
}

#[test]
fn break_and_continue_work() {
    let source = r#"FOR i = 0 TO 10 THEN
    IF i == 2 THEN CONTINUE
    IF i == 4 THEN BREAK
    PRINT(i)
END"#;
    let output = execute(source);
    assert_snapshot!(output, @r###"
    0
    1
    3
    "###);
}

#[test]
fn logical_operators_short_circuit() {
    // `missing` is never evaluated.
    assert_eq!(execute("0 AND missing"), "0");
    assert_eq!(execute("1 OR missing"), "1");
    assert_eq!(execute("NOT 0 AND 2"), "1");
}
