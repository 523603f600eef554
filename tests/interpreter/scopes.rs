use crate::helpers::{execute, execute_err};
use insta::assert_snapshot;

#[test]
fn function_scopes_shadow_and_restore() {
    let source = r#"VAR a = "global"
FUN f()
    VAR a = "local"
    PRINT(a)
END
f()
PRINT(a)"#;
    let output = execute(source);
    assert_snapshot!(output, @r###"
    local
    global

    global, <function f>
    "###);
}

#[test]
fn parameters_shadow_outer_variables() {
    let source = r#"VAR x = "outer"
FUN f(x) -> x
f("argument") + " " + x"#;
    assert_eq!(execute(source), "outer, <function f>, argument outer");
}

#[test]
fn loop_variables_live_in_the_enclosing_scope() {
    assert_eq!(execute("FOR i = 0 TO 3 THEN\nEND\ni"), "2");
}

#[test]
fn executions_do_not_share_variables() {
    assert_eq!(execute("VAR x = 1"), "1");
    let output = execute_err("x");
    assert!(output.contains("'x' is not defined"), "{output}");
}

#[test]
fn redefined_builtins_do_not_leak_into_later_executions() {
    assert_eq!(execute("VAR PRINT = 5\nPRINT"), "5, 5");
    assert_eq!(execute("PRINT(\"still a function\")"), "still a function\n");
}
