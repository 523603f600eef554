use crate::diagnostic::Span;
use crate::interpreter::environment::Environment;
use crate::interpreter::tree_walker::{Interpreter, RuntimeError};
use crate::interpreter::value::{self, Number, OperationError, Value};
use strum::IntoEnumIterator;

/// The callables every fresh environment starts with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::EnumIter, strum_macros::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BuiltIn {
    Print,
    PrintRet,
    Input,
    InputInt,
    Clear,
    IsNum,
    IsStr,
    IsList,
    IsFun,
    Append,
    Pop,
    Extend,
    Len,
    Run,
}

/// Build a new environment holding the global constants and the built-in functions.
///
/// Every call returns an independent environment: nothing is shared between the instances.
pub fn global_environment() -> Environment {
    let mut environment = Environment::new();
    environment.define("NULL".into(), Value::Null);
    environment.define("TRUE".into(), Value::from(true));
    environment.define("FALSE".into(), Value::from(false));
    environment.define(
        "MATH_PI".into(),
        Value::Number(Number::Float(std::f64::consts::PI)),
    );
    for builtin in BuiltIn::iter() {
        environment.define(builtin.to_string(), Value::BuiltIn(builtin));
    }
    environment
}

impl BuiltIn {
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            BuiltIn::Print | BuiltIn::PrintRet => &["value"],
            BuiltIn::Input | BuiltIn::InputInt | BuiltIn::Clear => &[],
            BuiltIn::IsNum | BuiltIn::IsStr | BuiltIn::IsList | BuiltIn::IsFun => &["value"],
            BuiltIn::Append => &["list", "value"],
            BuiltIn::Pop => &["list", "index"],
            BuiltIn::Extend => &["listA", "listB"],
            BuiltIn::Len => &["list"],
            BuiltIn::Run => &["fn"],
        }
    }

    /// Invoke the built-in. The caller has already checked the number of arguments.
    pub(in crate::interpreter) fn call(
        self,
        interpreter: &mut Interpreter,
        environment: &mut Environment,
        arguments: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let mut arguments = arguments.into_iter();
        let mut next = || arguments.next().unwrap_or(Value::Null);
        match self {
            BuiltIn::Print => {
                // One byte past what fits is enough for `print` to refuse it.
                let room = interpreter.console().remaining();
                let text = next().to_bounded_string(room.saturating_add(1));
                interpreter
                    .console()
                    .print(&text)
                    .map_err(|e| interpreter.error(span, e.to_string()))?;
                Ok(Value::Null)
            }
            BuiltIn::PrintRet => {
                // Text cut short is longer than the limit, so `reserve` rejects it.
                let max_len = interpreter.meter().max_collection_len();
                let text = next().to_bounded_string(max_len);
                value::reserve(interpreter.meter(), text.len(), text.len())
                    .map_err(|e| interpreter.error(span, e.to_string()))?;
                Ok(Value::from(text))
            }
            BuiltIn::Input => match interpreter.console().read_line() {
                Some(line) => Ok(Value::from(line)),
                None => {
                    interpreter
                        .console()
                        .warn("INPUT: no input left, using an empty string");
                    Ok(Value::from(""))
                }
            },
            BuiltIn::InputInt => loop {
                let Some(line) = interpreter.console().read_line() else {
                    return Err(interpreter.error(span, "INPUT_INT: no input left"));
                };
                match line.trim().parse::<i64>() {
                    Ok(n) => return Ok(Value::from(n)),
                    Err(_) => interpreter
                        .console()
                        .print(&format!("'{line}' must be an integer. Try again!"))
                        .map_err(|e| interpreter.error(span, e.to_string()))?,
                }
            },
            BuiltIn::Clear => {
                interpreter.console().clear();
                Ok(Value::Null)
            }
            BuiltIn::IsNum => Ok(Value::from(matches!(next(), Value::Number(_)))),
            BuiltIn::IsStr => Ok(Value::from(matches!(next(), Value::String(_)))),
            BuiltIn::IsList => Ok(Value::from(matches!(next(), Value::List(_)))),
            BuiltIn::IsFun => Ok(Value::from(matches!(
                next(),
                Value::Function(_) | Value::BuiltIn(_)
            ))),
            BuiltIn::Append => {
                let Value::List(list) = next() else {
                    return Err(interpreter.error(span, "First argument must be list"));
                };
                let element = next();
                let mut elements = list.borrow_mut();
                value::reserve_growth(interpreter.meter(), elements.len() + 1, 1)
                    .map_err(|e| interpreter.error(span, e.to_string()))?;
                elements.push(element);
                Ok(Value::Null)
            }
            BuiltIn::Pop => {
                let Value::List(list) = next() else {
                    return Err(interpreter.error(span, "First argument must be list"));
                };
                let Value::Number(Number::Int(index)) = next() else {
                    return Err(interpreter.error(span, "Second argument must be number"));
                };
                let mut elements = list.borrow_mut();
                match value::resolve_index(elements.len(), index) {
                    Some(index) => Ok(elements.remove(index)),
                    None => Err(interpreter.error(
                        span,
                        OperationError::RemovalOutOfBounds.to_string(),
                    )),
                }
            }
            BuiltIn::Extend => {
                let Value::List(target) = next() else {
                    return Err(interpreter.error(span, "First argument must be list"));
                };
                let Value::List(source) = next() else {
                    return Err(interpreter.error(span, "Second argument must be list"));
                };
                // Copy first: `EXTEND(a, a)` borrows the same list twice.
                let extra = source.borrow().clone();
                let mut elements = target.borrow_mut();
                value::reserve_growth(
                    interpreter.meter(),
                    elements.len() + extra.len(),
                    extra.len(),
                )
                .map_err(|e| interpreter.error(span, e.to_string()))?;
                elements.extend(extra);
                Ok(Value::Null)
            }
            BuiltIn::Len => match next() {
                Value::List(list) => {
                    let len = list.borrow().len();
                    Ok(Value::from(i64::try_from(len).unwrap_or(i64::MAX)))
                }
                _ => Err(interpreter.error(span, "Argument must be list")),
            },
            BuiltIn::Run => match next() {
                Value::String(name) => interpreter.run_script(&name, environment, span),
                _ => Err(interpreter.error(span, "Argument must be string")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{global_environment, BuiltIn};
    use strum::IntoEnumIterator;

    #[test]
    fn builtins_are_registered_under_their_screaming_names() {
        let names: Vec<_> = BuiltIn::iter().map(|b| b.to_string()).collect();
        assert_eq!(
            names,
            [
                "PRINT",
                "PRINT_RET",
                "INPUT",
                "INPUT_INT",
                "CLEAR",
                "IS_NUM",
                "IS_STR",
                "IS_LIST",
                "IS_FUN",
                "APPEND",
                "POP",
                "EXTEND",
                "LEN",
                "RUN"
            ]
        );
    }

    #[test]
    fn global_environment_holds_the_registry() {
        let environment = global_environment();
        for name in ["NULL", "TRUE", "FALSE", "MATH_PI", "PRINT", "RUN"] {
            assert!(environment.get_value(name).is_some(), "{name} is missing");
        }
        assert_eq!(environment.get_value("TRUE").unwrap().to_string(), "1");
        assert!(environment.get_value("UNDEFINED").is_none());
    }
}
