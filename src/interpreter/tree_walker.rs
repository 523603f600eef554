use crate::diagnostic::{self, SourceFile, Span};
use crate::interpreter::budget::{BudgetExceeded, ExecutionBudget, Meter};
use crate::interpreter::console::Console;
use crate::interpreter::environment::Environment;
use crate::interpreter::stack::ensure_sufficient_stack;
use crate::interpreter::value::{self, Function, Number, Value};
use crate::parser::ast::{
    BinaryNode, BinaryOperator, CallNode, ForNode, FunctionDefinitionNode, IfNode, ListNode,
    Literal, Node, Program, ReturnNode, StatementsNode, VariableAccessNode,
    VariableAssignmentNode, WhileNode,
};
use crate::parser::parse;
use crate::paths;
use crate::scanner::tokenize;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

/// The name of the outermost frame in tracebacks.
pub const PROGRAM_CONTEXT: &str = "<program>";

/// Values quoted in error messages are cut short after this many bytes.
const QUOTED_VALUE_BYTES: usize = 200;

/// Where a program runs: the name shown in tracebacks and the variables it can see.
pub struct Context<'env> {
    pub display_name: String,
    pub environment: &'env mut Environment,
}

impl<'env> Context<'env> {
    pub fn new(display_name: impl Into<String>, environment: &'env mut Environment) -> Self {
        Self {
            display_name: display_name.into(),
            environment,
        }
    }
}

/// A call frame, kept around to render tracebacks.
#[derive(Debug)]
struct Frame {
    name: String,
    file: Arc<SourceFile>,
    /// Where the frame was entered from, in the caller's file.
    /// `None` for the outermost frame of a program.
    entry: Option<Span>,
}

pub struct Interpreter<'io> {
    console: &'io mut Console,
    budget: ExecutionBudget,
    scripts: Option<PathBuf>,
    meter: Meter,
    frame: Frame,
    callers: Vec<Frame>,
}

impl<'io> Interpreter<'io> {
    /// `scripts` is the directory `RUN` loads programs from; `RUN` is disabled without it.
    pub fn new(
        console: &'io mut Console,
        budget: ExecutionBudget,
        scripts: Option<PathBuf>,
    ) -> Self {
        let meter = Meter::start(&budget);
        Self {
            console,
            budget,
            scripts,
            meter,
            frame: Frame {
                name: PROGRAM_CONTEXT.into(),
                file: SourceFile::new("", ""),
                entry: None,
            },
            callers: vec![],
        }
    }

    /// Evaluate a whole program.
    ///
    /// The result is the list of the values of its top-level statements, or the value passed
    /// to a top-level `RETURN`.
    pub fn evaluate(
        &mut self,
        program: &Program,
        context: &mut Context<'_>,
    ) -> Result<Value, RuntimeError> {
        let frame = Frame {
            name: context.display_name.clone(),
            file: Arc::clone(&program.file),
            entry: None,
        };
        let environment = &mut *context.environment;
        self.with_frame(frame, |interpreter| {
            let outcome = interpreter.eval(&program.root, environment);
            interpreter.settle(outcome)
        })
    }

    pub(in crate::interpreter) fn console(&mut self) -> &mut Console {
        &mut *self.console
    }

    pub(in crate::interpreter) fn meter(&mut self) -> &mut Meter {
        &mut self.meter
    }

    /// Evaluate `node`. Every nested evaluation goes through here: this is where the step
    /// and depth budgets are enforced and where the native stack is grown.
    fn eval(&mut self, node: &Node, environment: &mut Environment) -> Result<Value, Unwind> {
        self.meter
            .tick()
            .and_then(|()| self.meter.descend())
            .map_err(|e| self.error(node.span(), e.to_string()))?;
        let outcome = ensure_sufficient_stack(|| self.eval_node(node, environment));
        self.meter.ascend();
        outcome
    }

    fn eval_node(&mut self, node: &Node, environment: &mut Environment) -> Result<Value, Unwind> {
        match node {
            Node::Literal(literal) => Ok(match &literal.value {
                Literal::Int(n) => Value::Number(Number::Int(*n)),
                Literal::Float(n) => Value::Number(Number::Float(*n)),
                Literal::String(s) => Value::String(Rc::clone(s)),
            }),
            Node::List(ListNode { elements, span }) => {
                value::reserve_slots(&mut self.meter, elements.len())
                    .map_err(|e| self.error(*span, e.to_string()))?;
                let values = elements
                    .iter()
                    .map(|element| self.eval(element, environment))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::tracked_list(values, &mut self.meter))
            }
            Node::Statements(StatementsNode { statements, .. }) => {
                let mut values = Vec::with_capacity(statements.len());
                for statement in statements {
                    values.push(self.eval(statement, environment)?);
                }
                Ok(Value::tracked_list(values, &mut self.meter))
            }
            Node::VariableAccess(VariableAccessNode { name, span }) => environment
                .get_value(name)
                .ok_or_else(|| self.error(*span, format!("'{name}' is not defined")).into()),
            Node::VariableAssignment(VariableAssignmentNode { name, value, .. }) => {
                let value = self.eval(value, environment)?;
                environment.define(name.clone(), value.clone());
                Ok(value)
            }
            Node::Binary(binary) => self.binary(binary, environment),
            Node::Unary(unary) => {
                let operand = self.eval(&unary.operand, environment)?;
                value::unary_operation(unary.operator, &operand)
                    .map_err(|e| self.error(unary.span, e.to_string()).into())
            }
            Node::If(node) => self.if_expression(node, environment),
            Node::For(node) => self.for_loop(node, environment),
            Node::While(node) => self.while_loop(node, environment),
            Node::FunctionDefinition(definition) => {
                let FunctionDefinitionNode {
                    name,
                    parameters,
                    body,
                    auto_return,
                    ..
                } = definition;
                let function = Value::Function(Rc::new(Function {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: Rc::clone(body),
                    auto_return: *auto_return,
                    file: Arc::clone(&self.frame.file),
                }));
                if let Some(name) = name {
                    environment.define(name.clone(), function.clone());
                }
                Ok(function)
            }
            Node::Call(call) => self.call(call, environment),
            Node::Return(ReturnNode { value, .. }) => {
                let value = match value {
                    Some(value) => self.eval(value, environment)?,
                    None => Value::Null,
                };
                Err(Unwind::Return(value))
            }
            Node::Continue(span) => Err(Unwind::Continue(*span)),
            Node::Break(span) => Err(Unwind::Break(*span)),
        }
    }

    fn binary(&mut self, node: &BinaryNode, environment: &mut Environment) -> Result<Value, Unwind> {
        let left = self.eval(&node.left, environment)?;

        // We handle short-circuiting operators first
        match node.operator {
            BinaryOperator::And if !left.is_true() => return Ok(Value::from(false)),
            BinaryOperator::Or if left.is_true() => return Ok(Value::from(true)),
            BinaryOperator::And | BinaryOperator::Or => {
                let right = self.eval(&node.right, environment)?;
                return Ok(Value::from(right.is_true()));
            }
            _ => {}
        }

        let right = self.eval(&node.right, environment)?;
        value::binary_operation(node.operator, &left, &right, &mut self.meter)
            .map_err(|e| self.error(node.span, e.to_string()).into())
    }

    fn if_expression(&mut self, node: &IfNode, environment: &mut Environment) -> Result<Value, Unwind> {
        for case in &node.cases {
            if self.eval(&case.condition, environment)?.is_true() {
                let value = self.eval(&case.body, environment)?;
                return Ok(if case.returns_null { Value::Null } else { value });
            }
        }
        if let Some(else_case) = &node.else_case {
            let value = self.eval(&else_case.body, environment)?;
            return Ok(if else_case.returns_null {
                Value::Null
            } else {
                value
            });
        }
        Ok(Value::Null)
    }

    fn for_loop(&mut self, node: &ForNode, environment: &mut Environment) -> Result<Value, Unwind> {
        let start = self.number(&node.start, environment)?;
        let end = self.number(&node.end, environment)?;
        let step = match &node.step {
            Some(step) => self.number(step, environment)?,
            None => Number::Int(1),
        };
        let ascending = step.compare(Number::Int(0)) != Some(Ordering::Less);

        let mut counter = start;
        let mut values = vec![];
        loop {
            let keep_going = match counter.compare(end) {
                Some(Ordering::Less) => ascending,
                Some(Ordering::Greater) => !ascending,
                _ => false,
            };
            if !keep_going {
                break;
            }
            environment.define(node.variable.clone(), Value::Number(counter));
            counter = counter.add(step);

            match self.eval(&node.body, environment) {
                Ok(value) => self.collect(&mut values, value, node.returns_null, node.span)?,
                Err(Unwind::Continue(_)) => continue,
                Err(Unwind::Break(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(if node.returns_null {
            Value::Null
        } else {
            Value::tracked_list(values, &mut self.meter)
        })
    }

    fn while_loop(&mut self, node: &WhileNode, environment: &mut Environment) -> Result<Value, Unwind> {
        let mut values = vec![];
        while self.eval(&node.condition, environment)?.is_true() {
            match self.eval(&node.body, environment) {
                Ok(value) => self.collect(&mut values, value, node.returns_null, node.span)?,
                Err(Unwind::Continue(_)) => continue,
                Err(Unwind::Break(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(if node.returns_null {
            Value::Null
        } else {
            Value::tracked_list(values, &mut self.meter)
        })
    }

    /// Record the value of a loop iteration, for the single-line loop forms.
    fn collect(
        &mut self,
        values: &mut Vec<Value>,
        value: Value,
        returns_null: bool,
        span: Span,
    ) -> Result<(), RuntimeError> {
        if returns_null {
            return Ok(());
        }
        value::reserve_growth(&mut self.meter, values.len() + 1, 1)
            .map_err(|e| self.error(span, e.to_string()))?;
        values.push(value);
        Ok(())
    }

    fn number(&mut self, node: &Node, environment: &mut Environment) -> Result<Number, Unwind> {
        match self.eval(node, environment)? {
            Value::Number(n) => Ok(n),
            other => {
                let other = other.to_bounded_string(QUOTED_VALUE_BYTES);
                Err(self
                    .error(node.span(), format!("Expected a number, found `{other}`"))
                    .into())
            }
        }
    }

    fn call(&mut self, node: &CallNode, environment: &mut Environment) -> Result<Value, Unwind> {
        let callee = self.eval(&node.callee, environment)?;
        let arguments = node
            .arguments
            .iter()
            .map(|argument| self.eval(argument, environment))
            .collect::<Result<Vec<_>, _>>()?;

        match callee {
            Value::Function(function) => {
                Ok(self.call_function(&function, arguments, node.span, environment)?)
            }
            Value::BuiltIn(builtin) => {
                self.check_arity(
                    &builtin.to_string(),
                    builtin.parameters().len(),
                    arguments.len(),
                    node.span,
                )?;
                Ok(builtin.call(self, environment, arguments, node.span)?)
            }
            Value::Null | Value::Number(_) | Value::String(_) | Value::List(_) => {
                let callee = callee.to_bounded_string(QUOTED_VALUE_BYTES);
                Err(self
                    .error(node.span, format!("`{callee}` is not callable."))
                    .into())
            }
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        arguments: Vec<Value>,
        span: Span,
        environment: &mut Environment,
    ) -> Result<Value, RuntimeError> {
        self.check_arity(
            function.name(),
            function.parameters.len(),
            arguments.len(),
            span,
        )?;
        self.check_call_depth(span)?;

        let frame = Frame {
            name: function.name().to_owned(),
            file: Arc::clone(&function.file),
            entry: Some(span),
        };
        let guard = environment.enter_scope();
        for (parameter, argument) in function.parameters.iter().zip(arguments) {
            environment.define(parameter.clone(), argument);
        }
        let outcome = self.with_frame(frame, |interpreter| {
            match interpreter.eval(&function.body, environment) {
                Ok(value) if function.auto_return => Ok(value),
                Ok(_) => Ok(Value::Null),
                outcome => interpreter.settle(outcome),
            }
        });
        environment.exit_scope(guard);
        outcome
    }

    /// Load, parse and run a script from the script directory, in the current environment.
    pub(in crate::interpreter) fn run_script(
        &mut self,
        name: &str,
        environment: &mut Environment,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let text = self
            .load_script(name)
            .map_err(|e| self.error(span, format!("Failed to load script \"{name}\"\n{e}")))?;
        self.check_call_depth(span)?;

        let program = match tokenize(name, &text) {
            Ok(tokens) => parse(tokens).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let outcome = program.and_then(|program| {
            let frame = Frame {
                name: PROGRAM_CONTEXT.into(),
                file: Arc::clone(&program.file),
                entry: None,
            };
            self.with_frame(frame, |interpreter| {
                let outcome = interpreter.eval(&program.root, environment);
                interpreter.settle(outcome)
            })
            .map_err(|e| e.to_string())
        });

        match outcome {
            Ok(_) => Ok(Value::Null),
            Err(diagnostic) => Err(self.error(
                span,
                format!("Failed to finish executing script \"{name}\"\n{diagnostic}"),
            )),
        }
    }

    fn load_script(&self, name: &str) -> Result<String, ScriptError> {
        let root = self.scripts.as_deref().ok_or(ScriptError::Disabled)?;
        let path = paths::resolve_within(root, name).ok_or(ScriptError::OutsideRoot)?;
        Ok(std::fs::read_to_string(path)?)
    }

    fn with_frame<T>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> T) -> T {
        let caller = std::mem::replace(&mut self.frame, frame);
        self.callers.push(caller);
        let outcome = f(self);
        if let Some(caller) = self.callers.pop() {
            self.frame = caller;
        }
        outcome
    }

    /// Resolve the control flow that must not leave a function body or a program.
    fn settle(&self, outcome: Result<Value, Unwind>) -> Result<Value, RuntimeError> {
        match outcome {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(e)) => Err(e),
            Err(Unwind::Break(span)) => Err(self.error(span, "'BREAK' used outside of a loop")),
            Err(Unwind::Continue(span)) => {
                Err(self.error(span, "'CONTINUE' used outside of a loop"))
            }
        }
    }

    fn check_arity(
        &self,
        name: &str,
        expected: usize,
        found: usize,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match found.cmp(&expected) {
            Ordering::Greater => Err(self.error(
                span,
                format!("{} too many args passed into '{name}'", found - expected),
            )),
            Ordering::Less => Err(self.error(
                span,
                format!("{} too few args passed into '{name}'", expected - found),
            )),
            Ordering::Equal => Ok(()),
        }
    }

    fn check_call_depth(&self, span: Span) -> Result<(), RuntimeError> {
        // `callers` always holds the frame `evaluate` replaced, which is not a call.
        if self.callers.len() > self.budget.max_call_depth {
            let exceeded = BudgetExceeded::CallDepth(self.budget.max_call_depth);
            return Err(self.error(span, exceeded.to_string()));
        }
        Ok(())
    }

    pub(in crate::interpreter) fn error(
        &self,
        span: Span,
        message: impl Into<String>,
    ) -> RuntimeError {
        RuntimeError {
            message: message.into(),
            span,
            file: Arc::clone(&self.frame.file),
            traceback: self.traceback(span),
        }
    }

    fn traceback(&self, span: Span) -> String {
        let mut lines = vec![];
        let mut position = span;
        for frame in std::iter::once(&self.frame).chain(self.callers.iter().rev()) {
            lines.push(format!(
                "  File {}, line {}, in {}\n",
                frame.file.name(),
                position.start.line + 1,
                frame.name
            ));
            match frame.entry {
                Some(entry) => position = entry,
                None => break,
            }
        }
        lines.reverse();
        format!("Traceback (most recent call last):\n{}", lines.concat())
    }
}

/// Everything that can interrupt the evaluation of a node.
#[derive(Debug, thiserror::Error)]
enum Unwind {
    #[error(transparent)]
    Error(#[from] RuntimeError),
    #[error("`RETURN` unwinding the current function")]
    Return(Value),
    #[error("`BREAK` unwinding the current loop")]
    Break(Span),
    #[error("`CONTINUE` unwinding the current loop")]
    Continue(Span),
}

#[derive(Debug, thiserror::Error)]
enum ScriptError {
    #[error("Running scripts is disabled on this server")]
    Disabled,
    #[error("Script path must stay inside the script directory")]
    OutsideRoot,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A Bolton program failed while running.
#[derive(Debug, thiserror::Error)]
#[error("{}", render(.traceback, .message, .span, .file))]
pub struct RuntimeError {
    pub message: String,
    pub span: Span,
    pub file: Arc<SourceFile>,
    traceback: String,
}

fn render(traceback: &str, message: &str, span: &Span, file: &SourceFile) -> String {
    format!(
        "{traceback}Runtime Error: {message}\n\n{}",
        diagnostic::underline(file.text(), *span)
    )
}
