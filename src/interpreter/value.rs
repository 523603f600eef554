use crate::diagnostic::SourceFile;
use crate::interpreter::budget::{BudgetExceeded, Meter};
use crate::interpreter::builtins::BuiltIn;
use crate::parser::ast::{BinaryOperator, Node, UnaryOperator};
use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Write};
use std::rc::Rc;
use std::sync::Arc;

/// A Bolton runtime value.
///
/// Lists are shared by reference: `APPEND`, `POP` and `EXTEND` mutate every alias.
/// The list operators (`+`, `-`, `*`) work on copies instead.
/// Strings are immutable, so copies of a string value share its text.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Number(Number),
    String(Rc<str>),
    List(Rc<List>),
    Function(Rc<Function>),
    BuiltIn(BuiltIn),
}

impl Value {
    pub fn list(elements: Vec<Value>) -> Self {
        Self::List(Rc::new(List::new(elements)))
    }

    /// A list registered with `meter`, which empties it when the execution ends.
    pub(crate) fn tracked_list(elements: Vec<Value>, meter: &mut Meter) -> Self {
        let list = Rc::new(List::new(elements));
        meter.track(&list);
        Self::List(list)
    }

    pub fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => !n.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::List(list) => !list.borrow().is_empty(),
            Value::Function(_) | Value::BuiltIn(_) => true,
        }
    }

    /// Numbers compare by value, strings by content, everything else by identity.
    pub fn is_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Number(l), Self::Number(r)) => l.compare(*r) == Some(Ordering::Equal),
            (Self::String(l), Self::String(r)) => l == r,
            (Self::List(l), Self::List(r)) => Rc::ptr_eq(l, r),
            (Self::Function(l), Self::Function(r)) => Rc::ptr_eq(l, r),
            (Self::BuiltIn(l), Self::BuiltIn(r)) => l == r,
            (_, _) => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(Number::Int(b as i64))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl Value {
    /// The string form of the value, cut short after `max_bytes` bytes.
    pub fn to_bounded_string(&self, max_bytes: usize) -> String {
        let mut text = BoundedText::new(max_bytes);
        // An error only means the text was cut short.
        let _ = write!(text, "{self}");
        text.finish()
    }

    /// The form a program's final value is shown in: the values of its top-level statements,
    /// without the `NULL` ones, separated by commas.
    pub fn to_result_text(&self, max_bytes: usize) -> String {
        let mut text = BoundedText::new(max_bytes);
        let _ = match self {
            Value::Null => Ok(()),
            Value::List(statements) => statements
                .borrow()
                .iter()
                .filter(|value| !matches!(value, Value::Null))
                .enumerate()
                .try_for_each(|(i, value)| {
                    if i > 0 {
                        text.write_str(", ")?;
                    }
                    write!(text, "{value}")
                }),
            value => write!(text, "{value}"),
        };
        text.finish()
    }
}

/// A text buffer that refuses writes past `max_bytes`.
struct BoundedText {
    text: String,
    max_bytes: usize,
    truncated: bool,
}

impl BoundedText {
    fn new(max_bytes: usize) -> Self {
        Self {
            text: String::new(),
            max_bytes,
            truncated: false,
        }
    }

    fn finish(mut self) -> String {
        if self.truncated {
            self.text.push_str("...");
        }
        self.text
    }
}

impl Write for BoundedText {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let room = self.max_bytes.saturating_sub(self.text.len());
        if s.len() <= room {
            self.text.push_str(s);
            return Ok(());
        }
        let mut end = room;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&s[..end]);
        self.truncated = true;
        Err(std::fmt::Error)
    }
}

/// Upper bound on the number of values visited while rendering a single value.
/// Lists can share elements, so the rendered text could otherwise grow exponentially.
const RENDER_LIMIT: usize = 100_000;
/// Lists nested deeper than this are elided.
const RENDER_DEPTH: usize = 64;

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut remaining = RENDER_LIMIT;
        render(f, self, &mut Vec::new(), &mut remaining)
    }
}

fn render(
    f: &mut Formatter<'_>,
    value: &Value,
    path: &mut Vec<*const List>,
    remaining: &mut usize,
) -> std::fmt::Result {
    if *remaining == 0 {
        return f.write_str("...");
    }
    *remaining -= 1;
    match value {
        Value::Null => f.write_str("NULL"),
        Value::Number(n) => n.fmt(f),
        Value::String(s) => f.write_str(s),
        Value::Function(function) => function.fmt(f),
        Value::BuiltIn(builtin) => write!(f, "<built-in function {builtin}>"),
        Value::List(list) => {
            let pointer = Rc::as_ptr(list);
            if path.len() >= RENDER_DEPTH || path.contains(&pointer) {
                return f.write_str("[...]");
            }
            path.push(pointer);
            for (i, element) in list.borrow().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                render(f, element, path, remaining)?;
                if *remaining == 0 {
                    break;
                }
            }
            path.pop();
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    // Integer arithmetic falls back to floats on overflow.
    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => l
                .checked_add(r)
                .map_or(Number::Float(l as f64 + r as f64), Number::Int),
            _ => Number::Float(self.as_f64() + other.as_f64()),
        }
    }

    pub fn subtract(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => l
                .checked_sub(r)
                .map_or(Number::Float(l as f64 - r as f64), Number::Int),
            _ => Number::Float(self.as_f64() - other.as_f64()),
        }
    }

    pub fn multiply(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => l
                .checked_mul(r)
                .map_or(Number::Float(l as f64 * r as f64), Number::Int),
            _ => Number::Float(self.as_f64() * other.as_f64()),
        }
    }

    pub fn divide(self, other: Number) -> Result<Number, OperationError> {
        if other.is_zero() {
            return Err(OperationError::DivisionByZero);
        }
        Ok(Number::Float(self.as_f64() / other.as_f64()))
    }

    pub fn power(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(base), Number::Int(exponent)) if exponent >= 0 => u32::try_from(exponent)
                .ok()
                .and_then(|exponent| base.checked_pow(exponent))
                .map_or(
                    Number::Float((base as f64).powf(exponent as f64)),
                    Number::Int,
                ),
            _ => Number::Float(self.as_f64().powf(other.as_f64())),
        }
    }

    pub fn negate(self) -> Number {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map_or(Number::Float(-(n as f64)), Number::Int),
            Number::Float(n) => Number::Float(-n),
        }
    }

    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => Some(l.cmp(&r)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(n) => n.fmt(f),
            // Integral floats keep a trailing `.0` so they can be told apart from integers.
            Number::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
                write!(f, "{n:.1}")
            }
            Number::Float(n) => n.fmt(f),
        }
    }
}

/// The storage behind a Bolton list.
#[derive(Debug, Default)]
pub struct List {
    elements: RefCell<Vec<Value>>,
}

impl List {
    pub fn new(elements: Vec<Value>) -> Self {
        Self {
            elements: RefCell::new(elements),
        }
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.elements.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.elements.borrow_mut()
    }
}

// Nested lists are torn down iteratively: a program can nest lists far deeper than the
// native stack could follow with recursive drops.
impl Drop for List {
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.elements.get_mut());
        while let Some(value) = pending.pop() {
            if let Value::List(list) = value {
                if let Ok(mut list) = Rc::try_unwrap(list) {
                    pending.append(list.elements.get_mut());
                }
            }
        }
    }
}

/// A user-defined function.
#[derive(Debug)]
pub struct Function {
    pub name: Option<String>,
    pub parameters: Vec<String>,
    pub body: Rc<Node>,
    pub auto_return: bool,
    /// The file the body was parsed from, for diagnostics raised while it runs.
    pub file: Arc<SourceFile>,
}

impl Function {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("Illegal operation")]
    Illegal,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Element at this index could not be retrieved from list because index is out of bounds")]
    IndexOutOfBounds,
    #[error("Element at this index could not be removed from list because index is out of bounds")]
    RemovalOutOfBounds,
    #[error("Result would exceed the limit of {0} elements")]
    TooLarge(usize),
    #[error(transparent)]
    Budget(#[from] BudgetExceeded),
}

/// Bytes charged for every slot of a new list.
const SLOT_BYTES: usize = std::mem::size_of::<Value>();

/// Check the size of a string or list about to be created, and charge its bytes to `meter`.
pub(crate) fn reserve(
    meter: &mut Meter,
    len: usize,
    bytes: usize,
) -> Result<(), OperationError> {
    check_len(len, meter.max_collection_len())?;
    meter.allocate(bytes)?;
    Ok(())
}

/// [`reserve`] room for a list of `len` elements.
pub(crate) fn reserve_slots(meter: &mut Meter, len: usize) -> Result<(), OperationError> {
    reserve(meter, len, len.saturating_mul(SLOT_BYTES))
}

/// [`reserve`] room for `added` more elements in a list that grows to `len`.
pub(crate) fn reserve_growth(
    meter: &mut Meter,
    len: usize,
    added: usize,
) -> Result<(), OperationError> {
    reserve(meter, len, added.saturating_mul(SLOT_BYTES))
}

/// Apply a binary operator. `AND` and `OR` short-circuit, so the interpreter handles them.
///
/// Strings and lists produced by the operation are charged to `meter`.
pub(crate) fn binary_operation(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
    meter: &mut Meter,
) -> Result<Value, OperationError> {
    match operator {
        BinaryOperator::Equal => return Ok(Value::from(left.is_equal(right))),
        BinaryOperator::NotEqual => return Ok(Value::from(!left.is_equal(right))),
        _ => {}
    }
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => number_operation(operator, *l, *r),
        (Value::String(l), Value::String(r)) if operator == BinaryOperator::Add => {
            let len = l.len() + r.len();
            reserve(meter, len, len)?;
            Ok(Value::from(format!("{l}{r}")))
        }
        (Value::String(s), Value::Number(Number::Int(count)))
            if operator == BinaryOperator::Multiply =>
        {
            let count = usize::try_from(*count).unwrap_or(0);
            let len = s.len().saturating_mul(count);
            reserve(meter, len, len)?;
            Ok(Value::from(s.repeat(count)))
        }
        (Value::List(list), _) => list_operation(operator, list, right, meter),
        (_, _) => Err(OperationError::Illegal),
    }
}

fn number_operation(
    operator: BinaryOperator,
    l: Number,
    r: Number,
) -> Result<Value, OperationError> {
    let ordering = || l.compare(r);
    let value = match operator {
        BinaryOperator::Add => Value::Number(l.add(r)),
        BinaryOperator::Subtract => Value::Number(l.subtract(r)),
        BinaryOperator::Multiply => Value::Number(l.multiply(r)),
        BinaryOperator::Divide => Value::Number(l.divide(r)?),
        BinaryOperator::Power => Value::Number(l.power(r)),
        BinaryOperator::Less => Value::from(ordering() == Some(Ordering::Less)),
        BinaryOperator::Greater => Value::from(ordering() == Some(Ordering::Greater)),
        BinaryOperator::LessEqual => Value::from(matches!(
            ordering(),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterEqual => Value::from(matches!(
            ordering(),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::And
        | BinaryOperator::Or => return Err(OperationError::Illegal),
    };
    Ok(value)
}

fn list_operation(
    operator: BinaryOperator,
    list: &List,
    right: &Value,
    meter: &mut Meter,
) -> Result<Value, OperationError> {
    let elements = list.borrow();
    match (operator, right) {
        (BinaryOperator::Add, _) => {
            reserve_slots(meter, elements.len() + 1)?;
            let mut copy = elements.clone();
            copy.push(right.clone());
            Ok(Value::tracked_list(copy, meter))
        }
        (BinaryOperator::Subtract, Value::Number(Number::Int(index))) => {
            let index = resolve_index(elements.len(), *index)
                .ok_or(OperationError::RemovalOutOfBounds)?;
            reserve_slots(meter, elements.len() - 1)?;
            let mut copy = elements.clone();
            copy.remove(index);
            Ok(Value::tracked_list(copy, meter))
        }
        (BinaryOperator::Multiply, Value::List(other)) => {
            let other = other.borrow();
            reserve_slots(meter, elements.len() + other.len())?;
            let mut copy = elements.clone();
            copy.extend(other.iter().cloned());
            Ok(Value::tracked_list(copy, meter))
        }
        (BinaryOperator::Divide, Value::Number(Number::Int(index))) => {
            let index =
                resolve_index(elements.len(), *index).ok_or(OperationError::IndexOutOfBounds)?;
            Ok(elements[index].clone())
        }
        (_, _) => Err(OperationError::Illegal),
    }
}

pub fn unary_operation(operator: UnaryOperator, operand: &Value) -> Result<Value, OperationError> {
    match (operator, operand) {
        (UnaryOperator::Not, value) => Ok(Value::from(!value.is_true())),
        (UnaryOperator::Plus, value) => Ok(value.clone()),
        (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(n.negate())),
        (UnaryOperator::Negate, _) => Err(OperationError::Illegal),
    }
}

/// Negative indexes count from the end of the list.
pub fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let index = if index < 0 {
        index.checked_add(i64::try_from(len).ok()?)?
    } else {
        index
    };
    usize::try_from(index).ok().filter(|i| *i < len)
}

pub fn check_len(len: usize, max_len: usize) -> Result<(), OperationError> {
    if len > max_len {
        Err(OperationError::TooLarge(max_len))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{binary_operation, resolve_index, Number, OperationError, Value};
    use crate::interpreter::budget::{BudgetExceeded, ExecutionBudget, Meter};
    use crate::parser::ast::BinaryOperator;

    fn meter(max_collection_len: usize) -> Meter {
        Meter::start(&ExecutionBudget {
            max_collection_len,
            ..ExecutionBudget::default()
        })
    }

    fn int(n: i64) -> Value {
        Value::from(n)
    }

    #[test]
    fn integral_floats_keep_their_decimal_point() {
        assert_eq!(Number::Float(3.0).to_string(), "3.0");
        assert_eq!(Number::Float(0.5).to_string(), "0.5");
        assert_eq!(Number::Int(3).to_string(), "3");
    }

    #[test]
    fn division_always_yields_a_float() {
        let mut meter = meter(10);
        let value = binary_operation(BinaryOperator::Divide, &int(6), &int(3), &mut meter);
        assert_eq!(value.unwrap().to_string(), "2.0");
        assert_eq!(
            binary_operation(BinaryOperator::Divide, &int(1), &int(0), &mut meter).unwrap_err(),
            OperationError::DivisionByZero
        );
    }

    #[test]
    fn integer_overflow_falls_back_to_floats() {
        assert_eq!(
            Number::Int(i64::MAX).add(Number::Int(1)),
            Number::Float(i64::MAX as f64 + 1.0)
        );
        assert_eq!(Number::Int(2).power(Number::Int(10)), Number::Int(1024));
        assert_eq!(Number::Int(2).power(Number::Int(-1)), Number::Float(0.5));
    }

    #[test]
    fn list_operators_work_on_copies() {
        // Lists made by the operators are emptied once the meter goes away.
        let mut meter = meter(10);
        let list = Value::list(vec![int(1), int(2)]);
        let appended = binary_operation(BinaryOperator::Add, &list, &int(3), &mut meter).unwrap();
        assert_eq!(appended.to_string(), "1, 2, 3");
        assert_eq!(list.to_string(), "1, 2");

        let removed = binary_operation(BinaryOperator::Subtract, &list, &int(-1), &mut meter);
        assert_eq!(removed.unwrap().to_string(), "1");

        let element = binary_operation(BinaryOperator::Divide, &list, &int(5), &mut meter);
        assert_eq!(element.unwrap_err(), OperationError::IndexOutOfBounds);
    }

    #[test]
    fn results_are_capped() {
        let s = Value::String("ab".into());
        let error = binary_operation(BinaryOperator::Multiply, &s, &int(10), &mut meter(8));
        assert_eq!(error.unwrap_err(), OperationError::TooLarge(8));
    }

    #[test]
    fn new_strings_are_charged_to_the_meter() {
        let mut meter = Meter::start(&ExecutionBudget {
            max_allocated_bytes: 1000,
            ..ExecutionBudget::default()
        });
        let s = Value::from("a".repeat(400));
        let doubled = binary_operation(BinaryOperator::Add, &s, &s, &mut meter).unwrap();
        assert_eq!(doubled.to_string().len(), 800);
        let error = binary_operation(BinaryOperator::Add, &s, &s, &mut meter).unwrap_err();
        assert_eq!(error, OperationError::Budget(BudgetExceeded::Memory(1000)));
    }

    #[test]
    fn rendering_can_be_bounded() {
        let s = Value::from("a".repeat(100));
        let list = Value::list(vec![s.clone(), s.clone(), s]);
        assert_eq!(list.to_bounded_string(5), "aaaaa...");
        assert_eq!(Value::from("é").to_bounded_string(1), "...");
        assert_eq!(Value::from(12).to_bounded_string(5), "12");
    }

    #[test]
    fn the_result_text_skips_nulls() {
        let statements = Value::list(vec![Value::from(1), Value::Null, Value::from("two")]);
        assert_eq!(statements.to_result_text(100), "1, two");
        assert_eq!(statements.to_result_text(3), "1, ...");
        assert_eq!(Value::Null.to_result_text(100), "");
    }

    #[test]
    fn self_referencing_lists_render() {
        let list = Value::list(vec![int(1)]);
        if let Value::List(inner) = &list {
            inner.borrow_mut().push(list.clone());
        }
        assert_eq!(list.to_string(), "1, [...]");
        // Break the cycle so the test does not leak.
        if let Value::List(inner) = &list {
            inner.borrow_mut().pop();
        }
    }

    #[test]
    fn negative_indexes_count_from_the_end() {
        assert_eq!(resolve_index(3, -1), Some(2));
        assert_eq!(resolve_index(3, -4), None);
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(0, 0), None);
    }

    #[test]
    fn deeply_nested_lists_can_be_dropped() {
        let mut value = Value::list(vec![]);
        for _ in 0..200_000 {
            value = Value::list(vec![value]);
        }
        drop(value);
    }
}
