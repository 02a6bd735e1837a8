//! Built-in operations registry.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: receive the already-evaluated argument list
//!   (`+`, `-`, `*`, `/`)
//! - **Special Forms**: receive their operands unevaluated together with the
//!   environment (`if`, `define`)
//!
//! Special forms are recognised by the evaluator when their symbol appears in
//! operator position; functions are bound in the global environment like any
//! other value and reached through ordinary symbol lookup.
//!
//! ## Arithmetic
//!
//! All four arithmetic primitives accept any number of integer arguments and
//! fold over them with wrapping 64-bit arithmetic, re-wrapping the result into
//! the integer payload range. There is no overflow detection.
//!
//! - `+` folds from 0, `*` folds from 1
//! - `-` and `/` start from their first argument and apply each later one;
//!   with no arguments they return 0
//! - `/` truncates toward zero and fails on a zero divisor after the first
//!   argument

use crate::Error;
use crate::ast::{NumberType, OperationFn, Value};
use crate::evaluator::{Environment, eval_define, eval_if};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Accepted operand counts for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Any,
}

impl Arity {
    /// Check an operand list against this arity, returning its length.
    ///
    /// An improper list never satisfies an exact arity; `got` counts the
    /// elements before its dotted tail. Variadic operations accept any
    /// chain and report improper lists themselves.
    pub fn validate(self, operands: &Value) -> Result<usize, Error> {
        let got = operands.iter().count();
        match self {
            Arity::Exact(expected) if got != expected || !operands.is_proper_list() => {
                Err(Error::arity_error(expected, got))
            }
            _ => Ok(got),
        }
    }
}

/// Signature of a special form: unevaluated operands, already checked against
/// the form's arity, and the environment
pub type SpecialFormFn = fn(&[Value], &mut Environment) -> Result<Value, Error>;

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Primitive taking the evaluated argument list
    Function(Arc<OperationFn>),
    /// Special form taking unevaluated operands and the environment
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// Name the operation is bound or recognised under
    pub name: &'static str,
    /// The implementation of this operation (function or special form)
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl BuiltinOp {
    /// Check if this operation is a special form
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check an operand list against this operation's arity
    pub fn validate_arity(&self, operands: &Value) -> Result<usize, Error> {
        self.arity.validate(operands)
    }
}

//
// Builtin Function Implementations
//

/// Integer elements of an argument list.
///
/// Fails up front on an improper list; each element yields a `TypeError`
/// naming `op` if it is not an integer.
fn numeric_args<'a>(
    op: &'static str,
    args: &'a Value,
) -> Result<impl Iterator<Item = Result<NumberType, Error>> + 'a, Error> {
    if !args.is_proper_list() {
        return Err(Error::TypeError(format!(
            "arg list to {op} is not a proper list"
        )));
    }
    Ok(args.iter().map(move |arg| {
        arg.as_number()
            .ok_or_else(|| Error::TypeError(format!("arg to {op} not number ({})", arg.tag())))
    }))
}

// Folds starting from an identity element: (+) => 0, (*) => 1
macro_rules! numeric_fold {
    ($name:ident, $op_str:expr, $identity:expr, $method:ident) => {
        fn $name(args: &Value) -> Result<Value, Error> {
            let mut acc: NumberType = $identity;
            for n in numeric_args($op_str, args)? {
                acc = acc.$method(n?);
            }
            Ok(Value::number(acc))
        }
    };
}

numeric_fold!(builtin_add, "+", 0, wrapping_add);
numeric_fold!(builtin_mul, "*", 1, wrapping_mul);

fn builtin_sub(args: &Value) -> Result<Value, Error> {
    let mut acc: Option<NumberType> = None;
    for n in numeric_args("-", args)? {
        let n = n?;
        acc = Some(match acc {
            None => n,
            Some(acc) => acc.wrapping_sub(n),
        });
    }
    Ok(Value::number(acc.unwrap_or(0)))
}

fn builtin_div(args: &Value) -> Result<Value, Error> {
    let mut acc: Option<NumberType> = None;
    for n in numeric_args("/", args)? {
        let n = n?;
        acc = Some(match acc {
            None => n,
            Some(_) if n == 0 => return Err(Error::DivisionByZero),
            Some(acc) => acc.wrapping_div(n),
        });
    }
    Ok(Value::number(acc.unwrap_or(0)))
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin(f: fn(&Value) -> Result<Value, Error>) -> OpKind {
        OpKind::Function(Arc::new(f))
    }

    vec![
        // Arithmetic operations
        BuiltinOp {
            name: "+",
            op_kind: builtin(builtin_add),
            arity: Arity::Any,
        },
        BuiltinOp {
            name: "-",
            op_kind: builtin(builtin_sub),
            arity: Arity::Any,
        },
        BuiltinOp {
            name: "*",
            op_kind: builtin(builtin_mul),
            arity: Arity::Any,
        },
        BuiltinOp {
            name: "/",
            op_kind: builtin(builtin_div),
            arity: Arity::Any,
        },
        // Control flow
        BuiltinOp {
            name: "if",
            op_kind: OpKind::SpecialForm(eval_if),
            arity: Arity::Exact(3),
        },
        // Bindings
        BuiltinOp {
            name: "define",
            op_kind: OpKind::SpecialForm(eval_define),
            arity: Arity::Exact(2),
        },
    ]
});

/// Lazy static map from name to BuiltinOp
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.name, op)).collect()
    });

/// Get all builtin operations (for internal use by evaluator)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}
