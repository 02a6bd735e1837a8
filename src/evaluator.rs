use crate::Error;
use crate::ast::{DisplayValue, Pair, Value, to_display_string};
use crate::builtinops::{BuiltinOp, OpKind, get_builtin_ops};
use crate::reader::{ParseConfig, parse_all_with_config};
use crate::symbols::{NIL_NAME, SymbolId, SymbolTable};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Name of the canonical true value, bound to itself
const TRUE_NAME: &str = "t";

/// Global environment for one interpreter session.
///
/// Owns the symbol table that the reader interns into and the single mutable
/// mapping from symbols to values. `define` is the only operation that writes
/// to it.
#[derive(Debug, Clone)]
pub struct Environment {
    symbols: SymbolTable,
    bindings: HashMap<SymbolId, Value>,
    special_forms: HashMap<SymbolId, &'static BuiltinOp>,
}

impl Environment {
    /// Environment with special forms recognised but nothing bound.
    pub(crate) fn new() -> Self {
        let mut env = Environment {
            symbols: SymbolTable::new(),
            bindings: HashMap::new(),
            special_forms: HashMap::new(),
        };
        for op in get_builtin_ops() {
            if op.is_special_form() {
                let id = env.symbols.intern(op.name);
                env.special_forms.insert(id, op);
            }
        }
        env
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Intern `name` in this session's symbol table
    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.symbols.intern(name)
    }

    /// Bind `id` to `value`, replacing any previous binding
    pub fn define(&mut self, id: SymbolId, value: Value) {
        self.bindings.insert(id, value);
    }

    pub fn get(&self, id: SymbolId) -> Option<&Value> {
        self.bindings.get(&id)
    }

    /// Look up a binding by name without interning it
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.symbols.lookup(name).and_then(|id| self.get(id))
    }

    /// Special form recognised for `id` in operator position, if any
    pub(crate) fn special_form(&self, id: SymbolId) -> Option<&'static BuiltinOp> {
        self.special_forms.get(&id).copied()
    }

    /// Register a primitive function under `name`.
    ///
    /// The function receives the evaluated argument list (always a proper
    /// list) and returns one value, like the arithmetic primitives.
    ///
    /// # Example
    /// ```
    /// use minilisp::{Error, Value, create_global_env};
    ///
    /// fn count_args(args: &Value) -> Result<Value, Error> {
    ///     Ok(Value::number(args.iter().count() as i64))
    /// }
    ///
    /// let mut env = create_global_env();
    /// env.register_builtin_function("count", count_args);
    /// let result = env.eval_str("(count 1 2 3)").unwrap();
    /// assert_eq!(result, Value::number(3));
    /// ```
    pub fn register_builtin_function<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        let id = self.symbols.intern(name);
        self.define(id, Value::function(id, func));
    }

    /// Get all bindings in this environment
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut result: Vec<_> = self
            .bindings
            .iter()
            .map(|(id, value)| (self.symbols.display_name(*id).to_owned(), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Render a value with this session's symbol names
    pub fn display<'a>(&'a self, value: &'a Value) -> DisplayValue<'a> {
        value.display(&self.symbols)
    }

    pub fn to_display_string(&self, value: &Value) -> String {
        to_display_string(value, &self.symbols)
    }

    /// Parse every top-level expression in `source` and evaluate them in
    /// order.
    ///
    /// Returns the value of the last expression, or `nil` if there is none.
    /// Nothing is evaluated if the source fails to parse; an evaluation error
    /// stops at the failing expression, keeping earlier definitions.
    pub fn eval_str(&mut self, source: &str) -> Result<Value, Error> {
        self.eval_str_with_config(source, ParseConfig::default())
    }

    /// [`Environment::eval_str`] with explicit reader options.
    pub fn eval_str_with_config(
        &mut self,
        source: &str,
        config: ParseConfig,
    ) -> Result<Value, Error> {
        let exprs = parse_all_with_config(source, &mut self.symbols, config)?;
        let mut result = Value::nil();
        for expr in &exprs {
            result = eval(expr, self)?;
        }
        Ok(result)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate an S-expression (public API)
pub fn eval(expr: &Value, env: &mut Environment) -> Result<Value, Error> {
    match expr {
        // Self-evaluating forms
        Value::Number(_) | Value::Function { .. } => Ok(expr.clone()),

        // Variable lookup
        Value::Symbol(id) => env
            .get(*id)
            .cloned()
            .ok_or_else(|| Error::UnboundVariable(env.symbols.display_name(*id).to_owned())),

        // Special forms or function application
        Value::Pair(pair) => eval_pair(expr, pair, env),
    }
}

/// Evaluate a pair: special form if the operator is a special form symbol,
/// function application otherwise
fn eval_pair(expr: &Value, pair: &Pair, env: &mut Environment) -> Result<Value, Error> {
    let operator = pair.first();
    let operands = pair.rest();

    if let Value::Symbol(id) = operator
        && let Some(op) = env.special_form(*id)
        && let OpKind::SpecialForm(special_form) = &op.op_kind
    {
        trace!(form = op.name, "special form");
        op.validate_arity(operands)
            .map_err(|err| err.with_expression(|| env.to_display_string(expr)))?;
        let operands: Vec<Value> = operands.iter().cloned().collect();
        return special_form(&operands, env);
    }

    // Function application: evaluate the operator, then the operands
    let func = eval(operator, env)?;
    if !func.is_function() {
        return Err(Error::TypeError(format!(
            "calling a non-function: {}",
            env.display(&func)
        )));
    }
    if !operands.is_proper_list() {
        return Err(Error::TypeError(format!(
            "fn call with improper list: {}",
            env.display(expr)
        )));
    }

    let args = eval_args(operands, env)?;
    trace!(operator = %env.display(operator), "apply");
    func.call(&args)
}

/// Evaluate each element of a proper operand list left to right into a new list
fn eval_args(operands: &Value, env: &mut Environment) -> Result<Value, Error> {
    let values = operands
        .iter()
        .map(|arg| eval(arg, env))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::list(values, Value::nil()))
}

/// Evaluate if special form
///
/// Only `nil` is false; every other value, including 0, selects the
/// consequent.
pub(crate) fn eval_if(operands: &[Value], env: &mut Environment) -> Result<Value, Error> {
    let [condition, consequent, alternative] = operands else {
        return Err(Error::arity_error(3, operands.len()));
    };
    let test = eval(condition, env)?;
    if test.is_nil() {
        eval(alternative, env)
    } else {
        eval(consequent, env)
    }
}

/// Evaluate define special form
///
/// The binding is only committed once the value expression has evaluated.
pub(crate) fn eval_define(operands: &[Value], env: &mut Environment) -> Result<Value, Error> {
    let [target, value_expr] = operands else {
        return Err(Error::arity_error(2, operands.len()));
    };
    let Value::Symbol(name) = target else {
        return Err(Error::TypeError(format!(
            "first argument of define not symbol: {}",
            env.display(target)
        )));
    };
    let value = eval(value_expr, env)?;
    debug!(
        symbol = env.symbols.display_name(*name),
        value = %env.display(&value),
        "define"
    );
    env.define(*name, value);
    Ok(Value::nil())
}

/// Create a global environment with built-in functions
///
/// Binds `+ - * /` to their primitives, `nil` and `t` to themselves, and
/// recognises `if` and `define` as special forms.
pub fn create_global_env() -> Environment {
    let mut env = Environment::new();

    for builtin_op in get_builtin_ops() {
        if let OpKind::Function(func) = &builtin_op.op_kind {
            let id = env.intern(builtin_op.name);
            env.define(
                id,
                Value::Function {
                    id,
                    func: func.clone(),
                },
            );
        }
    }

    let nil = env.intern(NIL_NAME);
    env.define(nil, Value::nil());
    let t = env.intern(TRUE_NAME);
    env.define(t, Value::symbol(t));

    env
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::Error;
    use crate::ast::val;
    use crate::reader::parse;

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(&'static str),    // Evaluation should succeed and display as this text
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        Error,                       // Evaluation should fail (any error)
    }
    use TestResult::*;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(input: &str, expected: &TestResult, env: &mut Environment, test_id: &str) {
        let expr = match parse(input, env.symbols_mut()) {
            Ok(expr) => expr,
            Err(parse_err) => {
                panic!("{test_id}: unexpected parse error for '{input}': {parse_err:?}");
            }
        };

        match (eval(&expr, env), expected) {
            (Ok(actual), EvalResult(expected_text)) => {
                let displayed = env.to_display_string(&actual);
                assert_eq!(
                    &displayed, expected_text,
                    "{test_id}: unexpected result for '{input}'"
                );
            }
            (Err(_), Error) => {} // Expected generic error
            (Err(e), SpecificError(expected_text)) => {
                let error_msg = format!("{e}");
                assert!(
                    error_msg.contains(expected_text),
                    "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                );
            }
            (Ok(actual), Error | SpecificError(_)) => {
                panic!("{test_id}: expected error for '{input}', got {actual:?}");
            }
            (Err(err), EvalResult(expected_text)) => {
                panic!("{test_id}: expected {expected_text}, got error {err:?}");
            }
        }
    }

    /// Run each case in a fresh global environment
    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let mut env = create_global_env();
            let test_id = format!("#{}", i + 1);
            execute_test_case(input, expected, &mut env, &test_id);
        }
    }

    /// Run tests in isolated environments with shared state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let mut env = create_global_env();
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &mut env, &test_id);
            }
        }
    }

    #[test]
    fn test_comprehensive_operations_data_driven() {
        let test_cases = vec![
            // === SELF-EVALUATING FORMS ===
            ("42", EvalResult("42")),
            ("0", EvalResult("0")),
            // === BOOTSTRAP BINDINGS ===
            ("nil", EvalResult("nil")),
            ("t", EvalResult("t")),
            ("+", EvalResult("<fn>")),
            ("/", EvalResult("<fn>")),
            // === ARITHMETIC ===
            ("(+)", EvalResult("0")),
            ("(*)", EvalResult("1")),
            ("(-)", EvalResult("0")),
            ("(/)", EvalResult("0")),
            ("(+ 1 2 3)", EvalResult("6")),
            ("(- 5)", EvalResult("5")),
            ("(- 5 3 1)", EvalResult("1")),
            ("(* 2 3 4)", EvalResult("24")),
            ("(/ 10 2 5)", EvalResult("1")),
            ("(/ 0)", EvalResult("0")),
            ("(+ (* 2 3) (- 8 2))", EvalResult("12")),
            ("(/ 7 0)", SpecificError("Division by zero")),
            ("(+ 1 t)", SpecificError("arg to + not number")),
            ("(* nil 2)", SpecificError("arg to * not number")),
            ("(- 1 +)", SpecificError("arg to - not number")),
            // === TRUTHINESS ===
            ("(if nil 1 2)", EvalResult("2")),
            ("(if 0 1 2)", EvalResult("1")),
            ("(if t 1 2)", EvalResult("1")),
            ("(if () 1 2)", EvalResult("2")),
            ("(if + 1 2)", EvalResult("1")),
            ("(if (- 1 1) 1 2)", EvalResult("1")),
            // Only the chosen branch is evaluated
            ("(if t 1 undefined)", EvalResult("1")),
            ("(if nil (/ 1 0) 3)", EvalResult("3")),
            // === SPECIAL FORM ARITY ===
            ("(if 1 2)", SpecificError("ArityError")),
            ("(if 1 2 3 4)", SpecificError("expected 3 arguments, got 4")),
            ("(if)", SpecificError("expected 3 arguments, got 0")),
            ("(if 1 2 . 3)", SpecificError("ArityError")),
            ("(define x)", SpecificError("expected 2 arguments, got 1")),
            ("(define x 1 2)", SpecificError("ArityError")),
            // === DEFINE ===
            ("(define x 5)", EvalResult("nil")),
            ("(define 5 5)", SpecificError("first argument of define not symbol")),
            ("(define (x) 5)", SpecificError("first argument of define not symbol")),
            // === APPLICATION ===
            ("(1 2 3)", SpecificError("calling a non-function: 1")),
            ("(t)", SpecificError("calling a non-function: t")),
            ("((if t + *) 2 3)", EvalResult("5")),
            ("((if nil + *) 2 3)", EvalResult("6")),
            ("(+ 1 . 2)", SpecificError("fn call with improper list")),
            ("(+ . 2)", SpecificError("fn call with improper list")),
            ("(undefined 1)", SpecificError("Unbound variable: undefined")),
            // === UNBOUND ===
            ("y", SpecificError("Unbound variable: y")),
            ("(+ 1 y)", SpecificError("Unbound variable: y")),
            ("()", EvalResult("nil")), // () reads as nil, which is bound to itself
            ("(nil)", Error),
        ];

        run_comprehensive_tests(test_cases);
    }

    #[test]
    fn test_shared_state_environments() {
        let environments = vec![
            // Definition and overwrite
            TestEnvironment(vec![
                ("(define x 5)", EvalResult("nil")),
                ("x", EvalResult("5")),
                ("(define x 6)", EvalResult("nil")),
                ("x", EvalResult("6")),
                ("(define y (+ x 1))", EvalResult("nil")),
                ("(* x y)", EvalResult("42")),
            ]),
            // A failed define leaves no binding behind
            TestEnvironment(vec![
                ("(define z (/ 1 0))", SpecificError("Division by zero")),
                ("z", SpecificError("Unbound variable: z")),
                ("(define z 1)", EvalResult("nil")),
                ("(define z (+ z undefined))", Error),
                ("z", EvalResult("1")),
            ]),
            // Functions are first-class values
            TestEnvironment(vec![
                ("(define add +)", EvalResult("nil")),
                ("(add 1 2)", EvalResult("3")),
                ("(define + *)", EvalResult("nil")),
                ("(+ 3 4)", EvalResult("12")),
                ("(add 3 4)", EvalResult("7")),
            ]),
            // Special forms are recognised by symbol, not by binding
            TestEnvironment(vec![
                ("(define if 5)", EvalResult("nil")),
                ("if", EvalResult("5")),
                ("(if t 1 2)", EvalResult("1")),
                ("(define define 7)", EvalResult("nil")),
                ("define", EvalResult("7")),
            ]),
        ];

        run_tests_in_environment(environments);
    }

    #[test]
    fn test_eval_str() {
        let mut env = create_global_env();
        assert_eq!(env.eval_str("").unwrap(), Value::nil());
        assert_eq!(env.eval_str("(define a 2) (define b 3) (* a b)").unwrap(), val(6));

        // Parse errors evaluate nothing
        assert!(matches!(
            env.eval_str("(define c 1) (+ 1"),
            Err(Error::ParseError(_))
        ));
        assert!(env.get_by_name("c").is_none());

        // Evaluation errors keep definitions made before the failure
        assert_eq!(
            env.eval_str("(define d 4) (/ d 0) (define e 5)"),
            Err(Error::DivisionByZero)
        );
        assert_eq!(env.get_by_name("d"), Some(&val(4)));
        assert!(env.get_by_name("e").is_none());
    }

    #[test]
    fn test_register_builtin_function() {
        fn count_args(args: &Value) -> Result<Value, Error> {
            Ok(Value::number(args.iter().count() as i64))
        }

        let mut env = create_global_env();
        env.register_builtin_function("count", count_args);
        assert_eq!(env.eval_str("(count 1 (+ 1 1) t)").unwrap(), val(3));
        assert_eq!(env.eval_str("(count)").unwrap(), val(0));

        // Closures can capture state
        let offset = 100;
        env.register_builtin_function("offset", move |args| {
            let first = args.first()?;
            match first {
                Value::Number(n) => Ok(Value::number(n + offset)),
                _ => Err(Error::TypeError("offset needs a number".into())),
            }
        });
        assert_eq!(env.eval_str("(offset 5)").unwrap(), val(105));
        assert!(matches!(
            env.eval_str("(offset)"),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_global_env_bindings() {
        let env = create_global_env();
        let names: Vec<_> = env
            .get_all_bindings()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["*", "+", "-", "/", "nil", "t"]);

        let t = env.symbols().lookup("t").unwrap();
        assert_eq!(env.get(t), Some(&Value::symbol(t)));
        assert_eq!(env.get(SymbolId::NIL), Some(&Value::nil()));
        assert!(env.get_by_name("if").is_none());
        assert!(env.symbols().lookup("if").is_some());
        assert!(env.symbols().lookup("define").is_some());
    }

    #[test]
    fn test_functions_self_evaluate() {
        let mut env = create_global_env();
        let plus = env.get_by_name("+").cloned().unwrap();
        assert_eq!(eval(&plus, &mut env).unwrap(), plus);

        // A hand-built call with the function value in operator position
        let call = Value::list(vec![plus, val(2), val(3)], Value::nil());
        assert_eq!(eval(&call, &mut env).unwrap(), val(5));
    }

    #[test]
    fn test_arity_error_carries_expression() {
        let mut env = create_global_env();
        let err = env.eval_str("(if 1 2)").unwrap_err();
        assert_eq!(
            err,
            Error::arity_error_with_expr(3, 2, "(if 1 2)".to_owned())
        );

        let cases = vec![
            ("(if 1 2 . 3)", Error::arity_error_with_expr(3, 2, "(if 1 2 . 3)".into())),
            ("(define x 1 2)", Error::arity_error_with_expr(2, 3, "(define x 1 2)".into())),
            // The innermost malformed form is reported, not the enclosing one
            ("(if (define y) 1 2)", Error::arity_error_with_expr(2, 1, "(define y)".into())),
            ("(+ 1 (if t))", Error::arity_error_with_expr(3, 1, "(if t)".into())),
        ];
        for (input, expected) in cases {
            assert_eq!(env.eval_str(input), Err(expected), "{input}");
        }
    }
}
