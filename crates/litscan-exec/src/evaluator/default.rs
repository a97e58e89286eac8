//! Default tree-walking evaluator.
//!
//! Expressions are lowered into a compiled node tree once; functions and
//! sub-plans are resolved at compile time so evaluation never looks
//! anything up by name.

use std::sync::Arc;

use litscan_common::error::ExecResult;
use litscan_common::EvalError;

use super::{ExprContext, ExprEvaluator, ExprState, InitContext};
use crate::context::SubqueryExec;
use crate::expr::{BinaryOp, ScalarExpr, SubPlanId, UnaryOp};
use crate::types::DataType;
use crate::value::Value;

/// Evaluator for the built-in expression language.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEvaluator;

impl DefaultEvaluator {
    /// Creates a new evaluator.
    pub fn new() -> Self {
        Self
    }

    fn lower(&self, expr: &ScalarExpr, init: &mut InitContext<'_>) -> ExecResult<Node> {
        let node = match expr {
            ScalarExpr::Literal(v) => Node::Const(v.clone()),
            ScalarExpr::Column { index, .. } => Node::Column(*index),
            ScalarExpr::Param { index, .. } => Node::Param(*index),
            ScalarExpr::Binary { left, op, right } => Node::Binary(
                Box::new(self.lower(left, init)?),
                *op,
                Box::new(self.lower(right, init)?),
            ),
            ScalarExpr::Unary { op, expr } => Node::Unary(*op, Box::new(self.lower(expr, init)?)),
            ScalarExpr::IsNull(expr) => Node::IsNull(Box::new(self.lower(expr, init)?)),
            ScalarExpr::Cast { expr, data_type } => {
                Node::Cast(Box::new(self.lower(expr, init)?), data_type.clone())
            }
            ScalarExpr::Case {
                when_then,
                else_result,
            } => {
                let arms = when_then
                    .iter()
                    .map(|(w, t)| Ok((self.lower(w, init)?, self.lower(t, init)?)))
                    .collect::<ExecResult<Vec<_>>>()?;
                let otherwise = else_result
                    .as_ref()
                    .map(|e| self.lower(e, init).map(Box::new))
                    .transpose()?;
                Node::Case(arms, otherwise)
            }
            ScalarExpr::Function { name, args } => {
                let func = ScalarFunc::resolve(name)?;
                Node::Function(func, self.lower_all(args, init)?)
            }
            ScalarExpr::Array(elems) => Node::Array(self.lower_all(elems, init)?),
            ScalarExpr::SubPlan { id, args, .. } => {
                let exec = init.attach_subplan(*id)?;
                Node::SubPlan {
                    id: *id,
                    exec,
                    args: self.lower_all(args, init)?,
                }
            }
        };
        Ok(node)
    }

    fn lower_all(&self, exprs: &[ScalarExpr], init: &mut InitContext<'_>) -> ExecResult<Vec<Node>> {
        exprs.iter().map(|e| self.lower(e, init)).collect()
    }
}

impl ExprEvaluator for DefaultEvaluator {
    fn compile(
        &self,
        expr: &ScalarExpr,
        init: &mut InitContext<'_>,
    ) -> ExecResult<Box<dyn ExprState>> {
        let root = self.lower(expr, init)?;
        init.scope().reserve(root.footprint())?;
        Ok(Box::new(CompiledExpr { root }))
    }
}

/// Compiled state produced by [`DefaultEvaluator`].
#[derive(Debug)]
struct CompiledExpr {
    root: Node,
}

impl ExprState for CompiledExpr {
    fn evaluate(&self, ctx: &mut ExprContext<'_>) -> ExecResult<Value> {
        self.root.eval(ctx)
    }
}

#[derive(Debug)]
enum Node {
    Const(Value),
    Column(usize),
    Param(usize),
    Binary(Box<Node>, BinaryOp, Box<Node>),
    Unary(UnaryOp, Box<Node>),
    IsNull(Box<Node>),
    Cast(Box<Node>, DataType),
    Case(Vec<(Node, Node)>, Option<Box<Node>>),
    Function(ScalarFunc, Vec<Node>),
    Array(Vec<Node>),
    SubPlan {
        id: SubPlanId,
        exec: Arc<dyn SubqueryExec>,
        args: Vec<Node>,
    },
}

impl Node {
    /// Approximate bytes held by this subtree.
    fn footprint(&self) -> usize {
        let own = std::mem::size_of::<Node>();
        let children: usize = match self {
            Node::Const(v) => v.heap_size(),
            Node::Column(_) | Node::Param(_) => 0,
            Node::Binary(l, _, r) => l.footprint() + r.footprint(),
            Node::Unary(_, e) | Node::IsNull(e) | Node::Cast(e, _) => e.footprint(),
            Node::Case(arms, otherwise) => {
                arms.iter()
                    .map(|(w, t)| w.footprint() + t.footprint())
                    .sum::<usize>()
                    + otherwise.as_ref().map_or(0, |e| e.footprint())
            }
            Node::Function(_, args) | Node::Array(args) | Node::SubPlan { args, .. } => {
                args.iter().map(Node::footprint).sum()
            }
        };
        own + children
    }

    fn eval(&self, ctx: &mut ExprContext<'_>) -> ExecResult<Value> {
        match self {
            // Literals, input columns and params are shared with their owners,
            // so they are only ever handed out read-only.
            Node::Const(v) => Ok(v.clone().make_read_only()),
            Node::Column(index) => Ok(ctx.column(*index)?.clone().make_read_only()),
            Node::Param(index) => Ok(ctx.param(*index)?.clone().make_read_only()),
            Node::Binary(left, op, right) => {
                let l = left.eval(ctx)?;
                let r = right.eval(ctx)?;
                Ok(evaluate_binary_op(*op, &l, &r)?)
            }
            Node::Unary(op, expr) => {
                let v = expr.eval(ctx)?;
                Ok(evaluate_unary_op(*op, &v)?)
            }
            Node::IsNull(expr) => Ok(Value::Boolean(expr.eval(ctx)?.is_null())),
            Node::Cast(expr, data_type) => Ok(expr.eval(ctx)?.cast(data_type)?),
            Node::Case(arms, otherwise) => {
                for (when, then) in arms {
                    if when.eval(ctx)?.to_bool() == Some(true) {
                        return then.eval(ctx);
                    }
                }
                match otherwise {
                    Some(e) => e.eval(ctx),
                    None => Ok(Value::Null),
                }
            }
            Node::Function(func, args) => {
                let vals = args
                    .iter()
                    .map(|a| a.eval(ctx))
                    .collect::<ExecResult<Vec<_>>>()?;
                Ok(func.call(&vals)?)
            }
            Node::Array(elems) => {
                let vals = elems
                    .iter()
                    .map(|e| e.eval(ctx))
                    .collect::<ExecResult<Vec<_>>>()?;
                Ok(Value::array(vals))
            }
            Node::SubPlan { id, exec, args } => {
                let vals = args
                    .iter()
                    .map(|a| a.eval(ctx))
                    .collect::<ExecResult<Vec<_>>>()?;
                exec.execute(&vals)
                    .map(Value::make_read_only)
                    .map_err(|e| {
                        EvalError::Subquery {
                            subplan: id.0,
                            message: e.to_string(),
                        }
                        .into()
                    })
            }
        }
    }
}

/// Built-in scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarFunc {
    Upper,
    Lower,
    Length,
    Abs,
    Coalesce,
    ArrayAppend,
    Cardinality,
}

impl ScalarFunc {
    fn resolve(name: &str) -> Result<Self, EvalError> {
        match name.to_lowercase().as_str() {
            "upper" => Ok(ScalarFunc::Upper),
            "lower" => Ok(ScalarFunc::Lower),
            "length" | "char_length" => Ok(ScalarFunc::Length),
            "abs" => Ok(ScalarFunc::Abs),
            "coalesce" => Ok(ScalarFunc::Coalesce),
            "array_append" => Ok(ScalarFunc::ArrayAppend),
            "cardinality" => Ok(ScalarFunc::Cardinality),
            _ => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }

    fn call(self, args: &[Value]) -> Result<Value, EvalError> {
        let null = Value::Null;
        let first = args.first().unwrap_or(&null);
        match self {
            ScalarFunc::Upper | ScalarFunc::Lower | ScalarFunc::Length if first.is_null() => {
                Ok(Value::Null)
            }
            ScalarFunc::Upper => Ok(Value::String(
                first.to_string_value().unwrap_or_default().to_uppercase(),
            )),
            ScalarFunc::Lower => Ok(Value::String(
                first.to_string_value().unwrap_or_default().to_lowercase(),
            )),
            ScalarFunc::Length => {
                let s = first.to_string_value().unwrap_or_default();
                checked_count("length", s.chars().count())
            }
            ScalarFunc::Abs => match first {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::type_mismatch("abs", "integer out of range")),
                Value::BigInt(i) => i
                    .checked_abs()
                    .map(Value::BigInt)
                    .ok_or_else(|| EvalError::type_mismatch("abs", "bigint out of range")),
                Value::Double(f) => Ok(Value::Double(f.abs())),
                other => Err(EvalError::type_mismatch(
                    "abs",
                    format!("expected a number, got {}", other.data_type()),
                )),
            },
            ScalarFunc::Coalesce => Ok(args
                .iter()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null)),
            ScalarFunc::ArrayAppend => {
                let elem = args.get(1).cloned().unwrap_or(Value::Null);
                match first {
                    Value::Null => Ok(Value::array(vec![elem])),
                    Value::Array(a) => {
                        // Only arrays built during this evaluation are
                        // read-write; anything else is copied before the push.
                        let mut a = a.clone();
                        a.push(elem);
                        Ok(Value::Array(a))
                    }
                    other => Err(EvalError::type_mismatch(
                        "array_append",
                        format!("expected an array, got {}", other.data_type()),
                    )),
                }
            }
            ScalarFunc::Cardinality => match first {
                Value::Null => Ok(Value::Null),
                Value::Array(a) => checked_count("cardinality", a.len()),
                other => Err(EvalError::type_mismatch(
                    "cardinality",
                    format!("expected an array, got {}", other.data_type()),
                )),
            },
        }
    }
}

fn checked_count(func: &str, n: usize) -> Result<Value, EvalError> {
    i64::try_from(n)
        .map(Value::BigInt)
        .map_err(|_| EvalError::type_mismatch(func, "bigint out of range"))
}

/// Evaluates a binary operation.
fn evaluate_binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::And => {
            return Ok(match (left.to_bool(), right.to_bool()) {
                (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            });
        }
        BinaryOp::Or => {
            return Ok(match (left.to_bool(), right.to_bool()) {
                (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            });
        }
        _ => {}
    }

    // Everything else is strict
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    match op {
        BinaryOp::Eq => Ok(Value::Boolean(left == right)),
        BinaryOp::NotEq => Ok(Value::Boolean(left != right)),
        BinaryOp::Lt => Ok(Value::Boolean(left < right)),
        BinaryOp::LtEq => Ok(Value::Boolean(left <= right)),
        BinaryOp::Gt => Ok(Value::Boolean(left > right)),
        BinaryOp::GtEq => Ok(Value::Boolean(left >= right)),

        BinaryOp::Plus => evaluate_arithmetic(op, left, right, i64::checked_add, |a, b| a + b),
        BinaryOp::Minus => evaluate_arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Multiply => {
            evaluate_arithmetic(op, left, right, i64::checked_mul, |a, b| a * b)
        }
        BinaryOp::Divide => {
            if right.to_f64() == Some(0.0) {
                return Err(EvalError::DivisionByZero);
            }
            evaluate_arithmetic(op, left, right, i64::checked_div, |a, b| a / b)
        }
        BinaryOp::Modulo => {
            let l = integer_operand(op, left)?;
            let r = integer_operand(op, right)?;
            if r == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::BigInt(l.wrapping_rem(r)))
        }

        BinaryOp::Concat => {
            let l = left.to_string_value().unwrap_or_default();
            let r = right.to_string_value().unwrap_or_default();
            Ok(Value::String(format!("{}{}", l, r)))
        }

        BinaryOp::And | BinaryOp::Or => Ok(Value::Null),
    }
}

fn integer_operand(op: BinaryOp, v: &Value) -> Result<i64, EvalError> {
    v.to_i64().ok_or_else(|| {
        EvalError::type_mismatch(op.to_string(), format!("expected an integer, got {}", v.data_type()))
    })
}

/// Evaluates arithmetic operations.
fn evaluate_arithmetic<F, G>(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: F,
    float_op: G,
) -> Result<Value, EvalError>
where
    F: Fn(i64, i64) -> Option<i64>,
    G: Fn(f64, f64) -> f64,
{
    // Use floating point if either operand is float
    if matches!(left, Value::Double(_)) || matches!(right, Value::Double(_)) {
        let mismatch = || {
            EvalError::type_mismatch(
                op.to_string(),
                format!("{} and {}", left.data_type(), right.data_type()),
            )
        };
        let l = left.to_f64().ok_or_else(mismatch)?;
        let r = right.to_f64().ok_or_else(mismatch)?;
        return Ok(Value::Double(float_op(l, r)));
    }

    let l = integer_operand(op, left)?;
    let r = integer_operand(op, right)?;
    int_op(l, r)
        .map(Value::BigInt)
        .ok_or_else(|| EvalError::type_mismatch(op.to_string(), "bigint out of range"))
}

/// Evaluates a unary operation.
fn evaluate_unary_op(op: UnaryOp, val: &Value) -> Result<Value, EvalError> {
    if val.is_null() {
        return Ok(Value::Null);
    }

    match op {
        UnaryOp::Not => val
            .to_bool()
            .map(|b| Value::Boolean(!b))
            .ok_or_else(|| EvalError::type_mismatch("NOT", val.data_type().to_string())),
        UnaryOp::Minus => match val {
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::BigInt(i) => Ok(Value::BigInt(i.wrapping_neg())),
            Value::Double(f) => Ok(Value::Double(-f)),
            other => Err(EvalError::type_mismatch(
                "-",
                format!("expected a number, got {}", other.data_type()),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScope;
    use crate::value::ExpandedArray;

    fn eval(expr: ScalarExpr) -> ExecResult<Value> {
        eval_with(expr, &[], &[])
    }

    fn eval_with(expr: ScalarExpr, params: &[Value], row: &[Value]) -> ExecResult<Value> {
        let mut scope = MemoryScope::unlimited("row");
        let state = {
            let mut init = InitContext::detached(&mut scope);
            DefaultEvaluator::new().compile(&expr, &mut init)?
        };
        let mut ctx = ExprContext::new(params, row, &mut scope);
        state.evaluate(&mut ctx)
    }

    #[test]
    fn test_arithmetic() {
        let e = ScalarExpr::binary(ScalarExpr::lit_i64(7), BinaryOp::Multiply, ScalarExpr::lit_i64(6));
        assert_eq!(eval(e).unwrap(), Value::BigInt(42));

        let e = ScalarExpr::binary(
            ScalarExpr::lit(Value::double(1.5)),
            BinaryOp::Plus,
            ScalarExpr::lit_i64(1),
        );
        assert_eq!(eval(e).unwrap(), Value::Double(2.5));
    }

    #[test]
    fn test_division_by_zero() {
        let e = ScalarExpr::binary(ScalarExpr::lit_i64(1), BinaryOp::Divide, ScalarExpr::lit_i64(0));
        let err = eval(e).unwrap_err();
        assert_eq!(err.to_string(), "evaluation error: division by zero");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let e = ScalarExpr::binary(
            ScalarExpr::lit_i64(i64::MAX),
            BinaryOp::Plus,
            ScalarExpr::lit_i64(1),
        );
        assert!(eval(e).is_err());
    }

    #[test]
    fn test_three_valued_logic() {
        let null = ScalarExpr::lit(Value::Null);
        let f = ScalarExpr::lit(Value::boolean(false));
        let t = ScalarExpr::lit(Value::boolean(true));

        assert_eq!(
            eval(ScalarExpr::binary(null.clone(), BinaryOp::And, f)).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            eval(ScalarExpr::binary(null.clone(), BinaryOp::Or, t)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval(ScalarExpr::binary(null, BinaryOp::Eq, ScalarExpr::lit_i64(1))).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_case_and_cast() {
        let case = ScalarExpr::Case {
            when_then: vec![
                (ScalarExpr::lit(Value::Null), ScalarExpr::lit_str("null")),
                (ScalarExpr::lit(Value::boolean(true)), ScalarExpr::lit_str("yes")),
            ],
            else_result: Some(Box::new(ScalarExpr::lit_str("no"))),
        };
        assert_eq!(eval(case).unwrap(), Value::string("yes"));

        let cast = ScalarExpr::Cast {
            expr: Box::new(ScalarExpr::lit_str(" 12 ")),
            data_type: DataType::Int,
        };
        assert_eq!(eval(cast).unwrap(), Value::Int(12));
    }

    #[test]
    fn test_functions() {
        assert_eq!(
            eval(ScalarExpr::call("UPPER", vec![ScalarExpr::lit_str("abc")])).unwrap(),
            Value::string("ABC")
        );
        assert_eq!(
            eval(ScalarExpr::call("length", vec![ScalarExpr::lit_str("héllo")])).unwrap(),
            Value::BigInt(5)
        );
        assert_eq!(
            eval(ScalarExpr::call(
                "coalesce",
                vec![ScalarExpr::lit(Value::Null), ScalarExpr::lit_i64(3)]
            ))
            .unwrap(),
            Value::BigInt(3)
        );
        assert_eq!(
            eval(ScalarExpr::call("abs", vec![ScalarExpr::lit(Value::int(-4))])).unwrap(),
            Value::Int(4)
        );
    }

    #[test]
    fn test_unknown_function_fails_at_compile() {
        let mut scope = MemoryScope::unlimited("row");
        let mut init = InitContext::detached(&mut scope);
        let err = DefaultEvaluator::new()
            .compile(&ScalarExpr::call("nope", vec![]), &mut init)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "evaluation error: function nope() does not exist"
        );
    }

    #[test]
    fn test_array_constructor_is_read_write() {
        let arr = eval(ScalarExpr::Array(vec![ScalarExpr::lit_i64(1), ScalarExpr::lit_i64(2)]))
            .unwrap();
        assert!(arr.is_read_write());
        assert_eq!(
            eval(ScalarExpr::call(
                "cardinality",
                vec![ScalarExpr::Array(vec![ScalarExpr::lit_i64(1)])]
            ))
            .unwrap(),
            Value::BigInt(1)
        );
    }

    #[test]
    fn test_array_append_respects_access() {
        let shared = ExpandedArray::new(vec![Value::int(1)]);
        let read_only = Value::Array(shared.to_read_only());

        let appended = eval_with(
            ScalarExpr::call(
                "array_append",
                vec![ScalarExpr::column("a", 0), ScalarExpr::lit(Value::int(2))],
            ),
            &[],
            &[read_only],
        )
        .unwrap();

        assert_eq!(shared.len(), 1);
        match appended {
            Value::Array(a) => {
                assert_eq!(a.len(), 2);
                assert!(!a.shares_buffer_with(&shared));
            }
            other => panic!("expected array, got {:?}", other),
        }

        // Input columns never alias into the result, even read-write ones.
        eval_with(
            ScalarExpr::call(
                "array_append",
                vec![ScalarExpr::column("a", 0), ScalarExpr::lit(Value::int(2))],
            ),
            &[],
            &[Value::Array(shared.clone())],
        )
        .unwrap();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn test_array_append_leaves_literals_and_params_alone() {
        let literal = ExpandedArray::new(vec![Value::int(1)]);
        let param = ExpandedArray::new(vec![Value::int(5)]);

        let expr = ScalarExpr::call(
            "array_append",
            vec![ScalarExpr::lit(Value::Array(literal.clone())), ScalarExpr::lit_i64(2)],
        );
        let mut scope = MemoryScope::unlimited("row");
        let state = {
            let mut init = InitContext::detached(&mut scope);
            DefaultEvaluator::new().compile(&expr, &mut init).unwrap()
        };
        for _ in 0..3 {
            let mut ctx = ExprContext::new(&[], &[], &mut scope);
            let v = state.evaluate(&mut ctx).unwrap();
            assert_eq!(v, Value::array(vec![Value::int(1), Value::BigInt(2)]));
        }
        assert_eq!(literal.len(), 1);

        let params = [Value::Array(param.clone())];
        let v = eval_with(
            ScalarExpr::call(
                "array_append",
                vec![
                    ScalarExpr::param(0, DataType::Array(Box::new(DataType::Int))),
                    ScalarExpr::lit_i64(9),
                ],
            ),
            &params,
            &[],
        )
        .unwrap();
        assert_eq!(v, Value::array(vec![Value::int(5), Value::BigInt(9)]));
        assert_eq!(param.to_vec(), vec![Value::int(5)]);
    }

    #[test]
    fn test_counts_are_bigint() {
        assert_eq!(
            eval(ScalarExpr::call(
                "cardinality",
                vec![ScalarExpr::Array(vec![ScalarExpr::lit_i64(1), ScalarExpr::lit_i64(2)])]
            ))
            .unwrap(),
            Value::BigInt(2)
        );
        assert_eq!(checked_count("length", 3).unwrap(), Value::BigInt(3));
    }

    #[test]
    fn test_params_and_columns() {
        let e = ScalarExpr::binary(
            ScalarExpr::param(0, DataType::BigInt),
            BinaryOp::Plus,
            ScalarExpr::column("c", 1),
        );
        let v = eval_with(e.clone(), &[Value::BigInt(10)], &[Value::Null, Value::int(5)]).unwrap();
        assert_eq!(v, Value::BigInt(15));

        assert!(eval_with(e, &[], &[]).is_err());
    }

    #[test]
    fn test_compile_charges_scope() {
        let mut scope = MemoryScope::new("row", 8);
        let mut init = InitContext::detached(&mut scope);
        let err = DefaultEvaluator::new()
            .compile(&ScalarExpr::lit_i64(1), &mut init)
            .unwrap_err();
        assert!(matches!(err, litscan_common::ExecError::OutOfMemory { .. }));
    }
}
