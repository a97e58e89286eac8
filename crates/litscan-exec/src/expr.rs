//! Scalar expressions handed to the executor by the planner.
//!
//! Expressions form a closed tree. The executor itself only inspects them
//! for sub-plan references; everything else is the evaluator's business.

use std::fmt;

use crate::schema::Schema;
use crate::types::DataType;
use crate::value::Value;

/// Identifier of a sub-plan registered with the surrounding plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubPlanId(pub u32);

impl fmt::Display for SubPlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubPlan {}", self.0)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Comparison
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,

    // Arithmetic
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,

    // Logical
    /// `AND`
    And,
    /// `OR`
    Or,

    // String
    /// `||`
    Concat,
}

impl BinaryOp {
    /// Returns true if this is a comparison operator.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    /// Returns true if this is a logical operator.
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Concat => "||",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `NOT`
    Not,
    /// `-`
    Minus,
}

/// A scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    /// Constant value.
    Literal(Value),

    /// Column of the row being filtered or projected.
    Column {
        /// Column name for display.
        name: String,
        /// Column index in the input row.
        index: usize,
    },

    /// Outer parameter supplied by the enclosing plan.
    Param {
        /// Parameter index.
        index: usize,
        /// Declared type.
        data_type: DataType,
    },

    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<ScalarExpr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<ScalarExpr>,
    },

    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<ScalarExpr>,
    },

    /// IS NULL check.
    IsNull(Box<ScalarExpr>),

    /// CAST expression.
    Cast {
        /// Expression to cast.
        expr: Box<ScalarExpr>,
        /// Target data type.
        data_type: DataType,
    },

    /// Searched CASE expression.
    Case {
        /// WHEN-THEN pairs.
        when_then: Vec<(ScalarExpr, ScalarExpr)>,
        /// ELSE result.
        else_result: Option<Box<ScalarExpr>>,
    },

    /// Scalar function call.
    Function {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<ScalarExpr>,
    },

    /// ARRAY[...] constructor.
    Array(Vec<ScalarExpr>),

    /// Scalar sub-query evaluated once per call with the given arguments.
    SubPlan {
        /// Sub-plan to invoke.
        id: SubPlanId,
        /// Correlation arguments passed to the sub-plan.
        args: Vec<ScalarExpr>,
        /// Result type.
        data_type: DataType,
    },
}

impl ScalarExpr {
    /// Creates a literal expression.
    pub fn lit(value: Value) -> Self {
        ScalarExpr::Literal(value)
    }

    /// Creates a literal integer.
    pub fn lit_i64(value: i64) -> Self {
        ScalarExpr::Literal(Value::BigInt(value))
    }

    /// Creates a literal string.
    pub fn lit_str(value: impl Into<String>) -> Self {
        ScalarExpr::Literal(Value::String(value.into()))
    }

    /// Creates a column reference.
    pub fn column(name: impl Into<String>, index: usize) -> Self {
        ScalarExpr::Column {
            name: name.into(),
            index,
        }
    }

    /// Creates an outer parameter reference.
    pub fn param(index: usize, data_type: DataType) -> Self {
        ScalarExpr::Param { index, data_type }
    }

    /// Creates a binary expression.
    pub fn binary(left: ScalarExpr, op: BinaryOp, right: ScalarExpr) -> Self {
        ScalarExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Creates a function call.
    pub fn call(name: impl Into<String>, args: Vec<ScalarExpr>) -> Self {
        ScalarExpr::Function {
            name: name.into(),
            args,
        }
    }

    /// Creates a sub-plan reference.
    pub fn subplan(id: u32, args: Vec<ScalarExpr>, data_type: DataType) -> Self {
        ScalarExpr::SubPlan {
            id: SubPlanId(id),
            args,
            data_type,
        }
    }

    /// Returns the direct children of this expression.
    pub fn children(&self) -> Vec<&ScalarExpr> {
        match self {
            ScalarExpr::Literal(_) | ScalarExpr::Column { .. } | ScalarExpr::Param { .. } => {
                vec![]
            }
            ScalarExpr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ScalarExpr::Unary { expr, .. }
            | ScalarExpr::IsNull(expr)
            | ScalarExpr::Cast { expr, .. } => vec![expr.as_ref()],
            ScalarExpr::Case {
                when_then,
                else_result,
            } => {
                let mut out: Vec<&ScalarExpr> =
                    when_then.iter().flat_map(|(w, t)| [w, t]).collect();
                if let Some(e) = else_result {
                    out.push(e.as_ref());
                }
                out
            }
            ScalarExpr::Function { args, .. }
            | ScalarExpr::Array(args)
            | ScalarExpr::SubPlan { args, .. } => args.iter().collect(),
        }
    }

    /// Returns true if any node of this tree is a sub-plan.
    pub fn contains_subplans(&self) -> bool {
        matches!(self, ScalarExpr::SubPlan { .. })
            || self.children().into_iter().any(ScalarExpr::contains_subplans)
    }

    /// Collects the sub-plan ids referenced by this tree, in visit order.
    pub fn subplan_ids(&self) -> Vec<SubPlanId> {
        let mut ids = Vec::new();
        self.collect_subplans(&mut ids);
        ids
    }

    fn collect_subplans(&self, ids: &mut Vec<SubPlanId>) {
        if let ScalarExpr::SubPlan { id, .. } = self {
            ids.push(*id);
        }
        for child in self.children() {
            child.collect_subplans(ids);
        }
    }

    /// Returns the result type of this expression over `input`.
    pub fn data_type(&self, input: &Schema) -> DataType {
        match self {
            ScalarExpr::Literal(v) => v.data_type(),
            ScalarExpr::Column { index, .. } => input
                .field(*index)
                .map(|f| f.data_type.clone())
                .unwrap_or(DataType::Null),
            ScalarExpr::Param { data_type, .. }
            | ScalarExpr::Cast { data_type, .. }
            | ScalarExpr::SubPlan { data_type, .. } => data_type.clone(),
            ScalarExpr::Binary { left, op, right } => {
                if op.is_comparison() || op.is_logical() {
                    DataType::Boolean
                } else if *op == BinaryOp::Concat {
                    DataType::Text
                } else {
                    left.data_type(input).promote(&right.data_type(input))
                }
            }
            ScalarExpr::Unary { op, expr } => match op {
                UnaryOp::Not => DataType::Boolean,
                UnaryOp::Minus => expr.data_type(input),
            },
            ScalarExpr::IsNull(_) => DataType::Boolean,
            ScalarExpr::Case {
                when_then,
                else_result,
            } => when_then
                .iter()
                .map(|(_, then)| then.data_type(input))
                .chain(else_result.iter().map(|e| e.data_type(input)))
                .find(|t| *t != DataType::Null)
                .unwrap_or(DataType::Null),
            ScalarExpr::Function { name, args } => function_return_type(name, args, input),
            ScalarExpr::Array(elems) => {
                let elem = elems
                    .iter()
                    .map(|e| e.data_type(input))
                    .find(|t| *t != DataType::Null)
                    .unwrap_or(DataType::Null);
                DataType::Array(Box::new(elem))
            }
        }
    }
}

fn function_return_type(name: &str, args: &[ScalarExpr], input: &Schema) -> DataType {
    match name.to_lowercase().as_str() {
        "upper" | "lower" => DataType::Text,
        "length" | "char_length" | "cardinality" => DataType::BigInt,
        "abs" => args
            .first()
            .map(|a| a.data_type(input))
            .unwrap_or(DataType::Null),
        "coalesce" => args
            .iter()
            .map(|a| a.data_type(input))
            .find(|t| *t != DataType::Null)
            .unwrap_or(DataType::Null),
        "array_append" => match args.first().map(|a| a.data_type(input)) {
            Some(DataType::Array(elem)) => DataType::Array(elem),
            _ => DataType::Array(Box::new(
                args.get(1)
                    .map(|a| a.data_type(input))
                    .unwrap_or(DataType::Null),
            )),
        },
        _ => DataType::Null,
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Literal(Value::String(s)) => write!(f, "'{}'", s),
            ScalarExpr::Literal(v) => write!(f, "{}", v),
            ScalarExpr::Column { name, .. } => write!(f, "{}", name),
            ScalarExpr::Param { index, .. } => write!(f, "${}", index),
            ScalarExpr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            ScalarExpr::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", expr),
                UnaryOp::Minus => write!(f, "-{}", expr),
            },
            ScalarExpr::IsNull(expr) => write!(f, "{} IS NULL", expr),
            ScalarExpr::Cast { expr, data_type } => write!(f, "CAST({} AS {})", expr, data_type),
            ScalarExpr::Case { .. } => write!(f, "CASE"),
            ScalarExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ScalarExpr::Array(elems) => {
                write!(f, "ARRAY[")?;
                write_list(f, elems)?;
                write!(f, "]")
            }
            ScalarExpr::SubPlan { id, .. } => write!(f, "({})", id),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[ScalarExpr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}
