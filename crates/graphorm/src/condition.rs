//! Composable condition trees.
//!
//! A [`Condition`] is one comparison plus child conditions attached with
//! [`Condition::and`] / [`Condition::or`]. Trees are built by value:
//!
//! ```ignore
//! use graphorm::Condition;
//!
//! let c = Condition::default()
//!     .field("Age")
//!     .is_greater_than(18)
//!     .and(|c| c.field("Active").is_true());
//! ```
//!
//! Rendering rules:
//!
//! - A leaf renders as `<field> <op> <placeholder>`; `is_null`, `is_true` and `is_false`
//!   bind nothing.
//! - A node with children renders as `(<self> and|or <child> ...)`.
//! - An empty `in` list renders the constant predicate `1=0` (`1=1` when inverted).

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::statement::ParamList;
use crate::value::Value;

/// Comparison operator of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Equal,
    Like,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Between,
    In,
    IsNull,
    True,
    False,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Equal,
        Operator::Like,
        Operator::GreaterThan,
        Operator::GreaterOrEqual,
        Operator::LessThan,
        Operator::LessOrEqual,
        Operator::Between,
        Operator::In,
        Operator::IsNull,
        Operator::True,
        Operator::False,
    ];

    /// Operator text before inversion.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Like => "like",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::IsNull => "is null",
            Operator::True => "true",
            Operator::False => "false",
        }
    }

    /// Operator text rendered with the given invert flag.
    pub fn rendered(self, invert: bool) -> &'static str {
        if invert {
            invert_symbol(self.symbol()).unwrap_or(self.symbol())
        } else {
            self.symbol()
        }
    }
}

const INVERSIONS: [(&str, &str); 10] = [
    ("=", "!="),
    (">", "<="),
    (">=", "<"),
    ("like", "not like"),
    ("between", "not between"),
    ("in", "not in"),
    ("is null", "is not null"),
    ("true", "false"),
    ("<", ">="),
    ("<=", ">"),
];

/// Negation of a rendered operator. Applying it twice returns the input.
pub fn invert_symbol(symbol: &str) -> Option<&'static str> {
    INVERSIONS.iter().find_map(|&(a, b)| {
        if a == symbol {
            Some(b)
        } else if b == symbol {
            Some(a)
        } else {
            None
        }
    })
}

/// Compare value of a leaf.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Operand {
    #[default]
    None,
    Single(Value),
    Range(Value, Value),
    List(Vec<Value>),
}

/// A condition node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    field: String,
    op: Operator,
    operand: Operand,
    invert: bool,
    or_joined: bool,
    children: Vec<Condition>,
}

/// Half-built `between`; finish with [`Between::and`].
#[derive(Debug, Clone)]
#[must_use = "a between condition needs its upper bound"]
pub struct Between {
    condition: Condition,
    low: Value,
}

impl Between {
    pub fn and(self, high: impl Into<Value>) -> Condition {
        let mut condition = self.condition;
        condition.op = Operator::Between;
        condition.operand = Operand::Range(self.low, high.into());
        condition
    }
}

impl Condition {
    /// A leaf from its parts. Shape errors surface when the condition is compiled.
    pub fn leaf(field: impl Into<String>, op: Operator, operand: Operand) -> Self {
        Self {
            field: field.into(),
            op,
            operand,
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.field = name.into();
        self
    }

    /// Negate this leaf's operator.
    pub fn not(mut self) -> Self {
        self.invert = true;
        self
    }

    fn compare(mut self, op: Operator, value: Value) -> Self {
        self.op = op;
        self.operand = Operand::Single(value);
        self
    }

    pub fn is_equal_to(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::Equal, value.into())
    }

    pub fn is_like(self, pattern: impl Into<Value>) -> Self {
        self.compare(Operator::Like, pattern.into())
    }

    /// `like '%value%'`.
    pub fn contains(self, value: impl Into<Value>) -> Self {
        let text = value.into().to_like_text();
        self.compare(Operator::Like, Value::Text(format!("%{text}%")))
    }

    pub fn is_greater_than(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::GreaterThan, value.into())
    }

    pub fn is_greater_or_equal(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::GreaterOrEqual, value.into())
    }

    pub fn is_less_than(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::LessThan, value.into())
    }

    pub fn is_less_or_equal(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::LessOrEqual, value.into())
    }

    pub fn is_in<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.op = Operator::In;
        self.operand = Operand::List(values.into_iter().map(Into::into).collect());
        self
    }

    /// `in` over the key values of records.
    pub fn is_in_records<R: Record>(self, records: &[R]) -> Self {
        self.is_in(records.iter().map(Record::key))
    }

    pub fn is_null(mut self) -> Self {
        self.op = Operator::IsNull;
        self.operand = Operand::None;
        self
    }

    pub fn is_true(mut self) -> Self {
        self.op = Operator::True;
        self.operand = Operand::None;
        self
    }

    pub fn is_false(mut self) -> Self {
        self.op = Operator::False;
        self.operand = Operand::None;
        self
    }

    pub fn is_between(self, low: impl Into<Value>) -> Between {
        Between {
            condition: self,
            low: low.into(),
        }
    }

    /// Attach an AND-joined child.
    pub fn and(mut self, build: impl FnOnce(Condition) -> Condition) -> Self {
        self.children.push(build(Condition::default()));
        self
    }

    /// Attach an OR-joined child.
    pub fn or(mut self, build: impl FnOnce(Condition) -> Condition) -> Self {
        let mut child = build(Condition::default());
        child.or_joined = true;
        self.children.push(child);
        self
    }

    pub(crate) fn joined_by_or(mut self) -> Self {
        self.or_joined = true;
        self
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn is_or_joined(&self) -> bool {
        self.or_joined
    }

    pub fn children(&self) -> &[Condition] {
        &self.children
    }

    pub(crate) fn render(&self, params: &mut ParamList) -> OrmResult<String> {
        let mut out = self.render_leaf(params)?;
        if self.children.is_empty() {
            return Ok(out);
        }
        for child in &self.children {
            out.push_str(joiner(child));
            out.push_str(&child.render(params)?);
        }
        Ok(format!("({out})"))
    }

    fn render_leaf(&self, params: &mut ParamList) -> OrmResult<String> {
        if self.field.is_empty() {
            return Err(OrmError::condition("condition has no field name"));
        }
        let dialect: Dialect = params.dialect();
        let column = dialect.quote(&self.field);
        let op = self.op.rendered(self.invert);

        match (self.op, &self.operand) {
            (Operator::IsNull, _) => Ok(format!("{column} {op}")),
            (Operator::True | Operator::False, _) => Ok(dialect.boolean_test(&column, op == "true")),
            (Operator::Between, Operand::Range(low, high)) => {
                if low.is_null() || high.is_null() {
                    return Err(OrmError::condition(format!(
                        "between on {} needs two non-null bounds",
                        self.field
                    )));
                }
                let low = params.push(low.clone());
                let high = params.push(high.clone());
                Ok(format!("{column} {op} {low} and {high}"))
            }
            (Operator::Between, _) => Err(OrmError::condition(format!(
                "between on {} needs a low and a high bound",
                self.field
            ))),
            (Operator::In, Operand::List(values)) => {
                if values.is_empty() {
                    return Ok(if self.invert { "1=1" } else { "1=0" }.to_string());
                }
                let placeholders: Vec<String> =
                    values.iter().map(|v| params.push(v.clone())).collect();
                Ok(format!("{column} {op} ({})", placeholders.join(", ")))
            }
            (Operator::In, Operand::Single(value)) => {
                let p = params.push(value.clone());
                Ok(format!("{column} {op} ({p})"))
            }
            (_, Operand::Single(Value::Null)) => Err(OrmError::condition(format!(
                "{} compares against null; use is_null",
                self.field
            ))),
            (_, Operand::Single(value)) => {
                let p = params.push(value.clone());
                Ok(format!("{column} {op} {p}"))
            }
            (_, Operand::None) => Err(OrmError::condition(format!(
                "{} has no compare value",
                self.field
            ))),
            (_, operand) => Err(OrmError::condition(format!(
                "{} cannot compare with {}",
                self.field,
                operand_kind(operand)
            ))),
        }
    }
}

fn operand_kind(operand: &Operand) -> &'static str {
    match operand {
        Operand::None => "nothing",
        Operand::Single(_) => "a single value",
        Operand::Range(..) => "a range",
        Operand::List(_) => "a list",
    }
}

fn joiner(c: &Condition) -> &'static str {
    if c.or_joined { " or " } else { " and " }
}

/// Render top-level conditions, joined left to right.
pub(crate) fn render_all(conditions: &[Condition], params: &mut ParamList) -> OrmResult<String> {
    let mut out = String::new();
    for (i, c) in conditions.iter().enumerate() {
        if i > 0 {
            out.push_str(joiner(c));
        }
        out.push_str(&c.render(params)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(conditions: &[Condition], dialect: Dialect) -> OrmResult<(String, Vec<Value>)> {
        let mut params = ParamList::new(dialect);
        let sql = render_all(conditions, &mut params)?;
        Ok((sql, params.into_values()))
    }

    #[test]
    fn and_child_is_parenthesized_with_parent() {
        let c = Condition::default()
            .field("Age")
            .is_greater_than(18)
            .and(|c| c.field("Active").is_true());
        let (sql, params) = compile(&[c], Dialect::SqlServer).unwrap();
        assert_eq!(sql, "([Age] > @p0 and coalesce([Active],0)=1)");
        assert_eq!(params, vec![Value::Int(18)]);
    }

    #[test]
    fn two_bound_leaves_in_declaration_order() {
        let c = Condition::default()
            .field("Age")
            .is_greater_than(18)
            .and(|c| c.field("Name").is_equal_to("Ada"));
        let (sql, params) = compile(&[c], Dialect::Postgres).unwrap();
        assert_eq!(sql, r#"("Age" > $1 and "Name" = $2)"#);
        assert_eq!(params, vec![Value::Int(18), Value::from("Ada")]);
    }

    #[test]
    fn or_joined_siblings() {
        let a = Condition::default().field("A").is_equal_to(1);
        let b = Condition::default().field("B").is_equal_to(2).joined_by_or();
        let c = Condition::default().field("C").is_null();
        let (sql, _) = compile(&[a, b, c], Dialect::Postgres).unwrap();
        assert_eq!(sql, r#""A" = $1 or "B" = $2 and "C" is null"#);
    }

    #[test]
    fn nested_or_child() {
        let c = Condition::default()
            .field("Status")
            .is_equal_to("open")
            .or(|c| {
                c.field("Priority")
                    .is_greater_or_equal(3)
                    .and(|c| c.field("Owner").is_null().not())
            });
        let (sql, params) = compile(&[c], Dialect::SqlServer).unwrap();
        assert_eq!(
            sql,
            "([Status] = @p0 or ([Priority] >= @p1 and [Owner] is not null))"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn between_binds_two_placeholders() {
        let c = Condition::default().field("Qty").is_between(1).and(10);
        let (sql, params) = compile(&[c], Dialect::SqlServer).unwrap();
        assert_eq!(sql, "[Qty] between @p0 and @p1");
        assert_eq!(params, vec![Value::Int(1), Value::Int(10)]);

        let c = Condition::default().field("Qty").not().is_between(1).and(10);
        let (sql, _) = compile(&[c], Dialect::SqlServer).unwrap();
        assert_eq!(sql, "[Qty] not between @p0 and @p1");
    }

    #[test]
    fn in_expands_one_placeholder_per_element() {
        let c = Condition::default().field("Id").is_in([3, 5, 8]);
        let (sql, params) = compile(&[c], Dialect::Postgres).unwrap();
        assert_eq!(sql, r#""Id" in ($1, $2, $3)"#);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_in_is_constant() {
        let c = Condition::default().field("Id").is_in(Vec::<i64>::new());
        assert_eq!(compile(&[c], Dialect::Postgres).unwrap().0, "1=0");
        let c = Condition::default().field("Id").not().is_in(Vec::<i64>::new());
        assert_eq!(compile(&[c], Dialect::Postgres).unwrap().0, "1=1");
    }

    #[test]
    fn contains_wraps_in_wildcards() {
        let c = Condition::default().field("Name").contains("ad");
        let (sql, params) = compile(&[c], Dialect::SqlServer).unwrap();
        assert_eq!(sql, "[Name] like @p0");
        assert_eq!(params, vec![Value::from("%ad%")]);
    }

    #[test]
    fn inverted_operators() {
        let cases = [
            (Operator::GreaterThan, "<="),
            (Operator::GreaterOrEqual, "<"),
            (Operator::LessThan, ">="),
            (Operator::LessOrEqual, ">"),
            (Operator::Equal, "!="),
            (Operator::Like, "not like"),
            (Operator::In, "not in"),
            (Operator::IsNull, "is not null"),
            (Operator::Between, "not between"),
            (Operator::True, "false"),
        ];
        for (op, expected) in cases {
            assert_eq!(op.rendered(true), expected, "{op:?}");
        }
    }

    #[test]
    fn inversion_is_an_involution() {
        for op in Operator::ALL {
            let once = op.rendered(true);
            assert_eq!(invert_symbol(once), Some(op.symbol()), "{op:?}");
        }
    }

    #[test]
    fn inverted_true_renders_false_test() {
        let c = Condition::default().field("Active").is_true().not();
        let (sql, params) = compile(&[c], Dialect::SqlServer).unwrap();
        assert_eq!(sql, "coalesce([Active],0)=0");
        assert!(params.is_empty());
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let c = Condition::default()
            .field("A")
            .is_in([1, 2])
            .or(|c| c.field("B").is_like("x%"));
        let first = compile(std::slice::from_ref(&c), Dialect::Postgres).unwrap();
        let second = compile(&[c], Dialect::Postgres).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_leaves_are_errors() {
        let no_field = Condition::default().is_equal_to(1);
        assert!(matches!(
            compile(&[no_field], Dialect::Postgres),
            Err(OrmError::Condition(_))
        ));

        let half_range = Condition::leaf("Qty", Operator::Between, Operand::Single(Value::Int(1)));
        assert!(matches!(
            compile(&[half_range], Dialect::Postgres),
            Err(OrmError::Condition(_))
        ));

        let null_compare = Condition::default().field("Name").is_equal_to(Value::Null);
        assert!(compile(&[null_compare], Dialect::Postgres).is_err());

        let missing = Condition::leaf("Qty", Operator::GreaterThan, Operand::None);
        assert!(compile(&[missing], Dialect::Postgres).is_err());

        let list_compare = Condition::leaf("Qty", Operator::Like, Operand::List(vec![Value::Int(1)]));
        assert!(compile(&[list_compare], Dialect::Postgres).is_err());
    }
}
