use crate::Error;
use dynamodb_utils::sdk::types::{AttributeValue, ComparisonOperator, Condition};
use std::str::FromStr;

/// `ScanFilter`の比較演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
    Contains,
    NotContains,
    Null,
    NotNull,
    In,
    Between,
    BeginsWith,
}

/// `where_op`で使える演算子と、その`ComparisonOperator`
pub const OPERATORS: &[(&str, Operator)] = &[
    ("=", Operator::Eq),
    ("!=", Operator::Ne),
    ("<>", Operator::Ne),
    ("<=", Operator::Le),
    ("<", Operator::Lt),
    (">=", Operator::Ge),
    (">", Operator::Gt),
    ("like", Operator::Contains),
    ("not like", Operator::NotContains),
];

impl Operator {
    pub fn comparison_operator(self) -> ComparisonOperator {
        match self {
            Operator::Eq => ComparisonOperator::Eq,
            Operator::Ne => ComparisonOperator::Ne,
            Operator::Le => ComparisonOperator::Le,
            Operator::Lt => ComparisonOperator::Lt,
            Operator::Ge => ComparisonOperator::Ge,
            Operator::Gt => ComparisonOperator::Gt,
            Operator::Contains => ComparisonOperator::Contains,
            Operator::NotContains => ComparisonOperator::NotContains,
            Operator::Null => ComparisonOperator::Null,
            Operator::NotNull => ComparisonOperator::NotNull,
            Operator::In => ComparisonOperator::In,
            Operator::Between => ComparisonOperator::Between,
            Operator::BeginsWith => ComparisonOperator::BeginsWith,
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        OPERATORS
            .iter()
            .find(|(candidate, _)| *candidate == token)
            .map(|(_, operator)| *operator)
            .ok_or_else(|| Error::InvalidOperator {
                operator: token.to_owned(),
            })
    }
}

/// カラム1つ分の条件
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub operator: Operator,
    pub values: Vec<AttributeValue>,
}

impl Filter {
    pub(crate) fn new(operator: Operator, values: Vec<AttributeValue>) -> Self {
        Self { operator, values }
    }

    pub(crate) fn to_condition(&self) -> Result<Condition, Error> {
        dynamodb_utils::condition(self.operator.comparison_operator(), self.values.clone())
            .map_err(Into::into)
    }
}
