//! Filter expression tree.

use crate::record::Value;
use crate::schema::PropertyId;

/// Comparison applied by one filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    /// Matches NULL values; the condition value is ignored.
    IsNull,
    /// Case-insensitive substring match (strings only).
    Contains,
    StartsWith,
    EndsWith,
    /// Case-insensitive whole-value match (strings only).
    FullString,
}

impl MatchOp {
    pub(crate) const ALL: [Self; 11] = [
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::Less,
        Self::LessOrEqual,
        Self::IsNull,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::FullString,
    ];

    pub fn is_text_match(self) -> bool {
        matches!(
            self,
            Self::Contains | Self::StartsWith | Self::EndsWith | Self::FullString
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::Greater | Self::GreaterOrEqual | Self::Less | Self::LessOrEqual
        )
    }

    pub(crate) fn wire_tag(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }
}

/// One comparison leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub property: PropertyId,
    pub op: MatchOp,
    pub value: Value,
}

/// Composable filter over one view's properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Condition(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn condition(property: PropertyId, op: MatchOp, value: impl Into<Value>) -> Self {
        Self::Condition(Condition {
            property,
            op,
            value: value.into(),
        })
    }

    pub fn eq(property: PropertyId, value: impl Into<Value>) -> Self {
        Self::condition(property, MatchOp::Equal, value)
    }

    pub fn contains(property: PropertyId, value: &str) -> Self {
        Self::condition(property, MatchOp::Contains, value)
    }

    pub fn is_null(property: PropertyId) -> Self {
        Self::condition(property, MatchOp::IsNull, Value::Str(None))
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }

    /// Visits every leaf in depth-first order.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut leaves = Vec::new();
        self.collect(&mut leaves);
        leaves
    }

    fn collect<'a>(&'a self, leaves: &mut Vec<&'a Condition>) {
        match self {
            Self::Condition(condition) => leaves.push(condition),
            Self::And(children) | Self::Or(children) => {
                children.iter().for_each(|child| child.collect(leaves))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, MatchOp};
    use crate::schema::property::number;

    #[test]
    fn wire_tags_are_stable() {
        for op in MatchOp::ALL {
            assert_eq!(MatchOp::from_wire_tag(op.wire_tag()), Some(op));
        }
        assert_eq!(MatchOp::from_wire_tag(200), None);
    }

    #[test]
    fn conditions_walk_nested_groups() {
        let filter = Filter::or(vec![
            Filter::eq(number::TYPE, 64),
            Filter::and(vec![
                Filter::contains(number::NUMBER, "555"),
                Filter::is_null(number::LABEL),
            ]),
        ]);
        let properties: Vec<_> = filter
            .conditions()
            .into_iter()
            .map(|condition| condition.property)
            .collect();
        assert_eq!(properties, vec![number::TYPE, number::NUMBER, number::LABEL]);
    }
}
