//! Lookup expressions: the operator part of a leaf filter.
//!
//! A lookup expression is a chain of `__`-separated tokens. Every token but
//! the last must be a [`Transform`] (which maps the field value to another
//! type, e.g. `year` on a date); the last token is a [`Comparison`], or a
//! transform followed by an implied `exact`.
//!
//! | Expression | Transforms | Comparison |
//! |------------|------------|------------|
//! | `startswith` | - | `startswith` |
//! | `year` | `year` | `exact` |
//! | `date__gte` | `date` | `gte` |
//! | `pk__in` | `pk` | `in` |

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::field::FieldType;

/// Separator between the tokens of a composite lookup expression.
pub const LOOKUP_SEPARATOR: &str = "__";

/// A value transform applied before the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// Calendar year.
    Year,
    /// Month, 1 to 12.
    Month,
    /// Day of the month.
    Day,
    /// Day of the week, 1 (Sunday) to 7 (Saturday).
    WeekDay,
    /// Quarter of the year, 1 to 4.
    Quarter,
    /// Hour of a date-time, 0 to 23.
    Hour,
    /// Minute of a date-time.
    Minute,
    /// Second of a date-time.
    Second,
    /// Date part of a date-time.
    Date,
    /// Primary key of a related record.
    Pk,
}

impl Transform {
    /// Parses a single transform token.
    pub fn from_token(token: &str) -> Option<Self> {
        let transform = match token {
            "year" => Transform::Year,
            "month" => Transform::Month,
            "day" => Transform::Day,
            "week_day" => Transform::WeekDay,
            "quarter" => Transform::Quarter,
            "hour" => Transform::Hour,
            "minute" => Transform::Minute,
            "second" => Transform::Second,
            "date" => Transform::Date,
            "pk" => Transform::Pk,
            _ => return None,
        };
        Some(transform)
    }

    /// The type of the transformed value.
    pub fn output(self) -> FieldType {
        match self {
            Transform::Date => FieldType::Date,
            _ => FieldType::Integer,
        }
    }

    /// The token naming this transform.
    pub fn as_str(self) -> &'static str {
        match self {
            Transform::Year => "year",
            Transform::Month => "month",
            Transform::Day => "day",
            Transform::WeekDay => "week_day",
            Transform::Quarter => "quarter",
            Transform::Hour => "hour",
            Transform::Minute => "minute",
            Transform::Second => "second",
            Transform::Date => "date",
            Transform::Pk => "pk",
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a comparison expects on its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// A single scalar of the field's type.
    Scalar,
    /// A non-empty list of scalars.
    List,
    /// A `[low, high]` pair.
    Pair,
    /// A boolean flag.
    Flag,
    /// A regular expression string.
    Pattern,
}

/// The final comparison of a lookup expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Equal (`exact`). Against `null`, tests for null.
    Exact,
    /// Equal, ignoring case (`iexact`).
    IExact,
    /// Substring match (`contains`).
    Contains,
    /// Substring match, ignoring case (`icontains`).
    IContains,
    /// Prefix match (`startswith`).
    StartsWith,
    /// Prefix match, ignoring case (`istartswith`).
    IStartsWith,
    /// Suffix match (`endswith`).
    EndsWith,
    /// Suffix match, ignoring case (`iendswith`).
    IEndsWith,
    /// Regular expression match (`regex`).
    Regex,
    /// Regular expression match, ignoring case (`iregex`).
    IRegex,
    /// Greater than (`gt`).
    Gt,
    /// Greater than or equal (`gte`).
    Gte,
    /// Less than (`lt`).
    Lt,
    /// Less than or equal (`lte`).
    Lte,
    /// Member of a list (`in`).
    In,
    /// Between two values, inclusive (`range`).
    Range,
    /// Null test against a boolean flag (`isnull`).
    IsNull,
}

impl Comparison {
    /// Parses a single comparison token.
    pub fn from_token(token: &str) -> Option<Self> {
        let comparison = match token {
            "exact" => Comparison::Exact,
            "iexact" => Comparison::IExact,
            "contains" => Comparison::Contains,
            "icontains" => Comparison::IContains,
            "startswith" => Comparison::StartsWith,
            "istartswith" => Comparison::IStartsWith,
            "endswith" => Comparison::EndsWith,
            "iendswith" => Comparison::IEndsWith,
            "regex" => Comparison::Regex,
            "iregex" => Comparison::IRegex,
            "gt" => Comparison::Gt,
            "gte" => Comparison::Gte,
            "lt" => Comparison::Lt,
            "lte" => Comparison::Lte,
            "in" => Comparison::In,
            "range" => Comparison::Range,
            "isnull" => Comparison::IsNull,
            _ => return None,
        };
        Some(comparison)
    }

    /// The token naming this comparison.
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Exact => "exact",
            Comparison::IExact => "iexact",
            Comparison::Contains => "contains",
            Comparison::IContains => "icontains",
            Comparison::StartsWith => "startswith",
            Comparison::IStartsWith => "istartswith",
            Comparison::EndsWith => "endswith",
            Comparison::IEndsWith => "iendswith",
            Comparison::Regex => "regex",
            Comparison::IRegex => "iregex",
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
            Comparison::In => "in",
            Comparison::Range => "range",
            Comparison::IsNull => "isnull",
        }
    }

    /// The right-hand side this comparison expects.
    pub fn shape(self) -> ValueShape {
        match self {
            Comparison::In => ValueShape::List,
            Comparison::Range => ValueShape::Pair,
            Comparison::IsNull => ValueShape::Flag,
            Comparison::Regex | Comparison::IRegex => ValueShape::Pattern,
            _ => ValueShape::Scalar,
        }
    }

    /// Returns `true` for the case-insensitive text comparisons.
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Comparison::IExact
                | Comparison::IContains
                | Comparison::IStartsWith
                | Comparison::IEndsWith
                | Comparison::IRegex
        )
    }

    /// Evaluates an ordering-based comparison.
    ///
    /// Non-ordering comparisons return `false`.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Exact => ordering == Ordering::Equal,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
            _ => false,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed lookup expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupExpr {
    transforms: Vec<Transform>,
    comparison: Comparison,
}

impl LookupExpr {
    /// The implied lookup of a leaf without `lookup_expression`.
    pub fn exact() -> Self {
        LookupExpr {
            transforms: Vec::new(),
            comparison: Comparison::Exact,
        }
    }

    /// Builds an expression from its parts.
    pub fn new(transforms: Vec<Transform>, comparison: Comparison) -> Self {
        LookupExpr {
            transforms,
            comparison,
        }
    }

    /// Parses a lookup expression such as `date__gte`.
    ///
    /// Returns `None` for an empty expression or an unknown token.
    pub fn parse(expression: &str) -> Option<Self> {
        let tokens: Vec<&str> = expression.split(LOOKUP_SEPARATOR).collect();
        let (last, init) = tokens.split_last()?;

        let mut transforms = init
            .iter()
            .map(|token| Transform::from_token(token))
            .collect::<Option<Vec<_>>>()?;

        let comparison = match Comparison::from_token(last) {
            Some(comparison) => comparison,
            None => {
                transforms.push(Transform::from_token(last)?);
                Comparison::Exact
            }
        };

        Some(LookupExpr {
            transforms,
            comparison,
        })
    }

    /// Parses an optional expression, defaulting to [`LookupExpr::exact`].
    ///
    /// An empty string counts as absent.
    pub fn parse_optional(expression: Option<&str>) -> Option<Self> {
        match expression {
            None | Some("") => Some(LookupExpr::exact()),
            Some(expression) => LookupExpr::parse(expression),
        }
    }

    /// The transforms, in application order.
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// The final comparison.
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// Walks the chain from `field_type`, returning the type the comparison
    /// applies to, or the first token the type does not support.
    pub fn resolve(&self, field_type: FieldType) -> Result<FieldType, &'static str> {
        let mut current = field_type;
        for transform in &self.transforms {
            if !current.transforms().contains(transform) {
                return Err(transform.as_str());
            }
            current = transform.output();
        }
        if !current.comparisons().contains(&self.comparison) {
            return Err(self.comparison.as_str());
        }
        Ok(current)
    }
}

impl Default for LookupExpr {
    fn default() -> Self {
        LookupExpr::exact()
    }
}

impl FromStr for LookupExpr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LookupExpr::parse(s).ok_or_else(|| format!("'{s}' is not a valid lookup expression"))
    }
}

impl fmt::Display for LookupExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for transform in &self.transforms {
            write!(f, "{transform}{LOOKUP_SEPARATOR}")?;
        }
        write!(f, "{}", self.comparison)
    }
}
