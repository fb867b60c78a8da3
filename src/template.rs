//! Command templates: static shell text interleaved with holes.
//!
//! A [`Template`] is the input to the whole pipeline. It is an ordered list
//! of [`Segment`]s, each either literal shell syntax written by the caller or
//! a hole carrying a runtime [`Value`]. Templates are immutable once built.

use std::fmt;

/// A runtime value substituted into a hole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Arbitrary text, always inserted as one literal word.
    Str(String),
    /// A stringified number or boolean.
    Scalar(String),
    /// A sequence that expands to one literal word per element.
    List(Vec<String>),
    /// Text the caller asserts is already valid shell syntax (e.g. `|`).
    /// Inserted unescaped, and only in unquoted context.
    Raw(String),
    /// A sequence joined into a single word with an explicit separator.
    /// Unlike [`Value::List`] this is allowed inside quotes.
    Joined { items: Vec<String>, separator: String },
}

impl Value {
    /// Mark `text` as pre-validated shell syntax.
    pub fn raw(text: impl Into<String>) -> Self {
        Value::Raw(text.into())
    }

    /// Join `items` with `separator` into a single word.
    pub fn joined<I, S>(items: I, separator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Joined {
            items: items.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }

    /// Short name of the value kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Raw(_) => "raw",
            Value::Joined { .. } => "joined list",
        }
    }

    /// The single-word text of this value, or `None` for a multi-word list.
    pub fn as_word(&self) -> Option<String> {
        match self {
            Value::Str(s) | Value::Scalar(s) | Value::Raw(s) => Some(s.clone()),
            Value::Joined { items, separator } => Some(items.join(separator)),
            Value::List(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(value.to_string())
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl<T: Into<String>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<String>> From<&[T]> for Value {
    fn from(values: &[T]) -> Self {
        Value::List(values.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<String>, const N: usize> From<[T; N]> for Value {
    fn from(values: [T; N]) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// One piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Hole(Value),
}

/// An immutable command template.
///
/// A plain string is a template with zero holes; it goes through exactly the
/// same lexer, parser and executor as any other template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Start building a template.
    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Hole values in template order.
    pub fn holes(&self) -> impl Iterator<Item = &Value> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Hole(value) => Some(value),
            Segment::Literal(_) => None,
        })
    }

    /// The value of the `index`-th hole.
    pub fn hole(&self, index: usize) -> Option<&Value> {
        self.holes().nth(index)
    }

    pub fn hole_count(&self) -> usize {
        self.holes().count()
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Self::from_segments(vec![Segment::Literal(text.to_string())])
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Self::from_segments(vec![Segment::Literal(text)])
    }
}

/// Shows holes as `{0}`, `{1}`, ... so values never leak into diagnostics.
impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hole = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Hole(_) => {
                    write!(f, "{{{hole}}}")?;
                    hole += 1;
                }
            }
        }
        Ok(())
    }
}

/// Incremental [`Template`] construction.
#[derive(Debug, Default)]
pub struct TemplateBuilder {
    segments: Vec<Segment>,
}

impl TemplateBuilder {
    pub fn literal(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Literal(text.into()));
        self
    }

    pub fn hole(mut self, value: impl Into<Value>) -> Self {
        self.segments.push(Segment::Hole(value.into()));
        self
    }

    /// Shorthand for `.hole(Value::raw(text))`.
    pub fn raw(self, text: impl Into<String>) -> Self {
        self.hole(Value::raw(text))
    }

    pub fn build(self) -> Template {
        Template::from_segments(self.segments)
    }
}

/// Build a [`Template`] from string literals and `{expr}` holes.
///
/// ```
/// let name = "O'Brien";
/// let t = shl::template!("echo " {name} " | tr a-z A-Z");
/// assert_eq!(t.hole_count(), 1);
/// ```
#[macro_export]
macro_rules! template {
    (@acc $builder:expr;) => {
        $builder.build()
    };
    (@acc $builder:expr; $lit:literal $($rest:tt)*) => {
        $crate::template!(@acc $builder.literal($lit); $($rest)*)
    };
    (@acc $builder:expr; { $value:expr } $($rest:tt)*) => {
        $crate::template!(@acc $builder.hole($value); $($rest)*)
    };
    ($($tokens:tt)*) => {
        $crate::template!(@acc $crate::Template::builder(); $($tokens)*)
    };
}
