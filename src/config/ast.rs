//! Abstract Syntax Tree types for the configuration language.

use std::fmt;

/// Complete AST of a parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigAst {
    /// Sections in file order
    pub sections: Vec<Section>,
}

impl ConfigAst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sections of one kind, in file order.
    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }
}

/// Kinds of section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Material,
    Object,
    Layer,
    Space,
    Net,
}

impl SectionKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "material" => Some(Self::Material),
            "object" => Some(Self::Object),
            "layer" => Some(Self::Layer),
            "space" => Some(Self::Space),
            "net" => Some(Self::Net),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Material => "material",
            Self::Object => "object",
            Self::Layer => "layer",
            Self::Space => "space",
            Self::Net => "net",
        }
    }
}

/// A titled section: `kind "title" { entries }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub title: String,
    pub entries: Vec<Entry>,
    /// Line of the section keyword
    pub line: usize,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }
}

/// A `key = value` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
    pub line: usize,
}

/// Entry values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Number(f64),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numbers without a fractional part that fit an `i32`.
    pub fn as_i32(&self) -> Option<i32> {
        let n = self.as_f64()?;
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
            Some(n as i32)
        } else {
            None
        }
    }

    /// Elements of a list; a scalar counts as a one-element list.
    pub fn items(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Number(_) => "number",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
        }
    }
}
