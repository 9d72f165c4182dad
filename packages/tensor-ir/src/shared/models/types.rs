//! Type and shape vocabulary for IR values
//!
//! The tensor type system proper lives outside this crate. These types carry
//! just enough information for the builder to annotate vars, unify
//! annotations and match shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tensor element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float16,
    Float32,
    Float64,
    Int32,
    Int64,
    Uint8,
    Bool,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Bool => "bool",
        }
    }

    /// Parse a dtype name
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "float16" | "f16" => Ok(Self::Float16),
            "float32" | "f32" => Ok(Self::Float32),
            "float64" | "f64" => Ok(Self::Float64),
            "int32" | "i32" => Ok(Self::Int32),
            "int64" | "i64" => Ok(Self::Int64),
            "uint8" | "u8" => Ok(Self::Uint8),
            "bool" => Ok(Self::Bool),
            _ => Err(format!("Unknown dtype '{}'", s)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dimension of a shape: concrete extent or named symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimExpr {
    Int(i64),
    Sym(String),
}

impl PrimExpr {
    pub fn sym(name: impl Into<String>) -> Self {
        Self::Sym(name.into())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Sym(_) => None,
        }
    }
}

impl From<i64> for PrimExpr {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for PrimExpr {
    fn from(name: &str) -> Self {
        Self::Sym(name.to_string())
    }
}

/// Shape of a tensor value
pub type Shape = Vec<PrimExpr>;

/// Build a shape from anything convertible to dimensions
///
/// ```rust,ignore
/// let s = shape(["n", "m"]);
/// ```
pub fn shape<I, D>(dims: I) -> Shape
where
    I: IntoIterator<Item = D>,
    D: Into<PrimExpr>,
{
    dims.into_iter().map(Into::into).collect()
}

/// Static type of an IR value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Tensor with optionally known rank and element type
    Tensor {
        ndim: Option<usize>,
        dtype: Option<DataType>,
    },
    /// First-class shape value
    Shape,
    /// Opaque object, compatible with every other type
    Object,
    Tuple(Vec<Type>),
}

impl Type {
    pub fn tensor(ndim: usize, dtype: DataType) -> Self {
        Self::Tensor {
            ndim: Some(ndim),
            dtype: Some(dtype),
        }
    }

    /// Tensor of unknown rank and dtype
    pub fn dyn_tensor() -> Self {
        Self::Tensor {
            ndim: None,
            dtype: None,
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Self::Tensor { .. })
    }

    pub fn ndim(&self) -> Option<usize> {
        match self {
            Self::Tensor { ndim, .. } => *ndim,
            _ => None,
        }
    }

    pub fn dtype(&self) -> Option<DataType> {
        match self {
            Self::Tensor { dtype, .. } => *dtype,
            _ => None,
        }
    }

    /// Merge two descriptions of the same value into the most specific one.
    ///
    /// Returns `None` when the two cannot describe the same value.
    pub fn unify(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Type::Object, t) | (t, Type::Object) => Some(t.clone()),
            (Type::Shape, Type::Shape) => Some(Type::Shape),
            (
                Type::Tensor { ndim: a, dtype: da },
                Type::Tensor { ndim: b, dtype: db },
            ) => {
                let ndim = merge_known(*a, *b)?;
                let dtype = merge_known(*da, *db)?;
                Some(Type::Tensor { ndim, dtype })
            }
            (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => xs
                .iter()
                .zip(ys)
                .map(|(x, y)| x.unify(y))
                .collect::<Option<Vec<_>>>()
                .map(Type::Tuple),
            _ => None,
        }
    }
}

fn merge_known<T: PartialEq + Copy>(a: Option<T>, b: Option<T>) -> Option<Option<T>> {
    match (a, b) {
        (Some(x), Some(y)) if x != y => None,
        (Some(x), _) | (_, Some(x)) => Some(Some(x)),
        (None, None) => Some(None),
    }
}
