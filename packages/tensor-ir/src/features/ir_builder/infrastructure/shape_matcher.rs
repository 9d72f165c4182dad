//! Structural shape matching for `emit_match_shape`

use super::operator_table::render_dims;
use crate::features::ir_builder::errors::{BuilderError, BuilderResult};
use crate::shared::models::{PrimExpr, Shape};
use rustc_hash::FxHashMap;

/// Match `value` against `pattern`, binding pattern symbols in `symbols`.
///
/// Symbols bind to the first dimension they meet and must stay consistent
/// afterwards. Symbols are only committed when the whole pattern matches.
/// An unknown value shape defers the check to runtime.
pub fn match_shape(
    value: Option<&Shape>,
    pattern: &Shape,
    symbols: &mut FxHashMap<String, PrimExpr>,
) -> BuilderResult<()> {
    let value = match value {
        Some(v) => v,
        None => {
            tracing::trace!(pattern = %render_dims(pattern), "value shape unknown, deferring match");
            return Ok(());
        }
    };
    let mismatch = || BuilderError::shape_mismatch(render_dims(pattern), render_dims(value));

    if value.len() != pattern.len() {
        return Err(mismatch());
    }

    let mut fresh: FxHashMap<String, PrimExpr> = FxHashMap::default();
    for (dim, pat) in value.iter().zip(pattern) {
        match pat {
            PrimExpr::Int(expected) => {
                if let PrimExpr::Int(found) = dim {
                    if found != expected {
                        return Err(mismatch());
                    }
                }
            }
            PrimExpr::Sym(name) => {
                let bound = symbols.get(name).or_else(|| fresh.get(name));
                match bound {
                    Some(prev) => {
                        if !dims_compatible(prev, dim) {
                            return Err(mismatch());
                        }
                    }
                    None => {
                        fresh.insert(name.clone(), dim.clone());
                    }
                }
            }
        }
    }
    symbols.extend(fresh);
    Ok(())
}

/// Two concrete dims must agree; anything symbolic is left to runtime
fn dims_compatible(a: &PrimExpr, b: &PrimExpr) -> bool {
    match (a, b) {
        (PrimExpr::Int(x), PrimExpr::Int(y)) => x == y,
        _ => true,
    }
}
