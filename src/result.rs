// src/result.rs

//! Helpers over `std::result::Result` that have no std counterpart.

/// Flattens a nested result by mapping the outer error into the inner
/// error type.
///
/// When the outer arm is `Ok`, the inner result is returned as-is; when it
/// is `Err`, the outer error is converted through `map_outer`.
pub fn collapse_nested<T, Inner, Outer>(
    result: Result<Result<T, Inner>, Outer>,
    map_outer: impl FnOnce(Outer) -> Inner,
) -> Result<T, Inner> {
    match result {
        Ok(inner) => inner,
        Err(outer) => Err(map_outer(outer)),
    }
}
