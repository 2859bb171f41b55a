//! Backend endpoint table and request construction.

pub mod endpoints;
/// Request descriptions and their reqwest builders.
pub mod request;

use crate::error::ApiError;

/// Placeholder substituted by ids in endpoint templates.
pub const PLACEHOLDER: &str = "%@";

/// Substitute `ids` into `template`, left to right.
///
/// The number of ids must match the number of placeholders exactly.
pub fn fill(template: &'static str, ids: &[i64]) -> Result<String, ApiError> {
    let expected = template.matches(PLACEHOLDER).count();
    if expected != ids.len() {
        return Err(ApiError::Route {
            template,
            expected,
            actual: ids.len(),
        });
    }

    let mut path = String::with_capacity(template.len() + ids.len() * 4);
    let mut segments = template.split(PLACEHOLDER);
    if let Some(head) = segments.next() {
        path.push_str(head);
    }
    for (segment, id) in segments.zip(ids) {
        path.push_str(&id.to_string());
        path.push_str(segment);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_substitutes_in_order() {
        assert_eq!(
            fill(endpoints::UPDATE_USER, &[7, 1]).unwrap(),
            "update/user/7/requestor/1"
        );
        assert_eq!(fill(endpoints::LOGIN, &[]).unwrap(), "login");
    }

    #[test]
    fn fill_rejects_wrong_arity() {
        let err = fill(endpoints::UPDATE_USER, &[7]).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Route {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }
}
