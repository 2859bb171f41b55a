//! Client-side form validation run before any request leaves the device.

use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use crate::dao::models::{
    DeepCopyClass, DeepCopyClue, DeepCopyCourse, DeepCopyGame, DeepCopySidekick,
    DeepCopyTreasure, DeepCopyUser,
};

/// Minimum password length accepted by the backend.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validates an address of the form `local@domain.tld`.
///
/// # Examples
///
/// ```ignore
/// validate_email("a@b.co") // Ok
/// validate_email("abc")    // Err - no domain
/// validate_email("a@b")    // Err - no top-level domain
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let has_tld = email
        .rsplit_once('@')
        .and_then(|(_, domain)| domain.rsplit_once('.'))
        .is_some_and(|(host, tld)| {
            !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        });

    if !email.validate_email() || !has_tld {
        let mut err = ValidationError::new("email_format");
        err.message = Some("Please enter a valid email address".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a password has at least eight characters mixing upper
/// case, lower case and digits.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        let mut err = ValidationError::new("password_length");
        err.message = Some(
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters").into(),
        );
        return Err(err);
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        let mut err = ValidationError::new("password_strength");
        err.message = Some(
            "Password must contain an uppercase letter, a lowercase letter and a digit".into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Boolean form of [`validate_email`].
pub fn is_valid_email(email: &str) -> bool {
    validate_email(email).is_ok()
}

/// Boolean form of [`validate_password`].
pub fn is_valid_password(password: &str) -> bool {
    validate_password(password).is_ok()
}

fn require(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(format!("{} is required", field.replace('_', " ")).into());
        errors.add(field, err);
    }
}

fn require_id(errors: &mut ValidationErrors, field: &'static str, value: i64) {
    if value <= 0 {
        let mut err = ValidationError::new("required");
        err.message = Some(format!("{} must be selected", field.replace('_', " ")).into());
        errors.add(field, err);
    }
}

fn require_positive(errors: &mut ValidationErrors, field: &'static str, value: i64) {
    if value <= 0 {
        let mut err = ValidationError::new("range");
        err.message = Some(format!("{} must be greater than zero", field.replace('_', " ")).into());
        errors.add(field, err);
    }
}

fn finish(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// First human readable message out of a validation failure.
pub fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(_, list)| list.iter())
        .find_map(|err| err.message.as_ref().map(|message| message.to_string()))
        .unwrap_or_else(|| "Please review the highlighted fields".into())
}

impl Validate for DeepCopyUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        require(&mut errors, "username", &self.username);
        require(&mut errors, "firstname", &self.firstname);
        require(&mut errors, "lastname", &self.lastname);
        if let Err(e) = validate_email(&self.email) {
            errors.add("email", e);
        }

        // Editing an existing account may leave the password untouched.
        let password_required = self.id == 0 || !self.password.is_empty();
        if password_required {
            if let Err(e) = validate_password(&self.password) {
                errors.add("password", e);
            } else if self.password != self.confirm_password {
                let mut err = ValidationError::new("password_mismatch");
                err.message = Some("Passwords do not match".into());
                errors.add("confirm_password", err);
            }
        }

        finish(errors)
    }
}

impl Validate for DeepCopyCourse {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "course_code", &self.course_code);
        require(&mut errors, "course_title", &self.course_title);
        finish(errors)
    }
}

impl Validate for DeepCopyClass {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "class_code", &self.class_code);
        require(&mut errors, "schedule", &self.schedule);
        require_id(&mut errors, "course_id", self.course_id);
        finish(errors)
    }
}

impl Validate for DeepCopyClue {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "riddle", &self.riddle);
        require(&mut errors, "answer", &self.answer);
        require(&mut errors, "location_name", &self.location_name);
        require_positive(&mut errors, "points", self.points);
        finish(errors)
    }
}

impl Validate for DeepCopyTreasure {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "location_name", &self.location_name);
        require_positive(&mut errors, "points", self.points);
        finish(errors)
    }
}

impl Validate for DeepCopyGame {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "name", &self.name);
        require_id(&mut errors, "treasure_id", self.treasure_id);
        if self.is_time_bound && !self.is_no_expiration && self.end_time <= self.start_time {
            let mut err = ValidationError::new("time_range");
            err.message = Some("End time must be after start time".into());
            errors.add("end_time", err);
        }
        finish(errors)
    }
}

impl Validate for DeepCopySidekick {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "sidekick_type", &self.sidekick_type);
        finish(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("player.one@school.edu.ph"));
        assert!(!is_valid_email("abc"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@.co"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_validate_password() {
        assert!(is_valid_password("Abcdefg1"));
        assert!(!is_valid_password("abcdefgh")); // no upper, no digit
        assert!(!is_valid_password("ABCDEFG1")); // no lower
        assert!(!is_valid_password("Abc1")); // too short
    }

    #[test]
    fn test_new_user_requires_matching_passwords() {
        let mut user = DeepCopyUser {
            username: "jdelacruz".into(),
            firstname: "Juan".into(),
            lastname: "Dela Cruz".into(),
            email: "juan@school.edu".into(),
            password: "Abcdefg1".into(),
            confirm_password: "Abcdefg2".into(),
            ..DeepCopyUser::default()
        };
        let errors = user.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
        assert_eq!(first_message(&errors), "Passwords do not match");

        user.confirm_password = "Abcdefg1".into();
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_existing_user_may_keep_password() {
        let user = DeepCopyUser {
            id: 12,
            username: "jdelacruz".into(),
            firstname: "Juan".into(),
            lastname: "Dela Cruz".into(),
            email: "juan@school.edu".into(),
            ..DeepCopyUser::default()
        };
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let errors = DeepCopyCourse::default().validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("course_code"));
        assert!(fields.contains_key("course_title"));

        let errors = DeepCopyGame::default().validate().unwrap_err();
        assert!(errors.field_errors().contains_key("treasure_id"));
    }
}
