use crate::error::ApiError;
use crate::uploads::{StagedFile, StagedUpload};

/// Text fields of the registration form, as submitted.
#[derive(Debug, Default, Clone)]
pub struct RegisterForm {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A form whose required fields are all present and non-blank.
#[derive(Debug, Clone)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

/// File parts of the registration form.
#[derive(Debug, Clone, Copy)]
pub struct RegisterFiles<'a> {
    pub avatar: &'a [StagedFile],
    pub cover_image: &'a [StagedFile],
}

impl RegisterForm {
    pub fn from_upload(up: &mut StagedUpload) -> Self {
        Self {
            full_name: up.take_text("fullName"),
            email: up.take_text("email"),
            username: up.take_text("username"),
            password: up.take_text("password"),
        }
    }

    /// Checks fullName, email, username and password in that order,
    /// failing on the first one that is missing or blank.
    pub fn validate(self) -> Result<Registration, ApiError> {
        Ok(Registration {
            full_name: required("fullName", self.full_name)?,
            email: required("email", self.email)?,
            username: required("username", self.username)?,
            password: required("password", self.password)?,
        })
    }
}

impl<'a> RegisterFiles<'a> {
    pub fn from_upload(up: &'a StagedUpload) -> Self {
        Self {
            avatar: up.files("avatar"),
            cover_image: up.files("coverImage"),
        }
    }
}

fn required(key: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::InvalidInput(format!("{} is required", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> RegisterForm {
        RegisterForm {
            full_name: Some("Jane Doe".into()),
            email: Some("jane@example.com".into()),
            username: Some("JaneDoe".into()),
            password: Some("hunter22".into()),
        }
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::InvalidInput(m) => m,
            other => panic!("unexpected error kind: {:?}", other),
        }
    }

    #[test]
    fn accepts_complete_form_untouched() {
        let reg = full_form().validate().unwrap();
        assert_eq!(reg.full_name, "Jane Doe");
        assert_eq!(reg.username, "JaneDoe");
        assert_eq!(reg.password, "hunter22");
    }

    #[test]
    fn names_each_missing_or_blank_field() {
        let cases: [(&str, fn(&mut RegisterForm, Option<String>)); 4] = [
            ("fullName", |f, v| f.full_name = v),
            ("email", |f, v| f.email = v),
            ("username", |f, v| f.username = v),
            ("password", |f, v| f.password = v),
        ];
        for (key, set) in cases {
            for value in [None, Some(String::new()), Some("  \t\n".into())] {
                let mut form = full_form();
                set(&mut form, value.clone());
                assert_eq!(
                    message(form.validate().unwrap_err()),
                    format!("{} is required", key),
                    "{} = {:?}",
                    key,
                    value
                );
            }
        }
    }

    #[test]
    fn reports_first_missing_field() {
        let form = RegisterForm {
            username: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(message(form.validate().unwrap_err()), "fullName is required");
    }
}
