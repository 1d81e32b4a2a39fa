use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::store_json::{load_or_default, lock, save};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 4;

/// Signup and login failures. Each message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Username and password are required.")]
    MissingCredentials,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Username must be at least 3 characters and password at least 4 characters.")]
    TooShort,
    #[error("A valid email is required for lecturer signup.")]
    InvalidEmail,
    #[error("{0} username already exists.")]
    UsernameTaken(Role),
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Account awaiting admin approval.")]
    AwaitingApproval,
    #[error("Invalid admin credentials.")]
    InvalidAdminCredentials,
    #[error("No lecturer named '{0}'.")]
    UnknownLecturer(String),
    #[error("Failed to hash password.")]
    Hashing,
    #[error("Failed to save accounts: {0}")]
    Storage(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Lecturer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => f.write_str("Student"),
            Role::Lecturer => f.write_str("Lecturer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "lecturer" => Ok(Role::Lecturer),
            other => Err(format!("unknown role '{}' (expected student or lecturer)", other)),
        }
    }
}

/// A user account as seen by the rest of the application.
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Always true for students.
    pub approved: bool,
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SignupForm {
    pub role: Role,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignupOutcome {
    /// The account can log in right away.
    Active,
    /// A lecturer account that needs admin approval first.
    PendingApproval,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingLecturer {
    pub username: String,
    pub email: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct UserDb {
    #[serde(default)]
    students: BTreeMap<String, StudentRecord>,
    #[serde(default)]
    lecturers: BTreeMap<String, LecturerRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StudentRecord {
    password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LecturerRecord {
    password: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    approved: bool,
}

/// File-backed account store. Loaded once, written back after each change.
pub struct AccountStore {
    path: PathBuf,
    db: Mutex<UserDb>,
}

impl AccountStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let db: UserDb = load_or_default(&path);
        info!(
            path = %path.display(),
            students = db.students.len(),
            lecturers = db.lecturers.len(),
            "account store loaded"
        );
        Self {
            path,
            db: Mutex::new(db),
        }
    }

    pub fn signup(&self, form: &SignupForm) -> Result<SignupOutcome, AccountError> {
        validate_signup(form)?;
        let mut db = lock(&self.db);
        let taken = match form.role {
            Role::Student => db.students.contains_key(&form.username),
            Role::Lecturer => db.lecturers.contains_key(&form.username),
        };
        if taken {
            return Err(AccountError::UsernameTaken(form.role));
        }

        let password = hash_password(&form.password)?;
        let mut next = db.clone();
        let outcome = match form.role {
            Role::Student => {
                next.students.insert(form.username.clone(), StudentRecord { password });
                SignupOutcome::Active
            }
            Role::Lecturer => {
                next.lecturers.insert(
                    form.username.clone(),
                    LecturerRecord {
                        password,
                        email: form.email.clone().unwrap_or_default().trim().to_string(),
                        approved: false,
                    },
                );
                SignupOutcome::PendingApproval
            }
        };
        self.persist(&mut db, next)?;
        info!(username = %form.username, role = %form.role, "account created");
        Ok(outcome)
    }

    pub fn login(&self, role: Role, username: &str, password: &str) -> Result<Account, AccountError> {
        let db = lock(&self.db);
        match role {
            Role::Student => {
                let record = db
                    .students
                    .get(username)
                    .ok_or(AccountError::InvalidCredentials)?;
                if !verify_password(password, &record.password) {
                    return Err(AccountError::InvalidCredentials);
                }
                Ok(Account {
                    username: username.to_string(),
                    password_hash: record.password.clone(),
                    role,
                    approved: true,
                    email: None,
                })
            }
            Role::Lecturer => {
                let record = db
                    .lecturers
                    .get(username)
                    .ok_or(AccountError::InvalidCredentials)?;
                if !record.approved {
                    return Err(AccountError::AwaitingApproval);
                }
                if !verify_password(password, &record.password) {
                    return Err(AccountError::InvalidCredentials);
                }
                Ok(Account {
                    username: username.to_string(),
                    password_hash: record.password.clone(),
                    role,
                    approved: true,
                    email: Some(record.email.clone()),
                })
            }
        }
    }

    pub fn account(&self, role: Role, username: &str) -> Option<Account> {
        let db = lock(&self.db);
        match role {
            Role::Student => db.students.get(username).map(|r| Account {
                username: username.to_string(),
                password_hash: r.password.clone(),
                role,
                approved: true,
                email: None,
            }),
            Role::Lecturer => db.lecturers.get(username).map(|r| Account {
                username: username.to_string(),
                password_hash: r.password.clone(),
                role,
                approved: r.approved,
                email: Some(r.email.clone()),
            }),
        }
    }

    pub fn pending_lecturers(&self) -> Vec<PendingLecturer> {
        lock(&self.db)
            .lecturers
            .iter()
            .filter(|(_, r)| !r.approved)
            .map(|(name, r)| PendingLecturer {
                username: name.clone(),
                email: r.email.clone(),
            })
            .collect()
    }

    pub fn approve_lecturer(&self, username: &str) -> Result<(), AccountError> {
        let mut db = lock(&self.db);
        let mut next = db.clone();
        let record = next
            .lecturers
            .get_mut(username)
            .ok_or_else(|| AccountError::UnknownLecturer(username.to_string()))?;
        record.approved = true;
        self.persist(&mut db, next)?;
        info!(username, "lecturer approved");
        Ok(())
    }

    /// Removes a lecturer account outright.
    pub fn reject_lecturer(&self, username: &str) -> Result<(), AccountError> {
        let mut db = lock(&self.db);
        let mut next = db.clone();
        if next.lecturers.remove(username).is_none() {
            return Err(AccountError::UnknownLecturer(username.to_string()));
        }
        self.persist(&mut db, next)?;
        info!(username, "lecturer rejected and removed");
        Ok(())
    }

    /// Saves `next` and only then makes it the in-memory state.
    fn persist(&self, current: &mut UserDb, next: UserDb) -> Result<(), AccountError> {
        save(&self.path, &next).map_err(|e| AccountError::Storage(e.to_string()))?;
        *current = next;
        Ok(())
    }
}

pub fn validate_signup(form: &SignupForm) -> Result<(), AccountError> {
    if form.username.is_empty() || form.password.is_empty() {
        return Err(AccountError::MissingCredentials);
    }
    if form.password != form.confirm_password {
        return Err(AccountError::PasswordMismatch);
    }
    if form.username.trim().chars().count() < MIN_USERNAME_LEN
        || form.password.chars().count() < MIN_PASSWORD_LEN
    {
        return Err(AccountError::TooShort);
    }
    if form.role == Role::Lecturer {
        let valid_email = form
            .email
            .as_deref()
            .map(|e| !e.trim().is_empty() && e.contains('@'))
            .unwrap_or(false);
        if !valid_email {
            return Err(AccountError::InvalidEmail);
        }
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            AccountError::Hashing
        })
}

/// A stored hash that cannot be parsed never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
