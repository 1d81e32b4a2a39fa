use std::path::PathBuf;

use rag::{Answer, Assistant, RagError, Role, Session, SignupForm, SignupOutcome};

pub const HELP: &str = "\
Type a question and press Enter to ask it (students).

/role student|lecturer            choose the role used by /login and /signup
/login <user> <password>          log in with the selected role
/signup <user> <pw> <pw> [email]  create an account (lecturers need an email)
/logout                           log out
/upload \"<title>\" <file>          upload a .pdf/.txt/.md document (lecturers)
/documents                        list uploaded documents
/history                          show your question history
/admin <user> <password>          log in as administrator
/pending                          list lecturers awaiting approval (admin)
/approve <user>  /reject <user>   decide on a lecturer (admin)
/admin-logout                     leave admin mode
/help                             show this help";

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Ask(String),
    SelectRole(Role),
    Login { username: String, password: String },
    Signup {
        username: String,
        password: String,
        confirm: String,
        email: Option<String>,
    },
    Logout,
    Upload { title: String, path: PathBuf },
    Documents,
    History,
    AdminLogin { username: String, password: String },
    AdminLogout,
    Pending,
    Approve(String),
    Reject(String),
    Help,
}

/// What a command produced, ready for display.
#[derive(Clone, Debug)]
pub enum Outcome {
    Answer { question: String, answer: Answer },
    Listing { title: String, lines: Vec<String> },
    Info(String),
    Error(String),
}

pub fn parse(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let Some(rest) = input.strip_prefix('/') else {
        return Ok(Command::Ask(input.to_string()));
    };
    let args = split_args(rest)?;
    let Some((name, args)) = args.split_first() else {
        return Err("Empty command. Type /help for the list of commands.".to_string());
    };
    let arg = |i: usize| args.get(i).cloned();

    match name.to_ascii_lowercase().as_str() {
        "role" => {
            let role = arg(0).ok_or("Usage: /role student|lecturer")?;
            Ok(Command::SelectRole(role.parse()?))
        }
        "login" => match args {
            [username, password] => Ok(Command::Login {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err("Usage: /login <user> <password>".to_string()),
        },
        "signup" => match args {
            [username, password, confirm] | [username, password, confirm, _] => Ok(Command::Signup {
                username: username.clone(),
                password: password.clone(),
                confirm: confirm.clone(),
                email: arg(3),
            }),
            _ => Err("Usage: /signup <user> <password> <confirm> [email]".to_string()),
        },
        "logout" => Ok(Command::Logout),
        "upload" => match args {
            [title, path] => Ok(Command::Upload {
                title: title.clone(),
                path: PathBuf::from(path),
            }),
            _ => Err("Usage: /upload \"<title>\" <file>".to_string()),
        },
        "documents" | "docs" => Ok(Command::Documents),
        "history" => Ok(Command::History),
        "admin" => match args {
            [username, password] => Ok(Command::AdminLogin {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err("Usage: /admin <user> <password>".to_string()),
        },
        "admin-logout" => Ok(Command::AdminLogout),
        "pending" => Ok(Command::Pending),
        "approve" => arg(0).map(Command::Approve).ok_or_else(|| "Usage: /approve <user>".to_string()),
        "reject" => arg(0).map(Command::Reject).ok_or_else(|| "Usage: /reject <user>".to_string()),
        "help" | "?" => Ok(Command::Help),
        other => Err(format!("Unknown command '/{}'. Type /help for the list of commands.", other)),
    }
}

/// Whitespace-separated arguments; double quotes group words.
fn split_args(input: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return Err("Unterminated quote.".to_string());
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}

/// Positions of arguments that hold secrets, counted with the command name at 0.
fn secret_positions(command: &str) -> &'static [usize] {
    match command {
        "/login" | "/admin" => &[2],
        "/signup" => &[2, 3],
        _ => &[],
    }
}

/// Input line with password arguments replaced by `*`, one per character.
pub fn mask_secrets(input: &str) -> String {
    let command = input
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let secret = secret_positions(&command);
    if secret.is_empty() {
        return input.to_string();
    }
    // Tokenises like `split_args` so a quoted password is masked whole.
    let mut out = String::with_capacity(input.len());
    let mut index = 0usize;
    let mut in_token = false;
    let mut in_quotes = false;
    for ch in input.chars() {
        if ch.is_whitespace() && !in_quotes {
            if in_token {
                index += 1;
                in_token = false;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            in_quotes = !in_quotes;
        }
        in_token = true;
        out.push(if secret.contains(&index) { '*' } else { ch });
    }
    out
}

pub fn execute(assistant: &Assistant, session: &mut Session, command: Command) -> Outcome {
    match run(assistant, session, command) {
        Ok(outcome) => outcome,
        Err(err) => Outcome::Error(err.to_string()),
    }
}

fn run(assistant: &Assistant, session: &mut Session, command: Command) -> Result<Outcome, RagError> {
    let outcome = match command {
        Command::Ask(question) => {
            let answer = assistant.ask(session, &question)?;
            Outcome::Answer { question, answer }
        }
        Command::SelectRole(role) => {
            session.selected_role = role;
            Outcome::Info(format!("Role set to {}.", role))
        }
        Command::Login { username, password } => {
            let role = session.selected_role;
            assistant.login(session, role, &username, &password)?;
            Outcome::Info(format!("Welcome {} ({})!", username, role))
        }
        Command::Signup {
            username,
            password,
            confirm,
            email,
        } => {
            let form = SignupForm {
                role: session.selected_role,
                username,
                password,
                confirm_password: confirm,
                email,
            };
            match assistant.signup(&form)? {
                SignupOutcome::Active => Outcome::Info("Account created! You can now log in.".to_string()),
                SignupOutcome::PendingApproval => {
                    Outcome::Info("Account created! Waiting for admin approval.".to_string())
                }
            }
        }
        Command::Logout => {
            if !session.is_logged_in() {
                return Err(RagError::Validation("You are not logged in.".to_string()));
            }
            assistant.logout(session);
            Outcome::Info("Logged out successfully.".to_string())
        }
        Command::Upload { title, path } => {
            let report = assistant.upload(session, &title, &path)?;
            Outcome::Info(format!(
                "{} uploaded successfully and saved ({} pages, {} chunks).",
                report.document, report.pages, report.chunks
            ))
        }
        Command::Documents => {
            let lines = assistant
                .documents()
                .into_iter()
                .map(|d| format!("{}  [{} chunks]", d.name, d.chunk_count))
                .collect();
            Outcome::Listing {
                title: "Uploaded documents".to_string(),
                lines,
            }
        }
        Command::History => {
            let lines = assistant
                .history(session)?
                .into_iter()
                .map(|e| match e.source_label {
                    Some(label) => format!("Q: {}\nA: {}\n{}\n", e.query, e.answer, label),
                    None => format!("Q: {}\nA: {}\n", e.query, e.answer),
                })
                .collect();
            Outcome::Listing {
                title: "Question history".to_string(),
                lines,
            }
        }
        Command::AdminLogin { username, password } => {
            assistant.admin_login(session, &username, &password)?;
            Outcome::Info("Admin logged in.".to_string())
        }
        Command::AdminLogout => {
            assistant.admin_logout(session);
            Outcome::Info("Admin logged out.".to_string())
        }
        Command::Pending => {
            let lines = assistant
                .pending_lecturers(session)?
                .into_iter()
                .map(|p| format!("{} - {}", p.username, p.email))
                .collect();
            Outcome::Listing {
                title: "Pending lecturer approvals".to_string(),
                lines,
            }
        }
        Command::Approve(username) => {
            assistant.approve_lecturer(session, &username)?;
            Outcome::Info(format!("{} approved!", username))
        }
        Command::Reject(username) => {
            assistant.reject_lecturer(session, &username)?;
            Outcome::Info(format!("{} rejected and removed.", username))
        }
        Command::Help => Outcome::Listing {
            title: "Commands".to_string(),
            lines: vec![HELP.to_string()],
        },
    };
    Ok(outcome)
}
