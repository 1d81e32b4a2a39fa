mod common;

use std::path::PathBuf;

use common::{services, test_config, RecordingNotifier, ScriptedEncyclopedia, ScriptedGenerator, WordEmbedder};
use rag::{
    AccountError, Assistant, Lookup, RagError, Role, Services, Session, SignupForm, SignupOutcome, SourceLabel,
    NO_CONTENT_ANSWER,
};

fn signup_form(role: Role, username: &str, email: Option<&str>) -> SignupForm {
    SignupForm {
        role,
        username: username.to_string(),
        password: "pass1".to_string(),
        confirm_password: "pass1".to_string(),
        email: email.map(str::to_string),
    }
}

fn write_notes(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write lecture notes");
    path
}

fn student_session(assistant: &Assistant, username: &str) -> Session {
    assistant
        .signup(&signup_form(Role::Student, username, None))
        .expect("student signup");
    let mut session = Session::default();
    assistant
        .login(&mut session, Role::Student, username, "pass1")
        .expect("student login");
    session
}

fn lecturer_session(assistant: &Assistant, username: &str) -> Session {
    assistant
        .signup(&signup_form(Role::Lecturer, username, Some("lecturer@uni.edu")))
        .expect("lecturer signup");
    let mut admin = Session::default();
    assistant
        .admin_login(&mut admin, "admin", "admin123")
        .expect("admin login");
    assistant
        .approve_lecturer(&admin, username)
        .expect("approve lecturer");
    let mut session = Session::default();
    assistant
        .login(&mut session, Role::Lecturer, username, "pass1")
        .expect("lecturer login");
    session
}

#[test]
fn capital_of_france_scenario_without_generator() {
    let dir = tempfile::tempdir().expect("temp dir");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        services(ScriptedGenerator::unreachable(), ScriptedEncyclopedia::failing()),
    );

    let lecturer = lecturer_session(&assistant, "drsmith");
    let notes = write_notes(dir.path(), "source.txt", "Paris is the capital of France.");
    let report = assistant
        .upload(&lecturer, "geo", &notes)
        .expect("upload should succeed");
    assert_eq!(report.document, "geo (drsmith).txt");
    assert_eq!(report.chunks, 1);
    assert!(dir.path().join("uploads").join("geo (drsmith).txt").exists());

    let mut student = student_session(&assistant, "alice");
    let answer = assistant
        .ask(&mut student, "What is the capital of France?")
        .expect("ask should succeed");

    assert_eq!(answer.text, "Paris is the capital of France.");
    assert_eq!(
        answer.source,
        Some(SourceLabel::Excerpt {
            document: "geo (drsmith).txt".to_string(),
            page: 1,
        })
    );
    let label = answer.source_label().expect("label");
    assert!(label.contains("geo (drsmith).txt"));
    assert!(label.contains("Page 1"));
}

#[test]
fn every_question_is_recorded_in_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        services(
            ScriptedGenerator::unreachable(),
            ScriptedEncyclopedia::returning(Lookup::NotFound),
        ),
    );
    let mut student = student_session(&assistant, "alice");

    let questions = ["Who was Caesar?", "What is Rome?", "When did Rome fall?", "Why?", "How?", "Where?"];
    for q in questions {
        let answer = assistant.ask(&mut student, q).expect("ask");
        assert_eq!(answer.text, NO_CONTENT_ANSWER);
    }

    let history = assistant.history(&student).expect("history");
    assert_eq!(history.len(), questions.len());
    for (entry, q) in history.iter().zip(questions) {
        assert_eq!(entry.query, q);
        assert_eq!(entry.answer, NO_CONTENT_ANSWER);
        assert_eq!(entry.source_label, None);
    }

    assert_eq!(
        student.recent_queries,
        vec!["Where?", "How?", "Why?", "When did Rome fall?", "What is Rome?"]
    );

    // A fresh login restores the rolling list from the persisted log.
    let mut again = Session::default();
    assistant
        .login(&mut again, Role::Student, "alice", "pass1")
        .expect("login again");
    assert_eq!(again.recent_queries, student.recent_queries);
}

#[test]
fn grounded_answers_are_labelled_with_the_model() {
    let dir = tempfile::tempdir().expect("temp dir");
    let generator = ScriptedGenerator::replying("Augustus was the first Roman emperor.");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        services(generator.clone(), ScriptedEncyclopedia::failing()),
    );
    let lecturer = lecturer_session(&assistant, "drsmith");
    let notes = write_notes(
        dir.path(),
        "rome.txt",
        "Augustus became the first emperor of Rome in 27 BC.\u{000C}The Senate kept a ceremonial role.",
    );
    assistant.upload(&lecturer, "Rome", &notes).expect("upload");

    let mut student = student_session(&assistant, "alice");
    let answer = assistant
        .ask(&mut student, "Who was the first emperor of Rome?")
        .expect("ask");

    assert_eq!(answer.text, "Augustus was the first Roman emperor.");
    match &answer.source {
        Some(SourceLabel::Generated { model, grounded_on }) => {
            assert_eq!(model, "test-model");
            assert_eq!(grounded_on.len(), 2);
            assert_eq!(grounded_on[0], ("Rome (drsmith).txt".to_string(), 1));
        }
        other => panic!("expected generated answer, got {:?}", other),
    }
    let prompts = generator.prompts();
    assert!(prompts[0].contains("Augustus became the first emperor of Rome in 27 BC."));

    let history = assistant.history(&student).expect("history");
    assert_eq!(history[0].source_label, answer.source_label());
}

#[test]
fn roles_gate_uploads_and_questions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        services(ScriptedGenerator::unreachable(), ScriptedEncyclopedia::failing()),
    );
    let notes = write_notes(dir.path(), "notes.txt", "Some notes.");

    let mut anonymous = Session::default();
    assert!(matches!(
        assistant.ask(&mut anonymous, "anything"),
        Err(RagError::Forbidden(_))
    ));
    assert!(matches!(
        assistant.upload(&anonymous, "Notes", &notes),
        Err(RagError::Forbidden(_))
    ));

    let mut student = student_session(&assistant, "alice");
    assert!(matches!(
        assistant.upload(&student, "Notes", &notes),
        Err(RagError::Forbidden(_))
    ));
    assert!(matches!(
        assistant.ask(&mut student, "   "),
        Err(RagError::Validation(_))
    ));

    let mut lecturer = lecturer_session(&assistant, "drsmith");
    assert!(matches!(
        assistant.ask(&mut lecturer, "anything"),
        Err(RagError::Forbidden(_))
    ));
    assert!(matches!(
        assistant.pending_lecturers(&lecturer),
        Err(RagError::Forbidden(_))
    ));
}

#[test]
fn lecturer_signup_notifies_admin_and_waits_for_approval() {
    let dir = tempfile::tempdir().expect("temp dir");
    let notifier = RecordingNotifier::default();
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        Services {
            embedder: Box::new(WordEmbedder::default()),
            generator: Box::new(ScriptedGenerator::unreachable()),
            encyclopedia: Box::new(ScriptedEncyclopedia::failing()),
            notifier: Box::new(notifier.clone()),
        },
    );

    let outcome = assistant
        .signup(&signup_form(Role::Lecturer, "drjones", Some("jones@uni.edu")))
        .expect("signup");
    assert_eq!(outcome, SignupOutcome::PendingApproval);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("drjones"));
    assert!(sent[0].1.contains("jones@uni.edu"));

    let mut session = Session::default();
    let err = assistant
        .login(&mut session, Role::Lecturer, "drjones", "pass1")
        .expect_err("not yet approved");
    assert!(matches!(err, RagError::Account(AccountError::AwaitingApproval)));
    assert!(!session.is_logged_in());

    let mut admin = Session::default();
    assert!(assistant.admin_login(&mut admin, "admin", "wrong").is_err());
    assert!(!admin.admin);
    assistant.admin_login(&mut admin, "admin", "admin123").expect("admin login");
    let pending = assistant.pending_lecturers(&admin).expect("pending");
    assert_eq!(pending.len(), 1);
    assistant.approve_lecturer(&admin, "drjones").expect("approve");

    assistant
        .login(&mut session, Role::Lecturer, "drjones", "pass1")
        .expect("approved lecturer logs in");
    assert_eq!(session.role(), Some(Role::Lecturer));
    assert_eq!(session.username(), Some("drjones"));

    // Students never trigger a notification.
    assistant
        .signup(&signup_form(Role::Student, "alice", None))
        .expect("student signup");
    assert_eq!(notifier.sent().len(), 1);
}

#[test]
fn failed_extraction_leaves_the_store_unchanged() {
    let dir = tempfile::tempdir().expect("temp dir");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        services(ScriptedGenerator::unreachable(), ScriptedEncyclopedia::failing()),
    );
    let lecturer = lecturer_session(&assistant, "drsmith");

    let good = write_notes(dir.path(), "rome.txt", "Rome notes.");
    assistant.upload(&lecturer, "Rome", &good).expect("upload");

    let unsupported = write_notes(dir.path(), "rome.docx", "binary-ish");
    let err = assistant
        .upload(&lecturer, "Rome", &unsupported)
        .expect_err("unsupported type");
    assert!(matches!(err, RagError::Extraction(_)));

    let broken_pdf = write_notes(dir.path(), "rome.pdf", "%PDF-garbage");
    assert!(matches!(
        assistant.upload(&lecturer, "Rome", &broken_pdf),
        Err(RagError::Extraction(_))
    ));

    let docs = assistant.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].name, "Rome (drsmith).txt");
}

#[test]
fn retrieval_failure_falls_through_to_external_knowledge() {
    let dir = tempfile::tempdir().expect("temp dir");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        Services {
            embedder: Box::new(common::FailingEmbedder),
            generator: Box::new(ScriptedGenerator::unreachable()),
            encyclopedia: Box::new(ScriptedEncyclopedia::returning(Lookup::NotFound)),
            notifier: Box::new(RecordingNotifier::default()),
        },
    );
    let lecturer = lecturer_session(&assistant, "drsmith");
    let notes = write_notes(dir.path(), "rome.txt", "Rome notes.");
    assistant.upload(&lecturer, "Rome", &notes).expect("upload");

    let mut student = student_session(&assistant, "alice");
    let answer = assistant.ask(&mut student, "Rome?").expect("ask never fails on retrieval");
    assert!(answer.is_no_content());
}

#[test]
fn titles_cannot_leave_the_uploads_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        services(ScriptedGenerator::unreachable(), ScriptedEncyclopedia::failing()),
    );
    let lecturer = lecturer_session(&assistant, "drsmith");
    let notes = write_notes(dir.path(), "notes.txt", "Rome notes.");

    for title in ["../../escaped", "../escaped", "sub/dir", "..\\escaped"] {
        let err = assistant
            .upload(&lecturer, title, &notes)
            .expect_err("traversal title must be refused");
        assert!(matches!(err, RagError::Validation(_)), "{}: {:?}", title, err);
    }
    assert!(!dir.path().join("escaped (drsmith).txt").exists());
    assert!(!dir.path().parent().expect("parent").join("escaped (drsmith).txt").exists());
    assert!(assistant.documents().is_empty());

    // Dots inside an ordinary title are fine.
    let report = assistant
        .upload(&lecturer, "Rome... and beyond", &notes)
        .expect("plain title");
    assert!(dir
        .path()
        .join("uploads")
        .join(&report.document)
        .exists());
}

#[test]
fn uploader_names_cannot_leave_the_uploads_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let assistant = Assistant::with_services(
        test_config(dir.path()),
        services(ScriptedGenerator::unreachable(), ScriptedEncyclopedia::failing()),
    );
    let lecturer = lecturer_session(&assistant, "../dr");
    let notes = write_notes(dir.path(), "notes.txt", "Rome notes.");

    assert!(matches!(
        assistant.upload(&lecturer, "Rome", &notes),
        Err(RagError::Validation(_))
    ));
    assert!(assistant.documents().is_empty());
}
