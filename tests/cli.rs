use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ppr_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ppr");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let notes = root.join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(
        notes.join("handcuffs.md"),
        "Handcuff running backs gain value late in the season.\n\nRoster the backup behind an injury-prone starter.",
    )
    .unwrap();
    fs::write(
        notes.join("streaming.txt"),
        "Stream tight ends against defenses that allow the most receptions to the position.",
    )
    .unwrap();
    fs::write(notes.join("ignored.json"), "{}").unwrap();

    // Unroutable player source so chat degrades to the template answer.
    let config_content = format!(
        r#"[db]
path = "{}/data/ppr.sqlite"

[server]
bind = "127.0.0.1:0"

[sleeper]
base_url = "http://127.0.0.1:9"
timeout_secs = 2

[llm]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("ppr.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ppr(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ppr_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ppr binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_ppr(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));

    let (_, stderr, ok) = run_ppr(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_knowledge_init_then_search() {
    let (_tmp, config) = setup_test_env();
    run_ppr(&config, &["init"]);

    let (stdout, stderr, ok) = run_ppr(&config, &["knowledge", "init"]);
    assert!(ok, "knowledge init failed: {}", stderr);
    assert!(stdout.contains("Added 5 knowledge documents."));

    let (stdout, stderr, ok) = run_ppr(&config, &["knowledge", "search", "slot receivers"]);
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("ADDITIONAL FANTASY FOOTBALL CONTEXT:"));
    assert!(stdout.contains("1. EXPERT_ARTICLE:"));
    assert!(stdout.contains("(Source: Fantasy Football Analytics)"));
}

#[test]
fn test_knowledge_search_respects_context_filter() {
    let (_tmp, config) = setup_test_env();
    run_ppr(&config, &["knowledge", "init"]);

    let (stdout, stderr, ok) = run_ppr(
        &config,
        &["knowledge", "search", "", "--context", "injury"],
    );
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("INJURY_REPORT:"));
    assert!(!stdout.contains("WEATHER:"));
    assert!(!stdout.contains("EXPERT_ARTICLE:"));
}

#[test]
fn test_knowledge_add_prints_id_and_counts() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_ppr(
        &config,
        &[
            "knowledge",
            "add",
            "--type",
            "player_news",
            "--player",
            "Puka Nacua",
            "Puka Nacua cleared to practice in full",
        ],
    );
    assert!(ok, "add failed: {}", stderr);
    assert_eq!(stdout.trim().len(), 36, "expected a uuid, got {:?}", stdout);

    let (stdout, _, ok) = run_ppr(&config, &["status"]);
    assert!(ok);
    assert!(stdout.contains("Knowledge docs:  1"));
}

#[test]
fn test_knowledge_add_rejects_unknown_type() {
    let (_tmp, config) = setup_test_env();
    let (_, _, ok) = run_ppr(&config, &["knowledge", "add", "--type", "gossip", "text"]);
    assert!(!ok);
}

#[test]
fn test_upload_directory_skips_non_text_files() {
    let (tmp, config) = setup_test_env();
    let notes = tmp.path().join("notes");

    let (stdout, stderr, ok) = run_ppr(
        &config,
        &["upload", notes.to_str().unwrap(), "--tag", "strategy"],
    );
    assert!(ok, "upload failed: {}", stderr);
    assert!(stdout.contains("handcuffs: 1 chunks"));
    assert!(stdout.contains("streaming: 1 chunks"));
    assert!(stdout.contains("Uploaded 2 documents (2 chunks)."));

    let (stdout, _, ok) = run_ppr(&config, &["knowledge", "search", "handcuff backup"]);
    assert!(ok);
    assert!(stdout.contains("**handcuffs - Part 1**"));
    assert!(stdout.contains("(Source: User Upload)"));
}

#[test]
fn test_upload_missing_path_fails() {
    let (tmp, config) = setup_test_env();
    let missing = tmp.path().join("nope.md");
    let (_, stderr, ok) = run_ppr(&config, &["upload", missing.to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("path does not exist"));
}

#[test]
fn test_status_without_snapshot() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_ppr(&config, &["status"]);
    assert!(ok, "status failed: {}", stderr);
    assert!(stdout.contains("No player data cached yet."));
    assert!(stdout.contains("Knowledge docs:  0"));
}

#[test]
fn test_chat_falls_back_when_services_are_down() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_ppr(&config, &["chat", "Should I start Cooper Kupp this week?"]);
    assert!(ok, "chat failed: {}", stderr);
    assert!(stdout.contains("PPR Start/Sit Advice"));
    assert!(stdout.contains("Sources: PPR Fallback Expert"));
    assert!(stdout.contains("Note: Using fallback response"));
}

#[test]
fn test_chat_rejects_blank_message() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_ppr(&config, &["chat", "   "]);
    assert!(!ok);
    assert!(stderr.contains("Message is required"));
}

#[test]
fn test_missing_config_fails() {
    let (_, stderr, ok) = run_ppr(Path::new("/nonexistent/ppr.toml"), &["status"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
