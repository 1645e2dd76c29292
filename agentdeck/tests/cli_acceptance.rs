use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    project: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir
            .path()
            .canonicalize()
            .expect("failed to resolve temp dir");
        let home = base.join("home");
        let project = home.join("work/proj");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&project).expect("failed to create project");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_fixture(&home, &project);

        Self {
            _temp_dir: temp_dir,
            home,
            project,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("agentdeck/changes.db")
    }

    fn user_agent(&self) -> PathBuf {
        self.home.join(".claude/agents/reviewer.md")
    }

    fn project_agent(&self) -> PathBuf {
        self.project.join(".claude/agents/reviewer.md")
    }
}

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().expect("missing fixture parent"))
        .expect("failed to create fixture directories");
    fs::write(path, text).expect("failed to write fixture");
}

fn seed_fixture(home: &Path, project: &Path) {
    write(
        &home.join(".claude/agents/reviewer.md"),
        "---\nname: reviewer\ndescription: Reviews pull requests\n---\nReview carefully.\n",
    );
    write(
        &home.join(".claude/settings.json"),
        r#"{"permissions":{"allow":["*"]},"model":"opus"}"#,
    );
    write(
        &project.join(".claude/settings.json"),
        r#"{"permissions":{"allow":["Bash"]}}"#,
    );
    write(
        &project.join(".claude/commands/sc/analyze.md"),
        "---\ndescription: Analyze the code base\n---\nAnalyze it.\n",
    );
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("agentdeck"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute agentdeck: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "agentdeck {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn run_json(env: &CliTestEnv, args: &[&str]) -> Value {
    let output = run_bin(env, args);
    assert_success(args, &output);
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn scan_lists_user_and_project_resources() {
    let env = CliTestEnv::new();

    let resources = run_json(&env, &["scan", "--json"]);
    let resources = resources.as_array().expect("expected a JSON array");

    let reviewer = resources
        .iter()
        .find(|r| r["name"] == "reviewer")
        .expect("reviewer agent not found");
    assert_eq!(reviewer["scope"], "user");
    assert_eq!(reviewer["kind"]["type"], "agent");

    let analyze = resources
        .iter()
        .find(|r| r["name"] == "analyze")
        .expect("analyze command not found");
    assert_eq!(analyze["scope"], "project");
    assert_eq!(analyze["system"]["id"], "superclaude");

    let text = run_bin(&env, &["scan", "--type", "agent"]);
    assert_success(&["scan", "--type", "agent"], &text);
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert!(stdout.contains("Discovered 1 resource(s)"), "got:\n{stdout}");
}

#[test]
fn systems_reports_detected_bundle() {
    let env = CliTestEnv::new();

    let systems = run_json(&env, &["systems", "--json"]);
    let systems = systems.as_array().expect("expected a JSON array");
    assert_eq!(systems.len(), 1);
    assert_eq!(systems[0]["id"], "superclaude");
}

#[test]
fn settings_shows_replace_merge() {
    let env = CliTestEnv::new();
    let project = env.project.to_string_lossy().into_owned();

    let effective = run_json(&env, &["settings", "--project", &project, "--json"]);
    assert_eq!(effective["permissions"]["allow"], serde_json::json!(["Bash"]));
    assert_eq!(effective["model"], "opus");

    let concat = run_json(
        &env,
        &["settings", "--project", &project, "--strategy", "concat", "--json"],
    );
    assert_eq!(
        concat["permissions"]["allow"],
        serde_json::json!(["*", "Bash"])
    );
}

#[test]
fn assign_move_then_history() {
    let env = CliTestEnv::new();
    let source = env.user_agent().to_string_lossy().into_owned();
    let project = env.project.to_string_lossy().into_owned();
    let args = [
        "assign", &source, "--scope", "project", "--project", &project, "--move",
    ];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    assert!(!env.user_agent().exists(), "source should be removed");
    assert_eq!(
        fs::read_to_string(env.project_agent()).expect("destination missing"),
        "---\nname: reviewer\ndescription: Reviews pull requests\n---\nReview carefully.\n"
    );
    assert!(env.db_path().exists(), "change log should be created");

    let dest = env.project_agent().to_string_lossy().into_owned();
    let history = run_json(&env, &["history", &dest, "--json"]);
    let history = history.as_array().expect("expected a JSON array");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["change_type"], "create");
}

#[test]
fn assign_project_scope_requires_project() {
    let env = CliTestEnv::new();
    let source = env.user_agent().to_string_lossy().into_owned();

    let output = run_bin(&env, &["assign", &source, "--scope", "project"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("project scope requires a target project"),
        "got:\n{stderr}"
    );
    assert!(env.user_agent().exists());
}

#[test]
fn overwrite_then_revert_restores_previous_content() {
    let env = CliTestEnv::new();
    let source = env.user_agent().to_string_lossy().into_owned();
    let project = env.project.to_string_lossy().into_owned();
    let args = ["assign", &source, "--scope", "project", "--project", &project];

    let first = run_bin(&env, &args);
    assert_success(&args, &first);
    let original = fs::read_to_string(env.project_agent()).expect("destination missing");

    write(
        &env.user_agent(),
        "---\nname: reviewer\ndescription: Reviews pull requests\n---\nReview quickly.\n",
    );
    let second = run_bin(&env, &args);
    assert_success(&args, &second);

    let dest = env.project_agent().to_string_lossy().into_owned();
    let history = run_json(&env, &["history", &dest, "--json"]);
    let history = history.as_array().expect("expected a JSON array");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["change_type"], "modify");
    let change_id = history[1]["id"].as_str().expect("change id").to_string();

    let diff = run_json(&env, &["diff", &dest, &change_id, "--json"]);
    assert_eq!(diff["modified"][0][1], "Review carefully.");
    assert_eq!(diff["modified"][0][2], "Review quickly.");

    let revert = run_bin(&env, &["revert", &dest, &change_id]);
    assert_success(&["revert", &dest, &change_id], &revert);
    assert_eq!(
        fs::read_to_string(env.project_agent()).expect("destination missing"),
        original
    );

    let backups = fs::read_dir(env.project.join(".claude/agents"))
        .expect("agents dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .count();
    assert!(backups >= 1, "overwrites should leave a backup");
}
