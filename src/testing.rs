//! In-memory stand-in for the infrastructure tool.
//!
//! [`FakeTerraform`] implements [`CommandRunner`] and keeps workspaces,
//! plans and states in memory, so multi-step lifecycles can be tested
//! without the real binary.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;
use crate::terraform::{CommandResult, CommandRunner, DEFAULT_WORKSPACE};

type StateFn = Box<dyn Fn(&str, bool) -> Value + Send + Sync>;

#[derive(Debug, Clone)]
struct PendingPlan {
    destroy: bool,
    project_id: String,
    skip_delete: bool,
}

#[derive(Default)]
struct Backend {
    workspaces: BTreeMap<String, Option<Value>>,
    selected: HashMap<PathBuf, String>,
    plans: HashMap<PathBuf, PendingPlan>,
    calls: Vec<(PathBuf, Vec<String>)>,
    failures: Vec<(String, CommandResult)>,
    serial: u64,
}

pub(crate) struct FakeTerraform {
    backend: Mutex<Backend>,
    apply_state: StateFn,
    destroy_state: Option<Value>,
}

impl FakeTerraform {
    pub(crate) fn new() -> Self {
        Self {
            backend: Mutex::new(Backend::default()),
            apply_state: Box::new(|project_id, skip_delete| project_state(project_id, skip_delete, "europe-west2")),
            destroy_state: None,
        }
    }

    /// Replaces the state produced by an apply plan.
    pub(crate) fn with_apply_state(mut self, f: impl Fn(&str, bool) -> Value + Send + Sync + 'static) -> Self {
        self.apply_state = Box::new(f);
        self
    }

    /// Makes destroy plans leave `state` behind.
    pub(crate) fn with_destroy_state(mut self, state: Value) -> Self {
        self.destroy_state = Some(state);
        self
    }

    /// Adds a workspace that already exists, with an optional state.
    pub(crate) fn with_workspace(self, name: &str, state: Option<Value>) -> Self {
        self.lock().workspaces.insert(name.to_string(), state);
        self
    }

    /// Makes the next command starting with `prefix` return `result`.
    pub(crate) fn fail_on(self, prefix: &str, result: CommandResult) -> Self {
        self.lock().failures.push((prefix.to_string(), result));
        self
    }

    /// Command lines run in `working_dir`, without the binary.
    pub(crate) fn calls_in(&self, working_dir: &Path) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(dir, _)| dir == working_dir)
            .map(|(_, args)| args.join(" "))
            .collect()
    }

    /// Every command line run, without the binary.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(_, args)| args.join(" ")).collect()
    }

    /// Replaces a workspace's state behind the deployer's back.
    pub(crate) fn set_workspace_state(&self, name: &str, state: Value) {
        self.lock().workspaces.insert(name.to_string(), Some(state));
    }

    pub(crate) fn workspace_state(&self, name: &str) -> Option<Value> {
        self.lock().workspaces.get(name).cloned().flatten()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    fn handle(&self, args: &[String], working_dir: &Path) -> CommandResult {
        let mut backend = self.lock();
        backend.calls.push((working_dir.to_path_buf(), args.to_vec()));

        let line = args.join(" ");
        if let Some(index) = backend.failures.iter().position(|(prefix, _)| line.starts_with(prefix)) {
            return backend.failures.remove(index).1;
        }

        let selected = backend
            .selected
            .get(working_dir)
            .cloned()
            .unwrap_or_else(|| String::from(DEFAULT_WORKSPACE));
        let words: Vec<&str> = args.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["get"] | ["init"] => CommandResult::success(""),
            ["workspace", "list"] => {
                let mut out = String::new();
                for name in std::iter::once(DEFAULT_WORKSPACE).chain(backend.workspaces.keys().map(String::as_str)) {
                    let marker = if name == selected { "* " } else { "  " };
                    out.push_str(&format!("{marker}{name}\n"));
                }
                CommandResult::success(out)
            }
            ["workspace", "new", name] => {
                if backend.workspaces.contains_key(*name) {
                    return CommandResult::new(1, "", format!("Workspace \"{name}\" already exists"));
                }
                backend.workspaces.insert((*name).to_string(), None);
                backend.selected.insert(working_dir.to_path_buf(), (*name).to_string());
                CommandResult::success("")
            }
            ["workspace", "select", name] => {
                if *name != DEFAULT_WORKSPACE && !backend.workspaces.contains_key(*name) {
                    return CommandResult::new(1, "", format!("Workspace \"{name}\" doesn't exist"));
                }
                backend.selected.insert(working_dir.to_path_buf(), (*name).to_string());
                CommandResult::success("")
            }
            ["workspace", "delete", "-force", name] => {
                if *name == selected || backend.workspaces.remove(*name).is_none() {
                    return CommandResult::new(1, "", format!("Cannot delete workspace \"{name}\""));
                }
                CommandResult::success("")
            }
            ["plan", rest @ ..] => {
                let mut plan = PendingPlan {
                    destroy: false,
                    project_id: String::new(),
                    skip_delete: false,
                };
                let mut out = None;
                for arg in rest {
                    if *arg == "-destroy" {
                        plan.destroy = true;
                    } else if let Some(path) = arg.strip_prefix("-out=") {
                        out = Some(working_dir.join(path));
                    } else if let Some(id) = arg.strip_prefix("-var=project_id=") {
                        plan.project_id = id.to_string();
                    } else if let Some(flag) = arg.strip_prefix("-var=skip_delete=") {
                        plan.skip_delete = flag == "true";
                    }
                }
                let Some(out) = out else {
                    return CommandResult::new(1, "", "missing -out");
                };
                std::fs::write(&out, b"plan").unwrap();
                backend.plans.insert(out, plan);
                CommandResult::success("Plan saved")
            }
            ["apply", "-no-color", "-input=false", "-auto-approve=false", file] => {
                let Some(plan) = backend.plans.remove(&working_dir.join(file)) else {
                    return CommandResult::new(1, "", format!("Failed to load \"{file}\" as a plan file"));
                };
                backend.serial += 1;
                let serial = backend.serial;
                let mut state = if plan.destroy {
                    self.destroy_state
                        .clone()
                        .unwrap_or_else(|| json!({"version": 4, "outputs": {}, "resources": []}))
                } else {
                    (self.apply_state)(&plan.project_id, plan.skip_delete)
                };
                if let Some(object) = state.as_object_mut() {
                    object.insert(String::from("serial"), json!(serial));
                    object.insert(String::from("lineage"), json!(format!("lineage-{selected}")));
                }
                backend.workspaces.insert(selected, Some(state));
                CommandResult::success("Apply complete!")
            }
            ["state", "pull"] => match backend.workspaces.get(&selected).cloned().flatten() {
                Some(state) => CommandResult::success(state.to_string()),
                None => CommandResult::success(""),
            },
            _ => CommandResult::new(1, "", format!("unexpected command: {line}")),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeTerraform {
    async fn run(&self, _binary: &str, args: &[String], working_dir: &Path) -> Result<CommandResult> {
        Ok(self.handle(args, working_dir))
    }
}

/// A project state whose volatile fields depend on the project and side.
pub(crate) fn project_state(project_id: &str, skip_delete: bool, region: &str) -> Value {
    let number = if skip_delete { "100000000001" } else { "200000000002" };
    json!({
        "version": 4,
        "terraform_version": "1.5.7",
        "outputs": {
            "project_id": {"value": project_id, "type": "string"}
        },
        "resources": [
            {
                "mode": "managed",
                "type": "google_project",
                "name": "project",
                "provider": "provider[\"registry.terraform.io/hashicorp/google\"]",
                "instances": [{
                    "schema_version": 1,
                    "attributes": {
                        "id": format!("projects/{project_id}"),
                        "name": project_id,
                        "number": number,
                        "project_id": project_id,
                        "skip_delete": skip_delete,
                        "billing_account": "0000AA-BBBB11-CCCC22",
                        "labels": null
                    }
                }]
            },
            {
                "mode": "managed",
                "type": "google_compute_network",
                "name": "vpc",
                "provider": "provider[\"registry.terraform.io/hashicorp/google\"]",
                "instances": [{
                    "schema_version": 0,
                    "attributes": {
                        "id": format!("projects/{project_id}/global/networks/vpc"),
                        "project": project_id,
                        "region": region
                    }
                }]
            }
        ]
    })
}

/// Test configuration rooted at `base`.
pub(crate) fn config(base: &Path) -> crate::config::EcatConfig {
    let mut config = crate::config::EcatConfig::default();
    config.terraform.working_dir_base = base.to_path_buf();
    config
}

/// A minimal set of source files.
pub(crate) fn source_files() -> Vec<crate::deployer::SourceFile> {
    vec![
        crate::deployer::SourceFile::new("main.tf", b"resource \"google_project\" \"project\" {}".to_vec()).unwrap(),
        crate::deployer::SourceFile::new("modules/network/main.tf", b"resource \"google_compute_network\" \"vpc\" {}".to_vec())
            .unwrap(),
    ]
}
