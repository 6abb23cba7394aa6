//! Typed, ordered action lists
//!
//! An [`ActionList`] is what a front end hands over: directives in the order
//! the user gave them. [`ActionList::validate`] turns it into a [`Plan`],
//! the only input the construction pipeline accepts.

use std::path::{Path, PathBuf};

use mkbox_core::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single construction step, executed in list order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Bind `source` onto `destination` (recursive for directories)
    BindMount {
        source: PathBuf,
        destination: PathBuf,
    },
    /// Mount capped tmpfs scratch space at `path`
    EphemeralMount { path: PathBuf },
    /// Make an existing bind at `path` read-only. Must come after the
    /// `BindMount` it applies to; nothing reorders actions.
    ReadOnlyRemount { path: PathBuf },
    /// Plain mkdir, e.g. inside a tmpfs before binding into it
    MakeDirectory { path: PathBuf },
    /// Directory that becomes `/`; exactly one per plan
    SetSandboxRoot { path: PathBuf },
    /// Become `target` inside the namespace, mapped to the caller's UID
    SetUid { target: u32 },
    /// Become `target` inside the namespace, mapped to the caller's GID
    SetGid { target: u32 },
    /// Directory to start the program in, resolved inside the new root
    SetWorkingDirectory { path: PathBuf },
    /// Block for the configured delay, e.g. to attach a debugger
    Delay,
}

impl Action {
    /// Tag names accepted in plan files
    pub const TAGS: [&'static str; 9] = [
        "bind_mount",
        "ephemeral_mount",
        "read_only_remount",
        "make_directory",
        "set_sandbox_root",
        "set_uid",
        "set_gid",
        "set_working_directory",
        "delay",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::BindMount { .. } => "bind_mount",
            Action::EphemeralMount { .. } => "ephemeral_mount",
            Action::ReadOnlyRemount { .. } => "read_only_remount",
            Action::MakeDirectory { .. } => "make_directory",
            Action::SetSandboxRoot { .. } => "set_sandbox_root",
            Action::SetUid { .. } => "set_uid",
            Action::SetGid { .. } => "set_gid",
            Action::SetWorkingDirectory { .. } => "set_working_directory",
            Action::Delay => "delay",
        }
    }
}

/// Ordered, not yet validated directives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionList {
    actions: Vec<Action>,
}

impl ActionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn extend(&mut self, other: ActionList) {
        self.actions.extend(other.actions);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Parse a JSON plan: either an array of actions or `{"actions": [...]}`.
    ///
    /// Each action is an object tagged by `"action"`, e.g.
    /// `{"action": "bind_mount", "source": "/usr", "destination": "usr"}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SandboxError::InvalidConfig(format!("plan is not valid JSON: {}", e)))?;

        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("actions") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(SandboxError::InvalidConfig(
                        "plan object needs an \"actions\" array".to_string(),
                    ));
                }
            },
            _ => {
                return Err(SandboxError::InvalidConfig(
                    "plan must be an array of actions".to_string(),
                ));
            }
        };

        let mut list = ActionList::new();
        for (index, item) in items.into_iter().enumerate() {
            let tag = item
                .get("action")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    SandboxError::InvalidConfig(format!("action #{} has no \"action\" tag", index))
                })?;
            if !Action::TAGS.iter().any(|known| *known == tag) {
                return Err(SandboxError::UnknownAction(tag.to_string()));
            }
            let is_identity = matches!(tag, "set_uid" | "set_gid");
            let action = serde_json::from_value(item).map_err(|e| {
                if is_identity {
                    SandboxError::InvalidId(format!("action #{}: {}", index, e))
                } else {
                    SandboxError::InvalidConfig(format!("action #{}: {}", index, e))
                }
            })?;
            list.push(action);
        }
        Ok(list)
    }

    /// Check that the list describes a coherent sandbox.
    ///
    /// Only plan-level shape is checked here (exactly one sandbox root, no
    /// empty paths). Whether each path exists is checked when its action
    /// runs.
    pub fn validate(self) -> Result<Plan> {
        let mut sandbox_root: Option<PathBuf> = None;
        let mut working_directory = None;

        for action in &self.actions {
            match action {
                Action::SetSandboxRoot { path } => {
                    check_path(action, path)?;
                    if sandbox_root.is_some() {
                        return Err(SandboxError::DuplicateSandboxRoot(
                            path.display().to_string(),
                        ));
                    }
                    sandbox_root = Some(path.clone());
                }
                Action::BindMount {
                    source,
                    destination,
                } => {
                    check_path(action, source)?;
                    check_path(action, destination)?;
                }
                Action::EphemeralMount { path }
                | Action::ReadOnlyRemount { path }
                | Action::MakeDirectory { path } => check_path(action, path)?,
                Action::SetWorkingDirectory { path } => {
                    check_path(action, path)?;
                    working_directory = Some(path.clone());
                }
                Action::SetUid { .. } | Action::SetGid { .. } | Action::Delay => {}
            }
        }

        let sandbox_root = sandbox_root.ok_or(SandboxError::MissingSandboxRoot)?;
        Ok(Plan {
            actions: self.actions,
            sandbox_root,
            working_directory,
        })
    }
}

impl FromIterator<Action> for ActionList {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

fn check_path(action: &Action, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(SandboxError::InvalidConfig(format!(
            "{}: empty path",
            action.name()
        )));
    }
    Ok(())
}

/// A validated action list: exactly one sandbox root is guaranteed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    actions: Vec<Action>,
    sandbox_root: PathBuf,
    working_directory: Option<PathBuf>,
}

impl Plan {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// The last `SetWorkingDirectory`, applied after the root is final
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(path: &str) -> Action {
        Action::SetSandboxRoot {
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let list = ActionList::new().with(Action::EphemeralMount {
            path: PathBuf::from("/srv/sbx/tmp"),
        });
        let err = list.validate().unwrap_err();
        assert!(matches!(err, SandboxError::MissingSandboxRoot));
        assert!(err.is_config());
    }

    #[test]
    fn test_duplicate_root_rejected() {
        let list = ActionList::new().with(root("/a")).with(root("/b"));
        assert!(matches!(
            list.validate(),
            Err(SandboxError::DuplicateSandboxRoot(p)) if p == "/b"
        ));
    }

    #[test]
    fn test_order_is_preserved() {
        let actions = vec![
            Action::SetUid { target: 1000 },
            root("/srv/sbx"),
            Action::Delay,
            Action::SetGid { target: 1000 },
        ];
        let plan = actions.iter().cloned().collect::<ActionList>().validate().unwrap();
        assert_eq!(plan.actions(), actions.as_slice());
        assert_eq!(plan.sandbox_root(), Path::new("/srv/sbx"));
    }

    #[test]
    fn test_last_working_directory_wins() {
        let plan = ActionList::new()
            .with(Action::SetWorkingDirectory {
                path: PathBuf::from("/a"),
            })
            .with(root("/srv/sbx"))
            .with(Action::SetWorkingDirectory {
                path: PathBuf::from("/b"),
            })
            .validate()
            .unwrap();
        assert_eq!(plan.working_directory(), Some(Path::new("/b")));
    }

    #[test]
    fn test_empty_path_rejected() {
        let list = ActionList::new()
            .with(root("/srv/sbx"))
            .with(Action::MakeDirectory {
                path: PathBuf::new(),
            });
        assert!(matches!(
            list.validate(),
            Err(SandboxError::InvalidConfig(msg)) if msg.contains("make_directory")
        ));
    }

    #[test]
    fn test_json_plan() {
        let plan = ActionList::from_json(
            r#"{"actions": [
                {"action": "set_sandbox_root", "path": "/srv/sbx"},
                {"action": "bind_mount", "source": "/usr", "destination": "/srv/sbx/usr"},
                {"action": "ephemeral_mount", "path": "/srv/sbx/tmp"},
                {"action": "set_uid", "target": 1000},
                {"action": "delay"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(plan.len(), 5);
        let plan = plan.validate().unwrap();
        assert_eq!(
            plan.actions()[1],
            Action::BindMount {
                source: PathBuf::from("/usr"),
                destination: PathBuf::from("/srv/sbx/usr"),
            }
        );
        assert_eq!(plan.actions()[4], Action::Delay);
    }

    #[test]
    fn test_json_unknown_action() {
        let err = ActionList::from_json(r#"[{"action": "mount_proc", "path": "/proc"}]"#)
            .unwrap_err();
        assert!(matches!(err, SandboxError::UnknownAction(tag) if tag == "mount_proc"));
    }

    #[test]
    fn test_json_bad_identity() {
        let err = ActionList::from_json(r#"[{"action": "set_uid", "target": "root"}]"#)
            .unwrap_err();
        assert!(matches!(err, SandboxError::InvalidId(msg) if msg.contains("#0")));
    }

    #[test]
    fn test_tags_match_names() {
        let all = [
            Action::BindMount {
                source: PathBuf::from("a"),
                destination: PathBuf::from("b"),
            },
            Action::EphemeralMount { path: PathBuf::from("a") },
            Action::ReadOnlyRemount { path: PathBuf::from("a") },
            Action::MakeDirectory { path: PathBuf::from("a") },
            root("a"),
            Action::SetUid { target: 0 },
            Action::SetGid { target: 0 },
            Action::SetWorkingDirectory { path: PathBuf::from("a") },
            Action::Delay,
        ];
        for (action, tag) in all.iter().zip(Action::TAGS) {
            assert_eq!(action.name(), tag);
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json["action"], tag);
        }
    }
}
