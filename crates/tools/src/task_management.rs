//! Task management tools over a shared task store.
//!
//! The store is an owned resource handed to each tool through an `Arc`, so
//! every tool (and every concurrent call of every tool) sees the same tasks.
//! Ids come from an atomic counter starting at 1 and are never reused.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spindle_core::error::ToolError;
use spindle_core::tool::{Tool, ToolResult};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    /// Accepts `IN_PROGRESS`, `in progress`, `in-progress`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            _ => Err(format!(
                "unknown status '{s}' (expected PENDING, IN_PROGRESS, COMPLETED or CANCELLED)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub assignee: String,
    pub status: TaskStatus,
}

/// What the task tools hand back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: u64,
    pub title: String,
    /// A [`TaskStatus`] name, or `ERROR`
    pub status: String,
    pub assignee: String,
    pub message: String,
}

impl TaskResult {
    fn from_task(task: &Task, message: String) -> Self {
        Self {
            task_id: task.id,
            title: task.title.clone(),
            status: task.status.to_string(),
            assignee: task.assignee.clone(),
            message,
        }
    }

    fn not_found(task_id: u64) -> Self {
        Self {
            task_id,
            title: String::new(),
            status: "ERROR".into(),
            assignee: String::new(),
            message: "Task not found".into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == "ERROR"
    }

    fn into_tool_result(self) -> Result<ToolResult, ToolError> {
        let data = serde_json::to_value(&self).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "task_management".into(),
            reason: e.to_string(),
        })?;
        let mut result = ToolResult::json(data);
        result.success = !self.is_error();
        Ok(result)
    }
}

/// Shared task storage.
#[derive(Debug)]
pub struct TaskStore {
    next_id: AtomicU64,
    tasks: RwLock<HashMap<u64, Task>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a `PENDING` task under a freshly allocated id.
    pub async fn create(&self, title: &str, description: &str, assignee: &str) -> Task {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Task {
            id,
            title: title.to_string(),
            description: description.to_string(),
            assignee: assignee.to_string(),
            status: TaskStatus::Pending,
        };
        self.tasks.write().await.insert(id, task.clone());
        debug!(task_id = id, "Task created");
        task
    }

    pub async fn get(&self, id: u64) -> Option<Task> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Replace the task's status. `None` if the id is unknown.
    pub async fn update_status(&self, id: u64, status: TaskStatus) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id)?;
        task.status = status;
        Some(task.clone())
    }

    /// Replace the task's assignee. `None` if the id is unknown.
    pub async fn assign(&self, id: u64, assignee: &str) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id)?;
        task.assignee = assignee.to_string();
        Some(task.clone())
    }

    /// All tasks, ordered by id.
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Models send ids as numbers or numeric strings.
fn task_id(arguments: &serde_json::Value) -> Result<u64, ToolError> {
    let value = &arguments["task_id"];
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ToolError::InvalidArguments("Missing or invalid 'task_id' argument".into()))
}

pub struct CreateTaskTool {
    store: Arc<TaskStore>,
}

impl CreateTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a new task with title, description, and assignee"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Short task title" },
                "description": { "type": "string", "description": "What needs to be done" },
                "assignee": { "type": "string", "description": "Person responsible for the task" }
            },
            "required": ["title", "assignee"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let title = required_str(&arguments, "title")?;
        let assignee = required_str(&arguments, "assignee")?;
        let description = arguments["description"].as_str().unwrap_or_default();

        let task = self.store.create(title, description, assignee).await;
        let message = format!("Task created successfully and assigned to {assignee}");
        TaskResult::from_task(&task, message).into_tool_result()
    }
}

pub struct UpdateTaskStatusTool {
    store: Arc<TaskStore>,
}

impl UpdateTaskStatusTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateTaskStatusTool {
    fn name(&self) -> &str {
        "update_task_status"
    }

    fn description(&self) -> &str {
        "Update task status by task ID"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "integer", "description": "Id returned by create_task" },
                "status": {
                    "type": "string",
                    "enum": ["PENDING", "IN_PROGRESS", "COMPLETED", "CANCELLED"]
                }
            },
            "required": ["task_id", "status"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = task_id(&arguments)?;
        let status: TaskStatus = required_str(&arguments, "status")?
            .parse()
            .map_err(ToolError::InvalidArguments)?;

        let result = match self.store.update_status(id, status).await {
            Some(task) => TaskResult::from_task(&task, format!("Task status updated to {status}")),
            None => TaskResult::not_found(id),
        };
        result.into_tool_result()
    }
}

pub struct AssignTaskTool {
    store: Arc<TaskStore>,
}

impl AssignTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AssignTaskTool {
    fn name(&self) -> &str {
        "assign_task"
    }

    fn description(&self) -> &str {
        "Assign or reassign a task to a different person"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "integer", "description": "Id returned by create_task" },
                "assignee": { "type": "string", "description": "The new assignee" }
            },
            "required": ["task_id", "assignee"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let id = task_id(&arguments)?;
        let assignee = required_str(&arguments, "assignee")?;

        let result = match self.store.assign(id, assignee).await {
            Some(task) => TaskResult::from_task(&task, format!("Task reassigned to {assignee}")),
            None => TaskResult::not_found(id),
        };
        result.into_tool_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn parse(result: &ToolResult) -> TaskResult {
        serde_json::from_str(&result.output).unwrap()
    }

    #[tokio::test]
    async fn create_starts_pending_at_id_one() {
        let store = Arc::new(TaskStore::new());
        let tool = CreateTaskTool::new(store.clone());
        let result = tool
            .execute(serde_json::json!({
                "title": "Write report",
                "description": "Q3 numbers",
                "assignee": "sam"
            }))
            .await
            .unwrap();

        let task = parse(&result);
        assert_eq!(task.task_id, 1);
        assert_eq!(task.status, "PENDING");
        assert_eq!(task.message, "Task created successfully and assigned to sam");
        assert_eq!(store.get(1).await.unwrap().description, "Q3 numbers");
    }

    #[tokio::test]
    async fn update_and_assign_modify_existing_task() {
        let store = Arc::new(TaskStore::new());
        store.create("Deploy", "", "ana").await;

        let update = UpdateTaskStatusTool::new(store.clone());
        let result = parse(
            &update
                .execute(serde_json::json!({"task_id": 1, "status": "in progress"}))
                .await
                .unwrap(),
        );
        assert_eq!(result.status, "IN_PROGRESS");
        assert_eq!(result.message, "Task status updated to IN_PROGRESS");

        let assign = AssignTaskTool::new(store.clone());
        let result = parse(
            &assign
                .execute(serde_json::json!({"task_id": "1", "assignee": "lee"}))
                .await
                .unwrap(),
        );
        assert_eq!(result.assignee, "lee");
        assert_eq!(result.status, "IN_PROGRESS");

        let stored = store.get(1).await.unwrap();
        assert_eq!(stored.assignee, "lee");
        assert_eq!(stored.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn unknown_id_reports_error_without_mutation() {
        let store = Arc::new(TaskStore::new());
        store.create("Only task", "", "kim").await;
        let before = store.list().await;

        let update = UpdateTaskStatusTool::new(store.clone());
        let raw = update
            .execute(serde_json::json!({"task_id": 42, "status": "COMPLETED"}))
            .await
            .unwrap();
        assert!(!raw.success);
        let result = parse(&raw);
        assert!(result.is_error());
        assert_eq!(result.task_id, 42);
        assert_eq!(result.message, "Task not found");

        let assign = AssignTaskTool::new(store.clone());
        let result = parse(
            &assign
                .execute(serde_json::json!({"task_id": 42, "assignee": "x"}))
                .await
                .unwrap(),
        );
        assert_eq!(result.status, "ERROR");
        assert_eq!(store.list().await, before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_to_different_tasks_all_land() {
        let store = Arc::new(TaskStore::new());
        for i in 0..50 {
            store.create(&format!("task {i}"), "", "nobody").await;
        }

        let mut handles = Vec::new();
        for id in 1..=50u64 {
            let update = UpdateTaskStatusTool::new(store.clone());
            handles.push(tokio::spawn(async move {
                update
                    .execute(serde_json::json!({"task_id": id, "status": "IN_PROGRESS"}))
                    .await
                    .unwrap()
            }));
            let assign = AssignTaskTool::new(store.clone());
            handles.push(tokio::spawn(async move {
                assign
                    .execute(serde_json::json!({"task_id": id, "assignee": format!("dev-{id}")}))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }

        let tasks = store.list().await;
        assert_eq!(tasks.len(), 50);
        for task in tasks {
            assert_eq!(task.status, TaskStatus::InProgress, "task {}", task.id);
            assert_eq!(task.assignee, format!("dev-{}", task.id));
        }
    }

    #[tokio::test]
    async fn invalid_status_is_an_argument_error() {
        let store = Arc::new(TaskStore::new());
        store.create("t", "", "a").await;
        let update = UpdateTaskStatusTool::new(store.clone());
        let err = update
            .execute(serde_json::json!({"task_id": 1, "status": "DONE-ISH"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(store.get(1).await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(TaskStore::new());
        let mut handles = Vec::new();
        for i in 0..100 {
            let tool = CreateTaskTool::new(store.clone());
            handles.push(tokio::spawn(async move {
                let result = tool
                    .execute(serde_json::json!({"title": format!("task {i}"), "assignee": "pool"}))
                    .await
                    .unwrap();
                parse(&result).task_id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 100);
        assert_eq!(ids, (1..=100).collect::<HashSet<u64>>());
        assert_eq!(store.len().await, 100);
    }

    #[test]
    fn status_parsing_is_lenient() {
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert_eq!("In-Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("canceled".parse::<TaskStatus>().unwrap(), TaskStatus::Cancelled);
        assert!("done".parse::<TaskStatus>().is_err());
    }
}
