//! Built-in tool implementations for Spindle.
//!
//! - Task management (`create_task`, `update_task_status`, `assign_task`)
//!   over a shared, injected [`TaskStore`]
//! - `current_date_time`

pub mod date_time;
pub mod task_management;

use std::sync::Arc;

use spindle_core::tool::ToolRegistry;

pub use date_time::DateTimeTool;
pub use task_management::{
    AssignTaskTool, CreateTaskTool, Task, TaskResult, TaskStatus, TaskStore, UpdateTaskStatusTool,
};

/// Register the three task tools, all sharing `store`.
pub fn register_task_tools(registry: &mut ToolRegistry, store: Arc<TaskStore>) {
    registry.register(Arc::new(CreateTaskTool::new(store.clone())));
    registry.register(Arc::new(UpdateTaskStatusTool::new(store.clone())));
    registry.register(Arc::new(AssignTaskTool::new(store)));
}

/// A registry holding only the task tools.
pub fn task_registry(store: Arc<TaskStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_task_tools(&mut registry, store);
    registry
}

/// Create a default tool registry with all built-in tools.
pub fn default_registry(store: Arc<TaskStore>) -> ToolRegistry {
    let mut registry = task_registry(store);
    registry.register(Arc::new(DateTimeTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry(Arc::new(TaskStore::new()));
        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec!["assign_task", "create_task", "current_date_time", "update_task_status"]
        );
    }
}
