use std::collections::HashMap;
use std::path::Path;

use super::reference;
use super::tables;
use super::types::{FieldDefinition, FieldSchema, Task};
use super::SchemaError;

/// Field table of one task, in canonical (model input) order.
#[derive(Debug, Clone)]
pub struct TaskSchema {
    pub task: Task,
    /// Model label that represents elevated risk for this task.
    pub adverse_class_label: u8,
    /// `false` for the no-model mode: scoring yields no number.
    pub requires_model: bool,
    fields: Vec<FieldSchema>,
    index: HashMap<String, usize>,
}

impl TaskSchema {
    pub fn new(
        task: Task,
        adverse_class_label: u8,
        requires_model: bool,
        definitions: Vec<FieldDefinition>,
    ) -> Result<Self, SchemaError> {
        if adverse_class_label > 1 {
            return Err(SchemaError::InvalidField {
                task,
                field: "adverse_class_label".into(),
                reason: format!("label must be 0 or 1, got {adverse_class_label}"),
            });
        }

        let mut fields = Vec::with_capacity(definitions.len());
        let mut index = HashMap::with_capacity(definitions.len());
        for def in definitions {
            let field = FieldSchema::from_definition(task, def)?;
            if index.contains_key(&field.name) {
                return Err(SchemaError::DuplicateField {
                    task,
                    field: field.name,
                });
            }
            index.insert(field.name.clone(), fields.len());
            fields.push(field);
        }

        Ok(Self {
            task,
            adverse_class_label,
            requires_model,
            fields,
            index,
        })
    }

    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fields in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    heart: TaskSchema,
    diabetes: TaskSchema,
    general: TaskSchema,
}

impl SchemaRegistry {
    /// Registry with the built-in tables.
    pub fn builtin() -> Result<Self, SchemaError> {
        Ok(Self {
            heart: builtin_task(Task::Heart)?,
            diabetes: builtin_task(Task::Diabetes)?,
            general: builtin_task(Task::General)?,
        })
    }

    /// Built-in tables, with tasks replaced by those defined in `path`.
    pub fn with_overrides(path: &Path) -> Result<Self, SchemaError> {
        let mut registry = Self::builtin()?;
        for entry in reference::load_overrides(path)? {
            let adverse = entry
                .adverse_class_label
                .unwrap_or_else(|| tables::adverse_class_label(entry.task));
            let schema = TaskSchema::new(
                entry.task,
                adverse,
                tables::requires_model(entry.task),
                entry.fields,
            )?;
            tracing::info!(
                task = %entry.task,
                fields = schema.len(),
                "Schema override applied"
            );
            registry.replace(schema);
        }
        Ok(registry)
    }

    fn replace(&mut self, schema: TaskSchema) {
        match schema.task {
            Task::Heart => self.heart = schema,
            Task::Diabetes => self.diabetes = schema,
            Task::General => self.general = schema,
        }
    }

    pub fn schema(&self, task: Task) -> &TaskSchema {
        match task {
            Task::Heart => &self.heart,
            Task::Diabetes => &self.diabetes,
            Task::General => &self.general,
        }
    }

    /// Look up a task by its string id.
    pub fn schema_for(&self, task_id: &str) -> Result<&TaskSchema, SchemaError> {
        let task: Task = task_id.parse()?;
        Ok(self.schema(task))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskSchema> {
        [&self.heart, &self.diabetes, &self.general].into_iter()
    }
}

fn builtin_task(task: Task) -> Result<TaskSchema, SchemaError> {
    TaskSchema::new(
        task,
        tables::adverse_class_label(task),
        tables::requires_model(task),
        tables::definitions(task),
    )
}
