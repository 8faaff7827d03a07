use crate::domain::{NewTodo, Priority, Todo, TodoFilter, TodoId, TodoPatch};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create_todo(&self, todo: NewTodo) -> anyhow::Result<Todo>;
    async fn get_todo(&self, id: TodoId) -> anyhow::Result<Option<Todo>>;
    /// Matching todos, newest first.
    async fn list_todos(&self, filter: TodoFilter) -> anyhow::Result<Vec<Todo>>;
    async fn update_todo(&self, id: TodoId, patch: TodoPatch) -> anyhow::Result<Option<Todo>>;
    /// Returns whether a todo was removed.
    async fn delete_todo(&self, id: TodoId) -> anyhow::Result<bool>;
}

fn newest_first(todos: &mut [Todo]) {
    todos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct InMemoryState {
    next_id: TodoId,
    todos: BTreeMap<TodoId, Todo>,
}

#[derive(Default)]
pub struct InMemoryTodoStore {
    inner: Arc<Mutex<InMemoryState>>,
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> anyhow::Result<std::sync::MutexGuard<'_, InMemoryState>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("todo store lock poisoned"))
    }
}

#[async_trait]
impl TodoStore for InMemoryTodoStore {
    async fn create_todo(&self, todo: NewTodo) -> anyhow::Result<Todo> {
        let mut state = self.state()?;
        state.next_id += 1;
        let created = Todo {
            id: state.next_id,
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
            priority: todo.priority,
            created_at: Utc::now(),
            updated_at: None,
        };
        state.todos.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_todo(&self, id: TodoId) -> anyhow::Result<Option<Todo>> {
        Ok(self.state()?.todos.get(&id).cloned())
    }

    async fn list_todos(&self, filter: TodoFilter) -> anyhow::Result<Vec<Todo>> {
        let mut todos: Vec<Todo> = self
            .state()?
            .todos
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        newest_first(&mut todos);
        Ok(todos)
    }

    async fn update_todo(&self, id: TodoId, patch: TodoPatch) -> anyhow::Result<Option<Todo>> {
        let mut state = self.state()?;
        let Some(todo) = state.todos.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(todo);
        todo.updated_at = Some(Utc::now());
        Ok(Some(todo.clone()))
    }

    async fn delete_todo(&self, id: TodoId) -> anyhow::Result<bool> {
        Ok(self.state()?.todos.remove(&id).is_some())
    }
}

// --- SQLite Implementation ---

pub struct SqliteTodoStore {
    pool: SqlitePool,
}

impl SqliteTodoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the `todos` table and adds columns missing from older databases.
    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                completed BOOLEAN NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let cols = sqlx::query("PRAGMA table_info(todos)")
            .fetch_all(&self.pool)
            .await?;
        let mut has_priority = false;
        let mut has_updated_at = false;
        for row in cols {
            let name: String = row.get("name");
            if name == "priority" {
                has_priority = true;
            }
            if name == "updated_at" {
                has_updated_at = true;
            }
        }
        if !has_priority {
            sqlx::query("ALTER TABLE todos ADD COLUMN priority INTEGER NOT NULL DEFAULT 0")
                .execute(&self.pool)
                .await?;
        }
        if !has_updated_at {
            sqlx::query("ALTER TABLE todos ADD COLUMN updated_at TEXT")
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    fn row_to_todo(row: &SqliteRow) -> anyhow::Result<Todo> {
        let priority: i64 = row.try_get("priority")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: Option<String> = row.try_get("updated_at").unwrap_or(None);
        Ok(Todo {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            completed: row.try_get("completed")?,
            priority: Priority::try_from(priority)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Current time at the precision the `todos` table keeps.
fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 as written by this store and the naive `YYYY-MM-DD HH:MM:SS[.f]`
/// form found in older databases.
fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .with_context(|| format!("unrecognised timestamp {raw:?}"))?;
    Ok(naive.and_utc())
}

#[async_trait]
impl TodoStore for SqliteTodoStore {
    async fn create_todo(&self, todo: NewTodo) -> anyhow::Result<Todo> {
        let created_at = stored_now();
        let result = sqlx::query(
            r#"
            INSERT INTO todos (title, description, completed, priority, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.completed)
        .bind(i64::from(todo.priority))
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await?;

        Ok(Todo {
            id: result.last_insert_rowid(),
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
            priority: todo.priority,
            created_at,
            updated_at: None,
        })
    }

    async fn get_todo(&self, id: TodoId) -> anyhow::Result<Option<Todo>> {
        let row = sqlx::query("SELECT * FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_todo).transpose()
    }

    async fn list_todos(&self, filter: TodoFilter) -> anyhow::Result<Vec<Todo>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM todos
            WHERE (?1 IS NULL OR completed = ?1)
              AND (?2 IS NULL OR priority = ?2)
            "#,
        )
        .bind(filter.completed)
        .bind(filter.priority.map(i64::from))
        .fetch_all(&self.pool)
        .await?;

        let mut todos = rows
            .iter()
            .map(Self::row_to_todo)
            .collect::<anyhow::Result<Vec<_>>>()?;
        // Sorted here so naive and RFC 3339 timestamps compare correctly.
        newest_first(&mut todos);
        Ok(todos)
    }

    async fn update_todo(&self, id: TodoId, patch: TodoPatch) -> anyhow::Result<Option<Todo>> {
        let Some(mut todo) = self.get_todo(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut todo);
        let updated_at = stored_now();
        todo.updated_at = Some(updated_at);

        sqlx::query(
            r#"
            UPDATE todos
            SET title = ?, description = ?, completed = ?, priority = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.completed)
        .bind(i64::from(todo.priority))
        .bind(format_timestamp(updated_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(todo))
    }

    async fn delete_todo(&self, id: TodoId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
