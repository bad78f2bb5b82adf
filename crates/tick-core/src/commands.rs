use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, instrument};

use crate::address::Address;
use crate::cli::Command;
use crate::config::Config;
use crate::filter::select_filter;
use crate::remote::TaskRemote;
use crate::render::Renderer;
use crate::shell;
use crate::store::TaskStore;
use crate::task::{Task, TaskId};

/// Settings every view needs, resolved once from the config.
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub renderer: Renderer,
    pub loading_delay: Duration,
    pub confirm_delete: bool,
}

impl ViewContext {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            renderer: Renderer::new(cfg)?,
            loading_delay: cfg.loading_delay()?,
            confirm_delete: cfg.confirm_delete(),
        })
    }
}

#[instrument(skip(store, ctx, input, out))]
pub async fn dispatch<R, I, W>(
    store: Rc<TaskStore<R>>,
    ctx: &ViewContext,
    command: Command,
    input: &mut I,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: TaskRemote + 'static,
    I: AsyncBufRead + Unpin,
    W: Write,
{
    debug!(?command, "dispatching command");

    match command {
        Command::Show { address } => {
            let address = parse_address(address.as_deref())?;
            show(&store, ctx, &address, out).await
        }
        Command::List { filter } => {
            let address = Address::list(select_filter(filter.as_deref()));
            show(&store, ctx, &address, out).await
        }
        Command::Stats => show(&store, ctx, &Address::stats(), out).await,
        Command::Add { title } => cmd_add(&store, ctx, &title.join(" "), out).await,
        Command::Toggle { id } => cmd_toggle(&store, ctx, id, out).await,
        Command::Delete { id, yes } => cmd_delete(&store, ctx, id, yes, input, out).await,
        Command::Shell { address } => {
            let address = parse_address(address.as_deref())?;
            shell::run(store, ctx, address, input, out).await
        }
    }
}

pub fn parse_address(raw: Option<&str>) -> anyhow::Result<Address> {
    match raw {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid address: {raw}")),
        None => Ok(Address::default()),
    }
}

/// Runs the first fetch, printing the loading view only if the fetch outlasts
/// the configured delay.
pub async fn mount<R: TaskRemote, W: Write>(
    store: &TaskStore<R>,
    ctx: &ViewContext,
    out: &mut W,
) -> anyhow::Result<()> {
    let init = store.initialize();
    tokio::pin!(init);

    tokio::select! {
        biased;
        () = &mut init => return Ok(()),
        () = tokio::time::sleep(ctx.loading_delay) => {}
    }

    if store.is_loading() {
        ctx.renderer.render_loading(out)?;
    }
    init.await;
    Ok(())
}

async fn show<R: TaskRemote, W: Write>(
    store: &TaskStore<R>,
    ctx: &ViewContext,
    address: &Address,
    out: &mut W,
) -> anyhow::Result<()> {
    mount(store, ctx, out).await?;
    ctx.renderer
        .render_address(out, address, &store.snapshot())
}

async fn cmd_add<R: TaskRemote, W: Write>(
    store: &TaskStore<R>,
    ctx: &ViewContext,
    title: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");
    store.add_todo(title).await?;
    ctx.renderer
        .render_address(out, &Address::default(), &store.snapshot())
}

async fn cmd_toggle<R: TaskRemote, W: Write>(
    store: &TaskStore<R>,
    ctx: &ViewContext,
    id: TaskId,
    out: &mut W,
) -> anyhow::Result<()> {
    info!(id, "command toggle");
    mount(store, ctx, out).await?;
    let task = find_task(store, id)?;
    store.toggle_todo(id, task.is_completed).await?;
    ctx.renderer
        .render_address(out, &Address::default(), &store.snapshot())
}

async fn cmd_delete<R, I, W>(
    store: &TaskStore<R>,
    ctx: &ViewContext,
    id: TaskId,
    yes: bool,
    input: &mut I,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: TaskRemote,
    I: AsyncBufRead + Unpin,
    W: Write,
{
    info!(id, "command delete");
    mount(store, ctx, out).await?;
    let task = find_task(store, id)?;

    if ctx.confirm_delete && !yes {
        write_delete_prompt(out, &task)?;
        let mut answer = String::new();
        input
            .read_line(&mut answer)
            .await
            .context("failed to read confirmation")?;
        if !is_affirmative(&answer) {
            writeln!(out, "Deletion cancelled.")?;
            return Ok(());
        }
    }

    store.delete_todo(id).await?;
    ctx.renderer
        .render_address(out, &Address::default(), &store.snapshot())
}

fn find_task<R: TaskRemote>(store: &TaskStore<R>, id: TaskId) -> anyhow::Result<Task> {
    store
        .snapshot()
        .find(id)
        .cloned()
        .ok_or_else(|| anyhow!("no task with id {id}"))
}

pub fn write_delete_prompt<W: Write>(out: &mut W, task: &Task) -> anyhow::Result<()> {
    write!(
        out,
        "Delete \"{}\"? This cannot be undone. [y/N] ",
        task.title
    )?;
    out.flush()?;
    Ok(())
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::RemoteError;
    use crate::render::{EMPTY_MESSAGE, LOADING_MESSAGE};

    /// Remote whose `list` takes `latency` of (paused) time.
    struct SlowRemote {
        latency: Duration,
        tasks: RefCell<Vec<Task>>,
        log: RefCell<Vec<String>>,
    }

    impl SlowRemote {
        fn new(latency: Duration) -> Self {
            let mut done = Task::new(2, "buy milk", "2026-10-02T00:00:00Z");
            done.is_completed = true;
            Self {
                latency,
                tasks: RefCell::new(vec![Task::new(1, "write report", ""), done]),
                log: RefCell::new(vec![]),
            }
        }
    }

    impl TaskRemote for SlowRemote {
        async fn list(&self) -> Result<Vec<Task>, RemoteError> {
            self.log.borrow_mut().push("list".into());
            tokio::time::sleep(self.latency).await;
            Ok(self.tasks.borrow().clone())
        }

        async fn create(&self, title: &str) -> Result<(), RemoteError> {
            self.log.borrow_mut().push(format!("create {title}"));
            if title == "reject me" {
                return Err(RemoteError::Status { status: 400 });
            }
            self.tasks.borrow_mut().push(Task::new(9, title, ""));
            Ok(())
        }

        async fn set_completion(&self, id: TaskId, completed: bool) -> Result<(), RemoteError> {
            self.log.borrow_mut().push(format!("patch {id} {completed}"));
            Ok(())
        }

        async fn remove(&self, id: TaskId) -> Result<(), RemoteError> {
            self.log.borrow_mut().push(format!("delete {id}"));
            self.tasks.borrow_mut().retain(|t| t.id != id);
            Ok(())
        }
    }

    fn ctx(confirm_delete: bool) -> ViewContext {
        ViewContext {
            renderer: Renderer::plain(),
            loading_delay: Duration::from_millis(300),
            confirm_delete,
        }
    }

    async fn run(
        store: &Rc<TaskStore<SlowRemote>>,
        ctx: &ViewContext,
        command: Command,
        input: &str,
    ) -> anyhow::Result<String> {
        let mut input = input.as_bytes();
        let mut out = Vec::new();
        dispatch(store.clone(), ctx, command, &mut input, &mut out).await?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    #[tokio::test(start_paused = true)]
    async fn fast_fetch_never_shows_loading() {
        let store = Rc::new(TaskStore::new(SlowRemote::new(Duration::from_millis(50))));
        let out = run(&store, &ctx(true), Command::List { filter: None }, "")
            .await
            .expect("list");
        assert!(!out.contains(LOADING_MESSAGE));
        assert!(out.contains("write report"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_shows_loading_first() {
        let store = Rc::new(TaskStore::new(SlowRemote::new(Duration::from_secs(2))));
        let out = run(&store, &ctx(true), Command::Stats, "").await.expect("stats");
        let loading_at = out.find(LOADING_MESSAGE).expect("loading shown");
        let stats_at = out.find("Statistics").expect("stats shown");
        assert!(loading_at < stats_at);
        assert!(out.contains("50%"));
    }

    #[tokio::test(start_paused = true)]
    async fn add_renders_refreshed_list() {
        let store = Rc::new(TaskStore::new(SlowRemote::new(Duration::ZERO)));
        let out = run(
            &store,
            &ctx(true),
            Command::Add {
                title: vec!["plan".into(), "trip".into()],
            },
            "",
        )
        .await
        .expect("add");
        assert_eq!(*store.remote().log.borrow(), vec!["create plan trip", "list"]);
        assert!(out.contains("plan trip"));
    }

    #[tokio::test(start_paused = true)]
    async fn add_failure_is_an_error() {
        let store = Rc::new(TaskStore::new(SlowRemote::new(Duration::ZERO)));
        let err = run(
            &store,
            &ctx(true),
            Command::Add {
                title: vec!["reject".into(), "me".into()],
            },
            "",
        )
        .await
        .expect_err("create rejected");
        assert!(err.to_string().contains("failed to create task"));
        assert_eq!(*store.remote().log.borrow(), vec!["create reject me"]);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_uses_current_status() {
        let store = Rc::new(TaskStore::new(SlowRemote::new(Duration::ZERO)));
        run(&store, &ctx(true), Command::Toggle { id: 2 }, "")
            .await
            .expect("toggle");
        assert_eq!(*store.remote().log.borrow(), vec!["list", "patch 2 false"]);

        let missing = run(&store, &ctx(true), Command::Toggle { id: 42 }, "").await;
        assert!(missing.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_asks_before_removing() {
        let store = Rc::new(TaskStore::new(SlowRemote::new(Duration::ZERO)));
        let out = run(&store, &ctx(true), Command::Delete { id: 2, yes: false }, "n\n")
            .await
            .expect("declined");
        assert!(out.contains("Delete \"buy milk\"? This cannot be undone. [y/N]"));
        assert!(out.contains("Deletion cancelled."));
        assert_eq!(store.snapshot().tasks.len(), 2);

        run(&store, &ctx(true), Command::Delete { id: 2, yes: false }, "yes\n")
            .await
            .expect("confirmed");
        assert_eq!(store.snapshot().tasks.len(), 1);

        let out = run(&store, &ctx(false), Command::Delete { id: 1, yes: false }, "")
            .await
            .expect("no prompt");
        assert!(!out.contains("Delete \""));
        assert!(out.contains(EMPTY_MESSAGE));
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
    }
}
