//! Interactive session: one prompt, many in-flight requests.
//!
//! Mutations run as local tasks so the prompt keeps reading while requests
//! are outstanding. Every store change re-renders the view at the current
//! address.

use std::io::Write;
use std::rc::Rc;
use std::str::FromStr;

use anyhow::anyhow;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::address::{Address, Route};
use crate::commands::{ViewContext, is_affirmative, write_delete_prompt};
use crate::error::StoreError;
use crate::filter::{FilterSelection, select_filter};
use crate::remote::TaskRemote;
use crate::store::{StoreState, TaskStore};
use crate::task::TaskId;

const HELP: &str = "\
commands:
  add <title>       create a task
  toggle <id>       flip completion
  delete <id>       delete a task (asks first)
  filter <token>    all | active | completed
  list | stats      switch view
  go <address>      open an address such as /?filter=active
  refresh           re-fetch the collection
  help              show this text
  quit              leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Toggle(TaskId),
    Delete(TaskId),
    Filter(FilterSelection),
    Route(Route),
    Go(Address),
    Refresh,
    Help,
    Quit,
    Nothing,
}

impl FromStr for ShellCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "" => ShellCommand::Nothing,
            "add" | "a" => ShellCommand::Add(rest.to_string()),
            "toggle" | "t" => ShellCommand::Toggle(parse_id(rest)?),
            "delete" | "rm" => ShellCommand::Delete(parse_id(rest)?),
            "filter" | "f" => ShellCommand::Filter(select_filter(Some(rest))),
            "list" | "ls" => ShellCommand::Route(Route::List),
            "stats" => ShellCommand::Route(Route::Stats),
            "go" => ShellCommand::Go(rest.parse()?),
            "refresh" => ShellCommand::Refresh,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => return Err(anyhow!("unknown command: {other} (try `help`)")),
        };
        Ok(command)
    }
}

fn parse_id(raw: &str) -> anyhow::Result<TaskId> {
    raw.parse()
        .map_err(|_| anyhow!("expected a task id, got: {raw:?}"))
}

#[instrument(skip(store, ctx, input, out), fields(address = %start))]
pub async fn run<R, I, W>(
    store: Rc<TaskStore<R>>,
    ctx: &ViewContext,
    start: Address,
    input: &mut I,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: TaskRemote + 'static,
    I: AsyncBufRead + Unpin,
    W: Write,
{
    info!("starting shell");
    let mut address = start;
    let mut changes = store.subscribe();
    let mut inflight: JoinSet<Result<(), StoreError>> = JoinSet::new();
    let mut pending_delete: Option<TaskId> = None;

    if store.is_loading() {
        let store = store.clone();
        inflight.spawn_local(async move {
            store.initialize().await;
            Ok(())
        });
    } else {
        ctx.renderer
            .render_address(out, &address, &store.snapshot())?;
    }

    let loading_timer = tokio::time::sleep(ctx.loading_delay);
    tokio::pin!(loading_timer);
    let mut loading_checked = false;

    let mut lines = input.lines();
    loop {
        tokio::select! {
            () = &mut loading_timer, if !loading_checked => {
                loading_checked = true;
                if store.is_loading() {
                    ctx.renderer.render_loading(out)?;
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                redraw(ctx, out, &address, &state)?;
            }
            Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                report(ctx, out, joined)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("input closed");
                    break;
                };

                if let Some(id) = pending_delete.take() {
                    if is_affirmative(&line) {
                        let store = store.clone();
                        inflight.spawn_local(async move { store.delete_todo(id).await });
                    } else {
                        writeln!(out, "Deletion cancelled.")?;
                    }
                    continue;
                }

                let command = match line.parse::<ShellCommand>() {
                    Ok(command) => command,
                    Err(err) => {
                        ctx.renderer.render_alert(out, &err.to_string())?;
                        continue;
                    }
                };
                debug!(?command, "shell command");

                match command {
                    ShellCommand::Nothing => {}
                    ShellCommand::Quit => break,
                    ShellCommand::Help => writeln!(out, "{HELP}")?,
                    ShellCommand::Add(title) => {
                        let store = store.clone();
                        inflight.spawn_local(async move { store.add_todo(&title).await });
                    }
                    ShellCommand::Toggle(id) => match store.snapshot().find(id) {
                        Some(task) => {
                            let current = task.is_completed;
                            let store = store.clone();
                            inflight.spawn_local(async move { store.toggle_todo(id, current).await });
                        }
                        None => ctx.renderer.render_alert(out, &format!("no task with id {id}"))?,
                    },
                    ShellCommand::Delete(id) => match store.snapshot().find(id) {
                        Some(task) if ctx.confirm_delete => {
                            write_delete_prompt(out, task)?;
                            pending_delete = Some(id);
                        }
                        Some(_) => {
                            let store = store.clone();
                            inflight.spawn_local(async move { store.delete_todo(id).await });
                        }
                        None => ctx.renderer.render_alert(out, &format!("no task with id {id}"))?,
                    },
                    ShellCommand::Refresh => {
                        let store = store.clone();
                        inflight.spawn_local(async move {
                            store.refresh().await;
                            Ok(())
                        });
                    }
                    ShellCommand::Filter(selection) => {
                        address = address.with_filter(selection);
                        redraw(ctx, out, &address, &store.snapshot())?;
                    }
                    ShellCommand::Route(route) => {
                        address = address.with_route(route);
                        redraw(ctx, out, &address, &store.snapshot())?;
                    }
                    ShellCommand::Go(next) => {
                        address = next;
                        redraw(ctx, out, &address, &store.snapshot())?;
                    }
                }
            }
        }
    }

    // Requests already sent are not cancelled. Wait for them, then draw the
    // state they left behind.
    while !inflight.is_empty() {
        tokio::select! {
            () = &mut loading_timer, if !loading_checked => {
                loading_checked = true;
                if store.is_loading() {
                    ctx.renderer.render_loading(out)?;
                }
            }
            Some(joined) = inflight.join_next() => report(ctx, out, joined)?,
            else => break,
        }
    }
    if changes.has_changed().unwrap_or(false) {
        let state = changes.borrow_and_update().clone();
        redraw(ctx, out, &address, &state)?;
    }
    info!(address = %address, "shell finished");
    Ok(())
}

/// Draws the view at `address`. While the first fetch is pending nothing is
/// drawn; the loading timer and the next store change take care of that.
fn redraw<W: Write>(
    ctx: &ViewContext,
    out: &mut W,
    address: &Address,
    state: &StoreState,
) -> anyhow::Result<()> {
    if state.loading {
        return Ok(());
    }
    ctx.renderer.render_address(out, address, state)
}

fn report<W: Write>(
    ctx: &ViewContext,
    out: &mut W,
    joined: Result<Result<(), StoreError>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => ctx.renderer.render_alert(out, &err.to_string()),
        Err(err) => {
            warn!(error = %err, "shell task did not complete");
            ctx.renderer
                .render_alert(out, &format!("operation aborted: {err}"))
        }
    }
}
