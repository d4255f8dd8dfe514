//! Subcommand execution

use crate::cli::assignments;
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use futures::future::join_all;
use hitl_client::{HttpBackend, HttpInterruptStream};
use hitl_core::{
    ChangeOrigin, Decision, DecisionOutcome, FallbackStore, FileFallbackStore,
    MemoryFallbackStore, ProposalItem, ReviewConfig, ReviewEngine, ScopeContext, ScopeResolver,
    StaticSession,
};
use hitl_render::View;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration file plus command line overrides
pub(crate) fn load_config(matches: &ArgMatches) -> Result<ReviewConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ReviewConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ReviewConfig::default(),
    };
    if let Some(url) = matches.get_one::<String>("backend-url") {
        config = config.with_backend_url(url);
    }
    if let Some(thread_id) = matches.get_one::<String>("thread-id") {
        config = config.with_thread_id(thread_id);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn session(matches: &ArgMatches) -> StaticSession {
    let default_scope = ScopeContext::new(
        matches.get_one::<String>("org").map(String::as_str),
        matches.get_one::<String>("project").map(String::as_str),
    );
    let session = StaticSession::anonymous().with_default_scope(default_scope);
    match matches.get_one::<String>("token") {
        Some(token) => session.with_token(token),
        None => session,
    }
}

fn fallback_store(config: &ReviewConfig) -> Result<Arc<dyn FallbackStore>> {
    Ok(match &config.fallback_path {
        Some(path) => Arc::new(
            FileFallbackStore::open(path)
                .with_context(|| format!("opening fallback store {}", path.display()))?,
        ),
        None => Arc::new(MemoryFallbackStore::new()),
    })
}

/// Assemble an engine over the HTTP backend and mount it on `--route`
fn engine(matches: &ArgMatches, config: ReviewConfig) -> Result<ReviewEngine> {
    let session = Arc::new(session(matches));
    let backend = HttpBackend::from_config(&config, session.clone())?;
    let stream = HttpInterruptStream::from_config(&config, session.clone())?;
    let resolver = ScopeResolver::new(fallback_store(&config)?).with_session(session);

    let engine = ReviewEngine::new(config, Arc::new(backend), Arc::new(stream), resolver);
    let scope = engine.mount(matches.get_one::<String>("route").map(String::as_str));
    debug!(%scope, "engine mounted");
    Ok(engine)
}

/// Run the parsed command
pub(crate) async fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;

    match matches.subcommand() {
        Some(("scope", sub)) => run_scope(matches, sub, config),
        Some((name, sub)) => {
            let engine = engine(matches, config)?;
            if !engine.scope_handle().context().is_resolved() {
                bail!("no scope: pass --route, --org or run `hitl scope set` first");
            }
            let listed = engine.refresh().await;
            debug!(count = listed.len(), "proposals loaded");
            match name {
                "list" => list(&engine, sub.get_flag("json")),
                "show" => show(&engine, required(sub, "id")?, sub.get_flag("json")),
                "edit" => edit(&engine, required(sub, "id")?).await,
                "approve" => {
                    let overrides = assignments(sub);
                    decide_all(&engine, ids(sub), |item| approve_decision(item, &overrides)).await
                }
                "reject" => {
                    let reason = sub.get_one::<String>("reason").cloned();
                    decide_all(&engine, ids(sub), |_| match &reason {
                        Some(reason) => Decision::reject_because(reason.clone()),
                        None => Decision::reject(),
                    })
                    .await
                }
                other => bail!("unknown command '{other}'"),
            }
        }
        None => bail!("no command given"),
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing <{id}>"))
}

fn ids(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("ids")
        .map(|ids| ids.cloned().collect())
        .unwrap_or_default()
}

fn list(engine: &ReviewEngine, json: bool) -> Result<()> {
    let items = engine.items();
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No proposals awaiting review in {}", engine.scope_handle().context());
        return Ok(());
    }
    for item in &items {
        println!("{}", list_line(item));
    }
    println!("\n{} pending", engine.pending_count());
    Ok(())
}

/// One row of `list` output
pub(crate) fn list_line(item: &ProposalItem) -> String {
    let source = if item.is_live() { "live" } else { "saved" };
    let mut line = format!(
        "{:<24} {:<10} {:<6} {}",
        item.id,
        item.status.as_str(),
        source,
        item.title
    );
    if !item.summary.is_empty() {
        line.push_str(" - ");
        line.push_str(&item.summary);
    }
    line
}

fn show(engine: &ReviewEngine, id: &str, json: bool) -> Result<()> {
    let view: View = engine.preview(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", view.to_text());
    }
    Ok(())
}

async fn edit(engine: &ReviewEngine, id: &str) -> Result<()> {
    match engine.decide(id, Decision::Edit).await? {
        DecisionOutcome::Editing(session) => {
            println!("{}", serde_json::to_string_pretty(&session.args)?);
            println!("\nApprove with changes: hitl approve {id} --set key=value");
        }
        other => println!("{}", outcome_line(&other)),
    }
    Ok(())
}

/// Approval for `item`, with `--set` overrides merged over its arguments
pub(crate) fn approve_decision(item: &ProposalItem, overrides: &[(String, serde_json::Value)]) -> Decision {
    if overrides.is_empty() {
        return Decision::approve();
    }
    let mut args = item.payload.args.clone();
    for (key, value) in overrides {
        args.insert(key.clone(), value.clone());
    }
    Decision::approve_with(args)
}

/// Decide every id concurrently; fails if any decision failed
async fn decide_all<F>(engine: &ReviewEngine, ids: Vec<String>, decision_for: F) -> Result<()>
where
    F: Fn(&ProposalItem) -> Decision,
{
    let mut pending = Vec::with_capacity(ids.len());
    for id in &ids {
        let item = engine.aggregator().require(id)?;
        let decision = decision_for(&item);
        pending.push(async move {
            let outcome = engine.decide(&item.id, decision).await;
            (item.id, outcome)
        });
    }

    let mut failures = 0usize;
    for (id, outcome) in join_all(pending).await {
        match outcome {
            Ok(outcome) => println!("{}", outcome_line(&outcome)),
            Err(err) => {
                failures += 1;
                eprintln!("{id}: {}", err.user_message());
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} decisions failed", ids.len());
    }
    Ok(())
}

/// Human summary of a decision outcome
pub(crate) fn outcome_line(outcome: &DecisionOutcome) -> String {
    match outcome {
        DecisionOutcome::Decided {
            item_id,
            status,
            record_persisted,
            message,
        } => {
            let mut line = format!("{item_id}: {status}");
            if let Some(message) = message {
                let _ = write!(line, " ({message})");
            }
            if !record_persisted {
                line.push_str(" [audit record not saved]");
            }
            line
        }
        DecisionOutcome::Editing(session) => format!("{}: opened for editing", session.item_id),
        DecisionOutcome::InFlight { item_id } => format!("{item_id}: already being applied"),
    }
}

fn run_scope(matches: &ArgMatches, sub: &ArgMatches, config: ReviewConfig) -> Result<()> {
    let store = fallback_store(&config)?;
    let keys = config.fallback.clone();

    match sub.subcommand() {
        Some(("show", _)) => {
            let resolver = ScopeResolver::new(store)
                .with_session(Arc::new(session(matches)))
                .with_keys(keys);
            let scope = resolver.resolve(matches.get_one::<String>("route").map(String::as_str));
            println!("{scope}");
        }
        Some(("set", _)) => {
            if config.fallback_path.is_none() {
                bail!("no fallback_path configured; nothing to persist to");
            }
            let org = matches
                .get_one::<String>("org")
                .context("scope set needs --org")?;
            let project = matches.get_one::<String>("project").map(String::as_str);
            store.set(&keys.org_key, Some(org.as_str()), ChangeOrigin::External)?;
            store.set(&keys.project_key, project, ChangeOrigin::External)?;
            info!(org_id = %org, project_id = project.unwrap_or("-"), "fallback scope stored");
            println!("{}", ScopeContext::new(Some(org.as_str()), project));
        }
        Some(("clear", _)) => {
            store.set(&keys.org_key, None, ChangeOrigin::External)?;
            store.set(&keys.project_key, None, ChangeOrigin::External)?;
            println!("{}", ScopeContext::unresolved());
        }
        _ => bail!("unknown scope command"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;
    use hitl_core::{ProposalOrigin, ProposalStatus};
    use hitl_test_utils::scope;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item() -> ProposalItem {
        ProposalItem::new(
            "int-1-0",
            "select_standards",
            scope("o1", "p1"),
            ProposalOrigin::Interrupt {
                interrupt_id: "int-1".into(),
                request_index: 0,
            },
        )
        .with_arg("limit", json!(3))
        .with_arg("trigger_id", json!("t1"))
    }

    #[test]
    fn overrides_merge_over_args() {
        let decision = approve_decision(&item(), &[("limit".to_string(), json!(10))]);
        let Decision::Approve { edited_args: Some(args) } = decision else {
            panic!("expected edited approval");
        };
        assert_eq!(args["limit"], json!(10));
        assert_eq!(args["trigger_id"], json!("t1"));
    }

    #[test]
    fn no_overrides_is_plain_approval() {
        assert_eq!(approve_decision(&item(), &[]), Decision::approve());
    }

    #[test]
    fn list_line_marks_source() {
        let line = list_line(&item().with_summary("Pick ISO 27001"));
        assert!(line.starts_with("int-1-0"));
        assert!(line.contains("live"));
        assert!(line.ends_with("Standards selection - Pick ISO 27001"));
    }

    #[test]
    fn outcome_lines() {
        let decided = DecisionOutcome::Decided {
            item_id: "r1".into(),
            status: ProposalStatus::Approved,
            record_persisted: false,
            message: Some("applied".into()),
        };
        assert_eq!(outcome_line(&decided), "r1: approved (applied) [audit record not saved]");
        assert_eq!(
            outcome_line(&DecisionOutcome::InFlight { item_id: "r1".into() }),
            "r1: already being applied"
        );
    }

    #[test]
    fn config_overrides_from_flags() {
        let matches = cli::build()
            .try_get_matches_from([
                "hitl",
                "list",
                "--backend-url",
                "http://review.local:9000",
                "--thread-id",
                "t-7",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.backend_url, "http://review.local:9000");
        assert_eq!(config.thread_id.as_deref(), Some("t-7"));
    }

    #[test]
    fn scope_set_then_show_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.json");
        let config_path = dir.path().join("hitl.toml");
        std::fs::write(
            &config_path,
            format!("fallback_path = {:?}\n", path.to_string_lossy()),
        )
        .unwrap();
        let config_arg = config_path.to_string_lossy().to_string();

        let set = cli::build()
            .try_get_matches_from(["hitl", "-c", &config_arg, "scope", "set", "--org", "o5", "--project", "p5"])
            .unwrap();
        let (_, sub) = set.subcommand().unwrap();
        run_scope(&set, sub, load_config(&set).unwrap()).unwrap();

        let store = FileFallbackStore::open(&path).unwrap();
        assert_eq!(store.get("hitl.org_id").as_deref(), Some("o5"));
        assert_eq!(store.get("hitl.project_id").as_deref(), Some("p5"));
    }
}
