use std::process;

use anyhow::Context as _;
use clap::Parser;

use ft_harness::cli::{resolve_strict, Cli, Commands, FeatStatusArg, FinishResult};
use ft_harness::commands::{self, Context};
use ft_harness::error::exit_code;
use ft_harness::output::Report;
use ft_harness::ssot::schema::FeatStatus;

fn feat_status_from_arg(arg: FeatStatusArg) -> FeatStatus {
    match arg {
        FeatStatusArg::Draft => FeatStatus::Draft,
        FeatStatusArg::Active => FeatStatus::Active,
        FeatStatusArg::Done => FeatStatus::Done,
        FeatStatusArg::Abandoned => FeatStatus::Abandoned,
        FeatStatusArg::Archived => FeatStatus::Archived,
    }
}

fn print_index_entries(entries: &[(String, ft_harness::ssot::schema::IndexEntry)], json: bool) {
    if json {
        let array: Vec<serde_json::Value> = entries
            .iter()
            .map(|(id, entry)| {
                serde_json::json!({
                    "feat_id": id,
                    "title": entry.title,
                    "status": entry.status.to_string(),
                    "branch": entry.branch,
                    "worktree_path": entry.worktree_path,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(array));
        return;
    }
    for (id, entry) in entries {
        Report::new()
            .field("feat_id", id.clone())
            .field("title", entry.title.clone())
            .field("status", entry.status.to_string())
            .field("branch", entry.branch.clone())
            .field("worktree", entry.worktree_path.clone())
            .print(false);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::at(cli.root.clone());
    let json = cli.json;

    match cli.command {
        Commands::CheckReferenceReadiness {
            manifest,
            strict,
            no_strict,
        } => {
            let strict = resolve_strict(strict, no_strict, false);
            commands::check_reference_readiness(&ctx.readiness_gate, manifest.as_deref(), strict)
                .context("check-reference-readiness failed")?
                .print(json);
        }
        Commands::ValidateReferenceReport { report } => {
            commands::validate_reference_report(&ctx.readiness_gate, &report)
                .context("validate-reference-report failed")?
                .print(json);
        }
        Commands::InitializeHarness { base_branch } => {
            commands::initialize_harness(&ctx, base_branch.as_deref())
                .context("initialize-harness failed")?
                .print(json);
        }
        Commands::CreateFeat {
            title,
            goal,
            slug,
            manifest,
            strict,
            no_strict,
        } => {
            let strict = resolve_strict(strict, no_strict, false);
            commands::create_feat(&ctx, &title, &goal, slug.as_deref(), manifest.as_deref(), strict)
                .context("create-feat failed")?
                .print(json);
        }
        Commands::ShowFeatStatus { feat } => {
            commands::show_feat_status(&ctx, &feat)
                .context("show-feat-status failed")?
                .print(json);
        }
        Commands::StartTask { feat, task, title } => {
            commands::start_task(&ctx, &feat, task.as_deref(), title.as_deref())
                .context("start-task failed")?
                .print(json);
        }
        Commands::RunTaskGate { feat, task } => {
            commands::run_task_gate(&ctx, &feat, &task)
                .context("run-task-gate failed")?
                .print(json);
        }
        Commands::PrepareTaskCommit {
            feat,
            task,
            summary,
            plan,
            check,
            learn,
            execute,
        } => {
            commands::prepare_task_commit(&ctx, &feat, &task, &summary, &plan, &check, &learn, execute)
                .context("prepare-task-commit failed")?
                .print(json);
        }
        Commands::FinishTask { feat, task, result } => {
            let done = matches!(result, FinishResult::Done);
            commands::finish_task(&ctx, &feat, &task, done)
                .context("finish-task failed")?
                .print(json);
        }
        Commands::ArchiveFeat { feat } => {
            commands::archive_feat(&ctx, &feat)
                .context("archive-feat failed")?
                .print(json);
        }
        Commands::ValidateHarness => {
            commands::validate_harness(&ctx)
                .context("validate-harness failed")?
                .print(json);
        }
        Commands::DiagnoseHarness => {
            let report = commands::diagnose_harness(&ctx).context("diagnose-harness failed")?;
            if json {
                println!("{}", serde_json::to_string(&report)?);
            } else if report.is_clean() {
                println!("status: clean");
            } else {
                for item in &report.items {
                    println!("{}: {:?}: {}", item.feat_id, item.kind, item.detail);
                }
            }
            if !report.is_clean() {
                return Err(ft_harness::error::FtError::InvalidTransition {
                    reason: format!("{} drift item(s) found", report.items.len()),
                }
                .into());
            }
        }
        Commands::ListFeats => {
            let entries = commands::list_feats(&ctx).context("list-feats failed")?;
            print_index_entries(&entries, json);
        }
        Commands::GetFeat { feat } => {
            commands::get_feat(&ctx, &feat)
                .context("get-feat failed")?
                .print(json);
        }
        Commands::FilterFeats { status } => {
            let entries = commands::filter_feats(&ctx, feat_status_from_arg(status))
                .context("filter-feats failed")?;
            print_index_entries(&entries, json);
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(exit_code(&err));
    }
}
