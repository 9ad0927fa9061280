//! `ccr-registry workflow set`

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use ccr_core::{validate, InheritanceMode};
use ccr_reconcile::{ProjectManager, WorkflowConfig};

use super::parse_expected;

#[derive(Subcommand, Debug)]
pub enum WorkflowCommand {
    /// Set a workflow's model and/or inheritance mode.
    ///
    /// Options left out keep their current value; `--clear-model` and
    /// `--clear-mode` reset them.
    Set {
        project_id: String,
        workflow_id: String,

        /// Routing target, e.g. `deepseek,deepseek-chat`.
        #[arg(long, conflicts_with = "clear_model")]
        model: Option<String>,

        #[arg(long)]
        clear_model: bool,

        /// `inherit` reuses the active agent's model; `default` uses the
        /// router default.
        #[arg(long, value_name = "inherit|default", conflicts_with = "clear_mode")]
        mode: Option<String>,

        #[arg(long)]
        clear_mode: bool,

        /// Fail if the project changed after this `updatedAt` (RFC 3339).
        #[arg(long, value_name = "TIMESTAMP")]
        expect_updated_at: Option<String>,
    },
}

pub fn run(manager: &ProjectManager, cmd: WorkflowCommand) -> Result<()> {
    match cmd {
        WorkflowCommand::Set {
            project_id,
            workflow_id,
            model,
            clear_model,
            mode,
            clear_mode,
            expect_updated_at,
        } => {
            let mode = validate::parse_inheritance_mode(mode.as_deref())?;
            let model_given = model.is_some() || clear_model;
            let mode_given = mode.is_some() || clear_mode;
            if !model_given && !mode_given {
                bail!("nothing to change: give --model, --mode, --clear-model or --clear-mode");
            }
            let expected = parse_expected(expect_updated_at.as_deref())?;
            let context = || format!("failed to update workflow {workflow_id}");

            if model_given && mode_given {
                manager
                    .set_workflow_config(
                        &project_id,
                        &workflow_id,
                        WorkflowConfig {
                            model: model.clone(),
                            inheritance_mode: mode,
                        },
                        expected,
                    )
                    .with_context(context)?;
            } else if model_given {
                manager
                    .set_workflow_model(&project_id, &workflow_id, model.as_deref(), expected)
                    .with_context(context)?;
            } else {
                manager
                    .set_workflow_inheritance_mode(&project_id, &workflow_id, mode, expected)
                    .with_context(context)?;
            }

            if model_given {
                let shown = model.as_deref().unwrap_or("router default");
                println!("{} Workflow {workflow_id} model → {shown}", "✓".green());
            }
            if mode_given {
                let shown = mode.unwrap_or(InheritanceMode::Default);
                println!("{} Workflow {workflow_id} mode → {shown}", "✓".green());
            }
            Ok(())
        }
    }
}
