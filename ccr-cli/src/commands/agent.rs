//! `ccr-registry agent set-model`

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use ccr_reconcile::ProjectManager;

use super::parse_expected;

#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Assign a `provider,model` routing target to an agent, or clear it.
    SetModel {
        project_id: String,
        agent_id: String,

        /// Routing target, e.g. `openrouter,anthropic/claude-sonnet-4`.
        model: Option<String>,

        /// Remove the agent's model so the router default applies.
        #[arg(long, conflicts_with = "model")]
        clear: bool,

        /// Fail if the project changed after this `updatedAt` (RFC 3339).
        #[arg(long, value_name = "TIMESTAMP")]
        expect_updated_at: Option<String>,
    },
}

pub fn run(manager: &ProjectManager, cmd: AgentCommand) -> Result<()> {
    match cmd {
        AgentCommand::SetModel {
            project_id,
            agent_id,
            model,
            clear,
            expect_updated_at,
        } => {
            if model.is_none() && !clear {
                bail!("give a model or pass --clear");
            }
            let expected = parse_expected(expect_updated_at.as_deref())?;
            manager
                .set_agent_model(&project_id, &agent_id, model.as_deref(), expected)
                .with_context(|| format!("failed to update agent {agent_id}"))?;
            match model {
                Some(model) => println!("{} Agent {agent_id} → {model}", "✓".green()),
                None => println!("{} Agent {agent_id} uses the router default", "✓".green()),
            }
            Ok(())
        }
    }
}
