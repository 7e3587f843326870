use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Report};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use vaas_backlog::config::Config;
use vaas_backlog::db::{
    self,
    postgres::PgDocumentStore,
    session::SessionId,
    vote::{UserId, Vote, VotingId, WorkItemId},
};
use vaas_backlog::devops::{client::DevOpsClient, fields::RankField};
use vaas_backlog::log;
use vaas_backlog::services::{
    notify::TracingNotifier, ApplyOutcome, TeamContext, VotingService,
};

#[derive(Parser, Debug)]
#[command(name = "vaas-backlog")]
#[command(about = "Applies workitem votes to a team backlog")]
#[command(version)]
struct Args {
    /// Voting session (document id)
    #[arg(short, long, env = "VAAS_SESSION")]
    session: String,

    /// Overrides VAAS_RANK_FIELD
    #[arg(long)]
    rank_field: Option<RankField>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-rank the backlog from the session's votes
    Apply {
        /// Work item type to rank, e.g. "Product Backlog Item"
        #[arg(short, long)]
        level: String,
    },
    /// Cast a vote
    Vote {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        item: i64,
        #[arg(short, long, default_value = "3")]
        max_votes: usize,
    },
    /// Withdraw one vote
    Unvote {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        item: i64,
    },
    /// Remove a user's votes from every session
    ClearUser {
        #[arg(short, long)]
        user: String,
    },
    /// Print vote counts per work item
    Tally,
}

#[tokio::main]
async fn main() -> Result<(), Report> {
    log::init()?;
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(rank_field) = args.rank_field {
        config.backlog.rank_field = rank_field;
    }

    let pool = db::new_pool(&config.database_url).await?;
    let store = PgDocumentStore::new(pool);
    store.migrate().await?;

    let session_id = SessionId(args.session);
    let service = VotingService::new(
        Arc::new(store),
        Arc::new(DevOpsClient::new(&config.devops)?),
        Arc::new(TracingNotifier),
        config.backlog.clone(),
        TeamContext {
            project: config.devops.project.clone(),
            team: config.devops.team.clone(),
        },
        session_id.clone(),
    );
    info!(session = session_id.as_str(), "Starting");

    match args.command {
        Command::Apply { level } => match service.apply_to_backlog(&level).await {
            ApplyOutcome::Failed(failure) => {
                return Err(failure.error.wrap_err(format!("{} failed", failure.stage)))
            }
            ApplyOutcome::Updated(result) if !result.is_clean() => {
                return Err(eyre!("backlog partially updated, run apply again"))
            }
            _ => {}
        },
        Command::Vote {
            user,
            item,
            max_votes,
        } => {
            let vote = Vote::new(
                UserId(user),
                VotingId(session_id.0.clone()),
                WorkItemId(item),
            );
            service.save_vote(vote, max_votes).await?;
        }
        Command::Unvote { user, item } => {
            service.delete_vote(WorkItemId(item), &UserId(user)).await?;
        }
        Command::ClearUser { user } => {
            let summary = service.remove_all_user_votes(&UserId(user)).await?;
            if !summary.failed.is_empty() {
                return Err(eyre!(
                    "votes could not be removed from {} sessions",
                    summary.failed.len()
                ));
            }
        }
        Command::Tally => {
            let mut ledger = service.ledger();
            ledger.load().await?;
            let tally: BTreeMap<_, _> = ledger.tally().into_iter().collect();
            for (item, votes) in tally {
                println!("{}\t{}", item, votes);
            }
        }
    }
    Ok(())
}
