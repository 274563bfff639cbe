use clap::Subcommand;
use knockout_core::{MatchId, TeamId, TournamentId};
use rand::rngs::StdRng;

use crate::store::Store;
use crate::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enrolls a team in a tournament.
    Enroll {
        tournament: TournamentId,
        team: TeamId,
    },
    /// Removes a team from a tournament.
    Withdraw {
        tournament: TournamentId,
        team: TeamId,
    },
    /// Generates a new bracket from the enrolled teams, replacing the existing bracket.
    Generate { tournament: TournamentId },
    /// Records the result of a match.
    Record {
        #[arg(value_name = "MATCH")]
        id: MatchId,
        score1: u32,
        score2: u32,
    },
    /// Shows the champion of a tournament.
    Champion { tournament: TournamentId },
    /// Prints the bracket of a tournament as JSON.
    Export { tournament: TournamentId },
}

impl Command {
    pub async fn run(&self, store: &Store, rng: &mut StdRng) -> Result<(), Error> {
        match self {
            Self::Enroll { tournament, team } => {
                store.enrollments(*tournament).insert(*team).await?;
            }
            Self::Withdraw { tournament, team } => {
                store.enrollments(*tournament).delete(*team).await?;
            }
            Self::Generate { tournament } => {
                let bracket = store.bracket(*tournament).generate(rng).await?;

                println!("Match | Team 1 | Team 2");
                for r#match in bracket.rounds().next().unwrap_or_default() {
                    let [first, second] = r#match.entrants;
                    if let (Some(first), Some(second)) = (first.entrant(), second.entrant()) {
                        println!("{} | {} | {}", r#match.id, first, second);
                    }
                }
            }
            Self::Record { id, score1, score2 } => {
                let propagation = store
                    .matches()
                    .record_result(*id, *score1, *score2, rng)
                    .await?;

                match propagation.next {
                    Some(link) => println!(
                        "Team {} advances to match {} (slot {})",
                        propagation.winner,
                        link.match_id,
                        link.slot.to_u8()
                    ),
                    None => println!("Team {} wins the tournament", propagation.winner),
                }
            }
            Self::Champion { tournament } => match store.bracket(*tournament).champion().await? {
                Some(team) => println!("{} | {}", team.id, team.name),
                None => println!("No champion yet"),
            },
            Self::Export { tournament } => {
                let view = store.bracket(*tournament).view().await?;

                println!("{}", serde_json::to_string_pretty(&view)?);
            }
        }

        Ok(())
    }
}
