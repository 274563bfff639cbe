use clap::Subcommand;
use knockout_core::TournamentId;

use crate::store::Store;
use crate::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Creates a new tournament for `size` teams. `size` must be a power of two.
    Create {
        name: String,
        game: String,
        size: usize,
    },
    List,
    /// Shows a tournament, its enrolled teams and the bracket.
    Show { id: TournamentId },
    /// Deletes a tournament together with its enrollments and bracket.
    Delete { id: TournamentId },
}

impl Command {
    pub async fn run(&self, store: &Store) -> Result<(), Error> {
        match self {
            Self::Create { name, game, size } => {
                let tournament = store.tournaments().insert(name, game, *size).await?;

                println!(
                    "Created tournament {} with id {}",
                    tournament.name, tournament.id
                );
            }
            Self::List => {
                let tournaments = store.tournaments().list().await?;

                println!("ID | Name | Game | Size | Created");
                for tournament in tournaments {
                    println!(
                        "{} | {} | {} | {} | {}",
                        tournament.id,
                        tournament.name,
                        tournament.game,
                        tournament.size(),
                        tournament.created
                    );
                }
            }
            Self::Show { id } => {
                let tournament = store
                    .tournaments()
                    .get(*id)
                    .await?
                    .ok_or(Error::NotFound("tournament"))?;

                println!("{} ({})", tournament.name, tournament.game);
                println!("Size: {}", tournament.size());
                println!("Created: {}", tournament.created);

                let teams = store.enrollments(*id).list().await?;
                println!("Enrolled teams ({}/{}):", teams.len(), tournament.size());
                for team in teams {
                    println!("  {} | {}", team.id, team.name);
                }

                match store.bracket(*id).view().await {
                    Ok(view) => {
                        for (round, matches) in view.rounds.iter().enumerate() {
                            println!("Round {}:", round + 1);

                            for m in matches {
                                println!(
                                    "  [{}] #{} {} {} : {} {}",
                                    m.id,
                                    m.match_number,
                                    m.team1.as_deref().unwrap_or("TBD"),
                                    score(m.score1),
                                    score(m.score2),
                                    m.team2.as_deref().unwrap_or("TBD"),
                                );
                            }
                        }
                    }
                    Err(Error::NotFound("bracket")) => println!("No bracket generated"),
                    Err(err) => return Err(err),
                }
            }
            Self::Delete { id } => {
                store.tournaments().delete(*id).await?;
            }
        }

        Ok(())
    }
}

fn score(score: Option<u32>) -> String {
    match score {
        Some(score) => score.to_string(),
        None => "-".to_owned(),
    }
}
