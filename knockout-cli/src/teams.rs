use clap::Subcommand;
use knockout_core::TeamId;

use crate::store::Store;
use crate::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Registers a new team.
    Add {
        name: String,
        /// A logo or other image shown next to the team.
        #[arg(long)]
        asset: Option<String>,
    },
    List,
    /// Replaces the asset of a team. Removes the asset if none is given.
    Asset { id: TeamId, asset: Option<String> },
}

impl Command {
    pub async fn run(&self, store: &Store) -> Result<(), Error> {
        match self {
            Self::Add { name, asset } => {
                let team = store.teams().insert(name, asset.as_deref()).await?;

                println!("Created team {} with id {}", team.name, team.id);
            }
            Self::List => {
                let teams = store.teams().list().await?;

                println!("ID | Name | Asset");
                for team in teams {
                    println!(
                        "{} | {} | {}",
                        team.id,
                        team.name,
                        team.asset.as_deref().unwrap_or("-")
                    );
                }
            }
            Self::Asset { id, asset } => {
                store.teams().update_asset(*id, asset.as_deref()).await?;
            }
        }

        Ok(())
    }
}
