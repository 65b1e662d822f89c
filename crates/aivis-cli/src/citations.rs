//! `citations` commands.

use clap::Subcommand;
use sqlx::PgPool;

use aivis_scoring::{CitationCategorizer, HeuristicClassifier, PgCategoryCache};

#[derive(Debug, Subcommand)]
pub enum CitationsCommands {
    /// Print (and cache) the category of a URL's domain
    Categorize {
        url: String,

        /// Brand or competitor names whose own domains count as corporate
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
}

pub(crate) async fn run(pool: &PgPool, command: CitationsCommands) -> anyhow::Result<()> {
    match command {
        CitationsCommands::Categorize { url, entities } => {
            let categorizer =
                CitationCategorizer::new(PgCategoryCache::new(pool.clone()), HeuristicClassifier);
            let names: Vec<&str> = entities.iter().map(String::as_str).collect();
            match categorizer.categorize(&url, &names).await? {
                Some((domain, category)) => println!("{domain}\t{category}"),
                None => anyhow::bail!("'{url}' is not an http(s) URL"),
            }
        }
    }
    Ok(())
}
