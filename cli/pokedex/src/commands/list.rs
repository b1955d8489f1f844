use anyhow::{Context, Result};
use bpaf::Bpaf;
use pokedex_sdk::models::pager::LoadOutcome;
use pokedex_sdk::pokedex_catalog::{
    CatalogClient,
    CatalogClientError,
    ClientTrait,
    EntityId,
    ListEntry,
};
use pokedex_sdk::session::BrowseSession;
use pokedex_sdk::utils::errors::display_chain;
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::Config;
use crate::utils::message;

/// Shown in place of values that could not be fetched
const PLACEHOLDER: &str = "…";

// List catalog entries page by page
#[derive(Debug, Bpaf, Clone)]
pub struct List {
    /// Display entries as a JSON array
    #[bpaf(long)]
    pub json: bool,

    /// Number of pages to load
    #[bpaf(long, argument("N"), fallback(1))]
    pub pages: u32,
}

/// One row of the list, as rendered for a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub id: Option<EntityId>,
    pub name: String,
    pub types: Vec<String>,
    pub sprite_url: Option<Url>,
}

impl List {
    #[instrument(name = "list", fields(json = self.json, pages = self.pages), skip_all)]
    pub async fn handle(self, config: Config) -> Result<()> {
        let client = CatalogClient::new(config.catalog_client_config())?;
        let session = BrowseSession::open(client, config.detail_cache_path());

        let cards = load_cards(&session, self.pages).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        } else if cards.is_empty() {
            message::plain("The catalog is empty");
        } else {
            print!("{}", render_cards(&cards));
        }
        Ok(())
    }
}

/// Load up to `pages` pages and resolve every card concurrently.
///
/// A failure of the first page is an error. Later pages are best effort,
/// the entries loaded so far are still listed.
async fn load_cards<C>(session: &BrowseSession<C>, pages: u32) -> Result<Vec<Card>>
where
    C: ClientTrait + 'static,
{
    session
        .reset_and_load_first_page()
        .await
        .context("Could not load the catalog")?;

    for _ in 1..pages {
        match session.load_next_page().await {
            Ok(LoadOutcome::Exhausted) => {
                debug!("no more pages");
                break;
            },
            Ok(_) => {},
            Err(e) => {
                message::warning(more_entries_warning(&e));
                break;
            },
        }
    }

    let entries = session.entries();
    let cards = futures::future::join_all(entries.iter().map(|entry| card(session, entry))).await;
    Ok(cards)
}

fn more_entries_warning(err: &CatalogClientError) -> String {
    format!("Could not load more entries: {}", display_chain(err))
}

async fn card<C>(session: &BrowseSession<C>, entry: &ListEntry) -> Card
where
    C: ClientTrait + 'static,
{
    let (sprite_url, types) = futures::join!(session.sprite_url_for(entry), session.types_for(entry));
    Card {
        id: session.id_for(entry),
        name: entry.name.clone(),
        types,
        sprite_url,
    }
}

fn render_cards(cards: &[Card]) -> String {
    let name_width = cards
        .iter()
        .map(|card| card.name.chars().count())
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    for card in cards {
        let id = card
            .id
            .map(|id| format!("#{id}"))
            .unwrap_or_else(|| PLACEHOLDER.to_string());
        let types = if card.types.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            card.types.join("/")
        };
        let sprite = card
            .sprite_url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| PLACEHOLDER.to_string());

        out.push_str(&format!(
            "{id:>5}  {name:<name_width$}  {types:<18}  {sprite}\n",
            name = card.name
        ));
    }
    out
}
