use std::sync::Arc;

use anyhow::Result;
use bpaf::Bpaf;
use indoc::formatdoc;
use pokedex_sdk::models::composite::CompositeDetail;
use pokedex_sdk::pokedex_catalog::{CatalogClient, EntityId};
use pokedex_sdk::providers::aggregator::DetailAggregator;
use tracing::instrument;

use crate::config::Config;

const NO_DESCRIPTION: &str = "No description available";

// Show the details of one catalog entry
#[derive(Debug, Bpaf, Clone)]
pub struct Show {
    /// Display the details as JSON
    #[bpaf(long)]
    pub json: bool,

    /// The numeric id of the entry, as shown by 'pokedex list'
    #[bpaf(positional("id"))]
    pub id: EntityId,
}

impl Show {
    #[instrument(name = "show", fields(id = %self.id), skip_all)]
    pub async fn handle(self, config: Config) -> Result<()> {
        let client = CatalogClient::new(config.catalog_client_config())?;
        let aggregator = DetailAggregator::new(Arc::new(client));

        let composite = aggregator.fetch_composite(self.id).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&composite)?);
        } else {
            print!("{}", render_composite(&composite));
        }
        Ok(())
    }
}

fn render_composite(composite: &CompositeDetail) -> String {
    let detail = &composite.detail;
    let image = detail
        .image_ref()
        .map(|url| url.to_string())
        .unwrap_or_else(|| "none".to_string());
    let types = detail.type_names().join(", ");
    let stats = detail
        .stats
        .iter()
        .map(|stat| format!("  {:<16} {:>3} (effort {})", stat.name, stat.base_value, stat.effort))
        .collect::<Vec<_>>()
        .join("\n");
    let description = composite.description.as_deref().unwrap_or(NO_DESCRIPTION);

    formatdoc! {"
        {name} #{id}
        Types: {types}
        Image: {image}

        {description}

        Stats:
        {stats}
        ",
        name = detail.name,
        id = detail.id,
    }
}

#[cfg(test)]
mod tests {
    use pokedex_catalog::types::{Sprites, Stat, TypeSlot};
    use pokedex_catalog::EntityDetail;
    use pretty_assertions::assert_eq;

    use super::*;

    fn composite(description: Option<&str>) -> CompositeDetail {
        CompositeDetail {
            detail: EntityDetail {
                id: EntityId::new(1).unwrap(),
                name: "bulbasaur".to_string(),
                sprites: Sprites {
                    front_default: Some("https://img.example/1.png".to_string()),
                },
                types: vec![
                    TypeSlot {
                        slot: 2,
                        name: "poison".to_string(),
                    },
                    TypeSlot {
                        slot: 1,
                        name: "grass".to_string(),
                    },
                ],
                stats: vec![
                    Stat {
                        base_value: 45,
                        effort: 0,
                        name: "hp".to_string(),
                    },
                    Stat {
                        base_value: 49,
                        effort: 1,
                        name: "attack".to_string(),
                    },
                ],
            },
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn renders_detail_screen() {
        let rendered = render_composite(&composite(Some("A strange seed was planted.")));
        let expected = [
            "bulbasaur #1",
            "Types: grass, poison",
            "Image: https://img.example/1.png",
            "",
            "A strange seed was planted.",
            "",
            "Stats:",
            "  hp                45 (effort 0)",
            "  attack            49 (effort 1)",
            "",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn missing_description_has_placeholder() {
        let rendered = render_composite(&composite(None));
        assert!(rendered.contains(NO_DESCRIPTION));
    }
}
