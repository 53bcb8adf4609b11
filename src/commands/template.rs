//! Template command handlers.

use crate::accounts::{TemplateView, create_template, delete_template, templates_for_protocols};
use crate::cli::TemplateCommands;
use crate::config::Config;
use crate::db::{RecordStore, SqliteRepository};
use crate::error::Result;
use crate::utils::{into_field_values, print_json, read_json, split_list};

pub fn handle_template(
    repo: &SqliteRepository,
    config: &Config,
    command: TemplateCommands,
) -> Result<()> {
    let registry = config.labels();
    match command {
        TemplateCommands::Add { file } => {
            let payload = into_field_values(read_json(&file)?)?;
            let template = create_template(repo, &payload, &config.org())?;
            print_json(&TemplateView::new(&template, &registry))
        }
        TemplateCommands::List { protocols } => {
            let templates = match protocols.as_deref() {
                Some(list) => templates_for_protocols(repo, &split_list(list))?,
                None => repo.list_templates(None)?,
            };
            let views: Vec<TemplateView> = templates
                .iter()
                .map(|t| TemplateView::new(t, &registry))
                .collect();
            print_json(&views)
        }
        TemplateCommands::Delete { id } => {
            delete_template(repo, &id)?;
            println!("Deleted template {}", id);
            Ok(())
        }
    }
}
