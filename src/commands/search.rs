use std::path::PathBuf;

use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

use super::Task;
use crate::cadastre::CadastreMap;
use crate::errors::CommandError;
use crate::parcels::parse_combined_request;
use crate::parcels::parse_separate_request;
use crate::parcels::resolve_parcel_columns;
use crate::parcels::select_parcels;
use crate::parcels::DecliningFieldPicker;
use crate::parcels::FieldPicker;
use crate::parcels::ParcelColumns;
use crate::parcels::SelectionLayer;
use crate::progress::ProgressObserver;
use crate::subcommand_def;

/// Prompts the operator to choose the two columns from a list of the layer's
/// attribute names. Escaping the prompt declines the whole search.
struct ConsoleFieldPicker;

impl ConsoleFieldPicker {

    fn pick_one(names: &[String], prompt: &str, default: Option<&str>) -> Option<String> {
        let default_index = default.and_then(|default| names.iter().position(|name| name == default)).unwrap_or(0);
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(names)
            .default(default_index)
            .interact_opt()
            .ok()
            .flatten()?;
        names.get(choice).cloned()
    }

}

impl FieldPicker for ConsoleFieldPicker {

    fn pick_columns(&self, names: &[String], district_default: Option<&str>, parcel_default: Option<&str>) -> Option<ParcelColumns> {
        if names.is_empty() {
            return None;
        }
        let district = Self::pick_one(names, "Which column holds the district code (KO)?", district_default)?;
        let parcel = Self::pick_one(names, "Which column holds the parcel label?", parcel_default)?;
        Some(ParcelColumns {
            district,
            parcel
        })
    }

}

subcommand_def!{
    /// Selects parcels on a cadastral layer from a free-text request
    pub(crate) struct Search {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        /// The name of the parcel layer to search
        layer: String,

        #[arg(long,requires="parcels",conflicts_with="combined")]
        /// The cadastral district code (KO) shared by every requested parcel
        district: Option<String>,

        #[arg(long,requires="district")]
        /// Comma-separated parcel labels within the district
        parcels: Option<String>,

        #[arg(long,required_unless_present="parcels",conflicts_with_all=["district","parcels"])]
        /// Comma-separated 'label-district' entries
        combined: Option<String>,

        #[arg(long)]
        /// The column holding the district code, when the usual names don't fit
        district_column: Option<String>,

        #[arg(long)]
        /// The column holding the parcel label, when the usual names don't fit
        parcel_column: Option<String>,

        #[arg(long)]
        /// Never prompt for column choices, fail instead
        no_input: bool,

        #[arg(long)]
        /// Print the selected feature ids, one per line
        print_ids: bool

    }
}

impl Task for Search {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce("Search for parcels");

        let keys = if let Some(combined) = &self.combined {
            parse_combined_request(combined)?
        } else {
            // clap guarantees both are present on this path
            let district = self.district.as_deref().unwrap_or("");
            let parcels = self.parcels.as_deref().unwrap_or("");
            parse_separate_request(district, parcels)?
        };

        let map = CadastreMap::open(&self.target)?;
        let mut layer = map.parcel_layer(&self.layer)?;
        let names = layer.field_names();

        let columns = if self.no_input {
            resolve_parcel_columns(&names, &DecliningFieldPicker, self.district_column.as_deref(), self.parcel_column.as_deref())?
        } else {
            resolve_parcel_columns(&names, &ConsoleFieldPicker, self.district_column.as_deref(), self.parcel_column.as_deref())?
        };

        let count = select_parcels(&mut layer, &columns, &keys, progress)?;

        progress.announce(&format!("{} features selected for {} requested parcels.",count,keys.len()));

        if self.print_ids {
            for id in layer.selected_ids() {
                println!("{}",id);
            }
        }

        Ok(())
    }
}
