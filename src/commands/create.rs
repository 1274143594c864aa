use std::path::PathBuf;

use super::Task;
use crate::cadastre::CadastreMap;
use crate::cadastre::WORKING_LAYER_NAME;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::subcommand_def;

subcommand_def!{
    /// Creates the empty working layer the graphics are prepared in
    pub(crate) struct Create {

        /// The path to the cadastre GeoPackage file, created if missing
        target: PathBuf,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to create
        layer: String,

        #[arg(long)]
        /// If true and the layer already exists in the file, it will be overwritten. Otherwise, an error will occur if the layer exists.
        overwrite: bool

    }
}

impl Task for Create {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce(&format!("Create working layer '{}'",self.layer));

        let mut target = CadastreMap::create_or_edit(&self.target)?;
        target.create_working_layer(&self.layer, self.overwrite)?;
        target.save()
    }
}

subcommand_def!{
    /// Adds the edit_type classification field to an existing layer
    pub(crate) struct AddEditType {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to add the field to
        layer: String

    }
}

impl Task for AddEditType {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce(&format!("Add edit_type to '{}'",self.layer));

        let mut target = CadastreMap::edit(&self.target)?;
        if !target.add_edit_type_field(&self.layer)? {
            progress.warning(|| "The layer already has an edit_type field.");
        }
        target.save()
    }
}
