use std::path::PathBuf;

use super::Task;
use crate::cadastre::CadastreMap;
use crate::cadastre::WORKING_LAYER_NAME;
use crate::errors::CommandError;
use crate::export::export_layer;
use crate::progress::ProgressObserver;
use crate::subcommand_def;

subcommand_def!{
    /// Exports the working layer as the zipped shapefile ISeD ingests
    pub(crate) struct Export {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        /// The path of the shapefile to write, the zip lands next to it
        output: PathBuf,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to export
        layer: String

    }
}

impl Task for Export {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce(&format!("Export '{}'",self.layer));

        let source = CadastreMap::open(&self.target)?;
        let mut layer = source.vector_layer(&self.layer)?;
        let zip_path = export_layer(&mut layer, &self.output, progress)?;

        progress.announce(&format!("Exported to '{}'.",zip_path.display()));

        Ok(())
    }
}
