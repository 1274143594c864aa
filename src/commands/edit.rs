use std::path::PathBuf;

use super::Task;
use crate::cadastre::CadastreMap;
use crate::cadastre::WORKING_LAYER_NAME;
use crate::errors::CommandError;
use crate::graphics::buffer_features;
use crate::graphics::clip_around_base;
use crate::graphics::clip_influence_area;
use crate::graphics::copy_merged_features;
use crate::graphics::merge_features;
use crate::progress::ProgressObserver;
use crate::subcommand_def;

subcommand_def!{
    /// Copies features from a cadastre layer into the working layer as one merged polygon
    pub(crate) struct Copy {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        /// The name of the layer to copy from
        from: String,

        #[arg(long,value_delimiter=',',required=true)]
        /// The feature ids to copy, as printed by search --print-ids
        ids: Vec<u64>,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to copy into
        layer: String,

        #[arg(long)]
        /// The edit_type value to stamp on the copied feature (1 = monument, 3 = influence area)
        edit_type: Option<i32>

    }
}

impl Task for Copy {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce(&format!("Copy {} features into '{}'",self.ids.len(),self.layer));

        let mut target = CadastreMap::edit(&self.target)?;
        {
            let source = target.vector_layer(&self.from)?;
            let destination = target.vector_layer(&self.layer)?;
            copy_merged_features(&source, &destination, &self.ids, self.edit_type, progress)?;
        }
        target.save()
    }
}

subcommand_def!{
    /// Merges several features of the working layer into one polygon
    pub(crate) struct Merge {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to edit
        layer: String,

        #[arg(long,value_delimiter=',',required=true)]
        /// The feature ids to merge
        ids: Vec<u64>,

        #[arg(long)]
        /// The edit_type value to stamp on the merged feature (1 = monument, 3 = influence area)
        edit_type: Option<i32>

    }
}

impl Task for Merge {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce(&format!("Merge {} features",self.ids.len()));

        let mut target = CadastreMap::edit(&self.target)?;
        {
            let mut layer = target.vector_layer(&self.layer)?;
            merge_features(&mut layer, &self.ids, self.edit_type, progress)?;
        }
        target.save()
    }
}

subcommand_def!{
    /// Replaces the geometry of features with a buffered version of it
    pub(crate) struct Buffer {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to edit
        layer: String,

        #[arg(long,value_delimiter=',',required=true)]
        /// The feature ids to buffer
        ids: Vec<u64>,

        #[arg(long,allow_hyphen_values=true)]
        /// The buffer distance in layer units (meters in the national grid), negative to shrink
        distance: f64

    }
}

impl Task for Buffer {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce(&format!("Buffer features by {}",self.distance));

        let mut target = CadastreMap::edit(&self.target)?;
        let buffered = {
            let mut layer = target.vector_layer(&self.layer)?;
            buffer_features(&mut layer, &self.ids, self.distance)?
        };
        target.save()?;

        progress.announce(&format!("{} features buffered.",buffered));

        Ok(())
    }
}

subcommand_def!{
    /// Subtracts the monument polygon (edit_type 1) from the influence area (edit_type 3)
    pub(crate) struct ClipInfluence {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to edit
        layer: String

    }
}

impl Task for ClipInfluence {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce("Clip the influence area with the monument");

        let mut target = CadastreMap::edit(&self.target)?;
        {
            let mut layer = target.vector_layer(&self.layer)?;
            clip_influence_area(&mut layer, progress)?;
        }
        target.save()
    }
}

subcommand_def!{
    /// Subtracts a base polygon from every other feature that overlaps it
    pub(crate) struct ClipZone {

        /// The path to the cadastre GeoPackage file
        target: PathBuf,

        #[arg(long,default_value=WORKING_LAYER_NAME)]
        /// The name of the layer to edit
        layer: String,

        #[arg(long)]
        /// The feature id of the base polygon
        base: u64

    }
}

impl Task for ClipZone {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        progress.announce("Clip the zone around the base polygon");

        let mut target = CadastreMap::edit(&self.target)?;
        let clipped = {
            let mut layer = target.vector_layer(&self.layer)?;
            clip_around_base(&mut layer, self.base, progress)?
        };
        target.save()?;

        progress.announce(&format!("{} features clipped.",clipped));

        Ok(())
    }
}
