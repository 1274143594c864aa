use std::path::Path;

use gdal::spatial_ref::SpatialRef;
use gdal::vector::LayerAccess;
use gdal::vector::Layer;
use gdal::vector::OGRFieldType;
use gdal::vector::OGRwkbGeometryType;
use gdal::Dataset;
use gdal::DatasetOptions;
use gdal::DriverManager;
use gdal::GdalOpenFlags;
use gdal::vector::LayerOptions;

use crate::errors::CommandError;
use crate::parcels::SelectionLayer;

/// The name ISeD expects for the working graphics layer.
pub(crate) const WORKING_LAYER_NAME: &str = "priprava_grafike_za_ISeD";

/// The classification attribute on the working layer (1 = monument,
/// 3 = influence area, and so on).
pub(crate) const EDIT_TYPE_FIELD: &str = "edit_type";

// The national cadastre is published in the Slovene national grid.
pub(crate) const WORKING_LAYER_EPSG: u32 = 3794;

pub(crate) struct CadastreMap {
    dataset: Dataset
}

impl CadastreMap {

    const GDAL_DRIVER: &'static str = "GPKG";

    fn new(dataset: Dataset) -> Self {
        Self {
            dataset
        }
    }

    fn open_dataset<FilePath: AsRef<Path>>(path: &FilePath) -> Result<Dataset,CommandError> {
        Ok(Dataset::open_ex(path, DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_UPDATE,
            ..Default::default()
        })?)
    }

    pub(crate) fn open<FilePath: AsRef<Path>>(path: &FilePath) -> Result<Self,CommandError> {
        Ok(Self::new(Dataset::open(path)?))
    }

    pub(crate) fn edit<FilePath: AsRef<Path>>(path: &FilePath) -> Result<Self,CommandError> {
        Ok(Self::new(Self::open_dataset(path)?))
    }

    pub(crate) fn create_or_edit<FilePath: AsRef<Path>>(path: &FilePath) -> Result<Self,CommandError> {
        if path.as_ref().exists() {
            Self::edit(path)
        } else {
            let driver = DriverManager::get_driver_by_name(Self::GDAL_DRIVER)?;
            let dataset = driver.create_vector_only(path)?;
            Ok(Self::new(dataset))
        }

    }

    pub(crate) fn vector_layer(&self, name: &str) -> Result<Layer,CommandError> {
        Ok(self.dataset.layer_by_name(name)?)
    }

    pub(crate) fn parcel_layer(&self, name: &str) -> Result<CadastreLayer,CommandError> {
        Ok(CadastreLayer::new(self.vector_layer(name)?))
    }

    /// Creates the ISeD working layer: multi-polygon, national grid, with the
    /// `edit_type` classification field.
    pub(crate) fn create_working_layer(&mut self, name: &str, overwrite: bool) -> Result<(),CommandError> {
        let srs = SpatialRef::from_epsg(WORKING_LAYER_EPSG)?;
        let layer = self.dataset.create_layer(LayerOptions {
            name,
            ty: OGRwkbGeometryType::wkbMultiPolygon,
            srs: Some(&srs),
            options: if overwrite {
                Some(&["OVERWRITE=YES"])
            } else {
                None
            }
        })?;
        layer.create_defn_fields(&[(EDIT_TYPE_FIELD,OGRFieldType::OFTInteger)])?;
        Ok(())
    }

    /// Adds the `edit_type` field to an existing layer. Returns false when the
    /// field was already there.
    pub(crate) fn add_edit_type_field(&mut self, layer_name: &str) -> Result<bool,CommandError> {
        let layer = self.dataset.layer_by_name(layer_name)?;
        if layer.defn().fields().any(|field| field.name() == EDIT_TYPE_FIELD) {
            return Ok(false);
        }
        layer.create_defn_fields(&[(EDIT_TYPE_FIELD,OGRFieldType::OFTInteger)])?;
        Ok(true)
    }

    pub(crate) fn save(&mut self) -> Result<(),CommandError> {
        Ok(self.dataset.flush_cache()?)
    }

}

/// A vector layer together with a selection. OGR has no selection concept of
/// its own, so the selected fid set lives here; everything the matcher
/// observes (count and id set) behaves like the host selection it replaces.
pub(crate) struct CadastreLayer<'layer> {
    layer: Layer<'layer>,
    selection: Vec<u64>
}

impl<'layer> CadastreLayer<'layer> {

    fn new(layer: Layer<'layer>) -> Self {
        Self {
            layer,
            selection: Vec::new()
        }
    }

    /// The selected fids in ascending order, for stable output.
    pub(crate) fn selected_ids(&self) -> Vec<u64> {
        let mut ids = self.selection.clone();
        ids.sort_unstable();
        ids
    }

}

impl SelectionLayer for CadastreLayer<'_> {

    fn field_names(&self) -> Vec<String> {
        self.layer.defn().fields().map(|field| field.name()).collect()
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        self.layer.defn().fields().position(|field| field.name() == name)
    }

    fn select_by_expression(&mut self, expression: &str) -> Result<(),CommandError> {
        self.selection.clear();
        if let Err(err) = self.layer.set_attribute_filter(expression) {
            self.layer.clear_attribute_filter();
            return Err(CommandError::ExpressionEvaluationFailed(err.to_string()));
        }
        let mut ids = Vec::new();
        for feature in self.layer.features() {
            if let Some(fid) = feature.fid() {
                ids.push(fid);
            }
        }
        self.layer.clear_attribute_filter();
        self.selection = ids;
        Ok(())
    }

    fn select_by_ids(&mut self, ids: Vec<u64>) {
        self.selection = ids;
    }

    fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn selected_count(&self) -> usize {
        self.selection.len()
    }

    fn scan_columns(&mut self, district_index: usize, parcel_index: usize) -> Vec<(u64,Option<String>,Option<String>)> {
        let mut rows = Vec::new();
        for feature in self.layer.features() {
            let Some(fid) = feature.fid() else {
                continue;
            };
            // a feature whose attributes can't be read is skipped, the same
            // way the old search dialog skipped it
            if let (Ok(district),Ok(parcel)) = (feature.field_as_string(district_index),feature.field_as_string(parcel_index)) {
                rows.push((fid,district,parcel));
            }
        }
        rows
    }

}
