/*!
Export of the working layer to a zipped shapefile, the format the ISeD
application ingests.
*/

use std::fs::File;
use std::io::copy;
use std::path::Path;
use std::path::PathBuf;

use gdal::spatial_ref::SpatialRef;
use gdal::vector::Feature;
use gdal::vector::Layer;
use gdal::vector::LayerAccess;
use gdal::vector::OGRFieldType;
use gdal::vector::OGRwkbGeometryType;
use gdal::DriverManager;
use gdal::vector::LayerOptions;
use zip::write::FileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use crate::cadastre::WORKING_LAYER_EPSG;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator;

const SHAPEFILE_DRIVER: &str = "ESRI Shapefile";

// A shapefile is really this whole family of files; the zip has to carry
// every one of them that the driver wrote.
const SHAPEFILE_EXTENSIONS: [&str; 5] = ["shp","shx","dbf","prj","cpg"];

fn copy_features(source: &mut Layer, destination: &mut Layer, field_types: &[OGRFieldType::Type]) -> Result<(),CommandError> {
    for feature in source.features() {
        let mut copied = Feature::new(destination.defn())?;
        if let Some(geometry) = feature.geometry() {
            copied.set_geometry(geometry.clone())?;
        }
        for (index,field_type) in field_types.iter().enumerate() {
            match *field_type {
                OGRFieldType::OFTInteger => if let Some(value) = feature.field_as_integer(index)? {
                    copied.set_field_integer(index, value)?;
                },
                OGRFieldType::OFTInteger64 => if let Some(value) = feature.field_as_integer64(index)? {
                    copied.set_field_integer64(index, value)?;
                },
                OGRFieldType::OFTReal => if let Some(value) = feature.field_as_double(index)? {
                    copied.set_field_double(index, value)?;
                },
                // shapefiles can't hold much else anyway, so everything
                // remaining goes through its string form
                _ => if let Some(value) = feature.field_as_string(index)? {
                    copied.set_field_string(index, &value)?;
                },
            }
        }
        copied.create(destination)?;
    }
    Ok(())
}

fn write_shapefile(source: &mut Layer, shapefile_path: &Path) -> Result<(),CommandError> {
    let driver = DriverManager::get_driver_by_name(SHAPEFILE_DRIVER)?;
    let mut dataset = driver.create_vector_only(shapefile_path)?;
    let srs = SpatialRef::from_epsg(WORKING_LAYER_EPSG)?;
    // the shapefile driver names the layer after the file anyway
    let name = shapefile_path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("export");
    let mut destination = dataset.create_layer(LayerOptions {
        name,
        ty: OGRwkbGeometryType::wkbMultiPolygon,
        srs: Some(&srs),
        options: None
    })?;
    let fields: Vec<(String,OGRFieldType::Type)> = source.defn().fields().map(|field| (field.name(),field.field_type())).collect();
    let field_defs: Vec<(&str,OGRFieldType::Type)> = fields.iter().map(|(name,field_type)| (name.as_str(),*field_type)).collect();
    destination.create_defn_fields(&field_defs)?;
    let field_types: Vec<OGRFieldType::Type> = fields.iter().map(|(_,field_type)| *field_type).collect();
    copy_features(source, &mut destination, &field_types)?;
    dataset.flush_cache()?;
    Ok(())
}

fn zip_sidecars<Progress: ProgressObserver>(shapefile_path: &Path, zip_path: &Path, progress: &mut Progress) -> Result<(),CommandError> {
    let mut writer = ZipWriter::new(File::create(zip_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for extension in SHAPEFILE_EXTENSIONS.iter().watch(progress,"Packing the shapefile.","Shapefile packed.") {
        let sidecar = shapefile_path.with_extension(extension);
        if !sidecar.exists() {
            continue;
        }
        let name = sidecar.file_name().and_then(|name| name.to_str()).map(ToOwned::to_owned).unwrap_or_else(|| format!("export.{}",extension));
        writer.start_file(name, options)?;
        let mut file = File::open(sidecar)?;
        _ = copy(&mut file, &mut writer)?;
    }
    _ = writer.finish()?;
    Ok(())
}

/// Writes the layer out as a shapefile next to the requested path, then packs
/// the shapefile and its sidecar files into a zip with the same stem.
/// Returns the path of the zip.
pub(crate) fn export_layer<Progress: ProgressObserver>(source: &mut Layer, shapefile_path: &Path, progress: &mut Progress) -> Result<PathBuf,CommandError> {
    write_shapefile(source, shapefile_path)?;
    if !shapefile_path.exists() {
        return Err(CommandError::ExportProducedNothing(shapefile_path.to_string_lossy().to_string()));
    }
    let zip_path = shapefile_path.with_extension("zip");
    zip_sidecars(shapefile_path, &zip_path, progress)?;
    Ok(zip_path)
}
