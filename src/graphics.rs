/*!
Geometry editing for the working layer: merging, buffering and clipping.
All of the actual geometry math is single calls into gdal; this module only
decides which features take part and writes the results back.
*/

use gdal::cpl::CslStringList;
use gdal::vector::Feature;
use gdal::vector::Geometry;
use gdal::vector::Layer;
use gdal::vector::LayerAccess;

use crate::cadastre::EDIT_TYPE_FIELD;
use crate::errors::CommandError;
use crate::errors::GdalError;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator;

/// `edit_type` value marking the monument polygon.
pub(crate) const EDIT_TYPE_MONUMENT: i32 = 1;

/// `edit_type` value marking the influence area polygon.
pub(crate) const EDIT_TYPE_INFLUENCE: i32 = 3;

// The quadrant segment count the old tool always buffered with.
const BUFFER_SEGMENTS: u32 = 5;

// The gdal crate has no wrapper for OGR_L_DeleteFeature yet, so this trait
// supplies the one binding the code needs.
trait DeleteFeature {
    fn delete_feature(&mut self, fid: u64) -> Result<(),GdalError>;
}

impl DeleteFeature for Layer<'_> {
    fn delete_feature(&mut self, fid: u64) -> Result<(),GdalError> {
        let err = unsafe { gdal_sys::OGR_L_DeleteFeature(self.c_layer(), fid as i64) };
        if err == gdal_sys::OGRErr::OGRERR_NONE {
            Ok(())
        } else {
            Err(GdalError::OgrError { err, method_name: "OGR_L_DeleteFeature" })
        }
    }
}

fn validity_options() -> Result<CslStringList,CommandError> {
    let mut options = CslStringList::new();
    options.add_string("METHOD=STRUCTURE")?;
    Ok(options)
}

fn ensure_valid<Progress: ProgressObserver>(geometry: Geometry, progress: &Progress) -> Result<Geometry,CommandError> {
    if geometry.is_valid() {
        Ok(geometry)
    } else {
        progress.warning(|| "Fixing an invalid geometry result.");
        Ok(geometry.make_valid(&validity_options()?)?)
    }
}

// Areal geometries report their rings or parts as sub-geometries, so a
// result with none of them is an empty one.
fn geometry_is_empty(geometry: &Geometry) -> bool {
    geometry.geometry_count() == 0
}

// Unions the geometries of the given features, reporting which fids actually
// contributed. Features without geometry are left out, as are unknown ids.
fn union_features(layer: &Layer, ids: &[u64]) -> Result<(Geometry,Vec<u64>),CommandError> {
    let mut merged: Option<Geometry> = None;
    let mut found = Vec::new();
    for &fid in ids {
        let Some(feature) = layer.feature(fid) else {
            continue;
        };
        let Some(geometry) = feature.geometry() else {
            continue;
        };
        let geometry = geometry.clone();
        merged = Some(match merged {
            None => geometry,
            Some(so_far) => so_far.union(&geometry).ok_or(CommandError::GdalUnionFailed)?
        });
        found.push(fid);
    }
    let merged = merged.ok_or(CommandError::NoMatchingFeatures)?;
    if geometry_is_empty(&merged) {
        return Err(CommandError::EmptyGeometryResult);
    }
    Ok((merged,found))
}

fn insert_feature(layer: &Layer, geometry: Geometry, edit_type: Option<i32>) -> Result<(),CommandError> {
    let mut feature = Feature::new(layer.defn())?;
    feature.set_geometry(geometry)?;
    if let Some(value) = edit_type {
        if let Ok(index) = feature.field_index(EDIT_TYPE_FIELD) {
            feature.set_field_integer(index, value)?;
        }
    }
    feature.create(layer)?;
    Ok(())
}

/// Merges the geometries of the given features into one feature with the
/// chosen `edit_type` value and deletes the originals. The merged feature is
/// inserted before anything is deleted, so a failure along the way cannot
/// cost the layer its inputs.
pub(crate) fn merge_features<Progress: ProgressObserver>(layer: &mut Layer, ids: &[u64], edit_type: Option<i32>, progress: &mut Progress) -> Result<(),CommandError> {
    let (merged,found) = union_features(layer, ids)?;
    let merged = ensure_valid(merged, progress)?;
    insert_feature(layer, merged, edit_type)?;
    for fid in found {
        layer.delete_feature(fid)?;
    }
    Ok(())
}

/// Unions the geometries of the given source features and inserts the result
/// into the destination layer with the chosen `edit_type` value. The source
/// features are left untouched.
pub(crate) fn copy_merged_features<Progress: ProgressObserver>(source: &Layer, destination: &Layer, ids: &[u64], edit_type: Option<i32>, progress: &mut Progress) -> Result<(),CommandError> {
    let (merged,_) = union_features(source, ids)?;
    let merged = ensure_valid(merged, progress)?;
    insert_feature(destination, merged, edit_type)
}

/// Replaces the geometry of each given feature with its buffer. Returns how
/// many features were actually buffered.
pub(crate) fn buffer_features(layer: &mut Layer, ids: &[u64], distance: f64) -> Result<usize,CommandError> {
    let mut buffered = 0;
    for &fid in ids {
        let Some(mut feature) = layer.feature(fid) else {
            continue;
        };
        let Some(geometry) = feature.geometry() else {
            continue;
        };
        let grown = geometry.buffer(distance, BUFFER_SEGMENTS)?;
        feature.set_geometry(grown)?;
        layer.set_feature(feature)?;
        buffered += 1;
    }
    if buffered == 0 {
        Err(CommandError::NoMatchingFeatures)
    } else {
        Ok(buffered)
    }
}

fn first_feature_with_edit_type(layer: &mut Layer, edit_type_index: usize, value: i32) -> Result<u64,CommandError> {
    for feature in layer.features() {
        let Some(fid) = feature.fid() else {
            continue;
        };
        if let Ok(Some(found)) = feature.field_as_integer(edit_type_index) {
            if found == value {
                return Ok(fid);
            }
        }
    }
    Err(CommandError::MissingEditType(value))
}

fn feature_geometry(layer: &Layer, fid: u64) -> Result<Geometry,CommandError> {
    let feature = layer.feature(fid).ok_or(CommandError::MissingFeature(fid))?;
    Ok(feature.geometry().ok_or(CommandError::MissingGeometry(fid))?.clone())
}

/// Clips the influence area with the monument: the first feature with
/// `edit_type = 3` gets the first `edit_type = 1` geometry subtracted from it.
pub(crate) fn clip_influence_area<Progress: ProgressObserver>(layer: &mut Layer, progress: &mut Progress) -> Result<(),CommandError> {
    let edit_type_index = layer.defn().fields().position(|field| field.name() == EDIT_TYPE_FIELD).ok_or(CommandError::MissingField(EDIT_TYPE_FIELD))?;
    let influence = first_feature_with_edit_type(layer, edit_type_index, EDIT_TYPE_INFLUENCE)?;
    let monument = first_feature_with_edit_type(layer, edit_type_index, EDIT_TYPE_MONUMENT)?;
    let influence_geometry = feature_geometry(layer, influence)?;
    let monument_geometry = feature_geometry(layer, monument)?;
    let clipped = influence_geometry.difference(&monument_geometry).ok_or(CommandError::GdalDifferenceFailed)?;
    if geometry_is_empty(&clipped) {
        return Err(CommandError::EmptyGeometryResult);
    }
    let clipped = ensure_valid(clipped, progress)?;
    let mut feature = layer.feature(influence).ok_or(CommandError::MissingFeature(influence))?;
    feature.set_geometry(clipped)?;
    layer.set_feature(feature)?;
    Ok(())
}

/// Subtracts the base feature's geometry from every other feature that
/// intersects it, writing back only non-empty results. Returns how many
/// features were clipped.
pub(crate) fn clip_around_base<Progress: ProgressObserver>(layer: &mut Layer, base: u64, progress: &mut Progress) -> Result<usize,CommandError> {
    let base_geometry = feature_geometry(layer, base)?;
    let mut clipped = Vec::new();
    for feature in layer.features().watch(progress,"Clipping around the base polygon.","Polygons clipped.") {
        let Some(fid) = feature.fid() else {
            continue;
        };
        if fid == base {
            continue;
        }
        let Some(geometry) = feature.geometry() else {
            continue;
        };
        let Some(intersection) = geometry.intersection(&base_geometry) else {
            continue;
        };
        if geometry_is_empty(&intersection) {
            continue;
        }
        let difference = geometry.difference(&base_geometry).ok_or(CommandError::GdalDifferenceFailed)?;
        if geometry_is_empty(&difference) {
            continue;
        }
        clipped.push((fid,difference));
    }
    let count = clipped.len();
    if count == 0 {
        return Err(CommandError::NoMatchingFeatures);
    }
    for (fid,geometry) in clipped {
        let geometry = ensure_valid(geometry, progress)?;
        let mut feature = layer.feature(fid).ok_or(CommandError::MissingFeature(fid))?;
        feature.set_geometry(geometry)?;
        layer.set_feature(feature)?;
    }
    Ok(count)
}
