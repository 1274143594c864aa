use std::error::Error;
use std::fmt::Display;

pub(crate) use gdal::errors::GdalError;

pub(crate) use clap::error::Error as ArgumentError;

#[derive(Debug)]
pub(crate) enum CommandError {
    GdalError(GdalError),
    ZipError(zip::result::ZipError),
    IoError(std::io::Error),
    EmptyInput,
    InputTooLong(usize),
    InvalidDistrictFormat(String),
    MalformedCombinedToken(String),
    ColumnsUnresolved,
    ExpressionEvaluationFailed(String),
    MissingField(&'static str),
    MissingFeature(u64),
    MissingGeometry(u64),
    MissingEditType(i32),
    NoMatchingFeatures,
    GdalUnionFailed,
    GdalDifferenceFailed,
    EmptyGeometryResult,
    ExportProducedNothing(String),
}

impl Error for CommandError {

}

impl Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GdalError(a) => write!(f,"gdal: {}",a),
            Self::ZipError(a) => write!(f,"zip: {}",a),
            Self::IoError(a) => write!(f,"io: {}",a),
            Self::EmptyInput => write!(f,"No parcels remained after trimming the input."),
            Self::InputTooLong(a) => write!(f,"Input is {} characters long, the limit is {}.",a,crate::parcels::MAX_INPUT_LENGTH),
            Self::InvalidDistrictFormat(a) => write!(f,"District code '{}' is not a plain number.",a),
            Self::MalformedCombinedToken(a) => write!(f,"Entry '{}' is not in 'label-district' form.",a),
            Self::ColumnsUnresolved => write!(f,"Could not work out which columns hold the district code and parcel label."),
            Self::ExpressionEvaluationFailed(a) => write!(f,"The layer rejected the selection expression: {}",a),
            Self::MissingField(a) => write!(f,"The layer has no '{}' field.",a),
            Self::MissingFeature(a) => write!(f,"The layer has no feature with id {}.",a),
            Self::MissingGeometry(a) => write!(f,"Feature '{}' has no geometry.",a),
            Self::MissingEditType(a) => write!(f,"No feature with edit_type = {} was found in the layer.",a),
            Self::NoMatchingFeatures => write!(f,"No features matched the given ids."),
            Self::GdalUnionFailed => write!(f,"gdal could not merge the geometries."),
            Self::GdalDifferenceFailed => write!(f,"gdal could not subtract the geometries."),
            Self::EmptyGeometryResult => write!(f,"The geometry operation produced an empty result."),
            Self::ExportProducedNothing(a) => write!(f,"The export did not produce '{}'.",a),
        }
    }
}

impl From<GdalError> for CommandError {

    fn from(value: GdalError) -> Self {
        Self::GdalError(value)
    }
}

impl From<zip::result::ZipError> for CommandError {

    fn from(value: zip::result::ZipError) -> Self {
        Self::ZipError(value)
    }
}

impl From<std::io::Error> for CommandError {

    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

#[derive(Debug)]
pub(crate) enum ProgramError {
    ArgumentError(ArgumentError),
    CommandError(CommandError)
}

impl Error for ProgramError {

}

impl Display for ProgramError {

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArgumentError(a) => write!(f,"{}",a),
            Self::CommandError(a) => write!(f,"{}",a),
        }
    }
}

impl From<ArgumentError> for ProgramError {

    fn from(value: ArgumentError) -> Self {
        Self::ArgumentError(value)
    }
}

impl From<CommandError> for ProgramError {

    fn from(value: CommandError) -> Self {
        Self::CommandError(value)
    }
}
