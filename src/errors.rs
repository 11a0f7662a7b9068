//! Errors that may be returned by methods in the crate.
use std::fmt;
use std::io;

use crate::data::DataSetError;
use crate::params::ParamsError;

#[derive(Debug)]
pub enum Error {
    Csv(csv::Error),
    DataSetError(DataSetError),
    Download(String),
    DuplicateLayerName(String),
    EmptyLayerSequence,
    HDF5Error(hdf5::Error),
    Image(image::ImageError),
    InvalidInputShape,
    InvalidLayer(String),
    InvalidOctaveScale(f64),
    InvalidString(String),
    Io(io::Error),
    NoClasses,
    NoLayer,
    NonSpatialLayer(String),
    OctaveTooSmall { layer: String, shape: (u64, u64) },
    ParamsError(ParamsError),
    UnknownActivation(u64),
    UnknownLayer(String),
    UnknownLoss(u64),
    UnknownOptimizer(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Csv(ref err) => write!(f, "CSV error: {}", err),
            Error::DataSetError(ref err) => write!(f, "DataSetError: {}", err),
            Error::Download(ref err) => write!(f, "The image could not be downloaded: {}", err),
            Error::DuplicateLayerName(ref name) => write!(f, "The network already contains a layer named {}.", name),
            Error::EmptyLayerSequence => write!(f, "The layer sequence must contain at least one layer."),
            Error::HDF5Error(ref err) => write!(f, "HDF5Error: {}", err),
            Error::Image(ref err) => write!(f, "Image error: {}", err),
            Error::InvalidInputShape => write!(f, "The input shape of the network must be in the form [height, width, channels, 1] with non zero dimensions."),
            Error::InvalidLayer(ref name) => write!(f, "The network doesn't contain a layer named {}.", name),
            Error::InvalidOctaveScale(scale) => write!(f, "The octave scale must be a finite number greater than or equal to 1, found {}.", scale),
            Error::InvalidString(ref value) => write!(f, "The string {:?} cannot be stored in the model file.", value),
            Error::Io(ref err) => write!(f, "IO error: {}", err),
            Error::NoClasses => write!(f, "The network doesn't contain any classes dictionary."),
            Error::NoLayer => write!(f, "The network doesn't contain any layer."),
            Error::NonSpatialLayer(ref name) => write!(f, "The layer {} depends on a fixed input size and cannot be used for feature extraction.", name),
            Error::OctaveTooSmall { ref layer, shape } => write!(f, "An octave of shape {:?} is too small to produce an activation at layer {}.", shape, layer),
            Error::ParamsError(ref err) => write!(f, "ParamsError: {}", err),
            Error::UnknownActivation(id) => write!(f, "The activation with id {} is unknown.", id),
            Error::UnknownLayer(ref name) => write!(f, "The type of layer {} is unknown.", name),
            Error::UnknownLoss(id) => write!(f, "The loss function with id {} is unknown.", id),
            Error::UnknownOptimizer(ref name) => write!(f, "The optimizer {} is unknown.", name),
        }
    }
}

impl std::error::Error for Error {}

impl std::convert::From<csv::Error> for Error {
    fn from(error: csv::Error) -> Error {
        Error::Csv(error)
    }
}

impl std::convert::From<DataSetError> for Error {
    fn from(error: DataSetError) -> Error {
        Error::DataSetError(error)
    }
}

impl std::convert::From<hdf5::Error> for Error {
    fn from(error: hdf5::Error) -> Error {
        Error::HDF5Error(error)
    }
}

impl std::convert::From<image::ImageError> for Error {
    fn from(error: image::ImageError) -> Error {
        Error::Image(error)
    }
}

impl std::convert::From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

impl std::convert::From<ParamsError> for Error {
    fn from(error: ParamsError) -> Error {
        Error::ParamsError(error)
    }
}

impl std::convert::From<ureq::Error> for Error {
    fn from(error: ureq::Error) -> Error {
        Error::Download(error.to_string())
    }
}
