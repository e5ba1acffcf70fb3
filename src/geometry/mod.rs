//! Measurement geometry.
//!
//! Regions live in sensor-grid cells; everything drawn lives in display
//! pixels. The mappers here are the only place the two meet.

mod mapper;
mod region;

pub use mapper::{
    ChainedMapper, CoordinateMapper, Dimensions, DisplayRect, Mapping, MappingError, Point,
};
pub use region::MeasurementRegion;
