//! Foundation types for GeoDB.
//!
//! This crate provides the data model shared by every other GeoDB crate:
//! the stored [`Object`], its geographic [`Point`], the derived proximity
//! [`Event`], and the one-byte [`RecordKind`] tag that separates object
//! records from other record classes in the shared key space.
//!
//! # Key Types
//!
//! - [`Object`] - A geolocated entity with a radius of influence
//! - [`Point`] - Latitude/longitude pair with great-circle distance
//! - [`Event`] - Notice that two objects' influence radii overlap
//! - [`RecordKind`] - Metadata tag stored alongside each KV entry

pub mod error;
pub mod event;
pub mod object;
pub mod point;
pub mod record;
pub mod temporal;

pub use error::{TypeError, TypeResult};
pub use event::Event;
pub use object::Object;
pub use point::{Point, EARTH_RADIUS_METERS};
pub use record::RecordKind;
pub use temporal::unix_now;
