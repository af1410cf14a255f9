#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod facets;
pub mod traits;
pub mod types;

pub use error::{Error, FetchCause, FetchError, Result, TransportError};
pub use facets::{FacetChange, FacetState};
