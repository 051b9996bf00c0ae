//! Range-filtered remote object enumeration
//!
//! Lists objects whose key carries a sortable range value (usually a
//! `yyyy/mm/dd` date) at a fixed path position, keeping only those inside
//! `[range_min, range_max]`. The listing prefix is narrowed to the longest
//! subpath the range bounds share so the store enumerates as little as
//! possible.

pub mod error;
pub mod lister;
pub mod query;

pub use error::{RangeListError, Result};
pub use lister::RangeLister;
pub use query::{KeyMatch, RangeQuery};
