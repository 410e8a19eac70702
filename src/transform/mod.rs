//! Bronze → Silver → Gold transformations.
//!
//! Silver cleans and standardizes raw extraction output around the 7-digit
//! municipality code; Gold joins the standardized datasets and computes the
//! per-100k health indicators.

pub mod gold;
pub mod silver;
