// Row processing: CSV parsing, normalization, and validation

pub mod normalize;
pub mod parser;
pub mod validate;
