// Domain layer: row/chunk model and the storage port. No store-specific code here.

pub mod model;
pub mod ports;
