// Domain layer: the ticket record, money arithmetic and the ports the pipeline is built on.

pub mod model;
pub mod money;
pub mod ports;
