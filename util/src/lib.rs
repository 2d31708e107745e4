pub mod soap;
pub mod transport;
pub mod xml;
