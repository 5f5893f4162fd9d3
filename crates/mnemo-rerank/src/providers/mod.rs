pub mod voyage;

pub use voyage::VoyageRerankProvider;
