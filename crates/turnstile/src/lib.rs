pub mod agents;
pub mod approval;
pub mod client;
pub mod errors;
pub mod models;
pub mod turn;
