pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod kickvote;
pub mod lobbystate;
pub mod network;
pub mod registry;
pub mod rewardstrategy;
pub mod server;
pub mod timer;
pub mod turn;
pub mod wordhints;
pub mod words;
