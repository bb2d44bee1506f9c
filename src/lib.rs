//! Drawless chess: a chess game against a move oracle in which draws are
//! broken by returning captured pieces to the board.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod models;
