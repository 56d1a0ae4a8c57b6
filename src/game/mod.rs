//! Game knowledge
//!
//! Screen layout, parsers for the HUD text, and the persisted board
//! statistics.

pub mod board;
pub mod layout;
pub mod parse;

pub use board::{BoardError, BoardRecord, BoardStore, CostTable};
pub use parse::{
    board_name, parse_cost, parse_money, parse_multiplier, parse_refill_minutes, parse_rolls,
};
