pub mod board;
pub mod dnd;
pub mod task;
