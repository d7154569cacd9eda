pub mod cell;
pub mod chat;
pub mod directory;
pub mod product;
pub mod table;
