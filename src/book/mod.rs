pub mod opening_book;
pub mod polyglot_book;
pub mod polyglot_entry;
pub mod polyglot_hash;
pub mod polyglot_keys;

pub use opening_book::OpeningBook;
pub use polyglot_book::PolyglotBook;
