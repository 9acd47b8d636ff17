mod catalog;
mod dwarf;

pub use catalog::{ElfCatalog, split_symbol_path};
pub use dwarf::{AddressRange, LineTable, simplify_path};
